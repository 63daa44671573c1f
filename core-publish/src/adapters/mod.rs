//! Platform upload adapters.
//!
//! | Platform  | Flow                                              |
//! |-----------|---------------------------------------------------|
//! | Facebook  | Reels start / binary PUT / finish                 |
//! | Instagram | Hosted-URL container, status polling, publish     |
//! | TikTok    | Direct post init, single-chunk PUT, status lookup |
//! | YouTube   | Streamed multipart insert, one retry after 401    |

pub mod facebook;
pub mod instagram;
pub mod tiktok;
pub mod youtube;

pub use facebook::FacebookReelsAdapter;
pub use instagram::InstagramReelsAdapter;
pub use tiktok::TikTokAdapter;
pub use youtube::YouTubeAdapter;
