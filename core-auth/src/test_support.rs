//! Fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, ByteStream, Clock, HttpClient, HttpRequest, HttpResponse, SecureStore,
    UrlLauncher,
};
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use std::collections::HashMap;
use std::sync::Mutex;

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        async fn execute_stream(
            &self,
            request: HttpRequest,
            body: ByteStream,
            content_length: Option<u64>,
        ) -> Result<HttpResponse>;
    }
}

/// In-memory secure store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put_raw(key, value);
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }
}

/// Records opened URLs; fails every call when `fail` is set.
#[derive(Default)]
pub struct RecordingLauncher {
    pub opened: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn last(&self) -> Option<String> {
        self.opened.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl UrlLauncher for RecordingLauncher {
    async fn open_url(&self, url: &str) -> Result<()> {
        if self.fail {
            return Err(BridgeError::NotAvailable("no browser".to_string()));
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Manually advanced clock.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
