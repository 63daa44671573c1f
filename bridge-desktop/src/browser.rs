//! System browser launcher

use async_trait::async_trait;
use bridge_traits::{
    browser::UrlLauncher,
    error::{BridgeError, Result},
};
use tokio::process::Command;
use tracing::debug;

/// Opens URLs with the operating system's default handler.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser;

impl SystemBrowser {
    pub fn new() -> Self {
        Self
    }

    /// Program and arguments that open `url` on `os` (`std::env::consts::OS`).
    ///
    /// The URL is always a single argument and no shell parses it.
    fn launch_args<'a>(os: &str, url: &'a str) -> (&'static str, Vec<&'a str>) {
        match os {
            "macos" => ("open", vec![url]),
            "windows" => ("rundll32", vec!["url.dll,FileProtocolHandler", url]),
            _ => ("xdg-open", vec![url]),
        }
    }

    fn command_for(url: &str) -> Command {
        let (program, args) = Self::launch_args(std::env::consts::OS, url);
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd
    }
}

#[async_trait]
impl UrlLauncher for SystemBrowser {
    async fn open_url(&self, url: &str) -> Result<()> {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(BridgeError::OperationFailed(
                "Refusing to open a non-HTTP URL".to_string(),
            ));
        }

        let status = Self::command_for(url).status().await?;
        if !status.success() {
            return Err(BridgeError::OperationFailed(format!(
                "Browser launcher exited with {}",
                status
            )));
        }

        debug!("Opened authorization page in system browser");
        Ok(())
    }
}
