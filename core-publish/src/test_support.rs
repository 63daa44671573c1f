//! Mocks and fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, ByteStream, FileMetadata, FileSystemAccess, HttpClient, HttpRequest,
    HttpResponse,
};
use bytes::Bytes;
use core_auth::{CredentialProvider, Platform, PlatformCredential};
use futures::StreamExt;
use mockall::mock;
use std::collections::VecDeque;
use std::path::Path;
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

mock! {
    pub FileSystem {}

    #[async_trait]
    impl FileSystemAccess for FileSystem {
        async fn exists(&self, path: &Path) -> Result<bool>;
        async fn metadata(&self, path: &Path) -> Result<FileMetadata>;
        async fn read_file(&self, path: &Path) -> Result<Bytes>;
        async fn open_read_stream(
            &self,
            path: &Path,
        ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
    }
}

mock! {
    pub Credentials {}

    #[async_trait]
    impl CredentialProvider for Credentials {
        async fn valid_credential(&self, platform: Platform) -> core_auth::Result<PlatformCredential>;
        async fn refresh(&self, platform: Platform) -> core_auth::Result<String>;
    }
}

/// A file system holding one in-memory file at any path.
pub fn file_system_with(content: &'static [u8]) -> MockFileSystem {
    let mut fs = MockFileSystem::new();
    fs.expect_exists().returning(|_| Ok(true));
    fs.expect_metadata().returning(move |_| {
        Ok(FileMetadata {
            size: content.len() as u64,
            modified_at: None,
            is_directory: false,
        })
    });
    fs.expect_read_file()
        .returning(move |_| Ok(Bytes::from_static(content)));
    fs.expect_open_read_stream().returning(move |_| {
        Ok(Box::new(std::io::Cursor::new(content.to_vec()))
            as Box<dyn tokio::io::AsyncRead + Send + Unpin>)
    });
    fs
}

/// A request captured by [`ScriptedHttp`], with its streamed body collected.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: HttpRequest,
    pub streamed: Option<Vec<u8>>,
    pub content_length: Option<u64>,
}

/// Answers requests from a queue and records them, draining streamed bodies.
#[derive(Default)]
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<(u16, &'static str)>>,
    pub recorded: Mutex<Vec<Recorded>>,
}

impl ScriptedHttp {
    pub fn new(responses: Vec<(u16, &'static str)>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<HttpResponse> {
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BridgeError::OperationFailed("unexpected request".to_string()))?;
        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.recorded.lock().unwrap().push(Recorded {
            request,
            streamed: None,
            content_length: None,
        });
        self.next_response()
    }

    async fn execute_stream(
        &self,
        request: HttpRequest,
        mut body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<HttpResponse> {
        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            collected.extend_from_slice(&chunk?);
        }
        self.recorded.lock().unwrap().push(Recorded {
            request,
            streamed: Some(collected),
            content_length,
        });
        self.next_response()
    }
}
