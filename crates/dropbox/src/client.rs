use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::error::Error;
use crate::types::{
    Entry, ListFolderContinueRequest, ListFolderPage, ListFolderRequest, PathArg, UploadArg,
};

const DEFAULT_API_BASE: &str = "https://api.dropboxapi.com";
const DEFAULT_CONTENT_BASE: &str = "https://content.dropboxapi.com";

/// Typed client for the handful of Dropbox RPC/content endpoints the
/// pipeline touches. Listing and metadata go to the api host, byte transfer
/// to the content host; both are overridable so tests can point at a mock
/// server.
pub struct DropboxClient {
    http: reqwest::Client,
    api_base: String,
    content_base: String,
    access_token: String,
}

#[derive(Default)]
pub struct DropboxClientBuilder {
    access_token: Option<String>,
    api_base: Option<String>,
    content_base: Option<String>,
}

impl DropboxClientBuilder {
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn content_base(mut self, base: impl Into<String>) -> Self {
        self.content_base = Some(base.into());
        self
    }

    pub fn build(self) -> DropboxClient {
        DropboxClient {
            http: reqwest::Client::new(),
            api_base: self.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            content_base: self
                .content_base
                .unwrap_or_else(|| DEFAULT_CONTENT_BASE.to_string()),
            access_token: self.access_token.unwrap_or_default(),
        }
    }
}

impl DropboxClient {
    pub fn builder() -> DropboxClientBuilder {
        DropboxClientBuilder::default()
    }

    /// First page of a folder listing, priming a cursor for change polling.
    pub async fn list_folder(&self, path: &str) -> Result<ListFolderPage, Error> {
        let url = format!("{}/2/files/list_folder", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&ListFolderRequest {
                path,
                recursive: false,
            })
            .send()
            .await?;

        let response = check_rpc(response).await?;
        Ok(response.json().await?)
    }

    /// Changes since `cursor`. A provider-side cursor invalidation maps to
    /// [`Error::CursorReset`].
    pub async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage, Error> {
        let url = format!("{}/2/files/list_folder/continue", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&ListFolderContinueRequest { cursor })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("reset") {
                return Err(Error::CursorReset);
            }
            return Err(Error::Api { status, body });
        }
        Ok(response.json().await?)
    }

    /// Drain a listing to completion, following `has_more` pages. Returns all
    /// entries plus the final cursor.
    pub async fn list_folder_all(&self, path: &str) -> Result<(Vec<Entry>, String), Error> {
        let mut page = self.list_folder(path).await?;
        let mut entries = std::mem::take(&mut page.entries);
        let mut cursor = page.cursor;

        while page.has_more {
            page = self.list_folder_continue(&cursor).await?;
            entries.append(&mut page.entries);
            cursor = page.cursor;
        }

        Ok((entries, cursor))
    }

    /// Stream a file's bytes straight to `dest`, chunk by chunk, so
    /// multi-gigabyte recordings never sit in memory. Returns the byte
    /// count written.
    pub async fn download_to(&self, path: &str, dest: &Path) -> Result<u64, Error> {
        let url = format!("{}/2/files/download", self.content_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", serde_json::to_string(&PathArg { path })?)
            .send()
            .await?;

        let response = check_rpc(response).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(path = %path, bytes = written, "dropbox_download_done");
        Ok(written)
    }

    pub async fn upload(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let url = format!("{}/2/files/upload", self.content_base);
        let arg = UploadArg {
            path,
            mode: "overwrite",
            autorename: false,
            mute: true,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Dropbox-API-Arg", serde_json::to_string(&arg)?)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;

        check_rpc(response).await?;
        tracing::debug!(path = %path, "dropbox_upload_done");
        Ok(())
    }

    /// Create a folder, treating "already exists" as success so startup can
    /// bootstrap the raw/processed structure unconditionally.
    pub async fn create_folder(&self, path: &str) -> Result<(), Error> {
        let url = format!("{}/2/files/create_folder_v2", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&PathArg { path })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Ok(());
        }
        check_rpc(response).await?;
        Ok(())
    }
}

async fn check_rpc(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Api { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DropboxClient {
        DropboxClient::builder()
            .access_token("test-token")
            .api_base(server.uri())
            .content_base(server.uri())
            .build()
    }

    fn page_json(names: &[&str], cursor: &str, has_more: bool) -> serde_json::Value {
        serde_json::json!({
            "entries": names.iter().map(|n| serde_json::json!({
                ".tag": "file",
                "name": n,
                "path_display": format!("/raw/{n}"),
                "size": 1000,
            })).collect::<Vec<_>>(),
            "cursor": cursor,
            "has_more": has_more,
        })
    }

    #[tokio::test]
    async fn list_folder_parses_entries_and_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_json(
                &["a.mp3", "b.wav"],
                "cursor-1",
                false,
            )))
            .mount(&server)
            .await;

        let page = client(&server).list_folder("/raw").await.unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.cursor, "cursor-1");
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn list_folder_all_follows_has_more() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(&["a.mp3"], "c1", true)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .and(body_json_string(r#"{"cursor":"c1"}"#))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(&["b.mp3"], "c2", false)),
            )
            .mount(&server)
            .await;

        let (entries, cursor) = client(&server).list_folder_all("/raw").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(cursor, "c2");
    }

    #[tokio::test]
    async fn cursor_reset_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_summary": "reset/..",
                "error": {".tag": "reset"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_folder_continue("stale")
            .await
            .unwrap_err();
        assert!(err.is_cursor_reset());
    }

    #[tokio::test]
    async fn other_api_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_summary": "path/not_found/.."
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_folder_continue("cursor")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status, .. } if status == StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn download_streams_to_disk_with_api_arg_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .and(header("Dropbox-API-Arg", r#"{"path":"/raw/a.mp3"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-bytes".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("source.mp3");
        let written = client(&server)
            .download_to("/raw/a.mp3", &dest)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"audio-bytes");
    }

    #[tokio::test]
    async fn upload_posts_octet_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/upload"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .upload("/processed/a.md", Bytes::from_static(b"# transcript"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_folder_tolerates_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "error_summary": "path/conflict/folder/.."
            })))
            .mount(&server)
            .await;

        client(&server).create_folder("/raw").await.unwrap();
    }
}
