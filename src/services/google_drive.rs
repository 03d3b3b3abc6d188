//! Google Drive v3 REST client.
//!
//! Every call goes through [`GoogleDriveClient::send`], which attaches the bearer
//! token and turns transport failures and non-2xx responses into
//! [`StorageClientError`], logging them on the way out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Drive caps `pageSize` for `files.list` at 1000; 100 keeps responses small
const SEARCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum StorageClientError {
    #[error("Google Drive request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Google Drive responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Google Drive access token unavailable: {0}")]
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Supplies OAuth access tokens for Drive calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StorageClientError>;
}

/// A pre-issued bearer token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StorageClientError> {
        if self.0.is_empty() {
            return Err(StorageClientError::Token("empty token".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// The storage capabilities the loader needs.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Run a Drive search query, following page tokens until exhausted.
    async fn search_files(&self, query: &str) -> Result<Vec<DriveFile>, StorageClientError>;

    /// Export a Google Workspace document into `mime_type` and return its bytes.
    async fn export_file(&self, file_id: &str, mime_type: &str)
        -> Result<Vec<u8>, StorageClientError>;
}

/// Build a `files.list` query matching an exact file name.
pub fn name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{}'", escaped)
}

pub struct GoogleDriveClient {
    client: Client,
    base_url: String,
    tokens: Box<dyn TokenSource>,
}

impl GoogleDriveClient {
    pub fn new(
        base_url: String,
        tokens: Box<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, StorageClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{}", self.base_url, file_id)
    }

    fn upload_url(&self, file_id: &str) -> String {
        format!("{}/upload/drive/v3/files/{}", self.base_url, file_id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageClientError> {
        let token = self.tokens.access_token().await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to obtain Google Drive token");
        })?;

        let response = request.bearer_auth(token).send().await.map_err(|e| {
            tracing::error!(error = %e, "Google Drive request failed");
            StorageClientError::Request(e)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google Drive API error");
            return Err(StorageClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Drain a download response chunk by chunk until the body is complete.
    async fn read_chunked(mut response: Response) -> Result<Vec<u8>, StorageClientError> {
        let total = response.content_length();
        let mut buffer = Vec::with_capacity(total.unwrap_or(0) as usize);

        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            tracing::debug!(received = buffer.len(), total = ?total, "Download progress");
        }

        Ok(buffer)
    }

    /// Download a binary (non-Workspace) file's content.
    pub async fn get_file(&self, file_id: &str) -> Result<Vec<u8>, StorageClientError> {
        let request = self
            .client
            .get(self.file_url(file_id))
            .query(&[("alt", "media")]);
        let response = self.send(request).await?;
        Self::read_chunked(response).await
    }

    /// Create a file in `folder_id` and upload its content.
    pub async fn create_file(
        &self,
        file_name: &str,
        folder_id: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile, StorageClientError> {
        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [folder_id],
            "mimeType": mime_type,
        });
        let request = self
            .client
            .post(self.files_url())
            .query(&[("fields", "id, name, mimeType, parents")])
            .json(&metadata);
        let created: DriveFile = self.send(request).await?.json().await?;

        tracing::info!(file_id = %created.id, file_name, "Created Google Drive file");

        self.update_file_content(&created.id, mime_type, content).await
    }

    /// Replace a file's content, keeping its metadata.
    pub async fn update_file_content(
        &self,
        file_id: &str,
        mime_type: &str,
        content: Vec<u8>,
    ) -> Result<DriveFile, StorageClientError> {
        let request = self
            .client
            .patch(self.upload_url(file_id))
            .query(&[("uploadType", "media"), ("fields", "id, name, mimeType, parents")])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(content);
        let updated: DriveFile = self.send(request).await?.json().await?;
        Ok(updated)
    }

    /// Move a file into `new_folder_id`, optionally renaming it.
    ///
    /// When `current_folder_id` is not given the file's current parents are
    /// looked up and all of them are removed.
    pub async fn move_file(
        &self,
        file_id: &str,
        new_folder_id: &str,
        new_file_name: Option<&str>,
        current_folder_id: Option<&str>,
    ) -> Result<DriveFile, StorageClientError> {
        let remove_parents = match current_folder_id {
            Some(folder) => folder.to_string(),
            None => {
                let request = self
                    .client
                    .get(self.file_url(file_id))
                    .query(&[("fields", "parents")]);
                let file: DriveFile = self.send(request).await?.json().await?;
                file.parents.join(",")
            }
        };

        let body = match new_file_name {
            Some(name) => serde_json::json!({ "name": name }),
            None => serde_json::json!({}),
        };

        let request = self
            .client
            .patch(self.file_url(file_id))
            .query(&[
                ("addParents", new_folder_id),
                ("removeParents", remove_parents.as_str()),
                ("fields", "id, name, parents"),
            ])
            .json(&body);
        let moved: DriveFile = self.send(request).await?.json().await?;
        Ok(moved)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), StorageClientError> {
        let request = self.client.delete(self.file_url(file_id));
        self.send(request).await?;
        tracing::info!(file_id, "Deleted Google Drive file");
        Ok(())
    }
}

#[async_trait]
impl FileStorage for GoogleDriveClient {
    async fn search_files(&self, query: &str) -> Result<Vec<DriveFile>, StorageClientError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = SEARCH_PAGE_SIZE.to_string();

        loop {
            let mut params = vec![
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("spaces", "drive"),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let request = self.client.get(self.files_url()).query(&params);
            let page: FileListResponse = self.send(request).await?.json().await?;

            tracing::debug!(query, page_files = page.files.len(), "Fetched Drive search page");
            files.extend(page.files);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(files)
    }

    async fn export_file(
        &self,
        file_id: &str,
        mime_type: &str,
    ) -> Result<Vec<u8>, StorageClientError> {
        tracing::info!(file_id, mime_type, "Exporting Google Drive file");

        let request = self
            .client
            .get(format!("{}/export", self.file_url(file_id)))
            .query(&[("mimeType", mime_type)]);
        let response = self.send(request).await?;
        let bytes = Self::read_chunked(response).await?;

        tracing::info!(file_id, bytes = bytes.len(), "Exported Google Drive file");

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GoogleDriveClient {
        GoogleDriveClient::new(
            server.uri(),
            Box::new(StaticToken::new("test-token")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_name_query_escapes_quotes() {
        assert_eq!(name_query("test_kanalservis"), "name = 'test_kanalservis'");
        assert_eq!(name_query("it's"), r"name = 'it\'s'");
        assert_eq!(name_query(r"a\b"), r"name = 'a\\b'");
    }

    #[tokio::test]
    async fn test_search_follows_page_tokens() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{ "id": "id-3", "name": "orders" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "name = 'orders'"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "page-2",
                "files": [
                    { "id": "id-1", "name": "orders", "mimeType": "application/vnd.google-apps.spreadsheet" },
                    { "id": "id-2", "name": "orders" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let files = client_for(&server).search_files("name = 'orders'").await.unwrap();

        let ids: Vec<&str> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["id-1", "id-2", "id-3"]);
        assert_eq!(
            files[0].mime_type.as_deref(),
            Some("application/vnd.google-apps.spreadsheet")
        );
    }

    #[tokio::test]
    async fn test_export_returns_full_body() {
        let server = MockServer::start().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc/export"))
            .and(query_param("mimeType", "text/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .mount(&server)
            .await;

        let bytes = client_for(&server).export_file("abc", "text/csv").await.unwrap();
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn test_http_errors_are_translated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("insufficient permissions"))
            .mount(&server)
            .await;

        let err = client_for(&server).search_files("name = 'x'").await.unwrap_err();
        match err {
            StorageClientError::Status { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("insufficient"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let server = MockServer::start().await;
        let client = GoogleDriveClient::new(
            server.uri(),
            Box::new(StaticToken::new("")),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.get_file("abc").await.unwrap_err();
        assert!(matches!(err, StorageClientError::Token(_)));
    }

    #[tokio::test]
    async fn test_get_file_downloads_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw".to_vec()))
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).get_file("abc").await.unwrap(), b"raw".to_vec());
    }

    #[tokio::test]
    async fn test_create_file_uploads_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id", "name": "report.csv", "parents": ["folder"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/upload/drive/v3/files/new-id"))
            .and(query_param("uploadType", "media"))
            .and(header("content-type", "text/csv"))
            .and(body_bytes(b"a,b\n1,2\n".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id", "name": "report.csv", "mimeType": "text/csv", "parents": ["folder"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let file = client_for(&server)
            .create_file("report.csv", "folder", "text/csv", b"a,b\n1,2\n".to_vec())
            .await
            .unwrap();

        assert_eq!(file.id, "new-id");
        assert_eq!(file.parents, vec!["folder".to_string()]);
    }

    #[tokio::test]
    async fn test_move_file_looks_up_current_parents() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files/abc"))
            .and(query_param("fields", "parents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc", "parents": ["old-1", "old-2"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PATCH"))
            .and(path("/drive/v3/files/abc"))
            .and(query_param("addParents", "archive"))
            .and(query_param("removeParents", "old-1,old-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc", "name": "renamed", "parents": ["archive"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let moved = client_for(&server)
            .move_file("abc", "archive", Some("renamed"), None)
            .await
            .unwrap();

        assert_eq!(moved.name, "renamed");
        assert_eq!(moved.parents, vec!["archive".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/drive/v3/files/abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).delete_file("abc").await.unwrap();
    }
}
