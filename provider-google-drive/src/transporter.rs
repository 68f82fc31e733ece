//! Google Drive transporter
//!
//! One async method per Drive v3 `files` operation. Each method checks its
//! required arguments, issues a single request and reports any failure as
//! [`DriveError::OperationFailed`] with the underlying cause attached.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::{StaticTokenProvider, TokenProvider};
use core_runtime::config::DriveConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{DriveError, RequestFailure, Result};
use crate::types::{Channel, DriveFile, FileList, GeneratedIds, ListQuery, FOLDER_MIME_TYPE};

/// Authenticated Google Drive v3 client.
///
/// Immutable once built. Obtain one from the functions in [`crate::auth`], or
/// wrap an existing credential with [`DriveTransporter::new`].
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::{DriveFile, DriveTransporter};
///
/// let transporter = DriveTransporter::with_access_token(&config, access_token);
/// let folder_id = transporter.create_folder(None, "Reports").await?;
/// let mut content = tokio::fs::File::open("q3.pdf").await?;
/// let file_id = transporter
///     .create_upload(&mut content, "q3.pdf", "application/pdf", Some(&folder_id), None)
///     .await?;
/// ```
pub struct DriveTransporter {
    http_client: Arc<dyn HttpClient>,
    token_provider: Arc<dyn TokenProvider>,
    api_base_url: String,
    upload_base_url: String,
    request_timeout: Duration,
    user_agent: String,
}

/// Minimal projection requested from create and upload calls
#[derive(Deserialize)]
struct FileId {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl DriveTransporter {
    pub fn new(config: &DriveConfig, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client: config.http_client.clone(),
            token_provider,
            api_base_url: config.api_base_url.clone(),
            upload_base_url: config.upload_base_url.clone(),
            request_timeout: config.request_timeout,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Transporter over a bearer token obtained elsewhere.
    ///
    /// The token is never refreshed.
    pub fn with_access_token(config: &DriveConfig, access_token: impl Into<String>) -> Self {
        Self::new(config, Arc::new(StaticTokenProvider::new(access_token)))
    }

    /// Copy a file, applying `body` to the copy.
    #[instrument(skip(self, body), fields(file_id = %file_id))]
    pub async fn copy(&self, file_id: &str, body: &DriveFile) -> Result<DriveFile> {
        const OPERATION: &str = "Copy";
        require("file_id", file_id)?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/copy", self.file_url(file_id)),
        )
        .json(body)
        .map_err(|e| DriveError::failed(OPERATION, e))?;

        let copy: DriveFile = self.fetch_json(OPERATION, request).await?;
        info!(copy_id = ?copy.id, "File copied");
        Ok(copy)
    }

    /// Create a file from metadata only. No content is uploaded.
    #[instrument(skip(self, body), fields(name = ?body.name))]
    pub async fn create(&self, body: &DriveFile) -> Result<DriveFile> {
        const OPERATION: &str = "Create";

        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files", self.api_base_url))
            .json(body)
            .map_err(|e| DriveError::failed(OPERATION, e))?;

        let created: DriveFile = self.fetch_json(OPERATION, request).await?;
        info!(file_id = ?created.id, "File created");
        Ok(created)
    }

    /// Create a folder and return its id.
    #[instrument(skip(self))]
    pub async fn create_folder(&self, parent_id: Option<&str>, name: &str) -> Result<String> {
        const OPERATION: &str = "Create";
        require("name", name)?;

        let mut folder = DriveFile::named(name).with_mime_type(FOLDER_MIME_TYPE);
        if let Some(parent_id) = parent_id.filter(|id| !id.is_empty()) {
            folder = folder.with_parent(parent_id);
        }

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?fields=id", self.api_base_url),
        )
        .json(&folder)
        .map_err(|e| DriveError::failed(OPERATION, e))?;

        let created: FileId = self.fetch_json(OPERATION, request).await?;
        let id = created.id.ok_or_else(|| {
            DriveError::failed(
                OPERATION,
                <serde_json::Error as serde::de::Error>::missing_field("id"),
            )
        })?;

        info!(folder_id = %id, "Folder created");
        Ok(id)
    }

    /// Upload a new file and return its id.
    ///
    /// `content` is read to the end. It is not closed; the caller keeps
    /// ownership.
    #[instrument(skip(self, content, description), fields(name = %name, mime_type = %mime_type))]
    pub async fn create_upload<R>(
        &self,
        content: &mut R,
        name: &str,
        mime_type: &str,
        folder_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        require("name", name)?;
        require_header_value("mime_type", mime_type)?;

        let mut metadata = DriveFile::named(name).with_mime_type(mime_type);
        if let Some(folder_id) = folder_id.filter(|id| !id.is_empty()) {
            metadata = metadata.with_parent(folder_id);
        }
        if let Some(description) = description {
            metadata = metadata.with_description(description);
        }

        let url = format!(
            "{}/files?uploadType=multipart&fields=id",
            self.upload_base_url
        );
        let id = self
            .upload("CreateUpload", HttpMethod::Post, url, &metadata, content, mime_type)
            .await?;

        info!(file_id = %id, "File uploaded");
        Ok(id)
    }

    /// Replace a file's content and apply `body` to its metadata.
    ///
    /// Returns the file id. `content` stays owned by the caller.
    #[instrument(skip(self, body, content), fields(file_id = %file_id, mime_type = %mime_type))]
    pub async fn update_upload<R>(
        &self,
        body: &DriveFile,
        file_id: &str,
        content: &mut R,
        mime_type: &str,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        require("file_id", file_id)?;
        require_header_value("mime_type", mime_type)?;

        let url = format!(
            "{}/files/{}?uploadType=multipart&fields=id",
            self.upload_base_url,
            urlencoding::encode(file_id)
        );
        let id = self
            .upload("UpdateUpload", HttpMethod::Patch, url, body, content, mime_type)
            .await?;

        info!("File content updated");
        Ok(id)
    }

    /// Permanently delete a file. Deleting a folder deletes its descendants.
    #[instrument(skip(self), fields(file_id = %file_id))]
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        require("file_id", file_id)?;

        let request = HttpRequest::new(HttpMethod::Delete, self.file_url(file_id));
        self.send("Delete", request).await?;

        info!("File deleted");
        Ok(())
    }

    /// Permanently delete every trashed file.
    #[instrument(skip(self))]
    pub async fn empty_trash(&self) -> Result<()> {
        let request =
            HttpRequest::new(HttpMethod::Delete, format!("{}/files/trash", self.api_base_url));
        self.send("EmptyTrash", request).await?;

        info!("Trash emptied");
        Ok(())
    }

    /// Export a Google Workspace document to `mime_type`.
    ///
    /// The exported bytes are fetched and discarded. Drive rejects exports
    /// larger than 10 MB.
    #[instrument(skip(self), fields(file_id = %file_id, mime_type = %mime_type))]
    pub async fn export(&self, file_id: &str, mime_type: &str) -> Result<()> {
        require("file_id", file_id)?;
        require("mime_type", mime_type)?;

        let url = format!(
            "{}/export?mimeType={}",
            self.file_url(file_id),
            urlencoding::encode(mime_type)
        );
        let response = self
            .send("Export", HttpRequest::new(HttpMethod::Get, url))
            .await?;

        info!(bytes = response.body.len(), "File exported");
        Ok(())
    }

    /// Reserve file ids for later create or copy calls.
    #[instrument(skip(self))]
    pub async fn generate_ids(&self) -> Result<GeneratedIds> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            format!("{}/files/generateIds", self.api_base_url),
        );
        let ids: GeneratedIds = self.fetch_json("GenerateIds", request).await?;

        debug!(count = ids.ids.len(), "Generated file ids");
        Ok(ids)
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get(&self, file_id: &str) -> Result<DriveFile> {
        require("file_id", file_id)?;

        let request = HttpRequest::new(HttpMethod::Get, self.file_url(file_id));
        self.fetch_json("Get", request).await
    }

    /// First page of files, with the API's default query and page size.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<FileList> {
        self.list_page(&ListQuery::default()).await
    }

    /// A single page of files matching `query`.
    #[instrument(skip(self), fields(q = ?query.q))]
    pub async fn list_page(&self, query: &ListQuery) -> Result<FileList> {
        let url = with_query(format!("{}/files", self.api_base_url), &query.to_pairs());
        let page: FileList = self
            .fetch_json("List", HttpRequest::new(HttpMethod::Get, url))
            .await?;

        debug!(
            files = page.files.len(),
            has_more = page.next_page_token.is_some(),
            "Listed files"
        );
        Ok(page)
    }

    /// Every file matching `query`, following `nextPageToken`.
    ///
    /// Empty pages may still carry a token and are skipped over. Stops at the
    /// first page without a token, or when the service repeats the token it
    /// was just sent.
    #[instrument(skip(self), fields(q = ?query.q))]
    pub async fn list_all(&self, query: &ListQuery) -> Result<Vec<DriveFile>> {
        let mut query = query.clone();
        let mut files = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.list_page(&query).await?;
            pages += 1;

            files.extend(page.files);

            match page.next_page_token {
                Some(token) if query.page_token.as_deref() != Some(token.as_str()) => {
                    query.page_token = Some(token)
                }
                Some(token) => {
                    warn!(%token, "Page token repeated, stopping");
                    break;
                }
                None => break,
            }
        }

        info!(files = files.len(), pages, "Listed all files");
        Ok(files)
    }

    /// Patch a file's metadata. Fields left unset in `body` are untouched.
    #[instrument(skip(self, body), fields(file_id = %file_id))]
    pub async fn update(&self, file_id: &str, body: &DriveFile) -> Result<DriveFile> {
        const OPERATION: &str = "Update";
        require("file_id", file_id)?;

        let request = HttpRequest::new(HttpMethod::Patch, self.file_url(file_id))
            .json(body)
            .map_err(|e| DriveError::failed(OPERATION, e))?;

        let updated = self.fetch_json(OPERATION, request).await?;
        info!("File metadata updated");
        Ok(updated)
    }

    /// Subscribe `channel` to changes of a file.
    #[instrument(skip(self, channel), fields(file_id = %file_id, channel_id = ?channel.id))]
    pub async fn watch(&self, file_id: &str, channel: &Channel) -> Result<Channel> {
        const OPERATION: &str = "Watch";
        require("file_id", file_id)?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/watch", self.file_url(file_id)),
        )
        .json(channel)
        .map_err(|e| DriveError::failed(OPERATION, e))?;

        let confirmed: Channel = self.fetch_json(OPERATION, request).await?;
        info!(resource_id = ?confirmed.resource_id, "Watch channel registered");
        Ok(confirmed)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base_url, urlencoding::encode(file_id))
    }

    /// Attach credentials and transport settings, then run one round trip.
    async fn execute(&self, operation: &'static str, request: HttpRequest) -> Result<HttpResponse> {
        let access_token = self
            .token_provider
            .access_token()
            .await
            .map_err(|e| DriveError::failed(operation, e))?;

        let request = request
            .bearer_token(access_token)
            .header("User-Agent", self.user_agent.clone())
            .timeout(self.request_timeout);

        debug!(method = %request.method, url = %request.url, "Sending Drive request");

        self.http_client
            .execute(request)
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "Drive request failed in transport");
                DriveError::failed(operation, e)
            })
    }

    /// Like [`execute`](Self::execute), rejecting non-2xx responses.
    async fn send(&self, operation: &'static str, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.execute(operation, request).await?;

        if !response.is_success() {
            let failure = api_error(&response);
            warn!(operation, status = response.status, "Drive API returned an error");
            return Err(DriveError::failed(operation, failure));
        }

        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: HttpRequest,
    ) -> Result<T> {
        let response = self
            .send(operation, request.header("Accept", "application/json"))
            .await?;

        serde_json::from_slice(&response.body).map_err(|e| DriveError::failed(operation, e))
    }

    /// Single-request multipart upload. Returns the id of the stored file.
    async fn upload<R>(
        &self,
        operation: &'static str,
        method: HttpMethod,
        url: String,
        metadata: &DriveFile,
        content: &mut R,
        mime_type: &str,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buffer = Vec::new();
        content
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| DriveError::failed(operation, e))?;

        let (content_type, body) = multipart_related(metadata, mime_type, &buffer)
            .map_err(|e| DriveError::failed(operation, e))?;

        debug!(bytes = buffer.len(), "Uploading content");

        let request = HttpRequest::new(method, url)
            .header("Content-Type", content_type)
            .header("Accept", "application/json")
            .body(body);
        let response = self.execute(operation, request).await?;
        let status = response.status;

        let uploaded = response
            .is_success()
            .then(|| serde_json::from_slice::<FileId>(&response.body).ok())
            .flatten()
            .and_then(|file| file.id);

        uploaded.ok_or_else(|| {
            warn!(operation, status, "Upload did not complete");
            DriveError::failed(operation, RequestFailure::UploadIncomplete { status })
        })
    }
}

fn require(name: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DriveError::MissingArgument(name));
    }
    Ok(())
}

/// Like [`require`], for values written into a MIME part header.
fn require_header_value(name: &'static str, value: &str) -> Result<()> {
    require(name, value)?;
    if value.contains(['\r', '\n']) {
        return Err(DriveError::InvalidArgument {
            name,
            reason: "contains a line break",
        });
    }
    Ok(())
}

fn with_query(mut url: String, pairs: &[(&'static str, String)]) -> String {
    for (index, (key, value)) in pairs.iter().enumerate() {
        url.push(if index == 0 { '?' } else { '&' });
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

fn api_error(response: &HttpResponse) -> RequestFailure {
    let message = serde_json::from_slice::<ApiErrorEnvelope>(&response.body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());

    RequestFailure::Api {
        status: response.status,
        message,
    }
}

/// Encode metadata and content as a `multipart/related` body.
///
/// Returns the `Content-Type` header value and the body.
fn multipart_related(
    metadata: &DriveFile,
    mime_type: &str,
    content: &[u8],
) -> std::result::Result<(String, Bytes), serde_json::Error> {
    let boundary = format!("drive_transporter_{}", Uuid::new_v4().simple());
    let metadata = serde_json::to_vec(metadata)?;

    let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(&metadata);
    body.extend_from_slice(format!("\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Ok((
        format!("multipart/related; boundary={boundary}"),
        Bytes::from(body),
    ))
}
