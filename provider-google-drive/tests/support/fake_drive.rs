//! In-memory stand-in for the Drive v3 REST API.
//!
//! Understands the subset of routes the transporter issues and keeps files,
//! content and parent links in a map so tests can inspect the outcome.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use provider_google_drive::{Channel, DriveFile, FileList, FOLDER_MIME_TYPE};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

pub const API_BASE: &str = "https://drive.fake/drive/v3";
pub const UPLOAD_BASE: &str = "https://drive.fake/upload/drive/v3";

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub metadata: DriveFile,
    pub content: Vec<u8>,
}

#[derive(Default)]
pub struct FakeDrive {
    files: Mutex<HashMap<String, StoredFile>>,
    next_id: AtomicUsize,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later request fails in transport
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn file(&self, id: &str) -> Option<StoredFile> {
        self.files.lock().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.lock().unwrap().contains_key(id)
    }

    /// Insert a file directly, bypassing the API
    pub fn seed(&self, metadata: DriveFile, content: &[u8]) -> String {
        self.insert(metadata, content.to_vec())
    }

    fn insert(&self, mut metadata: DriveFile, content: Vec<u8>) -> String {
        let id = metadata.id.clone().unwrap_or_else(|| {
            format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
        });
        metadata.id = Some(id.clone());
        if metadata.mime_type.is_none() {
            metadata.mime_type = Some("application/octet-stream".to_string());
        }
        if !metadata.is_folder() {
            metadata.size = Some(content.len().to_string());
        }

        self.files
            .lock()
            .unwrap()
            .insert(id.clone(), StoredFile { metadata, content });
        id
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        if request.header_value("Authorization").is_none() {
            return error(401, "Request is missing required authentication credential.");
        }

        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(_) => return error(400, "Malformed URL"),
        };
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .map(|s| urlencoding::decode(s).map(|d| d.into_owned()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        let is_upload = segments.first().map(String::as_str) == Some("upload");
        let files_at = match segments.iter().position(|s| s == "files") {
            Some(index) => index,
            None => return error(404, "Not Found"),
        };
        let rest: Vec<&str> = segments[files_at + 1..].iter().map(String::as_str).collect();

        match (request.method, is_upload, rest.as_slice()) {
            (HttpMethod::Post, true, []) => self.upload_new(request, &query),
            (HttpMethod::Patch, true, [id]) => self.upload_existing(request, id),
            (HttpMethod::Post, false, []) => self.create(request),
            (HttpMethod::Get, false, []) => self.list(),
            (HttpMethod::Get, false, ["generateIds"]) => json(&serde_json::json!({
                "kind": "drive#generatedIds",
                "space": "drive",
                "ids": ["gen-1", "gen-2", "gen-3"],
            })),
            (HttpMethod::Delete, false, ["trash"]) => self.empty_trash(),
            (HttpMethod::Get, false, [id]) => match self.file(id) {
                Some(file) => json(&file.metadata),
                None => not_found(id),
            },
            (HttpMethod::Patch, false, [id]) => self.patch(request, id),
            (HttpMethod::Delete, false, [id]) => self.delete(id),
            (HttpMethod::Post, false, [id, "copy"]) => self.copy(request, id),
            (HttpMethod::Get, false, [id, "export"]) => match self.file(id) {
                Some(file) => HttpResponse::new(200, file.content),
                None => not_found(id),
            },
            (HttpMethod::Post, false, [id, "watch"]) => self.watch(request, id),
            _ => error(404, "Not Found"),
        }
    }

    fn create(&self, request: &HttpRequest) -> HttpResponse {
        match body::<DriveFile>(request) {
            Some(metadata) => {
                let id = self.insert(metadata, Vec::new());
                json(&self.file(&id).map(|f| f.metadata))
            }
            None => error(400, "Invalid JSON payload"),
        }
    }

    fn upload_new(&self, request: &HttpRequest, query: &HashMap<String, String>) -> HttpResponse {
        if query.get("uploadType").map(String::as_str) != Some("multipart") {
            return error(400, "Unsupported upload type");
        }
        match parse_multipart(request) {
            Some((metadata, content)) => {
                let id = self.insert(metadata, content);
                json(&serde_json::json!({ "id": id }))
            }
            None => error(400, "Malformed multipart body"),
        }
    }

    fn upload_existing(&self, request: &HttpRequest, id: &str) -> HttpResponse {
        let Some((patch, content)) = parse_multipart(request) else {
            return error(400, "Malformed multipart body");
        };
        let mut files = self.files.lock().unwrap();
        match files.get_mut(id) {
            Some(file) => {
                merge(&mut file.metadata, patch);
                file.metadata.size = Some(content.len().to_string());
                file.content = content;
                json(&serde_json::json!({ "id": id }))
            }
            None => not_found(id),
        }
    }

    fn patch(&self, request: &HttpRequest, id: &str) -> HttpResponse {
        let Some(patch) = body::<DriveFile>(request) else {
            return error(400, "Invalid JSON payload");
        };
        let mut files = self.files.lock().unwrap();
        match files.get_mut(id) {
            Some(file) => {
                merge(&mut file.metadata, patch);
                json(&file.metadata)
            }
            None => not_found(id),
        }
    }

    fn copy(&self, request: &HttpRequest, id: &str) -> HttpResponse {
        let Some(patch) = body::<DriveFile>(request) else {
            return error(400, "Invalid JSON payload");
        };
        let Some(source) = self.file(id) else {
            return not_found(id);
        };

        let mut metadata = source.metadata;
        metadata.id = None;
        merge(&mut metadata, patch);
        let copy_id = self.insert(metadata, source.content);
        json(&self.file(&copy_id).map(|f| f.metadata))
    }

    fn delete(&self, id: &str) -> HttpResponse {
        let mut files = self.files.lock().unwrap();
        if !files.contains_key(id) {
            return not_found(id);
        }

        let mut doomed = vec![id.to_string()];
        while let Some(current) = doomed.pop() {
            files.remove(&current);
            doomed.extend(
                files
                    .iter()
                    .filter(|(_, file)| {
                        file.metadata
                            .parents
                            .as_ref()
                            .is_some_and(|parents| parents.contains(&current))
                    })
                    .map(|(child, _)| child.clone()),
            );
        }
        HttpResponse::new(204, Vec::new())
    }

    fn empty_trash(&self) -> HttpResponse {
        self.files
            .lock()
            .unwrap()
            .retain(|_, file| file.metadata.trashed != Some(true));
        HttpResponse::new(204, Vec::new())
    }

    fn list(&self) -> HttpResponse {
        let mut files: Vec<DriveFile> = self
            .files
            .lock()
            .unwrap()
            .values()
            .map(|file| file.metadata.clone())
            .collect();
        files.sort_by(|a, b| a.id.cmp(&b.id));

        json(&FileList {
            files,
            next_page_token: None,
            incomplete_search: false,
        })
    }

    fn watch(&self, request: &HttpRequest, id: &str) -> HttpResponse {
        if !self.contains(id) {
            return not_found(id);
        }
        match body::<Channel>(request) {
            Some(mut channel) => {
                channel.resource_id = Some(format!("resource-{id}"));
                channel.resource_uri = Some(format!("{API_BASE}/files/{id}"));
                channel.kind = Some("api#channel".to_string());
                json(&channel)
            }
            None => error(400, "Invalid JSON payload"),
        }
    }
}

#[async_trait]
impl HttpClient for FakeDrive {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(
                "connection refused".to_string(),
            ));
        }
        Ok(self.route(&request))
    }
}

fn merge(target: &mut DriveFile, patch: DriveFile) {
    if patch.name.is_some() {
        target.name = patch.name;
    }
    if patch.description.is_some() {
        target.description = patch.description;
    }
    if patch.mime_type.is_some() {
        target.mime_type = patch.mime_type;
    }
    if patch.parents.is_some() {
        target.parents = patch.parents;
    }
    if patch.trashed.is_some() {
        target.trashed = patch.trashed;
    }
}

fn body<T: serde::de::DeserializeOwned>(request: &HttpRequest) -> Option<T> {
    serde_json::from_slice(request.body.as_ref()?).ok()
}

fn parse_multipart(request: &HttpRequest) -> Option<(DriveFile, Vec<u8>)> {
    let boundary = request
        .header_value("Content-Type")?
        .strip_prefix("multipart/related; boundary=")?
        .to_string();
    let body = request.body.as_ref()?;

    let delimiter = format!("--{boundary}");
    let parts: Vec<&[u8]> = split(body, delimiter.as_bytes())
        .into_iter()
        .filter(|part| !part.is_empty() && !part.starts_with(b"--"))
        .collect();
    let [metadata_part, content_part] = parts.as_slice() else {
        return None;
    };

    let metadata = serde_json::from_slice(part_body(metadata_part)?).ok()?;
    Some((metadata, part_body(content_part)?.to_vec()))
}

/// Body of a MIME part: after the blank line, without the trailing CRLF
fn part_body(part: &[u8]) -> Option<&[u8]> {
    let start = find(part, b"\r\n\r\n")? + 4;
    let body = &part[start..];
    Some(body.strip_suffix(b"\r\n").unwrap_or(body))
}

fn split<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = haystack;
    while let Some(index) = find(rest, delimiter) {
        parts.push(&rest[..index]);
        rest = &rest[index + delimiter.len()..];
    }
    parts.push(rest);
    parts
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn json<T: serde::Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => HttpResponse::new(200, body),
        Err(e) => error(500, &e.to_string()),
    }
}

fn not_found(id: &str) -> HttpResponse {
    error(404, &format!("File not found: {id}."))
}

fn error(status: u16, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": { "code": status, "message": message, "errors": [] }
    });
    HttpResponse::new(status, body.to_string())
}

pub fn folder(name: &str, parent: Option<&str>) -> DriveFile {
    let folder = DriveFile::named(name).with_mime_type(FOLDER_MIME_TYPE);
    match parent {
        Some(parent) => folder.with_parent(parent),
        None => folder,
    }
}
