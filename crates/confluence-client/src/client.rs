use std::path::Path;
use std::time::Duration;

use confluence_config::Credentials;
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::mime::guess_mime;
use crate::model::{
    Attachment, Page, PageUpdate, RawAttachmentResponse, RawPage, UploadOptions,
};

const ERROR_BODY_LIMIT: usize = 500;
const ATTACHMENT_PAGE_LIMIT: &str = "200";

/// The content API the attachment tools rely on.
pub trait ContentApi {
    /// Creates or updates the attachment named after `file` on `page_id`.
    fn upload_attachment(
        &self,
        page_id: &str,
        file: &Path,
        options: &UploadOptions,
    ) -> ClientResult<Vec<Attachment>>;

    fn fetch_page(&self, page_id: &str) -> ClientResult<Page>;

    fn update_page(&self, page_id: &str, update: &PageUpdate) -> ClientResult<()>;

    fn list_attachments(&self, page_id: &str) -> ClientResult<Vec<Attachment>>;

    /// Accepts both `att123` and bare numeric identifiers.
    fn delete_attachment(&self, attachment_id: &str) -> ClientResult<()>;

    fn download_attachment(&self, page_id: &str, filename: &str) -> ClientResult<Vec<u8>>;
}

pub struct ConfluenceClient {
    http: HttpClient,
    credentials: Credentials,
    base: Url,
}

impl ConfluenceClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> ClientResult<Self> {
        let base = Url::parse(&credentials.base_url).map_err(|err| ClientError::InvalidUrl {
            url: credentials.base_url.clone(),
            reason: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: credentials.base_url.clone(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            credentials,
            base,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn content_url(&self, tail: &[&str]) -> Url {
        let mut segments = vec!["rest", "api", "content"];
        segments.extend_from_slice(tail);
        self.endpoint(&segments)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        debug!(%method, %url, "confluence request");
        self.http
            .request(method, url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_token))
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> ClientResult<HttpResponse> {
        let response = request.send().map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), %url, "confluence response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: truncate_text(body.trim(), ERROR_BODY_LIMIT),
            });
        }
        Ok(response)
    }

    fn read_json<T: DeserializeOwned>(response: HttpResponse, url: &Url) -> ClientResult<T> {
        response
            .json::<T>()
            .map_err(|err| ClientError::UnexpectedResponse {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

impl ContentApi for ConfluenceClient {
    fn upload_attachment(
        &self,
        page_id: &str,
        file: &Path,
        options: &UploadOptions,
    ) -> ClientResult<Vec<Attachment>> {
        if !file.is_file() {
            return Err(ClientError::FileNotFound(file.to_path_buf()));
        }
        let bytes = std::fs::read(file).map_err(|source| ClientError::ReadFile {
            path: file.to_path_buf(),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let mime = guess_mime(file);

        let url = self.content_url(&[page_id, "child", "attachment"]);
        let part = MultipartPart::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime)
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        let mut form = MultipartForm::new()
            .part("file", part)
            .text("minorEdit", if options.minor_edit { "true" } else { "false" });
        if let Some(comment) = options.comment.as_deref().filter(|c| !c.is_empty()) {
            form = form.text("comment", comment.to_string());
        }

        let request = self
            .request(Method::PUT, &url)
            .header("X-Atlassian-Token", "nocheck")
            .multipart(form);
        let response = self.send(request, &url)?;
        let parsed: RawAttachmentResponse = Self::read_json(response, &url)?;
        let attachments = parsed.into_attachments();

        info!(page_id, file = %file_name, mime, stored = attachments.len(), "attachment uploaded");
        Ok(attachments)
    }

    fn fetch_page(&self, page_id: &str) -> ClientResult<Page> {
        let mut url = self.content_url(&[page_id]);
        url.query_pairs_mut()
            .append_pair("expand", "body.storage,version");

        let response = self.send(self.request(Method::GET, &url), &url)?;
        let raw: RawPage = Self::read_json(response, &url)?;
        let page = raw
            .into_page(page_id)
            .map_err(|message| ClientError::UnexpectedResponse {
                url: url.to_string(),
                message,
            })?;

        debug!(page_id, version = page.version, bytes = page.body.len(), "page fetched");
        Ok(page)
    }

    fn update_page(&self, page_id: &str, update: &PageUpdate) -> ClientResult<()> {
        let url = self.content_url(&[page_id]);
        let payload = json!({
            "id": page_id,
            "type": "page",
            "title": update.title,
            "version": {
                "number": update.version,
                "minorEdit": update.minor_edit,
                "message": update.message,
            },
            "body": {
                "storage": {
                    "value": update.body,
                    "representation": "storage",
                }
            },
        });

        self.send(self.request(Method::PUT, &url).json(&payload), &url)?;
        info!(page_id, version = update.version, "page updated");
        Ok(())
    }

    fn list_attachments(&self, page_id: &str) -> ClientResult<Vec<Attachment>> {
        let mut url = self.content_url(&[page_id, "child", "attachment"]);
        url.query_pairs_mut()
            .append_pair("limit", ATTACHMENT_PAGE_LIMIT);

        let response = self.send(self.request(Method::GET, &url), &url)?;
        let parsed: RawAttachmentResponse = Self::read_json(response, &url)?;
        Ok(parsed.into_attachments())
    }

    fn delete_attachment(&self, attachment_id: &str) -> ClientResult<()> {
        let id = normalize_attachment_id(attachment_id);
        let mut url = self.content_url(&[id]);
        url.query_pairs_mut().append_pair("status", "current");

        self.send(self.request(Method::DELETE, &url), &url)?;
        info!(attachment_id = id, "attachment deleted");
        Ok(())
    }

    fn download_attachment(&self, page_id: &str, filename: &str) -> ClientResult<Vec<u8>> {
        let url = self.endpoint(&["download", "attachments", page_id, filename]);

        let response = self.send(self.request(Method::GET, &url), &url)?;
        let bytes = response
            .bytes()
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

fn normalize_attachment_id(id: &str) -> &str {
    id.strip_prefix("att").unwrap_or(id)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
