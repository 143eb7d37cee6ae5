use serde::Deserialize;

/// An attachment as listed or returned by an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub media_type: Option<String>,
    pub file_size: Option<u64>,
    pub download_link: Option<String>,
}

/// Title, current version and storage body of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub version: u64,
    pub body: String,
}

/// A full page write. `version` must be the fetched version plus one.
#[derive(Debug, Clone)]
pub struct PageUpdate {
    pub title: String,
    pub version: u64,
    pub body: String,
    pub message: String,
    pub minor_edit: bool,
}

impl PageUpdate {
    /// Keeps the title of `page` and bumps its version by one.
    pub fn next_version(page: &Page, body: String, message: &str, minor_edit: bool) -> Self {
        PageUpdate {
            title: page.title.clone(),
            version: page.version + 1,
            body,
            message: message.to_string(),
            minor_edit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub comment: Option<String>,
    pub minor_edit: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            comment: None,
            minor_edit: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttachment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    metadata: Option<RawAttachmentMetadata>,
    #[serde(default)]
    extensions: Option<RawAttachmentExtensions>,
    #[serde(default, rename = "_links")]
    links: Option<RawLinks>,
}

#[derive(Debug, Deserialize)]
struct RawAttachmentMetadata {
    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAttachmentExtensions {
    #[serde(default, rename = "mediaType")]
    media_type: Option<String>,
    #[serde(default, rename = "fileSize")]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    #[serde(default)]
    download: Option<String>,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        let (ext_media, file_size) = match raw.extensions {
            Some(ext) => (ext.media_type, ext.file_size),
            None => (None, None),
        };
        Attachment {
            id: raw.id.unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            media_type: ext_media.or_else(|| raw.metadata.and_then(|m| m.media_type)),
            file_size,
            download_link: raw.links.and_then(|links| links.download),
        }
    }
}

/// Uploads answer with either a result list or a single attachment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawAttachmentResponse {
    List { results: Vec<RawAttachment> },
    Single(RawAttachment),
}

impl RawAttachmentResponse {
    pub(crate) fn into_attachments(self) -> Vec<Attachment> {
        match self {
            RawAttachmentResponse::List { results } => {
                results.into_iter().map(Attachment::from).collect()
            }
            RawAttachmentResponse::Single(raw) => vec![Attachment::from(raw)],
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) version: Option<RawVersion>,
    #[serde(default)]
    pub(crate) body: Option<RawBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVersion {
    #[serde(default)]
    pub(crate) number: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBody {
    #[serde(default)]
    pub(crate) storage: Option<RawStorage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStorage {
    #[serde(default)]
    pub(crate) value: Option<String>,
}

impl RawPage {
    /// Validates the fields the embed workflow depends on.
    pub(crate) fn into_page(self, requested_id: &str) -> Result<Page, String> {
        let title = self.title.filter(|t| !t.is_empty()).ok_or("page has no title")?;
        let version = self
            .version
            .and_then(|v| v.number)
            .filter(|n| *n > 0)
            .ok_or("page has no positive version number")?;
        let body = self
            .body
            .and_then(|b| b.storage)
            .and_then(|s| s.value)
            .ok_or("page has no storage body")?;

        Ok(Page {
            id: self.id.unwrap_or_else(|| requested_id.to_string()),
            title,
            version: version as u64,
            body,
        })
    }
}
