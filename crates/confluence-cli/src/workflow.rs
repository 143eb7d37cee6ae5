use std::path::{Path, PathBuf};

use confluence_client::{uploaded_title, ClientError, ContentApi, PageUpdate, UploadOptions};
use confluence_embed::{build_unified_diff, resolve, ImageReference, Placement};
use thiserror::Error;
use tracing::info;

/// Everything `embed` needs besides the API handle.
#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub page_id: String,
    pub image: PathBuf,
    pub alt: String,
    pub width: Option<u32>,
    pub anchor: Option<String>,
    pub comment: Option<String>,
    pub message: String,
    pub minor_edit: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStatus {
    /// The body already references the image; nothing was written.
    Skipped,
    DryRun,
    Updated { version: u64 },
}

#[derive(Debug)]
pub struct EmbedReport {
    pub status: EmbedStatus,
    pub placement: Placement,
    pub diff: Option<String>,
}

/// Each variant's message is what the CLI prints before exiting with 1.
#[derive(Debug, Error)]
pub enum EmbedFailure {
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Upload failed: {0}")]
    Upload(#[source] ClientError),
    #[error("Fetch page failed: {0}")]
    Fetch(#[source] ClientError),
    #[error("Update page failed: {0}")]
    Update(#[source] ClientError),
}

/// Uploads the image and returns the title the server stored it under.
pub fn upload_image<A: ContentApi + ?Sized>(
    api: &A,
    request: &EmbedRequest,
) -> Result<String, EmbedFailure> {
    if !request.image.is_file() {
        return Err(EmbedFailure::MissingFile(request.image.clone()));
    }

    let options = UploadOptions {
        comment: request.comment.clone(),
        minor_edit: request.minor_edit,
    };
    let stored = api
        .upload_attachment(&request.page_id, &request.image, &options)
        .map_err(EmbedFailure::Upload)?;

    Ok(uploaded_title(&stored, &local_name(&request.image)))
}

/// Fetches the page, embeds `filename` and writes the page back when the
/// body changed, using the fetched version plus one.
pub fn embed_uploaded<A: ContentApi + ?Sized>(
    api: &A,
    request: &EmbedRequest,
    filename: &str,
) -> Result<EmbedReport, EmbedFailure> {
    let page = api.fetch_page(&request.page_id).map_err(EmbedFailure::Fetch)?;

    let image = ImageReference {
        filename: filename.to_string(),
        alt: request.alt.clone(),
        width: request.width,
        anchor: request.anchor.clone(),
    };
    let resolution = resolve(&page.body, &image);
    info!(
        page_id = %request.page_id,
        placement = resolution.placement.describe(),
        changed = resolution.changed,
        "resolved image embedding"
    );

    if !resolution.changed {
        return Ok(EmbedReport {
            status: EmbedStatus::Skipped,
            placement: resolution.placement,
            diff: None,
        });
    }

    let diff = build_unified_diff(
        &page.body,
        &resolution.body,
        &format!("page-{}.storage", request.page_id),
    );

    if request.dry_run {
        return Ok(EmbedReport {
            status: EmbedStatus::DryRun,
            placement: resolution.placement,
            diff,
        });
    }

    let update = PageUpdate::next_version(
        &page,
        resolution.body,
        &request.message,
        request.minor_edit,
    );
    api.update_page(&request.page_id, &update)
        .map_err(EmbedFailure::Update)?;

    Ok(EmbedReport {
        status: EmbedStatus::Updated {
            version: update.version,
        },
        placement: resolution.placement,
        diff,
    })
}

pub fn local_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
