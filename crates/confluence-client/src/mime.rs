use std::path::Path;

const FALLBACK: &str = "application/octet-stream";

/// Content type sent with an upload so Confluence renders images inline.
pub fn guess_mime(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return FALLBACK;
    };
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => FALLBACK,
    }
}
