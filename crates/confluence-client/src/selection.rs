use crate::model::Attachment;

/// Requested filenames split into attachments present on the page and
/// names with no match.
#[derive(Debug, Default)]
pub struct Selection<'a> {
    pub found: Vec<&'a Attachment>,
    pub missing: Vec<String>,
}

/// Matches `names` against attachment titles exactly, preserving the order
/// of `names`. When several attachments share a title the first one wins.
pub fn select_attachments<'a, S: AsRef<str>>(
    attachments: &'a [Attachment],
    names: &[S],
) -> Selection<'a> {
    let mut selection = Selection::default();
    for name in names {
        let name = name.as_ref();
        match attachments.iter().find(|att| att.title == name) {
            Some(att) => selection.found.push(att),
            None => selection.missing.push(name.to_string()),
        }
    }
    selection
}

/// Title under which the server stored an upload, falling back to the
/// local filename.
pub fn uploaded_title(results: &[Attachment], fallback: &str) -> String {
    results
        .first()
        .map(|att| att.title.as_str())
        .filter(|title| !title.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
