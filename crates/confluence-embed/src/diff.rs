use similar::TextDiff;

/// Line diff between two page bodies, `None` when they are identical.
pub fn build_unified_diff(original: &str, modified: &str, label: &str) -> Option<String> {
    if original == modified {
        return None;
    }

    let diff = TextDiff::from_lines(original, modified);
    let header_old = format!("a/{label}");
    let header_new = format!("b/{label}");

    let rendered = diff
        .unified_diff()
        .context_radius(2)
        .header(&header_old, &header_new)
        .to_string();

    Some(rendered)
}
