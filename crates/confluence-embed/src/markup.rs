//! Storage-markup fragments for the image macro and the patterns that
//! recognise existing references to an attachment.

use regex::{Regex, RegexBuilder};

/// Literal bold marker used both as an insertion point and as generated text.
pub const PROCESS_DIAGRAM_MARKER: &str = "<strong>Process diagram</strong>";

pub(crate) const PARAGRAPH_CLOSE: &str = "</p>";

/// Builds a self-contained image macro referencing `filename`.
///
/// `alt` is emitted only when non-empty and `width` only when positive,
/// alt first.
pub fn build_image_macro(filename: &str, alt: &str, width: Option<u32>) -> String {
    let mut attrs = String::new();
    if !alt.is_empty() {
        attrs.push_str(&format!(" ac:alt=\"{}\"", escape_attr(alt)));
    }
    if let Some(width) = width.filter(|w| *w > 0) {
        attrs.push_str(&format!(" ac:width=\"{width}\""));
    }

    format!(
        "<ac:image{attrs}><ri:attachment ri:filename=\"{}\" /></ac:image>",
        escape_attr(filename)
    )
}

/// Paragraph generated in front of the body when no insertion point exists.
pub fn heading_paragraph() -> String {
    format!("<p>{PROCESS_DIAGRAM_MARKER}</p>")
}

/// Escapes a value for use inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Compiled patterns for a single attachment filename.
///
/// Element and attribute names match case-insensitively; the filename itself
/// is compared exactly in either quote style.
#[derive(Debug, Clone)]
pub struct ReferencePatterns {
    filename_attr: Regex,
    image_macro: Regex,
    legacy_image: Regex,
}

impl ReferencePatterns {
    pub fn new(filename: &str) -> Self {
        let quoted = quoted_value(filename);

        let filename_attr = format!(r"\bri:filename\s*=\s*{quoted}");
        let image_macro = format!(
            r"<ac:image\b[^>]*?>\s*<ri:attachment\b[^>]*?\bri:filename\s*=\s*{quoted}[^>]*?(?:/>|>\s*</ri:attachment\s*>)\s*</ac:image\s*>"
        );
        let legacy_image =
            format!(r"(?:<p>\s*)?<img\b[^>]*?\bsrc\s*=\s*{quoted}[^>]*?/?>\s*(?:</p>)?");

        Self {
            filename_attr: compile(&filename_attr),
            image_macro: compile(&image_macro),
            legacy_image: compile(&legacy_image),
        }
    }

    /// Loose check: any `ri:filename` attribute naming the file.
    pub fn has_macro_reference(&self, body: &str) -> bool {
        self.filename_attr.is_match(body)
    }

    /// The first complete `<ac:image>` element wrapping the attachment.
    pub fn find_image_macro<'b>(&self, body: &'b str) -> Option<regex::Match<'b>> {
        self.image_macro.find(body)
    }

    /// The first `<img src=..>` tag for the file, with its paragraph if any.
    pub fn find_legacy_image<'b>(&self, body: &'b str) -> Option<regex::Match<'b>> {
        self.legacy_image.find(body)
    }
}

fn quoted_value(filename: &str) -> String {
    let stored = regex::escape(&escape_attr(filename));
    format!(r#"(?-i:"{stored}"|'{stored}')"#)
}

fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("escaped filename always yields a valid pattern")
}
