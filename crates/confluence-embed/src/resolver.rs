use crate::markup::{
    build_image_macro, heading_paragraph, ReferencePatterns, PARAGRAPH_CLOSE,
    PROCESS_DIAGRAM_MARKER,
};

/// What the caller wants embedded: an uploaded attachment plus display hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReference {
    pub filename: String,
    pub alt: String,
    pub width: Option<u32>,
    pub anchor: Option<String>,
}

impl ImageReference {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    fn width(&self) -> Option<u32> {
        self.width.filter(|w| *w > 0)
    }

    fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref().filter(|a| !a.is_empty())
    }

    fn has_display_hints(&self) -> bool {
        !self.alt.is_empty() || self.width().is_some()
    }

    pub fn to_macro(&self) -> String {
        build_image_macro(&self.filename, &self.alt, self.width())
    }
}

/// Which rule decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    AlreadyEmbedded,
    MacroUpdated,
    /// A reference exists but no complete macro element could be matched.
    MacroUnmatched,
    LegacyImageReplaced,
    AfterAnchor,
    AfterHeading,
    Prepended,
}

impl Placement {
    pub fn describe(self) -> &'static str {
        match self {
            Placement::AlreadyEmbedded => "image already embedded",
            Placement::MacroUpdated => "updated existing image macro",
            Placement::MacroUnmatched => "image referenced but macro element not recognised",
            Placement::LegacyImageReplaced => "replaced inline image tag",
            Placement::AfterAnchor => "inserted after anchor",
            Placement::AfterHeading => "inserted after process diagram heading",
            Placement::Prepended => "prepended process diagram heading",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub body: String,
    pub changed: bool,
    pub placement: Placement,
}

impl Resolution {
    fn unchanged(body: &str, placement: Placement) -> Self {
        Self {
            body: body.to_string(),
            changed: false,
            placement,
        }
    }

    fn changed(body: String, placement: Placement) -> Self {
        Self {
            body,
            changed: true,
            placement,
        }
    }

    pub fn into_parts(self) -> (String, bool) {
        (self.body, self.changed)
    }
}

/// Ensures `body` references `image` exactly once, touching only the first
/// match of any existing reference.
pub fn resolve(body: &str, image: &ImageReference) -> Resolution {
    let patterns = ReferencePatterns::new(&image.filename);
    let image_macro = image.to_macro();

    if patterns.has_macro_reference(body) {
        if !image.has_display_hints() {
            return Resolution::unchanged(body, Placement::AlreadyEmbedded);
        }
        return match patterns.find_image_macro(body) {
            Some(found) => Resolution::changed(
                splice(body, found.start()..found.end(), &image_macro),
                Placement::MacroUpdated,
            ),
            None => Resolution::unchanged(body, Placement::MacroUnmatched),
        };
    }

    if let Some(found) = patterns.find_legacy_image(body) {
        return Resolution::changed(
            splice(body, found.start()..found.end(), &image_macro),
            Placement::LegacyImageReplaced,
        );
    }

    if let Some(anchor) = image.anchor() {
        if let Some(idx) = body.find(anchor) {
            let at = idx + anchor.len();
            return Resolution::changed(insert_block(body, at, &image_macro), Placement::AfterAnchor);
        }
    }

    if let Some(at) = heading_insertion_point(body) {
        return Resolution::changed(insert_block(body, at, &image_macro), Placement::AfterHeading);
    }

    let mut prepended = heading_paragraph();
    prepended.push('\n');
    prepended.push_str(&image_macro);
    prepended.push('\n');
    prepended.push_str(body);
    Resolution::changed(prepended, Placement::Prepended)
}

fn heading_insertion_point(body: &str) -> Option<usize> {
    let marker = body.find(PROCESS_DIAGRAM_MARKER)?;
    let close = body[marker..].find(PARAGRAPH_CLOSE)?;
    Some(marker + close + PARAGRAPH_CLOSE.len())
}

fn insert_block(body: &str, at: usize, block: &str) -> String {
    let mut output = String::with_capacity(body.len() + block.len() + 2);
    output.push_str(&body[..at]);
    output.push('\n');
    output.push_str(block);
    output.push('\n');
    output.push_str(&body[at..]);
    output
}

fn splice(body: &str, range: std::ops::Range<usize>, replacement: &str) -> String {
    let mut output = String::with_capacity(body.len() + replacement.len());
    output.push_str(&body[..range.start]);
    output.push_str(replacement);
    output.push_str(&body[range.end..]);
    output
}
