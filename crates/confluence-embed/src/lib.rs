pub mod diff;
pub mod error;
pub mod fs;
pub mod markup;
pub mod resolver;
pub mod source;

pub use diff::build_unified_diff;
pub use error::{EmbedError, EmbedResult};
pub use markup::{build_image_macro, ReferencePatterns, PROCESS_DIAGRAM_MARKER};
pub use resolver::{resolve, ImageReference, Placement, Resolution};
pub use source::{load_body, BodySource};
