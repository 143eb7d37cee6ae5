//! Blocking REST client for the handful of Confluence endpoints the
//! attachment tools need. Every call is a single attempt; failures surface
//! as [`ClientError`].

mod client;
pub mod error;
pub mod mime;
pub mod model;
pub mod selection;

pub use client::{ConfluenceClient, ContentApi};
pub use error::{ClientError, ClientResult};
pub use model::{Attachment, Page, PageUpdate, UploadOptions};
pub use selection::{select_attachments, uploaded_title, Selection};
