use std::io::{self, Read};
use std::path::PathBuf;

use crate::error::{EmbedError, EmbedResult};

/// Where a page body is read from when working offline.
#[derive(Debug, Clone)]
pub enum BodySource {
    File(PathBuf),
    Stdin,
}

impl BodySource {
    /// `-` selects stdin, anything else is a path.
    pub fn from_arg(arg: &std::path::Path) -> Self {
        if arg == std::path::Path::new("-") {
            BodySource::Stdin
        } else {
            BodySource::File(arg.to_path_buf())
        }
    }
}

pub fn load_body(source: &BodySource) -> EmbedResult<String> {
    match source {
        BodySource::File(path) => {
            let bytes = std::fs::read(path).map_err(|source| EmbedError::ReadBody {
                path: path.clone(),
                source,
            })?;
            decode(bytes)
        }
        BodySource::Stdin => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .map_err(EmbedError::ReadStdin)?;
            decode(buffer)
        }
    }
}

fn decode(bytes: Vec<u8>) -> EmbedResult<String> {
    let mut text = String::from_utf8(bytes).map_err(|_| EmbedError::InvalidEncoding)?;
    if text.starts_with('\u{feff}') {
        text.remove(0);
    }
    Ok(text)
}
