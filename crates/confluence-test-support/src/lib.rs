//! Shared fixtures for confluence-attach tests.

use confluence_config::Credentials;
use serde_json::{json, Value};

pub const TEST_USERNAME: &str = "bot@example.com";
pub const TEST_API_TOKEN: &str = "test-token";

/// Credentials pointing at a mock server, with a `/wiki` context path.
pub fn test_credentials(server_uri: &str) -> Credentials {
    Credentials::new(wiki_base(server_uri), TEST_USERNAME, TEST_API_TOKEN)
}

pub fn wiki_base(server_uri: &str) -> String {
    format!("{}/wiki", server_uri.trim_end_matches('/'))
}

/// Environment variables that make the CLI talk to a mock server.
pub fn test_env(server_uri: &str) -> Vec<(&'static str, String)> {
    vec![
        ("CONFLUENCE_URL", wiki_base(server_uri)),
        ("CONFLUENCE_USERNAME", TEST_USERNAME.to_string()),
        ("CONFLUENCE_API_TOKEN", TEST_API_TOKEN.to_string()),
    ]
}

/// Page payload as returned with `expand=body.storage,version`.
pub fn page_json(id: &str, title: &str, version: u64, body: &str) -> Value {
    json!({
        "id": id,
        "type": "page",
        "title": title,
        "version": { "number": version },
        "body": { "storage": { "value": body, "representation": "storage" } },
    })
}

pub fn attachment_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": "attachment",
        "title": title,
        "extensions": { "mediaType": "image/png", "fileSize": 3 },
        "_links": { "download": format!("/download/attachments/1/{title}") },
    })
}

pub fn attachment_list_json(attachments: &[(&str, &str)]) -> Value {
    let results: Vec<Value> = attachments
        .iter()
        .map(|(id, title)| attachment_json(id, title))
        .collect();
    json!({ "results": results, "size": results.len() })
}

/// PNG signature bytes, enough to stand in for an image upload.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
