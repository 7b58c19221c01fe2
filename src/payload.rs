//! Resolve an [`AudioPayload`] to the bytes of an encoded audio file.

use std::path::Path;

use tracing::debug;

use crate::config::AudioPayload;
use crate::error::{Error, Result};

/// Read a payload: inline data URIs are decoded in place, paths are read
/// relative to `base_dir` unless absolute.
pub async fn load_payload(payload: &AudioPayload, base_dir: &Path) -> Result<Vec<u8>> {
    match payload {
        AudioPayload::Inline(uri) => parse_data_uri(uri),
        AudioPayload::Path(path) => {
            let path = base_dir.join(path);
            debug!(path = %path.display(), "reading audio file");
            tokio::fs::read(&path).await.map_err(|source| Error::Io { path, source })
        }
    }
}

/// Decode a `data:[<mime>];base64,<data>` URI.
///
/// Only base64 payloads are accepted; audio in percent-encoded form doesn't
/// occur in practice.
pub fn parse_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| Error::DataUri("missing `data:` scheme".into()))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::DataUri("missing `,` before the payload".into()))?;
    if !meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(Error::DataUri(format!("`{meta}` is not base64-encoded")));
    }

    // line breaks sneak in when lists are edited by hand
    let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::decode(data)?)
}
