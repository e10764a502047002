//! Fetching raw bytes for bulk loads from a URL or a local path.

use flate2::read::GzDecoder;
use log::info;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn download(location: &str) -> Result<Vec<u8>> {

    let fetch_error = |reason: String| Error::Fetch { location: location.to_string(), reason };

    info!("Downloading {}", location);

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let response = client
        .get(location)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_error(e.to_string()))?;

    let bytes = response.bytes().map_err(|e| fetch_error(e.to_string()))?;
    info!("Download complete, {} bytes.", bytes.len());
    return Ok(bytes.to_vec());
}

/// Reads `http://`/`https://` locations over the network, `file://` locations
/// and plain paths from disk. For operator supplied locations only.
pub fn fetch(location: &str) -> Result<Vec<u8>> {

    if is_remote(location) {
        return download(location);
    }

    if location.contains("://") && !location.starts_with("file://") {
        return Err(Error::Fetch { location: location.to_string(), reason: "unsupported scheme".to_string() });
    }

    let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
    std::fs::read(path).map_err(|e| Error::Fetch { location: location.to_string(), reason: e.to_string() })
}

/// Like [`fetch`] but refuses anything other than `http://`/`https://`, so a
/// client supplied location never reaches the local filesystem.
pub fn fetch_remote(location: &str) -> Result<Vec<u8>> {

    match is_remote(location) {
        true => download(location),
        false => Err(Error::UnsupportedLocation(location.to_string())),
    }
}

/// Gunzips `bytes` if they start with the gzip magic number, otherwise hands
/// them back unchanged.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {

    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }

    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    return Ok(out);
}

/// Last path segment of a location, without any query string.
pub fn file_name(location: &str) -> &str {

    let trimmed = location.split(&['?', '#'][..]).next().unwrap_or(location);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
