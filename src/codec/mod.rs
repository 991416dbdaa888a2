//! Binary Codec
//!
//! Turns image bytes into self-describing `data:<mime>;base64,<payload>` strings
//! that can be stored as text and used directly as an image source.

pub mod fetch;

pub use fetch::{HttpFetcher, ImageFetcher};

use crate::error::CodecError;
use crate::types::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::path::Path;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Identifier prefixes that denote a directly usable URL rather than a stored image key
const URL_SCHEMES: [&str; 5] = ["http://", "https://", "data:", "blob:", "file://"];

/// Bytes held in memory with an optional declared MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Blob {
    pub fn new(bytes: Vec<u8>, mime: Option<String>) -> Self {
        Self { bytes, mime }
    }

    /// Declared MIME type (parameters stripped), else sniffed, else octet-stream.
    pub fn resolved_mime(&self) -> String {
        self.mime
            .as_deref()
            .map(|m| m.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty() && m != FALLBACK_MIME)
            .or_else(|| sniff_mime(&self.bytes).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string())
    }
}

/// Decoded form of an encoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// True when `key` is a URL to use verbatim rather than a stored image key.
pub fn is_url(key: &str) -> bool {
    let key = key.as_bytes();
    URL_SCHEMES.iter().any(|scheme| {
        key.len() >= scheme.len() && key[..scheme.len()].eq_ignore_ascii_case(scheme.as_bytes())
    })
}

/// Encode raw bytes as a data URI.
pub fn encode_bytes(mime: &str, bytes: &[u8]) -> EncodedImage {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Encode an in-memory blob.
pub fn encode_blob(blob: &Blob) -> EncodedImage {
    encode_bytes(&blob.resolved_mime(), &blob.bytes)
}

/// Read a file fully and encode it.
pub async fn encode_file(path: &Path) -> Result<EncodedImage, CodecError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        CodecError::DecodeFailed(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let mime = mime_from_extension(path).map(str::to_string);
    Ok(encode_blob(&Blob::new(bytes, mime)))
}

/// Fetch a remote resource and encode it. No retry.
pub async fn encode_url(fetcher: &dyn ImageFetcher, url: &str) -> Result<EncodedImage, CodecError> {
    let blob = fetcher.fetch(url).await?;
    Ok(encode_blob(&blob))
}

/// Split a base64 data URI back into MIME type and bytes.
pub fn decode_data_uri(encoded: &str) -> Result<DecodedImage, CodecError> {
    let rest = encoded
        .strip_prefix("data:")
        .ok_or_else(|| CodecError::DecodeFailed("Not a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| CodecError::DecodeFailed("Data URI has no payload separator".to_string()))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| CodecError::DecodeFailed("Only base64 data URIs are supported".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CodecError::DecodeFailed(format!("Invalid base64 payload: {}", e)))?;
    Ok(DecodedImage {
        mime: if mime.is_empty() {
            FALLBACK_MIME.to_string()
        } else {
            mime.to_string()
        },
        bytes,
    })
}

/// MIME type implied by a file extension
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

/// MIME type from magic bytes
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        Some("image/tiff")
    } else {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
        let head = head.trim_start();
        if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
            Some("image/svg+xml")
        } else {
            None
        }
    }
}
