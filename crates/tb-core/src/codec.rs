//! Compact string encoding for persisted payloads
//!
//! A payload is the JSON text of a value, zlib-compressed and encoded with
//! standard base64 so it survives string-only storage areas. Decoding accepts
//! any conforming zlib stream, whatever compression level produced it.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;

/// Error type for payload encoding.
#[derive(Debug, thiserror::Error)]
#[error("Failed to compress payload: {0}")]
pub struct CompressError(#[from] io::Error);

/// Error type for payload decoding.
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid zlib stream: {0}")]
    Inflate(#[from] io::Error),
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a value into its compact string form.
pub fn compress(value: &Value) -> Result<String, CompressError> {
    let json = value.to_string();
    let bytes = deflate(Vec::with_capacity(json.len() / 2), json.as_bytes())?;
    Ok(STANDARD.encode(bytes))
}

/// Decode a string produced by [`compress`].
pub fn decompress(encoded: &str) -> Result<Value, DecompressError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    let mut json = Vec::with_capacity(bytes.len() * 4);
    ZlibDecoder::new(bytes.as_slice()).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

fn deflate<W: Write>(sink: W, data: &[u8]) -> io::Result<W> {
    let mut encoder = ZlibEncoder::new(sink, Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}
