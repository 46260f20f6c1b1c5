// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payload compression and change-detection fingerprints.
//!
//! Blobs are stored gzip-compressed and the catalog keeps a CRC-32 of the
//! compressed bytes. The gzip header carries no file name and a zero mtime,
//! so the same raw payload always compresses to the same bytes and digest.

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use std::io::{Read, Write};

/// A payload ready to be mirrored: compressed bytes plus their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPayload {
    pub bytes: Vec<u8>,
    pub digest: String,
}

impl CompressedPayload {
    /// Compress `raw` and fingerprint the result.
    pub fn from_raw(raw: &[u8]) -> std::io::Result<Self> {
        let bytes = compress(raw)?;
        let digest = digest(&bytes);
        Ok(Self { bytes, digest })
    }
}

/// Gzip `raw` with fixed header fields.
pub fn compress(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

/// Inflate a gzip stream.
pub fn decompress(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}

/// CRC-32 of `bytes` as eight lowercase hex digits.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(bytes))
}
