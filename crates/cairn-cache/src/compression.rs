//! Compression codecs for stored values.

use cairn_core::cache::CompressionType;
use cairn_core::{Error, Result};
use std::io::{Read, Write};

/// Encode a serialized value with `algorithm`. `None` copies the input.
pub fn compress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => compress_zstd(data),
        CompressionType::Gzip => compress_gzip(data),
        CompressionType::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
    }
}

/// Reverse [`compress`]. Fails with `Error::Compression` on a damaged frame.
pub fn decompress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => decompress_zstd(data),
        CompressionType::Gzip => decompress_gzip(data),
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| Error::Compression(format!("LZ4 decompression failed: {}", e))),
    }
}

fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::encode_all(data, 3)
        .map_err(|e| Error::Compression(format!("Zstd compression failed: {}", e)))
}

fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::stream::decode_all(data)
        .map_err(|e| Error::Compression(format!("Zstd decompression failed: {}", e)))
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(format!("Gzip write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(format!("Gzip finish failed: {}", e)))
}

fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Compression(format!("Gzip read failed: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repetitive() -> Vec<u8> {
        br#"{"tile":"grass","walkable":true}"#.repeat(64)
    }

    #[test]
    fn test_codecs_shrink_repetitive_payloads() {
        let data = repetitive();
        for algorithm in [CompressionType::Zstd, CompressionType::Gzip, CompressionType::Lz4] {
            let compressed = compress(&data, algorithm).unwrap();
            assert!(compressed.len() < data.len(), "{:?} did not shrink", algorithm);
            assert_eq!(decompress(&compressed, algorithm).unwrap(), data);
        }
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        let garbage = b"definitely not a compressed stream";
        assert!(decompress(garbage, CompressionType::Gzip).is_err());
        assert!(decompress(garbage, CompressionType::Zstd).is_err());
    }
}
