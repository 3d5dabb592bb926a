//! Transparent payload compression
//!
//! Payloads below the configured threshold are stored as-is. Larger payloads
//! are wrapped in a small frame:
//!
//! ```text
//! magic (4) | format version (1) | codec (1) | crc32c of plain bytes (4, LE)
//! | plain length (8, LE) | compressed body
//! ```
//!
//! Plain payloads are JSON objects and therefore never start with the frame
//! magic, so readers can tell the two apart without any side channel.

use crate::config::{Codec, CompressionConfig};
use crate::errors::{CacheError, RecoveryHint, Result};
use crc32c::crc32c;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::borrow::Cow;
use std::io::{Read, Write};

/// Frame magic: 0xC5 followed by "RGZ"
pub const FRAME_MAGIC: [u8; 4] = [0xC5, b'R', b'G', b'Z'];

/// Current frame format version
pub const FRAME_VERSION: u8 = 1;

/// Size of the frame header in bytes
pub const FRAME_HEADER_LEN: usize = 4 + 1 + 1 + 4 + 8;

/// Compress `plain` if the configuration asks for it.
///
/// Returns the plain bytes unchanged when compression is disabled, the payload
/// is below the threshold, or compressing would not make it smaller.
pub fn encode<'a>(plain: &'a [u8], config: &CompressionConfig) -> Result<Cow<'a, [u8]>> {
    if !config.should_compress(plain.len()) {
        return Ok(Cow::Borrowed(plain));
    }

    let body = compress(plain, config.codec, config.level)?;
    if body.len() + FRAME_HEADER_LEN >= plain.len() {
        return Ok(Cow::Borrowed(plain));
    }

    let mut framed = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    framed.extend_from_slice(&FRAME_MAGIC);
    framed.push(FRAME_VERSION);
    framed.push(config.codec.tag());
    framed.extend_from_slice(&crc32c(plain).to_le_bytes());
    framed.extend_from_slice(&(plain.len() as u64).to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(Cow::Owned(framed))
}

/// Whether `bytes` carry a compression frame
pub fn is_framed(bytes: &[u8]) -> bool {
    bytes.len() >= FRAME_MAGIC.len() && bytes[..FRAME_MAGIC.len()] == FRAME_MAGIC
}

/// Undo [`encode`]. Plain payloads are returned borrowed.
pub fn decode<'a>(key: &str, bytes: &'a [u8]) -> Result<Cow<'a, [u8]>> {
    if !is_framed(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }

    if bytes.len() < FRAME_HEADER_LEN {
        return Err(CacheError::corruption(key, "truncated compression frame"));
    }

    let version = bytes[4];
    if version > FRAME_VERSION {
        return Err(CacheError::Corruption {
            key: key.to_string(),
            reason: format!("unsupported frame version {version}"),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Upgrade rolegate to read this cache format".to_string(),
            },
        });
    }

    let codec = Codec::from_tag(bytes[5]).ok_or_else(|| {
        CacheError::corruption(key, format!("unknown codec tag {}", bytes[5]))
    })?;

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&bytes[6..10]);
    let expected_crc = u32::from_le_bytes(crc_bytes);

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[10..18]);
    let expected_len = u64::from_le_bytes(len_bytes);

    let plain = decompress(&bytes[FRAME_HEADER_LEN..], codec)?;

    if plain.len() as u64 != expected_len {
        return Err(CacheError::corruption(
            key,
            format!(
                "length mismatch: expected {expected_len} bytes, got {}",
                plain.len()
            ),
        ));
    }

    let actual_crc = crc32c(&plain);
    if actual_crc != expected_crc {
        return Err(CacheError::corruption(
            key,
            format!("checksum mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"),
        ));
    }

    Ok(Cow::Owned(plain))
}

/// Length of `plain` once compressed with `codec` at its default level, frame included
pub(crate) fn compressed_len(plain: &[u8], codec: Codec) -> Result<usize> {
    Ok(FRAME_HEADER_LEN + compress(plain, codec, codec.default_level())?.len())
}

fn compress(plain: &[u8], codec: Codec, level: i32) -> Result<Vec<u8>> {
    match codec {
        Codec::Gzip => {
            let level = level.clamp(0, 9) as u32;
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(plain)
                .and_then(|()| encoder.finish())
                .map_err(|e| compression_error("gzip encode", e))
        }
        Codec::Zstd => zstd::stream::encode_all(plain, level)
            .map_err(|e| compression_error("zstd encode", e)),
    }
}

fn decompress(body: &[u8], codec: Codec) -> Result<Vec<u8>> {
    match codec {
        Codec::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| compression_error("gzip decode", e))?;
            Ok(out)
        }
        Codec::Zstd => {
            zstd::stream::decode_all(body).map_err(|e| compression_error("zstd decode", e))
        }
    }
}

fn compression_error(operation: &'static str, source: std::io::Error) -> CacheError {
    CacheError::Compression {
        operation,
        source: Box::new(source),
        recovery_hint: RecoveryHint::ClearAndRetry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(len: usize) -> Vec<u8> {
        let mut json = String::from("{\"granted\":[");
        while json.len() < len {
            json.push_str("\"trademark.read\",");
        }
        json.push_str("\"end\"]}");
        json.into_bytes()
    }

    #[test]
    fn test_small_payload_is_not_framed() {
        let plain = br#"{"user_id":1}"#;
        let config = CompressionConfig::enabled(Codec::Gzip);
        let encoded = encode(plain, &config).unwrap();
        assert!(matches!(encoded, Cow::Borrowed(_)));
        assert!(!is_framed(&encoded));
    }

    #[test]
    fn test_gzip_roundtrip_is_transparent() {
        let plain = sample(4096);
        let config = CompressionConfig::enabled(Codec::Gzip);
        let encoded = encode(&plain, &config).unwrap();
        assert!(is_framed(&encoded));
        assert!(encoded.len() < plain.len());

        let decoded = decode("k", &encoded).unwrap();
        assert_eq!(decoded.as_ref(), plain.as_slice());
    }

    #[test]
    fn test_zstd_roundtrip_is_transparent() {
        let plain = sample(4096);
        let config = CompressionConfig::enabled(Codec::Zstd);
        let encoded = encode(&plain, &config).unwrap();
        assert!(is_framed(&encoded));
        assert_eq!(decode("k", &encoded).unwrap().as_ref(), plain.as_slice());
    }

    #[test]
    fn test_disabled_compression_passes_through() {
        let plain = sample(4096);
        let encoded = encode(&plain, &CompressionConfig::default()).unwrap();
        assert_eq!(encoded.as_ref(), plain.as_slice());
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let plain = sample(4096);
        let config = CompressionConfig::enabled(Codec::Gzip);
        let mut encoded = encode(&plain, &config).unwrap().into_owned();
        encoded[6] ^= 0xFF;

        let err = decode("user:permissions:1", &encoded).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_truncated_frame_is_corruption() {
        let err = decode("k", &FRAME_MAGIC).unwrap_err();
        assert!(matches!(err, CacheError::Corruption { .. }));
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(body in "[a-z:,\" ]{0,3000}", zstd in any::<bool>()) {
            let plain = format!("{{{body}}}").into_bytes();
            let codec = if zstd { Codec::Zstd } else { Codec::Gzip };
            let config = CompressionConfig { min_size: 64, ..CompressionConfig::enabled(codec) };
            let encoded = encode(&plain, &config).unwrap();
            prop_assert!(encoded.len() <= plain.len());
            let decoded = decode("k", &encoded).unwrap();
            prop_assert_eq!(decoded.as_ref(), plain.as_slice());
        }
    }
}
