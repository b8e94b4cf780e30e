//! Bridge codec.
//!
//! The engine bridge only transports text. The codec turns arbitrary byte
//! strings into strings that survive the transport and back, keeping key
//! order intact so range scans evaluated by the engine on encoded keys see
//! the same order the caller does.
//!
//! There is a single wire format, [`OrderedCodec`] (`"ordered-v1"`).
//!
//! # Usage
//!
//! ```ignore
//! use bridgekv_core::codec::{get_codec, BridgeCodec};
//!
//! let codec = get_codec("ordered-v1")?;
//! let key = codec.encode_key(b"user:1");
//! let value = codec.encode_value(&[0xde, 0xad]);
//!
//! assert_eq!(codec.decode_key(&key)?, b"user:1");
//! ```

mod ordered;
mod traits;

pub use ordered::{is_safe_text, OrderedCodec, ORDERED_CODEC_ID, VALUE_TAG};
pub use traits::{BridgeCodec, CodecError};

/// Codec used when no codec is configured.
pub const DEFAULT_CODEC_ID: &str = ORDERED_CODEC_ID;

/// Get a codec by its identifier.
///
/// # Known Codecs
///
/// - `"ordered-v1"`: hex keys, tagged base64 values
pub fn get_codec(codec_id: &str) -> Result<Box<dyn BridgeCodec>, CodecError> {
    match codec_id {
        ORDERED_CODEC_ID => Ok(Box::new(OrderedCodec)),
        _ => Err(CodecError::UnknownCodec(codec_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_ordered_codec() {
        let codec = get_codec("ordered-v1").unwrap();
        assert_eq!(codec.codec_id(), "ordered-v1");
    }

    #[test]
    fn test_default_codec_resolves() {
        assert!(get_codec(DEFAULT_CODEC_ID).is_ok());
    }

    #[test]
    fn test_get_unknown_codec() {
        let result = get_codec("unknown");
        assert!(matches!(result, Err(CodecError::UnknownCodec(_))));
    }
}
