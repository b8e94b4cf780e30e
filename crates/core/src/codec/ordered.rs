//! Order-preserving bridge codec.
//!
//! Keys are written as two lowercase hex digits per byte. Hex digits sort in
//! the same order as the nibbles they encode and every byte takes the same
//! width, so comparing encoded keys character by character gives the same
//! answer as comparing the raw keys byte by byte (a prefix still sorts first).
//!
//! Values are self-describing. Safe text goes over the bridge unchanged;
//! anything else is written as [`VALUE_TAG`] followed by standard base64.
//! Safe text means valid UTF-8 without NUL characters. Text that happens to
//! start with the tag is tagged too, so it cannot be mistaken for a binary
//! payload on the way back.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::traits::{BridgeCodec, CodecError};

/// Prefix marking a base64-encoded value.
pub const VALUE_TAG: &str = "__bytes__:";

/// Identifier of the ordered codec wire format.
pub const ORDERED_CODEC_ID: &str = "ordered-v1";

/// Hex keys, tagged base64 values.
///
/// # Example
///
/// ```
/// use bridgekv_core::codec::{BridgeCodec, OrderedCodec};
///
/// let codec = OrderedCodec;
///
/// assert_eq!(codec.encode_key(&[0x00, 0xff]), "00ff");
/// assert_eq!(codec.encode_value(b"hello"), "hello");
///
/// let raw = [0xc3, 0x28];
/// let encoded = codec.encode_value(&raw);
/// assert!(encoded.starts_with("__bytes__:"));
/// assert_eq!(codec.decode_value(&encoded).unwrap(), raw);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedCodec;

/// Whether `bytes` can cross the bridge as plain text.
pub fn is_safe_text(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(text) => !text.contains('\0'),
        Err(_) => false,
    }
}

impl BridgeCodec for OrderedCodec {
    fn encode_key(&self, key: &[u8]) -> String {
        hex::encode(key)
    }

    fn decode_key(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        if let Some((position, found)) = encoded
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | 'a'..='f'))
        {
            return Err(CodecError::InvalidKey(format!(
                "unexpected character {:?} at position {}",
                found, position
            )));
        }
        hex::decode(encoded).map_err(|e| CodecError::InvalidKey(e.to_string()))
    }

    fn encode_value(&self, value: &[u8]) -> String {
        if is_safe_text(value) && !value.starts_with(VALUE_TAG.as_bytes()) {
            // Safe text is valid UTF-8 by definition.
            return String::from_utf8_lossy(value).into_owned();
        }
        let mut out = String::with_capacity(VALUE_TAG.len() + value.len() * 4 / 3 + 4);
        out.push_str(VALUE_TAG);
        BASE64.encode_string(value, &mut out);
        out
    }

    fn decode_value(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        match encoded.strip_prefix(VALUE_TAG) {
            Some(payload) => BASE64
                .decode(payload)
                .map_err(|e| CodecError::InvalidValue(format!("bad base64 payload: {}", e))),
            None => Ok(encoded.as_bytes().to_vec()),
        }
    }

    fn codec_id(&self) -> &str {
        ORDERED_CODEC_ID
    }
}
