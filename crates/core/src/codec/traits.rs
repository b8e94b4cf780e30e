//! Bridge codec trait definitions.

/// Bridge codec trait.
///
/// Every key and value crossing the engine bridge goes through the codec.
/// The bridge only carries text, so the codec maps arbitrary byte strings
/// onto a safe string alphabet and back.
///
/// # Ordering
///
/// The engine compares range bounds and orders keys in the encoded domain,
/// so `encode_key` must be order preserving: `a < b` byte-wise if and only
/// if `encode_key(a) < encode_key(b)` character-wise.
///
/// # Codec Identity
///
/// Each codec has a unique identifier naming the wire format. Both ends of
/// the bridge must agree on it.
pub trait BridgeCodec: Send + Sync {
    /// Encode a key for transport. Total, injective and order preserving.
    fn encode_key(&self, key: &[u8]) -> String;

    /// Decode a key produced by [`encode_key`](BridgeCodec::encode_key).
    ///
    /// Fails only when the input was not produced by the encoder, which
    /// indicates a malformed bridge response.
    fn decode_key(&self, encoded: &str) -> Result<Vec<u8>, CodecError>;

    /// Encode a value for transport.
    fn encode_value(&self, value: &[u8]) -> String;

    /// Decode a value produced by [`encode_value`](BridgeCodec::encode_value)
    /// or a legacy untagged text value.
    fn decode_value(&self, encoded: &str) -> Result<Vec<u8>, CodecError>;

    /// Unique codec identifier.
    fn codec_id(&self) -> &str;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// An encoded key was not produced by the key encoder.
    #[error("Invalid key encoding: {0}")]
    InvalidKey(String),

    /// A tagged value carried a payload that could not be decoded.
    #[error("Invalid value encoding: {0}")]
    InvalidValue(String),

    /// Unknown codec identifier.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that trait is object-safe
    fn _accepts_box_dyn_codec(_codec: Box<dyn BridgeCodec>) {}

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::InvalidKey("odd length 3".to_string());
        assert_eq!(err.to_string(), "Invalid key encoding: odd length 3");

        let err = CodecError::UnknownCodec("rot13".to_string());
        assert!(err.to_string().contains("rot13"));
    }
}
