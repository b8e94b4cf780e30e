//! Decoded keys and values handed back to callers
//!
//! The store always moves raw bytes across its own API. When a caller asks
//! for text instead of bytes (`as_bytes = false`), the decoded bytes are
//! reinterpreted as UTF-8; sequences that are not valid UTF-8 are replaced
//! with U+FFFD, so callers storing binary data should read it as bytes.

use std::fmt;

use bytes::Bytes;

/// A key or value returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    /// Raw bytes, exactly as written
    Bytes(Bytes),
    /// Bytes reinterpreted as text
    Text(String),
}

impl Payload {
    /// Build a payload from decoded bytes in the requested representation
    pub fn from_decoded(bytes: Vec<u8>, as_bytes: bool) -> Self {
        if as_bytes {
            return Payload::Bytes(Bytes::from(bytes));
        }
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    /// View the payload as bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Bytes(b) => b.as_ref(),
            Payload::Text(s) => s.as_bytes(),
        }
    }

    /// Text view, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s.as_str()),
            Payload::Bytes(_) => None,
        }
    }

    /// Whether this payload was returned as text
    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    /// Convert into bytes
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Bytes(b) => b,
            Payload::Text(s) => Bytes::from(s),
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(v))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(s) => f.write_str(s),
            Payload::Bytes(b) => write!(f, "{:?}", b),
        }
    }
}

/// One entry yielded by an iterator.
///
/// `key` is `None` when the iterator was created without keys, `value` is
/// `None` when it was created without values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    /// Entry key
    pub key: Option<Payload>,
    /// Entry value
    pub value: Option<Payload>,
}

impl Entry {
    /// Key bytes, if keys were requested
    pub fn key_bytes(&self) -> Option<&[u8]> {
        self.key.as_ref().map(Payload::as_bytes)
    }

    /// Value bytes, if values were requested
    pub fn value_bytes(&self) -> Option<&[u8]> {
        self.value.as_ref().map(Payload::as_bytes)
    }
}
