//! Immutable byte-string values.
//!
//! Every value stored or returned by a cache group is a [`ByteView`]: an
//! immutable, cheaply clonable view over a byte buffer. Holding values
//! immutable is what makes it safe to hand the same buffer to concurrent
//! readers and to count its size toward the cache budget exactly once.

use std::fmt;

use bytes::Bytes;

/// An immutable view over a cached value.
///
/// Clones share the underlying buffer. All accessors return either copies
/// or further immutable views, so no caller can mutate cached data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Length of the value in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the value out into an owned vector.
    ///
    /// The copy is the caller's to mutate; the view is unaffected.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// A zero-copy handle to the underlying buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { data: Bytes::from(data) }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        Self { data: Bytes::copy_from_slice(data) }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        Self { data: Bytes::copy_from_slice(data.as_bytes()) }
    }
}

impl From<String> for ByteView {
    fn from(data: String) -> Self {
        Self { data: Bytes::from(data.into_bytes()) }
    }
}

impl fmt::Display for ByteView {
    /// Renders the value as UTF-8, with replacement characters for
    /// invalid sequences.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}
