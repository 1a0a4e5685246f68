use std::{fmt, ops::Range};

use serde::{Deserialize, Serialize};

/// A half-open range of bytes `[from_index, to_index)` within a buffer.
///
/// Used both for the parts of a request which must be hidden from the witness
/// and for the parts of a response which are revealed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    /// Start of the range, inclusive.
    pub from_index: usize,
    /// End of the range, exclusive.
    pub to_index: usize,
}

impl ByteRange {
    /// Creates a new byte range.
    ///
    /// # Panics
    ///
    /// Panics if `from_index > to_index`.
    pub fn new(from_index: usize, to_index: usize) -> Self {
        assert!(
            from_index <= to_index,
            "range start must not exceed its end: {from_index} > {to_index}"
        );

        Self {
            from_index,
            to_index,
        }
    }

    /// Returns the number of bytes in the range.
    pub fn len(&self) -> usize {
        self.to_index - self.from_index
    }

    /// Returns `true` if the range contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.from_index >= self.to_index
    }

    /// Returns `true` if `other` shares at least one byte with this range.
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.from_index < other.to_index && other.from_index < self.to_index
    }

    /// Returns the range as a [`Range`].
    pub fn as_range(&self) -> Range<usize> {
        self.from_index..self.to_index
    }

    /// Checks that the range is well formed and fits within a buffer of
    /// length `len`.
    pub fn check(&self, len: usize) -> Result<(), InvalidByteRange> {
        if self.from_index > self.to_index || self.to_index > len {
            return Err(InvalidByteRange {
                range: *self,
                len,
            });
        }

        Ok(())
    }
}

impl From<Range<usize>> for ByteRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Self {
        range.as_range()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from_index, self.to_index)
    }
}

/// Error for a [`ByteRange`] which does not fit its buffer.
#[derive(Debug, thiserror::Error)]
#[error("invalid byte range {range} for buffer of length {len}")]
pub struct InvalidByteRange {
    range: ByteRange,
    len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_bounds() {
        assert!(ByteRange::new(0, 4).check(4).is_ok());
        assert!(ByteRange::new(2, 5).check(4).is_err());
        assert!(ByteRange::new(4, 4).check(4).is_ok());
    }

    #[test]
    fn test_overlaps() {
        let a = ByteRange::new(0, 4);
        assert!(a.overlaps(&ByteRange::new(3, 6)));
        assert!(!a.overlaps(&ByteRange::new(4, 6)));
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_string(&ByteRange::new(1, 2)).unwrap();
        assert_eq!(json, r#"{"fromIndex":1,"toIndex":2}"#);
    }
}
