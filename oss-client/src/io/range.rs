/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use crate::error::{self, Error};

/// A parsed `Range: bytes=...` header value.
///
/// `start` and `end` are inclusive byte positions as written in the header. For a suffix
/// range (`bytes=-n`) only `end` is set and holds `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Whether a start position was given
    pub has_start: bool,
    /// Whether an end position (or suffix length) was given
    pub has_end: bool,
    /// First byte, when `has_start`
    pub start: u64,
    /// Last byte, or the suffix length when only `has_end`
    pub end: u64,
}

impl ByteRange {
    /// Parse `bytes=a-b`, `bytes=a-` or `bytes=-n`
    pub fn parse(value: &str) -> Result<Self, Error> {
        let invalid = || error::invalid_input(format!("invalid range {value:?}"));

        let bounds = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
        // multiple ranges are not supported
        if bounds.contains(',') {
            return Err(invalid());
        }
        let (start, end) = bounds.split_once('-').ok_or_else(invalid)?;
        let (start, end) = (start.trim(), end.trim());

        let parse = |s: &str| s.parse::<u64>().map_err(|_| invalid());
        let range = match (start.is_empty(), end.is_empty()) {
            (true, true) => return Err(invalid()),
            (false, true) => ByteRange {
                has_start: true,
                has_end: false,
                start: parse(start)?,
                end: 0,
            },
            (true, false) => {
                let suffix = parse(end)?;
                if suffix == 0 {
                    return Err(invalid());
                }
                ByteRange {
                    has_start: false,
                    has_end: true,
                    start: 0,
                    end: suffix,
                }
            }
            (false, false) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(invalid());
                }
                ByteRange {
                    has_start: true,
                    has_end: true,
                    start,
                    end,
                }
            }
        };
        Ok(range)
    }

    /// Resolve the range against an object of `size` bytes into a half-open `[start, end)`
    /// interval.
    ///
    /// An end past the object is clamped to its size, a suffix longer than the object selects
    /// the whole object. A start at or past the end of the object is rejected.
    pub fn resolve(&self, size: u64) -> Result<(u64, u64), Error> {
        let (start, end) = match (self.has_start, self.has_end) {
            (true, true) => (self.start, (self.end + 1).min(size)),
            (true, false) => (self.start, size),
            (false, true) => (size.saturating_sub(self.end), size),
            (false, false) => (0, size),
        };
        if self.has_start && start >= size {
            return Err(error::invalid_input(format!(
                "range {self} starts past the end of a {size} byte object"
            )));
        }
        Ok((start, end))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.has_start, self.has_end) {
            (true, true) => write!(f, "bytes={}-{}", self.start, self.end),
            (true, false) => write!(f, "bytes={}-", self.start),
            (false, true) => write!(f, "bytes=-{}", self.end),
            (false, false) => write!(f, "bytes=0-"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::ByteRange;

    #[test]
    fn test_closed_range() {
        let r = ByteRange::parse("bytes=1024-2047").unwrap();
        assert!(r.has_start && r.has_end);
        assert_eq!((1024, 2048), r.resolve(4096).unwrap());
        assert_eq!((0, 100), ByteRange::parse("bytes=0-99").unwrap().resolve(1000).unwrap());
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        let r = ByteRange::parse("bytes=100-").unwrap();
        assert!(r.has_start && !r.has_end);
        assert_eq!((100, 1000), r.resolve(1000).unwrap());

        let r = ByteRange::parse("bytes=-50").unwrap();
        assert!(!r.has_start && r.has_end);
        assert_eq!((950, 1000), r.resolve(1000).unwrap());
        assert_eq!((0, 10), r.resolve(10).unwrap());
    }

    #[test]
    fn test_invalid() {
        for value in ["bytes=-0", "bytes=-", "bytes=a-b", "bytes=5-1", "0-1", "bytes=0-1,4-5"] {
            assert!(ByteRange::parse(value).is_err(), "{value}");
        }
        let r = ByteRange::parse("bytes=10-").unwrap();
        assert!(r.resolve(10).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for value in ["bytes=1-2", "bytes=7-", "bytes=-9"] {
            assert_eq!(value, ByteRange::parse(value).unwrap().to_string());
        }
    }
}
