//! Byte range helpers used by prefix scans.

use bytes::{Bytes, BytesMut};
use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::ops::RangeBounds;

/// Returns the smallest byte string strictly greater than every string that
/// starts with `data`, or `None` when `data` is empty or all `0xFF`.
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte is bumped:
///
/// - `b"/a/"` → `b"/a0"`
/// - `[0x61, 0xFF]` → `[0x62]`
/// - `[0xFF]` → `None`
pub(crate) fn lex_increment(data: &[u8]) -> Option<Bytes> {
    let mut result = BytesMut::from(data);
    while let Some(last) = result.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(result.freeze());
        }
        result.truncate(result.len() - 1);
    }
    None
}

/// A range of storage keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BytesRange {
    pub start: Bound<Bytes>,
    pub end: Bound<Bytes>,
}

impl BytesRange {
    /// The range of every key beginning with `prefix`.
    ///
    /// An empty prefix covers the whole keyspace.
    pub fn prefix(prefix: Bytes) -> Self {
        if prefix.is_empty() {
            return Self::unbounded();
        }
        let end = match lex_increment(&prefix) {
            Some(end) => Excluded(end),
            None => Unbounded,
        };
        Self {
            start: Included(prefix),
            end,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            start: Unbounded,
            end: Unbounded,
        }
    }

    pub fn contains(&self, k: &[u8]) -> bool {
        let above_start = match &self.start {
            Included(s) => k >= s.as_ref(),
            Excluded(s) => k > s.as_ref(),
            Unbounded => true,
        };
        let below_end = match &self.end {
            Included(e) => k <= e.as_ref(),
            Excluded(e) => k < e.as_ref(),
            Unbounded => true,
        };
        above_start && below_end
    }
}

impl RangeBounds<Bytes> for BytesRange {
    fn start_bound(&self) -> Bound<&Bytes> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&Bytes> {
        self.end.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn should_prefix_range_contain_every_extension(prefix: Vec<u8>, suffix: Vec<u8>) {
            prop_assume!(!prefix.is_empty());

            let range = BytesRange::prefix(Bytes::from(prefix.clone()));

            let mut extended = prefix.clone();
            extended.extend(&suffix);
            prop_assert!(range.contains(&prefix));
            prop_assert!(range.contains(&extended));
        }

        #[test]
        fn should_prefix_range_exclude_keys_without_prefix(prefix: Vec<u8>, other: Vec<u8>) {
            prop_assume!(!prefix.is_empty());
            prop_assume!(!other.starts_with(&prefix));

            let range = BytesRange::prefix(Bytes::from(prefix));

            prop_assert!(!range.contains(&other));
        }
    }

    #[test]
    fn should_increment_last_byte() {
        assert_eq!(lex_increment(b"/user1/").unwrap().as_ref(), b"/user10");
        assert_eq!(lex_increment(&[0x61, 0xFF]).unwrap().as_ref(), &[0x62]);
    }

    #[test]
    fn should_not_increment_empty_or_saturated_input() {
        assert!(lex_increment(&[]).is_none());
        assert!(lex_increment(&[0xFF, 0xFF]).is_none());
    }

    #[test]
    fn should_keep_sibling_record_prefixes_apart() {
        // given
        let range = BytesRange::prefix(Bytes::from("/user1/"));

        // then
        assert!(range.contains(b"/user1/field0"));
        assert!(!range.contains(b"/user10/field0"));
        assert!(!range.contains(b"/user1"));
    }

    #[test]
    fn should_leave_end_unbounded_for_saturated_prefix() {
        // given
        let range = BytesRange::prefix(Bytes::from_static(&[0xFF, 0xFF]));

        // then
        assert_eq!(range.end, Unbounded);
        assert!(range.contains(&[0xFF, 0xFF, 0x00]));
        assert!(!range.contains(&[0xFE, 0xFF]));
    }

    #[test]
    fn should_treat_empty_prefix_as_unbounded() {
        assert_eq!(BytesRange::prefix(Bytes::new()), BytesRange::unbounded());
    }
}
