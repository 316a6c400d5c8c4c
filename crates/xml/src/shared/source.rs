//! Text source abstraction for bounded lookahead.
//!
//! The parser itself is push-driven and never touches a source; only the
//! bounded forward/backward scans (completion span resolution,
//! `advance_until_closed`) read buffer text, and they do so through this
//! trait so the engine never assumes a contiguous in-memory string.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default character budget for forward scans over a `TextSource`.
pub const DEFAULT_READAHEAD: usize = 2000;

/// Random-access character source.
///
/// Offsets are byte offsets into the UTF-8 text. `char_at` returns `None`
/// both past the end and on a non-boundary offset; callers that walk a
/// source always step by `char::len_utf8` and therefore stay on boundaries.
pub trait TextSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn char_at(&self, offset: usize) -> Option<char>;

    /// The character ending at `offset`, with its start offset.
    ///
    /// Probes at most four bytes backwards (the longest UTF-8 sequence), so
    /// backward scans stay O(1) per step on any source.
    fn char_before(&self, offset: usize) -> Option<(char, usize)> {
        for width in 1..=4usize {
            if offset < width {
                return None;
            }
            if let Some(ch) = self.char_at(offset - width)
                && ch.len_utf8() == width
            {
                return Some((ch, offset - width));
            }
        }
        None
    }
}

impl TextSource for str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.get(offset..).and_then(|rest| rest.chars().next())
    }
}

impl TextSource for String {
    fn len(&self) -> usize {
        self.as_str().len()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.as_str().char_at(offset)
    }
}

/// Cooperative cancellation for bounded scans.
///
/// Checked between characters by scanning operations; never checked inside
/// the O(1) single-character `push`. Clones share the flag, so one token can
/// be handed to many concurrent scans over the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, TextSource};

    #[test]
    fn char_at_respects_utf8_boundaries() {
        let text = "a\u{e9}z";
        assert_eq!(text.char_at(0), Some('a'));
        assert_eq!(text.char_at(1), Some('\u{e9}'));
        assert_eq!(text.char_at(2), None, "inside a multi-byte sequence");
        assert_eq!(text.char_at(3), Some('z'));
        assert_eq!(text.char_at(4), None);
    }

    #[test]
    fn char_before_steps_over_multibyte() {
        let text = "a\u{e9}z";
        assert_eq!(text.char_before(4), Some(('z', 3)));
        assert_eq!(text.char_before(3), Some(('\u{e9}', 1)));
        assert_eq!(text.char_before(1), Some(('a', 0)));
        assert_eq!(text.char_before(0), None);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
