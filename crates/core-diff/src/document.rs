//! Read-only line index over a buffer snapshot.
//!
//! The alignment engine never mutates buffers. Collaborators hand it a
//! `DocumentLines` snapshot taken under their own read lock; the snapshot is
//! `Send + Sync` so the background highlight worker can resolve line offsets
//! without touching UI-affine geometry.
//!
//! Offsets are byte offsets into the document text. Line indices are 0-based.

use ropey::Rope;

pub trait DocumentLines: Send + Sync {
    /// Number of lines. A trailing newline does not open an extra line.
    fn line_count(&self) -> usize;
    /// Byte offset where 0-based `line` starts. `line == line_count()` yields
    /// `len()` (one past the last line); anything beyond is `None`.
    fn line_start_offset(&self, line: usize) -> Option<usize>;
    /// Total byte length.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable document snapshot backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct TextSnapshot {
    rope: Rope,
}

impl TextSnapshot {
    pub fn new(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    /// Line content without its terminator.
    pub fn line(&self, line: usize) -> Option<String> {
        if line >= self.line_count() {
            return None;
        }
        let mut s = self.rope.line(line).to_string();
        if s.ends_with('\n') {
            s.pop();
            if s.ends_with('\r') {
                s.pop();
            }
        }
        Some(s)
    }
}

impl std::fmt::Debug for TextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSnapshot")
            .field("lines", &self.line_count())
            .field("bytes", &self.len())
            .finish()
    }
}

impl DocumentLines for TextSnapshot {
    fn line_count(&self) -> usize {
        // ropey reports an empty final line after a trailing newline.
        let lines = self.rope.len_lines();
        if lines > 1 && self.rope.line(lines - 1).len_chars() == 0 {
            lines - 1
        } else if self.rope.len_bytes() == 0 {
            0
        } else {
            lines
        }
    }

    fn line_start_offset(&self, line: usize) -> Option<usize> {
        let count = self.line_count();
        if line < count {
            Some(self.rope.line_to_byte(line))
        } else if line == count {
            Some(self.rope.len_bytes())
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.rope.len_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_offsets_follow_bytes() {
        let doc = TextSnapshot::new("alpha\nβeta\ngamma\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_start_offset(0), Some(0));
        assert_eq!(doc.line_start_offset(1), Some(6));
        // "βeta\n" is 6 bytes
        assert_eq!(doc.line_start_offset(2), Some(12));
        assert_eq!(doc.line_start_offset(3), Some(doc.len()));
        assert_eq!(doc.line_start_offset(4), None);
    }

    #[test]
    fn missing_trailing_newline_counts_last_line() {
        let doc = TextSnapshot::new("one\ntwo");
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1).as_deref(), Some("two"));
        assert_eq!(doc.line_start_offset(2), Some(7));
    }

    #[test]
    fn empty_document_has_no_lines() {
        let doc = TextSnapshot::new("");
        assert_eq!(doc.line_count(), 0);
        assert_eq!(doc.line_start_offset(0), Some(0));
        assert!(doc.is_empty());
    }
}
