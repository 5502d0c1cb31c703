//! Byte spans and line/column resolution for error reporting.

/// The 1-indexed line and column number of a given byte index in a string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextPoint(pub usize, pub usize);
impl TextPoint {
    /// Finds the line and column number of the given byte index in the given
    /// string. Handles '\n', '\r' and '\r\n' line endings.
    pub fn from_idx(s: &str, idx: usize) -> Self {
        let mut line = 1;
        let mut line_start = 0;
        let bytes = s.as_bytes();
        for i in 0..idx.min(bytes.len()) {
            match bytes[i] {
                // A '\r' that is part of "\r\n" is counted when the '\n' is
                // reached, so that the pair acts as a single linebreak.
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => (),
                b'\r' | b'\n' => {
                    line += 1;
                    line_start = i + 1;
                }
                _ => (),
            }
        }
        // The first column is numbered 1.
        Self(line, idx - line_start + 1)
    }
    /// Returns the 1-indexed line number of this text point.
    pub fn line(self) -> usize {
        self.0
    }
    /// Returns the 1-indexed column number of this text point.
    pub fn column(self) -> usize {
        self.1
    }
}

/// A contiguous span of text from one byte index to another in a &str.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    /// The byte index of the first character.
    pub start: usize,
    /// The byte index after the last character.
    pub end: usize,
}
impl Span {
    /// Returns a 0-length span at the given index.
    pub fn empty(idx: usize) -> Self {
        Self {
            start: idx,
            end: idx,
        }
    }
    /// Returns a pair of TextPoints representing the start and end of this
    /// span applied to a given &str.
    pub fn textpoints(self, string: &str) -> (TextPoint, TextPoint) {
        (
            TextPoint::from_idx(string, self.start),
            TextPoint::from_idx(string, self.end),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textpoint() {
        let s = "abc\ndef\r\nghi\rjkl";
        let expected_textpoints = vec![
            TextPoint(1, 1),
            TextPoint(1, 2),
            TextPoint(1, 3),
            TextPoint(1, 4),
            TextPoint(2, 1),
            TextPoint(2, 2),
            TextPoint(2, 3),
            TextPoint(2, 4),
            TextPoint(2, 5),
            TextPoint(3, 1),
            TextPoint(3, 2),
            TextPoint(3, 3),
            TextPoint(3, 4),
            TextPoint(4, 1),
            TextPoint(4, 2),
            TextPoint(4, 3),
        ];
        let actual_textpoints: Vec<_> = (0..s.len())
            .map(|idx| TextPoint::from_idx(&s, idx))
            .collect();
        assert_eq!(expected_textpoints, actual_textpoints);
    }
}
