use crate::{ExternalScanner, ScanCursor};

/// Produces `newline`, `indent` and `dedent` tokens for layout-sensitive
/// grammars.
///
/// A `newline` token spans the line break, any blank lines after it and the
/// indentation of the next non-blank line, so the column after it is that
/// line's indentation. `indent` and `dedent` are zero-width and compare that
/// column with a stack of open indentation levels. Indentation is measured in
/// bytes; a tab counts as one column.
#[derive(Debug, Default)]
pub struct IndentationScanner {
    /// Open levels above column zero, innermost last.
    indents: Vec<u16>,
}

impl IndentationScanner {
    pub const NEWLINE: usize = 0;
    pub const INDENT: usize = 1;
    pub const DEDENT: usize = 2;
    pub const TOKEN_COUNT: usize = 3;

    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> u32 {
        self.indents.last().copied().map_or(0, u32::from)
    }
}

fn is_line_break(byte: u8) -> bool {
    matches!(byte, b'\n' | b'\r')
}

fn is_blank(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t')
}

impl ExternalScanner for IndentationScanner {
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, valid: &[bool]) -> Option<usize> {
        let valid = |token: usize| valid.get(token).copied().unwrap_or(false);

        let Some(byte) = cursor.lookahead() else {
            if valid(Self::DEDENT) && self.indents.pop().is_some() {
                return Some(Self::DEDENT);
            }
            return valid(Self::NEWLINE).then_some(Self::NEWLINE);
        };

        if is_line_break(byte) {
            if !valid(Self::NEWLINE) {
                return None;
            }
            while cursor.lookahead().is_some_and(is_line_break) {
                cursor.advance();
                while cursor.lookahead().is_some_and(is_blank) {
                    cursor.advance();
                }
            }
            cursor.mark_end();
            return Some(Self::NEWLINE);
        }

        if is_blank(byte) {
            return None;
        }

        let column = cursor.column();
        if valid(Self::INDENT) && column > self.current() {
            self.indents.push(u16::try_from(column).unwrap_or(u16::MAX));
            return Some(Self::INDENT);
        }
        if valid(Self::DEDENT) && column < self.current() {
            self.indents.pop();
            return Some(Self::DEDENT);
        }
        None
    }

    fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend(self.indents.iter().flat_map(|indent| indent.to_le_bytes()));
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.indents.clear();
        self.indents.extend(
            buffer.chunks_exact(2).map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]])),
        );
    }
}
