use bramble_tree::Length;

use crate::TextSource;

/// Grammar-supplied lexer for context-sensitive tokens.
///
/// A fresh scanner is created for every parse. Before each call to
/// [`ExternalScanner::scan`] the lexer restores the state that was
/// serialized after the preceding external token, so a scanner must keep
/// everything it depends on in that state.
pub trait ExternalScanner: Send {
    /// Tries to recognize one token at the cursor.
    ///
    /// `valid[i]` tells whether external token `i` is acceptable in the
    /// current parse state. Returns the index of the recognized token, or
    /// `None` to let the regular lexer run.
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, valid: &[bool]) -> Option<usize>;

    fn serialize(&self, buffer: &mut Vec<u8>);

    /// Restores a serialized state; an empty buffer means the initial state.
    fn deserialize(&mut self, buffer: &[u8]);
}

/// Read access to the input for an [`ExternalScanner`].
pub struct ScanCursor<'a> {
    input: &'a mut dyn TextSource,
    position: Length,
    token_end: Option<Length>,
    examined_end: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(input: &'a mut dyn TextSource, position: Length) -> Self {
        Self { input, position, token_end: None, examined_end: position.bytes.into() }
    }

    /// The next byte, or `None` at the end of input.
    pub fn lookahead(&mut self) -> Option<u8> {
        let offset = usize::from(self.position.bytes);
        self.examined_end = self.examined_end.max(offset + 1);
        self.input.read(offset, self.position.extent).first().copied()
    }

    /// Consumes the next byte, if any.
    pub fn advance(&mut self) {
        if let Some(byte) = self.lookahead() {
            self.position = self.position.advance(byte);
        }
    }

    /// Ends the token at the current position. Without a call the token
    /// ends wherever the cursor stops.
    pub fn mark_end(&mut self) {
        self.token_end = Some(self.position);
    }

    pub fn eof(&mut self) -> bool {
        self.lookahead().is_none()
    }

    /// Byte column of the current position.
    pub fn column(&self) -> u32 {
        self.position.extent.column
    }

    pub fn position(&self) -> Length {
        self.position
    }

    pub(crate) fn token_end(&self) -> Length {
        self.token_end.unwrap_or(self.position)
    }

    /// One past the last byte offset the scanner looked at.
    pub(crate) fn examined_end(&self) -> usize {
        self.examined_end
    }
}
