use bramble_tree::Point;

/// Source of the bytes being parsed.
///
/// The lexer pulls text on demand and may ask for any offset, in any order,
/// because every stack version lexes from its own position.
pub trait TextSource {
    /// Returns the text starting at `offset`, or an empty slice past the end.
    ///
    /// `point` is the row and column of `offset`.
    fn read(&mut self, offset: usize, point: Point) -> &[u8];
}

impl TextSource for &[u8] {
    #[inline]
    fn read(&mut self, offset: usize, _point: Point) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

impl TextSource for &str {
    #[inline]
    fn read(&mut self, offset: usize, _point: Point) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

impl TextSource for &String {
    #[inline]
    fn read(&mut self, offset: usize, _point: Point) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

/// Text produced by a callback, one chunk at a time.
///
/// The callback receives an offset and its point and returns the text
/// starting there; an empty chunk ends the input. The latest chunk is cached,
/// so reads within it do not call back.
pub struct Chunked<F> {
    callback: F,
    chunk: Vec<u8>,
    chunk_start: usize,
}

impl<F, T> Chunked<F>
where
    F: FnMut(usize, Point) -> T,
    T: AsRef<[u8]>,
{
    pub fn new(callback: F) -> Self {
        Self { callback, chunk: Vec::new(), chunk_start: 0 }
    }
}

impl<F, T> TextSource for Chunked<F>
where
    F: FnMut(usize, Point) -> T,
    T: AsRef<[u8]>,
{
    fn read(&mut self, offset: usize, point: Point) -> &[u8] {
        let cached = offset >= self.chunk_start && offset < self.chunk_start + self.chunk.len();
        if !cached {
            self.chunk.clear();
            self.chunk.extend_from_slice((self.callback)(offset, point).as_ref());
            self.chunk_start = offset;
        }
        &self.chunk[offset - self.chunk_start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_cached() {
        let text = b"hello world";
        let mut calls = 0;
        let mut input = Chunked::new(|offset: usize, _| {
            calls += 1;
            text[offset..text.len().min(offset + 4)].to_vec()
        });

        assert_eq!(input.read(0, Point::ZERO), b"hell");
        assert_eq!(input.read(2, Point::new(0, 2)), b"ll");
        assert_eq!(input.read(4, Point::new(0, 4)), b"o wo");
        assert_eq!(input.read(11, Point::new(0, 11)), b"");
        drop(input);
        assert_eq!(calls, 3);
    }
}
