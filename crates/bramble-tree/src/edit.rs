//! Edits applied to trees ahead of a re-parse.

use line_index::LineIndex;
use text_size::{TextRange, TextSize};

use crate::{Length, Point, Range, Subtree, Tree};

/// One text replacement, described in both bytes and points.
///
/// `start..old_end` is the replaced region of the old text and
/// `start..new_end` the replacement in the new text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// Describes replacing `range` of `old_text` with `new_text`.
    ///
    /// The range is clamped to the text.
    pub fn from_replacement(old_text: &str, range: TextRange, new_text: &str) -> Self {
        let len = TextSize::of(old_text);
        let start = range.start().min(len);
        let old_end = range.end().clamp(start, len);

        let line_index = LineIndex::new(old_text);
        let point = |offset| {
            let line_col = line_index.line_col(offset);
            Point::new(line_col.line, line_col.col)
        };
        let start = Length::new(start, point(start));
        let old_end = Length::new(old_end, point(old_end));
        Self::new(start, old_end, start + Length::of(new_text.as_bytes()))
    }

    /// Like [`InputEdit::from_replacement`], for text that may not be UTF-8.
    pub fn from_byte_replacement(old_text: &[u8], range: TextRange, new_text: &[u8]) -> Self {
        let len = Length::of(old_text).bytes;
        let start = range.start().min(len);
        let old_end = range.end().clamp(start, len);
        let prefix = |end: TextSize| Length::of(&old_text[..usize::from(end)]);
        let start = prefix(start);
        Self::new(start, prefix(old_end), start + Length::of(new_text))
    }

    fn new(start: Length, old_end: Length, new_end: Length) -> Self {
        Self {
            start_byte: start.bytes,
            old_end_byte: old_end.bytes,
            new_end_byte: new_end.bytes,
            start_point: start.extent,
            old_end_point: old_end.extent,
            new_end_point: new_end.extent,
        }
    }

    #[inline]
    pub fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_point)
    }

    #[inline]
    pub fn old_end(&self) -> Length {
        Length::new(self.old_end_byte, self.old_end_point)
    }

    #[inline]
    pub fn new_end(&self) -> Length {
        Length::new(self.new_end_byte, self.new_end_point)
    }
}

/// A tree whose sizes were adjusted for edits but that has not been
/// re-parsed yet.
///
/// Subtrees touched by an edit are copied and marked as changed; everything
/// else is shared with the tree the edits were applied to.
#[derive(Clone, Debug)]
pub struct StaleTree {
    tree: Tree,
    edits: Vec<InputEdit>,
}

impl StaleTree {
    pub(crate) fn new(tree: &Tree, edit: &InputEdit) -> Self {
        let root = edit_root(tree.root(), edit);
        Self { tree: Tree::new(root, tree.language().clone()), edits: vec![*edit] }
    }

    /// Applies one more edit, expressed against the text produced by the
    /// previous ones.
    #[must_use]
    pub fn edit(&self, edit: &InputEdit) -> Self {
        let root = edit_root(self.tree.root(), edit);
        let mut edits = self.edits.clone();
        edits.push(*edit);
        Self { tree: Tree::new(root, self.tree.language().clone()), edits }
    }

    pub fn edits(&self) -> &[InputEdit] {
        &self.edits
    }

    /// The edited tree; its nodes may have `has_changes` set.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> &Subtree {
        self.tree.root()
    }

    /// Returns the regions of `new` whose syntactic structure differs from
    /// this tree, in document order, with adjacent regions merged.
    pub fn changed_ranges(&self, new: &Tree) -> Vec<Range> {
        let mut ranges = Vec::new();
        diff(self.tree.root(), new.root(), Length::ZERO, &mut ranges);
        ranges
    }
}

/// An edit relative to the start of one subtree.
#[derive(Clone, Copy)]
struct LocalEdit {
    start: Length,
    old_end: Length,
    new_end: Length,
    /// Whether text after the edit on its last row moves to another column.
    shifts_columns: bool,
}

fn edit_root(root: &Subtree, edit: &InputEdit) -> Subtree {
    let size = root.size();
    let start = edit.start().min(size);
    let old_end = edit.old_end().min(size).max(start);
    let new_end = start + edit.new_end().saturating_sub(edit.start());
    let shifts_columns = new_end.extent.column != old_end.extent.column;
    edit_subtree(root, LocalEdit { start, old_end, new_end, shifts_columns })
}

fn edit_subtree(subtree: &Subtree, edit: LocalEdit) -> Subtree {
    let size = edit.new_end + subtree.size().saturating_sub(edit.old_end);
    if subtree.is_leaf() {
        return subtree.edited(size, None);
    }

    let children = subtree.children();
    let recipient = recipient(children, edit.start);
    let mut edited = Vec::with_capacity(children.len());
    let mut child_start = Length::ZERO;
    let mut past_edit = false;

    for (index, child) in children.iter().enumerate() {
        let child_end = child_start + child.size();
        let before = u32::from(child_end.bytes) + child.lookahead_bytes()
            < u32::from(edit.start.bytes);
        let after = child_start.bytes > edit.old_end.bytes
            || (child_start.bytes == edit.old_end.bytes
                && child_end.bytes > child_start.bytes
                && index != recipient);

        past_edit |= after;
        if past_edit {
            let same_row = child_start.extent.row == edit.old_end.extent.row;
            let invalidated =
                (edit.shifts_columns && same_row).then(|| invalidate_first_row(child)).flatten();
            edited.push(invalidated.unwrap_or_else(|| child.clone()));
        } else if before {
            edited.push(child.clone());
        } else {
            let start = edit.start.min(child_end).saturating_sub(child_start);
            let old_end = start.max(edit.old_end.min(child_end).saturating_sub(child_start));
            let new_end =
                if index == recipient { start + (edit.new_end - edit.start) } else { start };
            let local = LocalEdit { start, old_end, new_end, shifts_columns: edit.shifts_columns };
            edited.push(edit_subtree(child, local));
        }
        child_start = child_end;
    }

    subtree.edited(size, Some(edited))
}

/// Marks the tokens on the first row of `subtree` that an external scanner
/// may have looked at, together with their ancestors. Scanners can read the
/// column, which moves when text earlier on the row changes.
fn invalidate_first_row(subtree: &Subtree) -> Option<Subtree> {
    if subtree.is_leaf() {
        let external = subtree.lex_mode().external_lex_state != 0;
        return external.then(|| subtree.edited(subtree.size(), None));
    }

    let mut child_start = Length::ZERO;
    let mut changed = false;
    let children: Vec<_> = subtree
        .children()
        .iter()
        .map(|child| {
            let first_row = child_start.extent.row == 0;
            child_start += child.size();
            match first_row.then(|| invalidate_first_row(child)).flatten() {
                Some(edited) => {
                    changed = true;
                    edited
                }
                None => child.clone(),
            }
        })
        .collect();
    changed.then(|| subtree.edited(subtree.size(), Some(children)))
}

/// Index of the child that receives inserted text: the first child ending
/// after the edit start, or the last child.
fn recipient(children: &[Subtree], start: Length) -> usize {
    let mut end = TextSize::new(0);
    children
        .iter()
        .position(|child| {
            end += child.size().bytes;
            end > start.bytes
        })
        .unwrap_or(children.len().saturating_sub(1))
}

fn same_leaf(old: &Subtree, new: &Subtree) -> bool {
    old.is_leaf()
        && new.is_leaf()
        && old.symbol() == new.symbol()
        && old.size() == new.size()
        && old.is_extra() == new.is_extra()
        && old.is_missing() == new.is_missing()
}

fn diff(old: &Subtree, new: &Subtree, start: Length, ranges: &mut Vec<Range>) {
    if (old.ptr_eq(new) && !old.has_changes()) || same_leaf(old, new) {
        return;
    }

    let recurse = !old.is_leaf()
        && !new.is_leaf()
        && old.symbol() == new.symbol()
        && old.child_count() == new.child_count();
    if !recurse {
        push_range(ranges, Range::new(start, start + new.size()));
        return;
    }

    let mut child_start = start;
    for (old_child, new_child) in old.children().iter().zip(new.children()) {
        diff(old_child, new_child, child_start, ranges);
        child_start += new_child.size();
    }
}

fn push_range(ranges: &mut Vec<Range>, range: Range) {
    if let Some(last) = ranges.last_mut()
        && last.bytes.end() >= range.bytes.start()
    {
        if range.bytes.end() > last.bytes.end() {
            last.bytes = TextRange::new(last.bytes.start(), range.bytes.end());
            last.end_point = range.end_point;
        }
        return;
    }
    ranges.push(range);
}
