use crate::{Associativity, FieldId, ProductionId, StateId, Symbol};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParseAction {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

/// A grammar rule `lhs -> child_count children`.
#[derive(Clone, Debug)]
pub struct Production {
    pub lhs: Symbol,
    pub child_count: u16,
    pub precedence: Option<i32>,
    pub associativity: Option<Associativity>,
    pub dynamic_precedence: i32,
    pub fields: Box<[FieldEntry]>,
}

impl Production {
    /// Returns the field bound to the `index`-th non-extra child.
    pub fn field_for_child(&self, index: usize) -> Option<FieldId> {
        self.fields
            .iter()
            .find(|entry| usize::from(entry.child_index) == index)
            .map(|entry| entry.field)
    }
}

/// Binds a field name to a child position, counting non-extra children only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldEntry {
    pub field: FieldId,
    pub child_index: u16,
}
