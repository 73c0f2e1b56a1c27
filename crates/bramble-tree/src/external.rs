use std::fmt;
use std::hash::{Hash, Hasher};

use triomphe::ThinArc;

/// Serialized state of an external scanner after it produced a token.
///
/// The empty state is stored without allocation.
#[derive(Clone, Default)]
pub struct ExternalState {
    ptr: Option<ThinArc<(), u8>>,
}

impl ExternalState {
    pub fn new(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            Self { ptr: None }
        } else {
            Self { ptr: Some(ThinArc::from_header_and_slice((), bytes)) }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.ptr {
            None => &[],
            Some(ptr) => &ptr.slice,
        }
    }
}

impl PartialEq for ExternalState {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ExternalState {}

impl Hash for ExternalState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for ExternalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExternalState").field(&self.as_bytes()).finish()
    }
}
