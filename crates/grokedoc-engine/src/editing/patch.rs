use crate::editing::{NodeId, Selection};

/// Result of applying an operation
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Buffer ranges (post-edit, in chars) written by the operation
    pub changed: Vec<std::ops::Range<usize>>,
    pub new_selection: Option<Selection>,
    /// Id of the block an `InsertBlock` created
    pub inserted: Option<NodeId>,
    pub version: u64,
}
