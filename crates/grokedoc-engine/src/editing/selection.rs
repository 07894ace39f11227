use serde::{Deserialize, Serialize};

use crate::editing::tree::NodeId;

/// One end of a selection, relative to its node so buffer-wide shifts don't move it.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPoint {
    pub node_id: NodeId,
    pub offset: usize,
}

impl SelectionPoint {
    pub fn new(node_id: NodeId, offset: usize) -> Self {
        Self { node_id, offset }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl Selection {
    pub fn new(anchor: SelectionPoint, focus: SelectionPoint) -> Self {
        Self { anchor, focus }
    }

    /// Collapsed selection (a caret).
    pub fn caret(node_id: NodeId, offset: usize) -> Self {
        let point = SelectionPoint::new(node_id, offset);
        Self::new(point, point)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}
