pub mod editing;
pub mod io;

// Re-export key types for easier usage
pub use editing::{
    Asset, Block, BufferContent, DocumentChange, DocumentTree, EditError, EditorEngine,
    EngineOptions, NewBlock, NodeId, Operation, Patch, Selection, SelectionPoint, TextBuffer,
};
pub use io::{IoError, LoadError, SavedDocument};
