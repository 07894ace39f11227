/*!
 * # Editing Core Module
 *
 * A rich-text document is two structures kept in lockstep:
 *
 * ### 1. Text: piece-table `TextBuffer`
 * - Immutable **base text** plus an append-only log of insert/delete **chunks**
 * - The log is the persisted form; an `xi_rope::Rope` mirrors it for reads
 * - All positions count chars (Unicode scalar values)
 *
 * ### 2. Structure: `DocumentTree`
 * - Root → sections (page layout) → blocks: paragraph, heading, image,
 *   table, blockquote, list
 * - Text-bearing blocks own a half-open range into the buffer; an image owns
 *   one sentinel char
 * - Leaf ranges never overlap and follow document order
 *
 * ### 3. Mapping: the resolver
 * - Absolute buffer offsets ⇄ `{node_id, node_offset}`
 * - On a shared boundary the earlier block wins
 *
 * ### 4. Mutation: `EditorEngine`
 * - All edits are `Operation`s applied through one entry point
 * - Each call edits the buffer, shifts every later leaf, re-validates, then
 *   notifies subscribers once; a failing call is rolled back
 * - Undo/redo swaps whole-state snapshots that share unchanged data via `Rc`
 *
 * ## Module Structure
 *
 * - **`buffer`**: `TextBuffer`, `BufferContent`, `Chunk`
 * - **`tree`**: node types, `DocumentTree`, invariant checks
 * - **`marks`**: inline mark splitting, layering and shifting
 * - **`resolver`**: offset resolution and block lookup
 * - **`selection`**: node-relative selection points
 * - **`operation`**: `Operation` and `NewBlock` templates
 * - **`history`**: bounded undo/redo stacks
 * - **`engine`**: `EditorEngine`, subscriptions, `EditError`
 * - **`search`**: literal and regex search over the buffer
 * - **`patch`**: what an applied operation changed
 *
 * ## Usage Pattern
 *
 * ```rust
 * use grokedoc_engine::editing::*;
 *
 * let mut engine = EditorEngine::new();
 * engine.load_plain_text("Hello");
 * let paragraph = engine.tree().sections()[0].children[0].id();
 *
 * let patch = engine
 *     .apply(Operation::Insert {
 *         node_id: paragraph,
 *         offset: 5,
 *         text: " World".to_string(),
 *     })
 *     .unwrap();
 * assert_eq!(patch.changed, vec![5..11]);
 * assert_eq!(engine.text(), "Hello World");
 * ```
 */

pub mod buffer;
pub mod engine;
pub mod history;
pub mod marks;
pub mod operation;
pub mod patch;
pub mod resolver;
pub mod search;
pub mod selection;
pub mod tree;

pub use buffer::{BufferContent, Chunk, TextBuffer};
pub use engine::{
    ChangeCause, DocumentChange, EditError, EditorEngine, EngineOptions, Subscription,
};
pub use history::{History, Snapshot};
pub use operation::{NewBlock, Operation, TemplateError};
pub use patch::Patch;
pub use resolver::{BlockLocation, ContainerKind, ResolvedOffset};
pub use search::{SearchError, SearchHit, SearchMode, SearchQuery};
pub use selection::{Selection, SelectionPoint};
pub use tree::{
    Alignment, Asset, Block, BlockKind, Blockquote, DocumentTree, Heading, Image,
    InvariantViolation, Leaf, List, ListItem, Margins, Mark, MarkAttrs, NodeId, Orientation,
    PageLayout, Paragraph, Root, Section, Table, TextRange,
};
