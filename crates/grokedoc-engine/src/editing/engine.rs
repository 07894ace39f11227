use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::editing::buffer::TextBuffer;
use crate::editing::history::{History, Snapshot};
use crate::editing::marks;
use crate::editing::operation::{NewBlock, Operation, TemplateError};
use crate::editing::patch::Patch;
use crate::editing::resolver::{
    ContainerKind, container_info, find_block_by_id, find_block_by_id_mut,
    find_section_and_block_index, leaves_before_slot, locate_block, node_offset_to_buffer,
    resolve_buffer_offset,
};
use crate::editing::search::{self, SearchError, SearchHit, SearchQuery};
use crate::editing::selection::{Selection, SelectionPoint};
use crate::editing::tree::{
    Asset, Block, BlockKind, DocumentTree, Image, InvariantViolation, Leaf, ListItem, MarkAttrs,
    NodeId, Table, TextRange,
};
use crate::io::SavedDocument;

/// Tunables read from the `[engine]` table of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Undo checkpoints kept before the oldest is dropped
    pub history_limit: usize,
    /// Char standing in for an image in the buffer
    pub sentinel: char,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            history_limit: 50,
            sentinel: '\u{FFFC}',
        }
    }
}

/// Why an engine call was rejected. A rejected call changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
    #[error("Node {node_id} is a {kind}, which does not support this edit")]
    WrongKind { node_id: NodeId, kind: BlockKind },
    #[error("Node {0} cannot hold child blocks")]
    NotContainer(NodeId),
    #[error("Offset {offset} is past the end of the block ({len})")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("Invalid range {start}..{end}")]
    InvalidRange { start: usize, end: usize },
    #[error("Index {index} is out of range for a container of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Nothing to insert")]
    EmptyEdit,
    #[error("Nothing to delete")]
    NothingToDelete,
    #[error("Selection does not resolve to a node")]
    UnresolvableSelection,
    #[error("Offset {0} does not resolve to a text block")]
    UnresolvableOffset(usize),
    #[error("Section {0} would be left without blocks")]
    LastBlockInSection(NodeId),
    #[error(transparent)]
    InvalidTemplate(#[from] TemplateError),
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// What triggered a [`DocumentChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    Insert,
    Delete,
    Format,
    InsertBlock,
    DeleteBlock,
    InsertImage,
    Selection,
    Load,
    Undo,
    Redo,
}

impl From<&Operation> for ChangeCause {
    fn from(op: &Operation) -> Self {
        match op {
            Operation::Insert { .. } => ChangeCause::Insert,
            Operation::Delete { .. } => ChangeCause::Delete,
            Operation::Format { .. } => ChangeCause::Format,
            Operation::InsertBlock { .. } => ChangeCause::InsertBlock,
            Operation::DeleteBlock { .. } => ChangeCause::DeleteBlock,
        }
    }
}

/// Delivered to every listener once per successful mutating call.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub version: u64,
    pub cause: ChangeCause,
    pub tree: Rc<DocumentTree>,
    pub buffer: TextBuffer,
    pub selection: Option<Selection>,
}

type Listener = Box<dyn FnMut(&DocumentChange)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    active: Vec<(u64, Listener)>,
    /// Unsubscribed while their list was lent out for a notification
    removed: Vec<u64>,
    notifying: bool,
}

/// Handle returned by [`EditorEngine::subscribe`].
///
/// Dropping it keeps the listener registered; call [`unsubscribe`](Self::unsubscribe).
#[must_use = "dropping a Subscription leaves the listener registered with no way to remove it"]
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl Subscription {
    /// Remove the listener. Safe to call from inside a notification.
    pub fn unsubscribe(self) -> bool {
        let Some(listeners) = self.listeners.upgrade() else {
            return false;
        };
        let mut listeners = listeners.borrow_mut();
        if let Some(index) = listeners.active.iter().position(|(id, _)| *id == self.id) {
            drop(listeners.active.remove(index));
            return true;
        }
        if listeners.notifying && !listeners.removed.contains(&self.id) {
            listeners.removed.push(self.id);
            return true;
        }
        false
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Single entry point for edits.
///
/// Owns the buffer, the tree, the selection and the undo history, and keeps
/// them consistent: every call either applies completely, re-validates the
/// tree against the buffer and notifies listeners once, or returns an
/// error and leaves everything as it was.
pub struct EditorEngine {
    buffer: TextBuffer,
    tree: Rc<DocumentTree>,
    selection: Option<Selection>,
    history: History,
    listeners: Rc<RefCell<Listeners>>,
    options: EngineOptions,
    version: u64,
}

impl Default for EditorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EditorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorEngine")
            .field("buffer", &self.buffer)
            .field("selection", &self.selection)
            .field("version", &self.version)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl EditorEngine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Empty document: one section, one empty paragraph, caret inside it.
    pub fn with_options(options: EngineOptions) -> Self {
        let tree = DocumentTree::empty();
        let selection = first_caret(&tree);
        Self {
            buffer: TextBuffer::new(),
            tree: Rc::new(tree),
            selection,
            history: History::new(options.history_limit),
            listeners: Rc::default(),
            options,
            version: 0,
        }
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.get_text()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Apply one edit operation.
    pub fn apply(&mut self, op: Operation) -> Result<Patch, EditError> {
        log::debug!("apply {}", op.name());
        let cause = ChangeCause::from(&op);
        let (changed, inserted) = self.transact(cause, |engine| match op {
            Operation::Insert {
                node_id,
                offset,
                text,
            } => engine.insert_text(node_id, offset, &text).map(|r| (r, None)),
            Operation::Delete {
                node_id,
                offset,
                len,
            } => engine.delete_text(node_id, offset, len).map(|r| (r, None)),
            Operation::Format {
                node_id,
                start,
                end,
                attrs,
            } => engine.format(node_id, start, end, &attrs).map(|r| (r, None)),
            Operation::InsertBlock {
                parent,
                index,
                block,
            } => engine
                .insert_block(parent, index, &block)
                .map(|(r, id)| (r, Some(id))),
            Operation::DeleteBlock { node_id } => {
                engine.delete_block(node_id).map(|r| (r, None))
            }
        })?;
        Ok(Patch {
            changed,
            new_selection: self.selection,
            inserted,
            version: self.version,
        })
    }

    /// Insert an image right after the top-level block holding the selection anchor.
    ///
    /// Records an undo checkpoint of the prior state when it succeeds. The
    /// selection is left where it was.
    pub fn insert_image(&mut self, asset: Asset) -> Result<NodeId, EditError> {
        let anchor = self
            .selection
            .ok_or(EditError::UnresolvableSelection)?
            .anchor
            .node_id;
        let (section_index, block_index) = find_section_and_block_index(&self.tree, anchor)
            .ok_or(EditError::UnresolvableSelection)?;
        let section_id = self.tree.sections()[section_index].id;
        let before = leaves_before_slot(&self.tree, section_id, block_index + 1)
            .ok_or(EditError::UnresolvableSelection)?;
        let pos = boundary_position(&self.tree, before);

        let checkpoint = self.snapshot();
        log::debug!("insert image {:?} at {pos}", asset.name);
        let id = self.transact(ChangeCause::InsertImage, |engine| {
            engine.buffer.insert(pos, &engine.options.sentinel.to_string());
            let tree = Rc::make_mut(&mut engine.tree);
            tree.shift_leaves_from(before, 1);
            let image = Image::new(pos, asset);
            let id = image.id;
            splice_child(tree, section_id, block_index + 1, Block::Image(image))?;
            Ok(id)
        })?;
        self.history.push(checkpoint);
        Ok(id)
    }

    /// Replace the document with a single paragraph of `text` and forget all history.
    pub fn load_plain_text(&mut self, text: &str) {
        let buffer = TextBuffer::from_text(text);
        let tree = DocumentTree::single_paragraph(buffer.len_chars());
        self.selection = first_caret(&tree);
        self.tree = Rc::new(tree);
        self.buffer = buffer;
        self.history.clear();
        log::debug!("loaded {} chars of plain text", self.buffer.len_chars());
        self.notify(ChangeCause::Load);
    }

    /// Install a saved document after checking it against its own text.
    pub fn load_document(&mut self, document: SavedDocument) -> Result<(), EditError> {
        let buffer = TextBuffer::from_content(document.content);
        let tree = document.document_tree;
        let checked = tree
            .validate_within(buffer.len_chars())
            .and_then(|()| check_sentinels(&tree, &buffer, self.options.sentinel));
        if let Err(violation) = checked {
            log::warn!("rejected document: {violation}");
            return Err(violation.into());
        }
        self.selection = first_caret(&tree);
        self.tree = Rc::new(tree);
        self.buffer = buffer;
        self.history.clear();
        self.notify(ChangeCause::Load);
        Ok(())
    }

    pub fn save(&self) -> SavedDocument {
        SavedDocument {
            content: self.buffer.to_content(),
            document_tree: (*self.tree).clone(),
        }
    }

    pub fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchError> {
        search::search(&self.tree, &self.buffer, query)
    }

    /// Record an undo checkpoint of the current state.
    ///
    /// Returns `false` when the buffer content equals the newest checkpoint's.
    pub fn push_history(&mut self) -> bool {
        let snapshot = self.snapshot();
        self.history.push(snapshot)
    }

    pub fn undo(&mut self) -> bool {
        let current = self.snapshot();
        let Some(previous) = self.history.undo(current) else {
            return false;
        };
        log::debug!("undo");
        self.restore(previous);
        self.notify(ChangeCause::Undo);
        true
    }

    pub fn redo(&mut self) -> bool {
        let current = self.snapshot();
        let Some(next) = self.history.redo(current) else {
            return false;
        };
        log::debug!("redo");
        self.restore(next);
        self.notify(ChangeCause::Redo);
        true
    }

    pub fn set_selection(&mut self, selection: Selection) -> Result<(), EditError> {
        for point in [selection.anchor, selection.focus] {
            if node_offset_to_buffer(&self.tree, point.node_id, point.offset).is_none() {
                return Err(EditError::UnresolvableSelection);
            }
        }
        self.selection = Some(selection);
        self.notify(ChangeCause::Selection);
        Ok(())
    }

    /// Absolute `(anchor, focus)` offsets of the selection.
    pub fn get_selection_offsets(&self) -> Option<(usize, usize)> {
        let selection = self.selection?;
        let anchor = node_offset_to_buffer(
            &self.tree,
            selection.anchor.node_id,
            selection.anchor.offset,
        )?;
        let focus = node_offset_to_buffer(
            &self.tree,
            selection.focus.node_id,
            selection.focus.offset,
        )?;
        Some((anchor, focus))
    }

    pub fn set_selection_from_offsets(&mut self, anchor: usize, focus: usize) -> Result<(), EditError> {
        let resolve = |offset| {
            resolve_buffer_offset(&self.tree, offset)
                .map(|resolved| SelectionPoint::new(resolved.node_id, resolved.node_offset))
                .ok_or(EditError::UnresolvableOffset(offset))
        };
        let selection = Selection::new(resolve(anchor)?, resolve(focus)?);
        self.set_selection(selection)
    }

    /// Register a listener called after every successful mutating call.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&DocumentChange) + 'static,
    {
        let mut listeners = self.listeners.borrow_mut();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.active.push((id, Box::new(listener)));
        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            tree: Rc::clone(&self.tree),
            buffer: self.buffer.clone(),
            selection: self.selection,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.tree = snapshot.tree;
        self.buffer = snapshot.buffer;
        self.selection = snapshot.selection;
    }

    /// Run `edit`, then re-check every invariant; roll back if either fails.
    fn transact<T>(
        &mut self,
        cause: ChangeCause,
        edit: impl FnOnce(&mut Self) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        let saved = self.snapshot();
        let result = edit(self).and_then(|value| {
            self.tree.validate_within(self.buffer.len_chars())?;
            check_sentinels(&self.tree, &self.buffer, self.options.sentinel)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                self.notify(cause);
                Ok(value)
            }
            Err(err) => {
                if let EditError::Invariant(violation) = &err {
                    log::warn!("rolled back {cause:?}: {violation}");
                }
                self.restore(saved);
                Err(err)
            }
        }
    }

    fn notify(&mut self, cause: ChangeCause) {
        self.version += 1;
        let change = DocumentChange {
            version: self.version,
            cause,
            tree: Rc::clone(&self.tree),
            buffer: self.buffer.clone(),
            selection: self.selection,
        };

        // Lend the list out so listeners may subscribe or unsubscribe meanwhile
        let mut active = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.notifying = true;
            std::mem::take(&mut listeners.active)
        };
        for (id, listener) in active.iter_mut() {
            if self.listeners.borrow().removed.contains(id) {
                continue;
            }
            listener(&change);
        }
        let mut listeners = self.listeners.borrow_mut();
        listeners.notifying = false;
        let removed = std::mem::take(&mut listeners.removed);
        active.retain(|(id, _)| !removed.contains(id));
        active.append(&mut listeners.active);
        listeners.active = active;
    }

    /// Range of a paragraph, heading or table.
    fn text_block_range(&self, id: NodeId) -> Result<TextRange, EditError> {
        let block = find_block_by_id(&self.tree, id).ok_or(EditError::UnknownNode(id))?;
        block.text_range().ok_or(EditError::WrongKind {
            node_id: id,
            kind: block.kind(),
        })
    }

    fn insert_text(&mut self, id: NodeId, offset: usize, text: &str) -> Result<Vec<Range<usize>>, EditError> {
        if text.is_empty() {
            return Err(EditError::EmptyEdit);
        }
        let range = self.text_block_range(id)?;
        if offset > range.len() {
            return Err(EditError::OffsetOutOfRange {
                offset,
                len: range.len(),
            });
        }
        let leaf = self.tree.leaf_index(id).ok_or(EditError::UnknownNode(id))?;
        let len = text.chars().count();
        let pos = range.start + offset;

        self.buffer.insert(pos, text);
        let tree = Rc::make_mut(&mut self.tree);
        tree.shift_leaves_from(leaf + 1, len as isize);
        let block = find_block_by_id_mut(tree, id).ok_or(EditError::UnknownNode(id))?;
        if let Some(range) = block.text_range_mut() {
            range.end += len;
        }
        if let Some(block_marks) = block.marks_mut() {
            marks::shift_for_insert(block_marks, offset, len);
        }
        if block.kind() == BlockKind::Table {
            self.refresh_table_shape(id);
        }
        self.selection = Some(Selection::caret(id, offset + len));
        Ok(vec![pos..pos + len])
    }

    fn delete_text(&mut self, id: NodeId, offset: usize, len: usize) -> Result<Vec<Range<usize>>, EditError> {
        let range = self.text_block_range(id)?;
        if offset > range.len() {
            return Err(EditError::OffsetOutOfRange {
                offset,
                len: range.len(),
            });
        }
        let len = len.min(range.len() - offset);
        if len == 0 {
            return Err(EditError::NothingToDelete);
        }
        let leaf = self.tree.leaf_index(id).ok_or(EditError::UnknownNode(id))?;
        let pos = range.start + offset;

        self.buffer.delete(pos, len);
        let tree = Rc::make_mut(&mut self.tree);
        tree.shift_leaves_from(leaf + 1, -(len as isize));
        let block = find_block_by_id_mut(tree, id).ok_or(EditError::UnknownNode(id))?;
        if let Some(range) = block.text_range_mut() {
            range.end -= len;
        }
        if let Some(block_marks) = block.marks_mut() {
            marks::clip_for_delete(block_marks, offset, len);
        }
        if block.kind() == BlockKind::Table {
            self.refresh_table_shape(id);
        }
        self.selection = Some(Selection::caret(id, offset));
        Ok(vec![pos..pos])
    }

    fn format(
        &mut self,
        id: NodeId,
        start: usize,
        end: usize,
        attrs: &MarkAttrs,
    ) -> Result<Vec<Range<usize>>, EditError> {
        let range = self.text_block_range(id)?;
        let tree = Rc::make_mut(&mut self.tree);
        let block = find_block_by_id_mut(tree, id).ok_or(EditError::UnknownNode(id))?;
        let kind = block.kind();
        let block_marks = block
            .marks_mut()
            .ok_or(EditError::WrongKind { node_id: id, kind })?;
        if start >= end || end > range.len() {
            return Err(EditError::InvalidRange { start, end });
        }
        *block_marks = marks::apply_format(block_marks, start, end, attrs);
        Ok(vec![range.start + start..range.start + end])
    }

    fn insert_block(
        &mut self,
        parent: Option<NodeId>,
        index: usize,
        template: &NewBlock,
    ) -> Result<(Vec<Range<usize>>, NodeId), EditError> {
        let parent = match parent {
            Some(id) => id,
            None => self
                .tree
                .sections()
                .first()
                .map(|section| section.id)
                .ok_or(InvariantViolation::NoSections)?,
        };
        let (kind, count) = container_info(&self.tree, parent).ok_or_else(|| {
            if find_block_by_id(&self.tree, parent).is_some() || locate_block(&self.tree, parent).is_some() {
                EditError::NotContainer(parent)
            } else {
                EditError::UnknownNode(parent)
            }
        })?;
        if index > count {
            return Err(EditError::IndexOutOfRange { index, len: count });
        }
        if kind == ContainerKind::List && !template.is_list_content() {
            return Err(TemplateError::ListItemContent.into());
        }
        let before = leaves_before_slot(&self.tree, parent, index)
            .ok_or(EditError::IndexOutOfRange { index, len: count })?;
        let pos = boundary_position(&self.tree, before);

        let mut text = String::new();
        let block = template.materialize(pos, self.options.sentinel, &mut text)?;
        let id = block.id();
        let len = text.chars().count();

        self.buffer.insert(pos, &text);
        let tree = Rc::make_mut(&mut self.tree);
        tree.shift_leaves_from(before, len as isize);
        splice_child(tree, parent, index, block)?;
        Ok((vec![pos..pos + len], id))
    }

    fn delete_block(&mut self, id: NodeId) -> Result<Vec<Range<usize>>, EditError> {
        let mut target = id;
        let mut location = locate_block(&self.tree, id).ok_or(EditError::UnknownNode(id))?;

        // Containers emptied by the removal go with it
        loop {
            let (kind, count) = container_info(&self.tree, location.parent)
                .ok_or(EditError::UnknownNode(location.parent))?;
            if count > 1 {
                break;
            }
            if kind == ContainerKind::Section {
                return Err(EditError::LastBlockInSection(location.parent));
            }
            target = location.parent;
            location = locate_block(&self.tree, target).ok_or(EditError::UnknownNode(target))?;
        }

        let first = leaves_before_slot(&self.tree, location.parent, location.index)
            .ok_or(EditError::UnknownNode(target))?;
        let after = leaves_before_slot(&self.tree, location.parent, location.index + 1)
            .ok_or(EditError::UnknownNode(target))?;
        let leaves = self.tree.leaves();
        let span = if first < after {
            TextRange::new(leaves[first].span().start, leaves[after - 1].span().end)
        } else {
            let pos = boundary_position(&self.tree, first);
            TextRange::new(pos, pos)
        };
        log::debug!("delete block {target} spanning {}..{}", span.start, span.end);

        self.buffer.delete(span.start, span.len());
        let tree = Rc::make_mut(&mut self.tree);
        tree.shift_leaves_from(after, -(span.len() as isize));
        remove_child(tree, location.parent, location.index).ok_or(EditError::UnknownNode(target))?;
        self.repair_selection(span.start);
        Ok(vec![span.start..span.start])
    }

    /// Move a selection left pointing at removed nodes to the nearest text block start.
    fn repair_selection(&mut self, at: usize) {
        if let Some(selection) = self.selection {
            let valid = [selection.anchor, selection.focus].iter().all(|point| {
                node_offset_to_buffer(&self.tree, point.node_id, point.offset).is_some()
            });
            if valid {
                return;
            }
        }
        let text_leaves: Vec<Leaf> = self
            .tree
            .leaves()
            .into_iter()
            .filter(|leaf| matches!(leaf, Leaf::Text { .. }))
            .collect();
        let nearest = text_leaves
            .iter()
            .find(|leaf| leaf.span().start >= at)
            .or_else(|| text_leaves.last());
        self.selection = nearest.map(|leaf| Selection::caret(leaf.id(), 0));
    }

    /// Recount rows and columns after the text of a table changed.
    fn refresh_table_shape(&mut self, id: NodeId) {
        let tree = Rc::make_mut(&mut self.tree);
        if let Some(Block::Table(table)) = find_block_by_id_mut(tree, id) {
            let text = self.buffer.get_range(table.range.start, table.range.end);
            table.rows = text.split(Table::ROW_SEPARATOR).count();
            table.columns = text
                .split(Table::ROW_SEPARATOR)
                .map(|row| row.split(Table::COLUMN_SEPARATOR).count())
                .max()
                .unwrap_or(1);
        }
    }
}

/// Caret at the start of the first text block.
fn first_caret(tree: &DocumentTree) -> Option<Selection> {
    tree.leaves().into_iter().find_map(|leaf| match leaf {
        Leaf::Text { id, .. } => Some(Selection::caret(id, 0)),
        Leaf::Atomic { .. } => None,
    })
}

/// Buffer position right after the first `leaves_before` leaves.
fn boundary_position(tree: &DocumentTree, leaves_before: usize) -> usize {
    leaves_before
        .checked_sub(1)
        .and_then(|last| tree.leaves().get(last).map(|leaf| leaf.span().end))
        .unwrap_or(0)
}

/// Every image leaf must sit on a sentinel char.
pub(crate) fn check_sentinels(
    tree: &DocumentTree,
    buffer: &TextBuffer,
    sentinel: char,
) -> Result<(), InvariantViolation> {
    for leaf in tree.leaves() {
        if let Leaf::Atomic { id, position } = leaf {
            if buffer.char_at(position) != Some(sentinel) {
                return Err(InvariantViolation::MissingSentinel { id, position });
            }
        }
    }
    Ok(())
}

fn splice_child(tree: &mut DocumentTree, parent: NodeId, index: usize, block: Block) -> Result<(), EditError> {
    if let Some(section) = tree.root.children.iter_mut().find(|s| s.id == parent) {
        section.children.insert(index, block);
        return Ok(());
    }
    match find_block_by_id_mut(tree, parent) {
        Some(Block::Blockquote(quote)) => quote.children.insert(index, block),
        Some(Block::List(list)) => {
            let item = ListItem::new(block).ok_or(TemplateError::ListItemContent)?;
            list.items.insert(index, item);
        }
        Some(_) => return Err(EditError::NotContainer(parent)),
        None => return Err(EditError::UnknownNode(parent)),
    }
    Ok(())
}

fn remove_child(tree: &mut DocumentTree, parent: NodeId, index: usize) -> Option<()> {
    if let Some(section) = tree.root.children.iter_mut().find(|s| s.id == parent) {
        (index < section.children.len()).then(|| section.children.remove(index))?;
        return Some(());
    }
    match find_block_by_id_mut(tree, parent)? {
        Block::Blockquote(quote) if index < quote.children.len() => {
            quote.children.remove(index);
        }
        Block::List(list) if index < list.items.len() => {
            list.items.remove(index);
        }
        _ => return None,
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_id(engine: &EditorEngine) -> NodeId {
        engine.tree().sections()[0].children[0].id()
    }

    #[test]
    fn test_new_engine_has_caret_in_empty_paragraph() {
        let engine = EditorEngine::new();
        assert_eq!(engine.text(), "");
        assert_eq!(engine.selection(), Some(Selection::caret(first_id(&engine), 0)));
        assert_eq!(engine.get_selection_offsets(), Some((0, 0)));
        assert_eq!(engine.version(), 0);
    }

    #[test]
    fn test_unsubscribe_during_notification() {
        let mut engine = EditorEngine::new();
        let calls = Rc::new(RefCell::new(Vec::new()));

        let slot: Rc<RefCell<Option<Subscription>>> = Rc::default();
        let seen = Rc::clone(&calls);
        let own = Rc::clone(&slot);
        let subscription = engine.subscribe(move |change| {
            seen.borrow_mut().push(change.version);
            if let Some(subscription) = own.borrow_mut().take() {
                assert!(subscription.unsubscribe());
            }
        });
        *slot.borrow_mut() = Some(subscription);

        engine.load_plain_text("one");
        engine.load_plain_text("two");
        assert_eq!(*calls.borrow(), vec![1]);
    }

    #[test]
    fn test_unsubscribe_twice_reports_false() {
        let engine = EditorEngine::new();
        let first = engine.subscribe(|_| {});
        let id = first.id;
        assert!(first.unsubscribe());
        let stale = Subscription {
            id,
            listeners: Rc::downgrade(&engine.listeners),
        };
        assert!(!stale.unsubscribe());
    }

    #[test]
    fn test_subscription_outliving_engine() {
        let engine = EditorEngine::new();
        let subscription = engine.subscribe(|_| {});
        drop(engine);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_check_sentinels_reports_missing_char() {
        let buffer = TextBuffer::from_text("ab");
        let tree = DocumentTree::from_sections(vec![crate::editing::Section::new(vec![
            Block::Paragraph(crate::editing::Paragraph::new(TextRange::new(0, 1))),
            Block::Image(Image::new(1, Asset::default())),
        ])]);
        assert!(matches!(
            check_sentinels(&tree, &buffer, '\u{FFFC}'),
            Err(InvariantViolation::MissingSentinel { position: 1, .. })
        ));
        assert!(check_sentinels(&tree, &buffer, 'b').is_ok());
    }

    #[test]
    fn test_rolled_back_image_insert_keeps_history() {
        let mut engine = EditorEngine::new();
        engine.load_plain_text("ab");
        let paragraph = first_id(&engine);
        engine.push_history();
        engine
            .apply(Operation::Insert {
                node_id: paragraph,
                offset: 0,
                text: "x".to_string(),
            })
            .unwrap();
        assert!(engine.undo());
        assert!(engine.can_redo());

        // An image leaf sitting on 'b' makes the post-edit sentinel check fail
        let text_block = crate::editing::Paragraph::new(TextRange::new(0, 1));
        let anchor = text_block.id;
        engine.tree = Rc::new(DocumentTree::from_sections(vec![crate::editing::Section::new(
            vec![
                Block::Paragraph(text_block),
                Block::Image(Image::new(1, Asset::default())),
            ],
        )]));
        engine.selection = Some(Selection::caret(anchor, 0));
        let version = engine.version();

        assert!(matches!(
            engine.insert_image(Asset::default()),
            Err(EditError::Invariant(InvariantViolation::MissingSentinel { .. }))
        ));
        assert_eq!(engine.text(), "ab");
        assert_eq!(engine.version(), version);
        assert!(engine.can_redo());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: EngineOptions = serde_json::from_str(r#"{"historyLimit": 3}"#).unwrap();
        assert_eq!(options, EngineOptions::default());
        let options: EngineOptions = serde_json::from_str(r#"{"history_limit": 3}"#).unwrap();
        assert_eq!(options.history_limit, 3);
        assert_eq!(options.sentinel, '\u{FFFC}');
    }
}
