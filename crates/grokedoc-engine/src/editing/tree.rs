use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique node identifier, assigned at creation and never reused.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn generate() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Half-open buffer range `[start, end)` in chars.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Both ends inclusive, so a caret sitting at `end` still belongs here.
    pub fn contains_inclusive(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    pub(crate) fn shift(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
        self.end = self.end.saturating_add_signed(delta);
    }
}

/// Inline formatting attributes. `None` means "not set here".
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl MarkAttrs {
    pub fn bold() -> Self {
        Self {
            bold: Some(true),
            ..Self::default()
        }
    }

    pub fn italic() -> Self {
        Self {
            italic: Some(true),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copy every attribute `over` sets onto `self`.
    pub fn layer(&mut self, over: &MarkAttrs) {
        fn pick<T: Clone>(slot: &mut Option<T>, over: &Option<T>) {
            if let Some(value) = over {
                *slot = Some(value.clone());
            }
        }
        pick(&mut self.bold, &over.bold);
        pick(&mut self.italic, &over.italic);
        pick(&mut self.underline, &over.underline);
        pick(&mut self.strikethrough, &over.strikethrough);
        pick(&mut self.code, &over.code);
        pick(&mut self.link, &over.link);
        pick(&mut self.color, &over.color);
    }
}

/// Inline mark; offsets are relative to the owning block's range start.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Mark {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub attrs: MarkAttrs,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub id: NodeId,
    pub range: TextRange,
    #[serde(default)]
    pub marks: Vec<Mark>,
    #[serde(default)]
    pub alignment: Alignment,
}

impl Paragraph {
    pub fn new(range: TextRange) -> Self {
        Self {
            id: NodeId::generate(),
            range,
            marks: Vec::new(),
            alignment: Alignment::default(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    pub id: NodeId,
    pub level: u8,
    pub range: TextRange,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

impl Heading {
    pub fn new(level: u8, range: TextRange) -> Self {
        Self {
            id: NodeId::generate(),
            level,
            range,
            marks: Vec::new(),
        }
    }
}

/// Embedded asset. The bytes travel with the node so a document is self-contained.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

/// Atomic image occupying the single sentinel char at `buffer_position`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: NodeId,
    pub buffer_position: usize,
    pub asset: Asset,
}

impl Image {
    pub fn new(buffer_position: usize, asset: Asset) -> Self {
        Self {
            id: NodeId::generate(),
            buffer_position,
            asset,
        }
    }
}

/// Table whose cells are packed into one range: `\t` between columns, `\n` between rows.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: NodeId,
    pub range: TextRange,
    pub rows: usize,
    pub columns: usize,
}

impl Table {
    pub const COLUMN_SEPARATOR: char = '\t';
    pub const ROW_SEPARATOR: char = '\n';

    pub fn new(range: TextRange, rows: usize, columns: usize) -> Self {
        Self {
            id: NodeId::generate(),
            range,
            rows,
            columns,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blockquote {
    pub id: NodeId,
    pub children: Vec<Block>,
}

impl Blockquote {
    pub fn new(children: Vec<Block>) -> Self {
        Self {
            id: NodeId::generate(),
            children,
        }
    }
}

/// List entry; `content` is always a paragraph or heading.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub id: NodeId,
    pub content: Block,
}

impl ListItem {
    /// Returns `None` unless `content` is a paragraph or heading.
    pub fn new(content: Block) -> Option<Self> {
        matches!(content, Block::Paragraph(_) | Block::Heading(_)).then(|| Self {
            id: NodeId::generate(),
            content,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: NodeId,
    #[serde(default)]
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

impl List {
    pub fn new(ordered: bool, items: Vec<ListItem>) -> Self {
        Self {
            id: NodeId::generate(),
            ordered,
            items,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BlockKind {
    Paragraph,
    Heading,
    Image,
    Table,
    Blockquote,
    List,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading => "heading",
            BlockKind::Image => "image",
            BlockKind::Table => "table",
            BlockKind::Blockquote => "blockquote",
            BlockKind::List => "list",
        };
        f.write_str(name)
    }
}

/// Content block, tagged by `type` when serialized.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph(Paragraph),
    Heading(Heading),
    Image(Image),
    Table(Table),
    Blockquote(Blockquote),
    List(List),
}

impl Block {
    pub fn id(&self) -> NodeId {
        match self {
            Block::Paragraph(p) => p.id,
            Block::Heading(h) => h.id,
            Block::Image(i) => i.id,
            Block::Table(t) => t.id,
            Block::Blockquote(q) => q.id,
            Block::List(l) => l.id,
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Paragraph(_) => BlockKind::Paragraph,
            Block::Heading(_) => BlockKind::Heading,
            Block::Image(_) => BlockKind::Image,
            Block::Table(_) => BlockKind::Table,
            Block::Blockquote(_) => BlockKind::Blockquote,
            Block::List(_) => BlockKind::List,
        }
    }

    /// Own text range of a text-bearing block (paragraph, heading, table).
    pub fn text_range(&self) -> Option<TextRange> {
        match self {
            Block::Paragraph(p) => Some(p.range),
            Block::Heading(h) => Some(h.range),
            Block::Table(t) => Some(t.range),
            Block::Image(_) | Block::Blockquote(_) | Block::List(_) => None,
        }
    }

    pub(crate) fn text_range_mut(&mut self) -> Option<&mut TextRange> {
        match self {
            Block::Paragraph(p) => Some(&mut p.range),
            Block::Heading(h) => Some(&mut h.range),
            Block::Table(t) => Some(&mut t.range),
            Block::Image(_) | Block::Blockquote(_) | Block::List(_) => None,
        }
    }

    pub fn marks(&self) -> Option<&[Mark]> {
        match self {
            Block::Paragraph(p) => Some(&p.marks),
            Block::Heading(h) => Some(&h.marks),
            _ => None,
        }
    }

    pub(crate) fn marks_mut(&mut self) -> Option<&mut Vec<Mark>> {
        match self {
            Block::Paragraph(p) => Some(&mut p.marks),
            Block::Heading(h) => Some(&mut h.marks),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in points.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 72.0,
            right: 72.0,
            bottom: 72.0,
            left: 72.0,
        }
    }
}

/// Page geometry in points; defaults to A4 portrait with one-inch margins.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margins: Margins::default(),
            orientation: Orientation::default(),
        }
    }
}

/// Page-layout container. Never left without blocks.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: NodeId,
    #[serde(default)]
    pub layout: PageLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub children: Vec<Block>,
}

impl Section {
    pub fn new(children: Vec<Block>) -> Self {
        Self {
            id: NodeId::generate(),
            layout: PageLayout::default(),
            header: None,
            footer: None,
            children,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Root {
    pub children: Vec<Section>,
}

/// Leaf of the tree in document order: something that occupies buffer text.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Leaf {
    Text { id: NodeId, range: TextRange },
    Atomic { id: NodeId, position: usize },
}

impl Leaf {
    pub fn id(&self) -> NodeId {
        match self {
            Leaf::Text { id, .. } | Leaf::Atomic { id, .. } => *id,
        }
    }

    /// Buffer range covered by the leaf; an atomic leaf covers its single sentinel.
    pub fn span(&self) -> TextRange {
        match self {
            Leaf::Text { range, .. } => *range,
            Leaf::Atomic { position, .. } => TextRange::new(*position, position + 1),
        }
    }
}

pub(crate) enum LeafMut<'a> {
    Text(&'a mut TextRange),
    Atomic(&'a mut usize),
}

impl LeafMut<'_> {
    pub(crate) fn shift(&mut self, delta: isize) {
        match self {
            LeafMut::Text(range) => range.shift(delta),
            LeafMut::Atomic(position) => **position = position.saturating_add_signed(delta),
        }
    }
}

/// Broken structural invariant. Any of these poisons later offset resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Document has no sections")]
    NoSections,
    #[error("Section {0} has no blocks")]
    EmptySection(NodeId),
    #[error("Node id {0} is used more than once")]
    DuplicateId(NodeId),
    #[error("Range of {id} is inverted: {start}..{end}")]
    InvertedRange { id: NodeId, start: usize, end: usize },
    #[error("Node {id} starts at {start}, before the previous node ends at {previous_end}")]
    OutOfOrder {
        id: NodeId,
        start: usize,
        previous_end: usize,
    },
    #[error("Node {id} ends at {end}, past the end of the text ({len})")]
    BeyondText { id: NodeId, end: usize, len: usize },
    #[error("Heading {id} has level {level}, expected 1..=6")]
    HeadingLevel { id: NodeId, level: u8 },
    #[error("List item {0} must wrap a paragraph or heading")]
    ListItemContent(NodeId),
    #[error("Marks of {0} overlap, are unsorted or exceed the block")]
    Marks(NodeId),
    #[error("Image {id} has no sentinel at {position}")]
    MissingSentinel { id: NodeId, position: usize },
}

/// Structural document tree: root → sections → blocks.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct DocumentTree {
    pub root: Root,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl DocumentTree {
    /// Minimum valid document: one section holding one empty paragraph.
    pub fn empty() -> Self {
        Self::single_paragraph(0)
    }

    /// One section with one paragraph spanning `[0, len)`.
    pub fn single_paragraph(len: usize) -> Self {
        let paragraph = Paragraph::new(TextRange::new(0, len));
        Self::from_sections(vec![Section::new(vec![Block::Paragraph(paragraph)])])
    }

    pub fn from_sections(sections: Vec<Section>) -> Self {
        Self {
            root: Root { children: sections },
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.root.children
    }

    /// Every leaf in document order.
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut out = Vec::new();
        for section in &self.root.children {
            collect_leaves(&section.children, &mut out);
        }
        out
    }

    pub(crate) fn leaves_mut(&mut self) -> Vec<LeafMut<'_>> {
        let mut out = Vec::new();
        for section in &mut self.root.children {
            collect_leaves_mut(&mut section.children, &mut out);
        }
        out
    }

    /// Position of the leaf `id` in document order.
    pub fn leaf_index(&self, id: NodeId) -> Option<usize> {
        self.leaves().iter().position(|leaf| leaf.id() == id)
    }

    /// Shift every leaf from index `first` on by `delta`.
    pub(crate) fn shift_leaves_from(&mut self, first: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        let mut shifted = 0;
        for mut leaf in self.leaves_mut().into_iter().skip(first) {
            leaf.shift(delta);
            shifted += 1;
        }
        log::trace!("shifted {shifted} leaves from #{first} by {delta}");
    }

    /// Check the structural invariants that do not depend on the buffer.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.root.children.is_empty() {
            return Err(InvariantViolation::NoSections);
        }

        let mut ids = HashSet::new();
        for section in &self.root.children {
            if !ids.insert(section.id) {
                return Err(InvariantViolation::DuplicateId(section.id));
            }
            if section.children.is_empty() {
                return Err(InvariantViolation::EmptySection(section.id));
            }
            validate_blocks(&section.children, &mut ids)?;
        }

        let mut previous_end = 0;
        for leaf in self.leaves() {
            let span = leaf.span();
            if span.start > span.end {
                return Err(InvariantViolation::InvertedRange {
                    id: leaf.id(),
                    start: span.start,
                    end: span.end,
                });
            }
            if span.start < previous_end {
                return Err(InvariantViolation::OutOfOrder {
                    id: leaf.id(),
                    start: span.start,
                    previous_end,
                });
            }
            previous_end = span.end;
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus every leaf lying inside a text of `len` chars.
    pub fn validate_within(&self, len: usize) -> Result<(), InvariantViolation> {
        self.validate()?;
        if let Some(last) = self.leaves().last() {
            let end = last.span().end;
            if end > len {
                return Err(InvariantViolation::BeyondText {
                    id: last.id(),
                    end,
                    len,
                });
            }
        }
        Ok(())
    }
}

fn collect_leaves(blocks: &[Block], out: &mut Vec<Leaf>) {
    for block in blocks {
        match block {
            Block::Paragraph(Paragraph { id, range, .. })
            | Block::Heading(Heading { id, range, .. })
            | Block::Table(Table { id, range, .. }) => out.push(Leaf::Text {
                id: *id,
                range: *range,
            }),
            Block::Image(image) => out.push(Leaf::Atomic {
                id: image.id,
                position: image.buffer_position,
            }),
            Block::Blockquote(quote) => collect_leaves(&quote.children, out),
            Block::List(list) => {
                for item in &list.items {
                    collect_leaves(std::slice::from_ref(&item.content), out);
                }
            }
        }
    }
}

fn collect_leaves_mut<'a>(blocks: &'a mut [Block], out: &mut Vec<LeafMut<'a>>) {
    for block in blocks {
        match block {
            Block::Paragraph(Paragraph { range, .. })
            | Block::Heading(Heading { range, .. })
            | Block::Table(Table { range, .. }) => out.push(LeafMut::Text(range)),
            Block::Image(image) => out.push(LeafMut::Atomic(&mut image.buffer_position)),
            Block::Blockquote(quote) => collect_leaves_mut(&mut quote.children, out),
            Block::List(list) => {
                for item in &mut list.items {
                    collect_leaves_mut(std::slice::from_mut(&mut item.content), out);
                }
            }
        }
    }
}

/// Number of leaves under `blocks`.
pub(crate) fn count_leaves(blocks: &[Block]) -> usize {
    let mut out = Vec::new();
    collect_leaves(blocks, &mut out);
    out.len()
}

fn validate_blocks(blocks: &[Block], ids: &mut HashSet<NodeId>) -> Result<(), InvariantViolation> {
    for block in blocks {
        let id = block.id();
        if !ids.insert(id) {
            return Err(InvariantViolation::DuplicateId(id));
        }
        match block {
            Block::Paragraph(Paragraph { range, marks, .. }) => validate_marks(id, *range, marks)?,
            Block::Heading(heading) => {
                if !(1..=6).contains(&heading.level) {
                    return Err(InvariantViolation::HeadingLevel {
                        id,
                        level: heading.level,
                    });
                }
                validate_marks(id, heading.range, &heading.marks)?;
            }
            Block::Image(_) | Block::Table(_) => {}
            Block::Blockquote(quote) => validate_blocks(&quote.children, ids)?,
            Block::List(list) => {
                for item in &list.items {
                    if !ids.insert(item.id) {
                        return Err(InvariantViolation::DuplicateId(item.id));
                    }
                    if !matches!(item.content, Block::Paragraph(_) | Block::Heading(_)) {
                        return Err(InvariantViolation::ListItemContent(item.id));
                    }
                    validate_blocks(std::slice::from_ref(&item.content), ids)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_marks(id: NodeId, range: TextRange, marks: &[Mark]) -> Result<(), InvariantViolation> {
    let mut previous_end = 0;
    for mark in marks {
        if mark.start >= mark.end || mark.start < previous_end || mark.end > range.len() {
            return Err(InvariantViolation::Marks(id));
        }
        previous_end = mark.end;
    }
    Ok(())
}
