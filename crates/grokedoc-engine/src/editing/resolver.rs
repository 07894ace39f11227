//! Mapping between absolute buffer offsets and node-relative positions.
//!
//! Boundary rule: an offset on the shared boundary of two adjacent blocks
//! belongs to the earlier block. Ranges are matched end-inclusive in a forward
//! scan, so the first candidate wins. Anything else that maps offsets to
//! nodes (search hits, selection) goes through this module to keep one rule.

use serde::{Deserialize, Serialize};

use crate::editing::tree::{Block, DocumentTree, Leaf, NodeId, TextRange, count_leaves};

/// A buffer offset expressed relative to a node.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOffset {
    pub node_id: NodeId,
    pub node_offset: usize,
}

/// Kind of container a block can be spliced into.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ContainerKind {
    Section,
    Blockquote,
    List,
}

/// Where a block (or list item) sits in its parent.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BlockLocation {
    pub parent: NodeId,
    pub parent_kind: ContainerKind,
    pub index: usize,
}

/// Buffer range spanned by a block and its descendants.
///
/// An image spans its single sentinel. Containers span from their first to
/// their last descendant leaf and have no span when they hold no leaves.
pub fn get_block_span(block: &Block) -> Option<TextRange> {
    match block {
        Block::Paragraph(p) => Some(p.range),
        Block::Heading(h) => Some(h.range),
        Block::Table(t) => Some(t.range),
        Block::Image(image) => Some(TextRange::new(
            image.buffer_position,
            image.buffer_position + 1,
        )),
        Block::Blockquote(quote) => merge_spans(quote.children.iter()),
        Block::List(list) => merge_spans(list.items.iter().map(|item| &item.content)),
    }
}

fn merge_spans<'a>(blocks: impl Iterator<Item = &'a Block>) -> Option<TextRange> {
    blocks
        .filter_map(get_block_span)
        .reduce(|acc, span| TextRange::new(acc.start.min(span.start), acc.end.max(span.end)))
}

/// First text-bearing block whose range contains `offset` (both ends inclusive).
///
/// Returns `None` when the offset lands on an image's sentinel or outside every range.
pub fn resolve_buffer_offset(tree: &DocumentTree, offset: usize) -> Option<ResolvedOffset> {
    for leaf in tree.leaves() {
        match leaf {
            Leaf::Text { id, range } if range.contains_inclusive(offset) => {
                return Some(ResolvedOffset {
                    node_id: id,
                    node_offset: offset - range.start,
                });
            }
            Leaf::Atomic { position, .. } if position == offset => return None,
            _ => {}
        }
    }
    None
}

/// Inverse of [`resolve_buffer_offset`]. Images accept offsets 0 (before) and 1 (after).
pub fn node_offset_to_buffer(tree: &DocumentTree, id: NodeId, offset: usize) -> Option<usize> {
    match find_block_by_id(tree, id)? {
        Block::Image(image) => (offset <= 1).then_some(image.buffer_position + offset),
        block => {
            let range = block.text_range()?;
            (offset <= range.len()).then_some(range.start + offset)
        }
    }
}

/// Section index and top-level block index of the block containing `id` at any depth.
pub fn find_section_and_block_index(tree: &DocumentTree, id: NodeId) -> Option<(usize, usize)> {
    tree.sections()
        .iter()
        .enumerate()
        .find_map(|(section_index, section)| {
            section
                .children
                .iter()
                .position(|block| contains_node(block, id))
                .map(|block_index| (section_index, block_index))
        })
}

fn contains_node(block: &Block, id: NodeId) -> bool {
    if block.id() == id {
        return true;
    }
    match block {
        Block::Blockquote(quote) => quote.children.iter().any(|child| contains_node(child, id)),
        Block::List(list) => list
            .items
            .iter()
            .any(|item| item.id == id || contains_node(&item.content, id)),
        _ => false,
    }
}

/// Block with `id`, reaching into blockquotes and list items.
pub fn find_block_by_id(tree: &DocumentTree, id: NodeId) -> Option<&Block> {
    tree.sections()
        .iter()
        .find_map(|section| find_in_blocks(&section.children, id))
}

fn find_in_blocks(blocks: &[Block], id: NodeId) -> Option<&Block> {
    for block in blocks {
        if block.id() == id {
            return Some(block);
        }
        let found = match block {
            Block::Blockquote(quote) => find_in_blocks(&quote.children, id),
            Block::List(list) => list
                .items
                .iter()
                .find_map(|item| find_in_blocks(std::slice::from_ref(&item.content), id)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

pub fn find_block_by_id_mut(tree: &mut DocumentTree, id: NodeId) -> Option<&mut Block> {
    tree.root
        .children
        .iter_mut()
        .find_map(|section| find_in_blocks_mut(&mut section.children, id))
}

fn find_in_blocks_mut(blocks: &mut [Block], id: NodeId) -> Option<&mut Block> {
    for block in blocks {
        if block.id() == id {
            return Some(block);
        }
        let found = match block {
            Block::Blockquote(quote) => find_in_blocks_mut(&mut quote.children, id),
            Block::List(list) => list
                .items
                .iter_mut()
                .find_map(|item| find_in_blocks_mut(std::slice::from_mut(&mut item.content), id)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Buffer range of a block or list item.
pub fn get_node_buffer_range(tree: &DocumentTree, id: NodeId) -> Option<TextRange> {
    if let Some(block) = find_block_by_id(tree, id) {
        return get_block_span(block);
    }
    let location = locate_block(tree, id)?;
    match find_block_by_id(tree, location.parent)? {
        Block::List(list) => get_block_span(&list.items.get(location.index)?.content),
        _ => None,
    }
}

/// Parent container and index of a block or list item.
pub fn locate_block(tree: &DocumentTree, id: NodeId) -> Option<BlockLocation> {
    tree.sections().iter().find_map(|section| {
        locate_in_blocks(&section.children, section.id, ContainerKind::Section, id)
    })
}

fn locate_in_blocks(
    blocks: &[Block],
    parent: NodeId,
    parent_kind: ContainerKind,
    id: NodeId,
) -> Option<BlockLocation> {
    for (index, block) in blocks.iter().enumerate() {
        if block.id() == id {
            return Some(BlockLocation {
                parent,
                parent_kind,
                index,
            });
        }
        let found = match block {
            Block::Blockquote(quote) => {
                locate_in_blocks(&quote.children, quote.id, ContainerKind::Blockquote, id)
            }
            Block::List(list) => list
                .items
                .iter()
                .position(|item| item.id == id || item.content.id() == id)
                .map(|index| BlockLocation {
                    parent: list.id,
                    parent_kind: ContainerKind::List,
                    index,
                }),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Kind and child count of the container `id`, if it is one.
pub fn container_info(tree: &DocumentTree, id: NodeId) -> Option<(ContainerKind, usize)> {
    if let Some(section) = tree.sections().iter().find(|section| section.id == id) {
        return Some((ContainerKind::Section, section.children.len()));
    }
    match find_block_by_id(tree, id)? {
        Block::Blockquote(quote) => Some((ContainerKind::Blockquote, quote.children.len())),
        Block::List(list) => Some((ContainerKind::List, list.items.len())),
        _ => None,
    }
}

/// Number of leaves that precede child slot `index` of container `parent` in document order.
pub(crate) fn leaves_before_slot(tree: &DocumentTree, parent: NodeId, index: usize) -> Option<usize> {
    let mut count = 0;
    for section in tree.sections() {
        if section.id == parent {
            return Some(count + count_leaves(section.children.get(..index)?));
        }
        if let Some(found) = leaves_before_in(&section.children, parent, index, &mut count) {
            return found;
        }
    }
    None
}

/// `Some(result)` once `parent` is reached; `None` to keep scanning.
fn leaves_before_in(
    blocks: &[Block],
    parent: NodeId,
    index: usize,
    count: &mut usize,
) -> Option<Option<usize>> {
    for block in blocks {
        match block {
            Block::Blockquote(quote) if quote.id == parent => {
                return Some(
                    quote
                        .children
                        .get(..index)
                        .map(|before| *count + count_leaves(before)),
                );
            }
            Block::List(list) if list.id == parent => {
                return Some((index <= list.items.len()).then_some(*count + index));
            }
            Block::Blockquote(quote) => {
                if let Some(found) = leaves_before_in(&quote.children, parent, index, count) {
                    return Some(found);
                }
            }
            Block::List(list) => *count += list.items.len(),
            Block::Paragraph(_) | Block::Heading(_) | Block::Table(_) | Block::Image(_) => {
                *count += 1
            }
        }
    }
    None
}
