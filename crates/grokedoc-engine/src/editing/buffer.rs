use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use xi_rope::Rope;
use xi_rope::delta::Builder;

/// One entry of the buffer's edit log.
///
/// Positions and lengths count Unicode scalar values, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Chunk {
    Insert {
        pos: usize,
        data: String,
    },
    Delete {
        pos: usize,
        len: usize,
    },
    /// Marker written by older saves to describe the base text. Replay skips it.
    Original {
        #[serde(default)]
        offset: usize,
        #[serde(default)]
        len: usize,
    },
}

/// Persistable state of a [`TextBuffer`]: immutable base text plus the edit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferContent {
    pub base_text: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl BufferContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            base_text: text.into(),
            chunks: Vec::new(),
        }
    }

    /// Reconstruct the current text by replaying the log over the base text.
    ///
    /// Each chunk applies to the text as it stands after every earlier chunk.
    /// Positions past the end are clamped, matching how [`TextBuffer`] records them.
    pub fn replay(&self) -> String {
        let mut text = self.base_text.clone();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Insert { pos, data } => {
                    let at = byte_offset(&text, *pos);
                    text.insert_str(at, data);
                }
                Chunk::Delete { pos, len } => {
                    let start = byte_offset(&text, *pos);
                    let end = start + byte_offset(&text[start..], *len);
                    text.replace_range(start..end, "");
                }
                Chunk::Original { .. } => {}
            }
        }
        text
    }
}

/// Piece-table text buffer.
///
/// The authoritative state is the [`BufferContent`] log. A materialized
/// `xi_rope::Rope` is kept alongside it so reads don't replay the whole log;
/// both are updated together by every edit and `rope == content.replay()`
/// holds between calls.
///
/// The content is reference counted so history snapshots share it until
/// the next edit.
#[derive(Clone)]
pub struct TextBuffer {
    content: Rc<BufferContent>,
    rope: Rope,
    len_chars: usize,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::from_content(BufferContent::default())
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("len_chars", &self.len_chars)
            .field("chunks", &self.content.chunks.len())
            .finish()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a buffer whose base text is `text` and whose log is empty.
    pub fn from_text(text: &str) -> Self {
        Self::from_content(BufferContent::from_text(text))
    }

    pub fn from_content(content: BufferContent) -> Self {
        let text = content.replay();
        Self {
            len_chars: text.chars().count(),
            rope: Rope::from(text),
            content: Rc::new(content),
        }
    }

    /// Full current text.
    pub fn get_text(&self) -> String {
        self.rope.to_string()
    }

    /// Text in `[start, end)`, clamped to the buffer.
    pub fn get_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len_chars);
        let start = start.min(end);
        let from = self.byte_at(start);
        let to = self.byte_at(end);
        self.rope.slice_to_cow(from..to).into_owned()
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        if pos >= self.len_chars {
            return None;
        }
        self.get_range(pos, pos + 1).chars().next()
    }

    pub fn len_chars(&self) -> usize {
        self.len_chars
    }

    pub fn is_empty(&self) -> bool {
        self.len_chars == 0
    }

    /// Append an insert chunk. Empty text is a no-op.
    pub fn insert(&mut self, pos: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = pos.min(self.len_chars);
        let at = self.byte_at(pos);

        let mut builder = Builder::new(self.rope.len());
        builder.replace(at..at, Rope::from(text));
        self.rope = builder.build().apply(&self.rope);

        self.len_chars += text.chars().count();
        Rc::make_mut(&mut self.content).chunks.push(Chunk::Insert {
            pos,
            data: text.to_string(),
        });
    }

    /// Append a delete chunk. Zero length, or nothing left after clamping, is a no-op.
    pub fn delete(&mut self, pos: usize, len: usize) {
        let pos = pos.min(self.len_chars);
        let len = len.min(self.len_chars - pos);
        if len == 0 {
            return;
        }
        let start = self.byte_at(pos);
        let end = self.byte_at(pos + len);

        let mut builder = Builder::new(self.rope.len());
        builder.delete(start..end);
        self.rope = builder.build().apply(&self.rope);

        self.len_chars -= len;
        Rc::make_mut(&mut self.content)
            .chunks
            .push(Chunk::Delete { pos, len });
    }

    /// Copy of the persistable state.
    pub fn to_content(&self) -> BufferContent {
        (*self.content).clone()
    }

    pub fn content(&self) -> &BufferContent {
        &self.content
    }

    /// Replace the whole buffer (undo/redo/load).
    pub fn replace_content(&mut self, content: BufferContent) {
        *self = Self::from_content(content);
    }

    pub(crate) fn shares_content_with(&self, other: &TextBuffer) -> bool {
        Rc::ptr_eq(&self.content, &other.content)
    }

    /// Byte offset of char `pos` in the rope, found leaf by leaf.
    fn byte_at(&self, pos: usize) -> usize {
        let mut remaining = pos;
        let mut base = 0;
        for chunk in self.rope.iter_chunks(0..self.rope.len()) {
            let chars = chunk.chars().count();
            if remaining < chars {
                return base + byte_offset(chunk, remaining);
            }
            remaining -= chars;
            base += chunk.len();
        }
        self.rope.len()
    }
}

/// Byte index of the `char_pos`-th char, clamped to the end of `text`.
pub(crate) fn byte_offset(text: &str, char_pos: usize) -> usize {
    text.char_indices()
        .nth(char_pos)
        .map_or(text.len(), |(index, _)| index)
}
