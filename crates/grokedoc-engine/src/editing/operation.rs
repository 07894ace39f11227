use serde::{Deserialize, Serialize};

use crate::editing::tree::{
    Asset, Block, Blockquote, Heading, Image, List, ListItem, MarkAttrs, NodeId, Paragraph, Table,
    TextRange,
};

/// Edit operations accepted by [`EditorEngine::apply`](crate::editing::EditorEngine::apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    #[serde(rename_all = "camelCase")]
    Insert {
        node_id: NodeId,
        offset: usize,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Delete {
        node_id: NodeId,
        offset: usize,
        len: usize,
    },
    #[serde(rename_all = "camelCase")]
    Format {
        node_id: NodeId,
        start: usize,
        end: usize,
        attrs: MarkAttrs,
    },
    /// Splice a new block into a section, blockquote or list (`parent: None` = first section).
    #[serde(rename_all = "camelCase")]
    InsertBlock {
        #[serde(default)]
        parent: Option<NodeId>,
        index: usize,
        block: NewBlock,
    },
    #[serde(rename_all = "camelCase")]
    DeleteBlock { node_id: NodeId },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Delete { .. } => "delete",
            Operation::Format { .. } => "format",
            Operation::InsertBlock { .. } => "insertBlock",
            Operation::DeleteBlock { .. } => "deleteBlock",
        }
    }
}

/// Template for a block created by `InsertBlock`; ids and ranges are assigned on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NewBlock {
    Paragraph {
        #[serde(default)]
        text: String,
    },
    Heading {
        level: u8,
        #[serde(default)]
        text: String,
    },
    Table {
        cells: Vec<Vec<String>>,
    },
    Image {
        asset: Asset,
    },
    Blockquote {
        children: Vec<NewBlock>,
    },
    List {
        #[serde(default)]
        ordered: bool,
        items: Vec<NewBlock>,
    },
}

/// Why a template could not be turned into a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Heading level {0} is outside 1..=6")]
    HeadingLevel(u8),
    #[error("List items must be paragraphs or headings")]
    ListItemContent,
    #[error("Table needs at least one row and one column")]
    EmptyTable,
    #[error("Table cell contains a row or column separator")]
    CellSeparator,
}

impl NewBlock {
    pub fn paragraph(text: impl Into<String>) -> Self {
        NewBlock::Paragraph { text: text.into() }
    }

    pub fn is_list_content(&self) -> bool {
        matches!(self, NewBlock::Paragraph { .. } | NewBlock::Heading { .. })
    }

    /// Build the block with fresh ids, starting at buffer position `start`.
    ///
    /// The text the block occupies is appended to `text`; `start` is the
    /// position `text`'s first char will have once inserted.
    pub(crate) fn materialize(
        &self,
        start: usize,
        sentinel: char,
        text: &mut String,
    ) -> Result<Block, TemplateError> {
        let mut cursor = start + text.chars().count();
        let mut push = |s: &str, text: &mut String| {
            let range = TextRange::new(cursor, cursor + s.chars().count());
            text.push_str(s);
            cursor = range.end;
            range
        };

        let block = match self {
            NewBlock::Paragraph { text: content } => {
                Block::Paragraph(Paragraph::new(push(content, text)))
            }
            NewBlock::Heading {
                level,
                text: content,
            } => {
                if !(1..=6).contains(level) {
                    return Err(TemplateError::HeadingLevel(*level));
                }
                Block::Heading(Heading::new(*level, push(content, text)))
            }
            NewBlock::Table { cells } => {
                let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
                if columns == 0 {
                    return Err(TemplateError::EmptyTable);
                }
                let separators = [Table::COLUMN_SEPARATOR, Table::ROW_SEPARATOR];
                if cells.iter().flatten().any(|cell| cell.contains(separators)) {
                    return Err(TemplateError::CellSeparator);
                }
                let column_separator = Table::COLUMN_SEPARATOR.to_string();
                let row_separator = Table::ROW_SEPARATOR.to_string();
                let packed = cells
                    .iter()
                    .map(|row| {
                        let mut row = row.clone();
                        row.resize(columns, String::new());
                        row.join(column_separator.as_str())
                    })
                    .collect::<Vec<_>>()
                    .join(row_separator.as_str());
                Block::Table(Table::new(push(&packed, text), cells.len(), columns))
            }
            NewBlock::Image { asset } => {
                let position = push(&sentinel.to_string(), text).start;
                Block::Image(Image::new(position, asset.clone()))
            }
            NewBlock::Blockquote { children } => {
                let children = children
                    .iter()
                    .map(|child| child.materialize(start, sentinel, text))
                    .collect::<Result<Vec<_>, _>>()?;
                Block::Blockquote(Blockquote::new(children))
            }
            NewBlock::List { ordered, items } => {
                let items = items
                    .iter()
                    .map(|item| {
                        if !item.is_list_content() {
                            return Err(TemplateError::ListItemContent);
                        }
                        let content = item.materialize(start, sentinel, text)?;
                        ListItem::new(content).ok_or(TemplateError::ListItemContent)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Block::List(List::new(*ordered, items))
            }
        };
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::tree::{DocumentTree, Leaf, Section};
    use pretty_assertions::assert_eq;

    fn spans(block: Block) -> Vec<TextRange> {
        DocumentTree::from_sections(vec![Section::new(vec![block])])
            .leaves()
            .iter()
            .map(Leaf::span)
            .collect()
    }

    #[test]
    fn test_paragraph_template() {
        let mut text = String::new();
        let block = NewBlock::paragraph("Hi").materialize(10, '\u{FFFC}', &mut text).unwrap();
        assert_eq!(text, "Hi");
        assert_eq!(block.text_range(), Some(TextRange::new(10, 12)));
    }

    #[test]
    fn test_table_template_packs_cells() {
        let mut text = String::new();
        let template = NewBlock::Table {
            cells: vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
            ],
        };
        let block = template.materialize(0, '\u{FFFC}', &mut text).unwrap();
        assert_eq!(text, "a\tb\nc\t");
        let shape: Vec<usize> = text
            .split(Table::ROW_SEPARATOR)
            .map(|row| row.split(Table::COLUMN_SEPARATOR).count())
            .collect();
        assert_eq!(shape, vec![2, 2]);
        let Block::Table(table) = block else {
            panic!("expected a table");
        };
        assert_eq!((table.rows, table.columns), (2, 2));
        assert_eq!(table.range, TextRange::new(0, 6));
    }

    #[test]
    fn test_nested_template_ranges_are_contiguous() {
        let mut text = String::new();
        let template = NewBlock::Blockquote {
            children: vec![
                NewBlock::paragraph("ab"),
                NewBlock::Image {
                    asset: Asset::default(),
                },
                NewBlock::List {
                    ordered: true,
                    items: vec![
                        NewBlock::paragraph("cd"),
                        NewBlock::Heading {
                            level: 1,
                            text: "e".to_string(),
                        },
                    ],
                },
            ],
        };
        let block = template.materialize(4, '\u{FFFC}', &mut text).unwrap();
        assert_eq!(text, "ab\u{FFFC}cde");
        assert_eq!(
            spans(block),
            vec![
                TextRange::new(4, 6),
                TextRange::new(6, 7),
                TextRange::new(7, 9),
                TextRange::new(9, 10),
            ]
        );
    }

    #[test]
    fn test_invalid_templates() {
        let mut text = String::new();
        let bad_heading = NewBlock::Heading {
            level: 0,
            text: String::new(),
        };
        assert_eq!(
            bad_heading.materialize(0, '#', &mut text),
            Err(TemplateError::HeadingLevel(0))
        );
        let bad_list = NewBlock::List {
            ordered: false,
            items: vec![NewBlock::Image {
                asset: Asset::default(),
            }],
        };
        assert_eq!(
            bad_list.materialize(0, '#', &mut text),
            Err(TemplateError::ListItemContent)
        );
        let bad_table = NewBlock::Table {
            cells: vec![vec!["a\tb".to_string()]],
        };
        assert_eq!(
            bad_table.materialize(0, '#', &mut text),
            Err(TemplateError::CellSeparator)
        );
        assert_eq!(
            NewBlock::Table { cells: vec![] }.materialize(0, '#', &mut text),
            Err(TemplateError::EmptyTable)
        );
    }

    #[test]
    fn test_operation_json_shape() {
        let id = NodeId::generate();
        let op = Operation::Insert {
            node_id: id,
            offset: 2,
            text: "x".to_string(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "insert");
        assert_eq!(json["nodeId"], serde_json::json!(id.0.to_string()));
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
