//! Lossy export of a document to plain text and Markdown.

use crate::editing::{Block, BufferContent, DocumentTree, Mark, Table, TextRange};

pub fn to_plain_text(content: &BufferContent) -> String {
    content.replay()
}

/// Render `tree` over `text` as CommonMark-ish Markdown.
///
/// Sections are separated by a thematic break. Underline and colour have no
/// Markdown form and are dropped; so is the image payload, which is referenced
/// by asset name.
pub fn to_markdown(tree: &DocumentTree, text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    tree.sections()
        .iter()
        .map(|section| render_blocks(&section.children, &chars))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn render_blocks(blocks: &[Block], chars: &[char]) -> String {
    blocks
        .iter()
        .map(|block| render_block(block, chars))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block, chars: &[char]) -> String {
    match block {
        Block::Paragraph(p) => render_inline(slice(chars, p.range), &p.marks),
        Block::Heading(h) => format!(
            "{} {}",
            "#".repeat(usize::from(h.level)),
            render_inline(slice(chars, h.range), &h.marks)
        ),
        Block::Image(image) => format!("![{}]({})", image.asset.alt, image.asset.name),
        Block::Table(table) => render_table(table, &slice(chars, table.range)),
        Block::Blockquote(quote) => render_blocks(&quote.children, chars)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {line}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Block::List(list) => list
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let marker = if list.ordered {
                    format!("{}.", index + 1)
                } else {
                    "-".to_string()
                };
                format!("{marker} {}", render_block(&item.content, chars))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn render_table(table: &Table, text: &str) -> String {
    let mut rows: Vec<Vec<String>> = text
        .split(Table::ROW_SEPARATOR)
        .map(|row| {
            row.split(Table::COLUMN_SEPARATOR)
                .map(|cell| cell.replace('|', "\\|"))
                .collect()
        })
        .collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(table.columns);
    for row in &mut rows {
        row.resize(columns, String::new());
    }

    fn line(cells: &[String]) -> String {
        format!("| {} |", cells.join(" | "))
    }
    let mut out = Vec::with_capacity(rows.len() + 1);
    if let Some((header, body)) = rows.split_first() {
        out.push(line(header));
        out.push(line(&vec!["---".to_string(); columns]));
        out.extend(body.iter().map(|row| line(row)));
    }
    out.join("\n")
}

/// Wrap marked spans in Markdown delimiters. Marks are sorted and disjoint.
fn render_inline(text: String, marks: &[Mark]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for mark in marks {
        let start = mark.start.min(chars.len());
        let end = mark.end.min(chars.len());
        out.extend(&chars[cursor.min(start)..start]);
        let mut piece: String = chars[start..end].iter().collect();
        let attrs = &mark.attrs;
        if attrs.code == Some(true) {
            piece = format!("`{piece}`");
        }
        if attrs.bold == Some(true) {
            piece = format!("**{piece}**");
        }
        if attrs.italic == Some(true) {
            piece = format!("*{piece}*");
        }
        if attrs.strikethrough == Some(true) {
            piece = format!("~~{piece}~~");
        }
        if let Some(link) = &attrs.link {
            piece = format!("[{piece}]({link})");
        }
        out.push_str(&piece);
        cursor = end;
    }
    out.extend(&chars[cursor.min(chars.len())..]);
    out
}

fn slice(chars: &[char], range: TextRange) -> String {
    let end = range.end.min(chars.len());
    let start = range.start.min(end);
    chars[start..end].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::{MarkAttrs, Paragraph, Section};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_replays_log() {
        let mut content = BufferContent::from_text("ab");
        content.chunks.push(crate::editing::Chunk::Insert {
            pos: 1,
            data: "X".to_string(),
        });
        assert_eq!(to_plain_text(&content), "aXb");
    }

    #[test]
    fn test_inline_marks() {
        let mut paragraph = Paragraph::new(TextRange::new(0, 15));
        let mut link = MarkAttrs::default();
        link.link = Some("https://example.com".to_string());
        let mut code = MarkAttrs::default();
        code.code = Some(true);
        paragraph.marks = vec![
            Mark {
                start: 0,
                end: 4,
                attrs: MarkAttrs::bold(),
            },
            Mark {
                start: 5,
                end: 9,
                attrs: link,
            },
            Mark {
                start: 10,
                end: 15,
                attrs: code,
            },
        ];
        let tree = DocumentTree::from_sections(vec![Section::new(vec![Block::Paragraph(paragraph)])]);
        assert_eq!(
            to_markdown(&tree, "bold link code!"),
            "**bold** [link](https://example.com) `code!`"
        );
    }

    #[test]
    fn test_underline_has_no_markdown_form() {
        let mut paragraph = Paragraph::new(TextRange::new(0, 3));
        let mut underline = MarkAttrs::default();
        underline.underline = Some(true);
        paragraph.marks = vec![Mark {
            start: 0,
            end: 3,
            attrs: underline,
        }];
        let tree = DocumentTree::from_sections(vec![Section::new(vec![Block::Paragraph(paragraph)])]);
        assert_eq!(to_markdown(&tree, "abc"), "abc");
    }

    #[test]
    fn test_table_pads_short_rows_and_escapes_pipes() {
        let table = Table::new(TextRange::new(0, 0), 2, 2);
        assert_eq!(
            render_table(&table, "a|b\tc\nd"),
            "| a\\|b | c |\n| --- | --- |\n| d |  |"
        );
    }
}
