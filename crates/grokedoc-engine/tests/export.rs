use grokedoc_engine::editing::*;
use grokedoc_engine::io::export::{to_markdown, to_plain_text};
use pretty_assertions::assert_eq;

fn rich_document() -> EditorEngine {
    let mut engine = EditorEngine::new();
    engine.load_plain_text("Intro text");
    let intro = engine.tree().sections()[0].children[0].id();

    let ops = vec![
        Operation::Format {
            node_id: intro,
            start: 0,
            end: 5,
            attrs: MarkAttrs::bold(),
        },
        Operation::InsertBlock {
            parent: None,
            index: 0,
            block: NewBlock::Heading {
                level: 1,
                text: "Report".to_string(),
            },
        },
        Operation::InsertBlock {
            parent: None,
            index: 2,
            block: NewBlock::List {
                ordered: false,
                items: vec![NewBlock::paragraph("one"), NewBlock::paragraph("two")],
            },
        },
        Operation::InsertBlock {
            parent: None,
            index: 3,
            block: NewBlock::Blockquote {
                children: vec![NewBlock::paragraph("quoted")],
            },
        },
        Operation::InsertBlock {
            parent: None,
            index: 4,
            block: NewBlock::Table {
                cells: vec![
                    vec!["a".to_string(), "b".to_string()],
                    vec!["1".to_string(), "2".to_string()],
                ],
            },
        },
    ];
    for op in ops {
        engine.apply(op).unwrap();
    }

    // The caret is still in the intro paragraph
    engine
        .insert_image(Asset {
            name: "chart.png".to_string(),
            alt: "Chart".to_string(),
            ..Asset::default()
        })
        .unwrap();
    engine
}

#[test]
fn test_plain_text_export() {
    let engine = rich_document();
    let text = to_plain_text(&engine.buffer().to_content());
    assert_eq!(text, "ReportIntro text\u{FFFC}onetwoquoteda\tb\n1\t2");
    assert_eq!(text, engine.text());
}

#[test]
fn test_markdown_export() {
    let engine = rich_document();
    let markdown = to_markdown(engine.tree(), &engine.text());
    insta::assert_snapshot!("markdown_of_rich_document", markdown);
}

#[test]
fn test_markdown_export_separates_sections() {
    let text = "firstsecond";
    let tree = DocumentTree::from_sections(vec![
        Section::new(vec![Block::Paragraph(Paragraph::new(TextRange::new(0, 5)))]),
        Section::new(vec![Block::Paragraph(Paragraph::new(TextRange::new(5, 11)))]),
    ]);
    assert_eq!(to_markdown(&tree, text), "first\n\n---\n\nsecond");
}
