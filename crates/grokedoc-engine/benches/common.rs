// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use grokedoc_engine::editing::{EditorEngine, NewBlock, Operation};

#[allow(dead_code)]
pub fn generate_text(size: usize) -> String {
    "The quick brown fox jumps over the lazy dog. ".repeat(size)
}

/// Engine holding `blocks` paragraphs of sample text.
#[allow(dead_code)]
pub fn engine_with_blocks(blocks: usize) -> EditorEngine {
    let mut engine = EditorEngine::new();
    engine.load_plain_text(&generate_text(4));
    for index in 1..blocks {
        engine
            .apply(Operation::InsertBlock {
                parent: None,
                index,
                block: NewBlock::paragraph(generate_text(4)),
            })
            .unwrap();
    }
    engine
}
