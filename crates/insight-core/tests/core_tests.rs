use std::fs;
use std::io::Write;
use tempfile::TempDir;

use insight_core::config::{Config, Settings, StrategyKind};
use insight_core::data_processor::{split_pages_of, DataProcessor, TextSplitter};
use insight_core::{Chunk, ChunkMetadata, Strategy};

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_directory(dir).expect("process");

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].metadata, ChunkMetadata { source: "a.txt".into(), page: 1, chunk_id: 0 });
    assert_eq!(chunks[0].id, "a.txt:1:0");
}

#[test]
fn process_directory_ignores_other_extensions_and_sorts() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let chunks = DataProcessor::new().process_directory(dir).expect("process");
    let sources: Vec<&str> = chunks.iter().map(|c| c.metadata.source.as_str()).collect();
    assert_eq!(sources, vec!["a.txt", "b.txt"]);
}

#[test]
fn empty_directory_yields_no_chunks() {
    let tmp = TempDir::new().unwrap();
    let chunks = DataProcessor::new().process_directory(tmp.path()).expect("process");
    assert!(chunks.is_empty());
}

#[test]
fn form_feeds_start_new_pages() {
    let pages = split_pages_of("c.txt", "first page\x0c\x0cthird page");
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page, 1);
    assert_eq!(pages[1].page, 3);
    assert_eq!(pages[1].text, "third page");
}

#[test]
fn splitter_respects_size_and_overlaps() {
    let text: String = (0..30).map(|i| format!("Clause {i} binds the supplier. ")).collect();
    let splitter = TextSplitter::new(120, 40);
    let chunks = splitter.split_text(&text);

    assert!(chunks.len() > 1);
    for c in &chunks {
        assert!(c.chars().count() <= 120, "chunk too long: {}", c.len());
    }
    let last_sentence = chunks[0].rsplit(". ").next().expect("sentence");
    assert!(chunks[1].starts_with(last_sentence), "expected '{last_sentence}' to seed the next chunk");
}

#[test]
fn splitter_prefers_paragraph_boundaries() {
    let a = "A".repeat(200);
    let b = "B".repeat(200);
    let text = format!("{a}\n\n{b}");
    let chunks = TextSplitter::new(250, 20).split_text(&text);
    assert_eq!(chunks, vec![a, b]);
}

#[test]
fn splitter_is_deterministic() {
    let text = "Clause one.\nClause two is longer than the first one.\n\nSECTION 2\nMore text here. ".repeat(10);
    let splitter = TextSplitter::new(80, 10);
    assert_eq!(splitter.split_text(&text), splitter.split_text(&text));
}

#[test]
fn chunk_ids_follow_provenance() {
    let chunk = Chunk::new("text", ChunkMetadata { source: "deal.txt".into(), page: 4, chunk_id: 2 });
    assert_eq!(chunk.id, "deal.txt:4:2");
}

#[test]
fn settings_defaults_are_valid() {
    let settings = Settings::default();
    settings.validate().expect("defaults validate");
    assert_eq!(settings.chunking.chunk_size, 400);
    assert_eq!(settings.chunking.chunk_overlap, 50);
    assert_eq!(settings.retrieval.relevance_threshold, 0.5);
    assert!(matches!(settings.generation.params().strategy, Strategy::Beam { num_beams: 4, early_stopping: true }));
}

#[test]
fn overlap_not_smaller_than_size_is_rejected() {
    let mut settings = Settings::default();
    settings.chunking.chunk_overlap = settings.chunking.chunk_size;
    assert!(settings.validate().is_err());
}

#[test]
fn config_merges_toml_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            top_k = 5

            [generation]
            strategy = "sampling"
            "#,
        )?;
        jail.set_env("APP_RETRIEVAL__CONTEXT_CHUNKS", "2");

        let config = Config::load_for_env("test").expect("load");
        let settings = config.settings().expect("settings");
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.retrieval.context_chunks, 2);
        assert_eq!(settings.generation.strategy, StrategyKind::Sampling);
        let top_k: usize = config.get("retrieval.top_k").expect("get");
        assert_eq!(top_k, 5);
        Ok(())
    });
}
