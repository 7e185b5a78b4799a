//! Document loading and deterministic chunking.
//!
//! Every `.txt` file under a directory is a document; a form feed starts a new
//! page. Pages are split into overlapping chunks by a recursive character
//! splitter that prefers section, paragraph, line and sentence boundaries.

use anyhow::Result;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ChunkingSettings;
use crate::types::{Chunk, ChunkMetadata};

const PAGE_BREAK: char = '\x0c';
const SEPARATORS: [&str; 7] = ["\n## ", "\n# ", "\n\n", "\n", ". ", " ", ""];

/// One page of a loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub source: String,
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        let defaults = ChunkingSettings::default();
        Self::new(defaults.chunk_size, defaults.chunk_overlap)
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(idx).copied().unwrap_or("");
        let remaining = separators.get(idx + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily packs pieces into chunks; the tail of each emitted chunk (up to
    /// `chunk_overlap` chars) seeds the next one.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut out, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece.as_str());
            total += len;
        }
        push_trimmed(&mut out, &window);
        out
    }
}

fn push_trimmed(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 { part.to_string() } else { format!("{separator}{part}") };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

#[derive(Default)]
pub struct DataProcessor {
    splitter: TextSplitter,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_settings(settings: &ChunkingSettings) -> Self {
        Self { splitter: TextSplitter::from_settings(settings) }
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let pages = self.load_pages(file_path)?;
            all_chunks.extend(self.split_pages(&pages));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed documents");
        Ok(all_chunks)
    }

    pub fn load_pages(&self, file_path: &Path) -> Result<Vec<Page>> {
        let content = self.read_file_content(file_path)?;
        let source = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string_lossy().to_string());
        Ok(split_pages_of(&source, &content))
    }

    pub fn split_pages(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for (chunk_id, text) in self.splitter.split_text(&page.text).into_iter().enumerate() {
                let metadata = ChunkMetadata { source: page.source.clone(), page: page.page, chunk_id };
                chunks.push(Chunk::new(text, metadata));
            }
        }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort();
        txt_files
    }
}

/// Splits raw document text on form feeds; blank pages are dropped but still
/// count towards numbering.
pub fn split_pages_of(source: &str, content: &str) -> Vec<Page> {
    content
        .split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Page { source: source.to_string(), page: i as u32 + 1, text: text.trim().to_string() })
        .collect()
}
