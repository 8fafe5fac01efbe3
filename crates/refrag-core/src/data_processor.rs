//! Directory ingestion: walk `.txt` files and chunk each one.
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunker::chunk_document;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::Chunk;

#[derive(Default)]
pub struct DataProcessor {
    config: PipelineConfig,
}

impl DataProcessor {
    pub fn new(config: PipelineConfig) -> Self { Self { config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        let files = list_txt_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            let content = read_file_content(file_path)?;
            let doc_id = doc_id_for(file_path);
            let chunks = chunk_document(&doc_id, &content, &self.config);
            debug!(file = %file_path.display(), n = file_index + 1, of = files.len(), chunks = chunks.len(), "processed file");
            all_chunks.extend(chunks);
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed directory");
        Ok(all_chunks)
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn doc_id_for(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map_or_else(|| file_path.to_string_lossy().to_string(), |s| s.to_string_lossy().to_string())
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}
