//! Local knowledge store over a directory of text travel guides.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::base::{ReasonerError, ReasonerResult};
use super::tools::KnowledgeStore;

/// Passages returned per query.
pub const TOP_K: usize = 5;

#[derive(Debug, Clone)]
struct Passage {
    text: String,
    /// Lowercased file stem, used for destination filtering
    source: String,
    terms: HashSet<String>,
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Keyword-scored passages loaded from `.txt` and `.md` files.
///
/// Each file is split on blank lines. A query scores passages by shared
/// terms; a destination restricts the search to passages that mention it or
/// come from a file named after it, falling back to all passages when that
/// leaves nothing.
#[derive(Debug, Default)]
pub struct DirectoryKnowledgeStore {
    passages: Vec<Passage>,
}

impl DirectoryKnowledgeStore {
    pub async fn load(dir: &Path) -> ReasonerResult<Self> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            ReasonerError::ConfigurationError(format!(
                "Failed to read knowledge directory {}: {e}",
                dir.display()
            ))
        })?;

        let mut store = Self::default();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"));
            if !is_text {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => {
                    let source = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    store.add_document(&source, &contents);
                }
                Err(e) => warn!(path = %path.display(), "Skipping unreadable guide: {e}"),
            }
        }

        info!(
            passages = store.len(),
            dir = %dir.display(),
            "Loaded travel guides"
        );
        Ok(store)
    }

    pub fn add_document(&mut self, source: &str, contents: &str) {
        let source = source.to_lowercase();
        for chunk in contents.split("\n\n") {
            let text = chunk.trim();
            if text.is_empty() {
                continue;
            }
            self.passages.push(Passage {
                text: text.to_string(),
                source: source.clone(),
                terms: terms(text),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn search(&self, text: &str, destination: Option<&str>) -> Vec<String> {
        let wanted = terms(text);
        let destination = destination.map(str::to_lowercase).filter(|d| !d.is_empty());

        let mut candidates: Vec<&Passage> = match &destination {
            Some(dest) => self
                .passages
                .iter()
                .filter(|p| p.source.contains(dest.as_str()) || p.text.to_lowercase().contains(dest.as_str()))
                .collect(),
            None => self.passages.iter().collect(),
        };
        if candidates.is_empty() && destination.is_some() {
            debug!("No passages for destination, searching all guides");
            candidates = self.passages.iter().collect();
        }

        let mut scored: Vec<(usize, &Passage)> = candidates
            .into_iter()
            .map(|p| (p.terms.intersection(&wanted).count(), p))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(TOP_K)
            .map(|(_, p)| p.text.clone())
            .collect()
    }
}

#[async_trait]
impl KnowledgeStore for DirectoryKnowledgeStore {
    async fn query(&self, text: &str, destination: Option<&str>) -> ReasonerResult<Vec<String>> {
        Ok(self.search(text, destination))
    }
}
