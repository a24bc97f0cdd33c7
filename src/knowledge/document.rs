use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IndexError;

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// The full text of one corpus file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub source: String,
    pub text: String,
}

/// A bounded piece of a [`RawDocument`], positioned in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub source: String,
    /// Position of this chunk within its document.
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl DocumentChunk {
    pub fn id(&self) -> String {
        format!("{}#{}", self.source, self.index)
    }
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Reads every `.txt`/`.md` file directly under `root`, sorted by path.
///
/// Subdirectories are not walked. A missing `root` yields no documents.
pub async fn load_documents(root: &Path) -> Result<Vec<RawDocument>, IndexError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Knowledge directory {} does not exist", root.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_text_file(&path) {
            paths.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path).await?;
        documents.push(RawDocument {
            source: path.display().to_string(),
            text,
        });
    }
    Ok(documents)
}
