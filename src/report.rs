use crate::{scheduler::BatchOutcome, util::sha256_file};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started: String,
    pub finished: String,
    pub language: String,
    pub workers: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: Vec<DocumentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub index: usize,
    pub path: String,
    pub status: DocumentStatus,
    pub pages: Option<u32>,
    pub chars: Option<usize>,
    pub elapsed_ms: Option<u64>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub input_sha256: Option<String>,
}

impl RunReport {
    pub fn build(
        paths: &[PathBuf],
        outcome: &BatchOutcome,
        language: &str,
        started: String,
        finished: String,
    ) -> Self {
        let documents: Vec<DocumentReport> = paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let input_sha256 = sha256_file(path).ok();
                let base = DocumentReport {
                    index,
                    path: path.display().to_string(),
                    status: DocumentStatus::Ok,
                    pages: None,
                    chars: None,
                    elapsed_ms: None,
                    error_kind: None,
                    error: None,
                    input_sha256,
                };
                match outcome.documents.get(index).and_then(Option::as_ref) {
                    Some(doc) => DocumentReport {
                        pages: Some(doc.pages),
                        chars: Some(doc.text.chars().count()),
                        elapsed_ms: Some(doc.elapsed.as_millis() as u64),
                        ..base
                    },
                    None => {
                        let err = outcome.errors.iter().find(|e| e.index == index);
                        DocumentReport {
                            status: DocumentStatus::Failed,
                            error_kind: err.map(|e| e.kind.to_string()),
                            error: err.map(|e| e.message.clone()),
                            ..base
                        }
                    }
                }
            })
            .collect();

        let failed = documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Failed)
            .count();
        Self {
            started,
            finished,
            language: language.to_string(),
            workers: outcome.workers,
            succeeded: documents.len() - failed,
            failed,
            documents,
        }
    }
}
