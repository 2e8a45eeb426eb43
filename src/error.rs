use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a single document could not be turned into text.
///
/// Every variant is contained at the pipeline boundary and becomes one
/// [`ErrorRecord`]; none of them abort the batch.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot start {command} for {document}: {source}")]
    Spawn {
        command: String,
        document: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("command failed: {command} for {document} ({status}){}", detail_suffix(.output))]
    Process {
        command: String,
        document: PathBuf,
        status: String,
        output: String,
    },

    #[error("command timed out after {timeout:?}: {command} for {document}")]
    Timeout {
        command: String,
        document: PathBuf,
        timeout: Duration,
    },

    #[error("cannot initialize recognizer for {document}: {reason}")]
    EngineInit { document: PathBuf, reason: String },

    #[error("{context} for {document}: {source}")]
    Io {
        context: String,
        document: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    pub fn io(context: impl Into<String>, document: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            document: document.to_path_buf(),
            source,
        }
    }

    /// Short machine-friendly kind, used in the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Process { .. } => "process",
            Self::Timeout { .. } => "timeout",
            Self::EngineInit { .. } => "engine_init",
            Self::Io { .. } => "io",
        }
    }
}

fn detail_suffix(output: &str) -> String {
    let last = output.lines().rev().find(|l| !l.trim().is_empty());
    match last {
        Some(line) => format!(": {}", line.trim()),
        None => String::new(),
    }
}

/// One failed document: its path and a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub index: usize,
    pub path: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(index: usize, path: PathBuf, err: &DocumentError) -> Self {
        Self {
            index,
            path,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The diagnostic line written to standard error.
    pub fn diagnostic_line(&self) -> String {
        format!("Failed to process {}: {}", self.path.display(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_carries_last_output_line() {
        let err = DocumentError::Process {
            command: "pdftoppm".into(),
            document: PathBuf::from("a.pdf"),
            status: "exit status: 1".into(),
            output: "Syntax Warning: x\nI/O Error: Couldn't open file 'a.pdf'\n\n".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("command failed: pdftoppm for a.pdf"));
        assert!(msg.ends_with("I/O Error: Couldn't open file 'a.pdf'"));
    }

    #[test]
    fn engine_init_message_is_distinct() {
        let err = DocumentError::EngineInit {
            document: PathBuf::from("b.pdf"),
            reason: "language 'xyz' not installed".into(),
        };
        assert!(err.to_string().starts_with("cannot initialize recognizer"));
        assert_eq!(err.kind(), "engine_init");
    }

    #[test]
    fn diagnostic_line_names_document() {
        let err = DocumentError::io(
            "create workspace",
            std::path::Path::new("c.pdf"),
            std::io::Error::other("disk full"),
        );
        let rec = ErrorRecord::new(2, PathBuf::from("c.pdf"), &err);
        assert_eq!(
            rec.diagnostic_line(),
            "Failed to process c.pdf: create workspace for c.pdf: disk full"
        );
    }
}
