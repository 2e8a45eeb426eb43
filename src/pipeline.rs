use crate::{
    config::Config,
    error::DocumentError,
    rasterize::{Pdftoppm, Rasterize},
    recognize::{recognize, EngineFactory, Tesseract},
    workspace::Workspace,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// One input document, identified by its position in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentJob {
    pub index: usize,
    pub path: PathBuf,
}

/// Where a document is in its pipeline. No retries; terminal states are
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    RasterizingPages,
    Recognizing,
    Succeeded,
    Failed,
}

/// The text of one successfully processed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub pages: u32,
    pub elapsed: Duration,
}

/// Turns one document into text. Shared by every worker of a batch.
pub trait DocumentProcessor: Sync {
    fn process(&self, job: &DocumentJob) -> Result<DocumentText, DocumentError>;
}

/// Rasterize → recognize → clean up, for one document at a time.
pub struct Pipeline<R: Rasterize, F: EngineFactory> {
    rasterizer: R,
    engines: F,
    language: String,
    workspace_root: Option<PathBuf>,
}

impl<R: Rasterize, F: EngineFactory> Pipeline<R, F> {
    pub fn new(rasterizer: R, engines: F, language: impl Into<String>) -> Self {
        Self {
            rasterizer,
            engines,
            language: language.into(),
            workspace_root: None,
        }
    }

    /// Create workspaces under `root` instead of the system temp directory.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn run_stages(&self, job: &DocumentJob, workspace: &Path) -> Result<(String, u32), DocumentError> {
        transition(job, JobState::RasterizingPages);
        self.rasterizer.rasterize(&job.path, workspace)?;

        transition(job, JobState::Recognizing);
        let out = recognize(&self.engines, &self.language, workspace, &job.path)?;
        Ok((out.text, out.pages))
    }
}

impl Pipeline<Pdftoppm, Tesseract> {
    /// `pdftoppm` + `tesseract`, located and tuned per `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        let timeout = cfg.tools.process_timeout();
        let rasterizer = Pdftoppm::locate(cfg.tools.poppler_dir.as_deref(), timeout);
        let engines = Tesseract {
            tessdata_dir: cfg.tools.tessdata_dir.clone(),
            page_seg_mode: cfg.ocr.page_seg_mode,
            engine_mode: cfg.ocr.engine_mode,
            timeout,
            ..Tesseract::locate(cfg.tools.tesseract_dir.as_deref())
        };
        Self::new(rasterizer, engines, cfg.ocr.language.clone())
    }
}

impl<R: Rasterize, F: EngineFactory> DocumentProcessor for Pipeline<R, F> {
    fn process(&self, job: &DocumentJob) -> Result<DocumentText, DocumentError> {
        let started = Instant::now();
        transition(job, JobState::Pending);

        let workspace = match &self.workspace_root {
            Some(root) => Workspace::acquire_in(root),
            None => Workspace::acquire(),
        }
        .map_err(|e| DocumentError::io("create workspace", &job.path, e))?;
        let result = self.run_stages(job, workspace.path());
        workspace.release();

        match result {
            Ok((text, pages)) => {
                transition(job, JobState::Succeeded);
                debug!("document {} pages={pages} chars={}", job.index, text.chars().count());
                Ok(DocumentText {
                    text,
                    pages,
                    elapsed: started.elapsed(),
                })
            }
            Err(err) => {
                transition(job, JobState::Failed);
                debug!("document {} failed: {err}", job.index);
                Err(err)
            }
        }
    }
}

fn transition(job: &DocumentJob, state: JobState) {
    debug!("document {} {} -> {:?}", job.index, job.path.display(), state);
}
