//! Page images → text.

use crate::{
    error::DocumentError,
    process::Invocation,
    rasterize::{page_image, tool_path},
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{trace, warn};

/// A recognition engine bound to one language. One instance serves one
/// document; instances are never shared between threads.
pub trait RecognitionEngine {
    fn recognize_page(&mut self, image: &Path, document: &Path) -> Result<String, DocumentError>;
}

/// Creates engine instances. Shared by all workers.
pub trait EngineFactory: Sync {
    type Engine: RecognitionEngine;

    /// Fails with [`DocumentError::EngineInit`] when the engine can't serve
    /// `language`.
    fn init(&self, language: &str, document: &Path) -> Result<Self::Engine, DocumentError>;
}

/// Text recognized from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognized {
    pub text: String,
    pub pages: u32,
}

/// Feed pages `1, 2, 3, …` from `workspace` to `engine` until the first
/// missing page, deleting each image once it has been read.
///
/// A workspace with no pages yields empty text.
pub fn recognize_pages<E: RecognitionEngine>(
    engine: &mut E,
    workspace: &Path,
    document: &Path,
) -> Result<Recognized, DocumentError> {
    let mut out = Recognized::default();
    let mut n = 1;
    while let Some(image) = page_image(workspace, n) {
        trace!("page {n} of {}", document.display());
        let text = engine.recognize_page(&image, document)?;
        out.text.push_str(&text);
        out.pages += 1;
        if let Err(err) = std::fs::remove_file(&image) {
            warn!("failed to remove page image {}: {err}", image.display());
        }
        n += 1;
    }
    Ok(out)
}

/// Initialize an engine for `language` and run it over the workspace.
pub fn recognize<F: EngineFactory>(
    factory: &F,
    language: &str,
    workspace: &Path,
    document: &Path,
) -> Result<Recognized, DocumentError> {
    let mut engine = factory.init(language, document)?;
    recognize_pages(&mut engine, workspace, document)
}

/// Settings for the `tesseract` command-line engine.
#[derive(Debug, Clone, Default)]
pub struct Tesseract {
    pub program: PathBuf,
    pub tessdata_dir: Option<PathBuf>,
    pub page_seg_mode: Option<u8>,
    pub engine_mode: Option<u8>,
    pub timeout: Option<Duration>,
}

impl Tesseract {
    /// `tesseract` inside `dir`, or the bare name resolved through `PATH`.
    pub fn locate(dir: Option<&Path>) -> Self {
        Self {
            program: tool_path(dir, "tesseract"),
            ..Default::default()
        }
    }

    fn command(&self) -> Invocation {
        Invocation::new(&self.program)
            .capture_output(true)
            .timeout(self.timeout)
    }

    fn tessdata_args(&self) -> Vec<OsString> {
        match &self.tessdata_dir {
            Some(dir) => vec!["--tessdata-dir".into(), dir.clone().into_os_string()],
            None => Vec::new(),
        }
    }

    pub fn list_langs_invocation(&self) -> Invocation {
        self.command().args(self.tessdata_args()).arg("--list-langs")
    }
}

/// Languages from `tesseract --list-langs` output.
pub fn parse_lang_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

impl EngineFactory for Tesseract {
    type Engine = TesseractEngine;

    fn init(&self, language: &str, document: &Path) -> Result<TesseractEngine, DocumentError> {
        let init_err = |reason: String| DocumentError::EngineInit {
            document: document.to_path_buf(),
            reason,
        };
        let out = self
            .list_langs_invocation()
            .run(document)
            .map_err(|err| init_err(err.to_string()))?;
        let available = parse_lang_list(&String::from_utf8_lossy(&out));
        let missing: Vec<&str> = language
            .split('+')
            .filter(|l| !available.iter().any(|a| a == l))
            .collect();
        if !missing.is_empty() {
            return Err(init_err(format!(
                "language data not found: {}",
                missing.join(", ")
            )));
        }
        Ok(TesseractEngine {
            settings: self.clone(),
            language: language.to_string(),
        })
    }
}

/// A `tesseract` engine initialized for one language.
#[derive(Debug)]
pub struct TesseractEngine {
    settings: Tesseract,
    language: String,
}

impl TesseractEngine {
    /// `tesseract <image> <image minus extension> … -l <lang>`; the text
    /// lands next to the image as `.txt`.
    pub fn invocation(&self, image: &Path) -> Invocation {
        let mut inv = self
            .settings
            .command()
            .arg(image)
            .arg(image.with_extension(""))
            .args(self.settings.tessdata_args())
            .arg("-l")
            .arg(&self.language);
        if let Some(psm) = self.settings.page_seg_mode {
            inv = inv.arg("--psm").arg(psm.to_string());
        }
        if let Some(oem) = self.settings.engine_mode {
            inv = inv.arg("--oem").arg(oem.to_string());
        }
        inv
    }
}

impl RecognitionEngine for TesseractEngine {
    fn recognize_page(&mut self, image: &Path, document: &Path) -> Result<String, DocumentError> {
        self.invocation(image).run(document)?;
        let txt = image.with_extension("txt");
        let bytes = std::fs::read(&txt)
            .map_err(|e| DocumentError::io(format!("read {}", txt.display()), document, e))?;
        if let Err(err) = std::fs::remove_file(&txt) {
            warn!("failed to remove {}: {err}", txt.display());
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
