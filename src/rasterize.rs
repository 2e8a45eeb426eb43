//! PDF → PNG page images via Poppler's `pdftoppm`.

use crate::{error::DocumentError, process::Invocation};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolution handed to the rasterizer. Fixed: it's the accuracy/speed
/// balance the recognizer is tuned for.
pub const RASTER_DPI: u32 = 300;

/// File-name prefix of page images inside a workspace.
pub const PAGE_PREFIX: &str = "page";

/// `pdftoppm` zero-pads page numbers to the digit count of the last page.
/// Wider than any real document.
const MAX_PAGE_DIGITS: usize = 6;

/// Produces numbered page images for a document inside a workspace.
pub trait Rasterize: Sync {
    fn rasterize(&self, input: &Path, workspace: &Path) -> Result<(), DocumentError>;
}

/// The `pdftoppm` command-line converter.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Pdftoppm {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// `pdftoppm` inside `dir`, or the bare name resolved through `PATH`.
    pub fn locate(dir: Option<&Path>, timeout: Option<Duration>) -> Self {
        Self::new(tool_path(dir, "pdftoppm"), timeout)
    }

    pub fn invocation(&self, input: &Path, workspace: &Path) -> Invocation {
        Invocation::new(&self.program)
            .args(["-png", "-r"])
            .arg(RASTER_DPI.to_string())
            .arg(input)
            .arg(page_prefix(workspace))
            .capture_output(true)
            .timeout(self.timeout)
    }
}

impl Rasterize for Pdftoppm {
    fn rasterize(&self, input: &Path, workspace: &Path) -> Result<(), DocumentError> {
        self.invocation(input, workspace).run(input)?;
        Ok(())
    }
}

/// `name` (plus the platform's executable suffix) inside `dir`, or the bare
/// `name` when no directory is configured.
pub fn tool_path(dir: Option<&Path>, name: &str) -> PathBuf {
    match dir {
        Some(dir) => dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX)),
        None => PathBuf::from(name),
    }
}

/// Output prefix handed to the rasterizer; pages land at `<prefix>-<n>.png`.
pub fn page_prefix(workspace: &Path) -> PathBuf {
    workspace.join(PAGE_PREFIX)
}

/// Path of page `n` (1-based) if it exists.
///
/// Accepts both `page-7.png` and zero-padded `page-07.png`. A missing page
/// ends the document, even if later pages exist.
pub fn page_image(workspace: &Path, n: u32) -> Option<PathBuf> {
    let digits = n.to_string().len();
    (digits..=MAX_PAGE_DIGITS.max(digits))
        .map(|width| workspace.join(format!("{PAGE_PREFIX}-{n:0width$}.png")))
        .find(|p| p.is_file())
}
