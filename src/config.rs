use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Names the directory holding recognizer language data.
pub const TESSDATA_ENV: &str = "TESSDATA_PREFIX";
/// Names the directory holding the `pdftoppm` executable.
pub const POPPLER_ENV: &str = "POPPLER_PATH";

static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(\+[A-Za-z0-9_]+)*$").expect("language regex compiles")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub batch: Batch,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Load `path` if given, else `./batch-ocr.toml` if present, else
    /// defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        let default = PathBuf::from("batch-ocr.toml");
        if default.exists() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `TESSDATA_PREFIX` / `POPPLER_PATH` on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|k| std::env::var_os(k).map(PathBuf::from));
    }

    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<PathBuf>) {
        if let Some(dir) = get(TESSDATA_ENV).filter(|p| !p.as_os_str().is_empty()) {
            self.tools.tessdata_dir = Some(dir);
        }
        if let Some(dir) = get(POPPLER_ENV).filter(|p| !p.as_os_str().is_empty()) {
            self.tools.poppler_dir = Some(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_language(&self.ocr.language)
    }
}

/// `pol`, `eng`, `pol+eng`, …
pub fn validate_language(lang: &str) -> Result<()> {
    if LANGUAGE_RE.is_match(lang) {
        Ok(())
    } else {
        Err(anyhow!("invalid recognition language: {lang:?}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    pub language: String,
    pub page_seg_mode: Option<u8>,
    pub engine_mode: Option<u8>,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            language: "pol".into(),
            page_seg_mode: None,
            engine_mode: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub poppler_dir: Option<PathBuf>,
    pub tesseract_dir: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
    /// 0 waits forever.
    pub process_timeout_seconds: u64,
}
impl Tools {
    pub fn process_timeout(&self) -> Option<Duration> {
        match self.process_timeout_seconds {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    /// 0 uses every logical CPU.
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
            file_path: "".into(),
        }
    }
}
