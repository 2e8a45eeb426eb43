//! Stand-ins for `pdftoppm` and `tesseract`.
//!
//! A "PDF" here is a text file. Lines `PAGE <n> <text>` become page images
//! containing `<text>`; a line `FAIL` makes rasterization exit non-zero;
//! `SLEEP <secs>` stalls the rasterizer. The fake recognizer copies each
//! image's contents to its output file verbatim.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const PDFTOPPM: &str = r#"#!/bin/sh
# pdftoppm -png -r DPI INPUT PREFIX
input="$4"
prefix="$5"
[ -r "$input" ] || { echo "I/O Error: Couldn't open file '$input'" >&2; exit 1; }
if grep -q '^FAIL' "$input"; then
  echo "Syntax Error: Couldn't find trailer dictionary" >&2
  exit 1
fi
secs=$(sed -n 's/^SLEEP //p' "$input")
[ -n "$secs" ] && sleep "$secs"
grep '^PAGE ' "$input" | while read -r _ n text; do
  printf '%s\n' "$text" > "$prefix-$n.png"
done
exit 0
"#;

const TESSERACT: &str = r#"#!/bin/sh
for a in "$@"; do
  if [ "$a" = "--list-langs" ]; then
    echo 'List of available languages in "/fake/tessdata/" (2):'
    echo eng
    echo pol
    exit 0
  fi
done
cat "$1" > "$2.txt"
"#;

/// Directory holding both fake tools. Created once per test binary, before
/// any test spawns a child, so no exec can race the script writes.
pub static TOOLS: LazyLock<tempfile::TempDir> = LazyLock::new(|| {
    let dir = tempfile::tempdir().expect("tools dir");
    for (name, body) in [("pdftoppm", PDFTOPPM), ("tesseract", TESSERACT)] {
        let path = dir.path().join(name);
        std::fs::write(&path, body).expect("write fake tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake tool");
    }
    dir
});

pub fn tools_dir() -> &'static Path {
    TOOLS.path()
}

/// Write a fake document into `dir`.
pub fn document(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write document");
    path
}

/// A document whose pages carry the given texts, numbered from 1.
pub fn pages(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
    let body: String = texts
        .iter()
        .enumerate()
        .map(|(i, t)| format!("PAGE {} {t}\n", i + 1))
        .collect();
    document(dir, name, &body)
}
