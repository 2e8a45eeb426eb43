#![cfg(unix)]

mod common;

use batch_ocr::{
    config::Config,
    pipeline::{DocumentJob, DocumentProcessor, Pipeline},
    recognize::{EngineFactory, Tesseract},
    scheduler::run_batch,
    serialize::serialize,
};
use common::{document, pages, tools_dir};
use std::path::{Path, PathBuf};

fn config() -> Config {
    let mut cfg = Config::default();
    cfg.tools.poppler_dir = Some(tools_dir().to_path_buf());
    cfg.tools.tesseract_dir = Some(tools_dir().to_path_buf());
    cfg
}

fn pipeline(cfg: &Config, scratch: &Path) -> Pipeline<batch_ocr::rasterize::Pdftoppm, Tesseract> {
    Pipeline::from_config(cfg).with_workspace_root(scratch)
}

fn leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn batch_output_follows_input_order_with_real_processes() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config();

    let paths: Vec<PathBuf> = (0..9)
        .map(|i| {
            let texts: Vec<String> = (0..(i % 3 + 1)).map(|p| format!("doc{i} page{p}")).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            pages(docs.path(), &format!("doc{i}.pdf"), &refs)
        })
        .collect();

    let out = run_batch(&pipeline(&cfg, scratch.path()), &paths, 4);
    assert!(out.is_success(), "{:?}", out.errors);
    for (i, text) in out.texts().iter().enumerate() {
        let expected: String = (0..(i % 3 + 1)).map(|p| format!("doc{i} page{p}\n")).collect();
        assert_eq!(*text, expected);
    }
    assert_eq!(leftovers(scratch.path()), 0);
}

#[test]
fn one_broken_document_does_not_spoil_the_batch() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config();

    let paths = vec![
        pages(docs.path(), "a.pdf", &["alpha"]),
        document(docs.path(), "broken.pdf", "FAIL\n"),
        pages(docs.path(), "c.pdf", &["gamma"]),
    ];
    let out = run_batch(&pipeline(&cfg, scratch.path()), &paths, 0);

    assert_eq!(out.texts(), vec!["alpha\n", "", "gamma\n"]);
    assert_eq!(out.errors.len(), 1);
    let err = &out.errors[0];
    assert_eq!(err.index, 1);
    assert_eq!(err.kind, "process");
    let line = err.diagnostic_line();
    assert!(line.contains("broken.pdf"), "{line}");
    assert!(line.contains("pdftoppm"), "{line}");
    assert!(line.contains("trailer dictionary"), "{line}");
    assert_eq!(leftovers(scratch.path()), 0);
}

#[test]
fn zero_page_document_is_empty_text() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = document(docs.path(), "blank.pdf", "");

    let out = run_batch(&pipeline(&config(), scratch.path()), &[path], 0);
    assert!(out.is_success());
    assert_eq!(out.texts(), vec![""]);
    assert_eq!(out.documents[0].as_ref().unwrap().pages, 0);
}

#[test]
fn page_gap_stops_recognition() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = document(docs.path(), "gap.pdf", "PAGE 1 one\nPAGE 2 two\nPAGE 4 four\n");

    let job = DocumentJob { index: 0, path };
    let out = pipeline(&config(), scratch.path()).process(&job).unwrap();
    assert_eq!(out.text, "one\ntwo\n");
    assert_eq!(out.pages, 2);
    // The unread page went away with the workspace.
    assert_eq!(leftovers(scratch.path()), 0);
}

#[test]
fn missing_input_is_reported_against_that_document() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let missing = docs.path().join("nope.pdf");

    let out = run_batch(&pipeline(&config(), scratch.path()), &[missing], 1);
    assert_eq!(out.errors.len(), 1);
    assert!(out.errors[0].message.contains("nope.pdf"));
    assert_eq!(leftovers(scratch.path()), 0);
}

#[test]
fn unknown_language_fails_as_engine_init() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.ocr.language = "deu".into();
    let path = pages(docs.path(), "a.pdf", &["x"]);

    let out = run_batch(&pipeline(&cfg, scratch.path()), &[path], 1);
    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].kind, "engine_init");
    assert!(out.errors[0].message.starts_with("cannot initialize recognizer"));
    assert_eq!(leftovers(scratch.path()), 0);
}

#[test]
fn engine_init_checks_every_requested_language() {
    let tess = Tesseract::locate(Some(tools_dir()));
    let doc = Path::new("d.pdf");
    assert!(tess.init("pol", doc).is_ok());
    assert!(tess.init("pol+eng", doc).is_ok());
    let err = tess.init("pol+deu", doc).unwrap_err();
    assert!(err.to_string().contains("deu"));
}

#[test]
fn hung_rasterizer_is_killed_after_timeout() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let mut cfg = config();
    cfg.tools.process_timeout_seconds = 1;
    let paths = vec![
        document(docs.path(), "slow.pdf", "SLEEP 30\nPAGE 1 late\n"),
        pages(docs.path(), "fast.pdf", &["quick"]),
    ];

    let started = std::time::Instant::now();
    let out = run_batch(&pipeline(&cfg, scratch.path()), &paths, 2);
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert_eq!(out.texts(), vec!["", "quick\n"]);
    assert_eq!(out.errors[0].kind, "timeout");
}

#[test]
fn payload_round_trips_recognized_text() {
    let docs = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let paths = vec![
        pages(docs.path(), "quotes.pdf", &[r#"She said "no" \ twice"#, "Zażółć\tgęślą"]),
        pages(docs.path(), "plain.pdf", &["plain"]),
    ];
    let out = run_batch(&pipeline(&config(), scratch.path()), &paths, 2);
    let payload = serialize(&out.texts()).unwrap();
    let back: Vec<String> = serde_json::from_str(&payload).unwrap();
    assert_eq!(back[0], "She said \"no\" \\ twice\nZażółć\tgęślą\n");
    assert_eq!(back[1], "plain\n");
}
