use batch_ocr::cli;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::Args::parse();
    match cli::dispatch(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("batch-ocr: {err:#}");
            ExitCode::from(cli::EXIT_FATAL)
        }
    }
}
