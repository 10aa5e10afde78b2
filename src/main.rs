use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use salescope::{run_pipeline, InventoryStore};

/// CLI stand-in for the HTTP layer: run the pipeline on a CSV file and print
/// the result as JSON.
///
/// Usage: salescope <file.csv> [--start YYYY-MM-DD] [--end YYYY-MM-DD]
fn run() -> Result<()> {
    let mut path: Option<String> = None;
    let mut start: Option<String> = None;
    let mut end: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--start" {
            start = args.next();
        } else if arg == "--end" {
            end = args.next();
        } else if path.is_none() {
            path = Some(arg);
        } else {
            bail!("unexpected argument: {arg}");
        }
    }
    let Some(path) = path else {
        bail!("usage: salescope <file.csv> [--start YYYY-MM-DD] [--end YYYY-MM-DD]");
    };

    let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;

    let store = InventoryStore::new();
    let result = run_pipeline(&bytes, start.as_deref(), end.as_deref(), &store)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
