use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ecm_reference::{load_with, Dimension, Error, LoadOptions};

/// Check a directory of ECM reference data and report every problem at once.
#[derive(Debug, Parser)]
#[command(name = "ecm-validate", version)]
struct Args {
    /// Directory holding record and lookup-table files.
    dir: PathBuf,

    /// TOML file with load options.
    #[arg(long)]
    options: Option<PathBuf>,

    /// Descend into subdirectories.
    #[arg(long)]
    recursive: bool,

    /// Reject unknown record fields instead of warning about them.
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let mut options = match &args.options {
        Some(path) => LoadOptions::from_toml_file(path)
            .with_context(|| format!("reading options from {}", path.display()))?,
        None => LoadOptions::default(),
    };
    if args.recursive {
        options = options.with_recursive(true);
    }
    if args.strict {
        options = options.with_deny_unknown_fields(true);
    }

    let collection = match load_with(&args.dir, &options) {
        Ok(c) => c,
        Err(Error::Invalid(problems)) => {
            eprintln!("{}: {} problem(s)", args.dir.display(), problems.len());
            for problem in &problems {
                eprintln!("  - {problem}");
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(other) => {
            return Err(other).with_context(|| format!("loading {}", args.dir.display()));
        }
    };

    println!(
        "{}: {} record(s), {} lookup table(s)",
        args.dir.display(),
        collection.len(),
        collection.tables().count()
    );
    for dim in Dimension::ALL {
        if let Some(values) = collection.values(dim).filter(|v| !v.is_empty()) {
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            println!("  {:<15} {}", dim.key(), values.join(", "));
        }
    }
    for table in collection.tables() {
        println!("  table `{}`", table.name);
        for series in table.series() {
            println!(
                "    {:<40} {}..={}",
                series.key.to_string(),
                series.first_year(),
                series.last_year()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}
