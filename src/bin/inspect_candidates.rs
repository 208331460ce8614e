// src/bin/inspect_candidates.rs
//
// Replay a saved page and show how candidate selection sees it. Writes nothing.
use anyhow::{Context, Result};
use aqscraper::{
    fetch::saved_document,
    process::{extract_candidates, normalize, select},
};
use clap::Parser;
use std::{fs, path::PathBuf, process::exit};

#[derive(Parser, Debug)]
#[command(name = "inspect_candidates", about = "Print candidate profiles and the selection trace")]
struct Args {
    /// Saved HTML page or JSON response.
    path: PathBuf,

    #[arg(long, default_value_t = 3)]
    min_rows: usize,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = inspect(&args) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn inspect(args: &Args) -> Result<()> {
    let text = fs::read_to_string(&args.path)
        .with_context(|| format!("reading {:?}", args.path))?;
    let doc = saved_document(&args.path, text)?;

    println!("=== Document: {} ({}) ===", args.path.display(), doc.kind());
    let candidates = extract_candidates(&doc)?;

    println!("=== Candidates ({}) ===", candidates.len());
    for (i, c) in candidates.iter().enumerate() {
        println!("- {}", select::profile(i, c));
    }
    println!();

    let selection = match select::select_candidate(&candidates, args.min_rows) {
        Ok(s) => s,
        Err(e) => {
            println!("=== No selection ===");
            println!("{}", e);
            exit(2);
        }
    };

    println!("=== Selection trace ===");
    for entry in &selection.trace.entries {
        println!("{}", entry);
    }
    println!();

    let chosen = &selection.chosen;
    println!("=== Chosen: {} ({}) ===", chosen.label, chosen.layout);
    match normalize::normalize(&candidates[chosen.index], chosen.layout) {
        Ok(table) => println!("normalizes to {} canonical rows", table.len()),
        Err(e) => println!("{}", e),
    }
    Ok(())
}
