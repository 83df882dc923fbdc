//! Generate the serialized corpus artifact for a rule directory, so that
//! engine startup can skip re-reading thousands of rule files.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use licentia::index::cache::{corpus_checksum, write_artifact};
use licentia::{build_index, load_rules};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of .RULE/.yml rule pairs
    corpus_dir: PathBuf,

    /// Where to write the artifact
    #[arg(short, long, default_value = "corpus.bin.zst")]
    output: PathBuf,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let rules = load_rules(&cli.corpus_dir)
        .with_context(|| format!("loading rules from {}", cli.corpus_dir.display()))?;
    println!("loaded {} rules from {}", rules.len(), cli.corpus_dir.display());

    // A full index build catches corpus defects the loader alone cannot
    // see, duplicate token sequences in particular.
    let index = build_index(rules)?;

    let checksum = corpus_checksum(&cli.corpus_dir)?;
    write_artifact(&cli.output, index.rules(), &checksum)?;
    println!("wrote {} (corpus checksum {checksum})", cli.output.display());
    Ok(())
}
