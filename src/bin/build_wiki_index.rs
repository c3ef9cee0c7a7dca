//! Encyclopedia dump indexing binary.
//!
//! Streams a `pages-articles` XML dump (bzip2-compressed or plain), and
//! writes the sharded document store and inverted index under `public/`.
//!
//! Usage:
//! ```bash
//! cargo run --release --bin build-wiki-index -- enwiki-latest-pages-articles.xml.bz2
//! ```
//!
//! Set `RUST_LOG=debug` for per-shard output. `WIKISHARD_OUTPUT` overrides
//! the output root.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wikishard::builder::DEFAULT_OUTPUT_DIR;
use wikishard::{build_index, BuildConfig};

const USAGE: &str = "usage: build-wiki-index <dump.xml.bz2>";

#[derive(Parser, Debug)]
#[command(name = "build-wiki-index", version, about = "Build a static full-text index from an encyclopedia dump")]
struct Cli {
    /// Path to the dump file (.xml.bz2 or .xml)
    dump: Option<PathBuf>,

    /// Output root that receives docs/ and index/
    #[arg(long, env = "WIKISHARD_OUTPUT", default_value = DEFAULT_OUTPUT_DIR, hide = true)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let Some(dump) = cli.dump else {
        println!("{}", USAGE);
        std::process::exit(1);
    };

    init_tracing();

    let config = BuildConfig::new(cli.output).with_progress(std::io::stderr().is_terminal());
    build_index(&dump, config)
        .with_context(|| format!("failed to build index from {}", dump.display()))?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
