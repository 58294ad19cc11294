use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use clone_cli::run_clone;
use clone_engine::EngineVariant;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Common,
    Transactional,
}

impl From<VariantArg> for EngineVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Common => EngineVariant::Common,
            VariantArg::Transactional => EngineVariant::Transactional,
        }
    }
}

/// Clones a directory of source-engine data files into a destination
/// directory, exercising the same begin/copy/apply/end sequence a
/// networked clone would use, but with the two sides wired together
/// in-process.
#[derive(Parser, Debug)]
#[command(name = "clone", version, about)]
struct Cli {
    /// Directory to read source tables from.
    #[arg(long)]
    source: PathBuf,

    /// Directory to write the cloned copy into.
    #[arg(long)]
    dest: PathBuf,

    /// Which engine variant's copy strategy to use.
    #[arg(long, value_enum, default_value_t = VariantArg::Common)]
    variant: VariantArg,

    /// Number of host-supplied worker threads to drive the copy with.
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// Maximum bytes sent per chunk.
    #[arg(long, default_value_t = 1 << 20)]
    chunk_size: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run_clone(&cli.source, &cli.dest, cli.variant.into(), cli.tasks, cli.chunk_size) {
        Ok(report) => {
            println!(
                "clone {} complete: {} tables copied into {}",
                report.locator,
                report.tables_discovered,
                cli.dest.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("clone failed: {e}");
            ExitCode::FAILURE
        }
    }
}
