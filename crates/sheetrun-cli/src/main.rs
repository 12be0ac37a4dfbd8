//! sheetrun CLI - cell reference scanning and supervised code execution.

mod run;
mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sheetrun")]
#[command(about = "Scan and run spreadsheet cell code")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cell references found in a code file as JSON
    Scan {
        /// Path to the code file
        file: PathBuf,

        /// Resolve relative references against this cell, as `x,y`
        #[arg(long, value_parser = scan::parse_anchor, allow_hyphen_values = true)]
        anchor: Option<(i64, i64)>,
    },

    /// Execute a code file through a worker process
    Run {
        /// Path to the code file
        file: PathBuf,

        /// Sheet the code is attached to
        #[arg(long, default_value = "sheet-1")]
        sheet: String,

        /// Column of the code cell
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        x: i64,

        /// Row of the code cell
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        y: i64,

        /// Worker binary (defaults to discovery)
        #[arg(long)]
        worker: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Core errors carry recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<sheetrun_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Scan { file, anchor } => scan::execute(&file, anchor).map_err(format_error)?,

        Commands::Run {
            file,
            sheet,
            x,
            y,
            worker,
        } => {
            run::execute(&file, &sheet, x, y, worker)
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
