//! Keyward command-line tool.
//!
//! Usage:
//!   keyward hwid
//!   keyward trial activate --email you@example.com
//!   keyward verify PRO-AA53693D --strict
//!
//! Configuration comes from `KEYWARD_*` environment variables; `--db` and
//! `--server` override them.

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use keyward_cli::{run, Args};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();

    let ok = run(args, &mut io::stdout()).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
