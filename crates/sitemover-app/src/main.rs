//! `sitemover` binary entrypoint.

use std::process::ExitCode;

use clap::Parser;
use sitemover_app::{Cli, run};

#[tokio::main]
async fn main() -> ExitCode {
    ExitCode::from(run(Cli::parse()).await)
}
