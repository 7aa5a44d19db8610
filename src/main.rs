mod cli;
mod config;
mod convert;
mod error;
mod fsio;
mod identity;
mod log;
mod mapping;
mod mode;
mod renamer;
mod rewrite;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
