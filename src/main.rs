use anyhow::Result;
use clap::Parser;

use signoff::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(cli::run(cli))
}
