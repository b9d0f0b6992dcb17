use clap::Parser;
use eyre::Result;

use smartfan::cli::CliOpts;

fn main() -> Result<()> {
    let opts = CliOpts::parse();

    smartfan::init()?;
    smartfan::cli::run(opts)
}
