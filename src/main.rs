//! `ptree`: inspect program hierarchies and postpone learning units.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
