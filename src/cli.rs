use std::path::PathBuf;

mod check;
mod leaves;
mod postpone;
mod terminal;
mod validate;

use check::Check;
use clap::ArgAction;
use leaves::Leaves;
use postpone::Postpone;
use program_tree::{Config, Directory, storage::directory::Loaded};
use terminal::Colorize;
use tracing::instrument;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the catalogue directory
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Initialize a new catalogue
    Init,

    /// List the learning units reachable from one or more programs
    Leaves(Leaves),

    /// Report prerequisites that reference learning units outside their
    /// program
    Check(Check),

    /// Copy learning units forward into the next academic year
    ///
    /// Only learning units whose latest year is below the horizon are
    /// postponed. Classes and mobility units are skipped unless the
    /// configuration says otherwise.
    Postpone(Postpone),

    /// Validate catalogue health
    Validate(Validate),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Init => Init::run(root)?,
            Self::Leaves(command) => command.run(root)?,
            Self::Check(command) => command.run(root)?,
            Self::Postpone(command) => command.run(root)?,
            Self::Validate(command) => command.run(root)?,
        }
        Ok(())
    }
}

struct Init;

impl Init {
    #[instrument]
    fn run(root: PathBuf) -> anyhow::Result<()> {
        let directory = Directory::new(root);
        directory.init(&Config::default())?;

        println!(
            "{}",
            format!("Initialized catalogue in {}", directory.root().display()).success()
        );
        println!("  Created: .ptree/config.toml");
        println!("  Created: catalogue.yaml");
        Ok(())
    }
}

/// Loads the catalogue under `root`, with context for the user.
fn load(root: PathBuf) -> anyhow::Result<Directory<Loaded>> {
    let display = root.display().to_string();
    Directory::new(root).load().map_err(|e| {
        anyhow::anyhow!("Failed to load catalogue from {display}: {e}\nRun `ptree init` to create one")
    })
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ptree", "leaves", "1", "2", "-vv", "--root", "/tmp"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, PathBuf::from("/tmp"));
        assert!(matches!(cli.command, Command::Leaves(_)));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["ptree"]).is_err());
    }

    #[test]
    fn init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        Init::run(tmp.path().to_path_buf()).unwrap();
        let directory = load(tmp.path().to_path_buf()).unwrap();
        assert!(directory.catalogue().hierarchy().is_empty());
        assert!(Init::run(tmp.path().to_path_buf()).is_err());
    }
}
