use std::path::PathBuf;

use clap::Parser;
use program_tree::{
    GapWarning,
    domain::{PrerequisiteSource, gap::check_prerequisite},
};
use tracing::instrument;

use super::{OutputFormat, load, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Check {
    /// Only check the prerequisite with this identifier
    #[arg(long, value_name = "ID")]
    prerequisite: Option<u64>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Check {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = load(root)?;
        let catalogue = directory.catalogue();

        let warnings: Vec<GapWarning> = match self.prerequisite {
            Some(id) => {
                let Some(prerequisite) = catalogue.prerequisite(id) else {
                    anyhow::bail!("Prerequisite {id} not found");
                };
                check_prerequisite(catalogue.hierarchy(), prerequisite.root, prerequisite)?
                    .into_iter()
                    .collect()
            }
            None => catalogue.check_prerequisites()?,
        };

        match self.output {
            OutputFormat::Table => {
                if warnings.is_empty() {
                    println!("{}", "All prerequisites stay within their program".success());
                }
                for warning in &warnings {
                    println!("{}", warning.to_string().warning());
                }
            }
            OutputFormat::Json => {
                let output: Vec<_> = warnings
                    .iter()
                    .map(|warning| {
                        serde_json::json!({
                            "learning_unit": warning.learning_unit,
                            "program": warning.root,
                            "outside": warning.outside,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        Ok(())
    }
}
