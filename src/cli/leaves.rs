use std::{collections::BTreeSet, path::PathBuf};

use clap::Parser;
use program_tree::{NodeId, collect_leaf_acronyms};
use tracing::instrument;

use super::{OutputFormat, load, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Leaves {
    /// Identifiers of the programs or groups to start from (default: every
    /// top-level program)
    #[arg(value_name = "NODE")]
    roots: Vec<NodeId>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Leaves {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = load(root)?;
        let hierarchy = directory.catalogue().hierarchy();

        for id in &self.roots {
            match hierarchy.node(*id) {
                None => anyhow::bail!("Node {id} not found"),
                Some(node) if !node.is_branch() => {
                    anyhow::bail!("Node {id} is the learning unit {node}, not a group");
                }
                Some(_) => {}
            }
        }

        let roots: BTreeSet<NodeId> = if self.roots.is_empty() {
            hierarchy.roots().into_iter().collect()
        } else {
            self.roots.into_iter().collect()
        };
        let acronyms = collect_leaf_acronyms(hierarchy, &roots)?;

        match self.output {
            OutputFormat::Table => {
                if acronyms.is_empty() {
                    println!("{}", "No learning units found".dim());
                }
                for acronym in &acronyms {
                    println!("{acronym}");
                }
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "roots": roots,
                    "learning_units": acronyms,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        Ok(())
    }
}
