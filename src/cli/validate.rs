use std::path::PathBuf;

use clap::Parser;
use program_tree::{Catalogue, NodeId};
use tracing::instrument;

use super::{OutputFormat, load, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Validate catalogue health")]
pub struct Validate {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Default)]
struct ValidationResult {
    cycles: Vec<Vec<NodeId>>,
    dangling_roots: Vec<(u64, NodeId)>,
    self_references: Vec<u64>,
}

impl ValidationResult {
    fn collect(catalogue: &Catalogue) -> Self {
        let hierarchy = catalogue.hierarchy();
        let mut result = Self {
            cycles: hierarchy.cycles(),
            ..Self::default()
        };

        for prerequisite in catalogue.prerequisites() {
            if hierarchy
                .node(prerequisite.root)
                .is_none_or(|node| !node.is_branch())
            {
                result.dangling_roots.push((prerequisite.id, prerequisite.root));
            }
            if prerequisite.references_itself() {
                result.self_references.push(prerequisite.id);
            }
        }

        result
    }

    fn count(&self) -> usize {
        self.cycles.len() + self.dangling_roots.len() + self.self_references.len()
    }
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = load(root)?;
        let result = ValidationResult::collect(directory.catalogue());

        match self.output {
            OutputFormat::Table => Self::output_table(&result),
            OutputFormat::Json => Self::output_json(&result)?,
        }

        if result.count() > 0 {
            std::process::exit(2);
        }

        Ok(())
    }

    fn output_table(result: &ValidationResult) {
        println!("Validating catalogue...\n");

        if result.cycles.is_empty() {
            println!("✓ Hierarchy:     No cycles");
        } else {
            println!(
                "{}",
                format!("✗ Hierarchy:     {} cycle(s)", result.cycles.len()).warning()
            );
            for cycle in &result.cycles {
                let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                println!("    • {}", path.join(" → "));
            }
        }

        if result.dangling_roots.is_empty() {
            println!("✓ Programs:      Every prerequisite belongs to a known program");
        } else {
            println!(
                "{}",
                format!(
                    "✗ Programs:      {} prerequisite(s) outside any program",
                    result.dangling_roots.len()
                )
                .warning()
            );
            for (id, root) in &result.dangling_roots {
                println!("    • prerequisite {id}: #{root} is not a group");
            }
        }

        if result.self_references.is_empty() {
            println!("✓ Prerequisites: No learning unit requires itself");
        } else {
            println!(
                "{}",
                format!(
                    "✗ Prerequisites: {} learning unit(s) require themselves",
                    result.self_references.len()
                )
                .warning()
            );
            for id in &result.self_references {
                println!("    • prerequisite {id}");
            }
        }

        let total = result.count();
        if total == 0 {
            println!("\n{}", "Catalogue is healthy (0 issues)".success());
        } else {
            println!("\n{}", format!("Summary: {total} issues found").warning());
        }
    }

    fn output_json(result: &ValidationResult) -> anyhow::Result<()> {
        use serde_json::json;

        let dangling: Vec<_> = result
            .dangling_roots
            .iter()
            .map(|(id, root)| json!({ "prerequisite": id, "root": root }))
            .collect();

        let total = result.count();
        let output = json!({
            "status": if total == 0 { "healthy" } else { "issues_found" },
            "issues": {
                "cycles": result.cycles,
                "dangling_roots": dangling,
                "self_references": result.self_references,
            },
            "summary": { "total_issues": total },
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_kind_of_issue() {
        let catalogue = Catalogue::from_yaml(
            r#"
_version: "1"
nodes:
  - { id: 1, kind: branch }
  - { id: 2, kind: branch }
  - { id: 3, kind: leaf, acronym: LU100 }
links:
  - { parent: 1, child: 2 }
  - { parent: 2, child: 1 }
prerequisites:
  - { id: 7, root: 3, learning_unit: LU100, expression: "LU200" }
  - { id: 8, root: 1, learning_unit: LU100, expression: "LU100 OR LU200" }
"#,
        )
        .unwrap();

        let result = ValidationResult::collect(&catalogue);
        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.dangling_roots, vec![(7, NodeId::new(3).unwrap())]);
        assert_eq!(result.self_references, vec![8]);
        assert_eq!(result.count(), 3);
    }

    #[test]
    fn healthy_catalogue_has_no_issues() {
        let catalogue = Catalogue::from_yaml("_version: \"1\"\n").unwrap();
        assert_eq!(ValidationResult::collect(&catalogue).count(), 0);
    }
}
