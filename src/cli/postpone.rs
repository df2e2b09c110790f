use std::path::PathBuf;

use clap::Parser;
use program_tree::{AcademicYear, LearningUnit, PostponementResult};
use tracing::instrument;

use super::{load, terminal::Colorize};

const MAX_HORIZON: i64 = 100;

#[derive(Debug, Parser)]
pub struct Postpone {
    /// Academic year to compute the horizon from (e.g. 2020 or 2020-21)
    #[arg(long, value_name = "YEAR")]
    current_year: Option<AcademicYear>,

    /// Number of years ahead of the current one to extend to
    #[arg(long, value_name = "YEARS", value_parser = clap::value_parser!(u16).range(..=MAX_HORIZON))]
    horizon: Option<u16>,

    /// Show what would be postponed without writing the catalogue
    #[arg(long)]
    dry_run: bool,
}

impl Postpone {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut directory = load(root)?;

        let config = directory.config_mut();
        if let Some(year) = self.current_year {
            config.set_current_year(Some(year));
        }
        if let Some(horizon) = self.horizon {
            config.set_horizon(horizon);
        }
        let horizon = config.policy().horizon;
        let dry_run = self.dry_run;

        let result = directory.postpone(
            |units: &[LearningUnit]| print_before(units, horizon),
            |_: &[LearningUnit], result: &PostponementResult| print_after(result, dry_run),
        );

        if self.dry_run {
            println!("{}", "Dry run: catalogue not written".dim());
        } else if result.number_extended() > 0 {
            directory.flush()?;
        }

        Ok(())
    }
}

fn print_before(units: &[LearningUnit], horizon: AcademicYear) {
    println!(
        "Postponing {} learning unit(s) up to {horizon}",
        units.len()
    );
    for unit in units {
        let latest = unit
            .latest()
            .map_or_else(String::new, |(year, _)| format!(" (latest {year})"));
        println!("  • {unit}{}", latest.dim());
    }
}

fn summary_line(result: &PostponementResult, dry_run: bool) -> String {
    if dry_run {
        format!(
            "Dry run: {} would be extended and {} error(s)",
            result.number_extended(),
            result.number_error()
        )
    } else {
        result.to_string()
    }
}

fn print_after(result: &PostponementResult, dry_run: bool) {
    let summary = summary_line(result, dry_run);
    if !result.errors.is_empty() {
        println!("{}", summary.warning());
        for error in &result.errors {
            println!("  • {}: {}", error.record, error.message);
        }
    } else if dry_run {
        println!("{}", summary.dim());
    } else {
        println!("{}", summary.success());
    }
    if result.skipped > 0 {
        println!(
            "{}",
            format!("{} already postponed", result.skipped).dim()
        );
    }
}
