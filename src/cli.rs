use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::Preferences;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Jsonl,
    Csv,
}

#[derive(Parser, Debug)]
#[command(author, version, about, allow_negative_numbers = true)]
pub struct CliOptions {
    /// Container file, or folder of containers, to repair
    pub input: PathBuf,

    /// Length of a chunk of good data between two recurrences
    #[arg(long)]
    pub chunk_size: Option<i64>,

    /// Length of a bad data run, copied from a position before
    #[arg(long)]
    pub recurrence_size: Option<i64>,

    /// Distance from the bad data back to the position it was copied from
    #[arg(long)]
    pub recurrence_distance: Option<i64>,

    /// Number of random recurrences checked before repairing
    #[arg(short = 'c', long)]
    pub consistency_sample_size: Option<usize>,

    /// Output file (or folder when the input is a folder)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Memory budget per channel, in MiB
    #[arg(long)]
    pub memory_budget_mib: Option<u64>,

    /// Target size of written segments, in MiB
    #[arg(long)]
    pub segment_size_mib: Option<u64>,

    /// Seed for the consistency sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Preferences file (YAML), defaults to ~/.recurfix.yml
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Do not remember the parameters of this run
    #[arg(long)]
    pub no_save: bool,

    /// Append a record per repaired file to this report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Jsonl)]
    pub report_format: ReportFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CliOptions {
    /// Values given on the command line, as preferences to merge over the stored ones.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            chunk_size: self.chunk_size,
            recurrence_size: self.recurrence_size,
            recurrence_distance: self.recurrence_distance,
            consistency_sample_size: self.consistency_sample_size,
            segment_size_mib: self.segment_size_mib,
            memory_budget_mib: self.memory_budget_mib,
        }
    }
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_parameters() {
        let opts = CliOptions::try_parse_from([
            "recurfix",
            "run.seg",
            "--chunk-size=6",
            "--recurrence-size",
            "2",
            "--recurrence-distance=3",
            "-c",
            "10",
        ])
        .expect("parse");
        assert_eq!(opts.input, PathBuf::from("run.seg"));
        let prefs = opts.preferences();
        assert_eq!(prefs.chunk_size, Some(6));
        assert_eq!(prefs.recurrence_size, Some(2));
        assert_eq!(prefs.recurrence_distance, Some(3));
        assert_eq!(prefs.consistency_sample_size, Some(10));
    }

    #[test]
    fn accepts_negative_values() {
        let opts = CliOptions::try_parse_from(["recurfix", "run.seg", "--recurrence-size", "-10"])
            .expect("parse");
        assert_eq!(opts.recurrence_size, Some(-10));
    }

    #[test]
    fn parses_report_and_verbosity() {
        let opts = CliOptions::try_parse_from([
            "recurfix",
            "runs/",
            "--report",
            "report.csv",
            "--report-format",
            "csv",
            "-vv",
            "--no-save",
        ])
        .expect("parse");
        assert_eq!(opts.report_format, ReportFormat::Csv);
        assert_eq!(opts.verbose, 2);
        assert!(opts.no_save);
    }
}
