use crate::error::CliError;
use engine_config::report::issue::ConfigIssue;
use engine_core::state::Checkpoint;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport<'a> {
    pub source: &'a str,
    pub valid: bool,
    pub issues: &'a [ConfigIssue],
}

impl<'a> ValidationReport<'a> {
    pub fn new(source: &'a str, issues: &'a [ConfigIssue]) -> Self {
        Self {
            source,
            valid: !issues.iter().any(ConfigIssue::is_error),
            issues,
        }
    }
}

pub async fn write_report(report: &ValidationReport<'_>, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub fn print_report(report: &ValidationReport<'_>) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

pub fn print_checkpoints(checkpoints: &[Checkpoint], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(checkpoints)?);
        return Ok(());
    }

    for cp in checkpoints {
        println!("Checkpoint for source '{}':", cp.source);
        println!("-----------------------------");
        println!("{:<16} {}", "Sequence", cp.sequence);
        println!("{:<16} {}", "Records done", cp.records_done);
        println!("{:<16} {}", "Last batch", cp.batch_id);
        println!("{:<16} {}", "Updated", cp.updated_at.to_rfc3339());
        println!("{:<16} {}", "Offset", cp.offset);
        println!();
    }
    Ok(())
}
