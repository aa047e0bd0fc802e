//! Run the content-integrity checks and print the findings

use anyhow::Result;

use crate::check::{self, Report, Severity};
use crate::Site;

/// Check the site content and print a report
pub fn run(site: &Site) -> Result<Report> {
    let report = check::run(site)?;

    let mut issues = report.issues.clone();
    issues.sort_by_key(|i| (i.severity != Severity::Error, i.source.clone()));

    for issue in &issues {
        println!("{}: {}: {}", issue.severity, issue.source, issue.message);
    }

    if report.issues.is_empty() {
        println!("No problems found.");
    } else {
        println!(
            "\n{} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }

    Ok(report)
}
