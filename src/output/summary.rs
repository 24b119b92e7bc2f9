//! Markdown summary of a finished run

use crate::crawler::RunSummary;
use crate::notify::DeliveryStatus;

/// Formats a run summary as markdown
pub fn format_run_summary(summary: &RunSummary) -> String {
    let record = &summary.record;
    let mut md = String::new();

    md.push_str("# Policy Harvest Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", record.run_id));
    md.push_str(&format!("- **Mode**: {}\n", record.mode));
    md.push_str(&format!("- **Started**: {}\n", record.start_time.to_rfc3339()));
    if let Some(finished) = record.end_time {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
        md.push_str(&format!(
            "- **Duration**: {} seconds\n",
            (finished - record.start_time).num_seconds()
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", record.status_label()));
    md.push_str(&format!("- **Config Hash**: {}\n\n", record.config_hash));

    md.push_str("## Totals\n\n");
    md.push_str(&format!("- **New Documents**: {}\n", record.new_doc_count));
    md.push_str(&format!("- **References Scanned**: {}\n", record.total_scanned_count));
    if summary.recovery.rolled_forward > 0 || summary.recovery.missing_files > 0 {
        md.push_str(&format!(
            "- **Recovered From Manifest**: {} ({} with missing files)\n",
            summary.recovery.rolled_forward, summary.recovery.missing_files
        ));
    }
    md.push('\n');

    if !summary.modules.is_empty() {
        md.push_str("## Modules\n\n");
        md.push_str("| Module | Mode | Pages | Scanned | New | Skipped | Status |\n");
        md.push_str("|--------|------|-------|---------|-----|---------|--------|\n");
        for module in &summary.modules {
            md.push_str(&format!(
                "| {} | {} | {}-{} | {} | {} | {} | {} |\n",
                module.module_id,
                module.mode,
                module.start_page,
                module.last_page_reached,
                module.scanned,
                module.archived.len(),
                module.skipped,
                module.status
            ));
        }
        md.push('\n');
    }

    let archived: Vec<_> = summary.archived().collect();
    if !archived.is_empty() {
        md.push_str("## New Documents\n\n");
        for record in archived {
            md.push_str(&format!(
                "- [{}] {} {}",
                record.module_id,
                record.publish_date.as_deref().unwrap_or("unknown"),
                record.title
            ));
            if let Some(note) = &record.asset_note {
                md.push_str(&format!(" ({})", note));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    if !record.error_summary.is_empty() {
        md.push_str("## Errors\n\n");
        for line in &record.error_summary {
            md.push_str(&format!("- {}\n", line));
        }
        md.push('\n');
    }

    if !summary.receipts.is_empty() {
        let failed = summary
            .receipts
            .iter()
            .filter(|r| r.status == DeliveryStatus::Failed)
            .count();
        md.push_str("## Notifications\n\n");
        md.push_str(&format!(
            "- **Delivered**: {}\n- **Failed**: {}\n",
            summary.receipts.len() - failed,
            failed
        ));
    }

    md
}
