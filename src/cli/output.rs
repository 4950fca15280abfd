//! Table and console output formatting for CLI commands.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use crate::domain::models::{EntryState, QueueEntry, ScoreCategory};
use crate::domain::ports::audit_log::AuditRecord;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn state_color(state: EntryState) -> Color {
    match state {
        EntryState::Pending => Color::Yellow,
        EntryState::Processing => Color::Cyan,
        EntryState::Done => Color::Green,
    }
}

/// Format queue entries as a table.
pub fn format_entry_table(entries: &[QueueEntry]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("State").add_attribute(Attribute::Bold),
        Cell::new("Created").add_attribute(Attribute::Bold),
        Cell::new("Scores").add_attribute(Attribute::Bold),
    ]);

    for entry in entries {
        let scores = entry
            .outcome
            .as_ref()
            .map_or_else(|| "-".to_string(), |o| o.score_counts().to_string());

        table.add_row(vec![
            Cell::new(truncate_text(&entry.id, 44)),
            Cell::new(entry.kind.as_str()),
            Cell::new(entry.state.as_str()).fg(state_color(entry.state)),
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(scores),
        ]);
    }

    table.to_string()
}

/// Format audit records as a table.
pub fn format_audit_table(records: &[AuditRecord]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Seq").add_attribute(Attribute::Bold),
        Cell::new("Event").add_attribute(Attribute::Bold),
        Cell::new("Layer").add_attribute(Attribute::Bold),
        Cell::new("Patch ID").add_attribute(Attribute::Bold),
        Cell::new("Recorded").add_attribute(Attribute::Bold),
    ]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.seq.to_string()),
            Cell::new(record.event.as_str()),
            Cell::new(record.layer.map_or("-", |l| l.as_str())),
            Cell::new(truncate_text(&record.patch_id, 40)),
            Cell::new(record.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    table.to_string()
}

/// Render one entry's outcome as indented detail lines.
pub fn print_entry_detail(entry: &QueueEntry) {
    println!("{} {}", style("Entry:").bold(), entry.id);
    println!("  Kind:    {}", entry.kind.as_str());
    println!("  State:   {}", entry.state.as_str());
    println!("  Created: {}", entry.created_at.to_rfc3339());

    let Some(outcome) = &entry.outcome else {
        return;
    };

    println!("  Claims:  {}", outcome.claims.len());
    println!("  Missions: {}", outcome.mission_plan.len());
    println!("  Scores:  {}", outcome.score_counts());

    for score in &outcome.scores {
        let marker = match score.category {
            ScoreCategory::Verified => style("✓").green(),
            ScoreCategory::Corrected => style("✎").yellow(),
            ScoreCategory::Enriched => style("+").cyan(),
            ScoreCategory::Conflict => style("!").red(),
            ScoreCategory::Ungrounded => style("?").dim(),
        };
        println!(
            "    {marker} [{}] {} ({})",
            score.claim_id,
            truncate_text(&score.rationale, 70),
            score.confidence.as_str()
        );
    }

    if !outcome.patches_applied.is_empty() {
        println!("  Patches applied:");
        for patch in &outcome.patches_applied {
            println!(
                "    {} {} {} = {}",
                patch.layer.as_str(),
                patch.target,
                patch.field_path,
                truncate_text(&patch.new_value.to_string(), 50)
            );
        }
    }

    if !outcome.errors.is_empty() {
        println!("  {}", style("Errors:").red());
        for error in &outcome.errors {
            println!("    {}", truncate_text(error, 100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("0123456789abc", 10), "0123456...");
    }

    #[test]
    fn test_format_entry_table_headers() {
        let table = format_entry_table(&[]);
        assert!(table.contains("ID"));
        assert!(table.contains("State"));
    }
}
