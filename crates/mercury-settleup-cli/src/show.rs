use anstyle::{AnsiColor, Color, Style};
use mercury_settleup::error::display_chain;
use mercury_settleup::reconcile::WriteStatus;
use mercury_settleup::{RunReport, SyncMode};

pub fn show_report(report: &RunReport, mode: SyncMode) {
    let created_style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));
    let updated_style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
    let error_style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));
    let header_style = Style::new().bold();
    let reset = Style::new();

    let dry_run = mode == SyncMode::DryRun;

    for (config, outcome) in &report.outcomes {
        let search = match config.mercury_substring.as_str() {
            "" => String::new(),
            substring => format!(" ({substring})"),
        };
        println!(
            "{header_style}━━━ {} → {}{search} ━━━{reset}",
            config.mercury_account, config.settleup_group
        );

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                println!("  {error_style}failed{reset}: {}", display_chain(error));
                println!();
                continue;
            }
        };

        let plan = &outcome.plan;
        let verb = if dry_run { "would be " } else { "" };
        for (id, entry) in &plan.created {
            println!(
                "  {created_style}+{reset} {id} {}",
                entry.purpose.as_deref().unwrap_or_default()
            );
        }
        for (id, entry) in &plan.updated {
            println!(
                "  {updated_style}~{reset} {id} {}",
                entry.purpose.as_deref().unwrap_or_default()
            );
        }
        println!(
            "  {created_style}{}{reset} {verb}created, {updated_style}{}{reset} {verb}updated, {} unchanged",
            plan.created.len(),
            plan.updated.len(),
            plan.unchanged,
        );
        if outcome.write == WriteStatus::Failed {
            println!("  {error_style}writing the batch failed{reset}, see log");
        }
        println!();
    }

    let deletions = &report.deletions;
    let failed = report.failed();
    let write_failures = report.write_failures();
    if deletions.deleted.is_empty() && deletions.planned.is_empty() && report.succeeded() {
        println!("✓ Ledger is in sync");
        return;
    }

    println!("{header_style}━━━ Summary ━━━{reset}");
    for (group, id) in &deletions.planned {
        println!("  {error_style}-{reset} {group}/{id} (would be deleted)");
    }
    if !deletions.deleted.is_empty() {
        println!(
            "  {error_style}{}{reset} stale transaction(s) deleted",
            deletions.deleted.len()
        );
    }
    if !deletions.failed.is_empty() {
        println!(
            "  {error_style}{}{reset} deletion(s) failed",
            deletions.failed.len()
        );
    }
    for group in &deletions.vetoed_groups {
        println!("  deletions skipped for group {group} after errors");
    }
    if failed > 0 {
        println!("  {error_style}{failed}{reset} configuration(s) failed");
    }
    if write_failures > 0 {
        println!("  {error_style}{write_failures}{reset} batch write(s) failed");
    }
}
