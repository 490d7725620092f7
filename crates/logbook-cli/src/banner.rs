use std::path::Path;

use logbook_db::{DatabaseSettings, MigrationStatus};

/// Print a boxed summary of where the database lives and how far its schema
/// has come.
pub fn print_status_panel(settings: &DatabaseSettings, status: &MigrationStatus, backups: usize) {
    let version = env!("CARGO_PKG_VERSION");

    let schema = if let Some(err) = &status.error {
        format!("unknown ({err})")
    } else if status.pending == 0 {
        "up to date".to_string()
    } else {
        format!(
            "{} pending migration{}",
            status.pending,
            if status.pending == 1 { "" } else { "s" }
        )
    };

    let backup = if !settings.backup.enabled {
        "disabled".to_string()
    } else {
        format!("{backups} kept (limit {})", settings.backup.retention)
    };

    let width = 72;
    let title = format!("logbook v{version}");
    let title_dashes = width - 2 - title.len() - 5; // 2 for ╭╮, 5 for "─── " + " "
    let top = format!("╭─── {title} {}╮", "─".repeat(title_dashes));
    let bottom = format!("╰{}╯", "─".repeat(width - 2));

    let inner = width - 4;
    let row = |label: &str, value: &str| {
        let line = format!("{label:<12}{value}");
        format!("│ {:<inner$} │", truncate(&line, inner))
    };

    println!("{top}");
    println!("{}", row("Database", &display_path(&settings.path)));
    println!("{}", row("Migrations", &display_path(&settings.migrations_dir)));
    println!(
        "{}",
        row(
            "Applied",
            &format!("{} of {}", status.executed, status.available)
        )
    );
    println!("{}", row("Schema", &schema));
    println!("{}", row("Backups", &backup));
    println!("{bottom}");

    for name in &status.pending_migrations {
        println!("  pending: {name}");
    }
}

fn display_path(path: &Path) -> String {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => path.to_string_lossy().replace(&home, "~"),
        _ => path.to_string_lossy().to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
