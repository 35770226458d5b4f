use anyhow::Result;

use storyfeed_core::storage::InvalidFeedLedger;
use storyfeed_core::AppConfig;

pub fn run(config: &AppConfig) -> Result<()> {
    let ledger = InvalidFeedLedger::load(&config.ledger_path());
    let mut entries: Vec<_> = ledger.entries().iter().collect();

    if entries.is_empty() {
        println!("No failing feeds recorded.");
        return Ok(());
    }

    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.last_seen_at.cmp(&a.last_seen_at)));

    println!("Failing feeds ({}):\n", entries.len());
    for entry in entries {
        println!("  {} [{}] - {} failures", entry.name, entry.category, entry.count);
        println!("    URL: {}", entry.url);
        println!("    Last error: {}", entry.last_error);
        println!(
            "    Seen: {} .. {}",
            entry.first_seen_at.format("%Y-%m-%d %H:%M"),
            entry.last_seen_at.format("%Y-%m-%d %H:%M")
        );
        println!();
    }

    Ok(())
}
