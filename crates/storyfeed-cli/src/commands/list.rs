use anyhow::Result;

use storyfeed_core::storage::PostStore;
use storyfeed_core::{AppConfig, CategoryConfig};

pub fn run(config: &AppConfig) -> Result<()> {
    let categories = &config.general.categories;

    if categories.is_empty() {
        println!("No categories configured.");
        println!("\nAdd category names under [general] categories in the config file,");
        println!("with one <name>.json per category in {}", config.categories_dir().display());
        return Ok(());
    }

    println!("Categories ({}):\n", categories.len());

    for name in categories {
        let category = match CategoryConfig::load(&config.category_config_path(name)) {
            Ok(category) => category,
            Err(e) => {
                println!("  {} [ERROR: {}]\n", name, e);
                continue;
            }
        };

        let store = PostStore::load(&config.posts_path(name), category.history_days);
        let enabled = category.enabled_feeds().count();

        println!(
            "  {} - {} posts, {}/{} feeds enabled, {} days retention",
            name,
            store.len(),
            enabled,
            category.feeds.len(),
            category.history_days
        );
        if let Some(newest) = store.posts().first() {
            println!("    Newest: {} ({})", newest.title, newest.effective_time().format("%Y-%m-%d %H:%M"));
        }
        println!();
    }

    Ok(())
}
