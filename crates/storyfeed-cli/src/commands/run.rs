use anyhow::Result;

use storyfeed_core::{AppConfig, Pipeline, RunSummary};

pub async fn run(config: &AppConfig, target: Option<&str>) -> Result<()> {
    let pipeline = Pipeline::new(config)?;

    // Per-feed progress goes to the log while the run is in flight
    let summary = pipeline.run(target).await?;

    print!("{}", render_summary(&summary));
    Ok(())
}

/// Per-feed results grouped by category, followed by the run totals
fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let mut current = None;
    for report in &summary.feeds {
        if current != Some(&report.category) {
            out.push_str(&format!("[{}]\n", report.category));
            current = Some(&report.category);
        }
        match &report.error {
            Some(err) => out.push_str(&format!("  {} - FAILED: {}\n", report.feed, err)),
            None => out.push_str(&format!("  {} - {} new posts\n", report.feed, report.new_posts)),
        }
    }

    out.push_str(&format!(
        "\nDone. {} new posts, {} items processed, {} categories processed.\n",
        summary.new_posts, summary.items_processed, summary.categories_processed
    ));
    if summary.categories_failed > 0 || summary.feeds_failed > 0 || summary.skipped > 0 {
        out.push_str(&format!(
            "  ({} categories failed, {} feeds failed, {} items skipped)\n",
            summary.categories_failed, summary.feeds_failed, summary.skipped
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyfeed_core::FeedReport;

    fn report(category: &str, feed: &str, new_posts: usize, error: Option<&str>) -> FeedReport {
        FeedReport {
            category: category.to_string(),
            feed: feed.to_string(),
            new_posts,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_summary_groups_feeds_by_category() {
        let summary = RunSummary {
            new_posts: 3,
            items_processed: 4,
            categories_processed: 2,
            feeds_failed: 1,
            feeds: vec![
                report("tech", "Tech Daily", 2, None),
                report("tech", "Broken", 0, Some("HTTP status 500")),
                report("science", "Lab Notes", 1, None),
            ],
            ..RunSummary::default()
        };

        let text = render_summary(&summary);
        assert_eq!(
            text,
            concat!(
                "[tech]\n",
                "  Tech Daily - 2 new posts\n",
                "  Broken - FAILED: HTTP status 500\n",
                "[science]\n",
                "  Lab Notes - 1 new posts\n",
                "\nDone. 3 new posts, 4 items processed, 2 categories processed.\n",
                "  (0 categories failed, 1 feeds failed, 0 items skipped)\n",
            )
        );
    }

    #[test]
    fn test_clean_run_omits_failure_line() {
        let text = render_summary(&RunSummary::default());
        assert_eq!(text, "\nDone. 0 new posts, 0 items processed, 0 categories processed.\n");
    }
}
