//! Plain-text bodies for run notifications.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::scheduler::WatchResult;
use crate::watchlist::{WatchItem, WatchType};

fn watch_label(w: &WatchItem) -> String {
    let kind = match w.kind {
        WatchType::Author => "Author",
        WatchType::Keyword => "Keyword",
        WatchType::Orcid => "ORCID",
    };
    format!("{kind}: {}", w.value)
}

fn stamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Subject + body listing up to `max_listed` new articles per watch.
pub fn new_articles_email(
    results: &[WatchResult],
    run_at: DateTime<Utc>,
    max_listed: usize,
    folder_name: &str,
) -> (String, String) {
    let total_new: usize = results.iter().map(|r| r.new_articles.len()).sum();
    let subject = format!(
        "Auto-Watch: {total_new} new article{} found",
        if total_new == 1 { "" } else { "s" }
    );

    let mut body = String::new();
    let _ = writeln!(body, "Auto-Watch run: {}", stamp(run_at));
    let _ = writeln!(body);
    let _ = writeln!(body, "{total_new} new article(s) found across your watches.");

    for r in results.iter().filter(|r| !r.new_articles.is_empty()) {
        let _ = writeln!(body);
        let _ = writeln!(
            body,
            "== {} ({} new of {} found) ==",
            watch_label(&r.watch_item),
            r.new_articles.len(),
            r.articles_found
        );
        for (i, a) in r.new_articles.iter().take(max_listed).enumerate() {
            let _ = writeln!(body, "{}. {}", i + 1, a.title);
            if !a.authors.is_empty() {
                let _ = writeln!(body, "   Authors: {}", a.authors);
            }
            let year = if a.year.is_empty() { "n/a" } else { a.year.as_str() };
            let _ = writeln!(
                body,
                "   Source: {} | Year: {}",
                a.source_names().join(", "),
                year
            );
            if !a.url.is_empty() {
                let _ = writeln!(body, "   URL: {}", a.url);
            }
        }
        if r.new_articles.len() > max_listed {
            let _ = writeln!(body, "   +{} more", r.new_articles.len() - max_listed);
        }
    }

    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "All articles found in this run were archived automatically in the \"{folder_name}\" folder."
    );
    (subject, body)
}

/// Subject + body for a run without new articles.
pub fn digest_email(results: &[WatchResult], run_at: DateTime<Utc>) -> (String, String) {
    let subject = "Auto-Watch daily digest: no new articles".to_string();

    let mut body = String::new();
    let _ = writeln!(body, "Auto-Watch run: {}", stamp(run_at));
    let _ = writeln!(body);
    let _ = writeln!(body, "No new articles since the last notification.");
    let _ = writeln!(body);
    if results.is_empty() {
        let _ = writeln!(body, "No active watches.");
    }
    for r in results {
        let _ = writeln!(
            body,
            "- {}: {} found, 0 new",
            watch_label(&r.watch_item),
            r.articles_found
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Monitoring continues; you will be notified as soon as new articles appear."
    );
    (subject, body)
}
