//! Console formatting
//!
//! Formats crawl events, reports, nodes and error log entries as plain text
//! lines for the command-line front end.

use crate::crawler::{CrawlEvent, CrawlReport};
use crate::storage::{CrawlError, OriginCredential, ResourceSnapshot};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats one snapshot as a single line
///
/// Changed resources are marked with `*` and the time of the previous version.
pub fn format_snapshot(snapshot: &ResourceSnapshot) -> String {
    let mut line = format!(
        "{} {} {} ({} bytes)",
        snapshot.status_code,
        snapshot.method,
        snapshot.uri,
        snapshot.content.len()
    );
    if let Some(previous) = snapshot.previous_updated {
        line.push_str(&format!(
            " * changed since {}",
            previous.format(TIMESTAMP_FORMAT)
        ));
    }
    line
}

/// Formats an error log entry as a single line
pub fn format_error(error: &CrawlError) -> String {
    let mut line = format!(
        "[{}] {} {}: {}",
        error.created.format(TIMESTAMP_FORMAT),
        error.method,
        error.uri,
        error.message
    );
    if let Some(parent) = &error.parent_uri {
        line.push_str(&format!(" (from {})", parent));
    }
    if error.proxy_enabled {
        line.push_str(" [proxy]");
    }
    line
}

/// Formats a node as a single line
///
/// The password is never printed.
pub fn format_node(node: &OriginCredential) -> String {
    let mut line = format!(
        "{} user={} plugin={} updated={}",
        node.origin,
        node.username.as_deref().unwrap_or(""),
        node.plugin,
        node.updated.format(TIMESTAMP_FORMAT)
    );
    if let Some(title) = &node.title {
        line.push_str(&format!(" \"{}\"", title));
    }
    line
}

/// Formats a crawl event, or `None` for events with nothing to show
pub fn format_event(event: &CrawlEvent) -> Option<String> {
    match event {
        CrawlEvent::SnapshotStored(snapshot) => Some(format_snapshot(snapshot)),
        CrawlEvent::Error(error) => Some(format!("error: {}", format_error(error))),
        CrawlEvent::EtagRefreshed(etag) => Some(format!("etag: {}", etag)),
        CrawlEvent::NodeUpdated(node) => Some(format!("node: {}", node.origin)),
        CrawlEvent::Finished => Some("All content retrieved.".to_string()),
        // Reported by the caller from the returned error
        CrawlEvent::Failed(_) | CrawlEvent::Aborted(_) => None,
        CrawlEvent::Cancelled => Some("Crawl cancelled.".to_string()),
    }
}

/// Formats the summary of a crawl
pub fn format_report(report: &CrawlReport) -> String {
    format!(
        "{}: {} fetched, {} failed, {} skipped, {} visited{}",
        report.seed,
        report.fetched,
        report.failed,
        report.skipped,
        report.visited,
        if report.cancelled { " (cancelled)" } else { "" }
    )
}

/// Prints the stored nodes, one per line
pub fn print_nodes(nodes: &[OriginCredential]) {
    if nodes.is_empty() {
        println!("No nodes registered.");
        return;
    }
    for node in nodes {
        println!("{}", format_node(node));
    }
}

/// Prints the error log, oldest first
pub fn print_errors(errors: &[CrawlError]) {
    if errors.is_empty() {
        println!("Error log is empty.");
        return;
    }
    for error in errors {
        println!("{}", format_error(error));
    }
}
