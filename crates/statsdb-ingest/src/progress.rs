//! Terminal progress display for ingestion runs

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Create a bar over `total` files.
///
/// When `visible` is false the bar is hidden and every update is a no-op.
/// A visible bar still draws nothing when stderr is not a terminal.
pub fn create_scan_progress(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Message shown next to the bar.
pub fn counts_message(processed: usize, skipped: usize) -> String {
    format!("{processed} queued, {skipped} skipped")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress() {
        let pb = create_scan_progress(10, false);
        assert!(pb.is_hidden());
        pb.inc(3);
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn test_visible_progress_length() {
        let pb = create_scan_progress(10, true);
        assert_eq!(pb.length(), Some(10));
        pb.finish_and_clear();
    }

    #[test]
    fn test_counts_message() {
        assert_eq!(counts_message(4, 1), "4 queued, 1 skipped");
    }
}
