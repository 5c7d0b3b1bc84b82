/*!
 * Progress bars for file reading and batch uploads
 *
 * Bars are drawn on stderr through indicatif and become no-ops when progress
 * is disabled or stderr is not a terminal.
 */

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

const BAR_TEMPLATE: &str =
    "{msg:>12} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})";

/// Create a counting progress bar of `len` steps
///
/// Returns a hidden bar when `show` is false or stderr is not a terminal, so
/// callers can update it unconditionally.
pub fn counter_bar(len: u64, message: &'static str, show: bool) -> ProgressBar {
    if !show || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

    let bar = ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::stderr());
    bar.set_style(style);
    bar.set_message(message);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_bar_is_hidden() {
        let bar = counter_bar(10, "Reading", false);
        assert!(bar.is_hidden());
        bar.inc(3);
        assert_eq!(bar.position(), 3);
        bar.finish_and_clear();
    }
}
