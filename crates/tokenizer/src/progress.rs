use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over `total` units, or a hidden one when disabled.
pub(crate) fn bar(total: u64, enabled: bool, template: &str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total.max(1));
    let style = ProgressStyle::with_template(template)
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

pub(crate) const BYTES_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>12}/{total_bytes} ({eta}) {msg}";

pub(crate) const TOKENS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>12}/{human_len} tokens ({eta})";
