use indicatif::{ProgressBar, ProgressStyle};

/// Bar over `total` units; draws nothing when stderr is not a terminal.
pub(crate) fn progress_bar(total: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message);
    pb
}
