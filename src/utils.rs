use crate::ga::GenerationSummary;

/// Logs at info level, dropping the ANSI colour codes when `colorful` is false
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {
        ::log::info!(
            "{}",
            $crate::utils::strip_ansi_if_needed(&format!($($arg)*), $colorful)
        )
    };
}

/// Removes the ANSI escape sequences (`ESC [ ... letter`) of `text` unless `colorful` is set
pub fn strip_ansi_if_needed(text: &str, colorful: bool) -> String {
    if colorful {
        return text.to_string();
    }

    let mut stripped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // parameters and intermediates end with a byte in @..~
            for end in chars.by_ref() {
                if ('@'..='~').contains(&end) {
                    break;
                }
            }
        } else {
            stripped.push(c);
        }
    }
    stripped
}

/// Crate version followed by the git commit it was built from, when known
pub fn version() -> String {
    match option_env!("GAKNN_GIT_SHA") {
        Some(sha) => format!("{}#{}", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Legend of the per-generation line, displayed once before the first generation
pub fn display_epoch_legend() -> String {
    format!(
        "\x1b[1m{:>6} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8} | {:>8}\x1b[0m",
        "epoch", "best", "mean", "std", "overall", "selected", "distinct", "time"
    )
}

/// One line per generation: its fit statistics, the running best and the time it took
pub fn display_epoch(summary: &GenerationSummary) -> String {
    let marker = if summary.improved { "\x1b[1;92m*\x1b[0m" } else { " " };
    format!(
        "{:>6} | {:>8.4} | {:>8.4} | {:>8.4} | \x1b[1;94m{:>8.4}\x1b[0m | {:>8} | {:>8} | {:>7.3}s {}",
        summary.epoch,
        summary.best_fit,
        summary.mean_fit,
        summary.std_fit,
        summary.best_so_far,
        summary.n_selected,
        summary.distinct,
        summary.duration,
        marker
    )
}
