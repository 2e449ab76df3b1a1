use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for the hashing stages, or a hidden one when output is quiet.
pub fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Wall-clock duration as `s.mmm seconds`, `m:ss.mmm` or `h:mm:ss.mmm`.
pub fn format_human_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}.{millis:03} seconds"),
        (0, _) => format!("{minutes}:{seconds:02}.{millis:03} (m:ss.mmm)"),
        _ => format!("{hours}:{minutes:02}:{seconds:02}.{millis:03} (h:mm:ss.mmm)"),
    }
}
