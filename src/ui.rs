use std::time::Duration;

use colored::*;

pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{} B", bytes).cyan().to_string();
    }
    let exp = (bytes as f64).log(UNIT as f64) as i32;
    let pre = "kMGTPE".chars().nth((exp - 1) as usize).unwrap_or('?');
    let val = bytes as f64 / (UNIT as f64).powi(exp);
    format!("{:.2} {}B", val, pre).cyan().bold().to_string()
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let min = (secs / 60.0).floor();
        let s = secs % 60.0;
        format!("{:.0}m {:.0}s", min, s)
    }
    .yellow()
    .to_string()
}

/// Post-run report. The compressed side of the pair is the container plus
/// the `.llr` sidecar; the ratio compares the original against their sum.
pub fn print_summary(
    action: &str,
    original_size: u64,
    container_size: u64,
    llr_size: u64,
    duration: Duration,
) {
    let compressed_total = container_size + llr_size;
    let ratio = if compressed_total > 0 {
        original_size as f64 / compressed_total as f64
    } else {
        0.0
    };

    let content_width = 48;
    let horizontal = "─".repeat(content_width);

    let raw_title = format!(" {} Summary ", action);
    let styled_title = raw_title.clone().bold().white().on_blue().to_string();
    let pad_total = content_width.saturating_sub(raw_title.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;

    println!("{}", format!("╭{}╮", horizontal).blue());
    println!(
        "{}{}{}{}{}",
        "│".blue(),
        " ".repeat(pad_left),
        styled_title,
        " ".repeat(pad_right),
        "│".blue()
    );

    let row = |label: &str, value: String| {
        println!(
            "{} {:<15} {:>29} {}",
            "│".blue(),
            label.bold().white(),
            value,
            "│".blue()
        );
    };

    row("Original:", format_size(original_size));
    row("Container:", format_size(container_size));
    row("LLR map:", format_size(llr_size));
    row("Ratio:", format!("{:.2}x", ratio).green().bold().to_string());
    row("Time:", format_duration(duration));

    println!("{}", format!("╰{}╯", horizontal).blue());
}
