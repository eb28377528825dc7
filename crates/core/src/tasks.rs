//! Task output helpers
//!
//! Consistent per-task label colors and gulp-style progress lines for
//! terminal output.

use std::time::Duration;

use colored::*;

/// Get a consistent color for a task name
pub fn get_task_color(task_name: &str) -> Color {
    let hash = task_name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Jewel tones, kept apart from the red/yellow/green used for status words
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        },
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        },
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        },
        Color::TrueColor {
            r: 72,
            g: 209,
            b: 204,
        },
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        },
    ];

    colors[(hash % colors.len() as u64) as usize]
}

/// Human-friendly elapsed time: `850 μs`, `42 ms`, `1.27 s`, `2.5 min`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let micros = elapsed.as_micros();
    if micros < 1_000 {
        format!("{} μs", micros)
    } else if micros < 1_000_000 {
        format!("{} ms", elapsed.as_millis())
    } else if elapsed.as_secs() < 60 {
        format!("{:.2} s", elapsed.as_secs_f64())
    } else {
        format!("{:.1} min", elapsed.as_secs_f64() / 60.0)
    }
}

fn quoted(task_name: &str) -> ColoredString {
    format!("'{}'", task_name).color(get_task_color(task_name)).bold()
}

pub(crate) fn print_starting(task_name: &str) {
    println!("{} {}...", "Starting".bright_black(), quoted(task_name));
}

pub(crate) fn print_finished(task_name: &str, elapsed: Duration) {
    println!(
        "{} {} {}",
        "Finished".green(),
        quoted(task_name),
        format!("after {}", format_elapsed(elapsed)).bright_black()
    );
}

pub(crate) fn print_errored(task_name: &str, elapsed: Duration, cause: &dyn std::fmt::Display) {
    eprintln!(
        "{} {} {}",
        "Errored".red().bold(),
        quoted(task_name),
        format!("after {}", format_elapsed(elapsed)).bright_black()
    );
    eprintln!("  {}", cause.to_string().red());
}
