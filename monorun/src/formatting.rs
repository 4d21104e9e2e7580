//! Status symbols and message formatting.

use owo_colors::OwoColorize;

/// Prints a success message.
pub fn print_success(message: &str) {
    println!("  {} {}", "✓".green(), message.green().bold());
}

/// Prints a warning message.
pub fn print_warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow().bold());
}

/// Formats duration in a human-readable way.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{:.2}s", seconds)
    } else {
        let mins = (seconds / 60.0) as u64;
        let secs = seconds % 60.0;
        format!("{}m {:.1}s", mins, secs)
    }
}
