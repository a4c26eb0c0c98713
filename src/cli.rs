//! Terminal output helpers for the stackform binary

use colored::*;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message to stderr
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".cyan().bold(), msg);
}

/// Prompt for confirmation. Anything but an explicit "yes" declines.
pub fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};

    println!("{} {}", "?".yellow().bold(), prompt);
    print!("  Type 'yes' to confirm: ");
    let _ = io::stdout().flush();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    input.trim() == "yes"
}

/// Format a resource address as kind.id
pub fn format_resource(kind: &str, id: &str) -> String {
    format!("{}.{}", kind.cyan(), id.bold())
}

/// Format an elapsed duration for the run summary line
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
