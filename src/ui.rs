use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a numbered phase line
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Remote activity
// ============================================================================

/// A command about to run on the host
pub fn remote_command(host: &str, command: &str) {
    println!("  {} {} {}", "→".cyan(), format!("{host} $").dimmed(), command);
}

/// A copy about to run
pub fn remote_copy(host: &str, local: &str, remote: &str) {
    println!(
        "  {} {} {} {}",
        "→".cyan(),
        "copy".dimmed(),
        local,
        format!("{host}:{remote}").dimmed()
    );
}

/// A mutating action skipped because of preview mode
pub fn would_run(what: &str) {
    println!("  {} {}", "[preview]".yellow(), what);
}

/// A failed remote step, with whatever stderr was captured
pub fn step_failed(step: &str, command: &str, stderr: &str, advice: Option<&str>) {
    eprintln!("  {} {} {}", "✗".red(), step.bold(), command.dimmed());
    for line in stderr.trim().lines() {
        eprintln!("      {}", line.red());
    }
    if let Some(advice) = advice {
        eprintln!("      {}", advice.yellow());
    }
}
