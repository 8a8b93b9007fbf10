//! Output formatting utilities for CLI commands

use colored::Colorize;
use kcorpus_shared::types::report::{Finding, Inventory, Severity, Summary};

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print one finding as `kind path:line: message`
pub fn finding(f: &Finding) {
    let location = match (&f.path, f.line) {
        (Some(path), Some(line)) => format!("{}:{}: ", path.display(), line),
        (Some(path), None) => format!("{}: ", path.display()),
        _ => String::new(),
    };
    let msg = format!("[{}] {}{}", f.kind.label().bold(), location, f.message);
    match f.severity {
        Severity::Error => error(&msg),
        Severity::Warning => warning(&msg),
        Severity::Info => info(&msg),
    }
}

pub fn findings(list: &[Finding]) {
    for f in list {
        finding(f);
    }
}

pub fn summary(summary: &Summary) {
    let line = format!(
        "{} error(s), {} warning(s), {} note(s)",
        summary.errors, summary.warnings, summary.infos
    );
    if summary.errors > 0 {
        error(&line);
    } else if summary.warnings > 0 {
        warning(&line);
    } else {
        success(&line);
    }
}

pub fn inventory(inv: &Inventory) {
    println!("=== Corpus ===");
    println!(
        "  {} samples ({} vuln, {} patch), {} complete pairs, {} distinct CVEs",
        inv.total, inv.vuln, inv.patch, inv.complete_pairs, inv.distinct_cves
    );

    println!("\n  {:<20} {:>8}", "LAYOUT", "SAMPLES");
    for (layout, count) in &inv.by_layout {
        println!("  {:<20} {:>8}", layout, count);
    }

    println!("\n  {:<20} {:>8}", "CWE", "SAMPLES");
    for (cwe, count) in &inv.by_cwe {
        println!("  {:<20} {:>8}", cwe, count);
    }
}
