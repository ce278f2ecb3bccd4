//! Preview report
//!
//! The rendered text is consumed by scripts and log scrapers, so it is plain
//! (no ANSI styling) and its line formats are kept stable:
//!
//! ```text
//! Already installed (N):
//!   ✓ <name>[ (<version>)]
//! To install (M):
//!   • <name>
//!       $ <install command>
//! Runtime: <status>
//! Run again without --preview to apply these changes.
//! ```

use crate::ui;

use super::planner::ProvisioningPlan;

pub const CLOSING_REMINDER: &str = "Run again without --preview to apply these changes.";

/// Render the plan as text
pub fn render(plan: &ProvisioningPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Already installed ({}):\n",
        plan.tools_already_present.len()
    ));
    if plan.tools_already_present.is_empty() {
        out.push_str("  (none)\n");
    }
    for (name, version) in &plan.tools_already_present {
        match version.as_deref().and_then(|v| v.lines().next()) {
            Some(v) => out.push_str(&format!("  ✓ {name} ({v})\n")),
            None => out.push_str(&format!("  ✓ {name}\n")),
        }
    }

    out.push_str(&format!("To install ({}):\n", plan.tools_to_install.len()));
    if plan.tools_to_install.is_empty() {
        out.push_str("  (none)\n");
    }
    for (name, spec) in &plan.tools_to_install {
        out.push_str(&format!("  • {name}\n"));
        if spec.install_steps.is_empty() {
            out.push_str("      (no install steps)\n");
        }
        for step in &spec.install_steps {
            out.push_str(&format!("      $ {step}\n"));
        }
    }

    if plan.requires_runtime_bootstrap {
        out.push_str("Runtime: package manager missing, will be bootstrapped\n");
    } else {
        out.push_str("Runtime: package manager present\n");
    }

    out.push_str(CLOSING_REMINDER);
    out.push('\n');
    out
}

/// Print the rendered plan under a header
pub fn print(host: &str, plan: &ProvisioningPlan) {
    ui::header(&format!("Preview for {host}"));
    print!("{}", render(plan));
}
