//! Styled terminal rendering.
//!
//! Rendering builds plain lines first and writes them in one pass, so the
//! layout is testable without a terminal.

use anyhow::Result;
use console::Style;
use console::Term;
use upgate_core::CheckOutcome;
use upgate_core::FileDetails;
use upgate_core::PolicyRegistry;
use upgate_core::RiskLevel;
use upgate_core::ValidationReport;
use upgate_core::details::ASSUMED_UPLINK;
use upgate_core::details::human_size;

struct Palette {
    good: Style,
    bad: Style,
    caution: Style,
    heading: Style,
}

impl Palette {
    fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                good: Style::new(),
                bad: Style::new(),
                caution: Style::new(),
                heading: Style::new(),
            };
        }
        Self {
            good: Style::new().green(),
            bad: Style::new().red().bold(),
            caution: Style::new().yellow(),
            heading: Style::new().bold(),
        }
    }

    fn risk(&self, risk: RiskLevel) -> String {
        let style = match risk {
            RiskLevel::Low => &self.good,
            RiskLevel::Medium => &self.caution,
            RiskLevel::High | RiskLevel::Critical => &self.bad,
        };
        style.apply_to(risk.as_str()).to_string()
    }

    fn mark(&self, passed: bool) -> String {
        if passed {
            self.good.apply_to("✓").to_string()
        } else {
            self.bad.apply_to("✗").to_string()
        }
    }
}

pub struct Terminal {
    verbose: bool,
    quiet: bool,
    palette: Palette,
}

impl Terminal {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            palette: Palette::new(console::colors_enabled()),
        }
    }

    pub fn report(&self, report: &ValidationReport) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        write_lines(&Term::stdout(), &self.report_lines(report))
    }

    pub fn tiers(&self, registry: &PolicyRegistry) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        write_lines(&Term::stdout(), &self.tier_lines(registry))
    }

    pub fn notice(&self, message: &str) {
        if self.quiet {
            return;
        }
        let label = self.palette.caution.apply_to("warning:");
        let _ = Term::stderr().write_line(&format!("{label} {message}"));
    }

    fn report_lines(&self, report: &ValidationReport) -> Vec<String> {
        let p = &self.palette;
        let verdict = if report.is_safe { "is safe" } else { "rejected" };
        let mut lines = vec![format!(
            "{} {} {verdict} ({} risk, score {})",
            p.mark(report.is_safe),
            report.filename,
            p.risk(report.risk_level),
            report.security_score
        )];

        let category = report.category.map_or_else(|| "-".to_string(), |c| c.to_string());
        lines.push(format!(
            "  tier {}, {category}, {}",
            report.tier,
            human_size(report.file_size)
        ));

        if self.verbose {
            lines.push(format!("  path       {}", report.path.display()));
            if let Some(identity) = &report.identity {
                lines.push(format!("  identity   {identity}"));
            }
            lines.push(format!("  checked    {}", report.timestamp.to_rfc3339()));
            if let Some(archive) = &report.archive {
                lines.push(format!(
                    "  archive    {} entries, {} declared",
                    archive.entry_count,
                    human_size(archive.total_declared_size)
                ));
            }
            if let Some(details) = &report.details {
                lines.extend(detail_lines(details));
            }
        }

        let (failed, passed): (Vec<_>, Vec<_>) =
            report.checks.iter().partition(|(_, check)| !check.passed);
        if !failed.is_empty() {
            lines.push(p.heading.apply_to("  failed").to_string());
            lines.extend(failed.iter().map(|(key, check)| self.check_line(key, check)));
        }
        if !passed.is_empty() {
            lines.push(p.heading.apply_to("  passed").to_string());
            lines.extend(passed.iter().map(|(key, check)| self.check_line(key, check)));
        }

        for warning in &report.warnings {
            lines.push(format!("  {} {warning}", p.caution.apply_to("warning:")));
        }
        for recommendation in &report.recommendations {
            lines.push(format!("  -> {recommendation}"));
        }
        lines
    }

    /// Failures always show their reason and severity; passes only when verbose.
    fn check_line(&self, key: &str, check: &CheckOutcome) -> String {
        let mark = self.palette.mark(check.passed);
        if !check.passed {
            let severity = self.palette.risk(check.severity);
            format!("    {mark} {key} [{severity}] {}", check.message)
        } else if self.verbose {
            format!("    {mark} {key}: {}", check.message)
        } else {
            format!("    {mark} {key}")
        }
    }

    fn tier_lines(&self, registry: &PolicyRegistry) -> Vec<String> {
        let header = format!(
            "{:<11} {:>9} {:>9} {:>9} {:>7} {:>7} {:>5} {:>5}",
            "tier", "file", "archive", "unpacked", "entries", "ratio", "/hour", "/day"
        );
        let mut lines = vec![self.palette.heading.apply_to(header).to_string()];
        lines.extend(registry.iter().map(|(tier, policy)| {
            format!(
                "{:<11} {:>9} {:>9} {:>9} {:>7} {:>7} {:>5} {:>5}",
                tier.as_str(),
                human_size(policy.max_file_size),
                human_size(policy.max_archive_size),
                human_size(policy.max_extracted_size),
                policy.max_archive_entries,
                format!("{}:1", policy.max_compression_ratio),
                policy.max_uploads_per_hour,
                policy.max_uploads_per_day,
            )
        }));
        lines
    }
}

fn detail_lines(details: &FileDetails) -> Vec<String> {
    let content = if details.is_binary { "binary" } else { "text" };
    let mut lines = vec![format!(
        "  content    {content}, about {:.0}s to upload at {}/s",
        details.estimated_upload_secs.ceil(),
        human_size(ASSUMED_UPLINK)
    )];
    if let Some(modified) = details.modified {
        lines.push(format!("  modified   {}", modified.to_rfc3339()));
    }
    let hosting = if details.hosting.compatible {
        "fits git hosting limits"
    } else {
        "too large for git hosting"
    };
    lines.push(format!("  hosting    {hosting}"));
    lines
}

fn write_lines(term: &Term, lines: &[String]) -> Result<()> {
    for line in lines {
        term.write_line(line)?;
    }
    Ok(())
}
