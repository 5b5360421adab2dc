//! Rendering of command results for people or for scripts.

mod envelope;
mod terminal;

use anyhow::Result;
use upgate_core::PolicyRegistry;
use upgate_core::ValidationReport;

use envelope::Envelope;
use terminal::Terminal;

/// Where results go and in which shape.
pub enum Output {
    /// Styled text on the terminal.
    Terminal(Terminal),
    /// One JSON envelope per command on stdout.
    Json,
}

impl Output {
    /// Picks the output shape from the global flags.
    pub fn from_flags(json: bool, verbose: bool, quiet: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Terminal(Terminal::new(verbose, quiet))
        }
    }

    /// Prints a validation verdict.
    pub fn report(&self, report: &ValidationReport) -> Result<()> {
        match self {
            Self::Terminal(terminal) => terminal.report(report),
            Self::Json => envelope::for_report(report).print(),
        }
    }

    /// Prints the tier ceilings.
    pub fn tiers(&self, registry: &PolicyRegistry) -> Result<()> {
        match self {
            Self::Terminal(terminal) => terminal.tiers(registry),
            Self::Json => Envelope::accepted("tiers", registry).print(),
        }
    }

    /// Reports a non-fatal condition on stderr.
    pub fn notice(&self, message: &str) {
        match self {
            Self::Terminal(terminal) => terminal.notice(message),
            Self::Json => envelope::notice(message),
        }
    }
}
