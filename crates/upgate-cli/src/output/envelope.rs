//! JSON envelope shared by every command.
//!
//! stdout carries exactly one envelope per run so scripts can parse it
//! whole; notices go to stderr as single-line envelopes.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use upgate_core::ValidationReport;

/// Whether the command's subject passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Rejected,
}

#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    pub operation: &'a str,
    pub status: Verdict,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a, T: Serialize> Envelope<'a, T> {
    pub fn accepted(operation: &'a str, data: T) -> Self {
        Self {
            operation,
            status: Verdict::Success,
            data,
            error: None,
        }
    }

    /// Pretty-prints the envelope to stdout.
    pub fn print(&self) -> Result<()> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, self)?;
        writeln!(stdout)?;
        Ok(())
    }
}

/// Wraps a verdict; rejected reports carry their first failure as `error`.
pub fn for_report(report: &ValidationReport) -> Envelope<'_, &ValidationReport> {
    let (status, error) = if report.is_safe {
        (Verdict::Success, None)
    } else {
        (Verdict::Rejected, Some(report.summary()))
    };
    Envelope {
        operation: "check",
        status,
        data: report,
        error,
    }
}

/// Writes a notice envelope as one line on stderr.
pub fn notice(message: &str) {
    #[derive(Serialize)]
    struct Notice<'m> {
        message: &'m str,
    }

    let envelope = Envelope::accepted("notice", Notice { message });
    if let Ok(line) = serde_json::to_string(&envelope) {
        let _ = writeln!(io::stderr(), "{line}");
    }
}
