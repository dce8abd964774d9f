//! Structural validation of generated stylesheet text.
//!
//! The validator is a pure function over the stylesheet text: it scans for
//! brace-balance anomalies and emptiness, and returns an ordered list of
//! findings. It never fails and never aborts the pipeline — findings are
//! advisory, and callers decide whether to warn or reject.

use std::fmt;

/// A single structural anomaly in generated stylesheet text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// A `}` with no matching `{` at this byte offset
    UnmatchedClosingBrace { offset: usize },
    /// The scan ended with this many blocks left open
    MissingClosingBraces { count: usize },
    /// The trimmed input was empty
    EmptyOutput,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedClosingBrace { offset } => {
                write!(f, "unmatched closing brace at offset {offset}")
            }
            Self::MissingClosingBraces { count: 1 } => write!(f, "missing 1 closing brace"),
            Self::MissingClosingBraces { count } => write!(f, "missing {count} closing braces"),
            Self::EmptyOutput => write!(f, "empty output"),
        }
    }
}

/// Validate stylesheet text for brace balance and emptiness.
///
/// Scans left to right with an integer depth counter: `{` increments, `}`
/// decrements. A negative counter records an unmatched-closing-brace finding
/// and resets to zero so scanning continues meaningfully instead of
/// cascading. A positive counter after the scan records the exact residual
/// count as missing closing braces. Independently, trimmed-empty input
/// records an empty-output finding.
///
/// An empty list means the text is structurally clean.
#[must_use]
pub fn validate_stylesheet(text: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut depth: i64 = 0;

    for (offset, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    findings.push(Finding::UnmatchedClosingBrace { offset });
                    depth = 0;
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        findings.push(Finding::MissingClosingBraces {
            count: depth as usize,
        });
    }

    if text.trim().is_empty() {
        findings.push(Finding::EmptyOutput);
    }

    findings
}
