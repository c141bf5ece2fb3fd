//! Structured diagnostics.
//!
//! Every phase of the pipeline reports through the same channel: a
//! [`Diagnostic`] carries a severity, a source range, a short summary and an
//! optional detail. Collections accumulate monotonically; [`Diagnostics::has_errors`]
//! is the gate between phases.

pub mod suggestion;

use std::fmt;

use crate::syntax::SourceRange;

/// Diagnostic severity. Warnings never gate a phase; errors do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub range: Option<SourceRange>,
}

impl Diagnostic {
    pub fn error(
        range: Option<SourceRange>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            range,
        }
    }

    pub fn warning(
        range: Option<SourceRange>,
        summary: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            range,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = &self.range {
            write!(f, "{}: ", range)?;
        }
        write!(f, "{}", self.summary)?;
        if !self.detail.is_empty() {
            write!(f, "; {}", self.detail)?;
        }
        Ok(())
    }
}

/// An append-only list of diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.entries.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(Diagnostic::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Renders every entry, one per line. An empty collection renders as
    /// `no diagnostics` so hosts can log the result unconditionally.
    pub fn to_display_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "no diagnostics");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SourcePos;

    fn range() -> SourceRange {
        SourceRange::new("<stdin>", SourcePos::new(4, 3), SourcePos::new(4, 22))
    }

    #[test]
    fn display_includes_range_and_detail() {
        let d = Diagnostic::error(Some(range()), "found duplicate config foo", "");
        assert_eq!(d.to_string(), "<stdin>:4:3: found duplicate config foo");

        let d = Diagnostic::error(Some(range()), "summary", "some detail");
        assert_eq!(d.to_string(), "<stdin>:4:3: summary; some detail");
    }

    #[test]
    fn empty_collection_renders_no_diagnostics() {
        let diags = Diagnostics::new();
        assert_eq!(diags.to_string(), "no diagnostics");
        assert!(!diags.has_errors());
    }

    #[test]
    fn warnings_do_not_gate() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(None, "just a warning", ""));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error(None, "an error", ""));
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 2);
    }
}
