use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    SyntaxError,
    SyntaxInfo,
    ReferenceError,
    ReferenceWarning,
    RegexError,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::SyntaxError => "syntax error",
            MessageType::SyntaxInfo => "syntax info",
            MessageType::ReferenceError => "reference error",
            MessageType::ReferenceWarning => "reference warning",
            MessageType::RegexError => "regex error",
        })
    }
}

/// A single finding of the text checks or the reference validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: String,
    pub message_type: MessageType,
    pub message: String,
    pub matched_pattern: String,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        message_type: MessageType,
        location: impl Into<String>,
        message: impl Into<String>,
        matched_pattern: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            location: location.into(),
            message_type,
            message: message.into(),
            matched_pattern: matched_pattern.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.message_type, self.message)?;
        if !self.matched_pattern.is_empty() {
            write!(f, " found: {}", self.matched_pattern)?;
        }
        if !self.location.is_empty() {
            write!(f, "\n\tat {}", self.location)?;
        }
        Ok(())
    }
}

/// Errors block code generation, warnings (including informational findings) do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Report {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning | Severity::Info => self.warnings.push(diagnostic),
        }
    }

    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in self.errors.iter().chain(&self.warnings) {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_routes_by_severity() {
        let mut report = Report::default();
        report.push(Diagnostic::new(Severity::Info, MessageType::SyntaxInfo, "", "successive regex", "/a/ /b/"));
        assert!(!report.is_blocking());
        report.push(Diagnostic::new(Severity::Error, MessageType::ReferenceError, "g:1:1", "invalid reference", "a -> b"));
        assert!(report.is_blocking());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.errors[0].to_string(),
            "reference error, invalid reference found: a -> b\n\tat g:1:1"
        );
    }
}
