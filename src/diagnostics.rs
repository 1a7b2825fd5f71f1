use serde::Serialize;

/// Stage a diagnostic originated from. Matches the JSON surface consumed by
/// the analysis server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Semantic,
    Tac,
    Mips,
}

/// One diagnostic record. All compilation failures funnel into this shape;
/// the CLI prints it to stderr, the HTTP server serializes it verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            line: None,
            column: None,
            length: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl From<&crate::tac::TacError> for Diagnostic {
    fn from(error: &crate::tac::TacError) -> Self {
        let mut diagnostic = Diagnostic::new(DiagnosticKind::Tac, error.to_string());
        if let Some(loc) = error.loc() {
            diagnostic = diagnostic.at(loc.line, loc.column);
        }
        diagnostic
    }
}

impl From<&crate::mips::MipsError> for Diagnostic {
    fn from(error: &crate::mips::MipsError) -> Self {
        Diagnostic::new(DiagnosticKind::Mips, error.to_string())
    }
}
