use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Provenance of a syntax or type node.
///
/// Synthetic nodes (primitives, erased types, desugared operators) carry a
/// `Dummy` range with a short label instead of a source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Range {
    Source { span: Span },
    Dummy { label: &'static str },
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range::Source {
            span: Span { start, end },
        }
    }

    pub fn dummy(label: &'static str) -> Self {
        Range::Dummy { label }
    }

    pub fn erased() -> Self {
        Range::dummy("erased")
    }

    pub fn merge(self, other: Range) -> Range {
        match (self, other) {
            (Range::Source { span: a }, Range::Source { span: b }) => Range::new(a.start, b.end),
            (Range::Source { .. }, Range::Dummy { .. }) => self,
            (Range::Dummy { .. }, _) => other,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Range::Source { span } => Some(*span),
            Range::Dummy { .. } => None,
        }
    }

    /// A range is invalid when its start line is non-positive; dummy ranges are
    /// always invalid.
    pub fn is_invalid(&self) -> bool {
        match self {
            Range::Source { span } => span.start.line == 0,
            Range::Dummy { .. } => true,
        }
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Range::Source { span } if span.start.line == span.end.line => write!(
                f,
                "line {}, characters {}-{}",
                span.start.line, span.start.column, span.end.column
            ),
            Range::Source { span } => write!(
                f,
                "line {}, character {} to line {}, character {}",
                span.start.line, span.start.column, span.end.line, span.end.column
            ),
            Range::Dummy { label } => write!(f, "<{label}>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    pub message: String,
    pub range: Range,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub range: Range,
    pub labels: Vec<DiagnosticLabel>,
}

pub fn render_diagnostics(path: &str, diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for (index, diagnostic) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push_str(&render_diagnostic(path, diagnostic));
    }
    output
}

pub fn render_diagnostic(path: &str, diagnostic: &Diagnostic) -> String {
    let mut output = String::new();
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    };
    output.push_str(&format!(
        "{severity}[{}] {}: {} {}\n",
        diagnostic.code, path, diagnostic.range, diagnostic.message
    ));
    for label in &diagnostic.labels {
        output.push_str(&format!(
            "  note: {} at {}: {}\n",
            label.message, path, label.range
        ));
    }
    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> Position {
        Position { line, column }
    }

    #[test]
    fn dummy_and_zero_line_ranges_are_invalid() {
        assert!(Range::dummy("primitive").is_invalid());
        assert!(Range::erased().is_invalid());
        assert!(Range::new(pos(0, 0), pos(0, 3)).is_invalid());
        assert!(!Range::new(pos(1, 1), pos(1, 3)).is_invalid());
    }

    #[test]
    fn merge_keeps_outer_bounds() {
        let left = Range::new(pos(1, 1), pos(1, 3));
        let right = Range::new(pos(2, 5), pos(2, 9));
        assert_eq!(left.merge(right), Range::new(pos(1, 1), pos(2, 9)));
        assert_eq!(Range::erased().merge(left), left);
    }

    #[test]
    fn render_includes_labels() {
        let range = Range::new(pos(1, 1), pos(1, 4));
        let diagnostic = Diagnostic {
            code: "E1001".to_string(),
            severity: DiagnosticSeverity::Error,
            message: "unbound variable 'x'".to_string(),
            range,
            labels: vec![DiagnosticLabel {
                message: "used here".to_string(),
                range,
            }],
        };
        let rendered = render_diagnostic("input", &diagnostic);
        assert!(rendered.starts_with("error[E1001] input: line 1, characters 1-4"));
        assert!(rendered.contains("note: used here"));
    }
}
