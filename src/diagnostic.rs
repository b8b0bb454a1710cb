use std::fmt;

use crate::reader::PositionedReader;

/// A positioned message rendered as `file:line:col: error: message`, the
/// offending input text, and a caret under the failing column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub source_name: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// The chunk of input being read when the error was raised.
    pub text: String,
    /// One-based caret column relative to `text`.
    pub caret: usize,
}

impl Diagnostic {
    pub fn capture<R: std::io::BufRead>(
        reader: &PositionedReader<R>,
        source_name: &str,
        message: impl Into<String>,
    ) -> Self {
        let position = reader.position();
        Self {
            source_name: source_name.to_string(),
            line: position.line,
            column: reader.absolute_column(),
            message: message.into(),
            text: reader.current_text(),
            caret: position.column,
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.source_name, self.line, self.column)
    }

    fn normalized_text(&self) -> String {
        self.text
            .chars()
            .map(|ch| if matches!(ch, '\t' | '\r' | '\n') { ' ' } else { ch })
            .collect()
    }

    fn caret_line(&self) -> String {
        let mut out = " ".repeat(self.caret.saturating_sub(1));
        out.push('^');
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: error: {}", self.location(), self.message)?;
        writeln!(f, "{}", self.normalized_text())?;
        write!(f, "{}", self.caret_line())
    }
}
