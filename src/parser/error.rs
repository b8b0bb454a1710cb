use std::io;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Unexpected end of file")]
    UnexpectedEndOfFile,
    #[error("Expected {expected:?}, found '{found}'")]
    ExpectedLiteral { expected: &'static str, found: char },
    #[error("Expected whitespace")]
    ExpectedWhitespace,
    #[error("Expected number")]
    ExpectedNumber,
    #[error("Number too large")]
    NumberTooLarge,
    #[error("Expected beginning of instruction")]
    ExpectedInstruction,
    #[error("Expected '+' or '-'")]
    ExpectedOperator,
    #[error("Expected '+', '-', '*', \"DIV\", or \"MOD\"")]
    ExpectedExtendedOperator,
    #[error("Expected a variable or number")]
    ExpectedOperand,
    #[error("Expected {0}")]
    ExpectedRelation(&'static str),
    #[error("Expected \"=\", \"!=\", \">\", \">=\", \"<\", or \"<=\"")]
    ExpectedExtendedRelation,
    #[error("Expected 'N'")]
    ExpectedEnd,
    #[error("Expected 'N' or 'L'")]
    ExpectedEndOrElse,
    #[error("Unexpected END token")]
    UnexpectedEnd,
    #[error("Unexpected ELSE token")]
    UnexpectedElse,
    #[error("Expected ';' or \"END\"")]
    ExpectedSeparatorOrEnd,
    #[error("Expected ';' or end of file")]
    ExpectedSeparatorOrEof,
}

impl SyntaxError {
    /// Block-matching failures, as opposed to plain lexical mismatches.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SyntaxError::UnexpectedEnd
                | SyntaxError::UnexpectedElse
                | SyntaxError::ExpectedSeparatorOrEof
        )
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{diagnostic}")]
    Syntax {
        kind: SyntaxError,
        diagnostic: Diagnostic,
    },
    #[error("Reading {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    pub fn syntax_kind(&self) -> Option<&SyntaxError> {
        match self {
            ParseError::Syntax { kind, .. } => Some(kind),
            ParseError::Io { .. } => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            ParseError::Syntax { diagnostic, .. } => Some(diagnostic),
            ParseError::Io { .. } => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
