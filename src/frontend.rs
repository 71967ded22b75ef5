//! Boundary to the source parser.
//!
//! Parsing lives outside this crate. A host plugs its parser in through
//! [`Frontend`] and hands the resulting [`Program`] to the pipeline.

use thiserror::Error;

use crate::ast::{Program, SourcePosition};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Parse error at {position}: {message}")]
pub struct ParseError {
    pub position: SourcePosition,
    pub message: String,
}

impl ParseError {
    pub fn new(position: SourcePosition, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Turns source text into a well-formed AST, or reports the first syntax
/// error with its position.
pub trait Frontend {
    fn parse(&self, source: &str) -> Result<Program, ParseError>;
}

impl<F> Frontend for F
where
    F: Fn(&str) -> Result<Program, ParseError>,
{
    fn parse(&self, source: &str) -> Result<Program, ParseError> {
        self(source)
    }
}
