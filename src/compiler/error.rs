use thiserror::Error;

use crate::ast::SourcePosition;

/// A single diagnostic found while lowering the tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Undeclared variable '{name}' at {position}")]
    UndeclaredVariable {
        name: String,
        position: SourcePosition,
    },
    #[error("Duplicate declaration of '{name}' at {position}")]
    DuplicateDeclaration {
        name: String,
        position: SourcePosition,
    },
    #[error("Duplicate function definition '{name}' at {position}")]
    DuplicateFunction {
        name: String,
        position: SourcePosition,
    },
    #[error("Undefined function '{name}' at {position}")]
    UndefinedFunction {
        name: String,
        position: SourcePosition,
    },
    #[error("Function '{name}' expected {expected} arguments, got {found} at {position}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        position: SourcePosition,
    },
}

impl CompileError {
    pub fn position(&self) -> SourcePosition {
        match self {
            CompileError::UndeclaredVariable { position, .. }
            | CompileError::DuplicateDeclaration { position, .. }
            | CompileError::DuplicateFunction { position, .. }
            | CompileError::UndefinedFunction { position, .. }
            | CompileError::ArityMismatch { position, .. } => *position,
        }
    }
}

/// Every diagnostic collected during one compile, in discovery order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Compilation failed: {}", render(.errors))]
pub struct CompileErrors {
    pub errors: Vec<CompileError>,
}

impl CompileErrors {
    pub fn first(&self) -> Option<&CompileError> {
        self.errors.first()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

fn render(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
