// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::analyzer::{Diagnostic, Severity};

use thiserror::Error;

/// Errors surfaced by the public entry points.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template syntax. `message` already contains the source excerpt.
    #[error("{message}")]
    Parse { message: String, line: u32, col: u32 },

    /// A template was required to be valid before use and was not.
    #[error("template analysis failed with {} error(s){}", error_count(.diagnostics), first_error(.diagnostics))]
    Analysis { diagnostics: Vec<Diagnostic> },

    /// Any failure raised while rendering through the general renderer,
    /// including failures of helper implementations.
    #[error("template execution failed: {0:#}")]
    Runtime(anyhow::Error),

    #[error("cache capacity must be at least 1, got {capacity}")]
    InvalidCacheCapacity { capacity: usize },

    #[error("invalid schema: {0}")]
    Schema(String),
}

impl TemplateError {
    /// Diagnostics carried by an analysis rejection, empty for other kinds.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TemplateError::Analysis { diagnostics } => diagnostics,
            _ => &[],
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, TemplateError::Parse { .. })
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, TemplateError::Runtime(_))
    }
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    match diagnostics.iter().find(|d| d.severity == Severity::Error) {
        Some(d) => format!(": {}", d.message),
        None => String::new(),
    }
}

pub type Result<T> = core::result::Result<T, TemplateError>;
