// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

// Shared payloads cross threads through the engine caches.
pub(crate) use std::sync::Arc as Rc;

pub mod analyzer;
pub mod ast;
pub mod cache;
mod engine;
mod error;
pub mod executor;
pub mod helpers;
mod lexer;
pub mod literal;
mod number;
pub mod parser;
pub mod path;
pub mod renderer;
pub mod schema;
pub mod shape;
mod value;

pub use analyzer::{AnalysisResult, AnalyzeOptions, Diagnostic, DiagnosticKind, Severity};
pub use cache::{RenderCache, TemplateCache};
pub use engine::{CompiledTemplateHandle, Engine, EngineConfig, TemplateInput};
pub use error::{Result, TemplateError};
pub use executor::ExecuteOptions;
pub use helpers::{Hash, HelperDefinition, HelperParam, HelperSet};
pub use number::Number;
pub use renderer::CompiledTemplate;
pub use schema::{IdentifierSchemas, Schema, SchemaType};
pub use value::{IdentifierData, Object, Value};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::lexer::*;
}
