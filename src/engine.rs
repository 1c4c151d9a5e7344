// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::analyzer::{self, AnalysisResult, AnalyzeOptions};
use crate::ast::*;
use crate::cache::{RenderCache, TemplateCache};
use crate::error::{Result, TemplateError};
use crate::executor::{self, ExecuteOptions};
use crate::helpers::{HelperDefinition, HelperSet};
use crate::parser;
use crate::renderer::CompiledTemplate;
use crate::schema::{IdentifierSchemas, Schema};
use crate::value::{IdentifierData, Object, Value};
use crate::Rc;

use core::num::NonZeroUsize;
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::{debug, trace};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Parsed templates kept, keyed by source text.
    pub ast_cache_capacity: usize,
    /// Compiled render artifacts kept, keyed by source text.
    pub render_cache_capacity: usize,
    /// Start with the built-in math and logic helpers registered.
    pub builtin_helpers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ast_cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
            render_cache_capacity: DEFAULT_CACHE_CAPACITY.get(),
            builtin_helpers: true,
        }
    }
}

/// A single template or a named tree of templates.
///
/// ```json
/// { "title": "{{name}}", "meta": { "age": "{{age}}" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateInput {
    Template(String),
    Object(BTreeMap<String, TemplateInput>),
}

impl From<&str> for TemplateInput {
    fn from(s: &str) -> Self {
        TemplateInput::Template(s.to_string())
    }
}

impl From<String> for TemplateInput {
    fn from(s: String) -> Self {
        TemplateInput::Template(s)
    }
}

// Helpers and the artifacts compiled against them are replaced together.
struct HelperState {
    helpers: Rc<HelperSet>,
    render_cache: RenderCache,
}

/// Parses, analyzes and executes templates, caching parsed and compiled forms.
///
/// All methods take `&self`; an engine can be shared between threads.
pub struct Engine {
    config: EngineConfig,
    ast_cache: TemplateCache<Ref<Program>>,
    state: RwLock<Rc<HelperState>>,
}

lazy_static! {
    static ref GLOBAL_ENGINE: Engine = Engine::new();
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("ast_cache", &self.ast_cache)
            .field("helpers", &self.helper_names())
            .finish()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            ast_cache: TemplateCache::with_capacity(DEFAULT_CACHE_CAPACITY),
            state: RwLock::new(Rc::new(HelperState {
                helpers: Rc::new(HelperSet::builtins()),
                render_cache: RenderCache::with_capacity(DEFAULT_CACHE_CAPACITY),
            })),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let helpers = match config.builtin_helpers {
            true => HelperSet::builtins(),
            false => HelperSet::new(),
        };
        Ok(Self {
            ast_cache: TemplateCache::new(config.ast_cache_capacity)?,
            state: RwLock::new(Rc::new(HelperState {
                helpers: Rc::new(helpers),
                render_cache: RenderCache::new(config.render_cache_capacity)?,
            })),
            config,
        })
    }

    /// Process-wide engine with the default configuration.
    ///
    /// Created on first use and never dropped. Helpers registered on it are
    /// visible to every caller; use [`Engine::clear_caches`] to drop cached
    /// templates.
    pub fn global() -> &'static Engine {
        &GLOBAL_ENGINE
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn helper_state(&self) -> Rc<HelperState> {
        self.state.read().clone()
    }

    pub fn parse(&self, source: &str) -> Result<Ref<Program>> {
        if let Some(program) = self.ast_cache.get(source) {
            trace!("ast cache hit");
            return Ok(program);
        }
        let program = Ref::new(parser::parse_str("<template>", source)?);
        self.ast_cache.set(source, program.clone());
        Ok(program)
    }

    /// Compile once against the current helpers; execute many times.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplateHandle> {
        let program = self.parse(source)?;
        let state = self.helper_state();
        Ok(CompiledTemplateHandle {
            source: source.to_string(),
            compiled: CompiledTemplate::compile(program, state.helpers.clone()),
        })
    }

    fn analyze_with(
        &self,
        input: &TemplateInput,
        schema: &Schema,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        match input {
            TemplateInput::Template(source) => {
                let program = self.parse(source)?;
                Ok(analyzer::analyze(&program, schema, options))
            }
            TemplateInput::Object(entries) => {
                let mut diagnostics = vec![];
                let mut properties = BTreeMap::new();
                for (key, child) in entries {
                    let result = self.analyze_with(child, schema, options)?;
                    diagnostics.extend(result.diagnostics);
                    properties.insert(key.clone(), result.output_schema);
                }
                let valid = !diagnostics
                    .iter()
                    .any(|d| d.severity == analyzer::Severity::Error);
                Ok(AnalysisResult {
                    valid,
                    diagnostics,
                    output_schema: Schema::object(properties),
                })
            }
        }
    }

    /// Analyze against `schema`. Only malformed templates are errors;
    /// problems with the template's references are reported as diagnostics.
    pub fn analyze(
        &self,
        input: &TemplateInput,
        schema: &Schema,
        identifier_schemas: Option<&IdentifierSchemas>,
    ) -> Result<AnalysisResult> {
        let state = self.helper_state();
        let options = AnalyzeOptions {
            identifier_schemas,
            helpers: Some(&state.helpers),
        };
        self.analyze_with(input, schema, &options)
    }

    /// Like [`Engine::analyze`], but an invalid template is an error.
    pub fn validate(
        &self,
        input: &TemplateInput,
        schema: &Schema,
        identifier_schemas: Option<&IdentifierSchemas>,
    ) -> Result<()> {
        let result = self.analyze(input, schema, identifier_schemas)?;
        match result.valid {
            true => Ok(()),
            false => Err(TemplateError::Analysis {
                diagnostics: result.diagnostics,
            }),
        }
    }

    fn execute_with(&self, input: &TemplateInput, data: &Value, options: &ExecuteOptions) -> Result<Value> {
        match input {
            TemplateInput::Template(source) => {
                let program = self.parse(source)?;
                executor::execute(&program, source, data, options)
            }
            TemplateInput::Object(entries) => {
                let mut object = Object::new();
                for (key, child) in entries {
                    object.insert(Rc::from(key.as_str()), self.execute_with(child, data, options)?);
                }
                Ok(Value::from(object))
            }
        }
    }

    pub fn execute(
        &self,
        input: &TemplateInput,
        data: &Value,
        identifier_data: Option<&IdentifierData>,
    ) -> Result<Value> {
        let state = self.helper_state();
        let options = ExecuteOptions {
            identifier_data,
            compiled: None,
            render_cache: Some(&state.render_cache),
            helpers: Some(&state.helpers),
        };
        self.execute_with(input, data, &options)
    }

    /// Analyze, then execute only if the template is valid.
    pub fn analyze_and_execute(
        &self,
        input: &TemplateInput,
        schema: &Schema,
        data: &Value,
        identifier_schemas: Option<&IdentifierSchemas>,
        identifier_data: Option<&IdentifierData>,
    ) -> Result<(AnalysisResult, Value)> {
        let analysis = self.analyze(input, schema, identifier_schemas)?;
        if !analysis.valid {
            return Err(TemplateError::Analysis {
                diagnostics: analysis.diagnostics,
            });
        }
        let value = self.execute(input, data, identifier_data)?;
        Ok((analysis, value))
    }

    // Swap in a new helper set together with an empty render cache. Nothing is
    // swapped when `f` returns `false`.
    fn update_helpers(&self, f: impl FnOnce(&mut HelperSet) -> bool) -> bool {
        let mut state = self.state.write();
        let mut helpers = HelperSet::clone(&state.helpers);
        if !f(&mut helpers) {
            return false;
        }
        let capacity =
            NonZeroUsize::new(state.render_cache.capacity()).unwrap_or(DEFAULT_CACHE_CAPACITY);
        *state = Rc::new(HelperState {
            helpers: Rc::new(helpers),
            render_cache: RenderCache::with_capacity(capacity),
        });
        debug!("helper set changed; render cache reset");
        true
    }

    /// Add or replace a helper. Previously compiled handles keep the helpers
    /// they were compiled with.
    pub fn register_helper(&self, helper: HelperDefinition) {
        let name = helper.name.clone();
        self.update_helpers(|h| {
            h.insert(helper);
            true
        });
        debug!("registered helper `{name}`");
    }

    pub fn unregister_helper(&self, name: &str) -> bool {
        let removed = self.update_helpers(|h| h.remove(name).is_some());
        if removed {
            debug!("unregistered helper `{name}`");
        }
        removed
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helper_state().helpers.contains(name)
    }

    pub fn helper_names(&self) -> Vec<String> {
        self.helper_state().helpers.names()
    }

    pub fn clear_caches(&self) {
        self.ast_cache.clear();
        self.helper_state().render_cache.clear();
        debug!("template caches cleared");
    }
}

/// A template compiled against a fixed helper set.
#[derive(Debug, Clone)]
pub struct CompiledTemplateHandle {
    source: String,
    compiled: CompiledTemplate,
}

impl CompiledTemplateHandle {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Ref<Program> {
        self.compiled.program()
    }

    pub fn execute(&self, data: &Value, identifier_data: Option<&IdentifierData>) -> Result<Value> {
        let options = ExecuteOptions {
            identifier_data,
            compiled: Some(&self.compiled),
            render_cache: None,
            helpers: None,
        };
        executor::execute(self.compiled.program(), &self.source, data, &options)
    }
}
