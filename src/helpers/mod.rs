// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Named functions callable from expressions and block openers.

mod logic;
mod math;
pub mod utils;

use crate::schema::Schema;
use crate::value::Value;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use anyhow::Result;
use lazy_static::lazy_static;

/// Named arguments passed to a helper call (`key=value`).
pub type Hash = BTreeMap<String, Value>;

pub type HelperFcn = dyn Fn(&[Value], &Hash) -> Result<Value> + Send + Sync;

#[derive(Debug, Clone)]
pub struct HelperParam {
    pub name: String,
    /// `None` accepts anything.
    pub schema: Option<Schema>,
    pub optional: bool,
}

#[derive(Clone)]
pub struct HelperDefinition {
    pub name: String,
    pub params: Vec<HelperParam>,
    /// The last parameter may repeat.
    pub variadic: bool,
    pub return_schema: Schema,
    pub description: Option<String>,
    call: Rc<HelperFcn>,
}

impl fmt::Debug for HelperDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("variadic", &self.variadic)
            .field("return_schema", &self.return_schema)
            .finish()
    }
}

impl HelperDefinition {
    pub fn new<F>(name: impl Into<String>, return_schema: Schema, call: F) -> Self
    where
        F: Fn(&[Value], &Hash) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: vec![],
            variadic: false,
            return_schema,
            description: None,
            call: Rc::new(call),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.params.push(HelperParam {
            name: name.into(),
            schema: Some(schema),
            optional: false,
        });
        self
    }

    pub fn with_optional_param(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.params.push(HelperParam {
            name: name.into(),
            schema: Some(schema),
            optional: true,
        });
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn call(&self, args: &[Value], hash: &Hash) -> Result<Value> {
        (self.call)(args, hash)
    }

    pub fn min_args(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    pub fn max_args(&self) -> Option<usize> {
        match self.variadic {
            true => None,
            false => Some(self.params.len()),
        }
    }

    /// Declared parameter for the argument at `idx`.
    pub fn param(&self, idx: usize) -> Option<&HelperParam> {
        match self.params.get(idx) {
            Some(p) => Some(p),
            None if self.variadic => self.params.last(),
            None => None,
        }
    }
}

/// Helper catalogue keyed by name.
#[derive(Debug, Clone, Default)]
pub struct HelperSet {
    helpers: BTreeMap<String, Rc<HelperDefinition>>,
}

lazy_static! {
    static ref BUILTIN_HELPERS: HelperSet = {
        let mut set = HelperSet::new();
        math::register(&mut set);
        logic::register(&mut set);
        set
    };
}

impl HelperSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in math and logic helpers.
    pub fn builtins() -> Self {
        BUILTIN_HELPERS.clone()
    }

    /// Add or replace a helper. Returns the previous definition.
    pub fn insert(&mut self, helper: HelperDefinition) -> Option<Rc<HelperDefinition>> {
        self.helpers.insert(helper.name.clone(), Rc::new(helper))
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<HelperDefinition>> {
        self.helpers.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Rc<HelperDefinition>> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.helpers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<HelperDefinition>> {
        self.helpers.values()
    }
}
