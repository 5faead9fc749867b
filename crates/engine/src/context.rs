//! Static and dynamic evaluation contexts.
//!
//! A [`StaticContext`] holds what is known before any document is seen:
//! namespace bindings and the defaults used to resolve unprefixed names. A
//! [`DynamicContext`] adds variable bindings, the function library and the
//! focus. Dynamic contexts are never mutated; every `with_*` method returns a
//! derived context that shares the unchanged parts with its parent.

use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::EQName;
use crate::error::MetapathError;
use crate::functions::FunctionLibrary;
use crate::types::{Item, Sequence};

pub const FUNCTIONS_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions";
pub const MATH_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions/math";
pub const ARRAY_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions/array";
pub const MAP_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions/map";
pub const OPERATORS_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions/operators";
/// Namespace of the Metaschema data types.
pub const META_NS: &str = "http://csrc.nist.gov/ns/oscal/metaschema/1.0";
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Compile-time environment: namespace bindings and name-resolution defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticContext {
    namespaces: IndexMap<String, String>,
    default_function_namespace: String,
    default_model_namespace: Option<String>,
}

impl Default for StaticContext {
    fn default() -> Self {
        let namespaces = [
            ("fn", FUNCTIONS_NS),
            ("math", MATH_NS),
            ("array", ARRAY_NS),
            ("map", MAP_NS),
            ("op", OPERATORS_NS),
            ("meta", META_NS),
            ("xs", XS_NS),
        ]
        .into_iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect();

        Self {
            namespaces,
            default_function_namespace: FUNCTIONS_NS.to_string(),
            default_model_namespace: None,
        }
    }
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> StaticContextBuilder {
        StaticContextBuilder {
            context: Self::default(),
        }
    }

    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn default_function_namespace(&self) -> &str {
        &self.default_function_namespace
    }

    /// Namespace assumed for unprefixed name tests. When unset, unprefixed
    /// tests match on the local name alone.
    pub fn default_model_namespace(&self) -> Option<&str> {
        self.default_model_namespace.as_deref()
    }

    /// Resolves the namespace of a function name, applying the default
    /// function namespace to unprefixed names. `None` when the prefix is not
    /// bound.
    pub fn function_namespace(&self, name: &EQName) -> Option<String> {
        match (&name.namespace, &name.prefix) {
            (Some(namespace), _) => Some(namespace.clone()),
            (None, Some(prefix)) => self.lookup_namespace(prefix).map(str::to_string),
            (None, None) => Some(self.default_function_namespace.clone()),
        }
    }

    /// Resolves the namespace of an element-like name used in a name test.
    pub fn element_namespace(&self, name: &EQName) -> Result<Option<String>, MetapathError> {
        match (&name.namespace, &name.prefix) {
            (Some(namespace), _) => Ok(Some(namespace.clone())),
            (None, Some(prefix)) => self
                .lookup_namespace(prefix)
                .map(|uri| Some(uri.to_string()))
                .ok_or_else(|| unbound_prefix(prefix)),
            (None, None) => Ok(self.default_model_namespace.clone()),
        }
    }

    pub fn prefix_namespace(&self, prefix: &str) -> Result<&str, MetapathError> {
        self.lookup_namespace(prefix)
            .ok_or_else(|| unbound_prefix(prefix))
    }
}

fn unbound_prefix(prefix: &str) -> MetapathError {
    MetapathError::invalid_value(format!("namespace prefix '{}' is not bound", prefix))
}

#[derive(Debug)]
pub struct StaticContextBuilder {
    context: StaticContext,
}

impl StaticContextBuilder {
    /// Binds `prefix`, replacing any earlier binding.
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.context.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.context.default_function_namespace = uri.into();
        self
    }

    pub fn default_model_namespace(mut self, uri: impl Into<String>) -> Self {
        self.context.default_model_namespace = Some(uri.into());
        self
    }

    pub fn build(self) -> StaticContext {
        self.context
    }
}

/// Tunables for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Offset in minutes applied to dates and date-times without a timezone
    /// when they are compared with zoned values.
    pub implicit_timezone_minutes: i32,
    /// Largest sequence a range expression may produce.
    pub max_range_length: usize,
    /// Compiled expressions retained by an expression cache before it is
    /// cleared. Zero disables caching.
    pub expression_cache_capacity: usize,
    /// Stop evaluating `and`/`or` once the left operand decides the result.
    pub short_circuit_boolean: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            implicit_timezone_minutes: 0,
            max_range_length: 10_000_000,
            expression_cache_capacity: 1024,
            short_circuit_boolean: false,
        }
    }
}

impl EvaluationConfig {
    pub fn implicit_timezone(&self) -> FixedOffset {
        self.implicit_timezone_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

/// The context item together with its position in, and the size of, the
/// sequence it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct Focus<'t> {
    pub item: Item<'t>,
    pub position: usize,
    pub size: usize,
}

impl<'t> Focus<'t> {
    pub fn new(item: Item<'t>, position: usize, size: usize) -> Self {
        Self {
            item,
            position,
            size,
        }
    }

    pub fn single(item: Item<'t>) -> Self {
        Self::new(item, 1, 1)
    }
}

/// One binding in a persistent linked list of variables. Lookups walk from
/// the innermost binding outwards, so inner bindings shadow outer ones.
#[derive(Debug)]
struct VariableScope<'t> {
    name: String,
    value: Sequence<'t>,
    parent: Option<Arc<VariableScope<'t>>>,
}

#[derive(Clone)]
pub struct DynamicContext<'t> {
    static_context: Arc<StaticContext>,
    config: Arc<EvaluationConfig>,
    functions: Arc<FunctionLibrary>,
    variables: Option<Arc<VariableScope<'t>>>,
    focus: Option<Focus<'t>>,
}

impl<'t> DynamicContext<'t> {
    pub fn new(static_context: StaticContext) -> Self {
        Self {
            static_context: Arc::new(static_context),
            config: Arc::new(EvaluationConfig::default()),
            functions: FunctionLibrary::standard(),
            variables: None,
            focus: None,
        }
    }

    pub fn from_shared(static_context: Arc<StaticContext>, config: Arc<EvaluationConfig>) -> Self {
        Self {
            static_context,
            config,
            functions: FunctionLibrary::standard(),
            variables: None,
            focus: None,
        }
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionLibrary>) -> Self {
        self.functions = functions;
        self
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_context
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionLibrary {
        &self.functions
    }

    pub fn implicit_timezone(&self) -> FixedOffset {
        self.config.implicit_timezone()
    }

    /// Derives a context with `name` bound to `value`.
    pub fn with_variable(&self, name: impl Into<String>, value: Sequence<'t>) -> Self {
        let mut derived = self.clone();
        derived.variables = Some(Arc::new(VariableScope {
            name: name.into(),
            value,
            parent: self.variables.clone(),
        }));
        derived
    }

    /// Derives a context whose only variables are `bindings`, later entries
    /// shadowing earlier ones.
    pub fn with_variables(
        &self,
        bindings: impl IntoIterator<Item = (String, Sequence<'t>)>,
    ) -> Self {
        let mut derived = self.clone();
        derived.variables = None;
        for (name, value) in bindings {
            derived.variables = Some(Arc::new(VariableScope {
                name,
                value,
                parent: derived.variables.take(),
            }));
        }
        derived
    }

    pub fn variable(&self, name: &str) -> Result<&Sequence<'t>, MetapathError> {
        let mut scope = self.variables.as_deref();
        while let Some(binding) = scope {
            if binding.name == name {
                return Ok(&binding.value);
            }
            scope = binding.parent.as_deref();
        }
        Err(MetapathError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Every visible binding, outermost first, without shadowed entries.
    pub fn visible_variables(&self) -> Vec<(String, Sequence<'t>)> {
        let mut seen = std::collections::HashSet::new();
        let mut bindings = Vec::new();
        let mut scope = self.variables.as_deref();
        while let Some(binding) = scope {
            if seen.insert(binding.name.as_str()) {
                bindings.push((binding.name.clone(), binding.value.clone()));
            }
            scope = binding.parent.as_deref();
        }
        bindings.reverse();
        bindings
    }

    pub fn with_focus(&self, focus: Focus<'t>) -> Self {
        let mut derived = self.clone();
        derived.focus = Some(focus);
        derived
    }

    pub fn without_focus(&self) -> Self {
        let mut derived = self.clone();
        derived.focus = None;
        derived
    }

    pub fn focus(&self) -> Option<&Focus<'t>> {
        self.focus.as_ref()
    }

    pub fn context_item(&self) -> Result<&Item<'t>, MetapathError> {
        self.focus
            .as_ref()
            .map(|focus| &focus.item)
            .ok_or(MetapathError::NoContextItem)
    }
}

impl Default for DynamicContext<'_> {
    fn default() -> Self {
        Self::new(StaticContext::default())
    }
}

impl fmt::Debug for DynamicContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContext")
            .field("static_context", &self.static_context)
            .field("config", &self.config)
            .field(
                "variables",
                &self
                    .visible_variables()
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("focus", &self.focus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespaces() {
        let ctx = StaticContext::default();
        assert_eq!(ctx.lookup_namespace("fn"), Some(FUNCTIONS_NS));
        assert_eq!(ctx.lookup_namespace("map"), Some(MAP_NS));
        assert_eq!(ctx.default_function_namespace(), FUNCTIONS_NS);
        assert_eq!(ctx.default_model_namespace(), None);
    }

    #[test]
    fn test_builder_binds_prefixes() {
        let ctx = StaticContext::builder()
            .namespace("oscal", "http://csrc.nist.gov/ns/oscal/1.0")
            .default_model_namespace("http://csrc.nist.gov/ns/oscal/1.0")
            .build();
        assert_eq!(
            ctx.element_namespace(&EQName::prefixed("oscal", "catalog"))
                .unwrap()
                .as_deref(),
            Some("http://csrc.nist.gov/ns/oscal/1.0")
        );
        assert_eq!(
            ctx.element_namespace(&EQName::local("catalog")).unwrap().as_deref(),
            Some("http://csrc.nist.gov/ns/oscal/1.0")
        );
        assert!(ctx.element_namespace(&EQName::prefixed("nope", "x")).is_err());
    }

    #[test]
    fn test_variables_shadow_without_mutating_parent() {
        let outer = DynamicContext::default().with_variable("x", Sequence::integer(1));
        let inner = outer.with_variable("x", Sequence::integer(2));

        assert_eq!(inner.variable("x").unwrap(), &Sequence::integer(2));
        assert_eq!(outer.variable("x").unwrap(), &Sequence::integer(1));
        assert_eq!(inner.visible_variables().len(), 1);
        assert!(matches!(
            outer.variable("y"),
            Err(MetapathError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_context_item_requires_focus() {
        let ctx = DynamicContext::default();
        assert_eq!(ctx.context_item(), Err(MetapathError::NoContextItem));

        let focused = ctx.with_focus(Focus::single(Item::Atomic(1i64.into())));
        assert!(focused.context_item().is_ok());
        assert!(ctx.focus().is_none());
    }

    #[test]
    fn test_config_round_trips_through_serde_defaults() {
        let config: EvaluationConfig =
            serde_json::from_str(r#"{"implicit_timezone_minutes": -300}"#).unwrap();
        assert_eq!(config.implicit_timezone_minutes, -300);
        assert_eq!(config.max_range_length, 10_000_000);
        assert_eq!(
            config.implicit_timezone(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
    }
}
