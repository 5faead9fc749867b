//! The built-in function library.
//!
//! Functions are registered in a [`FunctionLibrary`] under their expanded
//! name and an arity range, and resolved by (namespace, local name, arity) at
//! call time. Every implementation receives its arguments already evaluated;
//! arity is checked by the library, so implementations index their arguments
//! directly.

mod boolean;
mod constructor;
mod hof;
mod map_array;
mod node;
mod numeric;
mod sequence;
mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use metapath_types::{AtomicItem, Decimal};

use crate::context::DynamicContext;
use crate::error::MetapathError;
use crate::types::{Item, Sequence};

pub type FunctionImpl = for<'t> fn(
    &DynamicContext<'t>,
    Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError>;

/// A registered function: its expanded name, accepted arities and body.
#[derive(Clone)]
pub struct FunctionDefinition {
    pub namespace: String,
    pub name: String,
    pub min_arity: usize,
    /// `None` for variadic functions such as `concat`.
    pub max_arity: Option<usize>,
    implementation: FunctionImpl,
}

impl FunctionDefinition {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        min_arity: usize,
        max_arity: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            min_arity,
            max_arity,
            implementation,
        }
    }

    pub fn accepts(&self, arity: usize) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|max| arity <= max)
    }

    pub fn call<'t>(
        &self,
        ctx: &DynamicContext<'t>,
        args: Vec<Sequence<'t>>,
    ) -> Result<Sequence<'t>, MetapathError> {
        // implementations index their arguments without checking
        if !self.accepts(args.len()) {
            return Err(MetapathError::undefined_function(
                Some(&self.namespace),
                &self.name,
                args.len(),
            ));
        }
        (self.implementation)(ctx, args)
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("min_arity", &self.min_arity)
            .field("max_arity", &self.max_arity)
            .finish_non_exhaustive()
    }
}

static STANDARD: LazyLock<Arc<FunctionLibrary>> =
    LazyLock::new(|| Arc::new(FunctionLibrary::builtin()));

#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<(String, String), Vec<FunctionDefinition>>,
}

impl FunctionLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared built-in library.
    pub fn standard() -> Arc<FunctionLibrary> {
        Arc::clone(&STANDARD)
    }

    /// A fresh copy of the built-ins, for callers that want to register
    /// functions of their own next to them.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        boolean::register(&mut library);
        numeric::register(&mut library);
        string::register(&mut library);
        sequence::register(&mut library);
        node::register(&mut library);
        hof::register(&mut library);
        map_array::register(&mut library);
        constructor::register(&mut library);
        library
    }

    pub fn register(&mut self, definition: FunctionDefinition) {
        self.functions
            .entry((definition.namespace.clone(), definition.name.clone()))
            .or_default()
            .push(definition);
    }

    fn add(
        &mut self,
        namespace: &str,
        name: &str,
        min_arity: usize,
        max_arity: Option<usize>,
        implementation: FunctionImpl,
    ) {
        self.register(FunctionDefinition::new(
            namespace,
            name,
            min_arity,
            max_arity,
            implementation,
        ));
    }

    pub fn lookup(&self, namespace: &str, name: &str, arity: usize) -> Option<&FunctionDefinition> {
        self.functions
            .get(&(namespace.to_string(), name.to_string()))?
            .iter()
            .find(|definition| definition.accepts(arity))
    }

    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Takes the first argument, or the context item when the function was
/// called without one.
fn argument_or_context<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    match args.into_iter().next() {
        Some(arg) => Ok(arg),
        None => Ok(Sequence::from_item(ctx.context_item()?.clone())),
    }
}

fn optional_node<'t>(
    value: &Sequence<'t>,
    function: &str,
) -> Result<Option<metapath_nodeitem::NodeItem<'t>>, MetapathError> {
    match value.zero_or_one(function)? {
        None => Ok(None),
        Some(Item::Node(node)) => Ok(Some(*node)),
        Some(other) => Err(MetapathError::type_error(format!(
            "{} requires a node, got {}",
            function,
            other.type_name()
        ))),
    }
}

fn optional_string(value: &Sequence<'_>, function: &str) -> Result<String, MetapathError> {
    Ok(value
        .atomize_optional(function)?
        .map(|value| value.as_string())
        .unwrap_or_default())
}

fn required_atomic(value: &Sequence<'_>, function: &str) -> Result<AtomicItem, MetapathError> {
    value.atomize_optional(function)?.ok_or_else(|| {
        MetapathError::type_error(format!("{} requires a value, got an empty sequence", function))
    })
}

/// A numeric position or length, rounded the way `fn:round` rounds.
fn rounded_number(value: &Sequence<'_>, function: &str) -> Result<Decimal, MetapathError> {
    let value = required_atomic(value, function)?;
    let number = value.as_decimal().ok_or_else(|| {
        MetapathError::type_error(format!(
            "{} requires a number, got {}",
            function,
            value.type_name()
        ))
    })?;
    numeric::round_half_up(number, 0)
}

fn required_integer(value: &Sequence<'_>, function: &str) -> Result<i64, MetapathError> {
    match required_atomic(value, function)? {
        AtomicItem::Integer(i) => Ok(i),
        other => Err(MetapathError::type_error(format!(
            "{} requires an integer, got {}",
            function,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::builder::build;
    use crate::context::{FUNCTIONS_NS, StaticContext};
    use crate::engine::evaluate;
    use crate::parser::parse;

    /// Evaluates a focus-free expression.
    pub(crate) fn eval_str(text: &str) -> Result<Sequence<'static>, MetapathError> {
        let _ = env_logger::builder().is_test(true).try_init();
        let expr = build(&parse(text)?)?;
        evaluate(&expr, &DynamicContext::new(StaticContext::default()), None)
    }

    pub(crate) fn value(text: &str) -> Sequence<'static> {
        eval_str(text).unwrap()
    }

    #[test]
    fn test_lookup_by_arity() {
        let library = FunctionLibrary::standard();
        assert!(library.lookup(FUNCTIONS_NS, "string", 0).is_some());
        assert!(library.lookup(FUNCTIONS_NS, "string", 1).is_some());
        assert!(library.lookup(FUNCTIONS_NS, "string", 2).is_none());
        assert!(library.lookup(FUNCTIONS_NS, "concat", 7).is_some());
        assert!(library.lookup(FUNCTIONS_NS, "concat", 1).is_none());
        assert!(library.lookup("urn:other", "string", 1).is_none());
    }

    fn answer<'t>(
        _ctx: &DynamicContext<'t>,
        _args: Vec<Sequence<'t>>,
    ) -> Result<Sequence<'t>, MetapathError> {
        Ok(Sequence::integer(42))
    }

    #[test]
    fn test_custom_function() {
        let mut library = FunctionLibrary::builtin();
        library.register(FunctionDefinition::new("urn:test", "answer", 0, Some(0), answer));

        let ctx = DynamicContext::new(StaticContext::builder().namespace("t", "urn:test").build())
            .with_functions(Arc::new(library));
        let expr = build(&parse("t:answer() + count((1, 2))").unwrap()).unwrap();
        assert_eq!(evaluate(&expr, &ctx, None).unwrap(), Sequence::integer(44));
    }

    #[test]
    fn test_context_dependent_function_without_focus() {
        assert_eq!(eval_str("string()"), Err(MetapathError::NoContextItem));
    }
}
