//! Metapath: the Metaschema query language.
//!
//! This crate ties the workspace together. It re-exports the item system
//! ([`metapath_types`]), the node-item tree ([`metapath_nodeitem`]) and the
//! parser and evaluator ([`metapath_engine`]), and adds compiled expressions
//! with an in-memory expression cache on top.
//!
//! # Example
//!
//! ```ignore
//! use metapath::{EvaluationConfig, ExpressionCache, Item, StaticContext};
//!
//! let config = EvaluationConfig::default();
//! let cache = ExpressionCache::new(StaticContext::default(), &config);
//! let expr = cache.get_or_compile("count(//control)")?;
//! let ctx = expr.dynamic_context(config);
//! let count = expr.evaluate_as_single(Some(Item::Node(tree.root())), &ctx)?;
//! ```

pub mod cache;
pub mod expression;

pub use cache::ExpressionCache;
pub use expression::MetapathExpression;

pub use metapath_engine::{
    ARRAY_NS, ArrayItem, DynamicContext, EvaluationConfig, Expr, FUNCTIONS_NS, Focus,
    FunctionDefinition, FunctionItem, FunctionLibrary, Item, MAP_NS, MATH_NS, META_NS, MapItem,
    MetapathError, OPERATORS_NS, Sequence, StaticContext, StaticContextBuilder, XS_NS, build,
    evaluate, parse,
};
pub use metapath_nodeitem::{
    IndexedPathFormatter, MetapathPathFormatter, NodeId, NodeItem, NodeItemTree, NodeKind,
    PathFormatter, QName, TreeBuilder, TreeError,
};
pub use metapath_types::{AtomicItem, AtomicType, Decimal, ValueError};

pub use metapath_engine;
pub use metapath_nodeitem;
pub use metapath_types;
