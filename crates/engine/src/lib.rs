//! Metapath expression parser and evaluator.
//!
//! Metapath is the XPath 3.1 derived query language of Metaschema. An
//! expression is parsed into a concrete [`ParseTree`], lowered to an [`Expr`]
//! AST and evaluated against a node-item tree.
//!
//! # Key Types
//!
//! - [`Expr`]: compiled expression AST
//! - [`Sequence`] / [`Item`]: evaluation results (nodes, atomics, maps,
//!   arrays and functions)
//! - [`StaticContext`] / [`DynamicContext`]: compile-time and run-time context
//! - [`FunctionLibrary`]: the built-in and user-registered functions
//!
//! # Example
//!
//! ```ignore
//! use metapath_engine::{DynamicContext, Item, StaticContext, build, evaluate, parse};
//!
//! let expr = build(&parse("//control[@id = 'ac-1']/title")?)?;
//! let ctx = DynamicContext::new(StaticContext::default());
//! let titles = evaluate(&expr, &ctx, Some(Item::Node(tree.root())))?;
//! ```

pub mod ast;
pub mod axes;
pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parse_tree;
pub mod parser;
pub mod types;

pub use ast::{Axis, EQName, Expr, SequenceType};
pub use builder::build;
pub use context::{
    ARRAY_NS, DynamicContext, EvaluationConfig, FUNCTIONS_NS, Focus, MAP_NS, MATH_NS, META_NS,
    OPERATORS_NS, StaticContext, StaticContextBuilder, XS_NS,
};
pub use engine::{call_function, call_item, evaluate, matches_sequence_type};
pub use error::MetapathError;
pub use functions::{FunctionDefinition, FunctionImpl, FunctionLibrary};
pub use parse_tree::{ParseNode, ParseTree, Rule};
pub use parser::parse;
pub use types::{ArrayItem, FunctionItem, Item, MapItem, Sequence};

pub use metapath_nodeitem::{NodeItem, NodeItemTree, NodeKind, QName};
pub use metapath_types::{AtomicItem, AtomicType};
