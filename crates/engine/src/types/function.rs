use std::fmt;
use std::sync::Arc;

use super::Sequence;
use crate::ast::InlineFunction;

/// A function value: a reference to a library function or an inline
/// function closed over the variables visible where it was created.
#[derive(Debug, Clone)]
pub enum FunctionItem<'t> {
    Named {
        namespace: String,
        name: String,
        arity: usize,
    },
    Inline {
        function: Arc<InlineFunction>,
        captured: Arc<Vec<(String, Sequence<'t>)>>,
    },
}

impl<'t> FunctionItem<'t> {
    pub fn named(namespace: impl Into<String>, name: impl Into<String>, arity: usize) -> Self {
        Self::Named {
            namespace: namespace.into(),
            name: name.into(),
            arity,
        }
    }

    pub fn inline(function: Arc<InlineFunction>, captured: Vec<(String, Sequence<'t>)>) -> Self {
        Self::Inline {
            function,
            captured: Arc::new(captured),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            FunctionItem::Named { arity, .. } => *arity,
            FunctionItem::Inline { function, .. } => function.params.len(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            FunctionItem::Named { name, .. } => Some(name),
            FunctionItem::Inline { .. } => None,
        }
    }
}

/// Named references are equal when they name the same function; inline
/// functions only when they are the same closure.
impl PartialEq for FunctionItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FunctionItem::Named {
                    namespace: n1,
                    name: a,
                    arity: x,
                },
                FunctionItem::Named {
                    namespace: n2,
                    name: b,
                    arity: y,
                },
            ) => n1 == n2 && a == b && x == y,
            (
                FunctionItem::Inline {
                    function: f1,
                    captured: c1,
                },
                FunctionItem::Inline {
                    function: f2,
                    captured: c2,
                },
            ) => Arc::ptr_eq(f1, f2) && Arc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

impl fmt::Display for FunctionItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionItem::Named {
                namespace,
                name,
                arity,
            } => write!(f, "Q{{{}}}{}#{}", namespace, name, arity),
            FunctionItem::Inline { function, .. } => {
                write!(f, "function(")?;
                for (i, param) in function.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "${}", param.name)?;
                }
                write!(f, ")")
            }
        }
    }
}
