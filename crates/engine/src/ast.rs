//! Metapath expression AST.
//!
//! Core types: [`Expr`], [`Step`], [`SequenceType`], [`EQName`].
//!
//! The [`Display`](fmt::Display) implementations render canonical Metapath
//! text: composite expressions are fully parenthesised and axes are always
//! spelled out, so re-parsing the output yields an equal tree.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Decimal(Decimal),
}

/// An expanded-or-lexical name: `local`, `prefix:local` or `Q{uri}local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EQName {
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub local: String,
}

impl EQName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            namespace: None,
            local: local.into(),
        }
    }

    pub fn prefixed(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            namespace: None,
            local: local.into(),
        }
    }

    pub fn uri_qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// Splits the lexical forms accepted by the grammar.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix("Q{") {
            if let Some((namespace, local)) = rest.split_once('}') {
                return Self::uri_qualified(namespace, local);
            }
        }
        match text.split_once(':') {
            Some((prefix, local)) => Self::prefixed(prefix, local),
            None => Self::local(text),
        }
    }
}

impl fmt::Display for EQName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, &self.namespace) {
            (Some(prefix), _) => write!(f, "{}:{}", prefix, self.local),
            (None, Some(namespace)) => write!(f, "Q{{{}}}{}", namespace, self.local),
            (None, None) => write!(f, "{}", self.local),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    FollowingSibling,
    Following,
    Parent,
    Ancestor,
    AncestorOrSelf,
    PrecedingSibling,
    Preceding,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "following" => Axis::Following,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "preceding-sibling" => Axis::PrecedingSibling,
            "preceding" => Axis::Preceding,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::Attribute => "attribute",
            Axis::SelfAxis => "self",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::Following => "following",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Preceding => "preceding",
        }
    }

    /// Reverse axes number their positional predicates from the context
    /// node outwards.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Name(EQName),
    /// `*`
    Wildcard,
    /// `prefix:*`
    PrefixWildcard(String),
    /// `*:local`
    LocalWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTest {
    AnyNode,
    Document,
    Element(Option<EQName>),
    Attribute(Option<EQName>),
    Assembly(Option<EQName>),
    Field(Option<EQName>),
    Flag(Option<EQName>),
}

impl fmt::Display for KindTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = match self {
            KindTest::AnyNode => return f.write_str("node()"),
            KindTest::Document => return f.write_str("document-node()"),
            KindTest::Element(name) => ("element", name),
            KindTest::Attribute(name) => ("attribute", name),
            KindTest::Assembly(name) => ("assembly", name),
            KindTest::Field(name) => ("field", name),
            KindTest::Flag(name) => ("flag", name),
        };
        match name {
            Some(name) => write!(f, "{}({})", kind, name),
            None => write!(f, "{}()", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Name(NameTest::Name(name)) => write!(f, "{}", name),
            NodeTest::Name(NameTest::Wildcard) => f.write_str("*"),
            NodeTest::Name(NameTest::PrefixWildcard(prefix)) => write!(f, "{}:*", prefix),
            NodeTest::Name(NameTest::LocalWildcard(local)) => write!(f, "*:{}", local),
            NodeTest::Kind(kind) => write!(f, "{}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }

    /// `descendant-or-self::node()`, the expansion of `//`.
    pub fn descendant_or_self_node() -> Self {
        Self::new(Axis::DescendantOrSelf, NodeTest::Kind(KindTest::AnyNode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Occurrence::ExactlyOne => count == 1,
            Occurrence::ZeroOrOne => count <= 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => count >= 1,
        }
    }

    fn indicator(self) -> &'static str {
        match self {
            Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    Item,
    Atomic(EQName),
    Kind(KindTest),
    AnyMap,
    AnyArray,
    AnyFunction,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Item => f.write_str("item()"),
            ItemType::Atomic(name) => write!(f, "{}", name),
            ItemType::Kind(kind) => write!(f, "{}", kind),
            ItemType::AnyMap => f.write_str("map(*)"),
            ItemType::AnyArray => f.write_str("array(*)"),
            ItemType::AnyFunction => f.write_str("function(*)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceType {
    Empty,
    Typed {
        item: ItemType,
        occurrence: Occurrence,
    },
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceType::Empty => f.write_str("empty-sequence()"),
            SequenceType::Typed { item, occurrence } => {
                write!(f, "{}{}", item, occurrence.indicator())
            }
        }
    }
}

/// Target of `cast as` / `castable as`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleType {
    pub name: EQName,
    pub optional: bool,
}

impl fmt::Display for SingleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, if self.optional { "?" } else { "" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "div",
            ArithmeticOp::IntegerDivide => "idiv",
            ArithmeticOp::Mod => "mod",
        }
    }
}

/// Shared by general (`=`, `<`…) and value (`eq`, `lt`…) comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOp {
    pub fn general_symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }

    pub fn value_symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "eq",
            ComparisonOp::NotEqual => "ne",
            ComparisonOp::LessThan => "lt",
            ComparisonOp::LessOrEqual => "le",
            ComparisonOp::GreaterThan => "gt",
            ComparisonOp::GreaterOrEqual => "ge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeComparisonOp {
    Is,
    Precedes,
    Follows,
}

impl NodeComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            NodeComparisonOp::Is => "is",
            NodeComparisonOp::Precedes => "<<",
            NodeComparisonOp::Follows => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    Every,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeySpecifier {
    Name(String),
    Integer(i64),
    Wildcard,
    Expr(Box<Expr>),
}

impl fmt::Display for KeySpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpecifier::Name(name) => f.write_str(name),
            KeySpecifier::Integer(index) => write!(f, "{}", index),
            KeySpecifier::Wildcard => f.write_str("*"),
            KeySpecifier::Expr(expr) => write!(f, "({})", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: EQName,
    pub ty: Option<SequenceType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFunction {
    pub params: Vec<Param>,
    pub return_type: Option<SequenceType>,
    pub body: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayConstructor {
    /// `[a, b]`: one member per expression.
    Square(Vec<Expr>),
    /// `array { e }`: one member per item of `e`.
    Curly(Option<Box<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VariableRef(EQName),
    ContextItem,
    /// Comma operator. Never holds exactly one expression.
    Sequence(Vec<Expr>),

    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        negate: bool,
        operand: Box<Expr>,
    },
    GeneralComparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    ValueComparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    NodeComparison {
        op: NodeComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    StringConcat(Box<Expr>, Box<Expr>),
    Range(Box<Expr>, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Intersect(Box<Expr>, Box<Expr>),
    Except(Box<Expr>, Box<Expr>),

    InstanceOf {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    Treat {
        expr: Box<Expr>,
        ty: SequenceType,
    },
    Castable {
        expr: Box<Expr>,
        ty: SingleType,
    },
    Cast {
        expr: Box<Expr>,
        ty: SingleType,
    },

    /// `/a/b`, `a//b`. Relative single-step paths are built as the bare step.
    Path {
        absolute: bool,
        steps: Vec<Expr>,
    },
    Step(Step),
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },

    FunctionCall {
        name: EQName,
        args: Vec<Expr>,
    },
    DynamicCall {
        function: Box<Expr>,
        args: Vec<Expr>,
    },
    NamedFunctionRef {
        name: EQName,
        arity: usize,
    },
    InlineFunction(Arc<InlineFunction>),

    For {
        bindings: Vec<(EQName, Expr)>,
        body: Box<Expr>,
    },
    Let {
        bindings: Vec<(EQName, Expr)>,
        body: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<(EQName, Expr)>,
        satisfies: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    SimpleMap(Box<Expr>, Box<Expr>),
    MapConstructor(Vec<(Expr, Expr)>),
    ArrayConstructor(ArrayConstructor),
    Lookup {
        base: Box<Expr>,
        key: KeySpecifier,
    },
    UnaryLookup(KeySpecifier),
}

impl Expr {
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn decimal(value: Decimal) -> Self {
        Expr::Literal(Literal::Decimal(value))
    }

    pub fn empty() -> Self {
        Expr::Sequence(Vec::new())
    }

    pub fn arithmetic(left: Expr, op: ArithmeticOp, right: Expr) -> Self {
        Expr::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn step(axis: Axis, test: NodeTest) -> Self {
        Expr::Step(Step::new(axis, test))
    }

    pub fn child(name: &str) -> Self {
        Self::step(Axis::Child, NodeTest::Name(NameTest::Name(EQName::parse(name))))
    }

    pub fn function_call(name: EQName, args: Vec<Expr>) -> Self {
        Expr::FunctionCall { name, args }
    }

    /// Whether evaluating this expression reads the focus. Subexpressions
    /// evaluated under a focus of their own (predicates, the right side of
    /// `/` and `!`, function bodies) are not considered.
    pub fn is_focus_dependent(&self) -> bool {
        match self {
            Expr::ContextItem | Expr::Step(_) | Expr::UnaryLookup(_) => true,
            Expr::Path { absolute, steps } => {
                *absolute || steps.first().is_some_and(Expr::is_focus_dependent)
            }
            Expr::Literal(_)
            | Expr::VariableRef(_)
            | Expr::NamedFunctionRef { .. }
            | Expr::InlineFunction(_) => false,
            Expr::Sequence(items) => items.iter().any(Expr::is_focus_dependent),
            Expr::Arithmetic { left, right, .. }
            | Expr::GeneralComparison { left, right, .. }
            | Expr::ValueComparison { left, right, .. }
            | Expr::NodeComparison { left, right, .. } => {
                left.is_focus_dependent() || right.is_focus_dependent()
            }
            Expr::And(left, right)
            | Expr::Or(left, right)
            | Expr::StringConcat(left, right)
            | Expr::Range(left, right)
            | Expr::Union(left, right)
            | Expr::Intersect(left, right)
            | Expr::Except(left, right) => left.is_focus_dependent() || right.is_focus_dependent(),
            Expr::SimpleMap(left, _) => left.is_focus_dependent(),
            Expr::Unary { operand, .. } => operand.is_focus_dependent(),
            Expr::InstanceOf { expr, .. }
            | Expr::Treat { expr, .. }
            | Expr::Castable { expr, .. }
            | Expr::Cast { expr, .. } => expr.is_focus_dependent(),
            Expr::Filter { base, .. } => base.is_focus_dependent(),
            Expr::FunctionCall { name, args } => {
                (args.is_empty() && FOCUS_FUNCTIONS.contains(&name.local.as_str()))
                    || args.iter().any(Expr::is_focus_dependent)
            }
            Expr::DynamicCall { function, args } => {
                function.is_focus_dependent() || args.iter().any(Expr::is_focus_dependent)
            }
            Expr::For { bindings, body } | Expr::Let { bindings, body } => {
                bindings.iter().any(|(_, e)| e.is_focus_dependent()) || body.is_focus_dependent()
            }
            Expr::Quantified {
                bindings,
                satisfies,
                ..
            } => {
                bindings.iter().any(|(_, e)| e.is_focus_dependent())
                    || satisfies.is_focus_dependent()
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.is_focus_dependent()
                    || then_branch.is_focus_dependent()
                    || else_branch.is_focus_dependent()
            }
            Expr::MapConstructor(entries) => entries
                .iter()
                .any(|(k, v)| k.is_focus_dependent() || v.is_focus_dependent()),
            Expr::ArrayConstructor(ArrayConstructor::Square(members)) => {
                members.iter().any(Expr::is_focus_dependent)
            }
            Expr::ArrayConstructor(ArrayConstructor::Curly(body)) => {
                body.as_ref().is_some_and(|b| b.is_focus_dependent())
            }
            Expr::Lookup { base, key } => {
                base.is_focus_dependent()
                    || matches!(key, KeySpecifier::Expr(e) if e.is_focus_dependent())
            }
        }
    }
}

/// Zero-argument built-ins that implicitly read the context item.
const FOCUS_FUNCTIONS: &[&str] = &[
    "position",
    "last",
    "name",
    "local-name",
    "root",
    "path",
    "has-children",
    "string",
    "string-length",
    "normalize-space",
    "data",
];

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_bindings(
    f: &mut fmt::Formatter<'_>,
    bindings: &[(EQName, Expr)],
    assign: &str,
) -> fmt::Result {
    for (i, (name, value)) in bindings.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "${} {} {}", name, assign, value)?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Decimal(d) => {
                let text = d.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis, self.test)?;
        for predicate in &self.predicates {
            write!(f, "[{}]", predicate)?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::VariableRef(name) => write!(f, "${}", name),
            Expr::ContextItem => f.write_str("."),
            Expr::Sequence(items) => {
                f.write_str("(")?;
                write_list(f, items, ", ")?;
                f.write_str(")")
            }
            Expr::Arithmetic { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary { negate, operand } => {
                write!(f, "({}{})", if *negate { "-" } else { "+" }, operand)
            }
            Expr::GeneralComparison { op, left, right } => {
                write!(f, "({} {} {})", left, op.general_symbol(), right)
            }
            Expr::ValueComparison { op, left, right } => {
                write!(f, "({} {} {})", left, op.value_symbol(), right)
            }
            Expr::NodeComparison { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::And(l, r) => write!(f, "({} and {})", l, r),
            Expr::Or(l, r) => write!(f, "({} or {})", l, r),
            Expr::StringConcat(l, r) => write!(f, "({} || {})", l, r),
            Expr::Range(l, r) => write!(f, "({} to {})", l, r),
            Expr::Union(l, r) => write!(f, "({} union {})", l, r),
            Expr::Intersect(l, r) => write!(f, "({} intersect {})", l, r),
            Expr::Except(l, r) => write!(f, "({} except {})", l, r),
            Expr::InstanceOf { expr, ty } => write!(f, "({} instance of {})", expr, ty),
            Expr::Treat { expr, ty } => write!(f, "({} treat as {})", expr, ty),
            Expr::Castable { expr, ty } => write!(f, "({} castable as {})", expr, ty),
            Expr::Cast { expr, ty } => write!(f, "({} cast as {})", expr, ty),
            Expr::Path { absolute, steps } => {
                f.write_str("(")?;
                if *absolute {
                    f.write_str("/")?;
                }
                write_list(f, steps, "/")?;
                f.write_str(")")
            }
            Expr::Step(step) => write!(f, "{}", step),
            Expr::Filter { base, predicates } => {
                write!(f, "({})", base)?;
                for predicate in predicates {
                    write!(f, "[{}]", predicate)?;
                }
                Ok(())
            }
            Expr::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::DynamicCall { function, args } => {
                write!(f, "({})(", function)?;
                write_list(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::NamedFunctionRef { name, arity } => write!(f, "{}#{}", name, arity),
            Expr::InlineFunction(function) => {
                f.write_str("function(")?;
                for (i, param) in function.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "${}", param.name)?;
                    if let Some(ty) = &param.ty {
                        write!(f, " as {}", ty)?;
                    }
                }
                f.write_str(")")?;
                if let Some(ty) = &function.return_type {
                    write!(f, " as {}", ty)?;
                }
                match &function.body {
                    Some(body) => write!(f, " {{ {} }}", body),
                    None => f.write_str(" { }"),
                }
            }
            Expr::For { bindings, body } => {
                f.write_str("(for ")?;
                write_bindings(f, bindings, "in")?;
                write!(f, " return {})", body)
            }
            Expr::Let { bindings, body } => {
                f.write_str("(let ")?;
                write_bindings(f, bindings, ":=")?;
                write!(f, " return {})", body)
            }
            Expr::Quantified {
                quantifier,
                bindings,
                satisfies,
            } => {
                f.write_str(match quantifier {
                    Quantifier::Some => "(some ",
                    Quantifier::Every => "(every ",
                })?;
                write_bindings(f, bindings, "in")?;
                write!(f, " satisfies {})", satisfies)
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => write!(
                f,
                "(if ({}) then {} else {})",
                condition, then_branch, else_branch
            ),
            Expr::SimpleMap(l, r) => write!(f, "({} ! {})", l, r),
            Expr::MapConstructor(entries) => {
                f.write_str("map { ")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} : {}", key, value)?;
                }
                f.write_str(" }")
            }
            Expr::ArrayConstructor(ArrayConstructor::Square(members)) => {
                f.write_str("[")?;
                write_list(f, members, ", ")?;
                f.write_str("]")
            }
            Expr::ArrayConstructor(ArrayConstructor::Curly(body)) => match body {
                Some(body) => write!(f, "array {{ {} }}", body),
                None => f.write_str("array { }"),
            },
            Expr::Lookup { base, key } => write!(f, "({})?{}", base, key),
            Expr::UnaryLookup(key) => write!(f, "?{}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eqname_forms() {
        assert_eq!(EQName::parse("a"), EQName::local("a"));
        assert_eq!(EQName::parse("fn:count"), EQName::prefixed("fn", "count"));
        assert_eq!(
            EQName::parse("Q{http://example.com}x"),
            EQName::uri_qualified("http://example.com", "x")
        );
        assert_eq!(EQName::parse("Q{urn:a}x").to_string(), "Q{urn:a}x");
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Expr::string("it\"s").to_string(), "\"it\"\"s\"");
        assert_eq!(Expr::decimal(Decimal::new(15, 1)).to_string(), "1.5");
        assert_eq!(Expr::decimal(Decimal::from(1500)).to_string(), "1500.0");
    }

    #[test]
    fn test_composites_are_parenthesised() {
        let expr = Expr::arithmetic(
            Expr::integer(1),
            ArithmeticOp::Add,
            Expr::arithmetic(Expr::integer(2), ArithmeticOp::Multiply, Expr::integer(3)),
        );
        assert_eq!(expr.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn test_path_display() {
        let path = Expr::Path {
            absolute: true,
            steps: vec![
                Expr::Step(Step::descendant_or_self_node()),
                Expr::child("field1"),
            ],
        };
        assert_eq!(
            path.to_string(),
            "(/descendant-or-self::node()/child::field1)"
        );
    }

    #[test]
    fn test_focus_dependence() {
        assert!(Expr::ContextItem.is_focus_dependent());
        assert!(Expr::child("a").is_focus_dependent());
        assert!(!Expr::integer(1).is_focus_dependent());
        assert!(Expr::function_call(EQName::local("position"), vec![]).is_focus_dependent());
        assert!(!Expr::function_call(EQName::local("count"), vec![Expr::integer(1)])
            .is_focus_dependent());
        let mapped = Expr::SimpleMap(Box::new(Expr::integer(1)), Box::new(Expr::ContextItem));
        assert!(!mapped.is_focus_dependent());
    }

    #[test]
    fn test_reverse_axes() {
        assert!(Axis::Parent.is_reverse());
        assert!(Axis::PrecedingSibling.is_reverse());
        assert!(!Axis::Child.is_reverse());
        assert_eq!(Axis::from_name("ancestor-or-self"), Some(Axis::AncestorOrSelf));
        assert_eq!(Axis::from_name("namespace"), None);
    }
}
