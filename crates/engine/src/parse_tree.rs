//! Concrete parse tree produced by the grammar.
//!
//! Every grammar rule that was entered produces a [`ParseNode`], including
//! the precedence levels that only wrap a single child. The
//! [`builder`](crate::builder) collapses those wrappers when lowering to the AST.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Expr,
    ForExpr,
    LetExpr,
    SimpleBinding,
    QuantifiedExpr,
    IfExpr,
    OrExpr,
    AndExpr,
    ComparisonExpr,
    StringConcatExpr,
    RangeExpr,
    AdditiveExpr,
    MultiplicativeExpr,
    UnionExpr,
    IntersectExceptExpr,
    InstanceofExpr,
    TreatExpr,
    CastableExpr,
    CastExpr,
    ArrowExpr,
    ArrowTarget,
    UnaryExpr,
    SimpleMapExpr,
    PathExpr,
    RelativePathExpr,
    AxisStep,
    ForwardStep,
    ReverseStep,
    NameTest,
    KindTest,
    PostfixExpr,
    Predicate,
    ArgumentList,
    Lookup,
    UnaryLookup,
    KeySpecifier,
    IntegerLiteral,
    DecimalLiteral,
    DoubleLiteral,
    StringLiteral,
    VarRef,
    ParenthesizedExpr,
    ContextItemExpr,
    FunctionCall,
    NamedFunctionRef,
    InlineFunctionExpr,
    Param,
    MapConstructor,
    MapConstructorEntry,
    SquareArrayConstructor,
    CurlyArrayConstructor,
    SequenceType,
    ItemType,
    SingleType,
    EQName,
    /// An operator, keyword or axis name that distinguishes a rule's variants.
    Token,
}

/// One node of the concrete parse tree. `text` is the trimmed source slice
/// the rule matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode<'i> {
    rule: Rule,
    text: &'i str,
    children: Vec<ParseNode<'i>>,
}

impl<'i> ParseNode<'i> {
    pub fn new(rule: Rule, text: &'i str, children: Vec<ParseNode<'i>>) -> Self {
        Self {
            rule,
            text: text.trim(),
            children,
        }
    }

    pub fn token(text: &'i str) -> Self {
        Self::new(Rule::Token, text, Vec::new())
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn text(&self) -> &'i str {
        self.text
    }

    pub fn children(&self) -> &[ParseNode<'i>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&ParseNode<'i>> {
        self.children.get(index)
    }

    /// Children matching `rule`, in order.
    pub fn children_of(&self, rule: Rule) -> impl Iterator<Item = &ParseNode<'i>> {
        self.children.iter().filter(move |c| c.rule == rule)
    }

    pub fn is_token(&self, text: &str) -> bool {
        self.rule == Rule::Token && self.text == text
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{:?}", "", self.rule, indent = depth * 2)?;
        if self.children.is_empty() {
            writeln!(f, " {:?}", self.text)?;
        } else {
            writeln!(f)?;
            for child in &self.children {
                child.write_indented(f, depth + 1)?;
            }
        }
        Ok(())
    }
}

/// Byte range of a parse node within its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree<'i> {
    source: &'i str,
    root: ParseNode<'i>,
}

impl<'i> ParseTree<'i> {
    pub(crate) fn new(source: &'i str, root: ParseNode<'i>) -> Self {
        Self { source, root }
    }

    pub fn source(&self) -> &'i str {
        self.source
    }

    pub fn root(&self) -> &ParseNode<'i> {
        &self.root
    }

    /// Locates `node` in the source text.
    pub fn span(&self, node: &ParseNode<'i>) -> Span {
        let start = (node.text.as_ptr() as usize).saturating_sub(self.source.as_ptr() as usize);
        Span {
            start,
            end: start + node.text.len(),
        }
    }
}

impl fmt::Display for ParseTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.write_indented(f, 0)
    }
}
