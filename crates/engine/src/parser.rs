//! Metapath grammar.
//!
//! Recursive-descent over `nom` combinators, one function per grammar rule,
//! following the precedence ladder
//! `expr → orexpr → andexpr → comparisonexpr → … → pathexpr → stepexpr → primaryexpr`.
//! Every rule yields a [`ParseNode`]; no semantic decisions are made here.
//!
//! Once an operator or keyword has committed the parser to a rule, the
//! remaining operands are parsed under [`cut`] so malformed input fails at
//! the offending position instead of backtracking to an accepted prefix.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of, satisfy},
    combinator::{cut, not, opt, peek, recognize},
    error::{ErrorKind, ParseError},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};

use crate::error::MetapathError;
use crate::parse_tree::{ParseNode, ParseTree, Rule};

/// Parse failure carrying the farthest input position reached and the
/// tokens that would have been accepted there.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarError<'i> {
    pub input: &'i str,
    pub expected: Vec<&'static str>,
}

impl<'i> GrammarError<'i> {
    fn expecting(mut self, label: &'static str) -> Self {
        if self.expected.is_empty() {
            self.expected.push(label);
        }
        self
    }
}

impl<'i> ParseError<&'i str> for GrammarError<'i> {
    fn from_error_kind(input: &'i str, _kind: ErrorKind) -> Self {
        Self {
            input,
            expected: Vec::new(),
        }
    }

    fn append(_input: &'i str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(mut self, other: Self) -> Self {
        match self.input.len().cmp(&other.input.len()) {
            std::cmp::Ordering::Less => self,
            std::cmp::Ordering::Greater => other,
            std::cmp::Ordering::Equal => {
                for label in other.expected {
                    if !self.expected.contains(&label) {
                        self.expected.push(label);
                    }
                }
                self
            }
        }
    }
}

type PResult<'i, O> = IResult<&'i str, O, GrammarError<'i>>;

/// Parses `text` into a concrete parse tree.
pub fn parse(text: &str) -> Result<ParseTree<'_>, MetapathError> {
    log::debug!("parsing metapath expression: {}", text);
    match terminated(expr, skip_ws).parse(text) {
        Ok(("", root)) => Ok(ParseTree::new(text, root)),
        Ok((rest, _)) => Err(syntax_error(text, rest, &["an operator", "end of input"])),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(syntax_error(text, e.input, &e.expected))
        }
        Err(nom::Err::Incomplete(_)) => Err(MetapathError::syntax(
            text.len(),
            "more input",
            "end of input",
        )),
    }
}

fn syntax_error(source: &str, rest: &str, expected: &[&'static str]) -> MetapathError {
    let position = source.len() - rest.len();
    let expected = if expected.is_empty() {
        "an expression".to_string()
    } else {
        expected
            .iter()
            .map(|label| describe_label(label))
            .collect::<Vec<_>>()
            .join(" or ")
    };
    MetapathError::syntax(position, expected, describe_found(rest))
}

fn describe_label(label: &str) -> String {
    if label.starts_with("a ") || label.starts_with("an ") || label == "end of input" {
        label.to_string()
    } else {
        format!("'{}'", label)
    }
}

fn describe_found(rest: &str) -> String {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return "end of input".to_string();
    }
    let token: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(12)
        .collect();
    format!("'{}'", token)
}

// --- lexical helpers ---

fn consumed<'i>(start: &'i str, rest: &'i str) -> &'i str {
    &start[..start.len() - rest.len()]
}

fn skip_ws(input: &str) -> PResult<'_, ()> {
    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.starts_with("(:") {
            rest = skip_comment(rest)?;
        } else {
            return Ok((rest, ()));
        }
    }
}

/// Skips a possibly nested `(: … :)` comment.
fn skip_comment(input: &str) -> Result<&str, nom::Err<GrammarError<'_>>> {
    let mut depth = 0usize;
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("(:") {
            depth += 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix(":)") {
            depth -= 1;
            rest = after;
            if depth == 0 {
                return Ok(rest);
            }
        } else {
            let mut chars = rest.chars();
            chars.next();
            rest = chars.as_str();
        }
    }
    Err(nom::Err::Failure(GrammarError {
        input: rest,
        expected: vec![":)"],
    }))
}

fn ws<'i, F, O>(inner: F) -> impl Parser<&'i str, Output = O, Error = GrammarError<'i>>
where
    F: Parser<&'i str, Output = O, Error = GrammarError<'i>>,
{
    delimited(skip_ws, inner, skip_ws)
}

fn expecting<'i, O, P>(
    label: &'static str,
    mut parser: P,
) -> impl FnMut(&'i str) -> PResult<'i, O>
where
    P: Parser<&'i str, Output = O, Error = GrammarError<'i>>,
{
    move |input: &'i str| {
        parser
            .parse(input)
            .map_err(|e| e.map(|err| err.expecting(label)))
    }
}

/// A punctuation symbol, surrounded by optional whitespace.
fn sym<'i>(symbol: &'static str) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    expecting(symbol, ws(tag(symbol)))
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

fn keyword_tag<'i>(word: &'static str) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    move |input: &'i str| terminated(tag(word), not(satisfy(is_name_char))).parse(input)
}

/// A keyword, matched only at a name boundary.
fn kw<'i>(word: &'static str) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    expecting(word, ws(keyword_tag(word)))
}

/// An operand that must follow an already committed operator or keyword.
fn required<'i, P>(mut parser: P) -> impl FnMut(&'i str) -> PResult<'i, ParseNode<'i>>
where
    P: Parser<&'i str, Output = ParseNode<'i>, Error = GrammarError<'i>>,
{
    move |input: &'i str| match parser.parse(input) {
        Err(nom::Err::Error(mut err)) | Err(nom::Err::Failure(mut err)) => {
            if err.input.len() == input.trim_start().len() {
                err.expected = vec!["an expression"];
            }
            Err(nom::Err::Failure(err))
        }
        other => other,
    }
}

fn ncname(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char))).parse(input)
}

fn eq_name(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let uri_qualified = recognize((
        tag("Q{"),
        take_while(|c| c != '{' && c != '}'),
        char('}'),
        ncname,
    ));
    let prefixed = recognize(pair(ncname, opt(pair(char(':'), ncname))));
    let (rest, text) = expecting("a name", alt((uri_qualified, prefixed))).parse(input)?;
    Ok((rest, ParseNode::new(Rule::EQName, text, Vec::new())))
}

/// Names that can never be function names.
const RESERVED_FUNCTION_NAMES: &[&str] = &[
    "array",
    "assembly",
    "attribute",
    "comment",
    "document-node",
    "element",
    "empty-sequence",
    "field",
    "flag",
    "function",
    "if",
    "item",
    "map",
    "namespace-node",
    "node",
    "processing-instruction",
    "schema-attribute",
    "schema-element",
    "switch",
    "text",
    "typeswitch",
];

/// Binary operator chain: `operand (operator operand)*`.
fn operator_chain<'i, O>(
    input: &'i str,
    rule: Rule,
    operand: fn(&'i str) -> PResult<'i, ParseNode<'i>>,
    operator: O,
) -> PResult<'i, ParseNode<'i>>
where
    O: Parser<&'i str, Output = &'i str, Error = GrammarError<'i>>,
{
    let start = input;
    let (input, first) = operand(input)?;
    let (input, rest) = many0(pair(operator, required(operand))).parse(input)?;

    let mut children = Vec::with_capacity(1 + rest.len() * 2);
    children.push(first);
    for (op, node) in rest {
        children.push(ParseNode::token(op));
        children.push(node);
    }
    Ok((input, ParseNode::new(rule, consumed(start, input), children)))
}

// --- expressions ---

fn expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, first) = expr_single(input)?;
    let (input, rest) = many0(preceded(sym(","), required(expr_single))).parse(input)?;

    let mut children = vec![first];
    children.extend(rest);
    Ok((input, ParseNode::new(Rule::Expr, consumed(start, input), children)))
}

fn expr_single(input: &str) -> PResult<'_, ParseNode<'_>> {
    alt((for_expr, let_expr, quantified_expr, if_expr, or_expr)).parse(input)
}

fn binding<'i>(
    assign: &'static str,
) -> impl FnMut(&'i str) -> PResult<'i, ParseNode<'i>> {
    move |input: &'i str| {
        let start = input;
        let (input, _) = sym("$").parse(input)?;
        let (input, name) = cut(eq_name).parse(input)?;
        let (input, _) = if assign == "in" {
            cut(kw("in")).parse(input)?
        } else {
            cut(sym(":=")).parse(input)?
        };
        let (input, value) = required(expr_single).parse(input)?;
        Ok((
            input,
            ParseNode::new(Rule::SimpleBinding, consumed(start, input), vec![name, value]),
        ))
    }
}

fn bindings<'i>(
    assign: &'static str,
) -> impl FnMut(&'i str) -> PResult<'i, Vec<ParseNode<'i>>> {
    move |input: &'i str| {
        let (input, first) = binding(assign).parse(input)?;
        let (input, rest) = many0(preceded(sym(","), cut(binding(assign)))).parse(input)?;
        let mut all = vec![first];
        all.extend(rest);
        Ok((input, all))
    }
}

fn for_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = terminated(kw("for"), peek(sym("$"))).parse(input)?;
    let (input, mut children) = cut(bindings("in")).parse(input)?;
    let (input, _) = cut(kw("return")).parse(input)?;
    let (input, body) = required(expr_single).parse(input)?;
    children.push(body);
    Ok((input, ParseNode::new(Rule::ForExpr, consumed(start, input), children)))
}

fn let_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = terminated(kw("let"), peek(sym("$"))).parse(input)?;
    let (input, mut children) = cut(bindings(":=")).parse(input)?;
    let (input, _) = cut(kw("return")).parse(input)?;
    let (input, body) = required(expr_single).parse(input)?;
    children.push(body);
    Ok((input, ParseNode::new(Rule::LetExpr, consumed(start, input), children)))
}

fn quantified_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, quantifier) =
        terminated(alt((kw("some"), kw("every"))), peek(sym("$"))).parse(input)?;
    let (input, bound) = cut(bindings("in")).parse(input)?;
    let (input, _) = cut(kw("satisfies")).parse(input)?;
    let (input, satisfies) = required(expr_single).parse(input)?;

    let mut children = vec![ParseNode::token(quantifier)];
    children.extend(bound);
    children.push(satisfies);
    Ok((
        input,
        ParseNode::new(Rule::QuantifiedExpr, consumed(start, input), children),
    ))
}

fn if_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = terminated(kw("if"), peek(sym("("))).parse(input)?;
    let (input, _) = cut(sym("(")).parse(input)?;
    let (input, condition) = required(expr).parse(input)?;
    let (input, _) = cut(sym(")")).parse(input)?;
    let (input, _) = cut(kw("then")).parse(input)?;
    let (input, then_branch) = required(expr_single).parse(input)?;
    let (input, _) = cut(kw("else")).parse(input)?;
    let (input, else_branch) = required(expr_single).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::IfExpr,
            consumed(start, input),
            vec![condition, then_branch, else_branch],
        ),
    ))
}

fn or_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(input, Rule::OrExpr, and_expr, kw("or"))
}

fn and_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(input, Rule::AndExpr, comparison_expr, kw("and"))
}

fn comparison_operator(input: &str) -> PResult<'_, &str> {
    expecting(
        "a comparison operator",
        ws(alt((
            keyword_tag("eq"),
            keyword_tag("ne"),
            keyword_tag("lt"),
            keyword_tag("le"),
            keyword_tag("gt"),
            keyword_tag("ge"),
            keyword_tag("is"),
            tag("<<"),
            tag(">>"),
            tag("!="),
            tag("<="),
            tag(">="),
            terminated(tag("="), not(char('>'))),
            tag("<"),
            tag(">"),
        ))),
    )
    .parse(input)
}

fn comparison_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, left) = string_concat_expr(input)?;
    let (input, rest) = opt(pair(comparison_operator, required(string_concat_expr))).parse(input)?;

    let mut children = vec![left];
    if let Some((op, right)) = rest {
        children.push(ParseNode::token(op));
        children.push(right);
    }
    Ok((
        input,
        ParseNode::new(Rule::ComparisonExpr, consumed(start, input), children),
    ))
}

fn string_concat_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(input, Rule::StringConcatExpr, range_expr, sym("||"))
}

fn range_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, low) = additive_expr(input)?;
    let (input, high) = opt(preceded(kw("to"), required(additive_expr))).parse(input)?;

    let mut children = vec![low];
    children.extend(high);
    Ok((
        input,
        ParseNode::new(Rule::RangeExpr, consumed(start, input), children),
    ))
}

fn additive_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(
        input,
        Rule::AdditiveExpr,
        multiplicative_expr,
        ws(alt((tag("+"), tag("-")))),
    )
}

fn multiplicative_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(
        input,
        Rule::MultiplicativeExpr,
        union_expr,
        ws(alt((
            tag("*"),
            keyword_tag("div"),
            keyword_tag("idiv"),
            keyword_tag("mod"),
        ))),
    )
}

fn union_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(
        input,
        Rule::UnionExpr,
        intersect_except_expr,
        ws(alt((
            keyword_tag("union"),
            terminated(tag("|"), not(char('|'))),
        ))),
    )
}

fn intersect_except_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(
        input,
        Rule::IntersectExceptExpr,
        instanceof_expr,
        ws(alt((keyword_tag("intersect"), keyword_tag("except")))),
    )
}

fn instanceof_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, operand) = treat_expr(input)?;
    let (input, ty) = opt(preceded(
        kw("instance"),
        cut(preceded(kw("of"), sequence_type)),
    ))
    .parse(input)?;

    let mut children = vec![operand];
    children.extend(ty);
    Ok((
        input,
        ParseNode::new(Rule::InstanceofExpr, consumed(start, input), children),
    ))
}

fn treat_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, operand) = castable_expr(input)?;
    let (input, ty) =
        opt(preceded(kw("treat"), cut(preceded(kw("as"), sequence_type)))).parse(input)?;

    let mut children = vec![operand];
    children.extend(ty);
    Ok((
        input,
        ParseNode::new(Rule::TreatExpr, consumed(start, input), children),
    ))
}

fn castable_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, operand) = cast_expr(input)?;
    let (input, ty) =
        opt(preceded(kw("castable"), cut(preceded(kw("as"), single_type)))).parse(input)?;

    let mut children = vec![operand];
    children.extend(ty);
    Ok((
        input,
        ParseNode::new(Rule::CastableExpr, consumed(start, input), children),
    ))
}

fn cast_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, operand) = arrow_expr(input)?;
    let (input, ty) =
        opt(preceded(kw("cast"), cut(preceded(kw("as"), single_type)))).parse(input)?;

    let mut children = vec![operand];
    children.extend(ty);
    Ok((
        input,
        ParseNode::new(Rule::CastExpr, consumed(start, input), children),
    ))
}

fn arrow_target(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, target) = expecting(
        "a function name",
        alt((eq_name, var_ref, parenthesized_expr)),
    )
    .parse(input)?;
    let (input, args) = cut(argument_list).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::ArrowTarget, consumed(start, input), vec![target, args]),
    ))
}

fn arrow_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, operand) = unary_expr(input)?;
    let (input, targets) = many0(preceded(sym("=>"), cut(arrow_target))).parse(input)?;

    let mut children = vec![operand];
    children.extend(targets);
    Ok((
        input,
        ParseNode::new(Rule::ArrowExpr, consumed(start, input), children),
    ))
}

fn unary_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, signs) = many0(ws(alt((tag("-"), tag("+"))))).parse(input)?;
    let (input, operand) = if signs.is_empty() {
        simple_map_expr(input)?
    } else {
        required(simple_map_expr).parse(input)?
    };

    let mut children: Vec<ParseNode<'_>> = signs.into_iter().map(ParseNode::token).collect();
    children.push(operand);
    Ok((
        input,
        ParseNode::new(Rule::UnaryExpr, consumed(start, input), children),
    ))
}

fn simple_map_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    operator_chain(
        input,
        Rule::SimpleMapExpr,
        path_expr,
        ws(terminated(tag("!"), not(char('=')))),
    )
}

// --- paths and steps ---

fn path_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, leading) = opt(ws(alt((tag("//"), tag("/"))))).parse(input)?;
    let (input, children) = match leading {
        Some(slashes) if slashes == "//" => {
            let (input, relative) =
                expecting("a step", cut(relative_path_expr)).parse(input)?;
            (input, vec![ParseNode::token(slashes), relative])
        }
        Some(slash) => {
            let (input, relative) = opt(relative_path_expr).parse(input)?;
            let mut children = vec![ParseNode::token(slash)];
            children.extend(relative);
            (input, children)
        }
        None => {
            let (input, relative) = relative_path_expr(input)?;
            (input, vec![relative])
        }
    };
    Ok((
        input,
        ParseNode::new(Rule::PathExpr, consumed(start, input), children),
    ))
}

fn relative_path_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, first) = step_expr(input)?;
    let (input, rest) = many0(pair(
        ws(alt((tag("//"), tag("/")))),
        expecting("a step", cut(step_expr)),
    ))
    .parse(input)?;

    let mut children = vec![first];
    for (separator, step) in rest {
        children.push(ParseNode::token(separator));
        children.push(step);
    }
    Ok((
        input,
        ParseNode::new(Rule::RelativePathExpr, consumed(start, input), children),
    ))
}

fn step_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    alt((postfix_expr, axis_step)).parse(input)
}

fn axis_step(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, step) = alt((reverse_step, forward_step)).parse(input)?;
    let (input, predicates) = many0(predicate).parse(input)?;

    let mut children = vec![step];
    children.extend(predicates);
    Ok((
        input,
        ParseNode::new(Rule::AxisStep, consumed(start, input), children),
    ))
}

fn axis_name<'i>(
    names: &'static [&'static str],
) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    move |input: &'i str| {
        let (rest, name) = ws(ncname).parse(input)?;
        if !names.contains(&name) {
            return Err(nom::Err::Error(GrammarError::from_error_kind(
                input,
                ErrorKind::Tag,
            )));
        }
        let (rest, _) = sym("::").parse(rest)?;
        Ok((rest, name))
    }
}

const FORWARD_AXES: &[&str] = &[
    "child",
    "descendant",
    "attribute",
    "self",
    "descendant-or-self",
    "following-sibling",
    "following",
];

const REVERSE_AXES: &[&str] = &[
    "parent",
    "ancestor",
    "ancestor-or-self",
    "preceding-sibling",
    "preceding",
];

fn reverse_step(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    if let Ok((input, axis)) = axis_name(REVERSE_AXES).parse(input) {
        let (input, test) = expecting("a node test", cut(node_test)).parse(input)?;
        return Ok((
            input,
            ParseNode::new(
                Rule::ReverseStep,
                consumed(start, input),
                vec![ParseNode::token(axis), test],
            ),
        ));
    }
    let (input, dots) = ws(tag("..")).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::ReverseStep,
            consumed(start, input),
            vec![ParseNode::token(dots)],
        ),
    ))
}

fn forward_step(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    if let Ok((input, axis)) = axis_name(FORWARD_AXES).parse(input) {
        let (input, test) = expecting("a node test", cut(node_test)).parse(input)?;
        return Ok((
            input,
            ParseNode::new(
                Rule::ForwardStep,
                consumed(start, input),
                vec![ParseNode::token(axis), test],
            ),
        ));
    }
    if let Ok((input, at)) = ws(tag("@")).parse(input) {
        let (input, test) = expecting("a node test", cut(node_test)).parse(input)?;
        return Ok((
            input,
            ParseNode::new(
                Rule::ForwardStep,
                consumed(start, input),
                vec![ParseNode::token(at), test],
            ),
        ));
    }
    let (input, test) = node_test(input)?;
    Ok((
        input,
        ParseNode::new(Rule::ForwardStep, consumed(start, input), vec![test]),
    ))
}

fn node_test(input: &str) -> PResult<'_, ParseNode<'_>> {
    alt((kind_test, name_test)).parse(input)
}

fn name_test(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    if let Ok((rest, text)) = alt((
        recognize(pair(tag("*:"), ncname)),
        recognize(pair(ncname, tag(":*"))),
        tag("*"),
    ))
    .parse(input)
    {
        return Ok((rest, ParseNode::new(Rule::NameTest, text, Vec::new())));
    }
    let (input, name) = expecting("a node test", eq_name).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::NameTest, consumed(start, input), vec![name]),
    ))
}

fn kind_test(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, kind) = terminated(
        alt((
            kw("document-node"),
            kw("node"),
            kw("assembly"),
            kw("field"),
            kw("flag"),
            kw("element"),
            kw("attribute"),
        )),
        sym("("),
    )
    .parse(input)?;

    let mut children = vec![ParseNode::token(kind)];
    let takes_name = !matches!(kind, "node" | "document-node");
    let input = if takes_name {
        let (input, name) = opt(alt((eq_name, star_token))).parse(input)?;
        children.extend(name);
        input
    } else {
        input
    };
    let (input, _) = cut(sym(")")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::KindTest, consumed(start, input), children),
    ))
}

// --- postfix and primary expressions ---

fn postfix_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, primary) = primary_expr(input)?;
    let (input, postfixes) = many0(alt((predicate, argument_list, lookup))).parse(input)?;

    let mut children = vec![primary];
    children.extend(postfixes);
    Ok((
        input,
        ParseNode::new(Rule::PostfixExpr, consumed(start, input), children),
    ))
}

fn predicate(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = sym("[").parse(input)?;
    let (input, body) = required(expr).parse(input)?;
    let (input, _) = cut(sym("]")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::Predicate, consumed(start, input), vec![body]),
    ))
}

fn argument_list(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = sym("(").parse(input)?;
    let (input, first) = opt(expr_single).parse(input)?;
    let mut children = Vec::new();
    let input = match first {
        Some(first) => {
            let (input, rest) = many0(preceded(sym(","), required(expr_single))).parse(input)?;
            children.push(first);
            children.extend(rest);
            input
        }
        None => input,
    };
    let (input, _) = cut(sym(")")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::ArgumentList, consumed(start, input), children),
    ))
}

fn star_token(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (rest, star) = ws(tag("*")).parse(input)?;
    Ok((rest, ParseNode::token(star)))
}

fn key_name(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (rest, name) = ncname(input)?;
    Ok((rest, ParseNode::token(name)))
}

fn key_integer(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (rest, digits) = digit1(input)?;
    Ok((rest, ParseNode::new(Rule::IntegerLiteral, digits, Vec::new())))
}

fn key_specifier(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, key) = expecting(
        "a key specifier",
        alt((key_name, key_integer, star_token, parenthesized_expr)),
    )
    .parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::KeySpecifier, consumed(start, input), vec![key]),
    ))
}

fn lookup(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = sym("?").parse(input)?;
    let (input, key) = cut(key_specifier).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::Lookup, consumed(start, input), vec![key]),
    ))
}

fn unary_lookup(input: &str) -> PResult<'_, ParseNode<'_>> {
    let start = input;
    let (input, _) = sym("?").parse(input)?;
    let (input, key) = cut(key_specifier).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::UnaryLookup, consumed(start, input), vec![key]),
    ))
}

fn primary_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    alt((
        numeric_literal,
        string_literal,
        var_ref,
        parenthesized_expr,
        context_item_expr,
        inline_function_expr,
        map_constructor,
        curly_array_constructor,
        square_array_constructor,
        unary_lookup,
        named_function_ref,
        function_call,
    ))
    .parse(input)
}

fn numeric_literal(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = recognize((one_of("eE"), opt(one_of("+-")), digit1));
    let (rest, (_, exponent)) = pair(mantissa, opt(exponent)).parse(input)?;
    let (rest, _) = not(satisfy(is_name_start)).parse(rest)?;

    let text = consumed(input, rest);
    let rule = if exponent.is_some() {
        Rule::DoubleLiteral
    } else if text.contains('.') {
        Rule::DecimalLiteral
    } else {
        Rule::IntegerLiteral
    };
    Ok((rest, ParseNode::new(rule, text, Vec::new())))
}

fn quoted_content<'i>(quote: char) -> impl FnMut(&'i str) -> PResult<'i, &'i str> {
    move |input: &'i str| {
        let doubled: &'static str = if quote == '"' { "\"\"" } else { "''" };
        recognize((
            char(quote),
            many0(alt((tag(doubled), take_while1(move |c| c != quote)))),
            expecting("a closing quote", cut(char(quote))),
        ))
        .parse(input)
    }
}

fn string_literal(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let (rest, text) = alt((quoted_content('"'), quoted_content('\''))).parse(input)?;
    Ok((rest, ParseNode::new(Rule::StringLiteral, text, Vec::new())))
}

fn var_ref(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = sym("$").parse(input)?;
    let (input, name) = expecting("a variable name", cut(eq_name)).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::VarRef, consumed(start, input), vec![name]),
    ))
}

fn parenthesized_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = sym("(").parse(input)?;
    let (input, inner) = opt(expr).parse(input)?;
    let (input, _) = cut(sym(")")).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::ParenthesizedExpr,
            consumed(start, input),
            inner.into_iter().collect(),
        ),
    ))
}

fn context_item_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let (rest, dot) = terminated(
        tag("."),
        not(satisfy(|c: char| c == '.' || c.is_ascii_digit())),
    )
    .parse(input)?;
    Ok((rest, ParseNode::new(Rule::ContextItemExpr, dot, Vec::new())))
}

fn param(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = sym("$").parse(input)?;
    let (input, name) = cut(eq_name).parse(input)?;
    let (input, ty) = opt(preceded(kw("as"), cut(sequence_type))).parse(input)?;

    let mut children = vec![name];
    children.extend(ty);
    Ok((
        input,
        ParseNode::new(Rule::Param, consumed(start, input), children),
    ))
}

fn inline_function_expr(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = terminated(kw("function"), sym("(")).parse(input)?;

    let (input, first) = opt(param).parse(input)?;
    let mut children = Vec::new();
    let input = match first {
        Some(first) => {
            let (input, rest) = many0(preceded(sym(","), cut(param))).parse(input)?;
            children.push(first);
            children.extend(rest);
            input
        }
        None => input,
    };
    let (input, _) = cut(sym(")")).parse(input)?;
    let (input, return_type) = opt(preceded(kw("as"), cut(sequence_type))).parse(input)?;
    children.extend(return_type);
    let (input, _) = cut(sym("{")).parse(input)?;
    let (input, body) = opt(expr).parse(input)?;
    children.extend(body);
    let (input, _) = cut(sym("}")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::InlineFunctionExpr, consumed(start, input), children),
    ))
}

fn map_constructor_entry(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, key) = expr_single(input)?;
    let (input, _) = cut(sym(":")).parse(input)?;
    let (input, value) = required(expr_single).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::MapConstructorEntry,
            consumed(start, input),
            vec![key, value],
        ),
    ))
}

fn map_constructor(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = terminated(kw("map"), sym("{")).parse(input)?;
    let (input, first) = opt(map_constructor_entry).parse(input)?;
    let mut children = Vec::new();
    let input = match first {
        Some(first) => {
            let (input, rest) =
                many0(preceded(sym(","), cut(map_constructor_entry))).parse(input)?;
            children.push(first);
            children.extend(rest);
            input
        }
        None => input,
    };
    let (input, _) = cut(sym("}")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::MapConstructor, consumed(start, input), children),
    ))
}

fn square_array_constructor(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = sym("[").parse(input)?;
    let (input, first) = opt(expr_single).parse(input)?;
    let mut children = Vec::new();
    let input = match first {
        Some(first) => {
            let (input, rest) = many0(preceded(sym(","), required(expr_single))).parse(input)?;
            children.push(first);
            children.extend(rest);
            input
        }
        None => input,
    };
    let (input, _) = cut(sym("]")).parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::SquareArrayConstructor, consumed(start, input), children),
    ))
}

fn curly_array_constructor(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, _) = terminated(kw("array"), sym("{")).parse(input)?;
    let (input, body) = opt(expr).parse(input)?;
    let (input, _) = cut(sym("}")).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::CurlyArrayConstructor,
            consumed(start, input),
            body.into_iter().collect(),
        ),
    ))
}

fn named_function_ref(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, name) = eq_name(input)?;
    let (input, _) = tag("#").parse(input)?;
    let (input, arity) = expecting("an arity", cut(digit1)).parse(input)?;
    Ok((
        input,
        ParseNode::new(
            Rule::NamedFunctionRef,
            consumed(start, input),
            vec![name, ParseNode::new(Rule::IntegerLiteral, arity, Vec::new())],
        ),
    ))
}

fn function_call(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (after_name, name) = eq_name(input)?;
    if RESERVED_FUNCTION_NAMES.contains(&name.text()) {
        return Err(nom::Err::Error(GrammarError::from_error_kind(
            input,
            ErrorKind::Verify,
        )));
    }
    let (input, args) = argument_list(after_name)?;
    Ok((
        input,
        ParseNode::new(Rule::FunctionCall, consumed(start, input), vec![name, args]),
    ))
}

// --- types ---

fn occurrence_indicator(input: &str) -> PResult<'_, &str> {
    ws(alt((tag("?"), tag("*"), tag("+")))).parse(input)
}

/// `item()`, `map(*)`, `array(*)` and `function(*)`.
fn generic_item_type<'i>(
    word: &'static str,
    wildcard: bool,
) -> impl FnMut(&'i str) -> PResult<'i, ParseNode<'i>> {
    move |input: &'i str| {
        let (input, keyword) = terminated(kw(word), sym("(")).parse(input)?;
        let input = if wildcard {
            cut(sym("*")).parse(input)?.0
        } else {
            input
        };
        let (input, _) = cut(sym(")")).parse(input)?;
        Ok((input, ParseNode::token(keyword)))
    }
}

fn item_type(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, inner) = expecting(
        "a type",
        alt((
            kind_test,
            generic_item_type("item", false),
            generic_item_type("map", true),
            generic_item_type("array", true),
            generic_item_type("function", true),
            eq_name,
        )),
    )
    .parse(input)?;
    Ok((
        input,
        ParseNode::new(Rule::ItemType, consumed(start, input), vec![inner]),
    ))
}

fn sequence_type(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    if let Ok((input, keyword)) =
        terminated(kw("empty-sequence"), pair(sym("("), sym(")"))).parse(input)
    {
        return Ok((
            input,
            ParseNode::new(
                Rule::SequenceType,
                consumed(start, input),
                vec![ParseNode::token(keyword)],
            ),
        ));
    }
    let (input, item) = item_type(input)?;
    let (input, occurrence) = opt(occurrence_indicator).parse(input)?;

    let mut children = vec![item];
    children.extend(occurrence.map(ParseNode::token));
    Ok((
        input,
        ParseNode::new(Rule::SequenceType, consumed(start, input), children),
    ))
}

fn single_type(input: &str) -> PResult<'_, ParseNode<'_>> {
    let (input, _) = skip_ws(input)?;
    let start = input;
    let (input, name) = expecting("a type name", eq_name).parse(input)?;
    let (input, optional) = opt(ws(tag("?"))).parse(input)?;

    let mut children = vec![name];
    children.extend(optional.map(ParseNode::token));
    Ok((
        input,
        ParseNode::new(Rule::SingleType, consumed(start, input), children),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(node: &ParseNode<'_>, out: &mut Vec<Rule>) {
        out.push(node.rule());
        for child in node.children() {
            rules(child, out);
        }
    }

    fn contains_rule(text: &str, rule: Rule) -> bool {
        let tree = parse(text).unwrap();
        let mut all = Vec::new();
        rules(tree.root(), &mut all);
        all.contains(&rule)
    }

    #[test]
    fn test_parses_precedence_ladder() {
        let tree = parse("1 + 2 * 3").unwrap();
        assert_eq!(tree.root().rule(), Rule::Expr);
        assert!(contains_rule("1 + 2 * 3", Rule::MultiplicativeExpr));
        assert!(contains_rule("1 + 2 * 3", Rule::AdditiveExpr));
    }

    #[test]
    fn test_accepts_representative_expressions() {
        for text in [
            "/root/field1",
            "//field2/@flag",
            "../field2",
            "parent::root",
            "child::*[2]",
            "ancestor-or-self::node()",
            "for $x in 1 to 3 return $x * 2",
            "let $a := 1, $b := 2 return $a + $b",
            "some $x in (1, 2) satisfies $x = 2",
            "if (true()) then 'a' else 'b'",
            "map { 'a' : 1, 'b' : 2 }?a",
            "[1, 2, 3]?2",
            "array { 1, 2 }",
            "function($x as integer) as integer { $x + 1 }(2)",
            "count#1",
            "'abc' => upper-case()",
            "(1, 2) ! (. * 2)",
            "$x instance of integer+",
            "'1' cast as integer?",
            "'1' castable as decimal",
            "$x treat as item()*",
            "a union b | c intersect d except e",
            "1 eq 1 and 2 ne 3 or 4 lt 5",
            "$a is $b",
            "$a << $b",
            "'a' || 'b'",
            "-+-1",
            "field(name)",
            "flag(*)",
            "(: comment (: nested :) :) 1",
            "'it''s'",
            "1.5e3",
            ".5",
            "Q{http://example.com}local",
            "div div div",
            "()",
        ] {
            assert!(parse(text).is_ok(), "failed to parse {}", text);
        }
    }

    #[test]
    fn test_incomplete_expression_is_syntax_error() {
        let err = parse("@flag +").unwrap_err();
        match err {
            MetapathError::SyntaxError {
                position, found, ..
            } => {
                assert_eq!(position, 7);
                assert_eq!(found, "end of input");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = parse("1 2").unwrap_err();
        assert!(matches!(
            err,
            MetapathError::SyntaxError { position: 2, .. }
        ));
    }

    #[test]
    fn test_unterminated_constructs() {
        for text in ["(1, 2", "'abc", "a[1", "f(1,", "map { 'a' : }", "(: open"] {
            assert!(
                matches!(parse(text), Err(MetapathError::SyntaxError { .. })),
                "expected failure for {}",
                text
            );
        }
    }

    #[test]
    fn test_keywords_need_boundaries() {
        assert!(contains_rule("android", Rule::NameTest));
        assert!(matches!(
            parse("$x andy"),
            Err(MetapathError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_wildcard_versus_multiplication() {
        let tree = parse("* * *").unwrap();
        let mut all = Vec::new();
        rules(tree.root(), &mut all);
        assert_eq!(all.iter().filter(|r| **r == Rule::NameTest).count(), 2);
    }

    #[test]
    fn test_span_of_nodes() {
        let tree = parse("  1 + 23").unwrap();
        let span = tree.span(tree.root());
        assert_eq!(span.start, 2);
        assert_eq!(span.end, 8);
    }
}
