//! Lowers a [`ParseTree`] into an [`Expr`].
//!
//! Precedence wrappers with a single child collapse into that child; operator
//! chains fold to the left, one binary node per operator. The transform is
//! pure: the same tree always yields an equal AST.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::ast::*;
use crate::error::MetapathError;
use crate::parse_tree::{ParseNode, ParseTree, Rule};

pub fn build(tree: &ParseTree<'_>) -> Result<Expr, MetapathError> {
    let expr = AstBuilder { tree }.build(tree.root())?;
    log::trace!("built AST {}", expr);
    Ok(expr)
}

struct AstBuilder<'a, 'i> {
    tree: &'a ParseTree<'i>,
}

impl<'a, 'i> AstBuilder<'a, 'i> {
    fn malformed(&self, node: &ParseNode<'i>, expected: &str) -> MetapathError {
        MetapathError::syntax(self.tree.span(node).start, expected, node.text())
    }

    fn child<'n>(&self, node: &'n ParseNode<'i>, index: usize) -> Result<&'n ParseNode<'i>, MetapathError> {
        node.child(index)
            .ok_or_else(|| self.malformed(node, "a complete expression"))
    }

    fn build_all(&self, nodes: &[ParseNode<'i>]) -> Result<Vec<Expr>, MetapathError> {
        nodes.iter().map(|n| self.build(n)).collect()
    }

    fn build(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        match node.rule() {
            Rule::Expr => {
                let mut items = self.build_all(node.children())?;
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Ok(Expr::Sequence(items))
                }
            }
            Rule::ForExpr => {
                let (bindings, body) = self.bindings(node)?;
                Ok(Expr::For {
                    bindings,
                    body: Box::new(body),
                })
            }
            Rule::LetExpr => {
                let (bindings, body) = self.bindings(node)?;
                Ok(Expr::Let {
                    bindings,
                    body: Box::new(body),
                })
            }
            Rule::QuantifiedExpr => {
                let quantifier = if self.child(node, 0)?.is_token("every") {
                    Quantifier::Every
                } else {
                    Quantifier::Some
                };
                let (bindings, satisfies) = self.bindings(node)?;
                Ok(Expr::Quantified {
                    quantifier,
                    bindings,
                    satisfies: Box::new(satisfies),
                })
            }
            Rule::IfExpr => Ok(Expr::If {
                condition: Box::new(self.build(self.child(node, 0)?)?),
                then_branch: Box::new(self.build(self.child(node, 1)?)?),
                else_branch: Box::new(self.build(self.child(node, 2)?)?),
            }),
            Rule::OrExpr
            | Rule::AndExpr
            | Rule::StringConcatExpr
            | Rule::AdditiveExpr
            | Rule::MultiplicativeExpr
            | Rule::UnionExpr
            | Rule::IntersectExceptExpr
            | Rule::SimpleMapExpr => self.fold_chain(node),
            Rule::ComparisonExpr => self.comparison(node),
            Rule::RangeExpr => match node.children() {
                [single] => self.build(single),
                [low, high] => Ok(Expr::Range(
                    Box::new(self.build(low)?),
                    Box::new(self.build(high)?),
                )),
                _ => Err(self.malformed(node, "a range")),
            },
            Rule::InstanceofExpr | Rule::TreatExpr => match node.children() {
                [single] => self.build(single),
                [operand, ty] => {
                    let expr = Box::new(self.build(operand)?);
                    let ty = self.sequence_type(ty)?;
                    Ok(if node.rule() == Rule::InstanceofExpr {
                        Expr::InstanceOf { expr, ty }
                    } else {
                        Expr::Treat { expr, ty }
                    })
                }
                _ => Err(self.malformed(node, "a sequence type")),
            },
            Rule::CastableExpr | Rule::CastExpr => match node.children() {
                [single] => self.build(single),
                [operand, ty] => {
                    let expr = Box::new(self.build(operand)?);
                    let ty = self.single_type(ty)?;
                    Ok(if node.rule() == Rule::CastableExpr {
                        Expr::Castable { expr, ty }
                    } else {
                        Expr::Cast { expr, ty }
                    })
                }
                _ => Err(self.malformed(node, "a type name")),
            },
            Rule::ArrowExpr => self.arrow(node),
            Rule::UnaryExpr => self.unary(node),
            Rule::PathExpr => self.path(node),
            Rule::RelativePathExpr => {
                let mut steps = self.relative_steps(node)?;
                if steps.len() == 1 {
                    Ok(steps.remove(0))
                } else {
                    Ok(Expr::Path {
                        absolute: false,
                        steps,
                    })
                }
            }
            Rule::AxisStep => Ok(Expr::Step(self.axis_step(node)?)),
            Rule::PostfixExpr => self.postfix(node),
            Rule::IntegerLiteral => Ok(Expr::integer(self.integer(node)?)),
            Rule::DecimalLiteral => Ok(Expr::decimal(self.decimal(node)?)),
            Rule::DoubleLiteral => Ok(Expr::decimal(self.double(node)?)),
            Rule::StringLiteral => Ok(Expr::string(unquote(node.text()))),
            Rule::VarRef => Ok(Expr::VariableRef(self.eq_name(self.child(node, 0)?))),
            Rule::ParenthesizedExpr => match node.child(0) {
                Some(inner) => self.build(inner),
                None => Ok(Expr::empty()),
            },
            Rule::ContextItemExpr => Ok(Expr::ContextItem),
            Rule::FunctionCall => Ok(Expr::FunctionCall {
                name: self.eq_name(self.child(node, 0)?),
                args: self.build_all(self.child(node, 1)?.children())?,
            }),
            Rule::NamedFunctionRef => {
                let arity_node = self.child(node, 1)?;
                let arity = arity_node
                    .text()
                    .parse::<usize>()
                    .map_err(|_| self.malformed(arity_node, "an arity"))?;
                Ok(Expr::NamedFunctionRef {
                    name: self.eq_name(self.child(node, 0)?),
                    arity,
                })
            }
            Rule::InlineFunctionExpr => self.inline_function(node),
            Rule::MapConstructor => {
                let entries = node
                    .children()
                    .iter()
                    .map(|entry| {
                        Ok((
                            self.build(self.child(entry, 0)?)?,
                            self.build(self.child(entry, 1)?)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, MetapathError>>()?;
                Ok(Expr::MapConstructor(entries))
            }
            Rule::SquareArrayConstructor => Ok(Expr::ArrayConstructor(ArrayConstructor::Square(
                self.build_all(node.children())?,
            ))),
            Rule::CurlyArrayConstructor => {
                let body = match node.child(0) {
                    Some(body) => Some(Box::new(self.build(body)?)),
                    None => None,
                };
                Ok(Expr::ArrayConstructor(ArrayConstructor::Curly(body)))
            }
            Rule::UnaryLookup => Ok(Expr::UnaryLookup(
                self.key_specifier(self.child(node, 0)?)?,
            )),
            _ => Err(self.malformed(node, "an expression")),
        }
    }

    fn eq_name(&self, node: &ParseNode<'i>) -> EQName {
        EQName::parse(node.text())
    }

    fn bindings(
        &self,
        node: &ParseNode<'i>,
    ) -> Result<(Vec<(EQName, Expr)>, Expr), MetapathError> {
        let bindings = node
            .children_of(Rule::SimpleBinding)
            .map(|binding| {
                Ok((
                    self.eq_name(self.child(binding, 0)?),
                    self.build(self.child(binding, 1)?)?,
                ))
            })
            .collect::<Result<Vec<_>, MetapathError>>()?;
        let body = node
            .children()
            .last()
            .ok_or_else(|| self.malformed(node, "a return clause"))?;
        Ok((bindings, self.build(body)?))
    }

    fn fold_chain(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let children = node.children();
        let first = children
            .first()
            .ok_or_else(|| self.malformed(node, "an operand"))?;
        let mut expr = self.build(first)?;
        for pair in children[1..].chunks(2) {
            let [op, operand] = pair else {
                return Err(self.malformed(node, "an operand"));
            };
            let right = self.build(operand)?;
            expr = binary(op.text(), expr, right).ok_or_else(|| self.malformed(op, "an operator"))?;
        }
        Ok(expr)
    }

    fn comparison(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let [left, op, right] = node.children() else {
            return match node.children() {
                [single] => self.build(single),
                _ => Err(self.malformed(node, "a comparison")),
            };
        };
        let left = Box::new(self.build(left)?);
        let right = Box::new(self.build(right)?);
        if let Some(op) = node_comparison_op(op.text()) {
            return Ok(Expr::NodeComparison { op, left, right });
        }
        match comparison_op(op.text()) {
            Some((op, true)) => Ok(Expr::ValueComparison { op, left, right }),
            Some((op, false)) => Ok(Expr::GeneralComparison { op, left, right }),
            None => Err(self.malformed(op, "a comparison operator")),
        }
    }

    fn arrow(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let mut expr = self.build(self.child(node, 0)?)?;
        for target in &node.children()[1..] {
            let callee = self.child(target, 0)?;
            let mut args = vec![expr];
            args.extend(self.build_all(self.child(target, 1)?.children())?);
            expr = match callee.rule() {
                Rule::EQName => Expr::FunctionCall {
                    name: self.eq_name(callee),
                    args,
                },
                _ => Expr::DynamicCall {
                    function: Box::new(self.build(callee)?),
                    args,
                },
            };
        }
        Ok(expr)
    }

    fn unary(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let children = node.children();
        let (operand, signs) = children
            .split_last()
            .ok_or_else(|| self.malformed(node, "an operand"))?;
        let operand = self.build(operand)?;
        if signs.is_empty() {
            return Ok(operand);
        }
        let negations = signs.iter().filter(|s| s.is_token("-")).count();
        Ok(Expr::Unary {
            negate: negations % 2 == 1,
            operand: Box::new(operand),
        })
    }

    fn path(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let children = node.children();
        match children {
            [slash, rest @ ..] if slash.is_token("/") => {
                let steps = match rest.first() {
                    Some(relative) => self.relative_steps(relative)?,
                    None => Vec::new(),
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            [slashes, relative] if slashes.is_token("//") => {
                let mut steps = vec![Expr::Step(Step::descendant_or_self_node())];
                steps.extend(self.relative_steps(relative)?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            [relative] => self.build(relative),
            _ => Err(self.malformed(node, "a path")),
        }
    }

    fn relative_steps(&self, node: &ParseNode<'i>) -> Result<Vec<Expr>, MetapathError> {
        let mut steps = Vec::new();
        for child in node.children() {
            if child.is_token("//") {
                steps.push(Expr::Step(Step::descendant_or_self_node()));
            } else if !child.is_token("/") {
                steps.push(self.build(child)?);
            }
        }
        Ok(steps)
    }

    fn axis_step(&self, node: &ParseNode<'i>) -> Result<Step, MetapathError> {
        let step = self.child(node, 0)?;
        let mut built = match step.children() {
            [dots] if dots.is_token("..") => {
                Step::new(Axis::Parent, NodeTest::Kind(KindTest::AnyNode))
            }
            [at, test] if at.is_token("@") => Step::new(Axis::Attribute, self.node_test(test)?),
            [axis, test] => {
                let axis = Axis::from_name(axis.text())
                    .ok_or_else(|| self.malformed(axis, "an axis"))?;
                Step::new(axis, self.node_test(test)?)
            }
            [test] => {
                let test = self.node_test(test)?;
                let axis = match test {
                    NodeTest::Kind(KindTest::Attribute(_) | KindTest::Flag(_)) => Axis::Attribute,
                    _ => Axis::Child,
                };
                Step::new(axis, test)
            }
            _ => return Err(self.malformed(step, "a step")),
        };
        for predicate in node.children_of(Rule::Predicate) {
            built.predicates.push(self.build(self.child(predicate, 0)?)?);
        }
        Ok(built)
    }

    fn node_test(&self, node: &ParseNode<'i>) -> Result<NodeTest, MetapathError> {
        match node.rule() {
            Rule::KindTest => Ok(NodeTest::Kind(self.kind_test(node)?)),
            Rule::NameTest => {
                if let Some(name) = node.child(0) {
                    return Ok(NodeTest::Name(NameTest::Name(self.eq_name(name))));
                }
                let text = node.text();
                let test = if text == "*" {
                    NameTest::Wildcard
                } else if let Some(local) = text.strip_prefix("*:") {
                    NameTest::LocalWildcard(local.to_string())
                } else if let Some(prefix) = text.strip_suffix(":*") {
                    NameTest::PrefixWildcard(prefix.to_string())
                } else {
                    return Err(self.malformed(node, "a name test"));
                };
                Ok(NodeTest::Name(test))
            }
            _ => Err(self.malformed(node, "a node test")),
        }
    }

    fn kind_test(&self, node: &ParseNode<'i>) -> Result<KindTest, MetapathError> {
        let kind = self.child(node, 0)?;
        let name = node
            .child(1)
            .filter(|n| n.rule() == Rule::EQName)
            .map(|n| self.eq_name(n));
        Ok(match kind.text() {
            "node" => KindTest::AnyNode,
            "document-node" => KindTest::Document,
            "element" => KindTest::Element(name),
            "attribute" => KindTest::Attribute(name),
            "assembly" => KindTest::Assembly(name),
            "field" => KindTest::Field(name),
            "flag" => KindTest::Flag(name),
            _ => return Err(self.malformed(kind, "a kind test")),
        })
    }

    fn postfix(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let children = node.children();
        let (primary, postfixes) = children
            .split_first()
            .ok_or_else(|| self.malformed(node, "a primary expression"))?;
        let mut expr = self.build(primary)?;
        let mut predicates = Vec::new();

        for postfix in postfixes {
            match postfix.rule() {
                Rule::Predicate => predicates.push(self.build(self.child(postfix, 0)?)?),
                Rule::ArgumentList => {
                    expr = with_predicates(expr, &mut predicates);
                    expr = Expr::DynamicCall {
                        function: Box::new(expr),
                        args: self.build_all(postfix.children())?,
                    };
                }
                Rule::Lookup => {
                    expr = with_predicates(expr, &mut predicates);
                    expr = Expr::Lookup {
                        base: Box::new(expr),
                        key: self.key_specifier(self.child(postfix, 0)?)?,
                    };
                }
                _ => return Err(self.malformed(postfix, "a predicate, argument list or lookup")),
            }
        }
        Ok(with_predicates(expr, &mut predicates))
    }

    fn key_specifier(&self, node: &ParseNode<'i>) -> Result<KeySpecifier, MetapathError> {
        let key = self.child(node, 0)?;
        match key.rule() {
            Rule::Token if key.text() == "*" => Ok(KeySpecifier::Wildcard),
            Rule::Token => Ok(KeySpecifier::Name(key.text().to_string())),
            Rule::IntegerLiteral => Ok(KeySpecifier::Integer(self.integer(key)?)),
            _ => Ok(KeySpecifier::Expr(Box::new(self.build(key)?))),
        }
    }

    fn inline_function(&self, node: &ParseNode<'i>) -> Result<Expr, MetapathError> {
        let mut params = Vec::new();
        let mut return_type = None;
        let mut body = None;
        for child in node.children() {
            match child.rule() {
                Rule::Param => params.push(Param {
                    name: self.eq_name(self.child(child, 0)?),
                    ty: match child.child(1) {
                        Some(ty) => Some(self.sequence_type(ty)?),
                        None => None,
                    },
                }),
                Rule::SequenceType => return_type = Some(self.sequence_type(child)?),
                _ => body = Some(self.build(child)?),
            }
        }
        Ok(Expr::InlineFunction(Arc::new(InlineFunction {
            params,
            return_type,
            body,
        })))
    }

    fn sequence_type(&self, node: &ParseNode<'i>) -> Result<SequenceType, MetapathError> {
        let first = self.child(node, 0)?;
        if first.is_token("empty-sequence") {
            return Ok(SequenceType::Empty);
        }
        let inner = self.child(first, 0)?;
        let item = match inner.rule() {
            Rule::KindTest => ItemType::Kind(self.kind_test(inner)?),
            Rule::EQName => ItemType::Atomic(self.eq_name(inner)),
            _ => match inner.text() {
                "item" => ItemType::Item,
                "map" => ItemType::AnyMap,
                "array" => ItemType::AnyArray,
                "function" => ItemType::AnyFunction,
                _ => return Err(self.malformed(inner, "an item type")),
            },
        };
        let occurrence = match node.child(1).map(|n| n.text()) {
            Some("?") => Occurrence::ZeroOrOne,
            Some("*") => Occurrence::ZeroOrMore,
            Some("+") => Occurrence::OneOrMore,
            _ => Occurrence::ExactlyOne,
        };
        Ok(SequenceType::Typed { item, occurrence })
    }

    fn single_type(&self, node: &ParseNode<'i>) -> Result<SingleType, MetapathError> {
        Ok(SingleType {
            name: self.eq_name(self.child(node, 0)?),
            optional: node.child(1).is_some(),
        })
    }

    fn integer(&self, node: &ParseNode<'i>) -> Result<i64, MetapathError> {
        node.text()
            .parse::<i64>()
            .map_err(|_| self.malformed(node, "an integer within the 64-bit range"))
    }

    fn decimal(&self, node: &ParseNode<'i>) -> Result<Decimal, MetapathError> {
        Decimal::from_str(&complete_mantissa(node.text()))
            .map_err(|_| self.malformed(node, "a representable decimal"))
    }

    fn double(&self, node: &ParseNode<'i>) -> Result<Decimal, MetapathError> {
        let text = node.text();
        let split = text
            .find(['e', 'E'])
            .ok_or_else(|| self.malformed(node, "an exponent"))?;
        let (mantissa, exponent) = text.split_at(split);
        Decimal::from_scientific(&format!("{}{}", complete_mantissa(mantissa), exponent))
            .map(|d| d.normalize())
            .map_err(|_| self.malformed(node, "a representable decimal"))
    }
}

/// `.5` and `1.` are accepted lexically; give both a digit on each side.
fn complete_mantissa(text: &str) -> String {
    let mut mantissa = text.to_string();
    if mantissa.starts_with('.') {
        mantissa.insert(0, '0');
    }
    if mantissa.ends_with('.') {
        mantissa.push('0');
    }
    mantissa
}

fn unquote(text: &str) -> String {
    let quote = &text[..1];
    let inner = &text[1..text.len() - 1];
    inner.replace(&format!("{quote}{quote}"), quote)
}

fn with_predicates(expr: Expr, predicates: &mut Vec<Expr>) -> Expr {
    if predicates.is_empty() {
        return expr;
    }
    Expr::Filter {
        base: Box::new(expr),
        predicates: std::mem::take(predicates),
    }
}

/// Comparison operator and whether it is a value comparison.
fn comparison_op(op: &str) -> Option<(ComparisonOp, bool)> {
    Some(match op {
        "=" => (ComparisonOp::Equal, false),
        "!=" => (ComparisonOp::NotEqual, false),
        "<" => (ComparisonOp::LessThan, false),
        "<=" => (ComparisonOp::LessOrEqual, false),
        ">" => (ComparisonOp::GreaterThan, false),
        ">=" => (ComparisonOp::GreaterOrEqual, false),
        "eq" => (ComparisonOp::Equal, true),
        "ne" => (ComparisonOp::NotEqual, true),
        "lt" => (ComparisonOp::LessThan, true),
        "le" => (ComparisonOp::LessOrEqual, true),
        "gt" => (ComparisonOp::GreaterThan, true),
        "ge" => (ComparisonOp::GreaterOrEqual, true),
        _ => return None,
    })
}

fn node_comparison_op(op: &str) -> Option<NodeComparisonOp> {
    match op {
        "is" => Some(NodeComparisonOp::Is),
        "<<" => Some(NodeComparisonOp::Precedes),
        ">>" => Some(NodeComparisonOp::Follows),
        _ => None,
    }
}

fn arithmetic_op(op: &str) -> Option<ArithmeticOp> {
    match op {
        "+" => Some(ArithmeticOp::Add),
        "-" => Some(ArithmeticOp::Subtract),
        "*" => Some(ArithmeticOp::Multiply),
        "div" => Some(ArithmeticOp::Divide),
        "idiv" => Some(ArithmeticOp::IntegerDivide),
        "mod" => Some(ArithmeticOp::Mod),
        _ => None,
    }
}

fn binary(op: &str, left: Expr, right: Expr) -> Option<Expr> {
    if let Some(op) = arithmetic_op(op) {
        return Some(Expr::arithmetic(left, op, right));
    }
    let (left, right) = (Box::new(left), Box::new(right));
    Some(match op {
        "or" => Expr::Or(left, right),
        "and" => Expr::And(left, right),
        "||" => Expr::StringConcat(left, right),
        "union" | "|" => Expr::Union(left, right),
        "intersect" => Expr::Intersect(left, right),
        "except" => Expr::Except(left, right),
        "!" => Expr::SimpleMap(left, right),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn ast(text: &str) -> Expr {
        build(&parse(text).unwrap()).unwrap()
    }

    #[test]
    fn test_wrappers_collapse() {
        assert_eq!(ast("1"), Expr::integer(1));
        assert_eq!(ast("((1))"), Expr::integer(1));
        assert_eq!(ast("field1"), Expr::child("field1"));
        assert_eq!(ast("()"), Expr::empty());
    }

    #[test]
    fn test_chains_fold_left() {
        let expected = Expr::arithmetic(
            Expr::arithmetic(Expr::integer(1), ArithmeticOp::Subtract, Expr::integer(2)),
            ArithmeticOp::Subtract,
            Expr::integer(3),
        );
        assert_eq!(ast("1 - 2 - 3"), expected);
    }

    #[test]
    fn test_double_slash_expands() {
        assert_eq!(
            ast("//x"),
            Expr::Path {
                absolute: true,
                steps: vec![Expr::Step(Step::descendant_or_self_node()), Expr::child("x")],
            }
        );
        assert_eq!(
            ast("a//b"),
            Expr::Path {
                absolute: false,
                steps: vec![
                    Expr::child("a"),
                    Expr::Step(Step::descendant_or_self_node()),
                    Expr::child("b"),
                ],
            }
        );
    }

    #[test]
    fn test_abbreviated_steps() {
        assert_eq!(
            ast(".."),
            Expr::step(Axis::Parent, NodeTest::Kind(KindTest::AnyNode))
        );
        assert_eq!(
            ast("@flag"),
            Expr::step(
                Axis::Attribute,
                NodeTest::Name(NameTest::Name(EQName::local("flag")))
            )
        );
        assert_eq!(
            ast("./@flag"),
            Expr::Path {
                absolute: false,
                steps: vec![
                    Expr::ContextItem,
                    Expr::step(
                        Axis::Attribute,
                        NodeTest::Name(NameTest::Name(EQName::local("flag")))
                    ),
                ],
            }
        );
    }

    #[test]
    fn test_signs_fold_by_parity() {
        assert_eq!(
            ast("--1"),
            Expr::Unary {
                negate: false,
                operand: Box::new(Expr::integer(1)),
            }
        );
        assert_eq!(
            ast("-+-1"),
            Expr::Unary {
                negate: false,
                operand: Box::new(Expr::integer(1)),
            }
        );
        assert_eq!(
            ast("-1"),
            Expr::Unary {
                negate: true,
                operand: Box::new(Expr::integer(1)),
            }
        );
    }

    #[test]
    fn test_arrow_lowers_to_call() {
        assert_eq!(
            ast("'a' => upper-case()"),
            Expr::function_call(EQName::local("upper-case"), vec![Expr::string("a")])
        );
    }

    #[test]
    fn test_predicates_group_into_filter() {
        assert_eq!(
            ast("(1, 2)[1][2]"),
            Expr::Filter {
                base: Box::new(Expr::Sequence(vec![Expr::integer(1), Expr::integer(2)])),
                predicates: vec![Expr::integer(1), Expr::integer(2)],
            }
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(ast("'it''s'"), Expr::string("it's"));
        assert_eq!(ast(".5"), Expr::decimal(Decimal::new(5, 1)));
        assert_eq!(ast("1.5e2"), Expr::decimal(Decimal::from(150)));
        assert!(matches!(
            build(&parse("99999999999999999999").unwrap()),
            Err(MetapathError::SyntaxError { position: 0, .. })
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for text in [
            "1 + 2 * 3",
            "/root/field1[1]",
            "//field2/@flag",
            "../field2",
            "for $x in 1 to 3, $y in 2 return $x * $y",
            "let $a := (1, 2) return count($a)",
            "every $x in (1, 2) satisfies $x > 0",
            "if (exists(.)) then 'yes' else \"no\"",
            "map { 'a' : 1 }?a",
            "[1, (2, 3)]?*",
            "array { 1 to 3 }",
            "function($x as integer?) as item()* { $x }",
            "fn:count#1",
            "-(1 idiv 2)",
            "1 eq 1 and (2 lt 3 or . is .)",
            "'a' || 'b' || 'c'",
            "(1, 2) ! (. + 1)",
            "$x instance of empty-sequence()",
            "'1' cast as integer?",
            "a union b except c",
            "child::field(name)[position() = last()]",
            "1.50",
            "$f(1)[1]?key",
            "Q{http://example.com}f(1)",
        ] {
            let first = ast(text);
            let rendered = first.to_string();
            let second = ast(&rendered);
            assert_eq!(first, second, "round trip of {} via {}", text, rendered);
        }
    }
}
