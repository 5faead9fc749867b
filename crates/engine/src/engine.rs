//! Metapath evaluation.
//!
//! Entry point: [`evaluate`] with a [`DynamicContext`]. Evaluation is a pure
//! recursive walk over the [`Expr`] tree. Nested scopes (predicates, `for`,
//! function bodies) evaluate against derived contexts, so the caller's
//! context is never modified.

use std::collections::HashSet;

use indexmap::IndexMap;
use indexmap::map::Entry;
use metapath_nodeitem::NodeItem;
use metapath_types::{AtomicItem, AtomicType, Decimal};

use crate::ast::*;
use crate::axes::{self, NodeMatcher};
use crate::context::{DynamicContext, Focus, META_NS, StaticContext, XS_NS};
use crate::error::MetapathError;
use crate::operators;
use crate::types::{ArrayItem, FunctionItem, Item, MapItem, Sequence};

/// Evaluates `expr` with `focus` as the context item.
pub fn evaluate<'t>(
    expr: &Expr,
    ctx: &DynamicContext<'t>,
    focus: Option<Item<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    match focus {
        Some(item) => eval(expr, &ctx.with_focus(Focus::single(item))),
        None => eval(expr, ctx),
    }
}

/// Evaluates `expr` against the focus already held by `ctx`.
pub fn eval<'t>(expr: &Expr, ctx: &DynamicContext<'t>) -> Result<Sequence<'t>, MetapathError> {
    match expr {
        Expr::Literal(literal) => Ok(Sequence::from_item(match literal {
            Literal::String(s) => AtomicItem::String(s.clone()),
            Literal::Integer(i) => AtomicItem::Integer(*i),
            Literal::Decimal(d) => AtomicItem::Decimal(*d),
        })),
        Expr::VariableRef(name) => ctx.variable(&name.to_string()).cloned(),
        Expr::ContextItem => ctx.context_item().cloned().map(Sequence::from_item),
        Expr::Sequence(exprs) => {
            let mut result = Sequence::empty();
            for e in exprs {
                result.extend(eval(e, ctx)?);
            }
            Ok(result)
        }

        Expr::Arithmetic { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            Ok(operators::arithmetic(*op, &l, &r, ctx.implicit_timezone())?
                .map(Sequence::from)
                .unwrap_or_default())
        }
        Expr::Unary { negate, operand } => evaluate_unary(*negate, operand, ctx),
        Expr::GeneralComparison { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            operators::general_compare(*op, &l, &r, ctx.implicit_timezone()).map(Sequence::boolean)
        }
        Expr::ValueComparison { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            Ok(operators::value_compare(*op, &l, &r, ctx.implicit_timezone())?
                .map(Sequence::boolean)
                .unwrap_or_default())
        }
        Expr::NodeComparison { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            Ok(operators::node_compare(*op, &l, &r)?
                .map(Sequence::boolean)
                .unwrap_or_default())
        }
        Expr::And(left, right) => evaluate_logical(left, right, false, ctx),
        Expr::Or(left, right) => evaluate_logical(left, right, true, ctx),
        Expr::StringConcat(left, right) => {
            let mut result = string_operand(left, ctx)?;
            result.push_str(&string_operand(right, ctx)?);
            Ok(Sequence::string(result))
        }
        Expr::Range(low, high) => evaluate_range(low, high, ctx),
        Expr::Union(left, right) => {
            let mut nodes = eval(left, ctx)?.nodes("union")?;
            nodes.extend(eval(right, ctx)?.nodes("union")?);
            Ok(Sequence::document_order(nodes))
        }
        Expr::Intersect(left, right) => {
            let l = eval(left, ctx)?.nodes("intersect")?;
            let r: HashSet<NodeItem<'t>> = eval(right, ctx)?.nodes("intersect")?.into_iter().collect();
            Ok(Sequence::document_order(
                l.into_iter().filter(|n| r.contains(n)).collect(),
            ))
        }
        Expr::Except(left, right) => {
            let l = eval(left, ctx)?.nodes("except")?;
            let r: HashSet<NodeItem<'t>> = eval(right, ctx)?.nodes("except")?.into_iter().collect();
            Ok(Sequence::document_order(
                l.into_iter().filter(|n| !r.contains(n)).collect(),
            ))
        }

        Expr::InstanceOf { expr, ty } => {
            let value = eval(expr, ctx)?;
            matches_sequence_type(&value, ty, ctx.static_context()).map(Sequence::boolean)
        }
        Expr::Treat { expr, ty } => {
            let value = eval(expr, ctx)?;
            if matches_sequence_type(&value, ty, ctx.static_context())? {
                Ok(value)
            } else {
                Err(MetapathError::type_error(format!(
                    "value {} does not match required type {}",
                    value, ty
                )))
            }
        }
        Expr::Castable { expr, ty } => {
            let value = eval(expr, ctx)?;
            evaluate_castable(&value, ty, ctx.static_context()).map(Sequence::boolean)
        }
        Expr::Cast { expr, ty } => {
            let value = eval(expr, ctx)?;
            evaluate_cast(&value, ty, ctx.static_context())
        }

        Expr::Path { absolute, steps } => evaluate_path(*absolute, steps, ctx),
        Expr::Step(step) => {
            let node = context_node(ctx, step.axis.name())?;
            let matcher = NodeMatcher::new(&step.test, step.axis, ctx.static_context())?;
            evaluate_axis_step(node, step, &matcher, ctx)
        }
        Expr::Filter { base, predicates } => {
            let items = eval(base, ctx)?.into_items();
            Ok(Sequence::from_items(apply_predicates(items, predicates, ctx)?))
        }

        Expr::FunctionCall { name, args } => evaluate_function_call(name, args, ctx),
        Expr::DynamicCall { function, args } => {
            let target = eval(function, ctx)?;
            let target = target.exactly_one("dynamic function call")?;
            let args = args
                .iter()
                .map(|arg| eval(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call_item(target, args, ctx)
        }
        Expr::NamedFunctionRef { name, arity } => {
            let namespace = resolve_function_namespace(name, *arity, ctx.static_context())?;
            if ctx.functions().lookup(&namespace, &name.local, *arity).is_none() {
                return Err(MetapathError::undefined_function(Some(&namespace), &name.local, *arity));
            }
            Ok(Sequence::from_item(Item::Function(FunctionItem::named(
                namespace,
                name.local.clone(),
                *arity,
            ))))
        }
        Expr::InlineFunction(function) => Ok(Sequence::from_item(Item::Function(
            FunctionItem::inline(function.clone(), ctx.visible_variables()),
        ))),

        Expr::For { bindings, body } => evaluate_for(bindings, body, ctx),
        Expr::Let { bindings, body } => {
            let mut scope = ctx.clone();
            for (name, value) in bindings {
                let value = eval(value, &scope)?;
                scope = scope.with_variable(name.to_string(), value);
            }
            eval(body, &scope)
        }
        Expr::Quantified {
            quantifier,
            bindings,
            satisfies,
        } => evaluate_quantified(*quantifier, bindings, satisfies, ctx).map(Sequence::boolean),
        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval(condition, ctx)?.effective_boolean_value()? {
                eval(then_branch, ctx)
            } else {
                eval(else_branch, ctx)
            }
        }

        Expr::SimpleMap(left, right) => {
            let items = eval(left, ctx)?.into_items();
            let size = items.len();
            let mut result = Sequence::empty();
            for (index, item) in items.into_iter().enumerate() {
                let inner = ctx.with_focus(Focus::new(item, index + 1, size));
                result.extend(eval(right, &inner)?);
            }
            Ok(result)
        }
        Expr::MapConstructor(entries) => evaluate_map_constructor(entries, ctx),
        Expr::ArrayConstructor(ArrayConstructor::Square(members)) => {
            let members = members
                .iter()
                .map(|member| eval(member, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Sequence::from_item(Item::Array(ArrayItem::from_members(members))))
        }
        Expr::ArrayConstructor(ArrayConstructor::Curly(body)) => {
            let members = match body {
                Some(body) => eval(body, ctx)?
                    .into_iter()
                    .map(Sequence::from_item)
                    .collect(),
                None => Vec::new(),
            };
            Ok(Sequence::from_item(Item::Array(ArrayItem::from_members(members))))
        }
        Expr::Lookup { base, key } => {
            let mut result = Sequence::empty();
            for item in eval(base, ctx)?.iter() {
                result.extend(lookup(item, key, ctx)?);
            }
            Ok(result)
        }
        Expr::UnaryLookup(key) => {
            let item = ctx.context_item()?.clone();
            lookup(&item, key, ctx)
        }
    }
}

fn evaluate_unary<'t>(
    negate: bool,
    operand: &Expr,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let value = eval(operand, ctx)?;
    let sign = if negate { "-" } else { "+" };
    let Some(value) = value.atomize_optional(sign)? else {
        return Ok(Sequence::empty());
    };
    if negate {
        return operators::negate(&value).map(Sequence::from);
    }
    match value {
        AtomicItem::Integer(_)
        | AtomicItem::Decimal(_)
        | AtomicItem::DayTimeDuration(_)
        | AtomicItem::YearMonthDuration(_) => Ok(Sequence::from(value)),
        other => Err(MetapathError::type_error(format!(
            "unary '+' is not defined for {}",
            other.type_name()
        ))),
    }
}

/// `and` when `is_or` is false. Both operands are evaluated unless the
/// configuration asks for short-circuiting.
fn evaluate_logical<'t>(
    left: &Expr,
    right: &Expr,
    is_or: bool,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let l = eval(left, ctx)?.effective_boolean_value()?;
    if ctx.config().short_circuit_boolean && l == is_or {
        return Ok(Sequence::boolean(l));
    }
    let r = eval(right, ctx)?.effective_boolean_value()?;
    Ok(Sequence::boolean(if is_or { l || r } else { l && r }))
}

fn string_operand(expr: &Expr, ctx: &DynamicContext<'_>) -> Result<String, MetapathError> {
    Ok(eval(expr, ctx)?
        .atomize_optional("||")?
        .map(|value| value.as_string())
        .unwrap_or_default())
}

fn integer_operand(expr: &Expr, ctx: &DynamicContext<'_>) -> Result<Option<i64>, MetapathError> {
    match eval(expr, ctx)?.atomize_optional("to")? {
        None => Ok(None),
        Some(AtomicItem::Integer(i)) => Ok(Some(i)),
        Some(other) => Err(MetapathError::type_error(format!(
            "range bounds must be integers, got {}",
            other.type_name()
        ))),
    }
}

fn evaluate_range<'t>(
    low: &Expr,
    high: &Expr,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let (Some(low), Some(high)) = (integer_operand(low, ctx)?, integer_operand(high, ctx)?) else {
        return Ok(Sequence::empty());
    };
    if low > high {
        return Ok(Sequence::empty());
    }
    let length = i128::from(high) - i128::from(low) + 1;
    let limit = ctx.config().max_range_length;
    if length > limit as i128 {
        return Err(MetapathError::function(
            "to",
            format!("range of {} items exceeds the limit of {}", length, limit),
        ));
    }
    Ok((low..=high).map(|i| Item::Atomic(AtomicItem::Integer(i))).collect())
}

fn context_node<'t>(ctx: &DynamicContext<'t>, what: &str) -> Result<NodeItem<'t>, MetapathError> {
    let item = ctx.context_item()?;
    item.as_node().ok_or_else(|| {
        MetapathError::type_error(format!(
            "axis '{}' requires a node as context item, got {}",
            what,
            item.type_name()
        ))
    })
}

fn evaluate_path<'t>(
    absolute: bool,
    steps: &[Expr],
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let (mut current, rest) = if absolute {
        let root = context_node(ctx, "/")?.document();
        (Sequence::from_item(Item::Node(root)), steps)
    } else {
        match steps.split_first() {
            Some((first, rest)) => (eval(first, ctx)?, rest),
            None => return Ok(Sequence::empty()),
        }
    };
    for step in rest {
        current = apply_step(current, step, ctx)?;
    }
    Ok(current)
}

/// Evaluates the right-hand side of `/` once per node of `input`.
fn apply_step<'t>(
    input: Sequence<'t>,
    step: &Expr,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let nodes = input.nodes("path step")?;
    let size = nodes.len();

    if let Expr::Step(axis_step) = step {
        let matcher = NodeMatcher::new(&axis_step.test, axis_step.axis, ctx.static_context())?;
        let mut selected = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let inner = ctx.with_focus(Focus::new(Item::Node(node), index + 1, size));
            selected.extend(evaluate_axis_step(node, axis_step, &matcher, &inner)?.nodes("path step")?);
        }
        return Ok(Sequence::document_order(selected));
    }

    let mut results = Vec::new();
    for (index, node) in nodes.into_iter().enumerate() {
        let inner = ctx.with_focus(Focus::new(Item::Node(node), index + 1, size));
        results.extend(eval(step, &inner)?.into_items());
    }

    let node_count = results.iter().filter(|item| item.is_node()).count();
    if node_count == results.len() {
        let nodes = results.iter().filter_map(Item::as_node).collect();
        Ok(Sequence::document_order(nodes))
    } else if node_count == 0 {
        Ok(Sequence::from_items(results))
    } else {
        Err(MetapathError::type_error(
            "the last step of a path mixes nodes and non-node items",
        ))
    }
}

/// Selects along the step's axis from `node`, filters by the node test and
/// predicates, and returns the survivors in document order.
fn evaluate_axis_step<'t>(
    node: NodeItem<'t>,
    step: &Step,
    matcher: &NodeMatcher,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let candidates: Vec<Item<'t>> = axes::select(step.axis, node)
        .into_iter()
        .filter(|candidate| matcher.matches(candidate))
        .map(Item::Node)
        .collect();
    let mut selected = apply_predicates(candidates, &step.predicates, ctx)?;
    if step.axis.is_reverse() {
        selected.reverse();
    }
    Ok(Sequence::from_items(selected))
}

/// Filters `items` through each predicate in turn. A predicate yielding a
/// single number keeps the item at that position; any other value is
/// reduced to its effective boolean value.
fn apply_predicates<'t>(
    mut items: Vec<Item<'t>>,
    predicates: &[Expr],
    ctx: &DynamicContext<'t>,
) -> Result<Vec<Item<'t>>, MetapathError> {
    for predicate in predicates {
        let size = items.len();
        let mut kept = Vec::with_capacity(size);
        for (index, item) in items.into_iter().enumerate() {
            let position = index + 1;
            let inner = ctx.with_focus(Focus::new(item.clone(), position, size));
            let value = eval(predicate, &inner)?;
            let keep = match value.items() {
                [Item::Atomic(number)] if number.is_numeric() => number
                    .as_decimal()
                    .is_some_and(|n| n == Decimal::from(position)),
                _ => value.effective_boolean_value()?,
            };
            if keep {
                kept.push(item);
            }
        }
        items = kept;
    }
    Ok(items)
}

fn evaluate_for<'t>(
    bindings: &[(EQName, Expr)],
    body: &Expr,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let Some(((name, values), rest)) = bindings.split_first() else {
        return eval(body, ctx);
    };
    let mut result = Sequence::empty();
    for item in eval(values, ctx)? {
        let inner = ctx.with_variable(name.to_string(), Sequence::from_item(item));
        result.extend(evaluate_for(rest, body, &inner)?);
    }
    Ok(result)
}

fn evaluate_quantified(
    quantifier: Quantifier,
    bindings: &[(EQName, Expr)],
    satisfies: &Expr,
    ctx: &DynamicContext<'_>,
) -> Result<bool, MetapathError> {
    let Some(((name, values), rest)) = bindings.split_first() else {
        return eval(satisfies, ctx)?.effective_boolean_value();
    };
    for item in eval(values, ctx)? {
        let inner = ctx.with_variable(name.to_string(), Sequence::from_item(item));
        let satisfied = evaluate_quantified(quantifier, rest, satisfies, &inner)?;
        match quantifier {
            Quantifier::Some if satisfied => return Ok(true),
            Quantifier::Every if !satisfied => return Ok(false),
            _ => {}
        }
    }
    Ok(quantifier == Quantifier::Every)
}

fn evaluate_map_constructor<'t>(
    entries: &[(Expr, Expr)],
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let mut map = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        let key = eval(key, ctx)?;
        let mut keys = key.atomize()?;
        let key = match (keys.pop(), keys.is_empty()) {
            (Some(key), true) => key,
            _ => {
                return Err(MetapathError::type_error(
                    "a map key must be a single atomic value",
                ));
            }
        };
        let value = eval(value, ctx)?;
        match map.entry(key) {
            Entry::Occupied(entry) => {
                return Err(MetapathError::invalid_value(format!(
                    "duplicate map key '{}'",
                    entry.key()
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }
    Ok(Sequence::from_item(Item::Map(MapItem::from_entries(map))))
}

fn lookup<'t>(
    item: &Item<'t>,
    key: &KeySpecifier,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let keys: Vec<AtomicItem> = match key {
        KeySpecifier::Name(name) => vec![AtomicItem::String(name.clone())],
        KeySpecifier::Integer(index) => vec![AtomicItem::Integer(*index)],
        KeySpecifier::Wildcard => {
            return Ok(match item {
                Item::Map(map) => map.values().cloned().fold(Sequence::empty(), Sequence::concat),
                Item::Array(array) => array
                    .members()
                    .iter()
                    .cloned()
                    .fold(Sequence::empty(), Sequence::concat),
                other => return Err(not_lookupable(other)),
            });
        }
        KeySpecifier::Expr(expr) => eval(expr, ctx)?.atomize()?,
    };

    let mut result = Sequence::empty();
    for key in &keys {
        result.extend(lookup_key(item, key)?);
    }
    Ok(result)
}

fn lookup_key<'t>(item: &Item<'t>, key: &AtomicItem) -> Result<Sequence<'t>, MetapathError> {
    match item {
        Item::Map(map) => Ok(map.get(key).cloned().unwrap_or_default()),
        Item::Array(array) => match key {
            AtomicItem::Integer(index) => array.get(*index).cloned(),
            other => Err(MetapathError::type_error(format!(
                "array lookup requires an integer key, got {}",
                other.type_name()
            ))),
        },
        other => Err(not_lookupable(other)),
    }
}

fn not_lookupable(item: &Item<'_>) -> MetapathError {
    MetapathError::type_error(format!(
        "lookup requires a map or array, got {}",
        item.type_name()
    ))
}

fn resolve_function_namespace(
    name: &EQName,
    arity: usize,
    static_context: &StaticContext,
) -> Result<String, MetapathError> {
    static_context
        .function_namespace(name)
        .ok_or_else(|| MetapathError::undefined_function(name.prefix.as_deref(), &name.local, arity))
}

fn evaluate_function_call<'t>(
    name: &EQName,
    args: &[Expr],
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let namespace = resolve_function_namespace(name, args.len(), ctx.static_context())?;
    let args = args
        .iter()
        .map(|arg| eval(arg, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    call_function(&namespace, &name.local, args, ctx)
}

/// Calls the library function `namespace:name` with `args`.
pub fn call_function<'t>(
    namespace: &str,
    name: &str,
    args: Vec<Sequence<'t>>,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    let arity = args.len();
    let function = ctx
        .functions()
        .lookup(namespace, name, arity)
        .ok_or_else(|| MetapathError::undefined_function(Some(namespace), name, arity))?;
    function.call(ctx, args).inspect_err(|err| {
        log::debug!("{}#{} failed: {}", name, arity, err);
    })
}

/// Calls a function item. Maps and arrays act as single-argument functions
/// from key to value.
pub fn call_item<'t>(
    target: &Item<'t>,
    mut args: Vec<Sequence<'t>>,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    match target {
        Item::Function(function) => call_function_item(function, args, ctx),
        Item::Map(_) | Item::Array(_) => {
            let (Some(key), true) = (args.pop(), args.is_empty()) else {
                return Err(MetapathError::type_error(format!(
                    "{} takes exactly one argument",
                    target.type_name()
                )));
            };
            let key = key
                .atomize_optional("lookup")?
                .ok_or_else(|| MetapathError::type_error("lookup key must not be empty"))?;
            lookup_key(target, &key)
        }
        other => Err(MetapathError::type_error(format!(
            "{} is not a function",
            other.type_name()
        ))),
    }
}

pub fn call_function_item<'t>(
    function: &FunctionItem<'t>,
    args: Vec<Sequence<'t>>,
    ctx: &DynamicContext<'t>,
) -> Result<Sequence<'t>, MetapathError> {
    if args.len() != function.arity() {
        return Err(MetapathError::type_error(format!(
            "{} expects {} argument(s), got {}",
            function,
            function.arity(),
            args.len()
        )));
    }
    match function {
        FunctionItem::Named {
            namespace, name, ..
        } => call_function(namespace, name, args, ctx),
        FunctionItem::Inline { function, captured } => {
            let static_context = ctx.static_context();
            let mut bindings = captured.to_vec();
            for (param, arg) in function.params.iter().zip(args) {
                if let Some(ty) = &param.ty
                    && !matches_sequence_type(&arg, ty, static_context)?
                {
                    return Err(MetapathError::type_error(format!(
                        "argument ${} does not match {}",
                        param.name, ty
                    )));
                }
                bindings.push((param.name.to_string(), arg));
            }
            let body_ctx = ctx.with_variables(bindings).without_focus();
            let result = match &function.body {
                Some(body) => eval(body, &body_ctx)?,
                None => Sequence::empty(),
            };
            if let Some(ty) = &function.return_type
                && !matches_sequence_type(&result, ty, static_context)?
            {
                return Err(MetapathError::type_error(format!(
                    "function result does not match {}",
                    ty
                )));
            }
            Ok(result)
        }
    }
}

/// Resolves a type name used by `cast as`, `instance of` and friends.
pub fn resolve_atomic_type(
    name: &EQName,
    static_context: &StaticContext,
) -> Result<AtomicType, MetapathError> {
    let namespace = match (&name.namespace, &name.prefix) {
        (Some(namespace), _) => Some(namespace.as_str()),
        (None, Some(prefix)) => Some(static_context.prefix_namespace(prefix)?),
        (None, None) => None,
    };
    let known_namespace = matches!(namespace, None | Some(META_NS) | Some(XS_NS));
    match AtomicType::from_name(&name.local) {
        Some(ty) if known_namespace => Ok(ty),
        _ => Err(MetapathError::type_error(format!(
            "unknown atomic type '{}'",
            name
        ))),
    }
}

fn cast_operand(
    value: &Sequence<'_>,
    ty: &SingleType,
) -> Result<Option<AtomicItem>, MetapathError> {
    let operand = value.atomize_optional("cast")?;
    if operand.is_none() && !ty.optional {
        return Err(MetapathError::type_error(format!(
            "cannot cast an empty sequence to {}",
            ty.name
        )));
    }
    Ok(operand)
}

fn evaluate_cast<'t>(
    value: &Sequence<'t>,
    ty: &SingleType,
    static_context: &StaticContext,
) -> Result<Sequence<'t>, MetapathError> {
    let target = resolve_atomic_type(&ty.name, static_context)?;
    match cast_operand(value, ty)? {
        Some(operand) => Ok(Sequence::from(operand.cast(target)?)),
        None => Ok(Sequence::empty()),
    }
}

fn evaluate_castable(
    value: &Sequence<'_>,
    ty: &SingleType,
    static_context: &StaticContext,
) -> Result<bool, MetapathError> {
    let target = resolve_atomic_type(&ty.name, static_context)?;
    Ok(match cast_operand(value, ty) {
        Ok(Some(operand)) => operand.castable(target),
        Ok(None) => true,
        Err(_) => false,
    })
}

pub fn matches_sequence_type(
    value: &Sequence<'_>,
    ty: &SequenceType,
    static_context: &StaticContext,
) -> Result<bool, MetapathError> {
    match ty {
        SequenceType::Empty => Ok(value.is_empty()),
        SequenceType::Typed { item, occurrence } => {
            if !occurrence.allows(value.len()) {
                return Ok(false);
            }
            for member in value.iter() {
                if !matches_item_type(member, item, static_context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn matches_item_type(
    item: &Item<'_>,
    ty: &ItemType,
    static_context: &StaticContext,
) -> Result<bool, MetapathError> {
    Ok(match ty {
        ItemType::Item => true,
        ItemType::Atomic(name) => {
            let Item::Atomic(value) = item else {
                return Ok(false);
            };
            match name.local.as_str() {
                "any-atomic-type" | "anyAtomicType" => true,
                "numeric" => value.is_numeric(),
                _ => value
                    .atomic_type()
                    .derives_from(resolve_atomic_type(name, static_context)?),
            }
        }
        ItemType::Kind(kind) => match item {
            Item::Node(node) => NodeMatcher::new(
                &NodeTest::Kind(kind.clone()),
                Axis::SelfAxis,
                static_context,
            )?
            .matches(node),
            _ => false,
        },
        ItemType::AnyMap => matches!(item, Item::Map(_)),
        ItemType::AnyArray => matches!(item, Item::Array(_)),
        ItemType::AnyFunction => {
            matches!(item, Item::Function(_) | Item::Map(_) | Item::Array(_))
        }
    })
}
