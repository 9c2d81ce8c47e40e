//! # FHIRPath Expression Evaluator
//!
//! A recursive-descent walk over [`Expression`] trees. Every node produces a
//! [`Collection`] or fails with an [`EvaluationError`].
//!
//! ## Overview
//!
//! - **Path navigation**: member access resolves against `$this` of the
//!   enclosing scope, so chained invocations compose. At the root an
//!   identifier naming the resource type (`Patient` in `Patient.name`) selects
//!   the resource itself.
//! - **Operators**: evaluated operands go to [`crate::operators`]; `and`, `or`
//!   and `implies` skip their right operand when the left one decides.
//! - **Function calls**: forms that need unevaluated arguments (`where`,
//!   `select`, `all`, `exists`, `iif`, `ofType`, `is`, `as`, `aggregate`,
//!   `repeat`, `trace`) are handled here; everything else is looked up in the
//!   context's [`FunctionRegistry`](crate::registry::FunctionRegistry) and called
//!   with arguments evaluated in the caller's scope.
//! - **Limits**: nesting beyond `maxDepth` is rejected, collections built by
//!   navigation and functions are checked against `maxCollectionSize`, and
//!   per-element loops poll for cancellation every
//!   [`CHECK_INTERVAL`] iterations.
//!
//! Errors are annotated with the innermost expression that raised them.
//!
//! ## Example
//!
//! ```rust
//! use kestrel_fhirpath::ast::{BinaryOperator, Expression};
//! use kestrel_fhirpath::context::EvaluationContext;
//! use kestrel_fhirpath::evaluator::evaluate;
//! use kestrel_fhirpath_support::Collection;
//!
//! let ctx = EvaluationContext::from_json_slice(br#"{
//!     "resourceType": "Patient",
//!     "name": [{"use": "official", "family": "Chalmers"}, {"use": "usual", "family": "Jim"}]
//! }"#).unwrap();
//!
//! let expr = Expression::path("Patient.name")
//!     .call("where", vec![Expression::binary(
//!         BinaryOperator::Equal,
//!         Expression::identifier("use"),
//!         Expression::string("official"),
//!     )])
//!     .member("family");
//!
//! assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::single("Chalmers"));
//! ```

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use kestrel_fhirpath_support::{
    Collection, EvaluationError, PrecisionDate, PrecisionDateTime, PrecisionTime, Quantity, Value,
};

use crate::aggregate_function::evaluate_aggregate;
use crate::ast::{BinaryOperator, Expression, LiteralKind, TypeOperator, TypeSpecifier, UnaryOperator};
use crate::boolean_functions::{logical_result, not, singleton_boolean};
use crate::cancellation::CHECK_INTERVAL;
use crate::context::EvaluationContext;
use crate::fhir_type_hierarchy::type_matches;
use crate::operators::{apply_binary, logical};
use crate::registry::describe_arity;
use crate::repeat_function::evaluate_repeat;
use crate::trace_function::evaluate_trace;

/// Evaluates `expr` in `context`.
pub fn evaluate(expr: &Expression, context: &EvaluationContext) -> Result<Collection, EvaluationError> {
    debug!(expression = %expr, "evaluating");
    let result = eval(expr, context, 0);
    match &result {
        Ok(collection) => debug!(expression = %expr, size = collection.len(), "evaluated"),
        Err(err) => debug!(expression = %expr, error = %err, "evaluation failed"),
    }
    result
}

/// Evaluates a node `depth` levels below the top of the tree.
pub(crate) fn eval(
    expr: &Expression,
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    if depth > ctx.limits().max_depth {
        return Err(EvaluationError::invalid_expression(format!(
            "expression nesting exceeds maxDepth of {}",
            ctx.limits().max_depth
        )));
    }
    eval_node(expr, ctx, depth).map_err(|err| err.at(expr.to_string()))
}

fn eval_node(
    expr: &Expression,
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    match expr {
        Expression::Literal { literal_kind, raw } => literal_value(*literal_kind, raw),
        Expression::MemberAccess { target, name } => match target {
            Some(target) => {
                let base = eval(target, ctx, depth + 1)?;
                navigate(&base, name, false, ctx)
            }
            None => navigate(ctx.this(), name, ctx.at_root(), ctx),
        },
        Expression::FunctionCall { target, name, args } => {
            let input = match target {
                Some(target) => eval(target, ctx, depth + 1)?,
                None => ctx.this().clone(),
            };
            call_function(name, &input, args, ctx, depth)
        }
        Expression::BinaryOp { op, left, right } => evaluate_binary(*op, left, right, ctx, depth),
        Expression::UnaryOp { op, operand } => {
            let operand = eval(operand, ctx, depth + 1)?;
            evaluate_unary(*op, &operand)
        }
        Expression::Indexer { base, index } => {
            let base = eval(base, ctx, depth + 1)?;
            let index = eval(index, ctx, depth + 1)?;
            evaluate_indexer(&base, &index)
        }
        Expression::TypeTest {
            op,
            operand,
            type_specifier,
        } => {
            let operand = eval(operand, ctx, depth + 1)?;
            apply_type_operation(*op, &operand, type_specifier)
        }
        Expression::ThisRef => Ok(ctx.this().clone()),
        Expression::IndexRef => Ok(ctx
            .index()
            .map(|i| Collection::single(Value::Integer(i as i64)))
            .unwrap_or_default()),
        Expression::TotalRef => Ok(ctx.total().cloned().unwrap_or_default()),
        Expression::ExternalConstantRef { name } => ctx
            .resolve_variable(name)
            .ok_or_else(|| EvaluationError::InvalidPath(format!("undefined variable %{}", name))),
    }
}

// === Literals ===

/// Converts a literal's source text to its value. `Null` (`{}`) is empty.
pub fn literal_value(kind: LiteralKind, raw: &str) -> Result<Collection, EvaluationError> {
    let invalid = || EvaluationError::parse(format!("invalid {:?} literal '{}'", kind, raw));
    let value = match kind {
        LiteralKind::Null => return Ok(Collection::empty()),
        LiteralKind::Boolean => match raw {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => return Err(invalid()),
        },
        LiteralKind::String => Value::String(string_literal(raw).ok_or_else(invalid)?),
        LiteralKind::Integer => Value::Integer(raw.parse().map_err(|_| invalid())?),
        LiteralKind::Decimal => Value::Decimal(
            Decimal::from_str(raw)
                .or_else(|_| Decimal::from_scientific(raw))
                .map_err(|_| invalid())?,
        ),
        LiteralKind::Date => Value::Date(PrecisionDate::parse(raw).ok_or_else(invalid)?),
        LiteralKind::DateTime => Value::DateTime(PrecisionDateTime::parse(raw).ok_or_else(invalid)?),
        LiteralKind::Time => Value::Time(PrecisionTime::parse(raw).ok_or_else(invalid)?),
        LiteralKind::Quantity => Value::Quantity(Quantity::parse(raw).ok_or_else(invalid)?),
    };
    Ok(Collection::single(value))
}

/// A quoted literal (`'it\'s'`) is unescaped; unquoted text is taken verbatim.
fn string_literal(raw: &str) -> Option<String> {
    match raw
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
    {
        Some(inner) if raw.len() >= 2 => unescape(inner),
        _ => Some(raw.to_string()),
    }
}

fn unescape(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'f' => out.push('\u{000C}'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

// === Navigation ===

/// Member access over every element of `base`.
fn navigate(
    base: &Collection,
    name: &str,
    at_root: bool,
    ctx: &EvaluationContext,
) -> Result<Collection, EvaluationError> {
    let name = name.trim_matches('`');
    let mut out = Collection::empty();
    for item in base {
        let Value::Object(obj) = item else {
            continue;
        };
        let children = obj.get(name);
        if children.is_empty()
            && at_root
            && name.starts_with(char::is_uppercase)
            && obj.type_name() == Some(name)
        {
            out.push(item.clone());
        } else {
            out.extend(children);
        }
        ctx.enforce_collection_size(&mut out)?;
    }
    Ok(out)
}

fn evaluate_indexer(base: &Collection, index: &Collection) -> Result<Collection, EvaluationError> {
    let Some(index) = index.singleton("indexer")? else {
        return Ok(Collection::empty());
    };
    let Value::Integer(i) = index else {
        return Err(EvaluationError::TypeError(format!(
            "index must be an Integer, found {}",
            index.type_name()
        )));
    };
    Ok(usize::try_from(*i)
        .ok()
        .and_then(|i| base.get(i))
        .cloned()
        .into())
}

// === Operators ===

fn evaluate_binary(
    op: BinaryOperator,
    left: &Expression,
    right: &Expression,
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    let left = eval(left, ctx, depth + 1)?;
    if matches!(op, BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Implies) {
        let l = singleton_boolean(&left, op.symbol())?;
        let decided = match (op, l) {
            (BinaryOperator::And, Some(false)) => Some(false),
            (BinaryOperator::Or, Some(true)) => Some(true),
            (BinaryOperator::Implies, Some(false)) => Some(true),
            _ => None,
        };
        if let Some(result) = decided {
            return Ok(Collection::boolean(result));
        }
        let r = singleton_boolean(&eval(right, ctx, depth + 1)?, op.symbol())?;
        return Ok(logical_result(logical(op, l, r)));
    }
    let right = eval(right, ctx, depth + 1)?;
    let mut result = apply_binary(op, &left, &right)?;
    if op == BinaryOperator::Union {
        ctx.enforce_collection_size(&mut result)?;
    }
    Ok(result)
}

fn evaluate_unary(op: UnaryOperator, operand: &Collection) -> Result<Collection, EvaluationError> {
    if op == UnaryOperator::Not {
        return Ok(logical_result(not(singleton_boolean(operand, "not")?)));
    }
    let Some(value) = operand.singleton(if op == UnaryOperator::Minus { "unary '-'" } else { "unary '+'" })? else {
        return Ok(Collection::empty());
    };
    match op {
        UnaryOperator::Minus => Ok(value.negate()?.into()),
        _ if value.is_numeric() || matches!(value, Value::Quantity(_)) => Ok(Collection::single(value.clone())),
        _ => Err(EvaluationError::TypeError(format!(
            "unary '+' cannot be applied to {}",
            value.type_name()
        ))),
    }
}

/// `is` and `as`, in operator or function form.
fn apply_type_operation(
    op: TypeOperator,
    operand: &Collection,
    specifier: &TypeSpecifier,
) -> Result<Collection, EvaluationError> {
    let operation = match op {
        TypeOperator::Is => "is",
        TypeOperator::As => "as",
    };
    let Some(value) = operand.singleton(operation)? else {
        return Ok(Collection::empty());
    };
    let matches = type_matches(value, specifier);
    Ok(match op {
        TypeOperator::Is => Collection::boolean(matches),
        TypeOperator::As if matches => Collection::single(value.clone()),
        TypeOperator::As => Collection::empty(),
    })
}

// === Function calls ===

pub(crate) fn check_arity(
    function: &str,
    args: &[Expression],
    min: usize,
    max: Option<usize>,
) -> Result<(), EvaluationError> {
    let count = args.len();
    if count < min || max.is_some_and(|max| count > max) {
        return Err(EvaluationError::InvalidArguments {
            function: function.to_string(),
            expected: describe_arity(min, max),
            actual: count,
        });
    }
    Ok(())
}

fn call_function(
    name: &str,
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    match name {
        "where" => evaluate_where(input, args, ctx, depth),
        "select" => evaluate_select(input, args, ctx, depth),
        "all" => evaluate_all(input, args, ctx, depth),
        "exists" => evaluate_exists(input, args, ctx, depth),
        "iif" => evaluate_iif(input, args, ctx, depth),
        "ofType" => evaluate_of_type(input, args),
        "is" => {
            check_arity(name, args, 1, Some(1))?;
            apply_type_operation(TypeOperator::Is, input, &type_argument(name, &args[0])?)
        }
        "as" => {
            check_arity(name, args, 1, Some(1))?;
            apply_type_operation(TypeOperator::As, input, &type_argument(name, &args[0])?)
        }
        "aggregate" => evaluate_aggregate(input, args, ctx, depth),
        "repeat" => evaluate_repeat(input, args, ctx, depth),
        "trace" => evaluate_trace(input, args, ctx, depth),
        _ => {
            let definition = ctx
                .functions()
                .get(name)
                .ok_or_else(|| EvaluationError::FunctionNotFound(name.to_string()))?;
            let evaluated = args
                .iter()
                .map(|arg| eval(arg, ctx, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            trace!(function = name, input = input.len(), args = evaluated.len(), "calling function");
            let mut result = definition.call(input, &evaluated, ctx)?;
            ctx.enforce_collection_size(&mut result)?;
            Ok(result)
        }
    }
}

fn type_argument(function: &str, arg: &Expression) -> Result<TypeSpecifier, EvaluationError> {
    arg.as_type_specifier().ok_or_else(|| {
        EvaluationError::TypeError(format!("{}() expects a type name, found '{}'", function, arg))
    })
}

/// Reads the result of a criteria expression: empty is `None`, a Boolean is
/// its value, anything else is a `TypeError`.
pub(crate) fn criteria_result(result: &Collection, function: &str) -> Result<Option<bool>, EvaluationError> {
    match result.singleton(&format!("{}() criteria", function))? {
        None => Ok(None),
        Some(Value::Boolean(b)) => Ok(Some(*b)),
        Some(other) => Err(EvaluationError::TypeError(format!(
            "{} criteria evaluated to {}, expected Boolean",
            function,
            other.type_name()
        ))),
    }
}

/// Polls for cancellation every [`CHECK_INTERVAL`] elements.
pub(crate) fn poll_cancellation(ctx: &EvaluationContext, iteration: usize) -> Result<(), EvaluationError> {
    if iteration % CHECK_INTERVAL == 0 {
        ctx.check_cancelled()?;
    }
    Ok(())
}

/// Filters the input collection by a criteria expression evaluated per element.
///
/// # Returns
///
/// * The elements whose criteria evaluated to `true`, in input order
/// * `Err(TypeError)` when a criteria result is not a Boolean
///
/// # Examples
///
/// ```text
/// Patient.name.where(use = 'official')
/// (1 | 2 | 3).where($this > $index)
/// ```
fn evaluate_where(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("where", args, 1, Some(1))?;
    let mut filtered = Collection::empty();
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        let scope = ctx.with_item(item, index);
        let result = eval(&args[0], &scope, depth + 1)?;
        if criteria_result(&result, "where")? == Some(true) {
            filtered.push(item.clone());
            ctx.enforce_collection_size(&mut filtered)?;
        }
    }
    Ok(filtered)
}

/// Projects every element through an expression and flattens the results.
fn evaluate_select(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("select", args, 1, Some(1))?;
    let mut projected = Collection::empty();
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        let scope = ctx.with_item(item, index);
        projected.extend(eval(&args[0], &scope, depth + 1)?);
        ctx.enforce_collection_size(&mut projected)?;
    }
    Ok(projected)
}

/// `true` when the criteria holds for every element, including for an empty input.
fn evaluate_all(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("all", args, 1, Some(1))?;
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        let scope = ctx.with_item(item, index);
        let result = eval(&args[0], &scope, depth + 1)?;
        if criteria_result(&result, "all")? != Some(true) {
            return Ok(Collection::boolean(false));
        }
    }
    Ok(Collection::boolean(true))
}

fn evaluate_exists(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("exists", args, 0, Some(1))?;
    let Some(criteria) = args.first() else {
        return Ok(Collection::boolean(!input.is_empty()));
    };
    for (index, item) in input.iter().enumerate() {
        poll_cancellation(ctx, index)?;
        let scope = ctx.with_item(item, index);
        let result = eval(criteria, &scope, depth + 1)?;
        if criteria_result(&result, "exists")? == Some(true) {
            return Ok(Collection::boolean(true));
        }
    }
    Ok(Collection::boolean(false))
}

/// `iif(criterion, true-result [, otherwise-result])`.
///
/// Only the branch selected by the criterion is evaluated.
fn evaluate_iif(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("iif", args, 2, Some(3))?;
    input.singleton("iif()")?;
    let scope = ctx.with_this(input.clone());
    let criterion = eval(&args[0], &scope, depth + 1)?;
    if criteria_result(&criterion, "iif")? == Some(true) {
        eval(&args[1], &scope, depth + 1)
    } else if let Some(otherwise) = args.get(2) {
        eval(otherwise, &scope, depth + 1)
    } else {
        Ok(Collection::empty())
    }
}

fn evaluate_of_type(input: &Collection, args: &[Expression]) -> Result<Collection, EvaluationError> {
    check_arity("ofType", args, 1, Some(1))?;
    let specifier = type_argument("ofType", &args[0])?;
    Ok(input
        .iter()
        .filter(|item| type_matches(item, &specifier))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_fhirpath_support::ErrorKind;
    use serde_json::json;

    fn patient() -> EvaluationContext {
        EvaluationContext::from_json_slice(
            json!({
                "resourceType": "Patient",
                "active": true,
                "name": [
                    {"use": "official", "family": "Chalmers", "given": ["Peter", "James"]},
                    {"use": "usual", "given": ["Jim"]}
                ]
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    fn ints(values: &[i64]) -> Collection {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn resource_type_prefix_selects_root() {
        let out = evaluate(&Expression::path("Patient.name.given"), &patient()).unwrap();
        assert_eq!(out, ["Peter", "James", "Jim"].into_iter().map(Value::from).collect());
        let out = evaluate(&Expression::path("name.given"), &patient()).unwrap();
        assert_eq!(out.len(), 3);
        assert!(evaluate(&Expression::path("Observation.status"), &patient()).unwrap().is_empty());
    }

    #[test]
    fn string_literals_are_unescaped() {
        assert_eq!(
            literal_value(LiteralKind::String, r"'it\'s\n'").unwrap(),
            Collection::single("it's\n")
        );
        assert_eq!(literal_value(LiteralKind::String, "plain").unwrap(), Collection::single("plain"));
        assert!(literal_value(LiteralKind::Null, "{}").unwrap().is_empty());
        assert!(literal_value(LiteralKind::Integer, "12x").is_err());
    }

    #[test]
    fn where_binds_index() {
        let ctx = EvaluationContext::new(ints(&[5, 1, 7]));
        let expr = Expression::function(
            "where",
            vec![Expression::binary(BinaryOperator::GreaterThan, Expression::ThisRef, Expression::IndexRef)],
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap(), ints(&[5, 7]));
    }

    #[test]
    fn where_rejects_non_boolean_criteria() {
        let ctx = EvaluationContext::new(ints(&[1]));
        let expr = Expression::function("where", vec![Expression::integer(1)]);
        let err = evaluate(&expr, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.location(), Some("where(1)"));
    }

    #[test]
    fn and_short_circuits_on_false() {
        let ctx = EvaluationContext::new(Collection::empty());
        let expr = Expression::binary(
            BinaryOperator::And,
            Expression::boolean(false),
            Expression::constant("undefined"),
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::boolean(false));

        let expr = Expression::binary(
            BinaryOperator::And,
            Expression::boolean(true),
            Expression::constant("undefined"),
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap_err().kind(), ErrorKind::InvalidPath);
    }

    #[test]
    fn iif_evaluates_only_the_taken_branch() {
        let ctx = EvaluationContext::new(Collection::empty());
        let expr = Expression::function(
            "iif",
            vec![
                Expression::boolean(true),
                Expression::string("yes"),
                Expression::function("noSuchFunction", vec![]),
            ],
        );
        assert_eq!(evaluate(&expr, &ctx).unwrap(), Collection::single("yes"));
    }

    #[test]
    fn indexer_out_of_range_is_empty() {
        let ctx = EvaluationContext::new(ints(&[1, 2]));
        assert_eq!(evaluate(&Expression::ThisRef.index(Expression::integer(1)), &ctx).unwrap(), ints(&[2]));
        assert!(evaluate(&Expression::ThisRef.index(Expression::integer(5)), &ctx).unwrap().is_empty());
        assert!(evaluate(&Expression::ThisRef.index(Expression::integer(-1)), &ctx).unwrap().is_empty());
    }

    #[test]
    fn depth_limit_is_enforced() {
        let ctx = EvaluationContext::builder(Collection::empty())
            .limits(crate::config::Limits {
                max_depth: 3,
                ..Default::default()
            })
            .build();
        let mut expr = Expression::integer(1);
        for _ in 0..5 {
            expr = Expression::unary(UnaryOperator::Minus, expr);
        }
        assert_eq!(evaluate(&expr, &ctx).unwrap_err().kind(), ErrorKind::InvalidExpression);
    }

    #[test]
    fn unknown_functions_are_reported() {
        let ctx = EvaluationContext::new(Collection::empty());
        let err = evaluate(&Expression::function("frobnicate", vec![]), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FunctionNotFound);
    }
}
