//! # Operator Semantics
//!
//! Binary operators applied to already-evaluated operand collections. The
//! evaluator decides whether the right operand needs evaluating at all
//! (`and`, `or` and `implies` short-circuit) and then delegates here.
//!
//! ## Empty and singleton rules
//!
//! Arithmetic and relational operators return empty when either operand is
//! empty and fail with `SingletonExpected` when either has more than one
//! element. `=` and `!=` return empty for empty or multi-element operands.
//! `~` and `!~` always produce a Boolean: empty is equivalent to empty, and
//! multi-element collections are equivalent when their elements pair up
//! regardless of order.

use std::cmp::Ordering;

use kestrel_fhirpath_support::{Collection, ComparisonError, EvaluationError, Value};

use crate::ast::BinaryOperator;
use crate::boolean_functions::{self, logical_result, singleton_boolean};

pub fn apply_binary(
    op: BinaryOperator,
    left: &Collection,
    right: &Collection,
) -> Result<Collection, EvaluationError> {
    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Div
        | BinaryOperator::Mod => arithmetic(op, left, right),
        BinaryOperator::Concatenate => concatenate(left, right),
        BinaryOperator::Union => Ok(left.union(right)),
        BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterOrEqual => relational(op, left, right),
        BinaryOperator::Equal => Ok(logical_result(equality(left, right))),
        BinaryOperator::NotEqual => Ok(logical_result(equality(left, right).map(|b| !b))),
        BinaryOperator::Equivalent => Ok(Collection::boolean(equivalence(left, right))),
        BinaryOperator::NotEquivalent => Ok(Collection::boolean(!equivalence(left, right))),
        BinaryOperator::In => membership(op, left, right),
        BinaryOperator::Contains => membership(op, right, left),
        BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor | BinaryOperator::Implies => {
            let l = singleton_boolean(left, op.symbol())?;
            let r = singleton_boolean(right, op.symbol())?;
            Ok(logical_result(logical(op, l, r)))
        }
    }
}

/// Combines two three-valued operands with a logical operator.
pub fn logical(op: BinaryOperator, left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match op {
        BinaryOperator::And => boolean_functions::and(left, right),
        BinaryOperator::Or => boolean_functions::or(left, right),
        BinaryOperator::Xor => boolean_functions::xor(left, right),
        BinaryOperator::Implies => boolean_functions::implies(left, right),
        _ => None,
    }
}

/// The single elements of both operands, `None` when either is empty.
fn singleton_operands<'a>(
    op: BinaryOperator,
    left: &'a Collection,
    right: &'a Collection,
) -> Result<Option<(&'a Value, &'a Value)>, EvaluationError> {
    if left.is_empty() || right.is_empty() {
        return Ok(None);
    }
    if left.len() > 1 || right.len() > 1 {
        return Err(EvaluationError::singleton_expected(
            format!("'{}' operator", op.symbol()),
            left.len() + right.len(),
        ));
    }
    Ok(left.first().zip(right.first()))
}

fn arithmetic(op: BinaryOperator, left: &Collection, right: &Collection) -> Result<Collection, EvaluationError> {
    let Some((l, r)) = singleton_operands(op, left, right)? else {
        return Ok(Collection::empty());
    };
    let result = match op {
        BinaryOperator::Add => l.add(r),
        BinaryOperator::Subtract => l.subtract(r),
        BinaryOperator::Multiply => l.multiply(r),
        BinaryOperator::Divide => l.divide(r),
        BinaryOperator::Div => l.div(r),
        BinaryOperator::Mod => l.modulo(r),
        _ => unreachable!("arithmetic called with {:?}", op),
    }?;
    Ok(result.into())
}

/// `&`: string concatenation where empty counts as the empty string.
fn concatenate(left: &Collection, right: &Collection) -> Result<Collection, EvaluationError> {
    let as_text = |operand: &Collection| -> Result<String, EvaluationError> {
        Ok(operand
            .singleton("'&' operator")?
            .and_then(Value::convert_to_string)
            .unwrap_or_default())
    };
    Ok(Collection::single(format!("{}{}", as_text(left)?, as_text(right)?)))
}

fn relational(op: BinaryOperator, left: &Collection, right: &Collection) -> Result<Collection, EvaluationError> {
    let Some((l, r)) = singleton_operands(op, left, right)? else {
        return Ok(Collection::empty());
    };
    let ordering = match l.compare(r) {
        Ok(ordering) => ordering,
        Err(ComparisonError::Ambiguous) => return Ok(Collection::empty()),
        Err(ComparisonError::Incomparable { .. } | ComparisonError::IncompatibleUnits { .. }) => {
            return Err(EvaluationError::invalid_operation(
                op.symbol(),
                l.type_name(),
                r.type_name(),
            ));
        }
    };
    let result = match op {
        BinaryOperator::LessThan => ordering == Ordering::Less,
        BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
        BinaryOperator::GreaterThan => ordering == Ordering::Greater,
        BinaryOperator::GreaterOrEqual => ordering != Ordering::Less,
        _ => unreachable!("relational called with {:?}", op),
    };
    Ok(Collection::boolean(result))
}

/// `=`: unknown for empty or multi-element operands and for precision-ambiguous values.
pub fn equality(left: &Collection, right: &Collection) -> Option<bool> {
    if left.len() != 1 || right.len() != 1 {
        return None;
    }
    left.first()?.equal(right.first()?)
}

/// `~`: never unknown.
pub fn equivalence(left: &Collection, right: &Collection) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut unmatched: Vec<&Value> = right.iter().collect();
    for item in left {
        match unmatched.iter().position(|candidate| item.equivalent(candidate)) {
            Some(pos) => {
                unmatched.swap_remove(pos);
            }
            None => return false,
        }
    }
    true
}

/// `in` (and `contains` with operands swapped).
fn membership(op: BinaryOperator, item: &Collection, container: &Collection) -> Result<Collection, EvaluationError> {
    let Some(item) = item.singleton(&format!("'{}' operator", op.symbol()))? else {
        return Ok(Collection::empty());
    };
    Ok(Collection::boolean(container.contains_value(item)))
}
