use kestrel_fhirpath_support::{Collection, EvaluationError, Value};
use tracing::info;

use crate::ast::Expression;
use crate::context::EvaluationContext;
use crate::evaluator::{check_arity, eval};
use crate::json_utils::collection_to_json;

/// Implements the FHIRPath trace() function
///
/// Syntax: trace(name: String [, projection: expression]) : collection
///
/// Logs the input (or the projection of each input element) under `name` at
/// `info` level on the `fhirpath::trace` target, records it on the context so
/// callers can read it back through
/// [`EvaluationContext::trace_outputs`], and returns the input unchanged.
///
/// # Examples
///
/// ```text
/// Patient.name.trace('names').given          // logs every HumanName
/// Patient.name.trace('family', family).given // logs only the family names
/// ```
pub fn evaluate_trace(
    input: &Collection,
    args: &[Expression],
    ctx: &EvaluationContext,
    depth: usize,
) -> Result<Collection, EvaluationError> {
    check_arity("trace", args, 1, Some(2))?;
    let name_arg = eval(&args[0], ctx, depth + 1)?;
    let name = match name_arg.singleton("trace() name")? {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(EvaluationError::TypeError(format!(
                "trace() expects a String name, found {}",
                other.type_name()
            )));
        }
        None => {
            return Err(EvaluationError::TypeError(
                "trace() requires a name".to_string(),
            ));
        }
    };

    let traced = match args.get(1) {
        Some(projection) => {
            let mut projected = Collection::empty();
            for (index, item) in input.iter().enumerate() {
                projected.extend(eval(projection, &ctx.with_item(item, index), depth + 1)?);
            }
            projected
        }
        None => input.clone(),
    };

    info!(
        target: "fhirpath::trace",
        name = %name,
        count = traced.len(),
        values = %collection_to_json(&traced),
        "trace"
    );
    ctx.record_trace(&name, traced);
    Ok(input.clone())
}
