//! # FHIRPath Date Functions
//!
//! `now()`, `today()` and `timeOfDay()`. All three read the instant captured
//! when the evaluation context was built, so repeated calls within one
//! evaluation agree with each other.

use kestrel_fhirpath_support::{
    Collection, PrecisionDate, PrecisionDateTime, PrecisionTime, Value,
};

use crate::context::EvaluationContext;
use crate::registry::FunctionRegistry;

pub fn now(ctx: &EvaluationContext) -> Value {
    Value::DateTime(PrecisionDateTime::from_chrono(ctx.now()))
}

pub fn today(ctx: &EvaluationContext) -> Value {
    Value::Date(PrecisionDate::from_naive(ctx.now().date_naive()))
}

pub fn time_of_day(ctx: &EvaluationContext) -> Value {
    Value::Time(PrecisionTime::from_naive(ctx.now().time()))
}

pub(crate) fn register(registry: &FunctionRegistry) {
    registry.define("now", 0, Some(0), |_, _, ctx| Ok(Collection::single(now(ctx))));
    registry.define("today", 0, Some(0), |_, _, ctx| Ok(Collection::single(today(ctx))));
    registry.define("timeOfDay", 0, Some(0), |_, _, ctx| {
        Ok(Collection::single(time_of_day(ctx)))
    });
}
