//! # Collections
//!
//! Every FHIRPath expression evaluates to an ordered collection of values. An
//! empty collection stands for "no value" and propagates through most
//! operators; a one-element collection is a singleton.
//!
//! Set-style operations (`union`, `intersect`, `exclude`, `distinct`) keep the
//! first occurrence of each element in its original position and decide
//! membership with [`Value::equal`], so values whose equality is unknown are
//! treated as distinct.

use std::slice;
use std::vec;

use crate::evaluation_error::EvaluationError;
use crate::object::json_to_collection;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    items: Vec<Value>,
}

impl Collection {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Self {
            items: vec![value.into()],
        }
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Converts a JSON document into a collection; a top-level array becomes
    /// one element per entry.
    pub fn from_json(json: &serde_json::Value) -> Self {
        json_to_collection(json, None)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, EvaluationError> {
        let json: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_json(&json))
    }

    pub fn boolean(value: bool) -> Self {
        Self::single(Value::Boolean(value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.items
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    pub fn extend(&mut self, other: Collection) {
        self.items.extend(other.items);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&Value> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&Value> {
        self.items.last()
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// The single element, `None` for an empty collection, or
    /// `SingletonExpected` naming `operation` when there is more than one.
    pub fn singleton(&self, operation: &str) -> Result<Option<&Value>, EvaluationError> {
        match self.items.len() {
            0 => Ok(None),
            1 => Ok(self.items.first()),
            n => Err(EvaluationError::singleton_expected(operation, n)),
        }
    }

    /// `single()`: the collection itself when it has at most one element.
    pub fn single_or_error(&self) -> Result<Collection, EvaluationError> {
        Ok(self.singleton("single()")?.cloned().into_iter().collect())
    }

    /// Whether an element equal to `value` is present.
    pub fn contains_value(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item.equal(value) == Some(true))
    }

    pub fn distinct(&self) -> Collection {
        let mut out = Collection::empty();
        for item in &self.items {
            if !out.contains_value(item) {
                out.items.push(item.clone());
            }
        }
        out
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct().len() == self.len()
    }

    /// Merged, de-duplicated elements of both collections.
    pub fn union(&self, other: &Collection) -> Collection {
        let mut out = self.distinct();
        for item in &other.items {
            if !out.contains_value(item) {
                out.items.push(item.clone());
            }
        }
        out
    }

    /// Concatenation without de-duplication.
    pub fn combine(&self, other: &Collection) -> Collection {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        Collection { items }
    }

    pub fn intersect(&self, other: &Collection) -> Collection {
        let mut out = Collection::empty();
        for item in &self.items {
            if other.contains_value(item) && !out.contains_value(item) {
                out.items.push(item.clone());
            }
        }
        out
    }

    /// Elements not present in `other`. Duplicates are kept.
    pub fn exclude(&self, other: &Collection) -> Collection {
        self.items
            .iter()
            .filter(|item| !other.contains_value(item))
            .cloned()
            .collect()
    }

    pub fn subset_of(&self, other: &Collection) -> bool {
        self.items.iter().all(|item| other.contains_value(item))
    }

    pub fn superset_of(&self, other: &Collection) -> bool {
        other.subset_of(self)
    }

    pub fn tail(&self) -> Collection {
        self.skip(1)
    }

    pub fn skip(&self, n: usize) -> Collection {
        self.items.iter().skip(n).cloned().collect()
    }

    pub fn take(&self, n: usize) -> Collection {
        self.items.iter().take(n).cloned().collect()
    }

    fn booleans(&self) -> impl Iterator<Item = bool> + '_ {
        self.items.iter().filter_map(Value::as_bool)
    }

    /// Boolean reductions ignore non-Boolean elements.
    pub fn all_true(&self) -> bool {
        self.booleans().all(|b| b)
    }

    pub fn any_true(&self) -> bool {
        self.booleans().any(|b| b)
    }

    pub fn all_false(&self) -> bool {
        self.booleans().all(|b| !b)
    }

    pub fn any_false(&self) -> bool {
        self.booleans().any(|b| !b)
    }
}

impl From<Value> for Collection {
    fn from(value: Value) -> Self {
        Collection::single(value)
    }
}

impl From<Vec<Value>> for Collection {
    fn from(items: Vec<Value>) -> Self {
        Collection { items }
    }
}

impl From<Option<Value>> for Collection {
    fn from(value: Option<Value>) -> Self {
        value.into_iter().collect()
    }
}

impl FromIterator<Value> for Collection {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Collection {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Collection {
    type Item = Value;
    type IntoIter = vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Value;
    type IntoIter = slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
