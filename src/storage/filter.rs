//! Query predicates over stored documents.
//!
//! A `Filter` is a conjunction of predicates plus an optional sort. Field
//! names are dotted paths into the payload; `_id`, `dateCreated` and
//! `dateUpdated` address the lifecycle fields.

use crate::core::DocId;
use crate::storage::document::{Document, ID_FIELD};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
    AnyOf(Vec<Filter>),
}

impl Predicate {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Eq(field, expected) => doc.get_path(field).as_ref() == Some(expected),
            Self::In(field, candidates) => doc
                .get_path(field)
                .is_some_and(|actual| candidates.contains(&actual)),
            Self::AnyOf(filters) => filters.iter().any(|filter| filter.matches(doc)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
    sort: Option<Sort>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the document with the given identity.
    pub fn id(id: DocId) -> Self {
        Self::all().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq(field.into(), value.into()));
        self
    }

    pub fn is_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.predicates.push(Predicate::In(field.into(), values));
        self
    }

    /// Adds a disjunction: at least one of `filters` must match.
    ///
    /// Sorts attached to the inner filters are ignored.
    pub fn any_of(mut self, filters: Vec<Filter>) -> Self {
        self.predicates.push(Predicate::AnyOf(filters));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(doc))
    }

    /// Position of `a` relative to `b` under the filter's sort; `Equal` when unsorted.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let Some(sort) = &self.sort else {
            return Ordering::Equal;
        };
        let ordering = compare_values(
            a.get_path(&sort.field).as_ref(),
            b.get_path(&sort.field).as_ref(),
        );
        match sort.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over JSON values: missing/null < bool < number < string < array < object.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
