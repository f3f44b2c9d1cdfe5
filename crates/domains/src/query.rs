//! # Store Query Language
//!
//! The minimal vocabulary services use to talk to a `DocumentStore`:
//! equality filters, ordered field mutations and sorted, limited reads.
//! Records travel as JSON documents so one adapter contract fits both
//! the relational and the document-oriented backends.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::StoreResult;
use crate::models::BoardName;

/// A persisted record.
pub type Document = Map<String, Value>;

/// The two logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Threads,
    Replies,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Threads => "threads",
            Table::Replies => "replies",
        }
    }
}

/// The target of a store call: a logical table on a board.
///
/// Shared-table adapters route on `table` alone; container adapters route
/// on the pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collection {
    pub board: BoardName,
    pub table: Table,
}

impl Collection {
    pub fn threads(board: &BoardName) -> Self {
        Self {
            board: board.clone(),
            table: Table::Threads,
        }
    }

    pub fn replies(board: &BoardName) -> Self {
        Self {
            board: board.clone(),
            table: Table::Replies,
        }
    }
}

/// Conjunction of field equalities. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_owned(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// The filter as a JSON object, e.g. for containment queries.
    pub fn to_document(&self) -> Document {
        self.conditions.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Replace the field's value
    Set(String, Value),
    /// Concatenate a suffix onto a string field (missing counts as empty)
    AppendText(String, String),
    /// Push a value onto an array field (missing counts as empty)
    Push(String, Value),
}

/// Ordered list of field operations applied to one matched record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    ops: Vec<MutationOp>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::Set(field.to_owned(), value.into()));
        self
    }

    pub fn append_text(mut self, field: &str, suffix: impl Into<String>) -> Self {
        self.ops
            .push(MutationOp::AppendText(field.to_owned(), suffix.into()));
        self
    }

    pub fn push(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(MutationOp::Push(field.to_owned(), value.into()));
        self
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn apply(&self, doc: &mut Document) {
        for op in &self.ops {
            match op {
                MutationOp::Set(field, value) => {
                    doc.insert(field.clone(), value.clone());
                }
                MutationOp::AppendText(field, suffix) => {
                    let current = doc.get(field).and_then(Value::as_str).unwrap_or_default();
                    let joined = format!("{current}{suffix}");
                    doc.insert(field.clone(), Value::String(joined));
                }
                MutationOp::Push(field, value) => match doc.get_mut(field) {
                    Some(Value::Array(items)) => items.push(value.clone()),
                    _ => {
                        doc.insert(field.clone(), Value::Array(vec![value.clone()]));
                    }
                },
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// A filtered, projected, sorted and limited read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    /// Fields to keep; `id` is always kept. `None` keeps everything.
    pub projection: Option<Vec<String>>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn newest_first(mut self, field: &str) -> Self {
        self.sort = Some(Sort {
            field: field.to_owned(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = Some(fields.iter().map(|f| (*f).to_owned()).collect());
        self
    }

    /// Drops every field the projection does not name.
    pub fn project_document(&self, doc: Document) -> Document {
        match &self.projection {
            None => doc,
            Some(fields) => doc
                .into_iter()
                .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                .collect(),
        }
    }

    /// Orders two documents by the sort key, then by `id` in the same direction.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let Some(sort) = &self.sort else {
            return Ordering::Equal;
        };
        let ordering = compare_values(a.get(&sort.field), b.get(&sort.field))
            .then_with(|| compare_values(a.get("id"), b.get("id")));
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Number of records an update matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
}

/// Number of records a delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(crate::errors::StoreError::Backend(format!(
            "expected a JSON object record, got {other}"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}
