//! Query builder collaborator.
//!
//! Mirrors the specification's `Query` contract: a method tag, target
//! attribute, and value list, plus the `groupByType` helper the Document
//! Engine uses to partition a flat query list into filters/selections/
//! paging/ordering/cursor before handing the filter half to the Query
//! Normalizer (§4.10) and the adapter.

use serde_json::Value;

use crate::constants::{CURSOR_AFTER, CURSOR_BEFORE, ORDER_ASC};

/// The operator a [`Query`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Contains,
    Search,
    Between,
    IsNull,
    IsNotNull,
    StartsWith,
    EndsWith,
    Select,
    Limit,
    Offset,
    OrderAsc,
    OrderDesc,
    CursorAfter,
    CursorBefore,
}

impl Method {
    pub fn is_filter(self) -> bool {
        matches!(
            self,
            Method::Equal
                | Method::NotEqual
                | Method::LessThan
                | Method::LessThanEqual
                | Method::GreaterThan
                | Method::GreaterThanEqual
                | Method::Contains
                | Method::Search
                | Method::Between
                | Method::IsNull
                | Method::IsNotNull
                | Method::StartsWith
                | Method::EndsWith
        )
    }
}

/// A single query clause.
#[derive(Debug, Clone)]
pub struct Query {
    method: Method,
    attribute: String,
    values: Vec<Value>,
}

impl Query {
    pub fn new(method: Method, attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            method,
            attribute: attribute.into(),
            values,
        }
    }

    pub fn equal(attribute: impl Into<String>, value: Value) -> Self {
        Self::new(Method::Equal, attribute, vec![value])
    }

    pub fn limit(n: u64) -> Self {
        Self::new(Method::Limit, "", vec![Value::from(n)])
    }

    pub fn offset(n: u64) -> Self {
        Self::new(Method::Offset, "", vec![Value::from(n)])
    }

    pub fn select(attributes: Vec<String>) -> Self {
        Self::new(
            Method::Select,
            "",
            attributes.into_iter().map(Value::String).collect(),
        )
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Self::new(Method::OrderAsc, attribute, vec![])
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Self::new(Method::OrderDesc, attribute, vec![])
    }

    pub fn cursor_after(id: impl Into<String>) -> Self {
        Self::new(Method::CursorAfter, "", vec![Value::String(id.into())])
    }

    pub fn cursor_before(id: impl Into<String>) -> Self {
        Self::new(Method::CursorBefore, "", vec![Value::String(id.into())])
    }

    pub fn get_method(&self) -> Method {
        self.method
    }

    pub fn get_attribute(&self) -> &str {
        &self.attribute
    }

    pub fn get_values(&self) -> &[Value] {
        &self.values
    }

    pub fn set_values(&mut self, values: Vec<Value>) {
        self.values = values;
    }
}

/// The grouped-by-type shape the Document Engine's `find`/`count`/`sum`
/// operations consume.
#[derive(Debug, Clone, Default)]
pub struct GroupedQueries {
    pub filters: Vec<Query>,
    pub selections: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub order_attributes: Vec<String>,
    /// Parallel to `order_attributes`: `"ASC"` or `"DESC"`.
    pub order_types: Vec<&'static str>,
    pub cursor: Option<String>,
    pub cursor_direction: &'static str,
}

/// Splits a flat query list into the grouped shape, applying the
/// specification's defaults (limit 25, offset 0, direction `"after"`).
pub fn group_by_type(queries: &[Query]) -> GroupedQueries {
    let mut grouped = GroupedQueries {
        limit: 25,
        offset: 0,
        cursor_direction: CURSOR_AFTER,
        ..Default::default()
    };

    for q in queries {
        match q.get_method() {
            Method::Limit => {
                if let Some(n) = q.get_values().first().and_then(Value::as_u64) {
                    grouped.limit = n;
                }
            }
            Method::Offset => {
                if let Some(n) = q.get_values().first().and_then(Value::as_u64) {
                    grouped.offset = n;
                }
            }
            Method::Select => {
                grouped.selections.extend(
                    q.get_values()
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                );
            }
            Method::OrderAsc => {
                grouped.order_attributes.push(q.get_attribute().to_string());
                grouped.order_types.push(ORDER_ASC);
            }
            Method::OrderDesc => {
                grouped.order_attributes.push(q.get_attribute().to_string());
                grouped.order_types.push(crate::constants::ORDER_DESC);
            }
            Method::CursorAfter => {
                grouped.cursor = q.get_values().first().and_then(Value::as_str).map(str::to_string);
                grouped.cursor_direction = CURSOR_AFTER;
            }
            Method::CursorBefore => {
                grouped.cursor = q.get_values().first().and_then(Value::as_str).map(str::to_string);
                grouped.cursor_direction = CURSOR_BEFORE;
            }
            m if m.is_filter() => grouped.filters.push(q.clone()),
            _ => {}
        }
    }

    grouped
}
