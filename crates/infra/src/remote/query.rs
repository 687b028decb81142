//! Filter expressions for the store's query language.
//!
//! Only the subset the pipeline needs: `field in (...)` conditions joined by
//! `and`, `order by field asc|desc`, and the pagination clause appended at
//! render time. The same structure is evaluated directly by the in-memory
//! store.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use stockrecon_core::Record;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Condition {
    In { field: String, values: Vec<String> },
}

/// Filter + ordering, without pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    conditions: Vec<Condition>,
    order_by: Vec<(String, SortOrder)>,
}

impl Query {
    /// Empty filter: every record, store default order.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.conditions.push(Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.order_by.is_empty()
    }

    /// Render the filter and ordering clauses.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();

        let conditions: Vec<String> = self
            .conditions
            .iter()
            .map(|c| match c {
                Condition::In { field, values } => {
                    let list: Vec<String> = values.iter().map(|v| quote(v)).collect();
                    format!("{field} in ({})", list.join(", "))
                }
            })
            .collect();
        if !conditions.is_empty() {
            parts.push(conditions.join(" and "));
        }

        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|(field, order)| format!("{field} {}", order.as_str()))
                .collect();
            parts.push(format!("order by {}", keys.join(", ")));
        }

        parts.join(" ")
    }

    /// Render with the pagination clause appended.
    pub fn render_page(&self, limit: usize, offset: usize) -> String {
        let base = self.render();
        let page = format!("limit {limit} offset {offset}");
        if base.is_empty() {
            page
        } else {
            format!("{base} {page}")
        }
    }

    /// Evaluate the conditions against a record.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::In { field, values } => record
                .text(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v.as_ref())),
        })
    }

    /// Sort records by the ordering clauses. Values that both parse as
    /// integers compare numerically; anything else compares as text, and
    /// missing values sort first.
    pub fn sort(&self, records: &mut [Record]) {
        if self.order_by.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for (field, order) in &self.order_by {
                let ord = compare_field(a, b, field);
                let ord = match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    match (a.text(field), b.text(field)) {
        (Some(x), Some(y)) => match (x.parse::<i64>(), y.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(&y),
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Double-quoted string literal with `\` and `"` escaped.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
