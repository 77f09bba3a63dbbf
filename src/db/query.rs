// Logical list query shared by every backend
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum FilterValue {
    Text(String),
    Uuid(Uuid),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => write!(f, "{}", s),
            FilterValue::Uuid(id) => write!(f, "{}", id),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        FilterValue::Uuid(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(value)
    }
}

/// Column names are static so they can never be taken from request input.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: &'static str, value: FilterValue },
    In { column: &'static str, values: Vec<FilterValue> },
}

impl Filter {
    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } => column,
        }
    }

    pub fn matches(&self, field: Option<&FilterValue>) -> bool {
        match (self, field) {
            (Filter::Eq { value, .. }, Some(actual)) => value == actual,
            (Filter::In { values, .. }, Some(actual)) => values.contains(actual),
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub column: &'static str,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
    pub limit: Option<u32>,
}

/// Records that can be evaluated against a `ListQuery` in process.
pub trait Filterable {
    fn field(&self, column: &str) -> Option<FilterValue>;
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Eq { column, value: value.into() });
        self
    }

    pub fn in_<V: Into<FilterValue>>(mut self, column: &'static str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(Ordering { column, ascending });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render as PostgREST query parameters.
    pub fn to_postgrest_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        for filter in &self.filters {
            match filter {
                Filter::Eq { column, value } => {
                    params.push((column.to_string(), format!("eq.{}", value)));
                }
                Filter::In { column, values } => {
                    let list: Vec<String> = values.iter().map(quote_list_item).collect();
                    params.push((column.to_string(), format!("in.({})", list.join(","))));
                }
            }
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Filter, order and truncate an in-memory collection.
    pub fn apply<T: Filterable + Clone>(&self, records: impl IntoIterator<Item = T>) -> Vec<T> {
        let mut matched: Vec<T> = records
            .into_iter()
            .filter(|record| {
                self.filters
                    .iter()
                    .all(|filter| filter.matches(record.field(filter.column()).as_ref()))
            })
            .collect();

        if let Some(order) = &self.order {
            matched.sort_by(|a, b| {
                let ord = a
                    .field(order.column)
                    .partial_cmp(&b.field(order.column))
                    .unwrap_or(std::cmp::Ordering::Equal);
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit as usize);
        }
        matched
    }
}

// PostgREST list items containing reserved characters must be double-quoted
fn quote_list_item(value: &FilterValue) -> String {
    let raw = value.to_string();
    if raw.contains(|c: char| matches!(c, ',' | '(' | ')' | '"' | ' ')) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgrest_params() {
        let a = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap();
        let b = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap();
        let query = ListQuery::new()
            .eq("is_published", true)
            .in_("author_id", [a, b])
            .order_by("created_at", false)
            .limit(10);

        assert_eq!(
            query.to_postgrest_params(),
            vec![
                ("is_published".to_string(), "eq.true".to_string()),
                (
                    "author_id".to_string(),
                    "in.(550e8400-e29b-41d4-a716-446655440001,550e8400-e29b-41d4-a716-446655440002)".to_string()
                ),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_in_list_quotes_reserved_characters() {
        let query = ListQuery::new().in_("category", ["help", "tips, tricks"]);
        assert_eq!(
            query.to_postgrest_params()[0].1,
            "in.(help,\"tips, tricks\")"
        );
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Row {
        n: i32,
        tag: &'static str,
    }

    impl Filterable for Row {
        fn field(&self, column: &str) -> Option<FilterValue> {
            match column {
                "tag" => Some(FilterValue::from(self.tag)),
                "n" => Some(FilterValue::Text(format!("{:03}", self.n))),
                _ => None,
            }
        }
    }

    #[test]
    fn test_apply_filters_orders_and_limits() {
        let rows = vec![
            Row { n: 1, tag: "a" },
            Row { n: 3, tag: "a" },
            Row { n: 2, tag: "b" },
            Row { n: 5, tag: "a" },
        ];
        let query = ListQuery::new().eq("tag", "a").order_by("n", false).limit(2);
        let result = query.apply(rows);
        assert_eq!(result, vec![Row { n: 5, tag: "a" }, Row { n: 3, tag: "a" }]);
    }

    #[test]
    fn test_unknown_column_never_matches() {
        let rows = vec![Row { n: 1, tag: "a" }];
        assert!(ListQuery::new().eq("missing", "x").apply(rows).is_empty());
    }
}
