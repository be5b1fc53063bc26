//! Query string construction for collection reads.
//!
//! The appliance is sensitive to parameter order, so every builder here emits its
//! parameters in a fixed sequence. Values are percent-encoded the way the appliance
//! expects: unreserved characters and `/` stay literal, everything else is escaped.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Display;

/// Characters escaped in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-encodes a single query value.
#[must_use]
pub fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

/// Appends an encoded query string to a URI, choosing `?` or `&` as separator.
#[must_use]
pub fn append_query(uri: &str, query: &str) -> String {
    if query.is_empty() {
        return uri.to_string();
    }
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{query}")
}

/// Builder for assembling ordered query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: ToString,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append one pair per value, preserving input order.
    pub fn push_each<I, T>(&mut self, key: &'static str, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        for value in values {
            self.push(key, value);
        }
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render the parameters as `key=value&...` with encoded values.
    #[must_use]
    pub fn encode(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", encode_value(value)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append the encoded parameters to `uri`.
    #[must_use]
    pub fn append_to(&self, uri: &str) -> String {
        append_query(uri, &self.encode())
    }
}

/// Parameters of a collection read.
///
/// Encoded in the order start, count, filter(s), query, sort, view, fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// First item to return (0-based).
    pub start: u64,
    /// Number of items to return; `-1` requests all of them.
    pub count: i64,
    /// Filter expressions, each sent as its own `filter=` parameter.
    pub filters: Vec<String>,
    /// Full-text query expression.
    pub query: Option<String>,
    /// Sort expression, e.g. `name:ascending`.
    pub sort: Option<String>,
    /// Named view.
    pub view: Option<String>,
    /// Comma-separated list of fields to return.
    pub fields: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySpec {
    /// Request every item with no filtering.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: 0,
            count: -1,
            filters: Vec::new(),
            query: None,
            sort: None,
            view: None,
            fields: None,
        }
    }

    /// Request a window of `count` items starting at `start`.
    #[must_use]
    pub const fn page(start: u64, count: i64) -> Self {
        let mut spec = Self::new();
        spec.start = start;
        spec.count = count;
        spec
    }

    /// Add a filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Add several filter expressions, in order.
    #[must_use]
    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(filters.into_iter().map(Into::into));
        self
    }

    /// Set the query expression.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the sort expression.
    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the view.
    #[must_use]
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Set the fields selector.
    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// Number of items the caller asked for; `None` when `count` is negative.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.count).ok()
    }

    /// Convert into ordered query pairs.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push("start", self.start);
        params.push("count", self.count);
        params.push_each("filter", self.filters.iter().filter(|f| !f.is_empty()));
        params.push_opt("query", self.query.as_deref());
        params.push_opt("sort", self.sort.as_deref());
        params.push_opt("view", self.view.as_deref());
        params.push_opt("fields", self.fields.as_deref());
        params
    }

    /// Append the encoded query to a collection URI.
    #[must_use]
    pub fn append_to(&self, uri: &str) -> String {
        self.to_params().append_to(uri)
    }
}

/// Parameters of a utilization read.
///
/// Encoded in the order filter(s), fields, refresh, view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtilizationQuery {
    /// Filter expressions, e.g. `startDate=2016-05-30T03:29:42.361Z`.
    pub filters: Vec<String>,
    /// Metric names, joined with commas on the wire.
    pub fields: Vec<String>,
    /// Ask the appliance to refresh the samples before answering.
    pub refresh: bool,
    /// Sample aggregation view, e.g. `day`.
    pub view: Option<String>,
}

impl UtilizationQuery {
    /// Create an empty utilization query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add filters from a comma-separated expression list.
    #[must_use]
    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filters.extend(
            filter
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        );
        self
    }

    /// Add metric names.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Request a refresh.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Set the view.
    #[must_use]
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Convert into ordered query pairs.
    #[must_use]
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.push_each("filter", &self.filters);
        if !self.fields.is_empty() {
            params.push("fields", self.fields.join(","));
        }
        if self.refresh {
            params.push("refresh", "true");
        }
        params.push_opt("view", self.view.as_deref());
        params
    }
}
