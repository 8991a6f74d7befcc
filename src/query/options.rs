//! System query options: decoding from a raw query string and checking them
//! against the configured limits.

use super::error::QueryError;
use crate::config::QueryLimits;
use crate::edm::{is_navigation_property_name, is_reserved_name, SchemaRegistry};
use crate::filter::is_valid_property_name;

/// Raw, decoded query options as supplied by the caller.
///
/// When a parameter is repeated only its first occurrence is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub filter: Option<String>,
    pub top: Option<String>,
    pub skip: Option<String>,
    pub orderby: Option<String>,
    pub expand: Option<String>,
    pub select: Option<String>,
    pub inlinecount: Option<String>,
    /// The `q` full-text keyword parameter.
    pub keyword: Option<String>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a URL query string such as `?$filter=a+eq+1&$top=5`.
    ///
    /// Unknown parameters are ignored.
    pub fn from_query_string(raw: &str) -> Self {
        let mut request = QueryRequest::default();
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let name = percent_decode(name);
            let slot = match name.as_str() {
                "$filter" => &mut request.filter,
                "$top" => &mut request.top,
                "$skip" => &mut request.skip,
                "$orderby" => &mut request.orderby,
                "$expand" => &mut request.expand,
                "$select" => &mut request.select,
                "$inlinecount" => &mut request.inlinecount,
                "q" => &mut request.keyword,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(percent_decode(value));
            }
        }
        request
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn top(mut self, top: impl ToString) -> Self {
        self.top = Some(top.to_string());
        self
    }

    pub fn skip(mut self, skip: impl ToString) -> Self {
        self.skip = Some(skip.to_string());
        self
    }

    pub fn orderby(mut self, orderby: impl Into<String>) -> Self {
        self.orderby = Some(orderby.into());
        self
    }

    pub fn expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn inlinecount(mut self, inlinecount: impl Into<String>) -> Self {
        self.inlinecount = Some(inlinecount.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes pass through.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub property: String,
    pub direction: SortDirection,
}

/// Projection requested with `$select`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Fields(Vec<String>),
}

/// A navigation property to inline with each result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub navigation: String,
    pub target_type: String,
    /// Related entities inlined per result.
    pub top: u32,
}

/// Restricts results to entities linked to one anchor entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAnchor {
    pub entity_type: String,
    pub key: String,
}

/// Query options after parsing and limit checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub entity_type: String,
    pub top: u32,
    pub skip: u32,
    pub orderby: Vec<SortKey>,
    pub expand: Vec<Expansion>,
    pub select: Selection,
    pub inline_count: bool,
    pub keywords: Vec<String>,
    pub anchor: Option<LinkAnchor>,
}

impl QueryOptions {
    /// Parse every option except `$filter`.
    pub fn parse(
        request: &QueryRequest,
        entity_type: &str,
        registry: &dyn SchemaRegistry,
        limits: &QueryLimits,
    ) -> Result<Self, QueryError> {
        let expand = match &request.expand {
            Some(raw) => parse_expand(raw, entity_type, registry, limits)?,
            None => Vec::new(),
        };
        let top_max = if expand.is_empty() {
            limits.top_max
        } else {
            limits.expand_top_max
        };
        let top = parse_bounded("top", request.top.as_deref(), top_max)?
            .unwrap_or(limits.default_top.min(top_max));
        let skip = parse_bounded("skip", request.skip.as_deref(), limits.skip_max)?.unwrap_or(0);

        let orderby = match &request.orderby {
            Some(raw) => parse_orderby(raw)?,
            None => Vec::new(),
        };
        let select = match &request.select {
            Some(raw) => parse_select(raw)?,
            None => Selection::All,
        };
        let inline_count = match request.inlinecount.as_deref() {
            None | Some("none") => false,
            Some("allpages") => true,
            Some(other) => return Err(QueryError::InlineCount(other.to_string())),
        };
        let keywords = match &request.keyword {
            Some(raw) => parse_keywords(raw, limits.keyword_max_bytes)?,
            None => Vec::new(),
        };

        Ok(QueryOptions {
            entity_type: entity_type.to_string(),
            top,
            skip,
            orderby,
            expand,
            select,
            inline_count,
            keywords,
            anchor: None,
        })
    }

    pub fn with_anchor(mut self, anchor: LinkAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

fn parse_bounded(
    param: &'static str,
    raw: Option<&str>,
    max: u32,
) -> Result<Option<u32>, QueryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: i64 = raw.trim().parse().map_err(|_| QueryError::InvalidParam {
        param,
        value: raw.to_string(),
    })?;
    if value < 0 || value > i64::from(max) {
        return Err(QueryError::LimitExceeded { param, value, max });
    }
    Ok(Some(value as u32))
}

fn parse_expand(
    raw: &str,
    entity_type: &str,
    registry: &dyn SchemaRegistry,
    limits: &QueryLimits,
) -> Result<Vec<Expansion>, QueryError> {
    let mut names: Vec<&str> = Vec::new();
    for item in raw.split(',').map(str::trim) {
        if item.is_empty() {
            return Err(QueryError::Expand(format!("empty item in '{}'", raw)));
        }
        if !names.contains(&item) {
            names.push(item);
        }
    }
    if names.len() > limits.expand_property_max {
        return Err(QueryError::ExpandCountExceeded {
            count: names.len(),
            max: limits.expand_property_max,
        });
    }
    names
        .into_iter()
        .map(|name| {
            let np = registry
                .navigation_property(entity_type, name)
                .ok_or_else(|| {
                    QueryError::Expand(format!(
                        "{} has no navigation property {}",
                        entity_type, name
                    ))
                })?;
            Ok(Expansion {
                navigation: np.name,
                target_type: np.target_type,
                top: limits.expand_page_size,
            })
        })
        .collect()
}

fn parse_orderby(raw: &str) -> Result<Vec<SortKey>, QueryError> {
    if raw.trim().is_empty() {
        return Err(QueryError::OrderBy("empty $orderby".into()));
    }
    raw.split(',')
        .map(|item| {
            let mut parts = item.split_whitespace();
            let property = parts
                .next()
                .ok_or_else(|| QueryError::OrderBy(format!("empty item in '{}'", raw)))?;
            if !is_sortable_name(property) {
                return Err(QueryError::OrderBy(format!("cannot sort by '{}'", property)));
            }
            let direction = match parts.next() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(other) => {
                    return Err(QueryError::OrderBy(format!("unknown direction '{}'", other)))
                }
            };
            if parts.next().is_some() {
                return Err(QueryError::OrderBy(format!("malformed item '{}'", item.trim())));
            }
            Ok(SortKey {
                property: property.to_string(),
                direction,
            })
        })
        .collect()
}

fn is_sortable_name(name: &str) -> bool {
    is_valid_property_name(name) && !is_reserved_name(name) && !is_navigation_property_name(name)
}

fn parse_select(raw: &str) -> Result<Selection, QueryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QueryError::Select("empty $select".into()));
    }
    if raw == "*" {
        return Ok(Selection::All);
    }
    let mut fields = Vec::new();
    for item in raw.split(',').map(str::trim) {
        if item == "*" {
            return Ok(Selection::All);
        }
        if !is_sortable_name(item) {
            return Err(QueryError::Select(format!("cannot select '{}'", item)));
        }
        if !fields.iter().any(|f| f == item) {
            fields.push(item.to_string());
        }
    }
    Ok(Selection::Fields(fields))
}

fn parse_keywords(raw: &str, max_bytes: usize) -> Result<Vec<String>, QueryError> {
    if raw.is_empty() || raw.len() > max_bytes {
        return Err(QueryError::Keyword(format!(
            "length must be between 1 and {} bytes",
            max_bytes
        )));
    }
    Ok(raw.split_whitespace().map(str::to_string).collect())
}
