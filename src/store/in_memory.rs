//! InMemoryDocumentStore - BTreeMap-backed document store for testing and development.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::document::strip_system_fields;
use super::{
    DocumentKey, DocumentStore, PagedResultSet, ResultEntry, StoreError, StoredDocument,
};
use crate::config::IndexLimits;
use crate::query::{BackendQuery, Predicate, RangeBound, Selection, SortDirection, SortKey};

#[derive(Default)]
struct Documents {
    docs: BTreeMap<DocumentKey, StoredDocument>,
    next_seq: u64,
}

/// In-memory document store.
///
/// Evaluates [`Predicate`] trees directly against JSON bodies. Clone-friendly
/// via Arc.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<Documents>>,
    index: IndexLimits,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_index_limits(IndexLimits::default())
    }

    pub fn with_index_limits(index: IndexLimits) -> Self {
        Self {
            storage: Arc::new(RwLock::new(Documents::default())),
            index,
        }
    }

    /// Number of stored documents across every entity set.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Documents>, StoreError> {
        self.storage.read().map_err(|_| StoreError::poisoned())
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, Documents>, StoreError> {
        self.storage.write().map_err(|_| StoreError::poisoned())
    }

    /// Strings longer than the index limit are stored but never match
    /// term, range or prefix predicates.
    fn indexed(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s.chars().count() <= self.index.max_string_length,
            _ => true,
        }
    }

    fn matches(&self, predicate: &Predicate, doc: &StoredDocument) -> bool {
        match predicate {
            Predicate::MatchAll => true,
            Predicate::Term { field, value } => {
                if value.as_str() == Some("") {
                    return false;
                }
                any_value(doc, field, |v| {
                    self.indexed(v) && compare_values(v, value) == Some(Ordering::Equal)
                })
            }
            Predicate::Range {
                field,
                lower,
                upper,
            } => any_value(doc, field, |v| {
                self.indexed(v)
                    && satisfies(v, lower.as_ref(), Ordering::Greater)
                    && satisfies(v, upper.as_ref(), Ordering::Less)
            }),
            Predicate::Prefix { field, prefix } => any_value(doc, field, |v| {
                self.indexed(v) && v.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
            }),
            Predicate::Substring { field, needle } => {
                !needle.is_empty()
                    && any_value(doc, field, |v| {
                        v.as_str().is_some_and(|s| s.contains(needle.as_str()))
                    })
            }
            Predicate::Missing { field } => match doc.field(field) {
                None | Some(Value::Null) => true,
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            },
            Predicate::Keyword { word } => {
                let word = word.to_lowercase();
                doc.body.values().any(|v| contains_word(v, &word))
            }
            Predicate::LinkedTo { entity_type, key } => doc
                .links
                .contains(&DocumentKey::new(entity_type.as_str(), key.as_str())),
            Predicate::Not(inner) => !self.matches(inner, doc),
            Predicate::And(clauses) => clauses.iter().all(|c| self.matches(c, doc)),
            Predicate::Or(clauses) => clauses.iter().any(|c| self.matches(c, doc)),
        }
    }

    fn entry(
        docs: &BTreeMap<DocumentKey, StoredDocument>,
        doc: &StoredDocument,
        query: &BackendQuery,
    ) -> ResultEntry {
        let body = match &query.select {
            Selection::All => doc.to_json(),
            Selection::Fields(fields) => {
                let mut out = Map::new();
                for field in fields {
                    if let Some(value) = doc.body.get(field) {
                        out.insert(field.clone(), value.clone());
                    }
                }
                doc.insert_system_fields(&mut out);
                out
            }
        };

        let mut expanded = BTreeMap::new();
        for expansion in &query.expand {
            let related = doc
                .links
                .iter()
                .filter(|k| k.entity_type == expansion.target_type)
                .filter_map(|k| docs.get(k))
                .take(expansion.top as usize)
                .map(StoredDocument::to_json)
                .collect();
            expanded.insert(expansion.navigation.clone(), related);
        }

        ResultEntry {
            key: doc.key.clone(),
            etag: doc.etag(),
            body,
            expanded,
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn execute(&self, query: &BackendQuery) -> Result<PagedResultSet, StoreError> {
        let storage = self.read()?;
        let mut hits: Vec<&StoredDocument> = storage
            .docs
            .values()
            .filter(|d| d.key.entity_type == query.entity_type)
            .filter(|d| self.matches(&query.predicate, d))
            .collect();
        hits.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let matched = hits.len();
        let results: Vec<ResultEntry> = hits
            .into_iter()
            .skip(query.skip as usize)
            .take(query.top as usize)
            .map(|d| Self::entry(&storage.docs, d, query))
            .collect();

        debug!(
            entity_type = %query.entity_type,
            matched,
            returned = results.len(),
            "query executed"
        );
        Ok(PagedResultSet {
            results,
            count: query.inline_count.then_some(matched as u64),
        })
    }

    fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.read()?.docs.get(key).cloned())
    }

    fn write(
        &self,
        key: &DocumentKey,
        mut body: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> Result<StoredDocument, StoreError> {
        strip_system_fields(&mut body);
        let now = Utc::now().timestamp_millis();
        let mut guard = self.write_lock()?;
        let storage = &mut *guard;

        match storage.docs.get_mut(key) {
            Some(existing) => {
                match expected_version {
                    Some(0) => {
                        return Err(StoreError::AlreadyExists {
                            key: key.to_string(),
                        })
                    }
                    Some(expected) if expected != existing.version => {
                        return Err(StoreError::VersionConflict {
                            key: key.to_string(),
                            expected,
                            actual: existing.version,
                        })
                    }
                    _ => {}
                }
                existing.body = body;
                existing.version += 1;
                existing.updated = now.max(existing.updated);
                Ok(existing.clone())
            }
            None => {
                if matches!(expected_version, Some(v) if v != 0) {
                    return Err(StoreError::NotFound {
                        key: key.to_string(),
                    });
                }
                storage.next_seq += 1;
                let doc = StoredDocument {
                    key: key.clone(),
                    body,
                    published: now,
                    updated: now,
                    version: 1,
                    links: BTreeSet::new(),
                    seq: storage.next_seq,
                };
                storage.docs.insert(key.clone(), doc.clone());
                Ok(doc)
            }
        }
    }

    fn remove(
        &self,
        key: &DocumentKey,
        expected_version: Option<u64>,
    ) -> Result<StoredDocument, StoreError> {
        let mut guard = self.write_lock()?;
        let storage = &mut *guard;

        let actual = storage
            .docs
            .get(key)
            .map(|d| d.version)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        if let Some(expected) = expected_version {
            if expected != actual {
                return Err(StoreError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let removed = storage.docs.remove(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        for partner in &removed.links {
            if let Some(doc) = storage.docs.get_mut(partner) {
                doc.links.remove(key);
            }
        }
        Ok(removed)
    }

    fn link(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool, StoreError> {
        if a == b {
            return Err(StoreError::Invalid {
                key: a.to_string(),
                message: "an entity cannot link to itself".into(),
            });
        }
        let mut storage = self.write_lock()?;
        for key in [a, b] {
            if !storage.docs.contains_key(key) {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                });
            }
        }
        let mut added = false;
        if let Some(doc) = storage.docs.get_mut(a) {
            added = doc.links.insert(b.clone());
        }
        if let Some(doc) = storage.docs.get_mut(b) {
            doc.links.insert(a.clone());
        }
        Ok(added)
    }

    fn unlink(&self, a: &DocumentKey, b: &DocumentKey) -> Result<bool, StoreError> {
        let mut storage = self.write_lock()?;
        let mut removed = false;
        if let Some(doc) = storage.docs.get_mut(a) {
            removed = doc.links.remove(b);
        }
        if let Some(doc) = storage.docs.get_mut(b) {
            doc.links.remove(a);
        }
        Ok(removed)
    }

    fn keys(&self, entity_type: &str) -> Result<Vec<DocumentKey>, StoreError> {
        Ok(self
            .read()?
            .docs
            .keys()
            .filter(|k| k.entity_type == entity_type)
            .cloned()
            .collect())
    }
}

/// Apply `test` to a field; on a list field any element may satisfy it.
fn any_value(doc: &StoredDocument, field: &str, test: impl Fn(&Value) -> bool) -> bool {
    match doc.field(field) {
        Some(Value::Array(items)) => items.iter().any(test),
        Some(value) => test(&value),
        None => false,
    }
}

/// Compare two JSON scalars of the same kind. Numbers compare by value, so
/// `5` equals `5.0`.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Check `value` against one side of a range. `beyond` is the ordering that
/// satisfies the bound strictly.
fn satisfies(value: &Value, bound: Option<&RangeBound>, beyond: Ordering) -> bool {
    let Some(bound) = bound else {
        return true;
    };
    match compare_values(value, &bound.value) {
        Some(Ordering::Equal) => bound.inclusive,
        Some(ord) => ord == beyond,
        None => false,
    }
}

fn contains_word(value: &Value, word: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(word),
        Value::Array(items) => items.iter().any(|v| contains_word(v, word)),
        _ => false,
    }
}

/// Stable multi-key order. Missing and null values sort last in either
/// direction; ties fall back to insertion order.
fn compare_documents(a: &StoredDocument, b: &StoredDocument, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let left = a.field(&key.property).filter(|v| !v.is_null());
        let right = b.field(&key.property).filter(|v| !v.is_null());
        let ord = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(&x, &y).unwrap_or(Ordering::Equal);
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.seq.cmp(&b.seq)
}
