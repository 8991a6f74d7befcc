//! CoreEngine - the consumer-facing surface of the crate.
//!
//! Turns raw query options into a [`BackendQuery`] and runs operations
//! under a resource lock.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::CoreConfig;
use crate::coordinator::MutationCoordinator;
use crate::edm::SchemaRegistry;
use crate::error::{CoreError, Result};
use crate::filter::{parse, validate};
use crate::lock::{InMemoryLockManager, LockError, LockKind, LockManager, ResourceKey};
use crate::query::{translate, BackendQuery, LinkAnchor, QueryOptions, QueryRequest};
use crate::store::DocumentKey;

pub struct CoreEngine<S, M = InMemoryLockManager> {
    schema: Arc<S>,
    locks: Arc<M>,
    config: CoreConfig,
}

impl<S: SchemaRegistry> CoreEngine<S, InMemoryLockManager> {
    /// Engine with a process-local lock manager using the configured lease.
    pub fn new(schema: Arc<S>, config: CoreConfig) -> Self {
        let locks = Arc::new(InMemoryLockManager::with_lease(config.lock.lease()));
        Self::with_lock_manager(schema, locks, config)
    }
}

impl<S: SchemaRegistry, M: LockManager> CoreEngine<S, M> {
    pub fn with_lock_manager(schema: Arc<S>, locks: Arc<M>, config: CoreConfig) -> Self {
        Self {
            schema,
            locks,
            config,
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn locks(&self) -> &Arc<M> {
        &self.locks
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// A coordinator sharing this engine's lock manager and timeout.
    pub fn coordinator<D, R>(
        &self,
        documents: Arc<D>,
        resources: Arc<R>,
    ) -> MutationCoordinator<M, D, R> {
        MutationCoordinator::new(
            Arc::clone(&self.locks),
            documents,
            resources,
            &self.config.lock,
        )
    }

    /// Parse, validate and translate the options of a list request.
    ///
    /// Paging and the other options are checked before the filter is
    /// parsed, so a bad `$top` is reported even when the filter is also bad.
    pub fn parse_query(&self, entity_type: &str, request: &QueryRequest) -> Result<BackendQuery> {
        self.build(entity_type, request, None)
    }

    /// [`parse_query`](Self::parse_query) on a raw URL query string.
    pub fn parse_query_string(&self, entity_type: &str, raw: &str) -> Result<BackendQuery> {
        self.parse_query(entity_type, &QueryRequest::from_query_string(raw))
    }

    pub fn parse_and_validate(
        &self,
        filter: Option<&str>,
        top: Option<&str>,
        skip: Option<&str>,
        orderby: Option<&str>,
        expand: Option<&str>,
        entity_type: &str,
    ) -> Result<BackendQuery> {
        let request = QueryRequest {
            filter: filter.map(str::to_string),
            top: top.map(str::to_string),
            skip: skip.map(str::to_string),
            orderby: orderby.map(str::to_string),
            expand: expand.map(str::to_string),
            ..QueryRequest::default()
        };
        self.parse_query(entity_type, &request)
    }

    /// Query the entities reachable from `source` over `navigation`.
    pub fn parse_navigation_query(
        &self,
        source: &DocumentKey,
        navigation: &str,
        request: &QueryRequest,
    ) -> Result<BackendQuery> {
        let np = self
            .schema
            .navigation_property(&source.entity_type, navigation)
            .ok_or_else(|| CoreError::not_found(format!("{}/{}", source, navigation)))?;
        let anchor = LinkAnchor {
            entity_type: source.entity_type.clone(),
            key: source.key.clone(),
        };
        self.build(&np.target_type, request, Some(anchor))
    }

    fn build(
        &self,
        entity_type: &str,
        request: &QueryRequest,
        anchor: Option<LinkAnchor>,
    ) -> Result<BackendQuery> {
        if !self.schema.has_entity_type(entity_type) {
            return Err(CoreError::not_found(entity_type));
        }
        let registry: &dyn SchemaRegistry = self.schema.as_ref();
        let mut options = QueryOptions::parse(request, entity_type, registry, &self.config.query)?;
        if let Some(anchor) = anchor {
            options = options.with_anchor(anchor);
        }
        let typed = match request.filter.as_deref() {
            Some(filter) => Some(validate(&parse(filter)?, entity_type, registry)?),
            None => None,
        };
        let query = translate(typed.as_ref(), &options);
        debug!(
            entity_type,
            top = query.top,
            skip = query.skip,
            predicate = ?query.predicate,
            "query translated"
        );
        Ok(query)
    }

    /// Run `operation` while holding the lock for `key`. `None` uses the
    /// configured timeout.
    pub fn with_lock<T>(
        &self,
        key: &ResourceKey,
        kind: LockKind,
        timeout: Option<Duration>,
        operation: impl FnOnce() -> T,
    ) -> std::result::Result<T, LockError> {
        let timeout = timeout.unwrap_or_else(|| self.config.lock.timeout());
        let guard = self.locks.acquire(key, kind, timeout)?;
        let result = operation();
        drop(guard);
        Ok(result)
    }
}
