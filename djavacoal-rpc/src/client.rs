//! Typed in-process client with query-key derivation and cache invalidation
//!
//! A [`Client`] wraps a built [`Router`] and exposes typed `query`/`mutate`
//! calls. Every query derives a deterministic [`query_key`] from its path and
//! normalized input; responses are cached under that key with a TTL and
//! evicted LRU-first. Mutations invalidate hierarchically: a successful
//! mutation drops every cached query under its namespace, so `auth.invite`
//! clears `auth.list`, `auth.profile`, and anything nested deeper.
//!
//! Payloads pass through [`to_wire`]/[`from_wire`] on the way in and out, so
//! a NaN or infinity in an input or output fails the call instead of silently
//! degrading to `null`.

use crate::context::RequestScope;
use crate::router::Router;
use crate::wire::{from_wire, to_wire};
use crate::{scope_keys, RpcResult};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default TTL for cached query results (5 minutes).
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Default maximum number of cached query results.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// =============================================================================
// Query Keys
// =============================================================================

/// Derive the cache key for a query from its path and input.
///
/// The key is `path` and the normalized input joined by a colon. Two inputs
/// that are structurally equal produce the same key regardless of object key
/// order, so logically identical queries share one cache slot.
pub fn query_key(path: &str, input: &serde_json::Value) -> String {
    format!("{}:{}", path, normalize_json(input))
}

/// Render JSON with object keys sorted so the output is deterministic.
fn normalize_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => {
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(normalize_json).collect();
            format!("[{}]", items.join(","))
        }
        serde_json::Value::Object(obj) => {
            let mut pairs: Vec<_> = obj.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            let items: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", k, normalize_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Check whether an invalidation pattern matches a procedure path.
///
/// Supports:
/// - Exact match: `"auth.list"` matches `"auth.list"`
/// - Namespace wildcard: `"auth.*"` matches `"auth"`, `"auth.list"`, and
///   every deeper descendant such as `"auth.admins.list"`
/// - Global wildcard: `"*"` matches everything
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix(".*") {
        if path == prefix {
            return true;
        }
        if path.len() > prefix.len() + 1
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.'
        {
            return true;
        }
        return false;
    }

    pattern == path
}

// =============================================================================
// Cache
// =============================================================================

/// Configuration for the client-side query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL for cached entries
    pub default_ttl: Duration,
    /// Per-procedure TTL overrides
    pub procedure_ttl: HashMap<String, Duration>,
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl CacheConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            procedure_ttl: HashMap::new(),
            max_entries: DEFAULT_MAX_ENTRIES,
            enabled: true,
        }
    }

    /// Set the default TTL for cached entries.
    #[must_use = "This method returns a new CacheConfig and does not modify self"]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set a TTL for a specific procedure.
    #[must_use = "This method returns a new CacheConfig and does not modify self"]
    pub fn with_procedure_ttl(mut self, path: impl Into<String>, ttl: Duration) -> Self {
        self.procedure_ttl.insert(path.into(), ttl);
        self
    }

    /// Set the maximum number of entries.
    #[must_use = "This method returns a new CacheConfig and does not modify self"]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Enable or disable caching.
    #[must_use = "This method returns a new CacheConfig and does not modify self"]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Get the TTL for a specific procedure.
    pub fn get_ttl(&self, path: &str) -> Duration {
        self.procedure_ttl
            .get(path)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A cached query result with expiration tracking.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: serde_json::Value, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries currently held
    pub total_entries: usize,
    /// Maximum number of entries allowed
    pub max_entries: usize,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Entries evicted due to LRU
    pub evictions: u64,
    /// Entries removed by invalidation
    pub invalidations: u64,
}

/// Thread-safe LRU query cache with TTL support.
pub struct QueryCache {
    config: CacheConfig,
    entries: Arc<RwLock<LruCache<String, CacheEntry>>>,
    metrics: Arc<CacheMetrics>,
}

impl QueryCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let max_entries = NonZeroUsize::new(config.max_entries.max(1)).unwrap();
        Self {
            config,
            entries: Arc::new(RwLock::new(LruCache::new(max_entries))),
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// Get a cached value if it exists and hasn't expired.
    pub async fn get(&self, path: &str, input: &serde_json::Value) -> Option<serde_json::Value> {
        if !self.config.enabled {
            return None;
        }

        let key = query_key(path, input);
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get(&key) {
            if entry.is_expired() {
                tracing::debug!(path = %path, "cache entry expired");
                entries.pop(&key);
                self.metrics.record_miss();
                return None;
            }
            tracing::debug!(path = %path, "cache hit");
            self.metrics.record_hit();
            return Some(entry.value.clone());
        }

        tracing::debug!(path = %path, "cache miss");
        self.metrics.record_miss();
        None
    }

    /// Store a value under the query key with the procedure's TTL.
    pub async fn set(&self, path: &str, input: &serde_json::Value, value: serde_json::Value) {
        if !self.config.enabled {
            return;
        }

        let key = query_key(path, input);
        let entry = CacheEntry::new(value, self.config.get_ttl(path));

        let mut entries = self.entries.write().await;
        let will_evict = entries.len() >= entries.cap().get() && !entries.contains(&key);
        entries.put(key, entry);

        if will_evict {
            tracing::debug!(path = %path, "LRU eviction");
            self.metrics.record_eviction();
        }
    }

    /// Invalidate the entry for one exact query.
    pub async fn invalidate(&self, path: &str, input: &serde_json::Value) {
        let key = query_key(path, input);
        let mut entries = self.entries.write().await;
        if entries.pop(&key).is_some() {
            self.metrics.record_invalidations(1);
        }
    }

    /// Invalidate every entry whose path matches `pattern`.
    ///
    /// `"auth.*"` drops all descendants of the `auth` namespace; `"*"` drops
    /// everything.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        let mut entries = self.entries.write().await;

        // Keys are "path:input"; the path charset excludes ':'.
        let stale: Vec<String> = entries
            .iter()
            .filter_map(|(key, _)| {
                let path = key.split(':').next()?;
                if pattern_matches(pattern, path) {
                    Some(key.clone())
                } else {
                    None
                }
            })
            .collect();

        let count = stale.len() as u64;
        for key in stale {
            entries.pop(&key);
        }

        if count > 0 {
            tracing::debug!(pattern = %pattern, count = %count, "cache entries invalidated");
            self.metrics.record_invalidations(count);
        }
    }

    /// Whether a fresh value is cached for this query.
    pub async fn contains(&self, path: &str, input: &serde_json::Value) -> bool {
        if !self.config.enabled {
            return false;
        }
        let key = query_key(path, input);
        let entries = self.entries.read().await;
        entries.peek(&key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    /// Snapshot of cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            total_entries: entries.len(),
            max_entries: self.config.max_entries,
            hits: self.metrics.hits.load(Ordering::Relaxed),
            misses: self.metrics.misses.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            invalidations: self.metrics.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Clone for QueryCache {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            entries: self.entries.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Typed in-process client over a built router.
///
/// # Example
/// ```rust,ignore
/// let client = Client::new(router);
/// let admins: PaginatedResponse<Admin> = client
///     .query("auth.list", &PaginationInput::default())
///     .await?;
/// client.mutate::<_, SuccessResponse>("auth.invite", &input).await?;
/// // auth.* query results are now invalidated.
/// ```
pub struct Client<Ctx: Clone + Send + Sync + 'static> {
    router: Arc<Router<Ctx>>,
    cache: QueryCache,
    auth_token: Option<String>,
}

impl<Ctx: Clone + Send + Sync + 'static> Client<Ctx> {
    /// Create a client with default cache settings.
    pub fn new(router: Router<Ctx>) -> Self {
        Self::with_cache(router, CacheConfig::new())
    }

    /// Create a client with explicit cache settings.
    pub fn with_cache(router: Router<Ctx>, config: CacheConfig) -> Self {
        Self {
            router: Arc::new(router),
            cache: QueryCache::new(config),
            auth_token: None,
        }
    }

    /// Attach a bearer token seeded into the request scope on every call.
    #[must_use = "This method returns a new Client and does not modify self"]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// The cache key a query with this path and input would use.
    pub fn query_key<Input: Serialize>(&self, path: &str, input: &Input) -> RpcResult<String> {
        let wire_input = to_wire(input)?;
        Ok(query_key(path, &wire_input))
    }

    /// Run a query, consulting the cache first.
    pub async fn query<Input, Output>(&self, path: &str, input: &Input) -> RpcResult<Output>
    where
        Input: Serialize,
        Output: DeserializeOwned,
    {
        let wire_input = to_wire(input)?;

        if let Some(cached) = self.cache.get(path, &wire_input).await {
            return from_wire(cached);
        }

        let result = self.router.call(path, wire_input.clone(), self.seed()?).await?;
        self.cache.set(path, &wire_input, result.clone()).await;
        from_wire(result)
    }

    /// Run a mutation, then invalidate the cached queries it may have staled.
    ///
    /// The mutation's namespace is invalidated as `"<ns>.*"`; a top-level
    /// mutation invalidates the whole cache.
    pub async fn mutate<Input, Output>(&self, path: &str, input: &Input) -> RpcResult<Output>
    where
        Input: Serialize,
        Output: DeserializeOwned,
    {
        let wire_input = to_wire(input)?;
        let result = self.router.call(path, wire_input, self.seed()?).await?;

        let pattern = match path.rsplit_once('.') {
            Some((ns, _)) => format!("{}.*", ns),
            None => "*".to_string(),
        };
        self.cache.invalidate_pattern(&pattern).await;

        from_wire(result)
    }

    /// Explicitly invalidate cached queries matching a pattern.
    pub async fn invalidate(&self, pattern: &str) {
        self.cache.invalidate_pattern(pattern).await;
    }

    /// Access the underlying cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn seed(&self) -> RpcResult<RequestScope> {
        let mut scope = RequestScope::new();
        if let Some(token) = &self.auth_token {
            scope.insert(scope_keys::AUTH_TOKEN, token.clone())?;
        }
        Ok(scope)
    }
}

impl<Ctx: Clone + Send + Sync + 'static> Clone for Client<Ctx> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            cache: self.cache.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}
