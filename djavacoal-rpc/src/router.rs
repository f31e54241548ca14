//! Router composition and dispatch
//!
//! A [`RouterBuilder`] declaratively composes procedures, router-scoped
//! middleware, and context steps, nesting child builders under dot-joined
//! namespaces. [`RouterBuilder::build`] resolves the tree once into an
//! immutable [`Router`] and performs all composition-time checks: every path
//! must be well-formed and unique. Collisions fail fast at startup with an
//! error naming the offending path; they are never discovered at request
//! time.
//!
//! The built router is read-only and shared by reference across concurrent
//! requests without synchronization.

use crate::context::{ContextStep, RequestScope};
use crate::handler::{into_boxed, into_boxed_validated, BoxedHandler, Handler};
use crate::middleware::{MiddlewareFn, Next, ProcedureType, Request, Response};
use crate::validation::{validate_input_size, validate_path, Validate};
use crate::{Context, RpcConfig, RpcError, RpcResult};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A procedure registration accumulated by the builder.
struct Entry<Ctx: Clone + Send + Sync + 'static> {
    path: String,
    procedure_type: ProcedureType,
    handler: BoxedHandler<Ctx>,
    /// Middleware wrapping this procedure, outermost first.
    middleware: Vec<MiddlewareFn<Ctx>>,
}

/// Declarative router composition with a builder pattern.
///
/// # Example
/// ```rust,ignore
/// let router = RouterBuilder::new()
///     .context(AppContext::new())
///     .step(RequestIdStep)
///     .middleware(logging)
///     .query("health", health_handler)
///     .merge("auth", admin_router())
///     .build()?;
/// ```
pub struct RouterBuilder<Ctx: Clone + Send + Sync + 'static> {
    context: Option<Ctx>,
    config: RpcConfig,
    entries: Vec<Entry<Ctx>>,
    middleware: Vec<MiddlewareFn<Ctx>>,
    steps: Vec<Arc<dyn ContextStep<Ctx>>>,
    /// Namespace prefixes claimed by [`merge`](Self::merge), fully qualified
    /// from this builder's root.
    claimed: Vec<String>,
}

impl<Ctx: Clone + Send + Sync + 'static> Default for RouterBuilder<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx: Clone + Send + Sync + 'static> RouterBuilder<Ctx> {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        Self {
            context: None,
            config: RpcConfig::default(),
            entries: Vec::new(),
            middleware: Vec::new(),
            steps: Vec::new(),
            claimed: Vec::new(),
        }
    }

    /// Set the application context passed to all handlers and middleware.
    ///
    /// Required on the root builder before [`build`](Self::build); child
    /// builders passed to [`merge`](Self::merge) don't need one.
    pub fn context(mut self, ctx: Ctx) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Set the layer configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a context step.
    ///
    /// Steps run in registration order before any middleware. Ordering is a
    /// configuration decision; document it at the registration site when one
    /// step depends on another's contribution.
    pub fn step<S>(mut self, step: S) -> Self
    where
        S: ContextStep<Ctx> + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Add middleware scoped to this builder.
    ///
    /// It wraps every procedure registered on this builder, including merged
    /// children, but not procedures of a parent this builder is merged into.
    pub fn middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Response>> + Send + 'static,
    {
        self.middleware.push(Arc::new(move |ctx, req, next| {
            Box::pin(f(ctx, req, next))
        }));
        self
    }

    /// Add a query procedure (read-only operation)
    pub fn query<N, Input, Output, H>(mut self, name: N, handler: H) -> Self
    where
        N: Into<String>,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
        H: Handler<Ctx, Input, Output>,
    {
        self.entries.push(Entry {
            path: name.into(),
            procedure_type: ProcedureType::Query,
            handler: into_boxed(handler),
            middleware: Vec::new(),
        });
        self
    }

    /// Add a mutation procedure (write operation)
    pub fn mutation<N, Input, Output, H>(mut self, name: N, handler: H) -> Self
    where
        N: Into<String>,
        Input: DeserializeOwned + Send + 'static,
        Output: Serialize + Send + 'static,
        H: Handler<Ctx, Input, Output>,
    {
        self.entries.push(Entry {
            path: name.into(),
            procedure_type: ProcedureType::Mutation,
            handler: into_boxed(handler),
            middleware: Vec::new(),
        });
        self
    }

    /// Add a query whose input is schema-validated before the handler runs.
    pub fn query_validated<N, Input, Output, H>(mut self, name: N, handler: H) -> Self
    where
        N: Into<String>,
        Input: DeserializeOwned + Validate + Send + 'static,
        Output: Serialize + Send + 'static,
        H: Handler<Ctx, Input, Output>,
    {
        self.entries.push(Entry {
            path: name.into(),
            procedure_type: ProcedureType::Query,
            handler: into_boxed_validated(handler),
            middleware: Vec::new(),
        });
        self
    }

    /// Add a mutation whose input is schema-validated before the handler runs.
    pub fn mutation_validated<N, Input, Output, H>(mut self, name: N, handler: H) -> Self
    where
        N: Into<String>,
        Input: DeserializeOwned + Validate + Send + 'static,
        Output: Serialize + Send + 'static,
        H: Handler<Ctx, Input, Output>,
    {
        self.entries.push(Entry {
            path: name.into(),
            procedure_type: ProcedureType::Mutation,
            handler: into_boxed_validated(handler),
            middleware: Vec::new(),
        });
        self
    }

    /// Merge another builder under a namespace.
    ///
    /// Child paths are reachable only under `namespace` joined with a dot;
    /// prefixes compose by concatenation across nesting levels. The child's
    /// middleware wraps only the child's procedures (inside this builder's
    /// own middleware), and the child's context steps are appended after this
    /// builder's.
    ///
    /// Each namespace may be claimed once: merging two builders under the
    /// same prefix fails at [`build`](Self::build) even when their leaves
    /// are disjoint.
    ///
    /// # Example
    /// ```rust,ignore
    /// let router = RouterBuilder::new()
    ///     .merge("auth", admin_router())
    ///     .merge("contact", contact_router());
    /// // Creates: auth.invite, auth.list, contact.submit, ...
    /// ```
    pub fn merge<N: Into<String>>(mut self, namespace: N, other: RouterBuilder<Ctx>) -> Self {
        let namespace = namespace.into();
        let qualify = |path: String| {
            if namespace.is_empty() {
                path
            } else {
                format!("{}.{}", namespace, path)
            }
        };

        if !namespace.is_empty() {
            self.claimed.push(namespace.clone());
        }
        self.claimed.extend(other.claimed.into_iter().map(&qualify));

        for entry in other.entries {
            let mut middleware = other.middleware.clone();
            middleware.extend(entry.middleware);
            self.entries.push(Entry {
                path: qualify(entry.path),
                procedure_type: entry.procedure_type,
                handler: entry.handler,
                middleware,
            });
        }
        self.steps.extend(other.steps);
        self
    }

    /// Resolve the composition into an immutable dispatch table.
    ///
    /// Fails if the context is unset, any path is malformed, two procedures
    /// claim the same path, or two merges claim the same namespace prefix.
    pub fn build(self) -> RpcResult<Router<Ctx>> {
        let context = self
            .context
            .ok_or_else(|| RpcError::internal("Router context not set; call context() before build()"))?;

        let mut prefixes: HashSet<String> = HashSet::new();
        for namespace in self.claimed {
            validate_path(&namespace)?;
            if !prefixes.insert(namespace.clone()) {
                return Err(RpcError::conflict(format!(
                    "Namespace '{}' claimed by more than one merged router",
                    namespace
                )));
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut procedures = HashMap::with_capacity(self.entries.len());

        for entry in self.entries {
            validate_path(&entry.path)?;
            if !seen.insert(entry.path.clone()) {
                return Err(RpcError::conflict(format!(
                    "Procedure path '{}' registered more than once",
                    entry.path
                )));
            }

            // Effective chain: router-level middleware outermost, then the
            // middleware accumulated through merges, outer to inner.
            let mut chain = self.middleware.clone();
            chain.extend(entry.middleware);

            procedures.insert(
                entry.path,
                CompiledProcedure {
                    procedure_type: entry.procedure_type,
                    handler: entry.handler,
                    chain,
                },
            );
        }

        Ok(Router {
            context,
            config: self.config,
            steps: self.steps,
            procedures,
        })
    }
}

/// A procedure with its compiled middleware chain.
struct CompiledProcedure<Ctx: Clone + Send + Sync + 'static> {
    procedure_type: ProcedureType,
    handler: BoxedHandler<Ctx>,
    chain: Vec<MiddlewareFn<Ctx>>,
}

/// Immutable dispatch table built once at startup.
pub struct Router<Ctx: Clone + Send + Sync + 'static> {
    context: Ctx,
    config: RpcConfig,
    steps: Vec<Arc<dyn ContextStep<Ctx>>>,
    procedures: HashMap<String, CompiledProcedure<Ctx>>,
}

impl<Ctx: Clone + Send + Sync + 'static> Router<Ctx> {
    /// List all registered procedure paths
    pub fn procedures(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.procedures.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether a procedure exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.procedures.contains_key(path)
    }

    /// Dispatch a call to a procedure by path.
    ///
    /// `seed` carries transport-level scope entries (auth token, cancel
    /// token); the context chain extends it before the middleware chain and
    /// handler run. An unknown path yields `ProcedureNotFound` without
    /// invoking any handler.
    pub async fn call(
        &self,
        path: &str,
        input: serde_json::Value,
        seed: RequestScope,
    ) -> RpcResult<serde_json::Value> {
        validate_input_size(&input, &self.config)?;

        let procedure = self
            .procedures
            .get(path)
            .ok_or_else(|| RpcError::procedure_not_found(path))?;

        let request = Request::new(path, procedure.procedure_type, input);

        if self.config.debug_logging {
            tracing::debug!(
                path,
                procedure_type = %request.procedure_type,
                "dispatching rpc call"
            );
        }

        // Run the context chain in registration order. A failing step aborts
        // the request before any middleware or handler executes, and no
        // partial scope propagates.
        let mut scope = seed;
        for step in &self.steps {
            if let Err(err) = step.contribute(&self.context, &request, &mut scope).await {
                tracing::warn!(step = step.name(), code = %err.code, "context step failed");
                return Err(RpcError::context(format!(
                    "context step '{}' could not contribute: {}",
                    step.name(),
                    err.message
                ))
                .with_cause(err.to_string()));
            }
        }

        let ctx = Context::with_scope(self.context.clone(), scope);

        // Fold the chain around the handler, innermost first, so the first
        // registered unit ends up outermost.
        let chain = procedure
            .chain
            .iter()
            .rev()
            .fold(Next::terminal(procedure.handler.clone()), |next, unit| {
                Next::wrap(unit.clone(), next)
            });

        let outcome = chain.run(ctx, request).await;
        if self.config.debug_logging {
            match &outcome {
                Ok(_) => tracing::debug!(path, "rpc call completed"),
                Err(err) => tracing::debug!(path, code = %err.code, "rpc call errored"),
            }
        }
        outcome
    }
}

/// Type-erased router trait for transport storage
pub trait DynRouter: Send + Sync {
    /// Dispatch a call by path.
    fn call<'a>(
        &'a self,
        path: &'a str,
        input: serde_json::Value,
        seed: RequestScope,
    ) -> Pin<Box<dyn Future<Output = RpcResult<serde_json::Value>> + Send + 'a>>;

    /// List all registered procedures
    fn procedures(&self) -> Vec<String>;
}

impl<Ctx: Clone + Send + Sync + 'static> DynRouter for Router<Ctx> {
    fn call<'a>(
        &'a self,
        path: &'a str,
        input: serde_json::Value,
        seed: RequestScope,
    ) -> Pin<Box<dyn Future<Output = RpcResult<serde_json::Value>> + Send + 'a>> {
        Box::pin(async move { Router::call(self, path, input, seed).await })
    }

    fn procedures(&self) -> Vec<String> {
        Router::procedures(self)
    }
}
