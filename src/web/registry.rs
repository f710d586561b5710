//! Route table built once at startup.

use crate::core::AppResult;
use crate::web::params::{BoundCall, ParamKind, ParamSpec};
use crate::web::route::PathPattern;
use futures::future::BoxFuture;
use http::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route {method} {path} is already registered as {method} {existing}")]
    DuplicateRoute {
        method: Method,
        path: String,
        existing: String,
    },

    #[error("route {method} {path} declares parameter '{name}' twice")]
    DuplicateParam {
        method: Method,
        path: String,
        name: String,
    },
}

/// Successful handler result: a JSON body and its status.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn with_status(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Self::ok(body)
    }
}

/// An async function callable by the dispatcher.
pub trait Handler<S>: Send + Sync + 'static {
    fn call(&self, state: S, call: BoundCall) -> BoxFuture<'static, AppResult<Reply>>;
}

impl<S, F, Fut, R> Handler<S> for F
where
    S: Send + 'static,
    F: Fn(S, BoundCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<R>> + Send + 'static,
    R: Into<Reply>,
{
    fn call(&self, state: S, call: BoundCall) -> BoxFuture<'static, AppResult<Reply>> {
        let fut = (self)(state, call);
        Box::pin(async move { fut.await.map(Into::into) })
    }
}

pub struct Route<S> {
    pub method: Method,
    pub pattern: PathPattern,
    pub params: Vec<ParamSpec>,
    pub handler: Arc<dyn Handler<S>>,
}

/// A matched route plus its path captures.
pub struct RouteMatch<'a, S> {
    pub route: &'a Route<S>,
    pub captures: HashMap<String, String>,
}

/// Route metadata for clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub path: String,
    pub params: Vec<ParamSpec>,
}

pub struct RouteRegistry<S> {
    routes: Vec<Route<S>>,
}

impl<S> Default for RouteRegistry<S> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<S: Send + 'static> RouteRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Registering an already-covered (method, path shape) fails.
    pub fn register<H>(
        &mut self,
        method: Method,
        path: &str,
        handler: H,
        params: Vec<ParamSpec>,
    ) -> Result<&mut Self, RegistryError>
    where
        H: Handler<S>,
    {
        let pattern = PathPattern::parse(path).map_err(|reason| RegistryError::InvalidPattern {
            pattern: path.to_string(),
            reason,
        })?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|route| route.method == method && route.pattern.same_shape(&pattern))
        {
            return Err(RegistryError::DuplicateRoute {
                method,
                path: path.to_string(),
                existing: existing.pattern.to_string(),
            });
        }

        for (index, spec) in params.iter().enumerate() {
            let repeated = params[..index].iter().any(|earlier| earlier.name == spec.name);
            if repeated && spec.kind != ParamKind::Session {
                return Err(RegistryError::DuplicateParam {
                    method,
                    path: path.to_string(),
                    name: spec.name.to_string(),
                });
            }
        }

        self.routes.push(Route {
            method,
            pattern,
            params,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// First registered route matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, S>> {
        self.routes
            .iter()
            .filter(|route| &route.method == method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|captures| RouteMatch { route, captures })
            })
    }

    /// Metadata for every route, with `prefix` prepended to each path.
    pub fn describe(&self, prefix: &str) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|route| RouteInfo {
                method: route.method.to_string(),
                path: format!("{prefix}{}", route.pattern),
                params: route.params.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
