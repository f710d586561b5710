//! Request dispatch and error translation.

use crate::core::AppError;
use crate::web::binder::{RequestData, bind, merge_fields};
use crate::web::registry::{Reply, RouteRegistry};
use crate::web::session::SessionHandle;
use http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Transport-neutral view of an inbound request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Map<String, Value>,
    pub body: Map<String, Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Map::new(),
            body: Map::new(),
        }
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }
}

pub struct Dispatcher<S> {
    registry: Arc<RouteRegistry<S>>,
    state: S,
}

impl<S: Clone> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            state: self.state.clone(),
        }
    }
}

impl<S> Dispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(registry: RouteRegistry<S>, state: S) -> Self {
        Self {
            registry: Arc::new(registry),
            state,
        }
    }

    /// Runs one request to completion. Always produces a reply.
    pub async fn dispatch(&self, request: ApiRequest, session: &SessionHandle) -> Reply {
        let method = request.method.clone();
        let path = request.path.clone();
        match self.try_dispatch(request, session).await {
            Ok(reply) => {
                debug!(%method, %path, status = reply.status.as_u16(), "handled");
                reply
            }
            Err(err) => {
                let status = err.status();
                if err.is_internal() {
                    error!(%method, %path, status = status.as_u16(), error = %err, "handler failed");
                } else {
                    warn!(%method, %path, status = status.as_u16(), error = %err, "request rejected");
                }
                error_reply(&err)
            }
        }
    }

    async fn try_dispatch(
        &self,
        request: ApiRequest,
        session: &SessionHandle,
    ) -> Result<Reply, AppError> {
        let Some(found) = self.registry.find(&request.method, &request.path) else {
            return Err(AppError::not_found(format!(
                "No route for {} {}",
                request.method, request.path
            )));
        };

        let data = RequestData {
            captures: found.captures,
            fields: merge_fields(request.query, request.body),
            session: session.clone(),
        };
        let call = bind(&found.route.params, &data)?;
        debug!(route = %found.route.pattern, args = call.len(), "bound request");

        found.route.handler.call(self.state.clone(), call).await
    }
}

/// Translates an error into its client-facing reply.
pub fn error_reply(err: &AppError) -> Reply {
    let body = serde_json::to_value(err.body()).unwrap_or_else(|_| Value::Object(Map::new()));
    Reply::with_status(err.status(), body)
}
