//! axum adapter: turns HTTP requests into `ApiRequest`s and replies into responses.

use crate::core::{AppError, AppResult};
use crate::web::dispatch::{ApiRequest, Dispatcher, error_reply};
use crate::web::registry::Reply;
use crate::web::session::{
    Session, SessionHandle, SessionStore, session_cookie, session_id_from_headers,
};
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub struct HttpState<S> {
    dispatcher: Dispatcher<S>,
    sessions: Arc<SessionStore>,
}

impl<S: Clone> Clone for HttpState<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Router that forwards every method and path to `dispatcher`.
///
/// Meant to be nested under a prefix; the dispatcher sees the path with the
/// prefix stripped.
pub fn api_router<S>(dispatcher: Dispatcher<S>, sessions: Arc<SessionStore>) -> Router
where
    S: Clone + Send + Sync + 'static,
{
    let state = HttpState {
        dispatcher,
        sessions,
    };
    Router::new()
        .route("/", any(dispatch_http::<S>))
        .route("/*path", any(dispatch_http::<S>))
        .with_state(state)
}

async fn dispatch_http<S>(
    State(state): State<HttpState<S>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: Clone + Send + Sync + 'static,
{
    let known = match session_id_from_headers(&headers) {
        Some(sid) => state
            .sessions
            .load(&sid)
            .await
            .map(|session| (sid, session)),
        None => None,
    };
    let (sid, session, fresh) = match known {
        Some((sid, session)) => (sid, session, false),
        None => (SessionStore::new_sid(), Session::default(), true),
    };
    let handle = SessionHandle::new(session.clone());

    let reply = match read_request(method, &uri, &body) {
        Ok(request) => state.dispatcher.dispatch(request, &handle).await,
        Err(err) => {
            warn!(path = uri.path(), error = %err, "unreadable request");
            error_reply(&err)
        }
    };

    let stored = state
        .sessions
        .commit(&sid, &session, handle.snapshot())
        .await;

    let mut response = into_response(reply);
    if fresh && stored {
        match HeaderValue::from_str(&session_cookie(&sid)) {
            Ok(cookie) => {
                response.headers_mut().insert(SET_COOKIE, cookie);
            }
            Err(err) => warn!(error = %err, "could not encode session cookie"),
        }
    }
    response
}

fn read_request(method: Method, uri: &Uri, body: &[u8]) -> AppResult<ApiRequest> {
    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map_err(|err| AppError::bad_request(format!("Invalid query string: {err}")))?;
    let query: Map<String, Value> = query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    Ok(ApiRequest::new(method, uri.path())
        .with_query(query)
        .with_body(read_body(body)?))
}

fn read_body(body: &[u8]) -> AppResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(AppError::bad_request("Request body must be a JSON object")),
        Err(err) => Err(AppError::bad_request(format!("Invalid JSON body: {err}"))),
    }
}

fn into_response(reply: Reply) -> Response {
    (reply.status, Json(reply.body)).into_response()
}
