//! Declarative request dispatch.
//!
//! Routes are registered explicitly with a handler and its parameter list;
//! the dispatcher matches, binds and calls them, and translates every error
//! into a status code with a `{error, details?}` body.

pub mod binder;
pub mod dispatch;
pub mod params;
pub mod registry;
pub mod route;
pub mod session;
pub mod transport;

pub use binder::{RequestData, bind, flatten, merge_fields, unflatten};
pub use dispatch::{ApiRequest, Dispatcher};
pub use params::{Arg, BoundCall, ParamKind, ParamSpec};
pub use registry::{Handler, RegistryError, Reply, RouteInfo, RouteRegistry};
pub use session::{SESSION_COOKIE, Session, SessionHandle, SessionStore};
pub use transport::api_router;
