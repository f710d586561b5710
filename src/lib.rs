// ============================================================================
// concept_server Library
// ============================================================================

pub mod app;
pub mod concepts;
pub mod config;
pub mod core;
pub mod responses;
pub mod routes;
pub mod storage;
pub mod web;

// Re-export main types for convenience
pub use app::{API_PREFIX, App, AppSettings, RouterOptions, build_router};
pub use config::AppConfig;
pub use crate::core::{AppError, AppResult, DocId};
pub use storage::{Doc, DocCollection, DocumentStore, Filter, MemoryStore};
pub use web::{BoundCall, Dispatcher, ParamSpec, RouteRegistry};
