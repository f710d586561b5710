use crate::concepts::{
    CaptionConcept, CompilationConcept, FriendConcept, GroupConcept, MusicConcept,
    PhotoBannerConcept, PostConcept, UserConcept, VoteConcept, WebSessionConcept,
};
use crate::routes::build_registry;
use crate::storage::DocumentStore;
use crate::web::{Dispatcher, RegistryError, RouteInfo, SessionStore, api_router};
use axum::extract::State;
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Prefix under which every registered route is served.
pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub bcrypt_cost: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Every concept, built once and shared by all handlers.
pub struct App {
    pub sessions: WebSessionConcept,
    pub users: UserConcept,
    pub posts: PostConcept,
    pub friends: FriendConcept,
    pub groups: GroupConcept,
    pub captions: CaptionConcept,
    pub votes: VoteConcept,
    pub banners: PhotoBannerConcept,
    pub music: MusicConcept,
    pub compilations: CompilationConcept,
}

impl App {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &AppSettings) -> Self {
        Self {
            sessions: WebSessionConcept,
            users: UserConcept::new(Arc::clone(&store), settings.bcrypt_cost),
            posts: PostConcept::new(Arc::clone(&store)),
            friends: FriendConcept::new(Arc::clone(&store)),
            groups: GroupConcept::new(Arc::clone(&store)),
            captions: CaptionConcept::new(Arc::clone(&store)),
            votes: VoteConcept::new(Arc::clone(&store)),
            banners: PhotoBannerConcept::new(Arc::clone(&store)),
            music: MusicConcept::new(Arc::clone(&store)),
            compilations: CompilationConcept::new(store),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterOptions {
    pub cors_permissive: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn list_routes(State(routes): State<Arc<Vec<RouteInfo>>>) -> Json<Vec<RouteInfo>> {
    Json(routes.as_ref().clone())
}

/// Builds the HTTP router. Fails when the route table is inconsistent.
pub fn build_router(app: Arc<App>, options: RouterOptions) -> Result<Router, RegistryError> {
    let registry = build_registry()?;
    let described = Arc::new(registry.describe(API_PREFIX));
    info!(routes = described.len(), "route table built");

    let dispatcher = Dispatcher::new(registry, app);
    let sessions = Arc::new(SessionStore::new());

    let meta = Router::new()
        .route("/meta/routes", get(list_routes))
        .with_state(described);

    let mut router = Router::new()
        .route("/health", get(health))
        .merge(meta)
        .nest(API_PREFIX, api_router(dispatcher, sessions));

    if options.cors_permissive {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        );
    }

    Ok(router.layer(TraceLayer::new_for_http()))
}
