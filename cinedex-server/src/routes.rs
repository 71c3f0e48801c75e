use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, provide};

pub fn router(state: AppState) -> Router {
    Router::new()
        // MacCMS read API; registered with and without the trailing slash
        // because clients are split on which one they request.
        .route("/provide/vod", get(provide::handle_provide))
        .route("/provide/vod/", get(provide::handle_provide))
        .route("/provide/vod/config.json", get(provide::handle_provide_config))
        // Admin collect surface.
        .route("/api/collect", post(admin::start_collect))
        .route("/api/collect/batch", post(admin::batch_collect))
        .route("/api/collect/auto", post(admin::auto_collect))
        .route("/api/collect/single", post(admin::collect_single))
        .route("/api/collect/stop", post(admin::stop_task))
        .route("/api/collect/stop-all", post(admin::stop_all_tasks))
        .route("/api/collect/tasks", get(admin::active_tasks))
        .route("/api/category/refresh", post(admin::refresh_category))
        // Source registry CRUD.
        .route("/api/sources", get(admin::list_sources).post(admin::save_source))
        .route(
            "/api/sources/{id}",
            put(admin::update_source).delete(admin::delete_source),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
