use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, info};

use crate::auth::Principal;
use crate::bookmark::Projection;
use crate::bookmark_manager::{BookmarkManager, Pagination, PostsRequest};
use crate::status::{OperationError, OperationStatus};

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::metrics::metrics_handler;
use super::responses::{bad_request, http_status, MessageBody, PaginatedBody};
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug, Default)]
struct FetchQuery {
    pub page: Option<String>,
    pub exclude: Option<String>,
}

fn projection_from(exclude: Option<&str>) -> Projection {
    match exclude {
        Some(raw) => Projection::excluding(raw.split(',').map(str::trim)),
        None => Projection::all(),
    }
}

fn parse_posts_request(
    payload: Result<Json<PostsRequest>, JsonRejection>,
) -> Result<PostsRequest, Response> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected bookmark payload: {}", rejection.body_text());
        bad_request(rejection.body_text())
    })?;
    request.validate().map_err(bad_request)?;
    Ok(request)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

async fn fetch_bookmarks(
    _principal: Principal,
    State(state): State<ServerState>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, OperationError> {
    let pagination = Pagination::from_query(query.page.as_deref(), state.config.per_page);
    let projection = projection_from(query.exclude.as_deref());

    let outcome = state
        .bookmark_manager
        .fetch(&pagination, &projection)
        .await?;
    let code = http_status(outcome.status);
    let body = PaginatedBody {
        data: outcome.value,
        page: pagination.page,
        per_page: pagination.per_page,
        status_code: code.as_u16(),
    };
    Ok((code, Json(body)).into_response())
}

async fn get_bookmark(
    _principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    Path(id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, OperationError> {
    let projection = projection_from(query.exclude.as_deref());
    let outcome = manager.fetch_by_id(&id, &projection).await?;
    Ok((http_status(outcome.status), Json(outcome.value)).into_response())
}

async fn get_owner_bookmark(
    _principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    Path(owner_id): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, OperationError> {
    let projection = projection_from(query.exclude.as_deref());
    let outcome = manager.fetch_by_owner(&owner_id, &projection).await?;
    Ok((http_status(outcome.status), Json(outcome.value)).into_response())
}

async fn create_bookmark(
    principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    payload: Result<Json<PostsRequest>, JsonRejection>,
) -> Response {
    let request = match parse_posts_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match manager.create(&principal, &request).await {
        Ok(outcome) => (http_status(outcome.status), Json(outcome.value)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn add_posts(
    principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    Path(owner_id): Path<String>,
    payload: Result<Json<PostsRequest>, JsonRejection>,
) -> Response {
    let request = match parse_posts_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match manager.add_post(&principal, &request, &owner_id).await {
        Ok(outcome) => success_message(outcome.status),
        Err(err) => err.into_response(),
    }
}

async fn revoke_posts(
    principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    Path(owner_id): Path<String>,
    payload: Result<Json<PostsRequest>, JsonRejection>,
) -> Response {
    let request = match parse_posts_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    match manager.revoke_post(&principal, &request, &owner_id).await {
        Ok(outcome) => success_message(outcome.status),
        Err(err) => err.into_response(),
    }
}

async fn delete_bookmark(
    principal: Principal,
    State(manager): State<GuardedBookmarkManager>,
    Path(id): Path<String>,
) -> Result<Response, OperationError> {
    let outcome = manager.delete(&principal, &id).await?;
    Ok(success_message(outcome.status))
}

fn success_message(status: OperationStatus) -> Response {
    (
        http_status(status),
        Json(MessageBody {
            message: "success",
            status,
        }),
    )
        .into_response()
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "status_code": StatusCode::NOT_FOUND.as_u16(),
            "message": "PAGE NOT FOUND",
        })),
    )
}

pub fn make_app(config: ServerConfig, bookmark_manager: BookmarkManager) -> Router {
    let state = ServerState::new(config, bookmark_manager);

    let bookmark_routes: Router = Router::new()
        .route("/", get(fetch_bookmarks).post(create_bookmark))
        .route("/{id}", get(get_bookmark).delete(delete_bookmark))
        .route("/u/{owner_id}", get(get_owner_bookmark))
        .route("/post/{owner_id}", patch(add_posts))
        .route("/post/{owner_id}", delete(revoke_posts))
        .with_state(state.clone());

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    home_router
        .nest("/api/bookmark", bookmark_routes)
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn run_server(config: ServerConfig, bookmark_manager: BookmarkManager) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, bookmark_manager);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Serving bookmarks on port {}", port);
    info!("Serving metrics on port {}", metrics_port);

    let main_server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let metrics_server =
        axum::serve(metrics_listener, make_metrics_app()).with_graceful_shutdown(shutdown_signal());

    tokio::try_join!(async { main_server.await }, async {
        metrics_server.await
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use crate::bookmark::SqliteBookmarkStore;
    use crate::post_service::{PostLookup, PostLookupError, PostRecord};
    use crate::server::metrics::HTTP_REQUESTS_TOTAL;
    use crate::server::principal::{HEADER_USER_ID, HEADER_USER_PERMISSIONS};
    use crate::server::UNMATCHED_ROUTE;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    struct NamedPosts;

    #[async_trait]
    impl PostLookup for NamedPosts {
        async fn fetch(&self, ids: &[String]) -> Result<Vec<PostRecord>, PostLookupError> {
            Ok(ids
                .iter()
                .map(|id| PostRecord {
                    id: id.clone(),
                    name: format!("post {}", id),
                })
                .collect())
        }
    }

    fn app() -> Router {
        let store = SqliteBookmarkStore::in_memory().unwrap();
        let manager = BookmarkManager::new(Arc::new(store), Arc::new(NamedPosts));
        make_app(ServerConfig::default(), manager)
    }

    fn request(method: &str, uri: &str, user: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder
                .header(HEADER_USER_ID, user)
                .header(HEADER_USER_PERMISSIONS, "crud");
        }
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn formats_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0d 00:00:00");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }

    #[test]
    fn exclude_query_builds_projection() {
        let projection = projection_from(Some("posts, created_at"));
        assert!(!projection.includes(crate::bookmark::BookmarkField::Posts));
        assert!(!projection.includes(crate::bookmark::BookmarkField::CreatedAt));
        assert!(projection.includes(crate::bookmark::BookmarkField::UpdatedAt));
        assert_eq!(projection_from(None), Projection::all());
    }

    #[tokio::test]
    async fn responds_unauthorized_without_principal() {
        let app = app();
        let routes = [
            ("GET", "/api/bookmark"),
            ("GET", "/api/bookmark/u/alice"),
            ("DELETE", "/api/bookmark/post/alice"),
        ];

        for (method, uri) in routes {
            let response = app
                .clone()
                .oneshot(request(method, uri, None, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn home_reports_stats() {
        let response = app().oneshot(request("GET", "/", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["uptime"].as_str().unwrap().starts_with("0d"));
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let response = app()
            .oneshot(request("GET", "/nowhere", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"status_code": 404, "message": "PAGE NOT FOUND"})
        );
    }

    #[tokio::test]
    async fn create_then_read_back_enriched() {
        let app = app();
        let body = serde_json::json!({"owner_id": "alice", "posts": [{"id": "p1"}, {"id": "p1"}]});

        let response = app
            .clone()
            .oneshot(request("POST", "/api/bookmark", Some("alice"), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["owner_id"], "alice");
        assert_eq!(created["posts"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(request("GET", "/api/bookmark/u/alice", Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["posts"][0]["name"], "post p1");
    }

    #[tokio::test]
    async fn create_for_someone_else_is_forbidden() {
        let body = serde_json::json!({"user_id": "bob", "posts": []});
        let response = app()
            .oneshot(request("POST", "/api/bookmark", Some("alice"), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["status"], 502);
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let app = app();
        let bodies = [
            serde_json::json!({"owner_id": "alice"}),
            serde_json::json!({"owner_id": "", "posts": []}),
            serde_json::json!({"owner_id": "alice", "posts": [{"id": " "}]}),
        ];

        for body in bodies {
            let response = app
                .clone()
                .oneshot(request("PATCH", "/api/bookmark/post/alice", Some("alice"), Some(body.clone())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        }
    }

    #[tokio::test]
    async fn attach_detach_and_delete() {
        let app = app();
        let body = serde_json::json!({"owner_id": "alice", "posts": [{"id": "p1"}, {"id": "p2"}]});

        let response = app
            .clone()
            .oneshot(request("PATCH", "/api/bookmark/post/alice", Some("alice"), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"message": "success", "status": 603})
        );

        let body = serde_json::json!({"owner_id": "alice", "posts": [{"id": "p1"}]});
        let response = app
            .clone()
            .oneshot(request("DELETE", "/api/bookmark/post/alice", Some("alice"), Some(body)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/bookmark", Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["page"], 1);
        assert_eq!(page["per_page"], 25);
        assert_eq!(page["status_code"], 200);
        assert_eq!(page["data"][0]["posts"], serde_json::json!([{"id": "p2", "name": "post p2"}]));
        let id = page["data"][0]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/bookmark/{}", id);
        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some("bob"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request("DELETE", &uri, Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("GET", &uri, Some("alice"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn read_only_principal_cannot_attach() {
        let body = serde_json::json!({"owner_id": "alice", "posts": [{"id": "p1"}]});
        let request = Request::builder()
            .method("PATCH")
            .uri("/api/bookmark/post/alice")
            .header(HEADER_USER_ID, "alice")
            .header(HEADER_USER_PERMISSIONS, Permission::Read.alias().to_string())
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn http_series_matching(predicate: impl Fn(&[&str]) -> bool) -> usize {
        use prometheus::core::Collector;
        HTTP_REQUESTS_TOTAL
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .filter(|metric| {
                let labels: Vec<&str> = metric.get_label().iter().map(|l| l.get_value()).collect();
                predicate(labels.as_slice())
            })
            .count()
    }

    #[tokio::test]
    async fn http_metrics_are_labelled_by_route() {
        let app = app();
        let route = "/api/bookmark/u/{owner_id}";
        let before = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", route, "404"])
            .get();

        for owner in ["route-label-owner-1", "route-label-owner-2"] {
            let uri = format!("/api/bookmark/u/{}", owner);
            let response = app
                .clone()
                .oneshot(request("GET", &uri, Some(owner), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let after = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", route, "404"])
            .get();
        assert!(after - before >= 2.0);
        assert_eq!(
            http_series_matching(|labels| labels.contains(&route) && labels.contains(&"404")),
            1
        );
        assert_eq!(
            http_series_matching(|labels| labels.iter().any(|l| l.contains("route-label-owner"))),
            0
        );
    }

    #[tokio::test]
    async fn unknown_paths_share_one_metrics_label() {
        let app = app();
        for uri in ["/route-label-nowhere-1", "/route-label-nowhere-2"] {
            let response = app.clone().oneshot(request("GET", uri, None, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        assert!(
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["GET", UNMATCHED_ROUTE, "404"])
                .get()
                >= 2.0
        );
        assert_eq!(
            http_series_matching(|labels| labels.iter().any(|l| l.contains("route-label-nowhere"))),
            0
        );
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let app = app();
        let body = serde_json::json!({"owner_id": "alice", "posts": [{"id": "p1"}]});
        app.clone()
            .oneshot(request("POST", "/api/bookmark", Some("alice"), Some(body)))
            .await
            .unwrap();

        let response = app
            .oneshot(request(
                "GET",
                "/api/bookmark?page=9223372036854775807",
                Some("alice"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn metrics_app_serves_text_format() {
        crate::server::metrics::init_metrics();
        let response = make_metrics_app()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
