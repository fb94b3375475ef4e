// The web module is the HTTP front end: an authenticated page with one
// button that runs the pipeline and hands back download + share links.
//
// Handlers only talk to core traits held in `AppState`.

#[path = "handlers/mod.rs"]
pub mod handlers;
#[path = "session.rs"]
pub mod session;

use crate::core::auth::{CredentialProvider, SessionStore};
use crate::core::pipeline::DeckPipeline;
use crate::core::sharing::ArtifactPublisher;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use handlers::{auth, dashboard, generate};
use session::SessionCookies;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub pipeline: Arc<dyn DeckPipeline>,
    pub publisher: Arc<dyn ArtifactPublisher>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub sessions: SessionStore,
    pub cookies: SessionCookies,
    /// Where the pipeline writes the deck; served by `/download`.
    pub output_path: PathBuf,
}

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    let protected = Router::new()
        .route("/dashboard", get(dashboard::dashboard))
        .route("/generate", post(generate::generate))
        .route("/download", get(generate::download))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            session::require_login,
        ));

    Router::new()
        .route("/", get(dashboard::index))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/static/script.js", get(dashboard::script))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::StaticCredentials;
    use crate::core::pipeline::{PipelineError, PipelineReport};
    use crate::core::sharing::{ShareError, ShareLink};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum Outcome {
        Deck { degraded: bool },
        /// Builds a deck, but only after `delay`.
        SlowDeck { delay: std::time::Duration },
        NoArticles,
        Fails,
    }

    struct FakePipeline {
        output: PathBuf,
        outcome: Outcome,
    }

    #[async_trait]
    impl DeckPipeline for FakePipeline {
        async fn run(&self) -> Result<Option<PipelineReport>, PipelineError> {
            match self.outcome {
                Outcome::Deck { degraded } => {
                    std::fs::write(&self.output, b"PK fake deck").unwrap();
                    Ok(Some(PipelineReport {
                        output: self.output.clone(),
                        fetched: 3,
                        selected: 2,
                        slides: 2,
                        curation_fallback: degraded,
                        summary_fallbacks: 0,
                    }))
                }
                Outcome::SlowDeck { delay } => {
                    tokio::time::sleep(delay).await;
                    std::fs::write(&self.output, b"PK slow deck").unwrap();
                    Ok(None)
                }
                Outcome::NoArticles => Ok(None),
                Outcome::Fails => Err(PipelineError::Task("worker crashed".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactPublisher for FakePublisher {
        async fn publish(&self, artifact: &Path) -> Result<ShareLink, ShareError> {
            assert!(artifact.exists());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ShareLink {
                file_id: "abc".to_string(),
                url: "https://docs.google.com/presentation/d/abc".to_string(),
            })
        }
    }

    struct TestApp {
        _tmp: TempDir,
        app: Router,
        publisher: Arc<FakePublisher>,
        output: PathBuf,
    }

    fn test_app(outcome: Outcome) -> TestApp {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("final_presentation.pptx");
        let publisher = Arc::new(FakePublisher::default());

        let app = create_app(AppState {
            pipeline: Arc::new(FakePipeline {
                output: output.clone(),
                outcome,
            }),
            publisher: publisher.clone(),
            credentials: Arc::new(StaticCredentials::new("admin", "password123")),
            sessions: SessionStore::new(chrono::Duration::hours(1)),
            cookies: SessionCookies::new("test-secret"),
            output_path: output.clone(),
        });

        TestApp {
            _tmp: tmp,
            app,
            publisher,
            output,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn login_request(username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "username={}&password={}",
                username, password
            )))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    /// Logs in as the operator and returns the `Cookie` header value.
    async fn login(app: &Router) -> String {
        let response = send(app, login_request("admin", "password123")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_anonymous_requests_redirect_to_login() {
        let t = test_app(Outcome::Deck { degraded: false });

        for request in [
            get("/dashboard", None),
            post("/generate", None),
            get("/download", None),
            get("/dashboard", Some("news_deck_session=forged")),
        ] {
            let response = send(&t.app, request).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/login");
        }
        assert_eq!(t.publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_root_redirects_to_dashboard() {
        let t = test_app(Outcome::NoArticles);
        let response = send(&t.app, get("/", None)).await;
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn test_bad_login_rerenders_form() {
        let t = test_app(Outcome::NoArticles);

        let response = send(&t.app, login_request("admin", "wrong")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = body_text(response).await;
        assert!(body.contains("Invalid username or password."));
        assert!(body.contains(r#"action="/login""#));
    }

    #[tokio::test]
    async fn test_login_then_dashboard_then_logout() {
        let t = test_app(Outcome::NoArticles);
        let cookie = login(&t.app).await;

        let response = send(&t.app, get("/dashboard", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("generateBtn"));
        assert!(body.contains("admin"));

        // Already signed in: the login page forwards to the dashboard.
        let response = send(&t.app, get("/login", Some(&cookie))).await;
        assert_eq!(location(&response), "/dashboard");

        let response = send(&t.app, get("/logout", Some(&cookie))).await;
        assert_eq!(location(&response), "/login");
        assert!(response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        // The old cookie no longer names a live session.
        let response = send(&t.app, get("/dashboard", Some(&cookie))).await;
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_generate_without_output_is_500() {
        let t = test_app(Outcome::NoArticles);
        let cookie = login(&t.app).await;

        let response = send(&t.app, post("/generate", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Presentation file not found.");
        assert_eq!(t.publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_pipeline_error_is_500_with_message() {
        let t = test_app(Outcome::Fails);
        let cookie = login(&t.app).await;

        let response = send(&t.app, post("/generate", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("worker crashed"));
    }

    #[tokio::test]
    async fn test_generate_success_returns_links() {
        let t = test_app(Outcome::Deck { degraded: true });
        let cookie = login(&t.app).await;

        let response = send(&t.app, post("/generate", Some(&cookie))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["ppt_url"], "/download");
        assert_eq!(
            json["slides_link"],
            "https://docs.google.com/presentation/d/abc"
        );
        assert_eq!(json["degraded"], true);
        assert_eq!(t.publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_generate_request_still_publishes() {
        let t = test_app(Outcome::SlowDeck {
            delay: std::time::Duration::from_millis(200),
        });
        let cookie = login(&t.app).await;

        // The client gives up long before the run finishes.
        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            send(&t.app, post("/generate", Some(&cookie))),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(t.publisher.calls.load(Ordering::SeqCst), 0);

        for _ in 0..100 {
            if t.publisher.calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(t.publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download() {
        let t = test_app(Outcome::NoArticles);
        let cookie = login(&t.app).await;

        let response = send(&t.app, get("/download", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "PPT file not found.");

        std::fs::write(&t.output, b"deck bytes").unwrap();
        let response = send(&t.app, get("/download", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            crate::core::sharing::PPTX_MIME_TYPE
        );
        assert!(response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("final_presentation.pptx"));
        assert_eq!(body_text(response).await, "deck bytes");
    }

    #[tokio::test]
    async fn test_script_is_public() {
        let t = test_app(Outcome::NoArticles);
        let response = send(&t.app, get("/static/script.js", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/generate"));
    }
}
