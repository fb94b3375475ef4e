use crate::core::auth::Session;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse, Redirect};
use axum::Extension;

const DASHBOARD_TEMPLATE: &str = include_str!("../../../templates/dashboard.html");
const SCRIPT: &str = include_str!("../../../static/script.js");

pub async fn index() -> Redirect {
    Redirect::to("/dashboard")
}

pub async fn dashboard(Extension(session): Extension<Session>) -> Html<String> {
    Html(DASHBOARD_TEMPLATE.replace(
        "{{username}}",
        &super::escape_html(&session.identity.username),
    ))
}

pub async fn script() -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/javascript; charset=utf-8")], SCRIPT)
}
