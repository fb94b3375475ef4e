use crate::web::session::current_session;
use crate::web::AppState;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use std::sync::Arc;

const LOGIN_TEMPLATE: &str = include_str!("../../../templates/login.html");
const INVALID_LOGIN: &str = "Invalid username or password.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

fn render_login(error: Option<&str>) -> Html<String> {
    let error_html = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, super::escape_html(e)))
        .unwrap_or_default();
    Html(LOGIN_TEMPLATE.replace("{{error}}", &error_html))
}

pub async fn login_form(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if current_session(&state, &headers).is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    render_login(None).into_response()
}

pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    let Some(identity) = state
        .credentials
        .verify(&form.username, &form.password)
        .await
    else {
        return render_login(Some(INVALID_LOGIN)).into_response();
    };

    let session = state.sessions.create(identity);
    match state.cookies.issue(&session) {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Could not sign session cookie");
            state.sessions.destroy(&session.id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                render_login(Some("Could not start a session.")),
            )
                .into_response()
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(sid) = state.cookies.read(&headers) {
        if state.sessions.destroy(&sid) {
            tracing::info!("Session ended");
        }
    }
    ([(SET_COOKIE, state.cookies.clear())], Redirect::to("/login")).into_response()
}
