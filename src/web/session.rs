// Login sessions on the wire: the cookie carries a signed token naming a
// server-side session, and protected routes sit behind `require_login`.

use super::AppState;
use crate::core::auth::Session;
use axum::extract::{Request, State};
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "news_deck_session";

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sid: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies the session cookie (HS256).
pub struct SessionCookies {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionCookies {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// `Set-Cookie` value for a fresh session.
    pub fn issue(&self, session: &Session) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims {
            sid: session.id.clone(),
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        let max_age = (session.expires_at - session.created_at).num_seconds().max(0);

        Ok(format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE, token, max_age
        ))
    }

    /// `Set-Cookie` value that removes the cookie.
    pub fn clear(&self) -> String {
        format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
    }

    /// Session id from a valid, unexpired cookie.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        let token = cookie_value(headers, SESSION_COOKIE)?;
        match decode::<SessionClaims>(&token, &self.decoding, &Validation::new(Algorithm::HS256)) {
            Ok(data) => Some(data.claims.sid),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session cookie");
                None
            }
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// The live session behind the request's cookie, if any.
pub fn current_session(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let sid = state.cookies.read(headers)?;
    state.sessions.get(&sid)
}

/// Lets logged-in requests through with their `Session` as an extension;
/// everyone else is sent to the login page.
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match current_session(&state, request.headers()) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "Anonymous request sent to login");
            Redirect::to("/login").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{Identity, SessionStore};
    use axum::http::HeaderValue;

    fn session() -> Session {
        SessionStore::new(chrono::Duration::hours(1)).create(Identity {
            username: "admin".to_string(),
        })
    }

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn cookie_pair(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_issued_cookie_round_trips() {
        let cookies = SessionCookies::new("secret");
        let session = session();

        let set_cookie = cookies.issue(&session).unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Max-Age=3600"));

        let headers = headers_with(&format!("theme=dark; {}", cookie_pair(&set_cookie)));
        assert_eq!(cookies.read(&headers), Some(session.id));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let session = session();
        let forged = SessionCookies::new("other-secret").issue(&session).unwrap();

        let cookies = SessionCookies::new("secret");
        assert!(cookies.read(&headers_with(&cookie_pair(&forged))).is_none());
        assert!(cookies
            .read(&headers_with("news_deck_session=garbage"))
            .is_none());
        assert!(cookies.read(&HeaderMap::new()).is_none());
    }
}
