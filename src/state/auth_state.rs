//! AuthState - Signed-in Admin

use crate::domain::{AccountForm, Admin, AuthResponse, Credentials};
use crate::error::{Error, Result};
use crate::services::{ApiClient, Session, SessionStore};

/// Current session, backed by the session file
#[derive(Debug)]
pub struct AuthState {
    store: SessionStore,
    session: Option<Session>,
}

impl AuthState {
    /// Restore whatever session the store holds
    pub fn restore(store: SessionStore) -> Result<Self> {
        let session = store.load()?;
        if let Some(session) = &session {
            tracing::debug!(admin = %session.admin.email, "session restored");
        }
        Ok(Self { store, session })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn admin(&self) -> Option<&Admin> {
        self.session.as_ref().map(|s| &s.admin)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    /// The session, or [`Error::Unauthenticated`]
    pub fn require(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::Unauthenticated)
    }

    pub async fn login(&mut self, api: &mut ApiClient, credentials: &Credentials) -> Result<&Admin> {
        let response = api.login(credentials).await?;
        self.establish(api, response)
    }

    pub async fn register(&mut self, api: &mut ApiClient, form: &AccountForm) -> Result<&Admin> {
        let response = api.register(form).await?;
        self.establish(api, response)
    }

    fn establish(&mut self, api: &mut ApiClient, response: AuthResponse) -> Result<&Admin> {
        let session = Session {
            token: response.token,
            admin: response.admin,
        };
        self.store.save(&session)?;
        api.set_token(session.token.clone());
        tracing::info!(admin = %session.admin.email, "signed in");
        Ok(&self.session.insert(session).admin)
    }

    /// Forget the session locally; the backend keeps no logout state
    pub fn logout(&mut self, api: &mut ApiClient) -> Result<()> {
        self.store.clear()?;
        api.clear_token();
        if let Some(session) = self.session.take() {
            tracing::info!(admin = %session.admin.email, "signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::AppConfig;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    async fn start_server() -> AppConfig {
        let app = Router::new().route(
            "/api/admin/register",
            post(|Json(body): Json<Value>| async move {
                if body["email"] == "taken@example.com" {
                    return (StatusCode::BAD_REQUEST, Json(json!({"error": "Email already in use"})));
                }
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "token": "tok-new",
                        "admin": {"id": "a9", "name": body["name"], "email": body["email"]}
                    })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        AppConfig {
            api_url: format!("http://{addr}/api"),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_register_persists_and_logout_clears() {
        let config = start_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::at(dir.path().join("session.toml"));
        let mut api = ApiClient::new(&config).expect("client");

        let mut auth = AuthState::restore(store.clone()).expect("restore");
        assert!(!auth.is_authenticated());
        assert!(matches!(auth.require(), Err(Error::Unauthenticated)));

        let form = AccountForm::new("Nadia", "nadia@example.com", Some("pw".into()));
        let admin = auth.register(&mut api, &form).await.expect("register");
        assert_eq!(admin.id, "a9");
        assert_eq!(api.token(), Some("tok-new"));

        let restored = AuthState::restore(store.clone()).expect("restore");
        assert_eq!(restored.token(), Some("tok-new"));
        assert_eq!(restored.admin().map(|a| a.name.as_str()), Some("Nadia"));

        auth.logout(&mut api).expect("logout");
        assert!(api.token().is_none());
        assert!(!AuthState::restore(store).expect("restore").is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_register_keeps_signed_out() {
        let config = start_server().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let mut api = ApiClient::new(&config).expect("client");
        let mut auth =
            AuthState::restore(SessionStore::at(dir.path().join("session.toml"))).expect("restore");

        let form = AccountForm::new("Dup", "taken@example.com", Some("pw".into()));
        let err = auth.register(&mut api, &form).await.expect_err("taken");
        assert_eq!(err.to_string(), "Email already in use (HTTP 400)");
        assert!(!auth.is_authenticated());
    }
}
