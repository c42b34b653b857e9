use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;

use crate::models::{Role, User};
use crate::services::ledger::Requester;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn requester(&self) -> Requester {
        Requester { user_id: self.user_id.clone(), role: self.role }
    }
}

/// Пользователь с ролью admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Разобрать заголовок `Authorization: Basic base64(email:password)`.
pub fn parse_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Разделяем email:password
    let (email, password) = credentials.split_once(':')?;
    if email.is_empty() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_credentials)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user = User::find_by_email(&email, &state.db)
            .await
            .map_err(|e| {
                tracing::error!("auth lookup failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // bcrypt намеренно медленный, поэтому уводим проверку с рантайма
        let verified = tokio::task::spawn_blocking(move || {
            let ok = user.verify_password(&password);
            (ok, user)
        })
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        match verified {
            (true, user) => Ok(AuthUser {
                user_id: user.id,
                email: user.email,
                name: user.name,
                role: user.role,
            }),
            (false, _) => Err(StatusCode::UNAUTHORIZED),
        }
    }
}

impl FromRequestParts<Arc<crate::AppState>> for AdminUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(AdminUser(user))
    }
}
