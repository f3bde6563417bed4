//! Authentication middleware
//!
//! JWT bearer authentication and the role checks handlers rely on

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::errors::ErrorKind;
use shared::{Access, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Option<Role>,
    pub is_staff: bool,
}

impl AuthUser {
    pub fn access(&self) -> Access {
        Access::new(self.role, self.is_staff)
    }

    pub fn require_staff(&self) -> AppResult<()> {
        if self.access().is_staff_user() {
            Ok(())
        } else {
            Err(AppError::forbidden("staff only"))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.access().is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("admin only"))
        }
    }

    pub fn require_manager(&self) -> AppResult<()> {
        if self.access().is_manager_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("manager or admin only"))
        }
    }

    pub fn require_reports(&self) -> AppResult<()> {
        if self.access().can_view_reports() {
            Ok(())
        } else {
            Err(AppError::forbidden("report access"))
        }
    }

    /// Owner of the record or a manager/admin/staff user
    pub fn require_owner_or_manager(&self, owner_id: Uuid) -> AppResult<()> {
        if self.access().can_access_owned(self.user_id, owner_id) {
            Ok(())
        } else {
            Err(AppError::forbidden("not the owner"))
        }
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(&request) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let auth_user = match authenticate(&token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Like [`auth_middleware`] but lets anonymous requests through; a valid
/// token still identifies the caller
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&request) {
        match authenticate(&token, &state.config.jwt.secret) {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(err) => return err.into_response(),
        }
    }

    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

pub(crate) fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode_access_token(token, secret).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        username: claims.username,
        role: claims.role.as_deref().and_then(Role::parse),
        is_staff: claims.is_staff,
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message, "No autorizado"),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required",
                        "Debe iniciar sesión",
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<Role>, is_staff: bool) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "tester".to_string(),
            role,
            is_staff,
        }
    }

    #[test]
    fn test_role_guards() {
        assert!(user(Some(Role::Manager), false).require_manager().is_ok());
        assert!(user(Some(Role::Cajero), false).require_manager().is_err());
        assert!(user(Some(Role::Cajero), false).require_reports().is_ok());
        assert!(user(None, true).require_staff().is_ok());
        assert!(user(None, true).require_admin().is_err());
    }

    #[test]
    fn test_owner_guard() {
        let customer = user(None, false);
        assert!(customer.require_owner_or_manager(customer.user_id).is_ok());
        assert!(customer.require_owner_or_manager(Uuid::new_v4()).is_err());
    }
}
