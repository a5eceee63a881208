//! Authentication middleware
//!
//! Verifies bearer tokens minted by the SPPG identity service and exposes the
//! caller's tenant and role to handlers. Authorization is role-based through
//! `RolePolicy`.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use shared::{ProcurementAction, RolePolicy, UserRole};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorResponse};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub name: String,
}

impl AuthUser {
    /// Check whether the user's role may perform a procurement action
    pub fn can(&self, action: ProcurementAction) -> bool {
        RolePolicy::allows(self.role, action)
    }

    /// Fail with 403 unless the role may perform the action
    pub fn require(&self, action: ProcurementAction) -> AppResult<()> {
        if self.can(action) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                role = %self.role,
                action = action.as_str(),
                "Procurement action denied"
            );
            Err(AppError::InsufficientPermissions {
                action: action.as_str().to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant_id: String,
    pub role: String,
    #[serde(default)]
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token.trim().to_string(),
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let auth_user = match authenticate(&token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Decode a bearer token into the authenticated user
pub fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
    let tenant_id = Uuid::parse_str(&claims.tenant_id).map_err(|_| AppError::InvalidToken)?;
    let role = UserRole::parse(&claims.role).ok_or(AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        tenant_id,
        role,
        name: claims.name,
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse::new("UNAUTHORIZED", message, "Tidak terautentikasi");
    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Originating client address, recorded on approval decisions
#[derive(Clone, Debug, Default)]
pub struct ClientIp(pub Option<String>);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let real_ip = || {
            parts
                .headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(ClientIp(forwarded.or_else(real_ip).or_else(peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(role: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: Uuid::new_v4().to_string(),
            role: role.to_string(),
            name: "Siti Rahma".to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn test_valid_token_yields_user() {
        let user = authenticate(&token("SPPG_KEPALA", 3600), SECRET).unwrap();
        assert_eq!(user.role, UserRole::SppgKepala);
        assert_eq!(user.name, "Siti Rahma");
    }

    #[test]
    fn test_expired_token_rejected() {
        let err = authenticate(&token("SPPG_KEPALA", -3600), SECRET).unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = authenticate(&token("FARMER", 3600), SECRET).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let err = authenticate(&token("SPPG_ADMIN", 3600), "other").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_viewer_cannot_cancel() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: UserRole::SppgViewer,
            name: String::new(),
        };
        assert!(user.require(ProcurementAction::View).is_ok());
        assert!(user.require(ProcurementAction::Cancel).is_err());
    }
}
