//! Request identity resolution and the seam to the external identity store.
//!
//! Authentication itself is an upstream concern: the identity layer in front
//! of this service resolves the user and guest session and forwards them as
//! headers. Handlers receive an explicit [`Identity`] value; nothing in the
//! core does ambient session lookups.

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{ApiError, ServiceError};

/// Header carrying the authenticated user id, set by the identity layer.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the guest cart session id.
pub const SESSION_ID_HEADER: &str = "x-session-id";
/// Header carrying the caller's role.
pub const ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE: &str = "admin";

/// Per-request identity: an optional authenticated user plus a guest session.
///
/// When neither header is present a fresh session id is minted so the
/// request still has a cart owner key; the upstream session store is
/// expected to persist it via the response path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
}

impl Identity {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            session_id: None,
        }
    }

    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            session_id: Some(session_id.into()),
        }
    }

    /// The authenticated user id, or `Unauthorized` for guest-only requests.
    pub fn require_user(&self) -> Result<Uuid, ServiceError> {
        self.user_id
            .ok_or_else(|| ServiceError::Unauthorized("Sign in to continue".to_string()))
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());

        let session_id = parts
            .headers
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let session_id = match (&user_id, session_id) {
            (_, Some(sid)) => Some(sid),
            (Some(_), None) => None,
            (None, None) => Some(Uuid::new_v4().to_string()),
        };

        Ok(Identity {
            user_id,
            session_id,
        })
    }
}

/// Guard extractor for the admin subtree. Authorization is enforced by the
/// identity collaborator upstream; this only checks the forwarded role.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Option<Uuid>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !role
            .split(',')
            .any(|r| r.trim().eq_ignore_ascii_case(ADMIN_ROLE))
        {
            return Err(ApiError::Forbidden);
        }

        let identity = Identity::from_request_parts(parts, state).await?;
        Ok(AdminUser {
            user_id: identity.user_id,
        })
    }
}

/// User record as reported by the external identity/role store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
}

/// Seam to the external identity/role store. The storefront only ever
/// lists users and flips membership in the single fixed admin role.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError>;

    async fn count_users(&self) -> Result<u64, ServiceError>;

    /// Toggles the admin role for the user, returning the new flag.
    async fn toggle_admin(&self, user_id: Uuid) -> Result<bool, ServiceError>;
}

/// In-memory directory backing development and test deployments.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserSummary>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserSummary>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }

    pub async fn insert(&self, user: UserSummary) {
        self.users.write().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let users = self.users.read().await;
        let mut list: Vec<UserSummary> = users.values().cloned().collect();
        // Admins first, then by email, matching the back-office listing.
        list.sort_by(|a, b| b.is_admin.cmp(&a.is_admin).then(a.email.cmp(&b.email)));
        Ok(list)
    }

    async fn count_users(&self) -> Result<u64, ServiceError> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn toggle_admin(&self, user_id: Uuid) -> Result<bool, ServiceError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        user.is_admin = !user.is_admin;
        Ok(user.is_admin)
    }
}
