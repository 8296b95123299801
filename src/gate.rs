//! Caller identity and the capability checks every request operation runs
//! before it touches storage.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::http::header::AUTHORIZATION;
use uuid::Uuid;

use crate::credential::{bearer, CredentialFailure, TokenKeys};
use crate::err::Error;
use crate::models::Role;

/// Verified identity of whoever sent the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// File a request on one's own behalf.
    Apply,
    /// Browse the requests routed to oneself.
    Review,
    /// Decide, or read, a request routed to this admin.
    Decide { assigned_admin: Uuid },
    /// Read one's own filed request.
    Own { owner: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Role,
    Ownership,
}

impl Caller {
    pub fn permits(&self, capability: Capability) -> Result<(), Denial> {
        let (role, owner) = match capability {
            Capability::Apply => (Role::User, None),
            Capability::Review => (Role::Admin, None),
            Capability::Decide { assigned_admin } => (Role::Admin, Some(assigned_admin)),
            Capability::Own { owner } => (Role::User, Some(owner)),
        };
        if self.role != role {
            return Err(Denial::Role);
        }
        match owner {
            Some(owner) if owner != self.id => Err(Denial::Ownership),
            _ => Ok(()),
        }
    }

    /// Like [`Caller::permits`], collapsing every denial into `AccessDenied`.
    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        self.permits(capability).map_err(|denial| {
            log::info!("caller {} denied {:?} ({:?})", self.id, capability, denial);
            Error::access_denied()
        })
    }
}

#[async_trait]
impl<B> FromRequest<B> for Caller
where
    B: Send,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let keys = req
            .extensions()
            .get::<Arc<TokenKeys>>()
            .cloned()
            .ok_or_else(|| Error::InternalError {
                kind: "ConfigurationError",
                message: "credential keys are not installed".to_string(),
            })?;

        let header = match req.headers().get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| CredentialFailure::Malformed)?),
            None => None,
        };
        let token = bearer(header)?;
        let claims = keys.verify(token).map_err(|failure| {
            log::info!("rejected credential: {:?}", failure);
            failure
        })?;

        Ok(Caller {
            id: claims.sub,
            role: claims.role,
        })
    }
}
