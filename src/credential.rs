//! Signed, time-limited caller credentials: HS256 JSON Web Tokens carrying
//! the account id and role.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::err::Error;
use crate::models::{Role, User};

#[derive(Debug, Clone, Copy, Eq, Ord, PartialOrd, PartialEq)]
pub enum CredentialFailure {
    Missing,
    Malformed,
    InvalidSignature,
    Expired,
}

impl Serialize for CredentialFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:?}", self))
    }
}

impl From<CredentialFailure> for Error {
    fn from(reason: CredentialFailure) -> Self {
        let message = match reason {
            CredentialFailure::Missing => "Access denied. No token provided.",
            CredentialFailure::Malformed => "Invalid token",
            CredentialFailure::InvalidSignature => "Invalid token signature",
            CredentialFailure::Expired => "Token has expired",
        };
        Error::Unauthenticated {
            reason,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new<K: AsRef<[u8]>>(secret: K, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<IssuedCredential, Error> {
        self.issue_at(user.id, user.role, Utc::now())
    }

    pub fn issue_at(
        &self,
        sub: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, Error> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| Error::InternalError {
                kind: "CredentialError",
                message: "credential lifetime overflows the clock".to_string(),
            })?;
        let claims = Claims {
            sub,
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(
            |err| Error::InternalError {
                kind: "CredentialError",
                message: err.to_string(),
            },
        )?;
        Ok(IssuedCredential {
            token,
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(expires_at),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, CredentialFailure> {
        if token.is_empty() {
            return Err(CredentialFailure::Missing);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => CredentialFailure::Expired,
                ErrorKind::InvalidSignature => CredentialFailure::InvalidSignature,
                _ => CredentialFailure::Malformed,
            })
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer(header: Option<&str>) -> Result<&str, CredentialFailure> {
    let header = header.ok_or(CredentialFailure::Missing)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(CredentialFailure::Malformed)?
        .trim();
    if token.is_empty() {
        return Err(CredentialFailure::Malformed);
    }
    Ok(token)
}
