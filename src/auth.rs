use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::credential::{IssuedCredential, TokenKeys};
use crate::err::{Error, JsonBody, Success};
use crate::gate::Caller;
use crate::models::{Branch, Role, User, UserSummary};
use crate::store::Store;
use crate::validate::{known_branch, not_blank, EMAIL};
use crate::{proceeds, Payload};

pub fn hash_password(password: &str) -> Result<String, Error> {
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|hash| Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok())
        .unwrap_or(false)
}

/// Creates an account with the given role. Only the out-of-band
/// provisioning command passes [`Role::Admin`].
pub async fn register_account<S: Store>(
    store: &S,
    account: CreateAccount,
    role: Role,
) -> Result<User, Error> {
    let account = account.normalized();
    account.validate()?;
    let branch = account
        .branch
        .parse::<Branch>()
        .map_err(|message| Error::invalid("branch", message))?;
    let email = account.email;

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(Error::UserAlreadyExists {
            message: "User already exists".to_string(),
        });
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: account.name,
        email,
        password_hash: hash_password(&account.password)?,
        role,
        branch,
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user).await?;
    log::info!("registered {:?} account {} for branch {}", role, user.id, branch);
    Ok(user)
}

/// Unknown email and wrong password are reported identically.
pub async fn authenticate<S: Store>(store: &S, email: &str, password: &str) -> Result<User, Error> {
    let failure = || Error::AuthenticationFailure {
        message: "Invalid email or password".to_string(),
    };
    if password.is_empty() {
        return Err(failure());
    }
    let user = store
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(failure)?;
    if !verify_password(&user.password_hash, password) {
        log::info!("failed login for account {}", user.id);
        return Err(failure());
    }
    Ok(user)
}

pub async fn signup<S: Store>(
    Extension(store): Extension<Arc<S>>,
    Extension(keys): Extension<Arc<TokenKeys>>,
    JsonBody(account): JsonBody<CreateAccount>,
) -> Result<(StatusCode, Json<Success<SignedIn>>), Error> {
    let user = register_account(store.as_ref(), account, Role::User).await?;
    Ok((
        StatusCode::CREATED,
        Json(Success::of(SignedIn::new(&keys, &user)?)),
    ))
}

pub async fn login<S: Store>(
    Extension(store): Extension<Arc<S>>,
    Extension(keys): Extension<Arc<TokenKeys>>,
    JsonBody(login): JsonBody<Login>,
) -> Payload<SignedIn> {
    let user = authenticate(store.as_ref(), &login.email, &login.password).await?;
    proceeds(SignedIn::new(&keys, &user)?)
}

/// Credentials are stateless; the client discards its token.
pub async fn logout() -> Payload<LoggedOut> {
    proceeds(LoggedOut {
        message: "Logged out successfully",
    })
}

pub async fn me<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
) -> Payload<Me> {
    let user = store
        .find_user(caller.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            message: "User not found".to_string(),
        })?;
    proceeds(Me {
        user: UserSummary::from(&user),
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccount {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(regex(path = "EMAIL", message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(custom = "known_branch")]
    pub branch: String,
}

impl CreateAccount {
    /// Trims every field and lower-cases the email; the password is kept
    /// as typed.
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password,
            branch: self.branch.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    #[serde(flatten)]
    pub credential: IssuedCredential,
    pub user: UserSummary,
}

impl SignedIn {
    fn new(keys: &TokenKeys, user: &User) -> Result<Self, Error> {
        Ok(Self {
            credential: keys.issue(user)?,
            user: UserSummary::from(user),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedOut {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Me {
    pub user: UserSummary,
}
