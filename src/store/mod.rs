//! Persistence seam for users and certificate requests.
//!
//! Implementations must uphold, at the storage boundary:
//! * case-insensitive uniqueness of user emails,
//! * at most one admin per branch,
//! * at most one `pending` request per user (`insert_request` fails with
//!   [`Error::DuplicatePending`] instead of inserting a second one),
//! * `decide_request` is a single conditional write that only touches a
//!   request which is still `pending` and assigned to the given admin.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::err::Error;
use crate::models::{Branch, CertificateRequest, RequestStatus, RequestWithOwner, User};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

pub trait Store: Send + Sync + 'static {
    fn insert_user(&self, user: &User) -> impl Future<Output = Result<(), Error>> + Send;

    fn find_user(&self, id: Uuid) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    fn find_branch_admin(
        &self,
        branch: Branch,
    ) -> impl Future<Output = Result<Option<User>, Error>> + Send;

    fn insert_request(
        &self,
        request: &CertificateRequest,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn find_request(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<RequestWithOwner>, Error>> + Send;

    /// Moves a pending request owned by `admin` to `status`. Returns `None`
    /// when no row matched all three conditions.
    fn decide_request(
        &self,
        id: Uuid,
        admin: Uuid,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<CertificateRequest>, Error>> + Send;

    fn list_admin_requests(
        &self,
        admin: Uuid,
    ) -> impl Future<Output = Result<Vec<RequestWithOwner>, Error>> + Send;

    /// The caller's request that is still `pending`, if any.
    fn find_pending_request(
        &self,
        user: Uuid,
    ) -> impl Future<Output = Result<Option<CertificateRequest>, Error>> + Send;

    fn list_user_requests(
        &self,
        user: Uuid,
    ) -> impl Future<Output = Result<Vec<CertificateRequest>, Error>> + Send;
}

pub(crate) fn duplicate_pending() -> Error {
    Error::DuplicatePending {
        message: "You have already filled the form".to_string(),
    }
}

pub(crate) fn user_already_exists() -> Error {
    Error::UserAlreadyExists {
        message: "User with provided email already exists!".to_string(),
    }
}

pub(crate) fn branch_admin_exists(branch: Branch) -> Error {
    Error::BranchAdminExists {
        branch,
        message: format!("Branch {} already has an admin", branch),
    }
}
