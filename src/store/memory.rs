//! In-process [`Store`] used by the test suite. It keeps every table behind
//! one lock so the uniqueness checks and the conditional status write are
//! atomic, the same guarantees the Postgres indexes give.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{branch_admin_exists, duplicate_pending, user_already_exists, Store};
use crate::err::Error;
use crate::models::{
    Branch, CertificateRequest, RequestStatus, RequestWithOwner, Role, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    requests: Vec<CertificateRequest>,
}

impl Tables {
    fn with_owner(&self, request: &CertificateRequest) -> Option<RequestWithOwner> {
        let owner = self.users.iter().find(|user| user.id == request.user_id)?;
        Some(RequestWithOwner {
            request: request.clone(),
            owner_name: owner.name.clone(),
            owner_email: owner.email.clone(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub async fn request_count(&self) -> usize {
        self.tables.lock().await.requests.len()
    }

    pub async fn pending_count(&self, user: Uuid) -> usize {
        self.tables
            .lock()
            .await
            .requests
            .iter()
            .filter(|request| request.user_id == user && request.status == RequestStatus::Pending)
            .count()
    }
}

fn newest_first(a: &DateTime<Utc>, b: &DateTime<Utc>) -> std::cmp::Ordering {
    b.cmp(a)
}

impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|existing| existing.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(user_already_exists());
        }
        if user.role == Role::Admin
            && tables
                .users
                .iter()
                .any(|existing| existing.role == Role::Admin && existing.branch == user.branch)
        {
            return Err(branch_admin_exists(user.branch));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_branch_admin(&self, branch: Branch) -> Result<Option<User>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.role == Role::Admin && user.branch == branch)
            .cloned())
    }

    async fn insert_request(&self, request: &CertificateRequest) -> Result<(), Error> {
        let mut tables = self.tables.lock().await;
        if request.status == RequestStatus::Pending
            && tables.requests.iter().any(|existing| {
                existing.user_id == request.user_id && existing.status == RequestStatus::Pending
            })
        {
            return Err(duplicate_pending());
        }
        tables.requests.push(request.clone());
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<RequestWithOwner>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .requests
            .iter()
            .find(|request| request.id == id)
            .and_then(|request| tables.with_owner(request)))
    }

    async fn decide_request(
        &self,
        id: Uuid,
        admin: Uuid,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CertificateRequest>, Error> {
        let mut tables = self.tables.lock().await;
        let request = tables.requests.iter_mut().find(|request| {
            request.id == id
                && request.assigned_admin == admin
                && request.status == RequestStatus::Pending
        });
        Ok(request.map(|request| {
            request.status = status;
            request.updated_at = at;
            request.clone()
        }))
    }

    async fn list_admin_requests(&self, admin: Uuid) -> Result<Vec<RequestWithOwner>, Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<_> = tables
            .requests
            .iter()
            .filter(|request| request.assigned_admin == admin)
            .filter_map(|request| tables.with_owner(request))
            .collect();
        rows.sort_by(|a, b| newest_first(&a.request.created_at, &b.request.created_at));
        Ok(rows)
    }

    async fn find_pending_request(&self, user: Uuid) -> Result<Option<CertificateRequest>, Error> {
        let tables = self.tables.lock().await;
        Ok(tables
            .requests
            .iter()
            .find(|request| request.user_id == user && request.status == RequestStatus::Pending)
            .cloned())
    }

    async fn list_user_requests(&self, user: Uuid) -> Result<Vec<CertificateRequest>, Error> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<_> = tables
            .requests
            .iter()
            .filter(|request| request.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| newest_first(&a.created_at, &b.created_at));
        Ok(rows)
    }
}
