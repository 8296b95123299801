use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgDatabaseError, PgPoolOptions};
use sqlx::PgPool;
use uuid::Uuid;

use super::{branch_admin_exists, duplicate_pending, user_already_exists, Store};
use crate::err::Error;
use crate::models::{Branch, CertificateRequest, RequestStatus, RequestWithOwner, User};

const UNIQUE_VIOLATION: &str = "23505";

const SELECT_WITH_OWNER: &str = "SELECT r.*, u.name AS owner_name, u.email AS owner_email \
     FROM requests r JOIN users u ON u.id = r.user_id";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("could not connect to the database")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("could not apply migrations")?;
        Ok(Self::new(pool))
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    let db = err.as_database_error()?;
    if db.code().as_deref() != Some(UNIQUE_VIOLATION) {
        return None;
    }
    db.try_downcast_ref::<PgDatabaseError>()?.constraint()
}

impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), Error> {
        let res = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, branch, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.branch)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        let err = match res {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        let known = match violated_constraint(&err) {
            Some("users_email_key") => Some(user_already_exists()),
            Some("users_one_admin_per_branch") => Some(branch_admin_exists(user.branch)),
            _ => None,
        };
        Err(known.unwrap_or_else(|| Error::from(err)))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1) LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)
    }

    async fn find_branch_admin(&self, branch: Branch) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE branch = $1 AND role = 'admin' ORDER BY created_at LIMIT 1",
        )
        .bind(branch)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)
    }

    async fn insert_request(&self, request: &CertificateRequest) -> Result<(), Error> {
        let res = sqlx::query(
            "INSERT INTO requests (id, user_id, assigned_admin, name, branch, roll_no, mobile_no, \
             alternative_no, email, alternative_email, batch_year, placement, future_plans, status, \
             created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.assigned_admin)
        .bind(&request.name)
        .bind(request.branch)
        .bind(&request.roll_no)
        .bind(&request.mobile_no)
        .bind(&request.alternative_no)
        .bind(&request.email)
        .bind(&request.alternative_email)
        .bind(request.batch_year)
        .bind(&request.placement)
        .bind(&request.future_plans)
        .bind(request.status)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await;

        let err = match res {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        if violated_constraint(&err) == Some("requests_one_pending_per_user") {
            log::warn!("user {} raced a second pending request", request.user_id);
            return Err(duplicate_pending());
        }
        Err(Error::from(err))
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<RequestWithOwner>, Error> {
        sqlx::query_as::<_, RequestWithOwner>(&format!("{} WHERE r.id = $1", SELECT_WITH_OWNER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::from)
    }

    async fn decide_request(
        &self,
        id: Uuid,
        admin: Uuid,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<CertificateRequest>, Error> {
        sqlx::query_as::<_, CertificateRequest>(
            "UPDATE requests SET status = $1, updated_at = $2 \
             WHERE id = $3 AND assigned_admin = $4 AND status = 'pending' \
             RETURNING *",
        )
        .bind(status)
        .bind(at)
        .bind(id)
        .bind(admin)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)
    }

    async fn list_admin_requests(&self, admin: Uuid) -> Result<Vec<RequestWithOwner>, Error> {
        sqlx::query_as::<_, RequestWithOwner>(&format!(
            "{} WHERE r.assigned_admin = $1 ORDER BY r.created_at DESC",
            SELECT_WITH_OWNER
        ))
        .bind(admin)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::from)
    }

    async fn find_pending_request(&self, user: Uuid) -> Result<Option<CertificateRequest>, Error> {
        sqlx::query_as::<_, CertificateRequest>(
            "SELECT * FROM requests WHERE user_id = $1 AND status = 'pending' LIMIT 1",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from)
    }

    async fn list_user_requests(&self, user: Uuid) -> Result<Vec<CertificateRequest>, Error> {
        sqlx::query_as::<_, CertificateRequest>(
            "SELECT * FROM requests WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::from)
    }
}
