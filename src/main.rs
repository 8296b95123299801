pub mod auth;
pub mod certificate;
pub mod config;
pub mod credential;
pub mod err;
pub mod gate;
pub mod lifecycle;
pub mod models;
pub mod requests;
pub mod routing;
pub mod store;
pub mod validate;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{bail, Context};
use axum::handler::Handler;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;

use crate::auth::CreateAccount;
use crate::config::Config;
use crate::credential::TokenKeys;
use crate::err::{Error, Success};
use crate::models::Role;
use crate::store::{PgStore, Store};

pub type Payload<T> = Result<Json<Success<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Success::of(value)))
}

pub fn app<S: Store>(store: Arc<S>, keys: Arc<TokenKeys>) -> Router {
    Router::new()
        .route("/auth/signup", post(auth::signup::<S>))
        .route("/auth/login", post(auth::login::<S>))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me::<S>))
        .route("/requests/submit", post(requests::submit::<S>))
        .route("/requests/mine", get(requests::mine::<S>))
        .route(
            "/requests/mine/:request_id/certificate",
            get(requests::certificate::<S>),
        )
        .route("/requests/admin-requests", get(requests::admin_requests::<S>))
        .route("/requests/:request_id", get(requests::details::<S>))
        .route(
            "/requests/:request_id/status",
            put(requests::update_status::<S>),
        )
        .fallback(err::handler404.into_service())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(store))
                .layer(Extension(keys)),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url, config.max_connections).await?;

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("provision-admin") => return provision_admin(&store, args.collect()).await,
        Some(other) => bail!("unknown command `{}`", other),
        None => {}
    }

    let keys = Arc::new(config.token_keys()?);
    let app = app(Arc::new(store), keys);

    log::info!("Starting alumni portal on http://{}", config.bind_addr);
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// `provision-admin <name> <email> <branch>`, password from
/// `ALUMNI_ADMIN_PASSWORD`.
async fn provision_admin<S: Store>(store: &S, args: Vec<String>) -> anyhow::Result<()> {
    let [name, email, branch]: [String; 3] = match args.try_into() {
        Ok(args) => args,
        Err(_) => bail!("usage: provision-admin <name> <email> <branch>"),
    };
    let password =
        std::env::var("ALUMNI_ADMIN_PASSWORD").context("ALUMNI_ADMIN_PASSWORD must be set")?;
    let admin = auth::register_account(
        store,
        CreateAccount {
            name,
            email,
            password,
            branch,
        },
        Role::Admin,
    )
    .await?;
    log::info!("provisioned admin {} for branch {}", admin.id, admin.branch);
    println!("{}", admin.id);
    Ok(())
}
