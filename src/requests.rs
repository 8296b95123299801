use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::certificate::CertificateFields;
use crate::err::{Error, JsonBody, Success};
use crate::gate::{Caller, Capability};
use crate::lifecycle;
use crate::models::{CertificateRequest, RequestDetails, RequestStatus, RequestWithOwner};
use crate::store::Store;
use crate::validate::RequestPayload;
use crate::{proceeds, Payload};

/// Ids that do not parse cannot name an existing request.
fn request_id(raw: &str) -> Option<Uuid> {
    raw.parse::<Uuid>().ok()
}

pub async fn submit<S: Store>(
    caller: Result<Caller, Error>,
    Extension(store): Extension<Arc<S>>,
    JsonBody(payload): JsonBody<RequestPayload>,
) -> Result<(StatusCode, Json<Success<Submitted>>), Error> {
    let request = lifecycle::create(store.as_ref(), caller, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(Success::of(Submitted {
            message: "Request submitted successfully",
            request,
        })),
    ))
}

pub async fn mine<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
) -> Payload<MyRequests> {
    let requests = lifecycle::list_mine(store.as_ref(), &caller).await?;
    proceeds(MyRequests { requests })
}

pub async fn certificate<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
    Path(raw): Path<String>,
) -> Payload<CertificateFields> {
    let id = request_id(&raw).ok_or_else(Error::request_not_found)?;
    proceeds(lifecycle::certificate(store.as_ref(), &caller, id).await?)
}

pub async fn admin_requests<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
) -> Payload<AdminRequests> {
    let requests = lifecycle::list_for_admin(store.as_ref(), &caller).await?;
    proceeds(AdminRequests { requests })
}

pub async fn details<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
    Path(raw): Path<String>,
) -> Payload<Details> {
    caller.require(Capability::Review)?;
    let id = request_id(&raw).ok_or_else(Error::request_not_found)?;
    let request_details = lifecycle::get(store.as_ref(), &caller, id).await?;
    proceeds(Details { request_details })
}

pub async fn update_status<S: Store>(
    caller: Caller,
    Extension(store): Extension<Arc<S>>,
    Path(raw): Path<String>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Payload<Decided> {
    caller.require(Capability::Review)?;
    let id = request_id(&raw).ok_or_else(Error::access_denied)?;
    let status = update
        .status
        .parse::<RequestStatus>()
        .map_err(|message| Error::invalid("status", message))?;
    let request = lifecycle::transition(store.as_ref(), &caller, id, status).await?;
    proceeds(Decided {
        message: "Request status updated successfully",
        request,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub message: &'static str,
    pub request: CertificateRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decided {
    pub message: &'static str,
    pub request: CertificateRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyRequests {
    pub requests: Vec<CertificateRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminRequests {
    pub requests: Vec<RequestWithOwner>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub request_details: RequestDetails,
}
