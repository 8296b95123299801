use serde::Serialize;
use serde_with::skip_serializing_none;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::CertificateRequest;

/// Everything the certificate renderer needs from an approved request.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFields {
    pub full_name: String,
    pub roll_number: String,
    pub batch_year: Option<i32>,
    pub email: String,
    pub placement_status: &'static str,
    pub certificate_id: String,
}

impl CertificateFields {
    pub fn of(request: &CertificateRequest) -> Self {
        Self {
            full_name: request.name.clone(),
            roll_number: request.roll_no.clone(),
            batch_year: request.batch_year,
            email: request.email.clone(),
            placement_status: if request.placement.placed {
                "Placed"
            } else {
                "Not Placed"
            },
            certificate_id: certificate_id(request.id),
        }
    }
}

/// Stable per request, so downloading twice yields the same certificate.
pub fn certificate_id(request: Uuid) -> String {
    let digest = Sha256::digest(request.as_bytes());
    format!("CERT-{}", hex::encode_upper(&digest[..6]))
}
