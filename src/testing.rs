//! Fixtures shared by the unit tests.

use chrono::Utc;
use uuid::Uuid;

use crate::gate::Caller;
use crate::lifecycle::pending_request;
use crate::models::{Branch, CertificateRequest, Role, User};
use crate::validate::{HigherStudiesPayload, PlacementPayload, RequestPayload};

/// Password hashing is slow on purpose; fixtures skip it.
pub fn account(name: &str, email: &str, role: Role, branch: Branch) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: "unusable".to_string(),
        role,
        branch,
        created_at: now,
        updated_at: now,
    }
}

pub fn caller_of(user: &User) -> Caller {
    Caller {
        id: user.id,
        role: user.role,
    }
}

pub fn placed_payload(branch: Branch) -> RequestPayload {
    RequestPayload {
        name: "Alice Liddell".to_string(),
        branch: branch.code().to_string(),
        roll_no: "19CS1042".to_string(),
        mobile_no: "9876543210".to_string(),
        alternative_no: None,
        email: "alice@college.edu".to_string(),
        alternative_email: Some("alice@mail.com".to_string()),
        batch_year: Some(2023),
        placed: true,
        placement_details: Some(PlacementPayload {
            company_name: Some("Initech".to_string()),
            package: Some("12 LPA".to_string()),
            city: Some("Pune".to_string()),
        }),
        future_plans: None,
        higher_studies_details: None,
    }
}

pub fn foreign_studies_payload(branch: Branch) -> RequestPayload {
    RequestPayload {
        placed: false,
        placement_details: None,
        future_plans: Some("Higher Studies".to_string()),
        higher_studies_details: Some(HigherStudiesPayload {
            exam: Some("Foreign Universities".to_string()),
            country: Some("Germany".to_string()),
            course: Some("MSc Informatics".to_string()),
            university: Some("TU Munich".to_string()),
        }),
        ..placed_payload(branch)
    }
}

/// A valid pending request filed by `owner` and routed to `admin`, built
/// without going through the lifecycle checks.
pub fn filed_by(owner: &User, admin: &User) -> CertificateRequest {
    let submission = placed_payload(owner.branch)
        .into_submission()
        .expect("fixture payload is valid");
    pending_request(owner.id, admin.id, submission)
}
