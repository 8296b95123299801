use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::types::Json;
use uuid::Uuid;

/// Academic department a user belongs to and a request is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "branch", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Cse,
    Ece,
    Eee,
    Me,
    Ce,
}

impl Branch {
    pub const ALL: [Branch; 5] = [Branch::Cse, Branch::Ece, Branch::Eee, Branch::Me, Branch::Ce];

    pub fn code(&self) -> &'static str {
        match self {
            Branch::Cse => "CSE",
            Branch::Ece => "ECE",
            Branch::Eee => "EEE",
            Branch::Me => "ME",
            Branch::Ce => "CE",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Branch::ALL
            .into_iter()
            .find(|branch| branch.code() == s)
            .ok_or_else(|| format!("`{}` is not a known branch", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        })
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("`{}` is not a request status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuturePlan {
    #[serde(rename = "Higher Studies")]
    HigherStudies,
    #[serde(rename = "Off Campus Prep")]
    OffCampusPrep,
    #[serde(rename = "Startup")]
    Startup,
}

impl FromStr for FuturePlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Higher Studies" => Ok(FuturePlan::HigherStudies),
            "Off Campus Prep" => Ok(FuturePlan::OffCampusPrep),
            "Startup" => Ok(FuturePlan::Startup),
            other => Err(format!("`{}` is not a known future plan", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exam {
    #[serde(rename = "Foreign Universities")]
    ForeignUniversities,
    #[serde(rename = "GATE")]
    Gate,
}

impl FromStr for Exam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Foreign Universities" => Ok(Exam::ForeignUniversities),
            "GATE" => Ok(Exam::Gate),
            other => Err(format!("`{}` is not a known exam", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub branch: Branch,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub branch: Branch,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            branch: user.branch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementDetails {
    pub company_name: String,
    pub package: String,
    pub city: String,
}

/// `details` is present exactly when `placed` is true.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub placed: bool,
    pub details: Option<PlacementDetails>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HigherStudies {
    pub exam: Exam,
    pub country: Option<String>,
    pub course: Option<String>,
    pub university: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturePlans {
    pub plan: FuturePlan,
    pub higher_studies: Option<HigherStudies>,
}

/// One certificate application as stored in the `requests` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub assigned_admin: Uuid,
    pub name: String,
    pub branch: Branch,
    pub roll_no: String,
    pub mobile_no: String,
    pub alternative_no: Option<String>,
    pub email: String,
    pub alternative_email: Option<String>,
    pub batch_year: Option<i32>,
    pub placement: Json<Placement>,
    pub future_plans: Option<Json<FuturePlans>>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request joined with the name and email of the user who filed it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RequestWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: CertificateRequest,
    pub owner_name: String,
    pub owner_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedBy {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub mobile_no: String,
    pub alternative_no: Option<String>,
    pub email: String,
    pub alternative_email: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub branch: Branch,
    pub roll_no: String,
    pub batch_year: Option<i32>,
    pub contact: Contact,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized view handed to the reviewing admin.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub id: Uuid,
    pub status: RequestStatus,
    pub assigned_admin: Uuid,
    pub submitted_by: SubmittedBy,
    pub personal_info: PersonalInfo,
    pub placement: Placement,
    pub future: Option<FuturePlans>,
    pub timestamps: Timestamps,
}

impl From<RequestWithOwner> for RequestDetails {
    fn from(row: RequestWithOwner) -> Self {
        let RequestWithOwner {
            request,
            owner_name,
            owner_email,
        } = row;
        Self {
            id: request.id,
            status: request.status,
            assigned_admin: request.assigned_admin,
            submitted_by: SubmittedBy {
                id: request.user_id,
                name: owner_name,
                email: owner_email,
            },
            personal_info: PersonalInfo {
                name: request.name,
                branch: request.branch,
                roll_no: request.roll_no,
                batch_year: request.batch_year,
                contact: Contact {
                    mobile_no: request.mobile_no,
                    alternative_no: request.alternative_no,
                    email: request.email,
                    alternative_email: request.alternative_email,
                },
            },
            placement: request.placement.0,
            future: request.future_plans.map(|plans| plans.0),
            timestamps: Timestamps {
                created_at: request.created_at,
                updated_at: request.updated_at,
            },
        }
    }
}
