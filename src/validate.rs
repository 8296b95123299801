use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::err::Error;
use crate::models::{
    Branch, Exam, FuturePlan, FuturePlans, HigherStudies, Placement, PlacementDetails,
};

lazy_static! {
    pub static ref EMAIL: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    pub static ref PHONE: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
}

fn rejected(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(rejected("blank", "must not be empty"));
    }
    Ok(())
}

pub fn known_branch(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<Branch>()
        .map(|_| ())
        .map_err(|_| rejected("branch", "must be one of CSE, ECE, EEE, ME, CE"))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(value: Option<String>, field: &str, message: &str) -> Result<String, Error> {
    trimmed(value).ok_or_else(|| Error::invalid(field, message))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPayload {
    pub company_name: Option<String>,
    pub package: Option<String>,
    pub city: Option<String>,
}

impl PlacementPayload {
    fn is_empty(&self) -> bool {
        [&self.company_name, &self.package, &self.city]
            .iter()
            .all(|value| trimmed((*value).clone()).is_none())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HigherStudiesPayload {
    pub exam: Option<String>,
    pub country: Option<String>,
    pub course: Option<String>,
    pub university: Option<String>,
}

impl HigherStudiesPayload {
    fn is_empty(&self) -> bool {
        [&self.exam, &self.country, &self.course, &self.university]
            .iter()
            .all(|value| trimmed((*value).clone()).is_none())
    }
}

/// Body of a certificate request as the portal form submits it.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "known_branch")]
    pub branch: String,
    #[validate(custom = "not_blank")]
    pub roll_no: String,
    #[validate(regex(path = "PHONE", message = "Enter a valid 10-digit phone number."))]
    pub mobile_no: String,
    #[validate(regex(path = "PHONE", message = "Enter a valid 10-digit phone number."))]
    pub alternative_no: Option<String>,
    #[validate(regex(path = "EMAIL", message = "Enter a valid email address."))]
    pub email: String,
    #[validate(regex(path = "EMAIL", message = "Enter a valid email address."))]
    pub alternative_email: Option<String>,
    #[validate(range(min = 1950, max = 2100, message = "Enter a valid batch year."))]
    pub batch_year: Option<i32>,
    pub placed: bool,
    pub placement_details: Option<PlacementPayload>,
    pub future_plans: Option<String>,
    pub higher_studies_details: Option<HigherStudiesPayload>,
}

/// A payload that passed every field-level and conditional check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub branch: Branch,
    pub roll_no: String,
    pub mobile_no: String,
    pub alternative_no: Option<String>,
    pub email: String,
    pub alternative_email: Option<String>,
    pub batch_year: Option<i32>,
    pub placement: Placement,
    pub future_plans: Option<FuturePlans>,
}

impl RequestPayload {
    /// Trims text and treats blank optional fields as absent, the way the
    /// form leaves untouched inputs as empty strings.
    fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            branch: self.branch.trim().to_string(),
            roll_no: self.roll_no.trim().to_string(),
            mobile_no: self.mobile_no.trim().to_string(),
            alternative_no: trimmed(self.alternative_no),
            email: self.email.trim().to_string(),
            alternative_email: trimmed(self.alternative_email),
            batch_year: self.batch_year,
            placed: self.placed,
            placement_details: self.placement_details.filter(|details| !details.is_empty()),
            future_plans: trimmed(self.future_plans),
            higher_studies_details: self
                .higher_studies_details
                .filter(|details| !details.is_empty()),
        }
    }

    pub fn into_submission(self) -> Result<Submission, Error> {
        let payload = self.normalized();
        payload.validate()?;

        let branch = payload
            .branch
            .parse::<Branch>()
            .map_err(|message| Error::invalid("branch", message))?;
        let placement = placement(payload.placed, payload.placement_details)?;
        let future_plans = future_plans(
            payload.placed,
            payload.future_plans,
            payload.higher_studies_details,
        )?;

        Ok(Submission {
            name: payload.name,
            branch,
            roll_no: payload.roll_no,
            mobile_no: payload.mobile_no,
            alternative_no: payload.alternative_no,
            email: payload.email,
            alternative_email: payload.alternative_email,
            batch_year: payload.batch_year,
            placement,
            future_plans,
        })
    }
}

fn placement(placed: bool, details: Option<PlacementPayload>) -> Result<Placement, Error> {
    match (placed, details) {
        (true, Some(details)) => Ok(Placement {
            placed: true,
            details: Some(PlacementDetails {
                company_name: required(
                    details.company_name,
                    "placement_details.company_name",
                    "Company name is required when placed",
                )?,
                package: required(
                    details.package,
                    "placement_details.package",
                    "Package is required when placed",
                )?,
                city: required(
                    details.city,
                    "placement_details.city",
                    "City is required when placed",
                )?,
            }),
        }),
        (true, None) => Err(Error::invalid(
            "placement_details",
            "Placement details are required when placed",
        )),
        (false, Some(_)) => Err(Error::invalid(
            "placement_details",
            "Placement details are only accepted when placed",
        )),
        (false, None) => Ok(Placement {
            placed: false,
            details: None,
        }),
    }
}

fn future_plans(
    placed: bool,
    plan: Option<String>,
    higher_studies: Option<HigherStudiesPayload>,
) -> Result<Option<FuturePlans>, Error> {
    let plan = match plan {
        Some(plan) => plan
            .parse::<FuturePlan>()
            .map_err(|message| Error::invalid("future_plans", message))?,
        None if !placed => {
            return Err(Error::invalid(
                "future_plans",
                "A future plan is required when not placed",
            ))
        }
        None if higher_studies.is_some() => {
            return Err(Error::invalid(
                "higher_studies_details",
                "Higher studies details need the Higher Studies plan",
            ))
        }
        None => return Ok(None),
    };

    let higher_studies = match (plan, higher_studies) {
        (FuturePlan::HigherStudies, Some(details)) => Some(higher_studies_details(details)?),
        (FuturePlan::HigherStudies, None) => {
            return Err(Error::invalid(
                "higher_studies_details.exam",
                "An exam is required for Higher Studies",
            ))
        }
        (_, Some(_)) => {
            return Err(Error::invalid(
                "higher_studies_details",
                "Higher studies details need the Higher Studies plan",
            ))
        }
        (_, None) => None,
    };

    Ok(Some(FuturePlans {
        plan,
        higher_studies,
    }))
}

fn higher_studies_details(details: HigherStudiesPayload) -> Result<HigherStudies, Error> {
    let exam = required(
        details.exam,
        "higher_studies_details.exam",
        "An exam is required for Higher Studies",
    )?
    .parse::<Exam>()
    .map_err(|message| Error::invalid("higher_studies_details.exam", message))?;

    match exam {
        Exam::ForeignUniversities => Ok(HigherStudies {
            exam,
            country: Some(required(
                details.country,
                "higher_studies_details.country",
                "Country is required for foreign universities",
            )?),
            course: Some(required(
                details.course,
                "higher_studies_details.course",
                "Course is required for foreign universities",
            )?),
            university: Some(required(
                details.university,
                "higher_studies_details.university",
                "University is required for foreign universities",
            )?),
        }),
        Exam::Gate => {
            let extra = [
                ("higher_studies_details.country", details.country),
                ("higher_studies_details.course", details.course),
                ("higher_studies_details.university", details.university),
            ]
            .into_iter()
            .find(|(_, value)| trimmed(value.clone()).is_some());
            if let Some((field, _)) = extra {
                return Err(Error::invalid(
                    field,
                    "Only foreign university plans carry this detail",
                ));
            }
            Ok(HigherStudies {
                exam,
                country: None,
                course: None,
                university: None,
            })
        }
    }
}
