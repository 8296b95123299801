//! Certificate request lifecycle: `pending` on creation, then exactly one
//! decision (`approved` or `rejected`) by the admin the request was routed
//! to. Both invariants that could race, one pending request per user and a
//! single decision per request, are enforced by the store's atomic writes;
//! the checks here only pick the error to report.

use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

use crate::certificate::CertificateFields;
use crate::err::Error;
use crate::gate::{Caller, Capability};
use crate::models::{CertificateRequest, RequestDetails, RequestStatus, RequestWithOwner};
use crate::routing::resolve_admin;
use crate::store::{duplicate_pending, Store};
use crate::validate::{RequestPayload, Submission};

/// Files a new request for the caller.
///
/// The payload is validated before the credential is looked at, so a
/// malformed form is reported as such even to an anonymous caller.
pub async fn create<S: Store>(
    store: &S,
    caller: Result<Caller, Error>,
    payload: RequestPayload,
) -> Result<CertificateRequest, Error> {
    let submission = payload.into_submission()?;
    let caller = caller?;
    caller.require(Capability::Apply)?;

    if store.find_pending_request(caller.id).await?.is_some() {
        return Err(duplicate_pending());
    }

    let admin = resolve_admin(store, submission.branch).await?;

    let request = pending_request(caller.id, admin.id, submission);
    store.insert_request(&request).await?;

    log::info!(
        "request {} filed by {} for branch {}, routed to {}",
        request.id,
        caller.id,
        request.branch,
        admin.id
    );
    Ok(request)
}

/// A fresh `pending` request owned by `owner` and routed to `admin`.
pub(crate) fn pending_request(
    owner: Uuid,
    admin: Uuid,
    submission: Submission,
) -> CertificateRequest {
    let now = Utc::now();
    CertificateRequest {
        id: Uuid::new_v4(),
        user_id: owner,
        assigned_admin: admin,
        name: submission.name,
        branch: submission.branch,
        roll_no: submission.roll_no,
        mobile_no: submission.mobile_no,
        alternative_no: submission.alternative_no,
        email: submission.email,
        alternative_email: submission.alternative_email,
        batch_year: submission.batch_year,
        placement: Json(submission.placement),
        future_plans: submission.future_plans.map(Json),
        status: RequestStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

/// Records the assigned admin's decision on a pending request.
pub async fn transition<S: Store>(
    store: &S,
    caller: &Caller,
    id: Uuid,
    status: RequestStatus,
) -> Result<CertificateRequest, Error> {
    caller.require(Capability::Review)?;
    if !status.is_terminal() {
        return Err(Error::invalid("status", "Status must be approved or rejected"));
    }

    if let Some(updated) = store.decide_request(id, caller.id, status, Utc::now()).await? {
        log::info!("request {} {} by {}", id, status, caller.id);
        return Ok(updated);
    }

    // The write matched nothing; a point read tells the admin why, without
    // revealing requests that belong to somebody else.
    match store.find_request(id).await? {
        Some(row)
            if caller
                .permits(Capability::Decide {
                    assigned_admin: row.request.assigned_admin,
                })
                .is_ok() =>
        {
            Err(Error::InvalidStateTransition {
                current: row.request.status,
                message: "Can only update pending requests".to_string(),
            })
        }
        _ => {
            log::info!("caller {} may not decide request {}", caller.id, id);
            Err(Error::access_denied())
        }
    }
}

async fn owned_by_reviewer<S: Store>(
    store: &S,
    caller: &Caller,
    id: Uuid,
) -> Result<RequestWithOwner, Error> {
    let row = store
        .find_request(id)
        .await?
        .ok_or_else(Error::request_not_found)?;
    caller
        .permits(Capability::Decide {
            assigned_admin: row.request.assigned_admin,
        })
        .map_err(|_| Error::request_not_found())?;
    Ok(row)
}

/// Full view of one request, for the admin it is routed to. Requests routed
/// elsewhere are indistinguishable from missing ones.
pub async fn get<S: Store>(store: &S, caller: &Caller, id: Uuid) -> Result<RequestDetails, Error> {
    caller.require(Capability::Review)?;
    Ok(owned_by_reviewer(store, caller, id).await?.into())
}

pub async fn list_for_admin<S: Store>(
    store: &S,
    caller: &Caller,
) -> Result<Vec<RequestWithOwner>, Error> {
    caller.require(Capability::Review)?;
    let rows = store.list_admin_requests(caller.id).await?;
    Ok(rows
        .into_iter()
        .filter(|row| row.request.assigned_admin == caller.id)
        .collect())
}

pub async fn list_mine<S: Store>(
    store: &S,
    caller: &Caller,
) -> Result<Vec<CertificateRequest>, Error> {
    caller.require(Capability::Apply)?;
    store.list_user_requests(caller.id).await
}

/// Certificate fields for the caller's own approved request.
pub async fn certificate<S: Store>(
    store: &S,
    caller: &Caller,
    id: Uuid,
) -> Result<CertificateFields, Error> {
    caller.require(Capability::Apply)?;
    let row = store
        .find_request(id)
        .await?
        .ok_or_else(Error::request_not_found)?;
    caller
        .permits(Capability::Own {
            owner: row.request.user_id,
        })
        .map_err(|_| Error::request_not_found())?;

    if row.request.status != RequestStatus::Approved {
        return Err(Error::InvalidStateTransition {
            current: row.request.status,
            message: "Certificates are issued for approved requests only".to_string(),
        });
    }
    Ok(CertificateFields::of(&row.request))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credential::CredentialFailure;
    use crate::models::{Branch, Role, User};
    use crate::store::memory::MemoryStore;
    use crate::testing::{account, caller_of, foreign_studies_payload, placed_payload};

    struct Campus {
        store: MemoryStore,
        alice: User,
        bob: User,
        carol: User,
    }

    async fn campus() -> Campus {
        let store = MemoryStore::default();
        let alice = account("Alice", "alice@college.edu", Role::User, Branch::Cse);
        let bob = account("Bob", "bob@college.edu", Role::Admin, Branch::Cse);
        let carol = account("Carol", "carol@college.edu", Role::Admin, Branch::Ece);
        for user in [&alice, &bob, &carol] {
            store.insert_user(user).await.unwrap();
        }
        Campus {
            store,
            alice,
            bob,
            carol,
        }
    }

    async fn filed(campus: &Campus) -> CertificateRequest {
        create(
            &campus.store,
            Ok(caller_of(&campus.alice)),
            placed_payload(Branch::Cse),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn no_admin_for_branch_persists_nothing() {
        let store = MemoryStore::default();
        let alice = account("Alice", "alice@college.edu", Role::User, Branch::Cse);
        store.insert_user(&alice).await.unwrap();

        let err = create(&store, Ok(caller_of(&alice)), placed_payload(Branch::Cse))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoAdminForBranch { .. }));
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn request_is_pending_and_routed_to_branch_admin() {
        let campus = campus().await;
        let request = filed(&campus).await;
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.assigned_admin, campus.bob.id);
        assert_eq!(request.user_id, campus.alice.id);
        assert_eq!(request.created_at, request.updated_at);
    }

    #[tokio::test]
    async fn second_request_while_pending_is_a_duplicate() {
        let campus = campus().await;
        filed(&campus).await;
        let err = create(
            &campus.store,
            Ok(caller_of(&campus.alice)),
            foreign_studies_payload(Branch::Cse),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::DuplicatePending { .. }));
        assert_eq!(campus.store.request_count().await, 1);
    }

    #[tokio::test]
    async fn a_decided_request_allows_a_new_one() {
        let campus = campus().await;
        let first = filed(&campus).await;
        transition(
            &campus.store,
            &caller_of(&campus.bob),
            first.id,
            RequestStatus::Rejected,
        )
        .await
        .unwrap();
        let pending = campus.store.find_pending_request(campus.alice.id).await;
        assert!(pending.unwrap().is_none());

        let second = filed(&campus).await;
        assert_ne!(first.id, second.id);
        assert_eq!(campus.store.pending_count(campus.alice.id).await, 1);
        let pending = campus.store.find_pending_request(campus.alice.id).await;
        assert_eq!(pending.unwrap().map(|request| request.id), Some(second.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_leave_one_pending_request() {
        let campus = Arc::new(campus().await);
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let campus = Arc::clone(&campus);
                tokio::spawn(async move {
                    create(
                        &campus.store,
                        Ok(caller_of(&campus.alice)),
                        placed_payload(Branch::Cse),
                    )
                    .await
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, Error::DuplicatePending { .. })),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(campus.store.pending_count(campus.alice.id).await, 1);
    }

    #[tokio::test]
    async fn invalid_payload_is_reported_before_credentials() {
        let campus = campus().await;
        let mut payload = placed_payload(Branch::Cse);
        payload.mobile_no = "123".to_string();
        let err = create(&campus.store, Err(CredentialFailure::Missing.into()), payload)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));

        let err = create(
            &campus.store,
            Err(CredentialFailure::Expired.into()),
            placed_payload(Branch::Cse),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Unauthenticated {
                reason: CredentialFailure::Expired,
                ..
            }
        ));
        assert_eq!(campus.store.request_count().await, 0);
    }

    #[tokio::test]
    async fn admins_do_not_file_requests() {
        let campus = campus().await;
        let err = create(
            &campus.store,
            Ok(caller_of(&campus.bob)),
            placed_payload(Branch::Cse),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn approval_is_final() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let bob = caller_of(&campus.bob);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let approved = transition(&campus.store, &bob, request.id, RequestStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.updated_at > request.updated_at);
        assert_eq!(approved.created_at, request.created_at);

        let err = transition(&campus.store, &bob, request.id, RequestStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                current: RequestStatus::Approved,
                ..
            }
        ));
        let stored = campus.store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.request.status, RequestStatus::Approved);
        assert_eq!(stored.request.updated_at, approved.updated_at);
    }

    #[tokio::test]
    async fn other_branch_admin_cannot_decide() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let err = transition(
            &campus.store,
            &caller_of(&campus.carol),
            request.id,
            RequestStatus::Approved,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        let stored = campus.store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.request.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_and_foreign_requests_look_alike_on_transition() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let carol = caller_of(&campus.carol);
        let foreign = transition(&campus.store, &carol, request.id, RequestStatus::Approved)
            .await
            .unwrap_err();
        let missing = transition(&campus.store, &carol, Uuid::new_v4(), RequestStatus::Approved)
            .await
            .unwrap_err();
        assert_eq!(
            serde_json::to_value(&foreign).unwrap(),
            serde_json::to_value(&missing).unwrap()
        );
    }

    #[tokio::test]
    async fn the_owner_cannot_decide_their_own_request() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let err = transition(
            &campus.store,
            &caller_of(&campus.alice),
            request.id,
            RequestStatus::Approved,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn pending_is_not_a_decision() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let err = transition(
            &campus.store,
            &caller_of(&campus.bob),
            request.id,
            RequestStatus::Pending,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPayload { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_apply_once() {
        let campus = Arc::new(campus().await);
        let request = filed(&campus).await;
        let decisions: Vec<_> = [RequestStatus::Approved, RequestStatus::Rejected]
            .into_iter()
            .cycle()
            .take(10)
            .map(|status| {
                let campus = Arc::clone(&campus);
                tokio::spawn(async move {
                    transition(&campus.store, &caller_of(&campus.bob), request.id, status).await
                })
            })
            .collect();

        let mut winners = Vec::new();
        for decision in decisions {
            match decision.await.unwrap() {
                Ok(updated) => winners.push(updated.status),
                Err(err) => assert!(matches!(err, Error::InvalidStateTransition { .. })),
            }
        }
        assert_eq!(winners.len(), 1);
        let stored = campus.store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.request.status, winners[0]);
    }

    #[tokio::test]
    async fn get_is_scoped_to_the_assigned_admin() {
        let campus = campus().await;
        let request = filed(&campus).await;

        let details = get(&campus.store, &caller_of(&campus.bob), request.id)
            .await
            .unwrap();
        assert_eq!(details.id, request.id);
        assert_eq!(details.submitted_by.name, "Alice");
        assert_eq!(details.personal_info.roll_no, "19CS1042");
        assert!(details.placement.placed);

        let err = get(&campus.store, &caller_of(&campus.carol), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = get(&campus.store, &caller_of(&campus.alice), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn admin_listing_only_shows_routed_requests() {
        let campus = campus().await;
        filed(&campus).await;
        let dan = account("Dan", "dan@college.edu", Role::User, Branch::Ece);
        campus.store.insert_user(&dan).await.unwrap();
        create(
            &campus.store,
            Ok(caller_of(&dan)),
            foreign_studies_payload(Branch::Ece),
        )
        .await
        .unwrap();

        let bobs = list_for_admin(&campus.store, &caller_of(&campus.bob))
            .await
            .unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].owner_email, "alice@college.edu");
        assert!(bobs.iter().all(|row| row.request.assigned_admin == campus.bob.id));

        let carols = list_for_admin(&campus.store, &caller_of(&campus.carol))
            .await
            .unwrap();
        assert_eq!(carols.len(), 1);
        assert_eq!(carols[0].owner_name, "Dan");
    }

    #[tokio::test]
    async fn certificate_needs_an_approved_own_request() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let alice = caller_of(&campus.alice);

        let err = certificate(&campus.store, &alice, request.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidStateTransition {
                current: RequestStatus::Pending,
                ..
            }
        ));

        transition(
            &campus.store,
            &caller_of(&campus.bob),
            request.id,
            RequestStatus::Approved,
        )
        .await
        .unwrap();
        let fields = certificate(&campus.store, &alice, request.id).await.unwrap();
        assert_eq!(fields.full_name, "Alice Liddell");
        assert_eq!(fields.placement_status, "Placed");
        assert_eq!(fields.batch_year, Some(2023));

        let dan = account("Dan", "dan@college.edu", Role::User, Branch::Cse);
        campus.store.insert_user(&dan).await.unwrap();
        let err = certificate(&campus.store, &caller_of(&dan), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_mine_shows_own_history() {
        let campus = campus().await;
        let request = filed(&campus).await;
        let mine = list_mine(&campus.store, &caller_of(&campus.alice))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, request.id);
    }
}
