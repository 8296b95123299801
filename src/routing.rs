use crate::err::Error;
use crate::models::{Branch, Role, User};
use crate::store::Store;

/// Finds the administrator responsible for `branch`.
///
/// Storage keeps at most one admin per branch, so this is a point lookup
/// with no fallback: a branch without an admin is an operational gap and
/// the caller must not persist anything that would need one.
pub async fn resolve_admin<S: Store>(store: &S, branch: Branch) -> Result<User, Error> {
    match store.find_branch_admin(branch).await? {
        Some(admin) if admin.role == Role::Admin && admin.branch == branch => Ok(admin),
        _ => {
            log::warn!("no admin is provisioned for branch {}", branch);
            Err(Error::NoAdminForBranch {
                branch,
                message: "Admin not found for this branch".to_string(),
            })
        }
    }
}
