//! Add/remove toggles shared by favorites, shopping carts and subscriptions.

use super::{
    error::FoodgramError,
    schema::{Membership, MembershipKind, Uuid},
};

/// Storage seam for membership rows.
///
/// `insert` must report `false` when the (user, target) pair is already present, and
/// `delete` must report `false` when there was nothing to delete. Both have to be
/// decided by the storage itself so that concurrent toggles cannot both succeed.
#[allow(async_fn_in_trait)]
pub trait MembershipStore {
    async fn target_exists(&self, kind: MembershipKind, target: Uuid)
        -> Result<bool, FoodgramError>;

    async fn contains(
        &self,
        kind: MembershipKind,
        user: Uuid,
        target: Uuid,
    ) -> Result<bool, FoodgramError>;

    async fn insert(&self, kind: MembershipKind, user: Uuid, target: Uuid)
        -> Result<bool, FoodgramError>;

    async fn delete(&self, kind: MembershipKind, user: Uuid, target: Uuid)
        -> Result<bool, FoodgramError>;
}

pub async fn add_membership<S: MembershipStore>(
    store: &S,
    kind: MembershipKind,
    user: Uuid,
    target: Uuid,
) -> Result<Membership, FoodgramError> {
    if kind == MembershipKind::Subscription && user == target {
        return Err(FoodgramError::SelfReferenceNotAllowed);
    }

    if !store.target_exists(kind, target).await? {
        return Err(FoodgramError::reference(kind.target(), target));
    }

    if !store.insert(kind, user, target).await? {
        return Err(FoodgramError::AlreadyExists(kind));
    }

    log::debug!("> User {user} added {target} to {}", kind.label());

    Ok(Membership {
        kind,
        user_id: user,
        target_id: target,
    })
}

pub async fn remove_membership<S: MembershipStore>(
    store: &S,
    kind: MembershipKind,
    user: Uuid,
    target: Uuid,
) -> Result<(), FoodgramError> {
    if !store.target_exists(kind, target).await? {
        return Err(FoodgramError::reference(kind.target(), target));
    }

    if !store.delete(kind, user, target).await? {
        return Err(FoodgramError::NotFound(kind));
    }

    log::debug!("> User {user} removed {target} from {}", kind.label());

    Ok(())
}

/// Anonymous viewers are never members of anything.
pub async fn is_member<S: MembershipStore>(
    store: &S,
    kind: MembershipKind,
    user: Option<Uuid>,
    target: Uuid,
) -> Result<bool, FoodgramError> {
    match user {
        Some(user) => store.contains(kind, user, target).await,
        None => Ok(false),
    }
}
