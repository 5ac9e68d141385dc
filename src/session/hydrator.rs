// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turn a confirmed identity into a Current User.
//!
//! The profile row is created on first sight. Lookup and insert failures
//! degrade to identity-derived fields, so hydration never fails.

use crate::backend::{DataApi, ServiceError};
use crate::models::{CurrentUser, Identity, NewProfile};

/// Resolve the Current User for `identity`, provisioning a profile when
/// none exists.
pub async fn hydrate<D: DataApi + ?Sized>(data: &D, identity: &Identity) -> CurrentUser {
    hydrate_with(data, identity, NewProfile::from_identity(identity)).await
}

/// Like [`hydrate`], with caller-supplied fields for a new profile.
pub async fn hydrate_with<D: DataApi + ?Sized>(
    data: &D,
    identity: &Identity,
    new_profile: NewProfile,
) -> CurrentUser {
    match data.get_profile(&identity.id).await {
        Ok(Some(profile)) => CurrentUser::from_profile(identity, &profile),
        Ok(None) => provision(data, identity, new_profile).await,
        Err(e) => {
            tracing::warn!(user_id = %identity.id, error = %e, "Profile lookup failed, using identity fields");
            CurrentUser::from_identity(identity)
        }
    }
}

async fn provision<D: DataApi + ?Sized>(
    data: &D,
    identity: &Identity,
    new_profile: NewProfile,
) -> CurrentUser {
    match insert_profile(data, &new_profile).await {
        Ok(()) => {
            tracing::info!(user_id = %identity.id, "Provisioned profile");
            CurrentUser::provisioned(identity, &new_profile)
        }
        Err(e) => {
            tracing::warn!(user_id = %identity.id, error = %e, "Profile creation failed, using identity fields");
            CurrentUser::from_identity(identity)
        }
    }
}

/// Insert-if-absent; a duplicate from a concurrent writer counts as success.
pub async fn insert_profile<D: DataApi + ?Sized>(
    data: &D,
    profile: &NewProfile,
) -> Result<(), ServiceError> {
    match data.insert_profile(profile).await {
        Ok(()) | Err(ServiceError::Conflict(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
