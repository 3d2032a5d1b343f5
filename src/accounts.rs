//! Single-account administrative operations keyed by identification.

use crate::auth_client::AuthClient;
use crate::credentials::{choose_password, Credential};
use crate::errors::{AppError, ResultExt};
use crate::identification::{Identification, Normalization};
use crate::models::{AccountRecord, Profile, ProfilePatch, Role, Session, UserUpdate};
use crate::resolver::{EmailLookup, IdentificationResolver};
use crate::rest_client::RestClient;

/// Finds the profile carrying `id` (after `normalization`), either directly
/// or through its staff record.
///
/// A staff record with the same identification but a different owner is an
/// `IntegrityViolation`, never silently ignored.
pub async fn find_account(
    rest: &RestClient,
    id: &Identification,
    normalization: Normalization,
) -> Result<Option<AccountRecord>, AppError> {
    let id = &normalization.apply(id);

    if let Some(profile) = rest.find_profile_by_identification(id).await? {
        let barber = match rest.find_barber_by_identification(id).await? {
            Some(barber) if barber.profile_id != profile.id => {
                return Err(AppError::IntegrityViolation(format!(
                    "identification {} is held by profile {} and by barber of profile {}",
                    id, profile.id, barber.profile_id
                )));
            }
            Some(barber) => Some(barber),
            None => rest.find_barber_by_profile(profile.id).await?,
        };
        return Ok(Some(AccountRecord { profile, barber }));
    }

    let Some(barber) = rest.find_barber_by_identification(id).await? else {
        return Ok(None);
    };
    match rest.find_profile(barber.profile_id).await? {
        Some(profile) => Ok(Some(AccountRecord {
            profile,
            barber: Some(barber),
        })),
        None => {
            tracing::warn!(
                "Barber with identification {} points at missing profile {}",
                id,
                barber.profile_id
            );
            Ok(None)
        }
    }
}

async fn require_account(
    rest: &RestClient,
    id: &Identification,
    normalization: Normalization,
) -> Result<AccountRecord, AppError> {
    find_account(rest, id, normalization)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no profile with identification {}", id)))
}

async fn require_email<L: EmailLookup>(
    resolver: &IdentificationResolver<L>,
    id: &Identification,
) -> Result<String, AppError> {
    resolver
        .resolve(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("identification {} is not registered", id)))
}

/// Login flow: identification → email → password sign-in.
///
/// An unknown identification is `NotFound`; a wrong password is `Unauthorized`.
pub async fn login_with_identification<L: EmailLookup>(
    resolver: &IdentificationResolver<L>,
    auth: &AuthClient,
    id: &Identification,
    password: &str,
) -> Result<Session, AppError> {
    let email = require_email(resolver, id)
        .await
        .with_context(|| format!("login with identification {}", id))?;
    tracing::info!("Identification {} resolved to {}", id, email);
    auth.sign_in_with_password(&email, password).await
}

/// Sets a new password for the account behind `id` and confirms its email.
///
/// When `password` is `None` a random one is generated; either way the
/// result carries the password that is now active.
pub async fn reset_password<L: EmailLookup>(
    resolver: &IdentificationResolver<L>,
    auth: &AuthClient,
    id: &Identification,
    password: Option<String>,
) -> Result<Credential, AppError> {
    let password = choose_password(password)?;
    let email = require_email(resolver, id).await?;

    let user = auth
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no auth user for {}", email)))?;

    auth.update_user(
        user.id,
        &UserUpdate {
            password: Some(password.clone()),
            email_confirm: Some(true),
        },
    )
    .await
    .with_context(|| format!("resetting password for {}", email))?;

    tracing::info!("Password reset for identification {} ({})", id, email);
    Ok(Credential { email, password })
}

/// Gives the account behind `id` the `ADMIN` role. No-op if it already has it.
pub async fn promote_to_admin(
    rest: &RestClient,
    id: &Identification,
    normalization: Normalization,
) -> Result<Profile, AppError> {
    let account = require_account(rest, id, normalization).await?;
    if account.profile.role == Role::Admin {
        tracing::info!("Profile {} is already ADMIN", account.profile.id);
        return Ok(account.profile);
    }
    rest.patch_profile(
        account.profile.id,
        &ProfilePatch {
            role: Some(Role::Admin),
            ..Default::default()
        },
    )
    .await
}

/// Clears the blocked flag on the account behind `id`.
pub async fn unblock(
    rest: &RestClient,
    id: &Identification,
    normalization: Normalization,
) -> Result<Profile, AppError> {
    let account = require_account(rest, id, normalization).await?;
    if !account.profile.is_blocked {
        tracing::info!("Profile {} is not blocked", account.profile.id);
        return Ok(account.profile);
    }
    rest.patch_profile(
        account.profile.id,
        &ProfilePatch {
            is_blocked: Some(false),
            ..Default::default()
        },
    )
    .await
}
