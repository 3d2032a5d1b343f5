//! Bulk creation of admin accounts keyed by identification.
//!
//! Passwords are random per run and reported once. Identifications are
//! checked against the resolver before anything is written, and the storage
//! layer's unique index is the final guard.

use crate::auth_client::AuthClient;
use crate::credentials::{generate_password, is_valid_email, Credential};
use crate::errors::{AppError, ResultExt};
use crate::identification::{Identification, Normalization};
use crate::models::{AuthUser, NewProfile, ProfilePatch, Role, UserUpdate};
use crate::resolver::IdentificationResolver;
use crate::rest_client::RestClient;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// How indexed admin accounts are named.
#[derive(Debug, Clone)]
pub struct AccountNaming {
    pub email_prefix: String,
    pub domain: String,
    /// Zero-padding applied to the index inside the email.
    pub pad: usize,
    pub name_prefix: String,
}

impl Default for AccountNaming {
    fn default() -> Self {
        Self {
            email_prefix: "admin.barber".to_string(),
            domain: "chronos.app".to_string(),
            pad: 3,
            name_prefix: "Admin Barber".to_string(),
        }
    }
}

/// One account to create or refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAccount {
    pub identification: Identification,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl PlannedAccount {
    /// An admin account outside the indexed naming scheme.
    pub fn custom(identification: Identification, email: &str, name: &str) -> Result<Self, AppError> {
        if !is_valid_email(email) {
            return Err(AppError::BadRequest(format!("invalid email: {}", email)));
        }
        Ok(Self {
            identification,
            email: email.to_lowercase(),
            name: name.to_string(),
            role: Role::Admin,
        })
    }
}

impl AccountNaming {
    /// Plans one admin account per index. Index `i` gets identification `i`
    /// (then `normalization`) and email `{prefix}.{i:0pad}@{domain}`.
    pub fn plan(
        &self,
        indices: RangeInclusive<u32>,
        normalization: Normalization,
    ) -> Result<Vec<PlannedAccount>, AppError> {
        if indices.is_empty() {
            return Err(AppError::BadRequest("empty index range".to_string()));
        }

        indices
            .map(|index| {
                let identification = normalization.apply(&Identification::parse(&index.to_string())?);
                let email = format!(
                    "{}.{:0pad$}@{}",
                    self.email_prefix,
                    index,
                    self.domain,
                    pad = self.pad
                );
                let name = format!("{} {:0pad$}", self.name_prefix, index, pad = self.pad);
                PlannedAccount::custom(identification, &email, &name)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionAction {
    /// New auth user and profile.
    Created,
    /// Auth user already existed; password was replaced.
    Reset,
}

/// Outcome for one account. Serialized into the operator report.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub identification: Identification,
    pub action: ProvisionAction,
    pub credential: Credential,
}

/// Totals for a bulk run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionSummary {
    pub provisioned: Vec<ProvisionReport>,
    pub failed: Vec<(Identification, String)>,
}

/// Creates or refreshes admin accounts through the auth and data APIs.
pub struct Provisioner {
    auth: AuthClient,
    rest: RestClient,
    resolver: IdentificationResolver<RestClient>,
}

impl Provisioner {
    /// `rest` must be a service-role client; profile writes bypass RLS.
    pub fn new(auth: AuthClient, rest: RestClient, normalization: Normalization) -> Self {
        let resolver = IdentificationResolver::new(rest.clone()).with_normalization(normalization);
        Self {
            auth,
            rest,
            resolver,
        }
    }

    /// Provisions every planned account, continuing past individual failures.
    pub async fn provision_all(&self, accounts: &[PlannedAccount]) -> Result<ProvisionSummary, AppError> {
        let users: HashMap<String, AuthUser> = self
            .auth
            .list_all_users()
            .await
            .context("listing auth users")?
            .into_iter()
            .filter_map(|u| u.email.clone().map(|e| (e.to_lowercase(), u)))
            .collect();

        tracing::info!(
            "Provisioning {} accounts ({} auth users exist)",
            accounts.len(),
            users.len()
        );

        let mut summary = ProvisionSummary::default();
        for (processed, account) in accounts.iter().enumerate() {
            match self.provision(account, users.get(&account.email)).await {
                Ok(report) => {
                    tracing::info!(
                        "{:?} {} ({})",
                        report.action,
                        account.email,
                        account.identification
                    );
                    summary.provisioned.push(report);
                }
                Err(e) => {
                    tracing::error!("Failed to provision {}: {}", account.email, e);
                    summary
                        .failed
                        .push((account.identification.clone(), e.to_string()));
                }
            }

            if (processed + 1) % 10 == 0 {
                tracing::info!(
                    "Processed {}/{} accounts (Provisioned: {}, Errors: {})",
                    processed + 1,
                    accounts.len(),
                    summary.provisioned.len(),
                    summary.failed.len()
                );
            }
        }

        Ok(summary)
    }

    /// Provisions one account. `existing` is the auth user already holding
    /// its email, if any.
    pub async fn provision(
        &self,
        account: &PlannedAccount,
        existing: Option<&AuthUser>,
    ) -> Result<ProvisionReport, AppError> {
        if let Some(holder) = self.resolver.resolve(&account.identification).await? {
            if !holder.eq_ignore_ascii_case(&account.email) {
                return Err(AppError::IntegrityViolation(format!(
                    "identification {} already belongs to {}",
                    account.identification, holder
                )));
            }
        }

        let password = generate_password();
        let (user_id, action) = match existing {
            Some(user) => {
                self.auth
                    .update_user(
                        user.id,
                        &UserUpdate {
                            password: Some(password.clone()),
                            email_confirm: Some(true),
                        },
                    )
                    .await?;
                (user.id, ProvisionAction::Reset)
            }
            None => {
                let user = self
                    .auth
                    .create_user(
                        &account.email,
                        &password,
                        json!({
                            "name": account.name,
                            "identification": account.identification,
                        }),
                    )
                    .await?;
                (user.id, ProvisionAction::Created)
            }
        };

        self.ensure_profile(user_id, account)
            .await
            .with_context(|| format!("profile for {}", account.email))?;

        Ok(ProvisionReport {
            identification: account.identification.clone(),
            action,
            credential: Credential {
                email: account.email.clone(),
                password,
            },
        })
    }

    async fn ensure_profile(&self, user_id: uuid::Uuid, account: &PlannedAccount) -> Result<(), AppError> {
        let Some(profile) = self.rest.find_profile(user_id).await? else {
            self.rest
                .insert_profile(&NewProfile {
                    id: user_id,
                    name: account.name.clone(),
                    role: account.role,
                    identification: account.identification.to_string(),
                    is_blocked: false,
                })
                .await?;
            return Ok(());
        };

        let identification = match profile.identification.as_deref() {
            Some(current) if current != account.identification.as_str() => {
                return Err(AppError::IntegrityViolation(format!(
                    "profile {} already carries identification {}",
                    profile.id, current
                )));
            }
            Some(_) => None,
            None => Some(account.identification.to_string()),
        };

        let patch = ProfilePatch {
            role: (profile.role != account.role).then_some(account.role),
            is_blocked: profile.is_blocked.then_some(false),
            identification,
        };
        if !patch.is_empty() {
            self.rest.patch_profile(profile.id, &patch).await?;
        }
        Ok(())
    }
}
