//! Identification → login email resolution.
//!
//! The lookup runs inside the database as `get_email_by_identification`, a
//! `SECURITY DEFINER` function granted to the `anon` and `authenticated`
//! roles so it works before a session exists. This module only decides what
//! the returned rows mean.

use crate::errors::AppError;
use crate::identification::{Identification, Normalization};
use std::future::Future;

/// Name of the Postgres function behind the resolver.
pub const RESOLVER_FUNCTION: &str = "get_email_by_identification";

/// A backend able to run the resolver function and return its raw rows.
pub trait EmailLookup {
    fn lookup(
        &self,
        id: &Identification,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

impl<L: EmailLookup + Sync> EmailLookup for &L {
    fn lookup(
        &self,
        id: &Identification,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send {
        (**self).lookup(id)
    }
}

/// Maps an identification to the single email allowed to log in with it.
#[derive(Debug, Clone)]
pub struct IdentificationResolver<L> {
    lookup: L,
    normalization: Normalization,
}

impl<L: EmailLookup> IdentificationResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            normalization: Normalization::Exact,
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolves `id` to its email.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No account carries this identification.
    /// * `Ok(Some(email))` - Exactly one account does.
    /// * `Err(AppError::IntegrityViolation)` - Several accounts do.
    /// * any other `Err` - The lookup itself failed; this is never reported
    ///   as "not found".
    pub async fn resolve(&self, id: &Identification) -> Result<Option<String>, AppError> {
        let key = self.normalization.apply(id);
        let mut emails = self.lookup.lookup(&key).await?;
        emails.sort();
        emails.dedup();

        match emails.len() {
            0 => {
                tracing::debug!("Identification {} has no account", key);
                Ok(None)
            }
            1 => Ok(emails.pop()),
            n => {
                tracing::error!("Identification {} maps to {} accounts", key, n);
                Err(AppError::IntegrityViolation(format!(
                    "identification {} maps to {} accounts",
                    key, n
                )))
            }
        }
    }
}
