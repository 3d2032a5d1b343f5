use crate::config::Config;
use crate::errors::AppError;
use crate::identification::Identification;
use crate::models::{Barber, NewProfile, Profile, ProfilePatch, ResolvedEmail};
use crate::resolver::{EmailLookup, RESOLVER_FUNCTION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Which class of caller a client acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    /// Anon key, no session. This is how the login screen calls the resolver.
    Anonymous,
    /// Anon key plus a user's access token.
    Authenticated,
    /// Service role key; bypasses row-level security.
    Service,
}

/// Client for the PostgREST data API (`/rest/v1`).
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bearer: String,
    role: CallerRole,
}

impl RestClient {
    /// Creates a new `RestClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL without the `/rest/v1` suffix.
    /// * `api_key` - Value of the `apikey` header.
    /// * `bearer` - Token sent as `Authorization: Bearer`.
    /// * `role` - The caller class `bearer` belongs to.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        base_url: String,
        api_key: String,
        bearer: String,
        role: CallerRole,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create REST client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bearer,
            role,
        })
    }

    pub fn anonymous(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.supabase_url.clone(),
            config.anon_key.clone(),
            config.anon_key.clone(),
            CallerRole::Anonymous,
            config.request_timeout,
        )
    }

    pub fn authenticated(config: &Config, access_token: &str) -> Result<Self, AppError> {
        Self::new(
            config.supabase_url.clone(),
            config.anon_key.clone(),
            access_token.to_string(),
            CallerRole::Authenticated,
            config.request_timeout,
        )
    }

    pub fn service(config: &Config) -> Result<Self, AppError> {
        let key = config.require_service_key()?;
        Self::new(
            config.supabase_url.clone(),
            key.to_string(),
            key.to_string(),
            CallerRole::Service,
            config.request_timeout,
        )
    }

    pub fn role(&self) -> CallerRole {
        self.role
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.bearer))
    }

    /// Calls the resolver function and returns every email row it produced.
    pub async fn resolve_emails(&self, id: &Identification) -> Result<Vec<String>, AppError> {
        tracing::debug!("Calling {} as {:?} for {}", RESOLVER_FUNCTION, self.role, id);

        let response = self
            .request(reqwest::Method::POST, &format!("rpc/{}", RESOLVER_FUNCTION))
            .json(&json!({ "target_id": id.as_str() }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Resolver request failed: {}", e)))?;

        let rows: Vec<ResolvedEmail> = read_json(response, "resolver call").await?;
        Ok(rows.into_iter().map(|row| row.email).collect())
    }

    /// Profile whose own identification column equals `id`.
    pub async fn find_profile_by_identification(
        &self,
        id: &Identification,
    ) -> Result<Option<Profile>, AppError> {
        let rows: Vec<Profile> = self
            .select("profiles", &[("identification", format!("eq.{}", id))])
            .await?;
        single_row(rows, || format!("profiles with identification {}", id))
    }

    /// Staff record whose identification equals `id`.
    pub async fn find_barber_by_identification(
        &self,
        id: &Identification,
    ) -> Result<Option<Barber>, AppError> {
        let rows: Vec<Barber> = self
            .select("barbers", &[("identification", format!("eq.{}", id))])
            .await?;
        single_row(rows, || format!("barbers with identification {}", id))
    }

    pub async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, AppError> {
        let rows: Vec<Profile> = self
            .select("profiles", &[("id", format!("eq.{}", profile_id))])
            .await?;
        single_row(rows, || format!("profiles with id {}", profile_id))
    }

    pub async fn find_barber_by_profile(&self, profile_id: Uuid) -> Result<Option<Barber>, AppError> {
        let rows: Vec<Barber> = self
            .select("barbers", &[("profile_id", format!("eq.{}", profile_id))])
            .await?;
        single_row(rows, || format!("barbers for profile {}", profile_id))
    }

    /// Inserts a profile. A duplicate identification fails with
    /// `IntegrityViolation` from the unique index.
    pub async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, AppError> {
        tracing::info!(
            "Inserting profile {} (identification {})",
            profile.id,
            profile.identification
        );

        let response = self
            .request(reqwest::Method::POST, "profiles")
            .header("Prefer", "return=representation")
            .json(profile)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Profile insert failed: {}", e)))?;

        let rows: Vec<Profile> = read_json(response, "profile insert").await?;
        rows.into_iter().next().ok_or_else(|| {
            AppError::ExternalApiError("Profile insert returned no row".to_string())
        })
    }

    /// Applies `patch` to one profile and returns the updated row.
    pub async fn patch_profile(
        &self,
        profile_id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<Profile, AppError> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("empty profile patch".to_string()));
        }
        tracing::info!("Patching profile {}: {:?}", profile_id, patch);

        let response = self
            .request(reqwest::Method::PATCH, "profiles")
            .query(&[("id", format!("eq.{}", profile_id))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Profile patch failed: {}", e)))?;

        let rows: Vec<Profile> = read_json(response, "profile patch").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("profile {}", profile_id)))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, AppError> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("{} query failed: {}", table, e)))?;

        read_json(response, table).await
    }
}

impl EmailLookup for RestClient {
    async fn lookup(&self, id: &Identification) -> Result<Vec<String>, AppError> {
        self.resolve_emails(id).await
    }
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// Maps a non-success PostgREST response to an error kind.
///
/// SQLSTATE `23505` (unique violation) or HTTP 409 → `IntegrityViolation`;
/// 401/403 or SQLSTATE `42501` → `Unauthorized`; anything else →
/// `ExternalApiError`.
pub(crate) async fn error_from_response(response: Response, what: &str) -> AppError {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let body: PostgrestError = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .clone()
        .map(|m| match body.details {
            Some(ref d) => format!("{} ({})", m, d),
            None => m,
        })
        .unwrap_or(text);

    classify_failure(status, body.code.as_deref(), what, &message)
}

/// Maps a failed status and Postgres error code onto the error taxonomy.
/// Unique violations win over everything else.
pub(crate) fn classify_failure(
    status: StatusCode,
    code: Option<&str>,
    what: &str,
    message: &str,
) -> AppError {
    match (status, code) {
        (_, Some("23505")) | (StatusCode::CONFLICT, _) => {
            AppError::IntegrityViolation(format!("{}: {}", what, message))
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) | (_, Some("42501")) => {
            tracing::warn!("{} rejected with {}", what, status);
            AppError::Unauthorized(format!("{} returned {}: {}", what, status, message))
        }
        _ => {
            tracing::error!("{} returned {}: {}", what, status, message);
            AppError::ExternalApiError(format!("{} returned {}: {}", what, status, message))
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(error_from_response(response, what).await);
    }
    response
        .json()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("Failed to parse {} response: {}", what, e)))
}

fn single_row<T>(mut rows: Vec<T>, describe: impl FnOnce() -> String) -> Result<Option<T>, AppError> {
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        n => Err(AppError::IntegrityViolation(format!("{} {}", n, describe()))),
    }
}
