use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AuthUser, AuthUserPage, Session, UserUpdate};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Page size used when walking the admin user list.
pub const USERS_PER_PAGE: u32 = 200;

/// Client for the auth service (`/auth/v1`).
///
/// Sign-in uses the anon key. Admin endpoints need the service role key and
/// fail with `Unauthorized` when it is not configured.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_key: Option<String>,
}

impl AuthClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create auth client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_role_key.clone(),
        })
    }

    fn admin_request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, AppError> {
        let key = self.service_key.as_deref().ok_or_else(|| {
            AppError::Unauthorized(
                "SUPABASE_SERVICE_ROLE_KEY is required for admin operations".to_string(),
            )
        })?;
        Ok(self
            .client
            .request(method, format!("{}/auth/v1/admin/{}", self.base_url, path))
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key)))
    }

    /// Lists one page of auth users (pages start at 1).
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<AuthUser>, AppError> {
        let response = self
            .admin_request(reqwest::Method::GET, "users")?
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("List users failed: {}", e)))?;

        let page: AuthUserPage = read_json(response, "list users").await?;
        Ok(page.users)
    }

    /// Walks every page of the user list.
    pub async fn list_all_users(&self) -> Result<Vec<AuthUser>, AppError> {
        let mut users = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_users(page, USERS_PER_PAGE).await?;
            let done = batch.len() < USERS_PER_PAGE as usize;
            users.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        tracing::debug!("Fetched {} auth users", users.len());
        Ok(users)
    }

    /// Finds a user by email, ignoring ASCII case.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthUser>, AppError> {
        let users = self.list_all_users().await?;
        Ok(users.into_iter().find(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    /// Creates a user with a confirmed email.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> Result<AuthUser, AppError> {
        tracing::info!("Creating auth user {}", email);

        let response = self
            .admin_request(reqwest::Method::POST, "users")?
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
                "user_metadata": metadata,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Create user failed: {}", e)))?;

        read_json(response, "create user").await
    }

    /// Updates password and/or confirmation status for one user.
    pub async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> Result<AuthUser, AppError> {
        tracing::info!("Updating auth user {}", user_id);

        let response = self
            .admin_request(reqwest::Method::PUT, &format!("users/{}", user_id))?
            .json(update)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Update user failed: {}", e)))?;

        read_json(response, "update user").await
    }

    /// Signs in with email and password using the anon key.
    ///
    /// Wrong credentials come back as `Unauthorized`.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Sign-in request failed: {}", e)))?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body: AuthErrorBody = response.json().await.unwrap_or_default();
            tracing::warn!("Sign-in rejected for {}", email);
            return Err(AppError::Unauthorized(body.describe("invalid login credentials")));
        }

        let session: Session = read_json(response, "sign in").await?;
        tracing::info!("Signed in as {}", email);
        Ok(session)
    }
}

/// The auth service has used several error shapes over time.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
}

impl AuthErrorBody {
    fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    fn describe(&self, fallback: &str) -> String {
        self.msg
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.code().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", what, e))
        });
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let body: AuthErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body.describe(&text);

    match (status, body.code()) {
        (_, Some("email_exists")) | (_, Some("user_already_exists")) | (StatusCode::CONFLICT, _) => {
            Err(AppError::IntegrityViolation(format!("{}: {}", what, message)))
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            tracing::warn!("{} rejected with {}", what, status);
            Err(AppError::Unauthorized(format!("{} returned {}: {}", what, status, message)))
        }
        (StatusCode::NOT_FOUND, _) => Err(AppError::NotFound(format!("{}: {}", what, message))),
        _ => {
            tracing::error!("{} returned {}: {}", what, status, message);
            Err(AppError::ExternalApiError(format!(
                "{} returned {}: {}",
                what, status, message
            )))
        }
    }
}
