use crate::errors::AppError;
use crate::identification::Normalization;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Connection settings for the hosted backend.
///
/// Built once in `main` and passed by reference. Loading never writes to the
/// process environment.
#[derive(Clone)]
pub struct Config {
    /// Project base URL, e.g. `https://xyz.supabase.co` (no trailing slash).
    pub supabase_url: String,
    /// Public key used by anonymous and signed-in callers.
    pub anon_key: String,
    /// Privileged key for admin calls. Only required by operations that write.
    pub service_role_key: Option<String>,
    /// Direct Postgres URL, used by `verify-resolver` and the SQL lookup.
    pub database_url: Option<String>,
    pub normalization: Normalization,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads `.env` from the working directory when present, then lets
    /// process environment variables override it.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut vars = HashMap::new();
        match dotenvy::dotenv_iter() {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item?;
                    vars.insert(key, value);
                }
            }
            Err(e) if e.not_found() => {
                tracing::debug!("No .env file found, using process environment only");
            }
            Err(e) => return Err(e.into()),
        }
        vars.extend(std::env::vars());
        Self::from_vars(vars)
    }

    /// Like [`Config::from_env`] but with an explicit env file, which must exist.
    pub fn from_env_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?
        {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        vars.extend(std::env::vars());
        Self::from_vars(vars)
    }

    /// Builds a config from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let config = Self {
            supabase_url: get("SUPABASE_URL")
                .or_else(|| get("VITE_SUPABASE_URL"))
                .ok_or_else(|| {
                    anyhow::anyhow!("SUPABASE_URL or VITE_SUPABASE_URL environment variable required")
                })
                .and_then(|raw| {
                    let url = url::Url::parse(&raw)
                        .map_err(|e| anyhow::anyhow!("SUPABASE_URL is not a valid URL: {}", e))?;
                    if url.scheme() != "http" && url.scheme() != "https" {
                        anyhow::bail!("SUPABASE_URL must start with http:// or https://");
                    }
                    Ok(raw.trim_end_matches('/').to_string())
                })?,
            anon_key: get("SUPABASE_ANON_KEY")
                .or_else(|| get("VITE_SUPABASE_ANON_KEY"))
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "SUPABASE_ANON_KEY or VITE_SUPABASE_ANON_KEY environment variable required"
                    )
                })?,
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY"),
            database_url: get("DATABASE_URL")
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            normalization: match get("IDENTIFICATION_WIDTH") {
                None => Normalization::Exact,
                Some(raw) => {
                    let width: usize = raw.parse().map_err(|_| {
                        anyhow::anyhow!("IDENTIFICATION_WIDTH must be a positive number")
                    })?;
                    if width == 0 {
                        anyhow::bail!("IDENTIFICATION_WIDTH must be a positive number");
                    }
                    Normalization::ZeroPadded(width)
                }
            },
            request_timeout: Duration::from_secs(
                get("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a whole number"))?,
            ),
        };

        tracing::debug!("Supabase URL: {}", config.supabase_url);
        tracing::debug!("Anon key fingerprint: {}", fingerprint(&config.anon_key));
        if let Some(ref key) = config.service_role_key {
            tracing::debug!("Service role key fingerprint: {}", fingerprint(key));
        }
        tracing::debug!("Identification normalization: {:?}", config.normalization);

        Ok(config)
    }

    /// Returns the service role key or an error naming the missing variable.
    pub fn require_service_key(&self) -> Result<&str, AppError> {
        self.service_role_key.as_deref().ok_or_else(|| {
            AppError::Unauthorized(
                "SUPABASE_SERVICE_ROLE_KEY is required for admin operations".to_string(),
            )
        })
    }

    pub fn require_database_url(&self) -> Result<&str, AppError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("DATABASE_URL is not set".to_string()))
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("supabase_url", &self.supabase_url)
            .field("anon_key", &fingerprint(&self.anon_key))
            .field(
                "service_role_key",
                &self.service_role_key.as_deref().map(fingerprint),
            )
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("normalization", &self.normalization)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Short SHA-256 fingerprint of a secret, safe to log.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("sha256:{}", &hex::encode(digest)[..12])
}

/// Filter used when `RUST_LOG` is unset: the library and the running binary
/// (`binary_crate`, usually `env!("CARGO_CRATE_NAME")`) at info level.
pub fn default_log_filter(binary_crate: &str) -> String {
    const LIBRARY: &str = "chronos_admin";
    if binary_crate == LIBRARY {
        format!("{}=info", LIBRARY)
    } else {
        format!("{}=info,{}=info", LIBRARY, binary_crate)
    }
}
