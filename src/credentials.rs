use std::process::Command;
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::DeliveryError;

pub const TOKEN_ENV_VAR: &str = "DELIVERY_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>, skew: TimeDelta) -> bool {
        match self.expires_at {
            Some(expires_at) => now + skew < expires_at,
            None => true,
        }
    }
}

pub trait TokenSource: Send + Sync {
    fn fetch(&self) -> Result<AccessToken, DeliveryError>;
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn fetch(&self) -> Result<AccessToken, DeliveryError> {
        (**self).fetch()
    }
}

pub trait CredentialProvider: Send + Sync {
    /// Returns a bearer token, refreshing it when it is close to expiry.
    fn bearer(&self) -> Result<String, DeliveryError>;
    /// Drops the cached token so the next `bearer` call refetches.
    fn invalidate(&self);
}

/// Lazily fetched token shared by every call in a run.
pub struct CachedCredentials<S: TokenSource> {
    source: S,
    cached: Mutex<Option<AccessToken>>,
    skew: TimeDelta,
}

impl<S: TokenSource> CachedCredentials<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            skew: TimeDelta::seconds(60),
        }
    }
}

impl<S: TokenSource> CredentialProvider for CachedCredentials<S> {
    fn bearer(&self) -> Result<String, DeliveryError> {
        let mut guard = self
            .cached
            .lock()
            .map_err(|_| DeliveryError::Credentials("token cache poisoned".to_string()))?;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(Utc::now(), self.skew) {
                return Ok(token.secret.clone());
            }
            tracing::debug!("access token near expiry, refreshing");
        }
        let token = self.source.fetch()?;
        let secret = token.secret.clone();
        *guard = Some(token);
        Ok(secret)
    }

    fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.lock() {
            *guard = None;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvTokenSource;

impl TokenSource for EnvTokenSource {
    fn fetch(&self) -> Result<AccessToken, DeliveryError> {
        let secret = std::env::var(TOKEN_ENV_VAR)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DeliveryError::Credentials(format!("{TOKEN_ENV_VAR} is not set")))?;
        Ok(AccessToken {
            secret,
            expires_at: None,
        })
    }
}

/// Shells out to `gcloud auth print-access-token`.
#[derive(Debug, Clone)]
pub struct GcloudTokenSource {
    program: String,
    lifetime: TimeDelta,
}

impl GcloudTokenSource {
    pub fn new() -> Self {
        Self {
            program: "gcloud".to_string(),
            lifetime: TimeDelta::minutes(55),
        }
    }
}

impl Default for GcloudTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for GcloudTokenSource {
    fn fetch(&self) -> Result<AccessToken, DeliveryError> {
        let issued_at = Utc::now();
        let output = Command::new(&self.program)
            .args(["auth", "print-access-token"])
            .output()
            .map_err(|err| DeliveryError::Credentials(format!("{}: {err}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeliveryError::Credentials(stderr.trim().to_string()));
        }
        let secret = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if secret.is_empty() {
            return Err(DeliveryError::Credentials(
                "gcloud returned an empty token".to_string(),
            ));
        }
        Ok(AccessToken {
            secret,
            expires_at: Some(issued_at + self.lifetime),
        })
    }
}
