//! Shared helpers for engine adapters.

use ac_domain::config::{AuthConfig, AuthMode};
use ac_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeouts map to [`Error::Timeout`]; everything else to [`Error::Http`].
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the credential for an engine, or `None` for `mode = "none"`.
///
/// Precedence:
/// 1. `key` field (plaintext, warns)
/// 2. `service` + `account` in the OS keychain via `keyring`
/// 3. `env` field
/// 4. `{SERVICE}_{ACCOUNT}` env var, for headless hosts without a keychain
pub fn resolve_api_key(auth: &AuthConfig) -> Result<Option<String>> {
    if auth.mode == AuthMode::None {
        return Ok(None);
    }

    if let Some(key) = &auth.key {
        tracing::warn!("engine key loaded from plaintext config field 'key'; prefer 'env' or keychain");
        return Ok(Some(key.clone()));
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match resolve_from_keychain(service, account) {
            Ok(secret) => return Ok(Some(secret)),
            Err(e) => tracing::warn!(
                service = %service,
                account = %account,
                error = %e,
                "keychain lookup failed, falling through to env"
            ),
        }
    }

    if let Some(env_var) = &auth.env {
        return std::env::var(env_var).map(Some).map_err(|_| {
            Error::Auth(format!("environment variable '{env_var}' not set or not valid UTF-8"))
        });
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let fallback_var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&fallback_var) {
            tracing::info!(env_var = %fallback_var, "engine key resolved from keychain fallback env var");
            return Ok(Some(val));
        }
    }

    Err(Error::Auth(
        "no engine credential configured: set 'key', 'env', or keychain 'service'+'account'".into(),
    ))
}

/// Read a secret from the OS keychain.
pub fn resolve_from_keychain(service: &str, account: &str) -> Result<String> {
    let entry = keyring::Entry::new(service, account)
        .map_err(|e| Error::Auth(format!("keyring entry creation failed: {e}")))?;
    entry
        .get_password()
        .map_err(|e| Error::Auth(format!("keyring get_password failed: {e}")))
}

/// `("aicall", "openai-api-key")` → `"AICALL_OPENAI_API_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

/// Build the `(header, value)` pair for an authenticated request.
pub(crate) fn auth_header(auth: &AuthConfig, key: Option<&str>) -> Option<(String, String)> {
    let key = key?;
    let header = auth.header.clone().unwrap_or_else(|| "Authorization".into());
    let prefix = auth.prefix.clone().unwrap_or_else(|| "Bearer ".into());
    Some((header, format!("{prefix}{key}")))
}
