use thiserror::Error;
use url::Url;

/// Longest accepted check interval (one week)
pub const MAX_INTERVAL_MINUTES: u32 = 7 * 24 * 60;

/// Rejection of an owner-supplied target field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} must include scheme (http:// or https://)")]
    MissingScheme { field: &'static str },

    #[error("invalid scheme '{scheme}' for {field}. Must be http or https")]
    InvalidScheme { field: &'static str, scheme: String },

    #[error("{field} must have a valid host")]
    MissingHost { field: &'static str },

    #[error("invalid {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("check interval must be between 1 and {MAX_INTERVAL_MINUTES} minutes, got {0}")]
    Interval(u32),

    #[error("invalid notification email address: {0}")]
    Email(String),
}

/// Validate an absolute HTTP(S) URL, returning it trimmed.
pub fn validate_http_url(field: &'static str, target: &str) -> Result<String, ValidationError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(ValidationError::InvalidScheme { field, scheme: scheme.to_string() });
            }

            if url.host_str().is_none_or(str::is_empty) {
                return Err(ValidationError::MissingHost { field });
            }

            Ok(target.to_string())
        }
        Err(e) => {
            if !target.contains("://") {
                Err(ValidationError::MissingScheme { field })
            } else {
                Err(ValidationError::Malformed { field, reason: e.to_string() })
            }
        }
    }
}

/// Validate a check interval in minutes
pub fn validate_interval(minutes: u32) -> Result<u32, ValidationError> {
    if minutes == 0 || minutes > MAX_INTERVAL_MINUTES {
        return Err(ValidationError::Interval(minutes));
    }
    Ok(minutes)
}

/// Normalise an optional webhook URL: blank means "no webhook".
pub fn normalize_webhook(webhook: Option<&str>) -> Result<Option<String>, ValidationError> {
    match webhook.map(str::trim) {
        None | Some("") => Ok(None),
        Some(url) => validate_http_url("webhook_url", url).map(Some),
    }
}

/// Normalise an optional notification address: blank means "no email channel".
pub fn normalize_email(email: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::Email(email.to_string()));
    };

    let domain_ok = !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::Email(email.to_string()));
    }

    Ok(Some(email.to_string()))
}
