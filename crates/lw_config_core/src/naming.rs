use thiserror::Error;
use url::Url;

/// Prefix of the platform-side cloud account entry for a member account.
pub const CONFIG_NAME_PREFIX: &str = "Lacework-Control-Tower-Config-Member-";
/// Prefix of the cross-account IAM role created in the member account.
pub const ACCESS_ROLE_NAME_PREFIX: &str = "Lacework-Control-Tower-Config-Role-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("invalid platform URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("platform URL '{url}' has no host")]
    MissingHost { url: String },
}

pub fn cloud_account_name(aws_account_id: &str) -> String {
    format!("{CONFIG_NAME_PREFIX}{aws_account_id}")
}

pub fn access_role_name(aws_account_id: &str) -> String {
    format!("{ACCESS_ROLE_NAME_PREFIX}{aws_account_id}")
}

/// Normalized API root: `https://` is assumed when the scheme is omitted.
pub fn api_base_url(platform_url: &str) -> Result<String, NamingError> {
    let parsed = parse_platform_url(platform_url)?;
    let host = parsed.host_str().ok_or_else(|| NamingError::MissingHost {
        url: platform_url.to_string(),
    })?;
    let base = match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    };
    Ok(base)
}

/// Platform account display name: the first DNS label of the URL host.
pub fn account_from_url(platform_url: &str) -> Result<String, NamingError> {
    let parsed = parse_platform_url(platform_url)?;
    parsed
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NamingError::MissingHost {
            url: platform_url.to_string(),
        })
}

fn parse_platform_url(platform_url: &str) -> Result<Url, NamingError> {
    let trimmed = platform_url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&candidate).map_err(|error| NamingError::InvalidUrl {
        url: platform_url.to_string(),
        reason: error.to_string(),
    })
}
