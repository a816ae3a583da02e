//! Security platform API: token exchange and cloud account registration.

use std::fmt;

use lw_config_core::external_id::ExternalId;
use lw_config_core::naming::{account_from_url, api_base_url, NamingError};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::http::{HttpMethod, HttpRequest, HttpResponse, HttpSender};

pub const TOKEN_EXPIRY_SECS: u64 = 86_400;
pub const CLOUD_ACCOUNT_TYPE: &str = "AwsCfg";
const ACCESS_KEY_HEADER: &str = "X-LW-UAKS";
const SUB_ACCOUNT_HEADER: &str = "Account-Name";

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform authentication failed: {0}")]
    Authentication(String),

    #[error("platform request failed: {0}")]
    Transport(String),

    #[error("unexpected platform response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// Short-lived bearer credential; never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudAccountRegistration {
    pub name: String,
    pub lacework_url: String,
    pub lacework_account: String,
    pub external_id: ExternalId,
    pub role_arn: String,
    pub aws_account_id: String,
}

impl CloudAccountRegistration {
    pub fn request_body(&self) -> Value {
        json!({
            "name": self.name,
            "type": CLOUD_ACCOUNT_TYPE,
            "enabled": 1,
            "data": {
                "crossAccountCredentials": {
                    "externalId": self.external_id.as_str(),
                    "roleArn": self.role_arn,
                },
                "awsAccountId": self.aws_account_id,
            },
        })
    }
}

pub trait PlatformClient {
    fn access_token(
        &self,
        lacework_url: &str,
        access_key_id: &str,
        secret_key: &str,
    ) -> Result<AccessToken, PlatformError>;

    /// Upserts by registration name. `Ok(false)` means the platform refused it.
    fn register_cloud_account(
        &self,
        registration: &CloudAccountRegistration,
        token: &AccessToken,
    ) -> Result<bool, PlatformError>;

    fn account_name_from_url(&self, lacework_url: &str) -> Result<String, PlatformError> {
        Ok(account_from_url(lacework_url)?)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudAccountList {
    #[serde(default)]
    data: Vec<CloudAccountSummary>,
}

#[derive(Debug, Deserialize)]
struct CloudAccountSummary {
    #[serde(rename = "intgGuid")]
    intg_guid: String,
    name: String,
}

/// REST client for the platform's v2 API.
#[derive(Debug, Clone)]
pub struct LaceworkClient<S> {
    sender: S,
}

impl<S: HttpSender> LaceworkClient<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    /// Removes the cloud account entry named `name`, if present.
    pub fn deregister_cloud_account(
        &self,
        lacework_url: &str,
        lacework_account: &str,
        name: &str,
        token: &AccessToken,
    ) -> Result<bool, PlatformError> {
        let base = api_base_url(lacework_url)?;
        let existing = self.find_cloud_account(&base, lacework_account, name, token)?;
        let Some(intg_guid) = existing else {
            debug!(name, "cloud account not registered; nothing to remove");
            return Ok(true);
        };

        let request = authorized(
            HttpRequest::new(
                HttpMethod::Delete,
                format!("{base}/api/v2/CloudAccounts/{intg_guid}"),
            ),
            lacework_account,
            token,
        );
        let response = self.exchange(request)?;
        Ok(response.is_success())
    }

    fn find_cloud_account(
        &self,
        base: &str,
        lacework_account: &str,
        name: &str,
        token: &AccessToken,
    ) -> Result<Option<String>, PlatformError> {
        let request = authorized(
            HttpRequest::new(
                HttpMethod::Get,
                format!("{base}/api/v2/CloudAccounts/{CLOUD_ACCOUNT_TYPE}"),
            ),
            lacework_account,
            token,
        );
        let response = self.exchange(request)?;
        // Without a listing the entry may exist; posting would duplicate it.
        if !response.is_success() {
            return Err(PlatformError::InvalidResponse(format!(
                "listing cloud accounts returned status {}",
                response.status
            )));
        }

        let listing: CloudAccountList = serde_json::from_str(&response.body)
            .map_err(|error| PlatformError::InvalidResponse(error.to_string()))?;
        Ok(listing
            .data
            .into_iter()
            .find(|account| account.name == name)
            .map(|account| account.intg_guid))
    }

    fn exchange(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        self.sender.send(request).map_err(PlatformError::Transport)
    }
}

impl<S: HttpSender> PlatformClient for LaceworkClient<S> {
    fn access_token(
        &self,
        lacework_url: &str,
        access_key_id: &str,
        secret_key: &str,
    ) -> Result<AccessToken, PlatformError> {
        let base = api_base_url(lacework_url)?;
        let body = json!({
            "keyId": access_key_id,
            "expiryTime": TOKEN_EXPIRY_SECS,
        });
        let request = HttpRequest::new(HttpMethod::Post, format!("{base}/api/v2/access/tokens"))
            .header(ACCESS_KEY_HEADER, secret_key)
            .header("Content-Type", "application/json")
            .body(body.to_string());

        let response = self
            .sender
            .send(request)
            .map_err(PlatformError::Authentication)?;
        if !response.is_success() {
            return Err(PlatformError::Authentication(format!(
                "token endpoint returned status {}",
                response.status
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body).map_err(|error| {
            PlatformError::Authentication(format!("malformed token response: {error}"))
        })?;
        parsed
            .token
            .filter(|token| !token.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| PlatformError::Authentication("token response had no token".to_string()))
    }

    fn register_cloud_account(
        &self,
        registration: &CloudAccountRegistration,
        token: &AccessToken,
    ) -> Result<bool, PlatformError> {
        let base = api_base_url(&registration.lacework_url)?;
        let existing = self.find_cloud_account(
            &base,
            &registration.lacework_account,
            &registration.name,
            token,
        )?;

        let request = match &existing {
            Some(intg_guid) => HttpRequest::new(
                HttpMethod::Patch,
                format!("{base}/api/v2/CloudAccounts/{intg_guid}"),
            ),
            None => HttpRequest::new(HttpMethod::Post, format!("{base}/api/v2/CloudAccounts")),
        };
        let request = authorized(request, &registration.lacework_account, token)
            .body(registration.request_body().to_string());

        let response = self.exchange(request)?;
        if response.is_success() {
            info!(
                name = %registration.name,
                updated = existing.is_some(),
                "cloud account registered"
            );
            Ok(true)
        } else {
            warn!(
                name = %registration.name,
                status = response.status,
                body = %response.body,
                "cloud account registration rejected"
            );
            Ok(false)
        }
    }
}

fn authorized(request: HttpRequest, lacework_account: &str, token: &AccessToken) -> HttpRequest {
    request
        .header("Authorization", &format!("Bearer {}", token.as_str()))
        .header("Content-Type", "application/json")
        .header(SUB_ACCOUNT_HEADER, lacework_account)
}
