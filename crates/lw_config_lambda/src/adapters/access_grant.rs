//! Cross-account access role managed in the member account.

use std::error::Error as StdError;

use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::{Role, Tag};
use aws_sdk_iam::Client;
use lw_config_core::external_id::ExternalId;
use lw_config_core::naming::access_role_name;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};

use super::block_on_current;

/// AWS account the platform assumes member roles from.
pub const PLATFORM_AWS_ACCOUNT_ID: &str = "434813966438";
pub const SECURITY_AUDIT_POLICY_ARN: &str = "arn:aws:iam::aws:policy/SecurityAudit";
pub const ACCOUNT_TAG_KEY: &str = "LWAccount";
const ROLE_DESCRIPTION: &str = "Cross-account access for security platform config assessment";
const MISSING_ROLE: &str = "IAM response did not include the role";

#[derive(Debug, Error)]
pub enum AccessGrantError {
    #[error("IAM request failed: {0}")]
    Iam(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleApiError {
    #[error("role already exists")]
    AlreadyExists,

    #[error("no such role or policy attachment")]
    NoSuchEntity,

    #[error("{0}")]
    Failed(String),
}

/// IAM role operations behind the access grant.
pub trait RoleApi {
    /// Returns the new role's ARN. The role is tagged with `account_name`.
    fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        account_name: &str,
    ) -> Result<String, RoleApiError>;

    fn update_trust_policy(
        &self,
        role_name: &str,
        trust_policy: &str,
    ) -> Result<(), RoleApiError>;

    /// Sets the account tag, replacing any previous value.
    fn tag_role(&self, role_name: &str, account_name: &str) -> Result<(), RoleApiError>;

    fn role_arn(&self, role_name: &str) -> Result<String, RoleApiError>;

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), RoleApiError>;

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), RoleApiError>;

    fn delete_role(&self, role_name: &str) -> Result<(), RoleApiError>;
}

pub trait AccessGrantManager {
    /// Returns the role ARN, or `Ok(None)` when the grant could not be created.
    fn create_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
        external_id: &ExternalId,
    ) -> Result<Option<String>, AccessGrantError>;

    /// Succeeds when the grant is already absent.
    fn delete_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
    ) -> Result<(), AccessGrantError>;
}

/// Trust policy letting only the platform account, presenting `external_id`,
/// assume the role.
pub fn trust_policy_document(external_id: &ExternalId) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {
                    "AWS": format!("arn:aws:iam::{PLATFORM_AWS_ACCOUNT_ID}:root")
                },
                "Action": "sts:AssumeRole",
                "Condition": {
                    "StringEquals": {
                        "sts:ExternalId": external_id.as_str()
                    }
                }
            }
        ]
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub struct IamAccessGrantManager<R> {
    roles: R,
}

impl<R: RoleApi> IamAccessGrantManager<R> {
    pub fn new(roles: R) -> Self {
        Self { roles }
    }

    fn upsert_role(
        &self,
        role_name: &str,
        account_name: &str,
        trust_policy: &str,
    ) -> Result<String, RoleApiError> {
        let roles = &self.roles;
        let role_arn = match roles.create_role(role_name, trust_policy, account_name) {
            Err(RoleApiError::AlreadyExists) => {
                info!(role_name, "access role exists; refreshing it");
                roles.update_trust_policy(role_name, trust_policy)?;
                roles.tag_role(role_name, account_name)?;
                roles.role_arn(role_name)?
            }
            created => created?,
        };

        // AttachRolePolicy is idempotent for an already-attached policy.
        roles.attach_policy(role_name, SECURITY_AUDIT_POLICY_ARN)?;
        Ok(role_arn)
    }

    fn remove_role(&self, role_name: &str) -> Result<(), AccessGrantError> {
        let roles = &self.roles;
        match roles.detach_policy(role_name, SECURITY_AUDIT_POLICY_ARN) {
            Ok(()) => {}
            Err(RoleApiError::NoSuchEntity) => debug!(role_name, "audit policy already detached"),
            Err(error) => return Err(AccessGrantError::Iam(error.to_string())),
        }

        match roles.delete_role(role_name) {
            Ok(()) => {
                info!(role_name, "access role deleted");
                Ok(())
            }
            Err(RoleApiError::NoSuchEntity) => {
                info!(role_name, "access role already absent");
                Ok(())
            }
            Err(error) => Err(AccessGrantError::Iam(error.to_string())),
        }
    }
}

impl<R: RoleApi> AccessGrantManager for IamAccessGrantManager<R> {
    fn create_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
        external_id: &ExternalId,
    ) -> Result<Option<String>, AccessGrantError> {
        let role_name = access_role_name(aws_account_id);
        let trust_policy = trust_policy_document(external_id);

        match self.upsert_role(&role_name, account_name, &trust_policy) {
            Ok(role_arn) => {
                info!(role_name = %role_name, role_arn = %role_arn, "access role ready");
                Ok(Some(role_arn))
            }
            Err(error) => {
                error!(role_name = %role_name, %error, "access role not created");
                Ok(None)
            }
        }
    }

    fn delete_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
    ) -> Result<(), AccessGrantError> {
        let role_name = access_role_name(aws_account_id);
        info!(role_name = %role_name, account_name, "deleting access role");
        self.remove_role(&role_name)
    }
}

/// [`RoleApi`] over the IAM SDK client.
#[derive(Debug, Clone)]
pub struct SdkRoleApi {
    client: Client,
}

impl SdkRoleApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn account_tag(account_name: &str) -> Result<Tag, RoleApiError> {
    let tag = Tag::builder()
        .key(ACCOUNT_TAG_KEY)
        .value(account_name)
        .build();
    match tag {
        Ok(tag) => Ok(tag),
        Err(error) => Err(sdk_error("build role tag", &error, false)),
    }
}

fn arn_of(role: Option<&Role>) -> Result<String, RoleApiError> {
    match role {
        Some(role) => Ok(role.arn().to_string()),
        None => Err(RoleApiError::Failed(MISSING_ROLE.to_string())),
    }
}

fn sdk_error(action: &str, error: impl StdError, no_such_entity: bool) -> RoleApiError {
    if no_such_entity {
        RoleApiError::NoSuchEntity
    } else {
        let detail = DisplayErrorContext(error);
        RoleApiError::Failed(format!("failed to {action}: {detail}"))
    }
}

impl RoleApi for SdkRoleApi {
    fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        account_name: &str,
    ) -> Result<String, RoleApiError> {
        let request = self
            .client
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy)
            .description(ROLE_DESCRIPTION)
            .tags(account_tag(account_name)?);

        match block_on_current(request.send()) {
            Ok(output) => arn_of(output.role()),
            Err(error) => {
                let exists = error
                    .as_service_error()
                    .is_some_and(|service| service.is_entity_already_exists_exception());
                if exists {
                    Err(RoleApiError::AlreadyExists)
                } else {
                    Err(sdk_error("create role", &error, false))
                }
            }
        }
    }

    fn update_trust_policy(
        &self,
        role_name: &str,
        trust_policy: &str,
    ) -> Result<(), RoleApiError> {
        let request = self
            .client
            .update_assume_role_policy()
            .role_name(role_name)
            .policy_document(trust_policy);

        match block_on_current(request.send()) {
            Ok(_) => Ok(()),
            Err(error) => Err(sdk_error("update trust policy", &error, false)),
        }
    }

    fn tag_role(&self, role_name: &str, account_name: &str) -> Result<(), RoleApiError> {
        let request = self
            .client
            .tag_role()
            .role_name(role_name)
            .tags(account_tag(account_name)?);

        match block_on_current(request.send()) {
            Ok(_) => Ok(()),
            Err(error) => Err(sdk_error("tag role", &error, false)),
        }
    }

    fn role_arn(&self, role_name: &str) -> Result<String, RoleApiError> {
        let request = self.client.get_role().role_name(role_name);

        match block_on_current(request.send()) {
            Ok(output) => arn_of(output.role()),
            Err(error) => Err(sdk_error("read existing role", &error, false)),
        }
    }

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), RoleApiError> {
        let request = self
            .client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn);

        match block_on_current(request.send()) {
            Ok(_) => Ok(()),
            Err(error) => Err(sdk_error("attach audit policy", &error, false)),
        }
    }

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), RoleApiError> {
        let request = self
            .client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn);

        match block_on_current(request.send()) {
            Ok(_) => Ok(()),
            Err(error) => {
                let missing = error
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_entity_exception());
                Err(sdk_error("detach audit policy", &error, missing))
            }
        }
    }

    fn delete_role(&self, role_name: &str) -> Result<(), RoleApiError> {
        let request = self.client.delete_role().role_name(role_name);

        match block_on_current(request.send()) {
            Ok(_) => Ok(()),
            Err(error) => {
                let missing = error
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_entity_exception());
                Err(sdk_error("delete role", &error, missing))
            }
        }
    }
}
