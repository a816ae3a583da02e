use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub const PHYSICAL_ID_SUFFIX_LEN: usize = 8;
const PHYSICAL_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("invalid lifecycle event: {0}")]
    InvalidEvent(String),

    #[error("cannot derive AWS account id from function ARN '{arn}'")]
    MalformedFunctionArn { arn: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// CloudFormation custom-resource request, as delivered to the function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_properties: Value,
}

impl LifecycleEvent {
    /// Returns `Ok(None)` for payloads that are not lifecycle requests at all.
    pub fn from_payload(payload: Value) -> Result<Option<Self>, ContractError> {
        if payload.get("RequestType").is_none() {
            return Ok(None);
        }
        serde_json::from_value(payload)
            .map(Some)
            .map_err(|error| ContractError::InvalidEvent(error.to_string()))
    }

    /// Event rendering safe for logs; the presigned response URL is a credential.
    pub fn redacted(&self) -> Value {
        let mut value = json!(self);
        if let Some(object) = value.as_object_mut() {
            object.insert("ResponseURL".to_string(), Value::from(REDACTED));
        }
        value
    }

    pub fn stack_name(&self) -> &str {
        self.stack_id.split('/').nth(1).unwrap_or(&self.stack_id)
    }

    /// Echoes the existing id on Update/Delete and mints one on Create.
    pub fn physical_resource_id_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match (&self.physical_resource_id, self.request_type) {
            (Some(existing), RequestType::Update | RequestType::Delete) => existing.clone(),
            _ => {
                let suffix: String = (0..PHYSICAL_ID_SUFFIX_LEN)
                    .map(|_| {
                        PHYSICAL_ID_ALPHABET[rng.gen_range(0..PHYSICAL_ID_ALPHABET.len())] as char
                    })
                    .collect();
                format!(
                    "{}_{}_{suffix}",
                    self.stack_name(),
                    self.logical_resource_id
                )
            }
        }
    }

    pub fn physical_resource_id(&self) -> String {
        self.physical_resource_id_with(&mut rand::thread_rng())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response document PUT to the request's `ResponseURL`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: Value,
}

impl LifecycleResponse {
    pub fn success(event: &LifecycleEvent, physical_resource_id: &str) -> Self {
        Self::new(event, physical_resource_id, ResponseStatus::Success, None)
    }

    pub fn failure(event: &LifecycleEvent, physical_resource_id: &str, reason: &str) -> Self {
        Self::new(
            event,
            physical_resource_id,
            ResponseStatus::Failed,
            Some(reason.to_string()),
        )
    }

    fn new(
        event: &LifecycleEvent,
        physical_resource_id: &str,
        status: ResponseStatus,
        reason: Option<String>,
    ) -> Self {
        Self {
            status,
            reason,
            physical_resource_id: physical_resource_id.to_string(),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            no_echo: false,
            data: json!({}),
        }
    }
}

/// Identity of the running function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub invoked_function_arn: String,
    pub aws_request_id: String,
}

impl InvocationContext {
    pub fn new(invoked_function_arn: impl Into<String>, aws_request_id: impl Into<String>) -> Self {
        Self {
            invoked_function_arn: invoked_function_arn.into(),
            aws_request_id: aws_request_id.into(),
        }
    }

    /// Account field of `arn:aws:lambda:<region>:<account>:function:<name>`.
    pub fn aws_account_id(&self) -> Result<&str, ContractError> {
        self.invoked_function_arn
            .split(':')
            .nth(4)
            .filter(|account| !account.is_empty())
            .ok_or_else(|| ContractError::MalformedFunctionArn {
                arn: self.invoked_function_arn.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn raw_event(request_type: &str) -> Value {
        json!({
            "RequestType": request_type,
            "ResponseURL": "https://cloudformation-custom-resource-response.s3.amazonaws.com/signed",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/lw-config/0f1e2d3c",
            "RequestId": "req-1",
            "LogicalResourceId": "LaceworkConfigMember",
            "ResourceType": "Custom::LaceworkConfig",
            "ResourceProperties": {"ServiceToken": "arn:aws:lambda:us-east-1:123456789012:function:provision"}
        })
    }

    #[test]
    fn payload_without_request_type_is_not_a_lifecycle_event() {
        let parsed = LifecycleEvent::from_payload(json!({"source": "aws.events"}))
            .expect("non-lifecycle payload should not error");
        assert!(parsed.is_none());
    }

    #[test]
    fn unknown_request_type_is_rejected() {
        let error = LifecycleEvent::from_payload(raw_event("Replace"))
            .expect_err("unknown request type should fail");
        assert!(matches!(error, ContractError::InvalidEvent(_)));
    }

    #[test]
    fn parses_create_event() {
        let event = LifecycleEvent::from_payload(raw_event("Create"))
            .expect("event should parse")
            .expect("event should be present");
        assert_eq!(event.request_type, RequestType::Create);
        assert_eq!(event.stack_name(), "lw-config");
        assert!(event.physical_resource_id.is_none());
    }

    #[test]
    fn redacted_event_hides_response_url() {
        let event = LifecycleEvent::from_payload(raw_event("Delete"))
            .expect("event should parse")
            .expect("event should be present");
        let redacted = event.redacted();
        assert_eq!(redacted["ResponseURL"], "<redacted>");
        assert_eq!(redacted["RequestId"], "req-1");
    }

    #[test]
    fn create_mints_physical_id_from_stack_and_logical_id() {
        let event = LifecycleEvent::from_payload(raw_event("Create"))
            .expect("event should parse")
            .expect("event should be present");
        let id = event.physical_resource_id_with(&mut StdRng::seed_from_u64(3));
        assert!(id.starts_with("lw-config_LaceworkConfigMember_"));
        assert_eq!(
            id.len(),
            "lw-config_LaceworkConfigMember_".len() + PHYSICAL_ID_SUFFIX_LEN
        );
    }

    #[test]
    fn update_and_delete_echo_existing_physical_id() {
        for request_type in ["Update", "Delete"] {
            let mut payload = raw_event(request_type);
            payload["PhysicalResourceId"] = json!("existing-id");
            let event = LifecycleEvent::from_payload(payload)
                .expect("event should parse")
                .expect("event should be present");
            assert_eq!(event.physical_resource_id(), "existing-id");
        }
    }

    #[test]
    fn failure_response_serializes_cloudformation_shape() {
        let event = LifecycleEvent::from_payload(raw_event("Create"))
            .expect("event should parse")
            .expect("event should be present");
        let response = LifecycleResponse::failure(&event, "pid", "Provision failed boom.");
        let body = json!(response);
        assert_eq!(body["Status"], "FAILED");
        assert_eq!(body["Reason"], "Provision failed boom.");
        assert_eq!(body["PhysicalResourceId"], "pid");
        assert_eq!(body["NoEcho"], false);
        assert_eq!(body["Data"], json!({}));
    }

    #[test]
    fn success_response_omits_reason() {
        let event = LifecycleEvent::from_payload(raw_event("Update"))
            .expect("event should parse")
            .expect("event should be present");
        let body = json!(LifecycleResponse::success(&event, "pid"));
        assert_eq!(body["Status"], "SUCCESS");
        assert!(body.get("Reason").is_none());
    }

    #[test]
    fn account_id_comes_from_function_arn() {
        let context = InvocationContext::new(
            "arn:aws:lambda:us-east-1:123456789012:function:provision",
            "aws-req",
        );
        assert_eq!(context.aws_account_id(), Ok("123456789012"));
    }

    #[test]
    fn malformed_function_arn_is_an_error() {
        let context = InvocationContext::new("provision", "aws-req");
        assert_eq!(
            context.aws_account_id(),
            Err(ContractError::MalformedFunctionArn {
                arn: "provision".to_string()
            })
        );
    }
}
