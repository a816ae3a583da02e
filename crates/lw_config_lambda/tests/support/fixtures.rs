#![allow(dead_code)]

use std::collections::BTreeMap;

use lw_config_core::contract::{InvocationContext, LifecycleEvent, RequestType};
use lw_config_core::settings::{
    FailureReporting, ACCESS_KEY_ID_KEY, LACEWORK_ACCOUNT_KEY, LACEWORK_URL_KEY, SECRET_KEY_KEY,
};
use lw_config_lambda::handlers::provision::{ProvisionServices, Provisioner};
use serde_json::{json, Value};

use super::fakes::{
    FakeAccessGrants, FakePlatform, GrantBehavior, RecordingReporter, RecordingTelemetry,
};

pub const AWS_ACCOUNT_ID: &str = "123456789012";
pub const LACEWORK_URL: &str = "https://example.lacework.net";

pub fn platform_env() -> BTreeMap<String, String> {
    [
        (LACEWORK_URL_KEY, LACEWORK_URL),
        (ACCESS_KEY_ID_KEY, "EXAMPLE_1234567890ABCDEF"),
        (SECRET_KEY_KEY, "_0123456789abcdef"),
        (LACEWORK_ACCOUNT_KEY, "example"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

pub fn invocation_context() -> InvocationContext {
    InvocationContext::new(
        format!("arn:aws:lambda:us-east-1:{AWS_ACCOUNT_ID}:function:provision-config-member"),
        "c6af9ac6-7b61-11e6-9a41-93e8deadbeef",
    )
}

const RESPONSE_URL: &str =
    "https://cloudformation-custom-resource-response-useast1.s3.amazonaws.com/signed";

pub fn raw_event(request_type: RequestType) -> Value {
    let stack_id =
        format!("arn:aws:cloudformation:us-east-1:{AWS_ACCOUNT_ID}:stack/lw-config-member/5f2a");
    let mut event = json!({
        "RequestType": request_type.as_str(),
        "ResponseURL": RESPONSE_URL,
        "StackId": stack_id,
        "RequestId": "unique-request-id",
        "LogicalResourceId": "LaceworkConfigMember",
        "ResourceType": "Custom::LaceworkConfigMember",
        "ResourceProperties": {},
    });
    if request_type != RequestType::Create {
        event["PhysicalResourceId"] = json!("lw-config-member_LaceworkConfigMember_abcd1234");
    }
    event
}

pub fn lifecycle_event(request_type: RequestType) -> LifecycleEvent {
    LifecycleEvent::from_payload(raw_event(request_type))
        .expect("fixture event should parse")
        .expect("fixture event should be a lifecycle request")
}

/// Fakes for every collaborator plus the recording outcome channel.
pub struct Harness {
    pub env: BTreeMap<String, String>,
    pub grants: FakeAccessGrants,
    pub platform: FakePlatform,
    pub telemetry: RecordingTelemetry,
    pub reporter: RecordingReporter,
}

impl Harness {
    pub fn new(grants: FakeAccessGrants, platform: FakePlatform) -> Self {
        Self {
            env: platform_env(),
            grants,
            platform,
            telemetry: RecordingTelemetry::default(),
            reporter: RecordingReporter::default(),
        }
    }

    pub fn happy() -> Self {
        Self::new(
            FakeAccessGrants::new(GrantBehavior::Upsert),
            FakePlatform::accepting(),
        )
    }

    pub fn services(&self) -> ProvisionServices<'_> {
        ProvisionServices {
            settings: &self.env,
            access_grants: &self.grants,
            platform: &self.platform,
            telemetry: &self.telemetry,
        }
    }

    pub fn provisioner(&self, mode: FailureReporting) -> Provisioner<'_> {
        Provisioner::new(self.services(), &self.reporter, mode)
    }
}
