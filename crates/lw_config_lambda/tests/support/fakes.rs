#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use lw_config_core::external_id::ExternalId;
use lw_config_core::naming::access_role_name;
use lw_config_lambda::adapters::access_grant::{AccessGrantError, AccessGrantManager};
use lw_config_lambda::adapters::http::{HttpRequest, HttpResponse, HttpSender};
use lw_config_lambda::adapters::lifecycle::LifecycleReporter;
use lw_config_lambda::adapters::platform::{
    AccessToken, CloudAccountRegistration, PlatformClient, PlatformError,
};
use lw_config_lambda::adapters::telemetry::{TelemetryEvent, TelemetrySink};

/// How the fake grant manager answers `create_grant`.
#[derive(Debug, Clone)]
pub enum GrantBehavior {
    Upsert,
    Absent,
    Raise(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantCall {
    Create {
        account_name: String,
        aws_account_id: String,
        external_id: ExternalId,
    },
    Delete {
        account_name: String,
        aws_account_id: String,
    },
}

/// In-memory role store keyed by derived role name.
pub struct FakeAccessGrants {
    behavior: GrantBehavior,
    delete_error: Option<String>,
    roles: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<GrantCall>>,
}

impl FakeAccessGrants {
    pub fn new(behavior: GrantBehavior) -> Self {
        Self {
            behavior,
            delete_error: None,
            roles: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_delete(message: &str) -> Self {
        Self {
            delete_error: Some(message.to_string()),
            ..Self::new(GrantBehavior::Upsert)
        }
    }

    pub fn calls(&self) -> Vec<GrantCall> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn roles(&self) -> BTreeSet<String> {
        self.roles.lock().expect("poisoned mutex").clone()
    }
}

impl AccessGrantManager for FakeAccessGrants {
    fn create_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
        external_id: &ExternalId,
    ) -> Result<Option<String>, AccessGrantError> {
        let call = GrantCall::Create {
            account_name: account_name.to_string(),
            aws_account_id: aws_account_id.to_string(),
            external_id: external_id.clone(),
        };
        self.calls.lock().expect("poisoned mutex").push(call);
        match &self.behavior {
            GrantBehavior::Upsert => {
                let role_name = access_role_name(aws_account_id);
                self.roles
                    .lock()
                    .expect("poisoned mutex")
                    .insert(role_name.clone());
                Ok(Some(format!("arn:aws:iam::{aws_account_id}:role/{role_name}")))
            }
            GrantBehavior::Absent => Ok(None),
            GrantBehavior::Raise(message) => Err(AccessGrantError::Iam(message.clone())),
        }
    }

    fn delete_grant(
        &self,
        account_name: &str,
        aws_account_id: &str,
    ) -> Result<(), AccessGrantError> {
        let call = GrantCall::Delete {
            account_name: account_name.to_string(),
            aws_account_id: aws_account_id.to_string(),
        };
        self.calls.lock().expect("poisoned mutex").push(call);
        if let Some(message) = &self.delete_error {
            return Err(AccessGrantError::Iam(message.clone()));
        }
        self.roles
            .lock()
            .expect("poisoned mutex")
            .remove(&access_role_name(aws_account_id));
        Ok(())
    }
}

/// Platform double that upserts registrations by name.
pub struct FakePlatform {
    token: Result<String, String>,
    accept_registration: bool,
    token_requests: Mutex<Vec<(String, String)>>,
    registry: Mutex<BTreeMap<String, CloudAccountRegistration>>,
    register_calls: Mutex<Vec<(CloudAccountRegistration, AccessToken)>>,
}

impl FakePlatform {
    pub fn accepting() -> Self {
        Self::new(Ok("token-1".to_string()), true)
    }

    pub fn rejecting_registration() -> Self {
        Self::new(Ok("token-1".to_string()), false)
    }

    pub fn failing_authentication(message: &str) -> Self {
        Self::new(Err(message.to_string()), true)
    }

    fn new(token: Result<String, String>, accept_registration: bool) -> Self {
        Self {
            token,
            accept_registration,
            token_requests: Mutex::new(Vec::new()),
            registry: Mutex::new(BTreeMap::new()),
            register_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn token_requests(&self) -> Vec<(String, String)> {
        self.token_requests.lock().expect("poisoned mutex").clone()
    }

    pub fn register_calls(&self) -> Vec<(CloudAccountRegistration, AccessToken)> {
        self.register_calls.lock().expect("poisoned mutex").clone()
    }

    pub fn registry(&self) -> BTreeMap<String, CloudAccountRegistration> {
        self.registry.lock().expect("poisoned mutex").clone()
    }
}

impl PlatformClient for FakePlatform {
    fn access_token(
        &self,
        lacework_url: &str,
        access_key_id: &str,
        _secret_key: &str,
    ) -> Result<AccessToken, PlatformError> {
        self.token_requests
            .lock()
            .expect("poisoned mutex")
            .push((lacework_url.to_string(), access_key_id.to_string()));
        self.token
            .clone()
            .map(AccessToken::new)
            .map_err(PlatformError::Authentication)
    }

    fn register_cloud_account(
        &self,
        registration: &CloudAccountRegistration,
        token: &AccessToken,
    ) -> Result<bool, PlatformError> {
        self.register_calls
            .lock()
            .expect("poisoned mutex")
            .push((registration.clone(), token.clone()));
        if self.accept_registration {
            self.registry
                .lock()
                .expect("poisoned mutex")
                .insert(registration.name.clone(), registration.clone());
        }
        Ok(self.accept_registration)
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("poisoned mutex").clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.events()
            .into_iter()
            .map(|event| event.label.as_str())
            .collect()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().expect("poisoned mutex").push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Success,
    Failure(String),
}

#[derive(Default)]
pub struct RecordingReporter {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingReporter {
    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().expect("poisoned mutex").clone()
    }
}

impl LifecycleReporter for RecordingReporter {
    fn report_success(&self) {
        self.signals
            .lock()
            .expect("poisoned mutex")
            .push(Signal::Success);
    }

    fn report_failure(&self, reason: &str) {
        self.signals
            .lock()
            .expect("poisoned mutex")
            .push(Signal::Failure(reason.to_string()));
    }
}

/// HTTP transport that never reaches its peer.
#[derive(Default)]
pub struct UnreachableSender {
    attempts: Mutex<usize>,
}

impl UnreachableSender {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().expect("poisoned mutex")
    }
}

impl HttpSender for &UnreachableSender {
    fn send(&self, _request: HttpRequest) -> Result<HttpResponse, String> {
        *self.attempts.lock().expect("poisoned mutex") += 1;
        Err("connection reset by peer".to_string())
    }
}

/// HTTP transport that accepts everything and keeps the requests.
#[derive(Default)]
pub struct RecordingSender {
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingSender {
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("poisoned mutex").clone()
    }
}

impl HttpSender for &RecordingSender {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        self.requests.lock().expect("poisoned mutex").push(request);
        Ok(HttpResponse {
            status: 200,
            body: String::new(),
        })
    }
}
