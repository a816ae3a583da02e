use lw_config_core::settings::TelemetrySettings;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::http::{HttpMethod, HttpRequest, HttpSender};

pub const HONEYCOMB_EVENTS_URL: &str = "https://api.honeycomb.io/1/events";
pub const INTEGRATION_NAME: &str = "lacework-aws-control-tower-config";
pub const FUNCTION_NAME: &str = "provision-config-member";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryLabel {
    AddStarted,
    ProvisionCompleted,
    DeleteStarted,
    DeleteCompleted,
}

impl TelemetryLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddStarted => "add started",
            Self::ProvisionCompleted => "provision completed",
            Self::DeleteStarted => "delete started",
            Self::DeleteCompleted => "delete completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub account: String,
    pub label: TelemetryLabel,
    pub event_data: Value,
}

impl TelemetryEvent {
    pub fn new(account: impl Into<String>, label: TelemetryLabel) -> Self {
        Self {
            account: account.into(),
            label,
            event_data: json!({}),
        }
    }

    pub fn with_event_data(mut self, event_data: Value) -> Self {
        self.event_data = event_data;
        self
    }
}

/// Fire-and-forget usage reporting. Implementations swallow their own failures.
pub trait TelemetrySink {
    fn emit(&self, event: TelemetryEvent);
}

#[derive(Debug, Clone)]
pub struct HoneycombSink<S> {
    sender: S,
    settings: TelemetrySettings,
}

impl<S: HttpSender> HoneycombSink<S> {
    pub fn new(sender: S, settings: TelemetrySettings) -> Self {
        Self { sender, settings }
    }

    pub fn event_payload(&self, event: &TelemetryEvent) -> Value {
        json!({
            "account": event.account,
            "sub-account": "",
            "tech-partner": "AWS",
            "integration-name": INTEGRATION_NAME,
            "version": self.settings.build_version,
            "service": "AWS Control Tower",
            "install-method": "cloudformation",
            "function": FUNCTION_NAME,
            "event": event.label.as_str(),
            "event-data": event.event_data,
        })
    }

    fn endpoint(&self) -> String {
        format!("{HONEYCOMB_EVENTS_URL}/{}", self.settings.dataset)
    }
}

impl<S: HttpSender> TelemetrySink for HoneycombSink<S> {
    fn emit(&self, event: TelemetryEvent) {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            debug!(event = event.label.as_str(), "telemetry disabled; skipping event");
            return;
        };

        let request = HttpRequest::new(HttpMethod::Post, self.endpoint())
            .header("X-Honeycomb-Team", api_key)
            .header("Content-Type", "application/json")
            .body(self.event_payload(&event).to_string());

        match self.sender.send(request) {
            Ok(response) if response.is_success() => {
                debug!(event = event.label.as_str(), "telemetry event sent");
            }
            Ok(response) => {
                warn!(
                    event = event.label.as_str(),
                    status = response.status,
                    "telemetry event rejected"
                );
            }
            Err(error) => {
                warn!(event = event.label.as_str(), %error, "telemetry event not sent");
            }
        }
    }
}
