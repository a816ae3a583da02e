//! Delivery of the custom-resource outcome back to the orchestrating stack.

use std::time::Duration;

use lw_config_core::contract::{LifecycleEvent, LifecycleResponse};
use tracing::{error, info, warn};

use super::http::{HttpMethod, HttpRequest, HttpSender};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Lifecycle outcome signal bound to a single request.
pub trait LifecycleReporter {
    fn report_success(&self);
    fn report_failure(&self, reason: &str);
}

impl<T: LifecycleReporter + ?Sized> LifecycleReporter for &T {
    fn report_success(&self) {
        (**self).report_success();
    }

    fn report_failure(&self, reason: &str) {
        (**self).report_failure(reason);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// PUTs the response document to the presigned `ResponseURL`.
pub struct CfnResponder<S> {
    sender: S,
    event: LifecycleEvent,
    physical_resource_id: String,
    retry: RetryPolicy,
}

impl<S: HttpSender> CfnResponder<S> {
    pub fn new(sender: S, event: &LifecycleEvent) -> Self {
        Self {
            sender,
            physical_resource_id: event.physical_resource_id(),
            event: event.clone(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn deliver(&self, response: LifecycleResponse) {
        let body = match serde_json::to_string(&response) {
            Ok(body) => body,
            Err(error) => {
                error!(%error, "failed to serialize lifecycle response");
                return;
            }
        };

        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            // The presigned URL is signed without a content type.
            let request = HttpRequest::new(HttpMethod::Put, &self.event.response_url)
                .header("Content-Type", "")
                .body(body.clone());
            match self.sender.send(request) {
                Ok(reply) if reply.is_success() => {
                    info!(
                        status = ?response.status,
                        request_id = %self.event.request_id,
                        "lifecycle response delivered"
                    );
                    return;
                }
                Ok(reply) => warn!(attempt, status = reply.status, "response rejected"),
                Err(error) => warn!(attempt, %error, "lifecycle response not delivered"),
            }
            if attempt < attempts {
                std::thread::sleep(self.retry.delay_after(attempt));
            }
        }
        error!(
            request_id = %self.event.request_id,
            attempts,
            "giving up on lifecycle response delivery"
        );
    }
}

impl<S: HttpSender> LifecycleReporter for CfnResponder<S> {
    fn report_success(&self) {
        self.deliver(LifecycleResponse::success(
            &self.event,
            &self.physical_resource_id,
        ));
    }

    fn report_failure(&self, reason: &str) {
        self.deliver(LifecycleResponse::failure(
            &self.event,
            &self.physical_resource_id,
            reason,
        ));
    }
}

/// Holds every outcome back for a settle delay before forwarding it.
pub struct SettlingReporter<'a> {
    inner: &'a dyn LifecycleReporter,
    delay: Duration,
}

impl<'a> SettlingReporter<'a> {
    pub fn new(inner: &'a dyn LifecycleReporter, delay: Duration) -> Self {
        Self { inner, delay }
    }

    fn settle(&self) {
        if !self.delay.is_zero() {
            info!(delay_secs = self.delay.as_secs(), "delaying response");
            std::thread::sleep(self.delay);
        }
    }
}

impl LifecycleReporter for SettlingReporter<'_> {
    fn report_success(&self) {
        self.settle();
        self.inner.report_success();
    }

    fn report_failure(&self, reason: &str) {
        self.settle();
        self.inner.report_failure(reason);
    }
}
