use lw_config_core::contract::{ContractError, InvocationContext, LifecycleEvent, RequestType};
use lw_config_core::settings::DispatchSettings;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::adapters::lifecycle::{LifecycleReporter, SettlingReporter};
use crate::handlers::provision::{ProvisionOutcome, ProvisionServices, Provisioner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// Payload carried no `RequestType`; nothing was signalled.
    Ignored,
    Completed {
        request_type: RequestType,
        outcome: ProvisionOutcome,
    },
    /// Handler raised before signalling; a failure was reported on its behalf.
    InitFailure {
        request_type: RequestType,
        reason: String,
    },
}

/// Routes a raw invocation payload to the matching lifecycle handler.
///
/// `reporter_for` builds the outcome channel for the parsed request. Only a
/// payload that claims to be a lifecycle request but cannot be parsed is
/// returned as an error, since there is nowhere to report it.
pub fn handle_lifecycle_payload<R, F>(
    payload: Value,
    context: &InvocationContext,
    services: ProvisionServices<'_>,
    settings: &DispatchSettings,
    reporter_for: F,
) -> Result<DispatchResult, ContractError>
where
    R: LifecycleReporter,
    F: FnOnce(&LifecycleEvent) -> R,
{
    let Some(event) = LifecycleEvent::from_payload(payload)? else {
        info!("payload is not a lifecycle request; ignoring");
        return Ok(DispatchResult::Ignored);
    };
    debug!(event = %event.redacted(), "lifecycle request received");

    let reporter = reporter_for(&event);
    let settling;
    let reporter: &dyn LifecycleReporter = match event.request_type {
        RequestType::Delete => {
            settling = SettlingReporter::new(&reporter, settings.delete_response_delay);
            &settling
        }
        RequestType::Create | RequestType::Update => &reporter,
    };

    let provisioner = Provisioner::new(services, reporter, settings.failure_reporting);
    let handled = match event.request_type {
        RequestType::Create => provisioner.create(&event, context),
        RequestType::Update => provisioner.update(&event, context),
        RequestType::Delete => provisioner.delete(&event, context),
    };

    match handled {
        Ok(outcome) => Ok(DispatchResult::Completed {
            request_type: event.request_type,
            outcome,
        }),
        Err(handler_error) => {
            let reason = handler_error.to_string();
            error!(
                request_type = event.request_type.as_str(),
                %reason,
                "lifecycle handler raised; reporting failure"
            );
            reporter.report_failure(&reason);
            Ok(DispatchResult::InitFailure {
                request_type: event.request_type,
                reason,
            })
        }
    }
}
