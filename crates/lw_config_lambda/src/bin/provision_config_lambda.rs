use std::time::Duration;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use lw_config_core::contract::{InvocationContext, LifecycleEvent};
use lw_config_core::settings::{log_filter, DispatchSettings, ProcessEnv, TelemetrySettings};
use lw_config_lambda::adapters::access_grant::{IamAccessGrantManager, SdkRoleApi};
use lw_config_lambda::adapters::http::ReqwestSender;
use lw_config_lambda::adapters::lifecycle::CfnResponder;
use lw_config_lambda::adapters::platform::LaceworkClient;
use lw_config_lambda::adapters::telemetry::HoneycombSink;
use lw_config_lambda::handlers::dispatch::{handle_lifecycle_payload, DispatchResult};
use lw_config_lambda::handlers::provision::{ProvisionOutcome, ProvisionServices};
use serde_json::{json, Value};
use tracing::error;
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct RuntimeDependencies {
    iam_client: aws_sdk_iam::Client,
    sender: ReqwestSender,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: RuntimeDependencies,
) -> Result<Value, Error> {
    let context = InvocationContext::new(
        event.context.invoked_function_arn.clone(),
        event.context.request_id.clone(),
    );
    let payload = event.payload;

    let task = tokio::task::spawn_blocking(move || dispatch(payload, &context, &deps));
    let result = match task.await {
        Ok(result) => result?,
        Err(join_error) => {
            let message = format!("lifecycle dispatch did not complete: {join_error}");
            return Err(Error::from(message));
        }
    };
    Ok(dispatch_summary(&result))
}

fn dispatch(
    payload: Value,
    context: &InvocationContext,
    deps: &RuntimeDependencies,
) -> Result<DispatchResult, Error> {
    let env = ProcessEnv;
    let dispatch_settings = DispatchSettings::load(&env).unwrap_or_else(|error| {
        error!(%error, "invalid dispatch settings; using defaults");
        DispatchSettings::default()
    });

    let access_grants = IamAccessGrantManager::new(SdkRoleApi::new(deps.iam_client.clone()));
    let platform = LaceworkClient::new(deps.sender.clone());
    let telemetry = HoneycombSink::new(deps.sender.clone(), TelemetrySettings::load(&env));
    let services = ProvisionServices {
        settings: &env,
        access_grants: &access_grants,
        platform: &platform,
        telemetry: &telemetry,
    };

    let responder = |event: &LifecycleEvent| CfnResponder::new(deps.sender.clone(), event);
    handle_lifecycle_payload(payload, context, services, &dispatch_settings, responder)
        .map_err(|error| Error::from(error.to_string()))
}

fn dispatch_summary(result: &DispatchResult) -> Value {
    match result {
        DispatchResult::Ignored => json!({ "status": "ignored" }),
        DispatchResult::Completed {
            request_type,
            outcome: ProvisionOutcome::Succeeded,
        } => json!({ "status": "succeeded", "request_type": request_type.as_str() }),
        DispatchResult::Completed {
            request_type,
            outcome: ProvisionOutcome::Failed { reason },
        }
        | DispatchResult::InitFailure {
            request_type,
            reason,
        } => json!({
            "status": "failed",
            "request_type": request_type.as_str(),
            "reason": reason,
        }),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(log_filter(&ProcessEnv)))
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let behavior = aws_config::BehaviorVersion::latest();
    let aws_config = aws_config::load_defaults(behavior).await;
    let deps = RuntimeDependencies {
        iam_client: aws_sdk_iam::Client::new(&aws_config),
        sender: ReqwestSender::new(HTTP_TIMEOUT)?,
    };

    let handler = service_fn(move |event| handle_request(event, deps.clone()));
    lambda_runtime::run(handler).await
}
