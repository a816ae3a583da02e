//! Provisioning state machine for the config-member custom resource.
//!
//! Create and Update share one path: generate an external ID, create the
//! access grant, exchange credentials for a token and register the account.
//! Delete removes the grant. Each call starts idle and finishes with a
//! lifecycle signal; nothing is carried between invocations.

use lw_config_core::contract::{ContractError, InvocationContext, LifecycleEvent};
use lw_config_core::external_id::ExternalId;
use lw_config_core::naming::cloud_account_name;
use lw_config_core::settings::{
    load_platform_url, FailureReporting, PlatformSettings, SettingsError, SettingsSource,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::access_grant::{AccessGrantError, AccessGrantManager};
use crate::adapters::lifecycle::LifecycleReporter;
use crate::adapters::platform::{CloudAccountRegistration, PlatformClient, PlatformError};
use crate::adapters::telemetry::{TelemetryEvent, TelemetryLabel, TelemetrySink};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Context(#[from] ContractError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    AccessGrant(#[from] AccessGrantError),
}

/// Final lifecycle signal sent for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Collaborators shared by every lifecycle handler.
#[derive(Clone, Copy)]
pub struct ProvisionServices<'a> {
    pub settings: &'a dyn SettingsSource,
    pub access_grants: &'a dyn AccessGrantManager,
    pub platform: &'a dyn PlatformClient,
    pub telemetry: &'a dyn TelemetrySink,
}

enum ProvisionStep {
    Registered,
    GrantUnavailable,
    RegistrationRejected,
}

pub fn registration_failure_reason(aws_account_id: &str) -> String {
    format!("add_lw_cloud_account_for_cfg failed {aws_account_id}.")
}

pub fn grant_failure_reason(mode: FailureReporting, aws_account_id: &str) -> String {
    match mode {
        FailureReporting::Parity => registration_failure_reason(aws_account_id),
        FailureReporting::Corrected => format!("access role creation failed {aws_account_id}."),
    }
}

pub fn provision_failure_reason(error: &ProvisionError) -> String {
    format!("Provision failed {error}.")
}

pub struct Provisioner<'a> {
    services: ProvisionServices<'a>,
    reporter: &'a dyn LifecycleReporter,
    failure_reporting: FailureReporting,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        services: ProvisionServices<'a>,
        reporter: &'a dyn LifecycleReporter,
        failure_reporting: FailureReporting,
    ) -> Self {
        Self {
            services,
            reporter,
            failure_reporting,
        }
    }

    /// Handles Create and Update.
    ///
    /// Errors before the "add started" event (identity, configuration, URL)
    /// are returned to the caller; anything later becomes a failure signal.
    pub fn create(
        &self,
        event: &LifecycleEvent,
        context: &InvocationContext,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        info!(
            request_type = event.request_type.as_str(),
            request_id = %event.request_id,
            "config member create called"
        );

        let aws_account_id = context.aws_account_id()?;
        let settings = PlatformSettings::load(self.services.settings)?;
        let account_name = self
            .services
            .platform
            .account_name_from_url(&settings.lacework_url)?;

        self.services.telemetry.emit(
            TelemetryEvent::new(&account_name, TelemetryLabel::AddStarted)
                .with_event_data(settings.public_summary()),
        );
        info!(
            lacework_url = %settings.lacework_url,
            lacework_account = %account_name,
            aws_account_id,
            "provisioning config member"
        );

        match self.provision(aws_account_id, &account_name, &settings) {
            Ok(ProvisionStep::Registered) => {}
            Ok(ProvisionStep::GrantUnavailable) => {
                return Ok(self.fail(grant_failure_reason(self.failure_reporting, aws_account_id)));
            }
            Ok(ProvisionStep::RegistrationRejected) => {
                let reason = registration_failure_reason(aws_account_id);
                match self.failure_reporting {
                    FailureReporting::Corrected => return Ok(self.fail(reason)),
                    FailureReporting::Parity => {
                        warn!(%reason, "registration rejected; continuing to success signal");
                        self.reporter.report_failure(&reason);
                    }
                }
            }
            Err(error) => return Ok(self.fail(provision_failure_reason(&error))),
        }

        self.services
            .telemetry
            .emit(TelemetryEvent::new(&account_name, TelemetryLabel::ProvisionCompleted));
        self.reporter.report_success();
        info!(aws_account_id, "config member provisioned");
        Ok(ProvisionOutcome::Succeeded)
    }

    pub fn update(
        &self,
        event: &LifecycleEvent,
        context: &InvocationContext,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        self.create(event, context)
    }

    /// Removes the access grant. Errors are returned to the caller unreported.
    pub fn delete(
        &self,
        event: &LifecycleEvent,
        context: &InvocationContext,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        info!(request_id = %event.request_id, "config member delete called");

        let lacework_url = load_platform_url(self.services.settings)?;
        let account_name = self.services.platform.account_name_from_url(&lacework_url)?;
        let aws_account_id = context.aws_account_id()?;

        self.services
            .telemetry
            .emit(TelemetryEvent::new(&account_name, TelemetryLabel::DeleteStarted));
        self.services
            .access_grants
            .delete_grant(&account_name, aws_account_id)?;
        self.services
            .telemetry
            .emit(TelemetryEvent::new(&account_name, TelemetryLabel::DeleteCompleted));

        self.reporter.report_success();
        info!(aws_account_id, "config member removed");
        Ok(ProvisionOutcome::Succeeded)
    }

    fn provision(
        &self,
        aws_account_id: &str,
        account_name: &str,
        settings: &PlatformSettings,
    ) -> Result<ProvisionStep, ProvisionError> {
        let external_id = ExternalId::generate();
        let Some(role_arn) =
            self.services
                .access_grants
                .create_grant(account_name, aws_account_id, &external_id)?
        else {
            return Ok(ProvisionStep::GrantUnavailable);
        };

        let token = self.services.platform.access_token(
            &settings.lacework_url,
            &settings.access_key_id,
            &settings.secret_key,
        )?;

        let registration = CloudAccountRegistration {
            name: cloud_account_name(aws_account_id),
            lacework_url: settings.lacework_url.clone(),
            lacework_account: settings.lacework_account.clone(),
            external_id,
            role_arn,
            aws_account_id: aws_account_id.to_string(),
        };
        if self
            .services
            .platform
            .register_cloud_account(&registration, &token)?
        {
            Ok(ProvisionStep::Registered)
        } else {
            Ok(ProvisionStep::RegistrationRejected)
        }
    }

    fn fail(&self, reason: String) -> ProvisionOutcome {
        error!(%reason, "config member provisioning failed");
        self.reporter.report_failure(&reason);
        ProvisionOutcome::Failed { reason }
    }
}
