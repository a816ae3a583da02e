//! AWS-oriented adapters and handlers for the config-member custom resource.
//!
//! This crate owns runtime integration details (the lifecycle dispatch, the
//! provisioning state machine, IAM, platform and telemetry adapters) on top
//! of the deterministic primitives in `lw_config_core`.

pub mod adapters;
pub mod handlers;
