//! Shared provisioning domain primitives for the config-member custom resource.
//!
//! This crate owns deterministic behavior: the lifecycle request/response
//! contract, invocation identity parsing, naming, settings and external-ID
//! generation. It intentionally excludes AWS SDK, HTTP and Lambda runtime
//! concerns, which live in `lw_config_lambda`.

pub mod contract;
pub mod external_id;
pub mod naming;
pub mod settings;
