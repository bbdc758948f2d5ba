//! The script sandbox (spec §4.2): static validation of a generated script,
//! followed by isolated subprocess execution against the CAD engine.
//!
//! `validate` never executes anything. `execute` always validates first and
//! short-circuits with a `success=false` `ExecutionResult` on rejection —
//! the sandbox surfaces every failure mode in-band rather than returning
//! `Err`; `SandboxError` exists only for failures in the sandbox's own
//! plumbing (see `error`).

pub mod error;
pub mod executor;
pub mod validator;

pub use error::{Result, SandboxError};
pub use executor::{execute, prepare_working_dir, SandboxConfig, StateExtractor};
pub use validator::{validate, ValidationOutcome};
