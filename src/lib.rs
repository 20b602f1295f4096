//! nah - native application host.
//!
//! Composes deterministic launch contracts for installed applications:
//! binary, argument vector, working directory, library paths, environment
//! map, enforcement hints, and trust assessment. Spawning the contract is
//! the caller's job.

pub mod capabilities;
pub mod cli;
pub mod compose;
pub mod contract;
pub mod expansion;
pub mod host;
pub mod host_profile;
pub mod install_record;
pub mod manifest;
pub mod nak_record;
pub mod paths;
pub mod selection;
pub mod semver;
pub mod tlv;
pub mod trace;
pub mod types;
pub mod values;
pub mod warnings;

pub use compose::{compose_contract, CompositionInputs};
pub use contract::{serialize_envelope, CompositionResult, ContractEnvelope, LaunchContract};
pub use host::NahHost;
