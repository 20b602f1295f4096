//! Launch contract types and the deterministic envelope serializer.
//!
//! Serialization rules: fixed top-level key order, lexicographic keys
//! inside maps (ordered maps make this structural), arrays in
//! construction order, two-space indentation. Identical inputs always
//! serialize to identical bytes.

use crate::capabilities::CapabilityUsage;
use crate::trace::Trace;
use crate::types::{CriticalError, TrustState};
use crate::warnings::WarningObject;
use serde::Serialize;
use std::collections::BTreeMap;

pub const CONTRACT_SCHEMA: &str = "nah.launch.contract.v1";

/// Platform-specific key for the library search path.
pub fn library_path_env_key() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else if cfg!(windows) {
        "PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Separator between entries of a path-list environment value.
pub fn path_list_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppFields {
    pub id: String,
    pub version: String,
    pub root: String,
    pub entrypoint: String,
}

/// Runtime fields; all empty when no runtime resolved.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NakFields {
    pub id: String,
    pub version: String,
    pub root: String,
    pub resource_root: String,
    pub record_ref: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionFields {
    pub binary: String,
    pub arguments: Vec<String>,
    pub cwd: String,
    pub library_path_env_key: String,
    pub library_paths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Enforcement {
    pub filesystem: Vec<String>,
    pub network: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetExport {
    pub id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Trust as carried in the contract: the install record's assessment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContractTrust {
    pub state: TrustState,
    pub source: String,
    pub evaluated_at: String,
    pub expires_at: String,
    pub inputs_hash: String,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct LaunchContract {
    pub app: AppFields,
    pub nak: NakFields,
    pub execution: ExecutionFields,
    pub environment: BTreeMap<String, String>,
    pub enforcement: Enforcement,
    pub trust: ContractTrust,
    pub exports: BTreeMap<String, AssetExport>,
    pub capability_usage: CapabilityUsage,
}

/// The composer's full output: contract, ordered warnings, optional trace.
#[derive(Debug, Clone, Default)]
pub struct ContractEnvelope {
    pub contract: LaunchContract,
    pub warnings: Vec<WarningObject>,
    pub trace: Option<Trace>,
}

/// Composer return value. `ok` is false exactly when `critical_error` is
/// set; the contract is then unspecified beyond whatever was reached.
#[derive(Debug, Default)]
pub struct CompositionResult {
    pub ok: bool,
    pub envelope: ContractEnvelope,
    pub critical_error: Option<CriticalError>,
    pub critical_error_context: String,
}

/// Wire view of the envelope. Struct field order fixes the top-level key
/// order; contract sub-objects are omitted entirely on critical failure.
#[derive(Serialize)]
struct EnvelopeView<'a> {
    schema: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    app: Option<&'a AppFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nak: Option<&'a NakFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<&'a ExecutionFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enforcement: Option<&'a Enforcement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust: Option<&'a ContractTrust>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<&'a BTreeMap<String, AssetExport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    capability_usage: Option<&'a CapabilityUsage>,
    warnings: &'a [WarningObject],
    critical_error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a Trace>,
}

/// Serialize an envelope to its deterministic textual form.
pub fn serialize_envelope(
    envelope: &ContractEnvelope,
    include_trace: bool,
    critical_error: Option<CriticalError>,
) -> String {
    let contract = &envelope.contract;
    let failed = critical_error.is_some();

    let view = EnvelopeView {
        schema: CONTRACT_SCHEMA,
        app: (!failed).then_some(&contract.app),
        nak: (!failed).then_some(&contract.nak),
        execution: (!failed).then_some(&contract.execution),
        environment: (!failed).then_some(&contract.environment),
        enforcement: (!failed).then_some(&contract.enforcement),
        trust: (!failed).then_some(&contract.trust),
        exports: (!failed).then_some(&contract.exports),
        capability_usage: (!failed).then_some(&contract.capability_usage),
        warnings: &envelope.warnings,
        critical_error: critical_error.map(|e| e.as_str()),
        trace: if include_trace { envelope.trace.as_ref() } else { None },
    };

    serde_json::to_string_pretty(&view).expect("envelope serialization is infallible")
}
