//! Warning engine: a closed key set, ordered collection, and layered
//! action policy (per-invocation overrides > profile > built-in `warn`).

use crate::types::WarningAction;
use serde::Serialize;
use std::collections::BTreeMap;

/// Stable warning keys. The set is closed: overrides naming anything else
/// are rejected as `override_invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    InvalidManifest,
    InvalidConfiguration,
    ProfileInvalid,
    ProfileMissing,
    ProfileParseError,
    NakPinInvalid,
    NakNotFound,
    NakVersionUnsupported,
    NakLoaderRequired,
    NakLoaderMissing,
    BinaryNotFound,
    CapabilityMissing,
    CapabilityMalformed,
    CapabilityUnknown,
    MissingEnvVar,
    InvalidTrustState,
    OverrideDenied,
    OverrideInvalid,
    InvalidLibraryPath,
    TrustStateUnknown,
    TrustStateUnverified,
    TrustStateFailed,
    TrustStateStale,
}

impl Warning {
    pub fn key(&self) -> &'static str {
        match self {
            Warning::InvalidManifest => "invalid_manifest",
            Warning::InvalidConfiguration => "invalid_configuration",
            Warning::ProfileInvalid => "profile_invalid",
            Warning::ProfileMissing => "profile_missing",
            Warning::ProfileParseError => "profile_parse_error",
            Warning::NakPinInvalid => "nak_pin_invalid",
            Warning::NakNotFound => "nak_not_found",
            Warning::NakVersionUnsupported => "nak_version_unsupported",
            Warning::NakLoaderRequired => "nak_loader_required",
            Warning::NakLoaderMissing => "nak_loader_missing",
            Warning::BinaryNotFound => "binary_not_found",
            Warning::CapabilityMissing => "capability_missing",
            Warning::CapabilityMalformed => "capability_malformed",
            Warning::CapabilityUnknown => "capability_unknown",
            Warning::MissingEnvVar => "missing_env_var",
            Warning::InvalidTrustState => "invalid_trust_state",
            Warning::OverrideDenied => "override_denied",
            Warning::OverrideInvalid => "override_invalid",
            Warning::InvalidLibraryPath => "invalid_library_path",
            Warning::TrustStateUnknown => "trust_state_unknown",
            Warning::TrustStateUnverified => "trust_state_unverified",
            Warning::TrustStateFailed => "trust_state_failed",
            Warning::TrustStateStale => "trust_state_stale",
        }
    }

    pub fn parse(key: &str) -> Option<Warning> {
        let lower = key.to_ascii_lowercase();
        let warning = match lower.as_str() {
            "invalid_manifest" => Warning::InvalidManifest,
            "invalid_configuration" => Warning::InvalidConfiguration,
            "profile_invalid" => Warning::ProfileInvalid,
            "profile_missing" => Warning::ProfileMissing,
            "profile_parse_error" => Warning::ProfileParseError,
            "nak_pin_invalid" => Warning::NakPinInvalid,
            "nak_not_found" => Warning::NakNotFound,
            "nak_version_unsupported" => Warning::NakVersionUnsupported,
            "nak_loader_required" => Warning::NakLoaderRequired,
            "nak_loader_missing" => Warning::NakLoaderMissing,
            "binary_not_found" => Warning::BinaryNotFound,
            "capability_missing" => Warning::CapabilityMissing,
            "capability_malformed" => Warning::CapabilityMalformed,
            "capability_unknown" => Warning::CapabilityUnknown,
            "missing_env_var" => Warning::MissingEnvVar,
            "invalid_trust_state" => Warning::InvalidTrustState,
            "override_denied" => Warning::OverrideDenied,
            "override_invalid" => Warning::OverrideInvalid,
            "invalid_library_path" => Warning::InvalidLibraryPath,
            "trust_state_unknown" => Warning::TrustStateUnknown,
            "trust_state_unverified" => Warning::TrustStateUnverified,
            "trust_state_failed" => Warning::TrustStateFailed,
            "trust_state_stale" => Warning::TrustStateStale,
            _ => return None,
        };
        Some(warning)
    }
}

/// Contextual fields attached to an emission.
pub type Fields = BTreeMap<String, String>;

/// Build a field map from literal pairs.
pub fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A warning as it appears in the serialized envelope, with its action
/// already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningObject {
    pub action: String,
    pub fields: Fields,
    pub key: String,
}

/// Collects emissions in order and resolves actions when finalized, so an
/// override harvested late in composition still governs warnings emitted
/// earlier.
#[derive(Debug, Default)]
pub struct WarningCollector {
    policy: BTreeMap<String, WarningAction>,
    overrides: BTreeMap<String, WarningAction>,
    emitted: Vec<(Warning, Fields)>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: BTreeMap<String, WarningAction>) -> Self {
        WarningCollector {
            policy,
            ..Self::default()
        }
    }

    pub fn emit(&mut self, warning: Warning) {
        self.emitted.push((warning, Fields::new()));
    }

    pub fn emit_fields(&mut self, warning: Warning, pairs: &[(&str, &str)]) {
        self.emitted.push((warning, fields(pairs)));
    }

    pub fn emit_map(&mut self, warning: Warning, fields: Fields) {
        self.emitted.push((warning, fields));
    }

    pub fn extend(&mut self, emissions: Vec<(Warning, Fields)>) {
        self.emitted.extend(emissions);
    }

    /// Record a per-invocation action override. Keys are compared
    /// case-insensitively.
    pub fn apply_override(&mut self, key: &str, action: WarningAction) {
        self.overrides.insert(key.to_ascii_lowercase(), action);
    }

    /// Resolve the action for a key: overrides, then profile policy, then
    /// the built-in default of `warn`.
    pub fn resolve_action(&self, key: &str) -> WarningAction {
        let lower = key.to_ascii_lowercase();
        if let Some(action) = self.overrides.get(&lower) {
            return *action;
        }
        if let Some(action) = self.policy.get(&lower) {
            return *action;
        }
        WarningAction::Warn
    }

    /// Emission-ordered warning objects with resolved actions; `ignore`
    /// entries are dropped.
    pub fn finalize(&self) -> Vec<WarningObject> {
        self.emitted
            .iter()
            .filter_map(|(warning, fields)| {
                let action = self.resolve_action(warning.key());
                if action == WarningAction::Ignore {
                    return None;
                }
                Some(WarningObject {
                    action: action.as_str().to_string(),
                    fields: fields.clone(),
                    key: warning.key().to_string(),
                })
            })
            .collect()
    }

    /// Whether any emission resolves to `error`.
    pub fn has_errors(&self) -> bool {
        self.emitted
            .iter()
            .any(|(w, _)| self.resolve_action(w.key()) == WarningAction::Error)
    }

    /// Whether any emission survives as `warn` or `error`.
    pub fn has_effective_warnings(&self) -> bool {
        self.emitted
            .iter()
            .any(|(w, _)| self.resolve_action(w.key()) != WarningAction::Ignore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_action_is_warn() {
        let mut collector = WarningCollector::new();
        collector.emit(Warning::ProfileMissing);

        let warnings = collector.finalize();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "profile_missing");
        assert_eq!(warnings[0].action, "warn");
    }

    #[test]
    fn test_policy_escalates_to_error() {
        let mut policy = BTreeMap::new();
        policy.insert("profile_missing".to_string(), WarningAction::Error);

        let mut collector = WarningCollector::with_policy(policy);
        collector.emit(Warning::ProfileMissing);

        let warnings = collector.finalize();
        assert_eq!(warnings[0].action, "error");
        assert!(collector.has_errors());
    }

    #[test]
    fn test_ignore_drops_from_output() {
        let mut policy = BTreeMap::new();
        policy.insert("profile_missing".to_string(), WarningAction::Ignore);

        let mut collector = WarningCollector::with_policy(policy);
        collector.emit(Warning::ProfileMissing);

        assert!(collector.finalize().is_empty());
        assert!(!collector.has_effective_warnings());
    }

    #[test]
    fn test_override_beats_policy_even_for_earlier_emissions() {
        let mut policy = BTreeMap::new();
        policy.insert("nak_not_found".to_string(), WarningAction::Error);

        let mut collector = WarningCollector::with_policy(policy);
        collector.emit_fields(Warning::NakNotFound, &[("nak_id", "lua")]);
        // Override arrives after the emission, as it does in composition.
        collector.apply_override("NAK_NOT_FOUND", WarningAction::Ignore);

        assert!(collector.finalize().is_empty());
        assert!(!collector.has_errors());
    }

    #[test]
    fn test_emission_order_preserved() {
        let mut collector = WarningCollector::new();
        collector.emit(Warning::ProfileMissing);
        collector.emit(Warning::NakNotFound);
        collector.emit(Warning::MissingEnvVar);

        let keys: Vec<String> = collector.finalize().into_iter().map(|w| w.key).collect();
        assert_eq!(keys, ["profile_missing", "nak_not_found", "missing_env_var"]);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(Warning::parse("nak_not_found").is_some());
        assert!(Warning::parse("NAK_NOT_FOUND").is_some());
        assert!(Warning::parse("not_a_warning").is_none());
        assert!(Warning::parse("").is_none());
    }
}
