//! Host profile: per-host policy for runtime binding, environment layer 1,
//! library path defaults, warning actions, capability mappings, and the
//! override policy.

use crate::types::{BindingMode, EnvValue, OverrideMode, WarningAction};
use crate::values;
use crate::warnings::{fields, Fields, Warning};
use std::collections::BTreeMap;

pub const HOST_PROFILE_SCHEMA: &str = "nah.host.profile.v1";

#[derive(Debug, Clone, Default)]
pub struct ProfileNak {
    pub binding_mode: BindingMode,
    pub allow_versions: Vec<String>,
    pub deny_versions: Vec<String>,
    /// selection-key → record_ref, consulted in mapped binding mode.
    pub map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePaths {
    pub library_prepend: Vec<String>,
    pub library_append: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OverridePolicy {
    pub mode: OverrideMode,
    pub allow_keys: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HostProfile {
    pub schema: String,
    pub source_path: String,
    pub nak: ProfileNak,
    pub environment: BTreeMap<String, EnvValue>,
    pub paths: ProfilePaths,
    pub warnings: BTreeMap<String, WarningAction>,
    pub capabilities: BTreeMap<String, String>,
    pub overrides: OverridePolicy,
}

/// The profile used when no profile file resolves.
pub fn builtin_profile() -> HostProfile {
    let mut profile = HostProfile {
        schema: HOST_PROFILE_SCHEMA.to_string(),
        ..Default::default()
    };
    profile.warnings.insert("nak_not_found".into(), WarningAction::Warn);
    profile.warnings.insert("nak_version_unsupported".into(), WarningAction::Warn);
    profile.warnings.insert("profile_missing".into(), WarningAction::Warn);
    profile
}

#[derive(Debug, Default)]
pub struct ProfileParse {
    pub ok: bool,
    pub profile: HostProfile,
    pub emissions: Vec<(Warning, Fields)>,
    pub error: String,
}

impl ProfileParse {
    fn fail(error: impl Into<String>) -> Self {
        ProfileParse {
            error: error.into(),
            ..Default::default()
        }
    }
}

/// Parse a host profile document (JSON or nested-table form). A missing or
/// mismatched schema tag is a structural failure; unknown enum strings fall
/// back to defaults with a warning.
pub fn parse_host_profile(content: &str, source_path: &str) -> ProfileParse {
    let root = match values::parse_document(content) {
        Ok(root) => root,
        Err(error) => return ProfileParse::fail(error),
    };

    let mut out = ProfileParse::default();
    out.profile.source_path = source_path.to_string();

    match values::get_string(&root, "schema") {
        Some(schema) => out.profile.schema = schema.trim().to_string(),
        None => return ProfileParse::fail("schema missing"),
    }
    if out.profile.schema != HOST_PROFILE_SCHEMA {
        return ProfileParse::fail(format!(
            "schema mismatch: expected {}",
            HOST_PROFILE_SCHEMA
        ));
    }

    if let Some(nak) = values::get_object(&root, "nak") {
        if let Some(mode) = values::get_string(nak, "binding_mode") {
            match BindingMode::parse(&mode) {
                Some(parsed) => out.profile.nak.binding_mode = parsed,
                None => {
                    out.emissions.push((
                        Warning::InvalidConfiguration,
                        fields(&[("reason", "invalid_binding_mode"), ("value", &mode)]),
                    ));
                }
            }
        }
        out.profile.nak.allow_versions = values::get_string_array(nak, "allow_versions");
        out.profile.nak.deny_versions = values::get_string_array(nak, "deny_versions");
        out.profile.nak.map = values::get_string_map(nak, "map");
    }

    out.profile.environment = values::get_env_map(&root, "environment");

    if let Some(paths) = values::get_object(&root, "paths") {
        out.profile.paths.library_prepend = values::get_string_array(paths, "library_prepend");
        out.profile.paths.library_append = values::get_string_array(paths, "library_append");
    }

    if let Some(warnings) = values::get_object(&root, "warnings") {
        if let Some(table) = warnings.as_object() {
            for (key, value) in table {
                let Some(action) = value.as_str() else { continue };
                let key = key.to_ascii_lowercase();
                match WarningAction::parse(action) {
                    Some(parsed) => {
                        out.profile.warnings.insert(key, parsed);
                    }
                    None => {
                        out.emissions.push((
                            Warning::InvalidConfiguration,
                            fields(&[
                                ("reason", "invalid_warning_action"),
                                ("key", &key),
                                ("value", action),
                            ]),
                        ));
                    }
                }
            }
        }
    }

    out.profile.capabilities = values::get_string_map(&root, "capabilities");

    if let Some(overrides) = values::get_object(&root, "overrides") {
        if let Some(mode) = values::get_string(overrides, "mode") {
            match OverrideMode::parse(&mode) {
                Some(parsed) => out.profile.overrides.mode = parsed,
                None => {
                    out.emissions.push((
                        Warning::InvalidConfiguration,
                        fields(&[("reason", "invalid_override_mode"), ("value", &mode)]),
                    ));
                }
            }
        }
        out.profile.overrides.allow_keys = values::get_string_array(overrides, "allow_keys");
    }

    out.ok = true;
    out
}

/// Glob match for version patterns: trailing `*` is a prefix match,
/// anything else is exact.
pub fn version_matches_pattern(version: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => version.starts_with(prefix),
        None => version == pattern,
    }
}

/// Deny patterns take precedence; an empty allow list allows anything not
/// denied.
pub fn version_allowed_by_profile(version: &str, profile: &HostProfile) -> bool {
    if profile
        .nak
        .deny_versions
        .iter()
        .any(|p| version_matches_pattern(version, p))
    {
        return false;
    }
    if profile.nak.allow_versions.is_empty() {
        return true;
    }
    profile
        .nak
        .allow_versions
        .iter()
        .any(|p| version_matches_pattern(version, p))
}

/// Whether the profile's override policy accepts an override target
/// (`ENVIRONMENT` or `WARNINGS_<KEY>`). Non-standard targets are always
/// denied.
pub fn is_override_permitted(target: &str, profile: &HostProfile) -> bool {
    let standard = target == "ENVIRONMENT" || target.starts_with("WARNINGS_");
    if !standard {
        return false;
    }
    match profile.overrides.mode {
        OverrideMode::Deny => false,
        OverrideMode::Allow => true,
        OverrideMode::Allowlist => profile.overrides.allow_keys.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => target.starts_with(prefix),
                None => target == pattern,
            }
        }),
    }
}
