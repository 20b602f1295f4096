//! App install record: where one installed instance of an application
//! lives, which runtime it is pinned to, and its trust assessment.

use crate::types::{EnvValue, TrustState};
use crate::values;
use crate::warnings::{fields, Fields, Warning};
use serde_json::Value;
use std::collections::BTreeMap;

pub const APP_INSTALL_SCHEMA: &str = "nah.app.install.v1";

#[derive(Debug, Clone, Default)]
pub struct InstallSection {
    pub instance_id: String,
}

/// Audit snapshot of the app at install time. Disagreement with the
/// manifest is reported, never trusted.
#[derive(Debug, Clone, Default)]
pub struct AppSnapshot {
    pub id: String,
    pub version: String,
    pub nak_id: String,
    pub nak_version_req: String,
}

/// The pin committing this install to one runtime record.
#[derive(Debug, Clone, Default)]
pub struct NakPin {
    pub id: String,
    pub version: String,
    pub record_ref: String,
    pub loader: String,
    pub selection_reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub package_hash: String,
    pub installed_at: String,
    pub installed_by: String,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct TrustInfo {
    pub state: TrustState,
    pub source: String,
    pub evaluated_at: String,
    pub expires_at: String,
    pub inputs_hash: String,
    pub details: BTreeMap<String, String>,
    /// Whether the section carries a usable assessment (a source or an
    /// evaluation timestamp). An effectively absent section is carried as
    /// `Unknown`, whatever state it declares.
    pub present: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ArgumentOverrides {
    pub prepend: Vec<String>,
    pub append: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub library_prepend: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InstallOverrides {
    pub environment: BTreeMap<String, EnvValue>,
    pub arguments: ArgumentOverrides,
    pub paths: PathOverrides,
}

#[derive(Debug, Clone, Default)]
pub struct AppInstallRecord {
    pub schema: String,
    pub source_path: String,
    pub install: InstallSection,
    pub app: AppSnapshot,
    pub nak: NakPin,
    pub install_root: String,
    pub provenance: Provenance,
    pub trust: TrustInfo,
    pub overrides: InstallOverrides,
}

#[derive(Debug, Default)]
pub struct InstallRecordParse {
    pub ok: bool,
    pub record: AppInstallRecord,
    pub emissions: Vec<(Warning, Fields)>,
    /// Structural failure in a required field; the composer maps this to
    /// INSTALL_RECORD_INVALID.
    pub critical: bool,
    pub error: String,
}

impl InstallRecordParse {
    fn fail(error: impl Into<String>) -> Self {
        InstallRecordParse {
            critical: true,
            error: error.into(),
            ..Default::default()
        }
    }
}

fn parse_trust(section: &Value, out: &mut InstallRecordParse) {
    let trust = &mut out.record.trust;

    if let Some(state) = values::get_string(section, "state") {
        match TrustState::parse(&state) {
            Some(parsed) => trust.state = parsed,
            None => {
                trust.state = TrustState::Unknown;
                out.emissions.push((
                    Warning::InvalidTrustState,
                    fields(&[("value", &state)]),
                ));
            }
        }
    }
    trust.source = values::get_string(section, "source").unwrap_or_default();
    trust.evaluated_at = values::get_string(section, "evaluated_at").unwrap_or_default();
    trust.expires_at = values::get_string(section, "expires_at").unwrap_or_default();
    trust.inputs_hash = values::get_string(section, "inputs_hash").unwrap_or_default();

    if let Some(Value::Object(details)) = section.get("details") {
        for (key, value) in details {
            if let Some(s) = values::scalar_to_string(value) {
                trust.details.insert(key.clone(), s);
            }
        }
    }

    // A trust section with neither source nor evaluated_at is effectively
    // absent, even if a state was declared.
    trust.present = !trust.source.is_empty() || !trust.evaluated_at.is_empty();
}

/// Parse an app install record (JSON or nested-table form). Missing
/// required fields are critical; optional sections degrade to warnings.
pub fn parse_install_record(content: &str, source_path: &str) -> InstallRecordParse {
    let root = match values::parse_document(content) {
        Ok(root) => root,
        Err(error) => return InstallRecordParse::fail(error),
    };

    let mut out = InstallRecordParse::default();
    out.record.source_path = source_path.to_string();

    match values::get_string(&root, "schema") {
        Some(schema) => out.record.schema = schema.trim().to_string(),
        None => return InstallRecordParse::fail("schema missing"),
    }
    if out.record.schema != APP_INSTALL_SCHEMA {
        return InstallRecordParse::fail(format!(
            "schema mismatch: expected {}",
            APP_INSTALL_SCHEMA
        ));
    }

    match values::get_object(&root, "install") {
        Some(install) => match values::get_string(install, "instance_id") {
            Some(id) if !id.trim().is_empty() => out.record.install.instance_id = id,
            Some(_) => return InstallRecordParse::fail("install.instance_id empty"),
            None => return InstallRecordParse::fail("install.instance_id missing"),
        },
        None => return InstallRecordParse::fail("install section missing"),
    }

    if let Some(app) = values::get_object(&root, "app") {
        out.record.app.id = values::get_string(app, "id").unwrap_or_default();
        out.record.app.version = values::get_string(app, "version").unwrap_or_default();
        out.record.app.nak_id = values::get_string(app, "nak_id").unwrap_or_default();
        out.record.app.nak_version_req =
            values::get_string(app, "nak_version_req").unwrap_or_default();
    }

    if let Some(nak) = values::get_object(&root, "nak") {
        out.record.nak.id = values::get_string(nak, "id").unwrap_or_default();
        out.record.nak.version = values::get_string(nak, "version").unwrap_or_default();
        out.record.nak.record_ref = values::get_string(nak, "record_ref").unwrap_or_default();
        out.record.nak.loader = values::get_string(nak, "loader").unwrap_or_default();
        out.record.nak.selection_reason =
            values::get_string(nak, "selection_reason").unwrap_or_default();
    }

    match values::get_object(&root, "paths") {
        Some(paths) => match values::get_path(paths, "install_root") {
            Some(root_path) if !root_path.trim().is_empty() => {
                out.record.install_root = root_path;
            }
            Some(_) => return InstallRecordParse::fail("paths.install_root empty"),
            None => return InstallRecordParse::fail("paths.install_root missing"),
        },
        None => return InstallRecordParse::fail("paths section missing"),
    }

    if let Some(provenance) = values::get_object(&root, "provenance") {
        out.record.provenance.package_hash =
            values::get_string(provenance, "package_hash").unwrap_or_default();
        out.record.provenance.installed_at =
            values::get_string(provenance, "installed_at").unwrap_or_default();
        out.record.provenance.installed_by =
            values::get_string(provenance, "installed_by").unwrap_or_default();
        out.record.provenance.source =
            values::get_string(provenance, "source").unwrap_or_default();
    }

    if let Some(trust) = values::get_object(&root, "trust") {
        parse_trust(trust, &mut out);
    }

    if let Some(overrides) = values::get_object(&root, "overrides") {
        out.record.overrides.environment = values::get_env_map(overrides, "environment");
        if let Some(arguments) = values::get_object(overrides, "arguments") {
            out.record.overrides.arguments.prepend =
                values::get_string_array(arguments, "prepend");
            out.record.overrides.arguments.append =
                values::get_string_array(arguments, "append");
        }
        if let Some(paths) = values::get_object(overrides, "paths") {
            out.record.overrides.paths.library_prepend =
                values::get_string_array(paths, "library_prepend");
        }
    }

    out.ok = true;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvOp;

    const MINIMAL: &str = r#"
schema = "nah.app.install.v1"

[install]
instance_id = "app-001"

[paths]
install_root = "/apps/app-1.0.0"
"#;

    #[test]
    fn test_minimal_record() {
        let parse = parse_install_record(MINIMAL, "record.toml");
        assert!(parse.ok, "{}", parse.error);
        assert_eq!(parse.record.install.instance_id, "app-001");
        assert_eq!(parse.record.install_root, "/apps/app-1.0.0");
        assert!(!parse.record.trust.present);
    }

    #[test]
    fn test_missing_instance_id_is_critical() {
        let content = "schema = \"nah.app.install.v1\"\n[install]\n[paths]\ninstall_root = \"/a\"\n";
        let parse = parse_install_record(content, "r");
        assert!(parse.critical);
        assert!(parse.error.contains("instance_id"));
    }

    #[test]
    fn test_missing_install_root_is_critical() {
        let content = "schema = \"nah.app.install.v1\"\n[install]\ninstance_id = \"a\"\n";
        let parse = parse_install_record(content, "r");
        assert!(parse.critical);
        assert!(parse.error.contains("paths"));
    }

    #[test]
    fn test_full_record_json() {
        let content = r#"{
  "schema": "nah.app.install.v1",
  "install": {"instance_id": "app-001"},
  "app": {"id": "com.example.app", "version": "1.0.0"},
  "nak": {"id": "lua", "version": "5.4.6", "record_ref": "lua@5.4.6.json", "loader": "default"},
  "paths": {"install_root": "/apps/app-1.0.0"},
  "provenance": {"package_hash": "sha256:abc", "installed_by": "operator"},
  "trust": {
    "state": "verified",
    "source": "registry",
    "evaluated_at": "2024-06-01T00:00:00Z",
    "expires_at": "2025-06-01T00:00:00Z",
    "details": {"signer": "release-key", "offline": true}
  },
  "overrides": {
    "environment": {"APP_EXTRA": {"op": "append", "value": "/extra"}},
    "arguments": {"prepend": ["--trace"], "append": ["--quiet"]},
    "paths": {"library_prepend": ["/opt/compat/lib"]}
  }
}"#;
        let parse = parse_install_record(content, "record.json");
        assert!(parse.ok, "{}", parse.error);
        let r = &parse.record;
        assert_eq!(r.nak.record_ref, "lua@5.4.6.json");
        assert_eq!(r.nak.loader, "default");
        assert_eq!(r.trust.state, TrustState::Verified);
        assert!(r.trust.present);
        assert_eq!(r.trust.details["offline"], "true");
        assert_eq!(r.overrides.environment["APP_EXTRA"].op, EnvOp::Append);
        assert_eq!(r.overrides.arguments.prepend, ["--trace"]);
        assert_eq!(r.overrides.paths.library_prepend, ["/opt/compat/lib"]);
    }

    #[test]
    fn test_unknown_trust_state_downgrades_with_warning() {
        let content = r#"
schema = "nah.app.install.v1"

[install]
instance_id = "app-001"

[paths]
install_root = "/apps/app-1.0.0"

[trust]
state = "vouched"
"#;
        let parse = parse_install_record(content, "r");
        assert!(parse.ok);
        assert_eq!(parse.record.trust.state, TrustState::Unknown);
        assert!(!parse.record.trust.present);
        assert_eq!(parse.emissions[0].0, Warning::InvalidTrustState);
    }

    #[test]
    fn test_bare_state_is_effectively_absent() {
        let content = r#"
schema = "nah.app.install.v1"

[install]
instance_id = "app-001"

[paths]
install_root = "/apps/app-1.0.0"

[trust]
state = "verified"
"#;
        let parse = parse_install_record(content, "r");
        // The declared state is kept, but with no source and no
        // evaluated_at the section counts as absent.
        assert_eq!(parse.record.trust.state, TrustState::Verified);
        assert!(!parse.record.trust.present);
    }

    #[test]
    fn test_wrong_schema_is_critical() {
        let parse = parse_install_record("schema = \"nah.nak.install.v1\"\n", "r");
        assert!(parse.critical);
    }

    #[test]
    fn test_parse_error_is_critical() {
        let parse = parse_install_record("schema = [unclosed", "r");
        assert!(parse.critical);
        assert!(parse.error.contains("parse error"));
    }
}
