//! End-to-end composition scenarios against the pure composer: canonical
//! happy path, missing runtime fallback, path escapes, environment
//! algebra, trust staleness, and per-invocation overrides.

use nah::compose::{compose_contract, CompositionInputs, OverridesFile};
use nah::contract::{library_path_env_key, serialize_envelope};
use nah::host_profile::{builtin_profile, HostProfile};
use nah::install_record::{AppInstallRecord, TrustInfo};
use nah::manifest::Manifest;
use nah::nak_record::{Loader, NakPaths, NakRecord};
use nah::selection::Inventory;
use nah::semver::parse_range;
use nah::types::{CriticalError, EnvOp, EnvValue, OverrideMode, TrustState};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// App root on disk with an entrypoint file, so the composer's single
/// filesystem check passes.
fn app_root(entrypoint: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("create app root");
    let path = dir.path().join(entrypoint);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create entrypoint dir");
    }
    fs::write(&path, "-- entrypoint\n").expect("write entrypoint");
    dir
}

fn lua_manifest() -> Manifest {
    Manifest {
        id: "com.example.app".to_string(),
        version: "1.0.0".to_string(),
        nak_id: "lua".to_string(),
        nak_version_req: parse_range(">=5.4"),
        entrypoint_path: "main.lua".to_string(),
        ..Default::default()
    }
}

fn verified_trust() -> TrustInfo {
    TrustInfo {
        state: TrustState::Verified,
        source: "registry".to_string(),
        evaluated_at: "2024-01-01T00:00:00Z".to_string(),
        present: true,
        ..Default::default()
    }
}

fn install_record(root: &Path, pin: Option<(&str, &str, &str)>) -> AppInstallRecord {
    let mut record = AppInstallRecord {
        schema: "nah.app.install.v1".to_string(),
        install_root: root.display().to_string(),
        trust: verified_trust(),
        ..Default::default()
    };
    record.install.instance_id = format!("inst-{}", uuid::Uuid::new_v4());
    record.app.id = "com.example.app".to_string();
    record.app.version = "1.0.0".to_string();
    if let Some((id, version, record_ref)) = pin {
        record.nak.id = id.to_string();
        record.nak.version = version.to_string();
        record.nak.record_ref = record_ref.to_string();
    }
    record
}

fn lua_inventory() -> Inventory {
    let mut record = NakRecord {
        id: "lua".to_string(),
        version: "5.4.6".to_string(),
        paths: NakPaths {
            root: "/nah/naks/lua/5.4.6".to_string(),
            resource_root: "/nah/naks/lua/5.4.6".to_string(),
            lib_dirs: vec!["/nah/naks/lua/5.4.6/lib".to_string()],
        },
        ..Default::default()
    };
    record.loaders.insert(
        "default".to_string(),
        Loader {
            exec_path: "/nah/naks/lua/5.4.6/bin/lua".to_string(),
            args_template: vec!["{NAH_APP_ENTRY}".to_string()],
        },
    );

    let mut inventory = Inventory::new();
    inventory.insert("lua@5.4.6.json".to_string(), record);
    inventory
}

struct Fixture {
    manifest: Manifest,
    record: AppInstallRecord,
    profile: HostProfile,
    inventory: Inventory,
    process_env: BTreeMap<String, String>,
    now: String,
    overrides_file: Option<OverridesFile>,
    trace: bool,
}

impl Fixture {
    fn pinned_lua(root: &Path) -> Self {
        Fixture {
            manifest: lua_manifest(),
            record: install_record(root, Some(("lua", "5.4.6", "lua@5.4.6.json"))),
            profile: builtin_profile(),
            inventory: lua_inventory(),
            process_env: BTreeMap::new(),
            now: "2024-06-01T00:00:00Z".to_string(),
            overrides_file: None,
            trace: false,
        }
    }

    fn compose(&self) -> nah::CompositionResult {
        compose_contract(&CompositionInputs {
            manifest: &self.manifest,
            install_record: &self.record,
            profile: &self.profile,
            inventory: &self.inventory,
            process_env: self.process_env.clone(),
            now: self.now.clone(),
            overrides_file: self.overrides_file.clone(),
            enable_trace: self.trace,
            seed_warnings: Vec::new(),
        })
    }
}

fn warning_keys(result: &nah::CompositionResult) -> Vec<String> {
    result.envelope.warnings.iter().map(|w| w.key.clone()).collect()
}

#[test]
fn canonical_happy_path() {
    let root = app_root("main.lua");
    let fixture = Fixture::pinned_lua(root.path());

    let result = fixture.compose();
    assert!(result.ok, "unexpected critical: {:?}", result.critical_error);
    assert!(warning_keys(&result).is_empty(), "{:?}", warning_keys(&result));

    let contract = &result.envelope.contract;
    let app_root_str = root.path().display().to_string();

    assert_eq!(contract.execution.binary, "/nah/naks/lua/5.4.6/bin/lua");
    assert_eq!(
        contract.execution.arguments,
        [format!("{}/main.lua", app_root_str)]
    );
    assert_eq!(contract.execution.cwd, app_root_str);
    assert_eq!(contract.execution.library_paths, ["/nah/naks/lua/5.4.6/lib"]);
    assert_eq!(contract.execution.library_path_env_key, library_path_env_key());

    assert_eq!(contract.environment["NAH_APP_ROOT"], app_root_str);
    assert_eq!(contract.environment["NAH_NAK_VERSION"], "5.4.6");
    assert_eq!(contract.nak.record_ref, "lua@5.4.6.json");
    assert_eq!(contract.trust.state, TrustState::Verified);
}

#[test]
fn missing_runtime_falls_back_to_entrypoint() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.inventory = Inventory::new();

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(
        result.envelope.contract.execution.binary,
        format!("{}/main.lua", root.path().display())
    );

    let keys = warning_keys(&result);
    assert!(keys.contains(&"nak_pin_invalid".to_string()), "{:?}", keys);
    let pin_warning = result
        .envelope
        .warnings
        .iter()
        .find(|w| w.key == "nak_pin_invalid")
        .unwrap();
    assert_eq!(pin_warning.action, "warn");
}

#[test]
fn unpinned_record_resolves_via_selection() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record = install_record(root.path(), None);

    let result = fixture.compose();
    assert!(result.ok);
    assert!(warning_keys(&result).is_empty(), "{:?}", warning_keys(&result));
    assert_eq!(result.envelope.contract.nak.version, "5.4.6");
    assert_eq!(result.envelope.contract.nak.record_ref, "lua@5.4.6.json");
}

#[test]
fn unpinned_missing_runtime_warns_not_found() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.inventory = Inventory::new();
    fixture.record = install_record(root.path(), None);

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(
        result.envelope.contract.execution.binary,
        format!("{}/main.lua", root.path().display())
    );
    let keys = warning_keys(&result);
    assert!(keys.contains(&"nak_not_found".to_string()), "{:?}", keys);
    assert!(result.envelope.contract.nak.id.is_empty());
}

#[test]
fn partial_pin_is_invalid() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.nak.version.clear();

    let result = fixture.compose();
    assert!(result.ok);
    assert!(warning_keys(&result).contains(&"nak_pin_invalid".to_string()));
    assert!(result.envelope.contract.nak.id.is_empty());
}

#[test]
fn entrypoint_escape_is_path_traversal() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.entrypoint_path = "../../etc/passwd".to_string();

    let result = fixture.compose();
    assert!(!result.ok);
    assert_eq!(result.critical_error, Some(CriticalError::PathTraversal));

    // Serialized failure envelope omits contract sections.
    let out = serialize_envelope(&result.envelope, false, result.critical_error);
    assert!(out.contains("\"critical_error\": \"PATH_TRAVERSAL\""));
    assert!(!out.contains("\"execution\""));
}

#[test]
fn missing_entrypoint_file_is_critical() {
    let root = tempfile::tempdir().unwrap();
    let fixture = Fixture::pinned_lua(root.path());

    let result = fixture.compose();
    assert_eq!(result.critical_error, Some(CriticalError::EntrypointNotFound));
}

#[test]
fn empty_install_record_is_critical() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.install.instance_id.clear();

    let result = fixture.compose();
    assert_eq!(
        result.critical_error,
        Some(CriticalError::InstallRecordInvalid)
    );
}

#[test]
fn environment_algebra_layers() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.trace = true;

    fixture
        .profile
        .environment
        .insert("APP_PATH".to_string(), EnvValue::set("/base"));
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        nak.environment.insert(
            "APP_PATH".to_string(),
            EnvValue::new(EnvOp::Prepend, "/nak/bin", ":"),
        );
    }
    fixture.manifest.env_vars.push("APP_PATH=/wrong".to_string());
    fixture.record.overrides.environment.insert(
        "APP_PATH".to_string(),
        EnvValue::new(EnvOp::Append, "/extra", ":"),
    );

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(
        result.envelope.contract.environment["APP_PATH"],
        "/nak/bin:/base:/extra"
    );

    let trace = result.envelope.trace.as_ref().expect("trace enabled");
    let entry = &trace["environment"]["APP_PATH"];
    let accepted: Vec<bool> = entry.history.iter().map(|c| c.accepted).collect();
    assert_eq!(accepted, [true, true, false, true]);
    assert_eq!(entry.precedence_rank, 4);
}

#[test]
fn unset_removes_earlier_layers() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture
        .profile
        .environment
        .insert("DEBUG_HINT".to_string(), EnvValue::set("1"));
    fixture.record.overrides.environment.insert(
        "DEBUG_HINT".to_string(),
        EnvValue::new(EnvOp::Unset, "", ":"),
    );

    let result = fixture.compose();
    assert!(result.ok);
    assert!(!result.envelope.contract.environment.contains_key("DEBUG_HINT"));
}

#[test]
fn manifest_defaults_fill_only_when_absent() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.env_vars.push("APP_MODE=production".to_string());

    let result = fixture.compose();
    assert_eq!(result.envelope.contract.environment["APP_MODE"], "production");
}

#[test]
fn placeholders_resolve_from_composed_environment() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.entrypoint_args =
        vec!["--root={NAH_APP_ROOT}".to_string(), "$NAH_NAK_VERSION".to_string()];

    let result = fixture.compose();
    assert!(result.ok);
    let args = &result.envelope.contract.execution.arguments;
    // Loader template first, then manifest args.
    assert_eq!(args.len(), 3);
    assert_eq!(args[1], format!("--root={}", root.path().display()));
    assert_eq!(args[2], "5.4.6");
}

#[test]
fn missing_placeholder_warns_and_substitutes_empty() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.entrypoint_args = vec!["{NO_SUCH_VAR}".to_string()];

    let result = fixture.compose();
    assert!(result.ok);
    let warning = result
        .envelope
        .warnings
        .iter()
        .find(|w| w.key == "missing_env_var")
        .expect("missing_env_var emitted");
    assert_eq!(warning.fields["name"], "NO_SUCH_VAR");
    assert_eq!(warning.fields["source_path"], "manifest.entrypoint_args[0]");
    assert_eq!(result.envelope.contract.execution.arguments[1], "");
}

#[test]
fn argument_composition_order() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.overrides.arguments.prepend = vec!["--pre".to_string()];
    fixture.record.overrides.arguments.append = vec!["--post".to_string()];
    fixture.manifest.entrypoint_args = vec!["--app".to_string()];

    let result = fixture.compose();
    let args = &result.envelope.contract.execution.arguments;
    assert_eq!(args[0], "--pre");
    assert!(args[1].ends_with("/main.lua")); // loader template
    assert_eq!(args[2], "--app");
    assert_eq!(args[3], "--post");
}

#[test]
fn stale_trust_warns_exactly_once() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.trust.expires_at = "2020-01-01T00:00:00Z".to_string();
    fixture.now = "2024-06-01T00:00:00Z".to_string();

    let result = fixture.compose();
    assert!(result.ok);
    let stale: Vec<_> = result
        .envelope
        .warnings
        .iter()
        .filter(|w| w.key == "trust_state_stale")
        .collect();
    assert_eq!(stale.len(), 1);
    assert_eq!(result.envelope.contract.trust.state, TrustState::Verified);
}

#[test]
fn utc_offset_normalization_in_staleness() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.trust.expires_at = "2024-06-01T00:00:01+00:00".to_string();
    fixture.now = "2024-06-01T00:00:00Z".to_string();

    // Expiry is after now once offsets normalize, so no staleness.
    let result = fixture.compose();
    assert!(!warning_keys(&result).contains(&"trust_state_stale".to_string()));
}

#[test]
fn bare_trust_state_composes_as_unknown() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());

    // Parse a real record whose trust section declares only a state: with
    // no source and no evaluated_at it is effectively absent.
    let content = format!(
        r#"
schema = "nah.app.install.v1"

[install]
instance_id = "inst-bare-trust"

[app]
id = "com.example.app"
version = "1.0.0"

[nak]
id = "lua"
version = "5.4.6"
record_ref = "lua@5.4.6.json"

[paths]
install_root = "{}"

[trust]
state = "verified"
"#,
        root.path().display()
    );
    let parse = nah::install_record::parse_install_record(&content, "record.toml");
    assert!(parse.ok, "{}", parse.error);
    fixture.record = parse.record;

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(result.envelope.contract.trust.state, TrustState::Unknown);
    let trust_keys: Vec<String> = warning_keys(&result)
        .into_iter()
        .filter(|k| k.starts_with("trust_state_"))
        .collect();
    assert_eq!(trust_keys, ["trust_state_unknown"]);
}

#[test]
fn absent_trust_section_is_unknown() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.trust = TrustInfo::default();

    let result = fixture.compose();
    assert_eq!(result.envelope.contract.trust.state, TrustState::Unknown);
    assert_eq!(
        warning_keys(&result)
            .iter()
            .filter(|k| k.starts_with("trust_state_"))
            .count(),
        1
    );
}

#[test]
fn env_override_applies_and_warning_override_silences() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.trust = TrustInfo::default(); // would emit trust_state_unknown
    fixture.process_env.insert(
        "NAH_OVERRIDE_ENVIRONMENT".to_string(),
        r#"{"INJECTED": "from-env"}"#.to_string(),
    );
    fixture.process_env.insert(
        "NAH_OVERRIDE_WARNINGS_TRUST_STATE_UNKNOWN".to_string(),
        "ignore".to_string(),
    );

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(result.envelope.contract.environment["INJECTED"], "from-env");
    assert!(!warning_keys(&result).contains(&"trust_state_unknown".to_string()));
}

#[test]
fn deny_mode_rejects_overrides() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.profile.overrides.mode = OverrideMode::Deny;
    fixture.process_env.insert(
        "NAH_OVERRIDE_ENVIRONMENT".to_string(),
        r#"{"INJECTED": "x"}"#.to_string(),
    );

    let result = fixture.compose();
    assert!(!result.envelope.contract.environment.contains_key("INJECTED"));
    assert!(warning_keys(&result).contains(&"override_denied".to_string()));
}

#[test]
fn malformed_env_override_is_invalid() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.process_env.insert(
        "NAH_OVERRIDE_ENVIRONMENT".to_string(),
        "not json".to_string(),
    );

    let result = fixture.compose();
    assert!(warning_keys(&result).contains(&"override_invalid".to_string()));
}

#[test]
fn overrides_file_layers_last() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.process_env.insert(
        "NAH_OVERRIDE_ENVIRONMENT".to_string(),
        r#"{"SHARED": "from-env"}"#.to_string(),
    );
    fixture.overrides_file = Some(OverridesFile {
        path: "/tmp/overrides.json".to_string(),
        content: r#"{"environment": {"SHARED": "from-file"}, "warnings": {"trust_state_stale": "ignore"}}"#
            .to_string(),
    });
    fixture.record.trust.expires_at = "2020-01-01T00:00:00Z".to_string();

    let result = fixture.compose();
    assert_eq!(result.envelope.contract.environment["SHARED"], "from-file");
    assert!(!warning_keys(&result).contains(&"trust_state_stale".to_string()));
}

#[test]
fn loader_pin_to_missing_loader_is_critical() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.record.nak.loader = "gui".to_string();

    let result = fixture.compose();
    assert_eq!(result.critical_error, Some(CriticalError::NakLoaderInvalid));
    assert!(warning_keys(&result).contains(&"nak_loader_missing".to_string()));
}

#[test]
fn multiple_loaders_without_pin_require_selection() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        let default = nak.loaders.remove("default").unwrap();
        nak.loaders.insert("cli".to_string(), default.clone());
        nak.loaders.insert("gui".to_string(), default);
    }

    let result = fixture.compose();
    assert!(result.ok);
    assert!(warning_keys(&result).contains(&"nak_loader_required".to_string()));
    assert!(result
        .envelope
        .contract
        .execution
        .binary
        .ends_with("/main.lua"));
}

#[test]
fn templated_loader_exec_path_resolves_under_nak_root() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        nak.loaders.get_mut("default").unwrap().exec_path = "{NAH_NAK_ROOT}/bin/lua".to_string();
    }

    let result = fixture.compose();
    assert!(result.ok, "critical: {:?}", result.critical_error);
    assert_eq!(
        result.envelope.contract.execution.binary,
        "/nah/naks/lua/5.4.6/bin/lua"
    );
}

#[test]
fn loader_exec_path_outside_nak_root_is_critical() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        nak.loaders.get_mut("default").unwrap().exec_path = "/usr/bin/lua".to_string();
    }

    let result = fixture.compose();
    assert_eq!(result.critical_error, Some(CriticalError::PathTraversal));
}

#[test]
fn nak_lib_dir_escape_is_critical() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        nak.paths.lib_dirs.push("/elsewhere/lib".to_string());
    }

    let result = fixture.compose();
    assert_eq!(result.critical_error, Some(CriticalError::PathTraversal));
}

#[test]
fn library_path_ordering() {
    let root = app_root("main.lua");
    fs::create_dir_all(root.path().join("lib")).unwrap();
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.profile.paths.library_prepend = vec!["/opt/site/lib".to_string()];
    fixture.profile.paths.library_append = vec!["/opt/fallback/lib".to_string()];
    fixture.record.overrides.paths.library_prepend = vec!["/opt/compat/lib".to_string()];
    fixture.manifest.lib_dirs = vec!["lib".to_string()];

    let result = fixture.compose();
    assert!(result.ok);
    let paths = &result.envelope.contract.execution.library_paths;
    assert_eq!(paths[0], "/opt/site/lib");
    assert_eq!(paths[1], "/opt/compat/lib");
    assert_eq!(paths[2], "/nah/naks/lua/5.4.6/lib");
    assert!(paths[3].ends_with("/lib"));
    assert_eq!(paths[4], "/opt/fallback/lib");
}

#[test]
fn relative_profile_library_path_warns() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.profile.paths.library_prepend = vec!["relative/lib".to_string()];

    let result = fixture.compose();
    assert!(warning_keys(&result).contains(&"invalid_library_path".to_string()));
    assert!(!result
        .envelope
        .contract
        .execution
        .library_paths
        .contains(&"relative/lib".to_string()));
}

#[test]
fn asset_exports_resolve_and_last_wins() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.asset_exports = vec![
        nah::tlv::AssetExportParts {
            id: "icons".to_string(),
            path: "assets/old".to_string(),
            kind: "dir".to_string(),
        },
        nah::tlv::AssetExportParts {
            id: "icons".to_string(),
            path: "assets/new".to_string(),
            kind: "dir".to_string(),
        },
    ];

    let result = fixture.compose();
    let exports = &result.envelope.contract.exports;
    assert_eq!(exports.len(), 1);
    assert!(exports["icons"].path.ends_with("/assets/new"));
}

#[test]
fn capabilities_flow_into_enforcement() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.permissions_filesystem = vec!["read:config".to_string()];
    fixture.manifest.permissions_network = vec!["connect:api.example.com".to_string()];
    fixture
        .profile
        .capabilities
        .insert("fs.read.config".to_string(), "sandbox.ro".to_string());

    let result = fixture.compose();
    let contract = &result.envelope.contract;
    assert_eq!(contract.enforcement.filesystem, ["sandbox.ro"]);
    assert!(contract.enforcement.network.is_empty());
    assert!(warning_keys(&result).contains(&"capability_missing".to_string()));
    assert_eq!(
        contract.capability_usage.critical_capabilities,
        ["net.connect.api.example.com"]
    );
}

#[test]
fn serialized_envelope_is_deterministic() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    fixture.manifest.env_vars.push("APP_MODE=production".to_string());
    fixture.manifest.permissions_filesystem = vec!["read:config".to_string()];
    fixture.trace = true;

    let first = fixture.compose();
    let second = fixture.compose();
    assert_eq!(
        serialize_envelope(&first.envelope, true, first.critical_error),
        serialize_envelope(&second.envelope, true, second.critical_error)
    );
}

#[test]
fn no_unexpanded_placeholders_in_serialized_contract() {
    let root = app_root("main.lua");
    let mut fixture = Fixture::pinned_lua(root.path());
    if let Some(nak) = fixture.inventory.get_mut("lua@5.4.6.json") {
        nak.environment.insert(
            "LUA_PATH".to_string(),
            EnvValue::set("{NAH_NAK_ROOT}/share/?.lua"),
        );
    }

    let result = fixture.compose();
    assert!(result.ok);
    assert_eq!(
        result.envelope.contract.environment["LUA_PATH"],
        "/nah/naks/lua/5.4.6/share/?.lua"
    );
}

#[test]
fn selector_scenarios_canonical_vs_mapped() {
    use nah::selection::select_nak;
    use nah::types::BindingMode;
    use nah::warnings::WarningCollector;

    let mut inventory = Inventory::new();
    for version in ["1.5.0", "2.2.0", "2.9.0", "3.1.0"] {
        inventory.insert(
            format!("app@{}.json", &version[..3]),
            NakRecord {
                id: "app".to_string(),
                version: version.to_string(),
                paths: NakPaths {
                    root: format!("/naks/app/{}", version),
                    resource_root: format!("/naks/app/{}", version),
                    lib_dirs: Vec::new(),
                },
                ..Default::default()
            },
        );
    }

    let manifest = Manifest {
        id: "com.example.app".to_string(),
        version: "1.0.0".to_string(),
        nak_id: "app".to_string(),
        nak_version_req: parse_range(">=1.0 <3.0"),
        entrypoint_path: "main".to_string(),
        ..Default::default()
    };

    // Canonical: highest satisfying wins.
    let profile = builtin_profile();
    let mut warnings = WarningCollector::new();
    let selection = select_nak(&manifest, &profile, &inventory, &mut warnings);
    assert_eq!(selection.version, "2.9.0");

    // Mapped: the selection key picks the mapped record.
    let mut mapped = builtin_profile();
    mapped.nak.binding_mode = BindingMode::Mapped;
    mapped.nak.map.insert("1.0".to_string(), "app@1.5.json".to_string());
    let mut warnings = WarningCollector::new();
    let selection = select_nak(&manifest, &mapped, &inventory, &mut warnings);
    assert_eq!(selection.version, "1.5.0");

    // Mapped to a record outside the satisfying set: unsupported.
    let mut broken = builtin_profile();
    broken.nak.binding_mode = BindingMode::Mapped;
    broken.nak.map.insert("1.0".to_string(), "app@3.1.json".to_string());
    let mut warnings = WarningCollector::new();
    let selection = select_nak(&manifest, &broken, &inventory, &mut warnings);
    assert!(!selection.resolved);
    let keys: Vec<String> = warnings.finalize().into_iter().map(|w| w.key).collect();
    assert_eq!(keys, ["nak_version_unsupported"]);
}
