//! The contract composer.
//!
//! A pure function over immutable inputs: manifest + install record +
//! host profile + runtime inventory (+ per-invocation overrides) in,
//! launch-contract envelope out. The only filesystem access is the
//! entrypoint existence test; the process environment arrives as a
//! snapshot captured by the caller.

use crate::capabilities::derive_enforcement;
use crate::contract::{
    library_path_env_key, AssetExport, CompositionResult, ContractEnvelope, LaunchContract,
};
use crate::expansion::{expand_environment, expand_list, expand_placeholders};
use crate::host_profile::{is_override_permitted, HostProfile};
use crate::install_record::AppInstallRecord;
use crate::manifest::Manifest;
use crate::nak_record::{Loader, NakRecord};
use crate::paths::{is_absolute_path, is_path_under_root, normalize_under_root};
use crate::selection::{load_pinned_nak, select_nak, Inventory};
use crate::trace::TraceRecorder;
use crate::types::{CriticalError, EnvOp, EnvValue, TrustState, WarningAction};
use crate::warnings::{Fields, Warning, WarningCollector};
use std::collections::BTreeMap;

/// A pre-read overrides file. The caller reads it so the composer itself
/// touches the filesystem exactly once (the entrypoint check).
#[derive(Debug, Clone)]
pub struct OverridesFile {
    pub path: String,
    pub content: String,
}

/// Everything one composition needs, immutable for its duration.
pub struct CompositionInputs<'a> {
    pub manifest: &'a Manifest,
    pub install_record: &'a AppInstallRecord,
    pub profile: &'a HostProfile,
    pub inventory: &'a Inventory,
    /// Snapshot of the process environment at entry.
    pub process_env: BTreeMap<String, String>,
    /// Composition timestamp, RFC3339 UTC.
    pub now: String,
    pub overrides_file: Option<OverridesFile>,
    pub enable_trace: bool,
    /// Warnings carried over from input parsing, emitted ahead of the
    /// composer's own.
    pub seed_warnings: Vec<(Warning, Fields)>,
}

/// Overrides file payload: flat environment map plus warning actions.
#[derive(Debug, Default)]
struct ParsedOverrides {
    environment: BTreeMap<String, String>,
    warnings: BTreeMap<String, String>,
}

fn parse_overrides_content(content: &str) -> Result<ParsedOverrides, &'static str> {
    let root: serde_json::Value =
        serde_json::from_str(content).map_err(|_| "parse_failure")?;
    let Some(map) = root.as_object() else {
        return Err("invalid_shape");
    };

    let mut out = ParsedOverrides::default();
    for (key, value) in map {
        let Some(table) = value.as_object() else {
            return Err("invalid_shape");
        };
        let target = match key.as_str() {
            "environment" => &mut out.environment,
            "warnings" => &mut out.warnings,
            _ => return Err("invalid_shape"),
        };
        for (k, v) in table {
            let Some(s) = v.as_str() else {
                return Err("invalid_shape");
            };
            target.insert(k.clone(), s.to_string());
        }
    }
    Ok(out)
}

fn normalize_rfc3339(ts: &str) -> String {
    for suffix in ["+00:00", "-00:00"] {
        if let Some(stripped) = ts.strip_suffix(suffix) {
            return format!("{}Z", stripped);
        }
    }
    ts.to_string()
}

/// Lexicographic comparison over normalized RFC3339 UTC timestamps.
fn timestamp_before(a: &str, b: &str) -> bool {
    normalize_rfc3339(a) < normalize_rfc3339(b)
}

/// Fold one operation against the current value for a key. `None` means
/// the key is unset.
fn apply_env_op(
    key: &str,
    value: &EnvValue,
    environment: &BTreeMap<String, String>,
) -> Option<String> {
    match value.op {
        EnvOp::Set => Some(value.value.clone()),
        EnvOp::Prepend => match environment.get(key) {
            Some(current) if !current.is_empty() => {
                Some(format!("{}{}{}", value.value, value.separator, current))
            }
            _ => Some(value.value.clone()),
        },
        EnvOp::Append => match environment.get(key) {
            Some(current) if !current.is_empty() => {
                Some(format!("{}{}{}", current, value.separator, value.value))
            }
            _ => Some(value.value.clone()),
        },
        EnvOp::Unset => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_env_layer(
    environment: &mut BTreeMap<String, String>,
    key: &str,
    value: &EnvValue,
    source_kind: &str,
    source_path: &str,
    rank: u32,
    recorder: &mut TraceRecorder,
) {
    match apply_env_op(key, value, environment) {
        Some(folded) => {
            environment.insert(key.to_string(), folded.clone());
            recorder.record_env(key, &folded, source_kind, source_path, rank, value.op, true);
        }
        None => {
            environment.remove(key);
            recorder.record_env(key, "", source_kind, source_path, rank, value.op, true);
        }
    }
}

/// Which loader composition will use, before warnings are attached.
enum LoaderChoice<'a> {
    Named(String, &'a Loader),
    MissingNamed(String),
    MultipleUnpinned,
    NoLoaders,
}

fn choose_loader<'a>(record: &'a NakRecord, pinned: &str) -> LoaderChoice<'a> {
    if !pinned.is_empty() {
        return match record.loaders.get(pinned) {
            Some(loader) => LoaderChoice::Named(pinned.to_string(), loader),
            None => LoaderChoice::MissingNamed(pinned.to_string()),
        };
    }
    if record.loaders.is_empty() {
        return LoaderChoice::NoLoaders;
    }
    if record.loaders.len() == 1 {
        let (name, loader) = record.loaders.iter().next().expect("len checked");
        return LoaderChoice::Named(name.clone(), loader);
    }
    match record.loaders.get("default") {
        Some(loader) => LoaderChoice::Named("default".to_string(), loader),
        None => LoaderChoice::MultipleUnpinned,
    }
}

/// Compose a launch contract. Warnings accumulate through every step; a
/// critical error stops the pipeline but preserves warnings emitted so
/// far.
pub fn compose_contract(inputs: &CompositionInputs) -> CompositionResult {
    let mut collector = WarningCollector::with_policy(inputs.profile.warnings.clone());
    collector.extend(inputs.seed_warnings.clone());
    let mut recorder = TraceRecorder::new(inputs.enable_trace);
    let mut contract = LaunchContract::default();

    let outcome = run_pipeline(inputs, &mut contract, &mut collector, &mut recorder);

    let mut result = CompositionResult {
        ok: false,
        envelope: ContractEnvelope {
            contract,
            warnings: Vec::new(),
            trace: None,
        },
        critical_error: None,
        critical_error_context: String::new(),
    };

    match outcome {
        Ok(()) => {
            result.ok = true;
            result.envelope.trace = recorder.finish(&result.envelope.contract.environment);
        }
        Err((critical, context)) => {
            result.critical_error = Some(critical);
            result.critical_error_context = context;
        }
    }
    result.envelope.warnings = collector.finalize();
    result
}

fn run_pipeline(
    inputs: &CompositionInputs,
    contract: &mut LaunchContract,
    collector: &mut WarningCollector,
    recorder: &mut TraceRecorder,
) -> Result<(), (CriticalError, String)> {
    let manifest = inputs.manifest;
    let record = inputs.install_record;
    let profile = inputs.profile;

    // Step 1: input validation. The install record must carry its two
    // required fields even when constructed in memory.
    if record.install.instance_id.trim().is_empty() {
        return Err((
            CriticalError::InstallRecordInvalid,
            "install.instance_id missing".to_string(),
        ));
    }
    if record.install_root.trim().is_empty() {
        return Err((
            CriticalError::InstallRecordInvalid,
            "paths.install_root missing".to_string(),
        ));
    }

    if !record.app.id.is_empty() && record.app.id != manifest.id {
        collector.emit_fields(
            Warning::InvalidConfiguration,
            &[
                ("reason", "app_field_mismatch"),
                ("section", "install_record.app"),
                ("field", "id"),
            ],
        );
    }
    if !record.app.version.is_empty() && record.app.version != manifest.version {
        collector.emit_fields(
            Warning::InvalidConfiguration,
            &[
                ("reason", "app_field_mismatch"),
                ("section", "install_record.app"),
                ("field", "version"),
            ],
        );
    }

    // Step 2: NAK resolution. Standalone apps (no nak_id) skip entirely;
    // a failed resolution is not fatal because libs-only runtimes may be
    // absent and the app entrypoint still runs. A record with no pin at
    // all resolves live against the inventory; a partial pin is invalid
    // and resolves nothing.
    let mut nak_record: Option<&NakRecord> = None;
    let mut nak_record_ref = String::new();
    if !manifest.nak_id.is_empty() {
        if manifest.nak_version_req.is_none() {
            // Nothing can be validated against a missing range; the app
            // entrypoint carries the launch.
            collector.emit_fields(
                Warning::InvalidManifest,
                &[("reason", "nak_version_req_invalid")],
            );
        } else {
            let pin = &record.nak;
            let pin_absent =
                pin.record_ref.is_empty() && pin.id.is_empty() && pin.version.is_empty();
            if pin_absent {
                let selection = select_nak(manifest, profile, inputs.inventory, collector);
                if selection.resolved {
                    nak_record = inputs.inventory.get(&selection.record_ref);
                    nak_record_ref = selection.record_ref;
                }
            } else if pin.record_ref.is_empty() || pin.id.is_empty() || pin.version.is_empty() {
                collector.emit_fields(Warning::NakPinInvalid, &[("reason", "pin_fields_missing")]);
            } else {
                nak_record = load_pinned_nak(pin, manifest, profile, inputs.inventory, collector);
                nak_record_ref = pin.record_ref.clone();
            }
        }
    }

    // Step 3: app fields and entrypoint.
    contract.app.id = manifest.id.clone();
    contract.app.version = manifest.version.clone();
    contract.app.root = record.install_root.clone();

    if manifest.entrypoint_path.is_empty() {
        return Err((
            CriticalError::EntrypointNotFound,
            "manifest has no entrypoint".to_string(),
        ));
    }
    if is_absolute_path(&manifest.entrypoint_path) {
        collector.emit_fields(Warning::InvalidManifest, &[("reason", "entrypoint_absolute")]);
        return Err((
            CriticalError::EntrypointNotFound,
            format!("entrypoint '{}' is absolute", manifest.entrypoint_path),
        ));
    }
    contract.app.entrypoint =
        match normalize_under_root(&contract.app.root, &manifest.entrypoint_path, false) {
            Ok(path) => path,
            Err(_) => {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "entrypoint '{}' escapes app root '{}'",
                        manifest.entrypoint_path, contract.app.root
                    ),
                ));
            }
        };

    // The composer's single filesystem access.
    if !std::path::Path::new(&contract.app.entrypoint).is_file() {
        return Err((
            CriticalError::EntrypointNotFound,
            format!("entrypoint '{}' does not exist", contract.app.entrypoint),
        ));
    }

    // Step 4: NAK fields. Every runtime path must be absolute and stay
    // under the runtime root.
    if let Some(nak) = nak_record {
        contract.nak.id = nak.id.clone();
        contract.nak.version = nak.version.clone();
        contract.nak.root = nak.paths.root.clone();
        contract.nak.resource_root = nak.paths.resource_root.clone();
        contract.nak.record_ref = nak_record_ref.clone();

        for lib_dir in &nak.paths.lib_dirs {
            if !is_absolute_path(lib_dir) {
                return Err((
                    CriticalError::PathTraversal,
                    format!("NAK lib_dir '{}' is not absolute", lib_dir),
                ));
            }
            if !is_path_under_root(&nak.paths.root, lib_dir) {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "NAK lib_dir '{}' escapes NAK root '{}'",
                        lib_dir, nak.paths.root
                    ),
                ));
            }
        }
        // Loader exec_paths may carry placeholders, so their containment
        // check waits until after environment expansion.
    }

    // Step 5: environment algebra, layers 1..7 in fixed rank order.
    let mut environment: BTreeMap<String, String> = BTreeMap::new();

    for (key, value) in &profile.environment {
        apply_env_layer(&mut environment, key, value, "profile", "host_profile", 1, recorder);
    }

    if let Some(nak) = nak_record {
        for (key, value) in &nak.environment {
            apply_env_layer(
                &mut environment,
                key,
                value,
                "nak",
                &nak_record_ref,
                2,
                recorder,
            );
        }
    }

    // Layer 3: manifest defaults are fill-only, never overwriting.
    for env_var in &manifest.env_vars {
        let Some((key, value)) = env_var.split_once('=') else {
            continue;
        };
        let accepted = !environment.contains_key(key);
        if accepted {
            environment.insert(key.to_string(), value.to_string());
        }
        recorder.record_env(key, value, "manifest", "app_manifest", 3, EnvOp::Set, accepted);
    }

    for (key, value) in &record.overrides.environment {
        apply_env_layer(
            &mut environment,
            key,
            value,
            "install_override",
            &record.source_path,
            4,
            recorder,
        );
    }

    // Layer 5: NAH standard keys always overwrite.
    let mut standard = vec![
        ("NAH_APP_ID", contract.app.id.clone()),
        ("NAH_APP_VERSION", contract.app.version.clone()),
        ("NAH_APP_ROOT", contract.app.root.clone()),
        ("NAH_APP_ENTRY", contract.app.entrypoint.clone()),
    ];
    if nak_record.is_some() {
        standard.push(("NAH_NAK_ID", contract.nak.id.clone()));
        standard.push(("NAH_NAK_VERSION", contract.nak.version.clone()));
        standard.push(("NAH_NAK_ROOT", contract.nak.root.clone()));
    }
    for (key, value) in standard {
        environment.insert(key.to_string(), value.clone());
        recorder.record_env(key, &value, "nah_standard", "nah", 5, EnvOp::Set, true);
    }

    // Layers 6 and 7: per-invocation overrides, filtered by policy.
    apply_process_env_overrides(inputs, &mut environment, collector, recorder);
    apply_overrides_file(inputs, &mut environment, collector, recorder);

    // NUL bytes never reach the contract environment.
    let nul_keys: Vec<String> = environment
        .iter()
        .filter(|(key, value)| key.contains('\0') || value.contains('\0'))
        .map(|(key, _)| key.clone())
        .collect();
    for key in nul_keys {
        environment.remove(&key);
        collector.emit_fields(
            Warning::InvalidConfiguration,
            &[("reason", "environment_contains_nul")],
        );
    }

    // Step 6: placeholder expansion, environment first, then every
    // templated input against the expanded map.
    expand_environment(&mut environment, &inputs.process_env, collector);

    let pinned_loader = if !record.nak.loader.is_empty() {
        record.nak.loader.clone()
    } else {
        manifest.nak_loader.clone()
    };

    let mut expanded_loader_args: Vec<String> = Vec::new();
    let mut expanded_exec_paths: BTreeMap<String, String> = BTreeMap::new();
    let mut expanded_cwd = String::new();
    if let Some(nak) = nak_record {
        // Deferred step-4 validation: every loader's exec_path must
        // resolve to an absolute path under the runtime root.
        for (name, loader) in &nak.loaders {
            if loader.exec_path.is_empty() {
                continue;
            }
            let expanded = expand_placeholders(
                &loader.exec_path,
                &environment,
                &inputs.process_env,
                &format!("nak_record.loaders.{}.exec_path", name),
                collector,
            )
            .value;
            if !is_absolute_path(&expanded) {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "NAK loader '{}' exec_path '{}' is not absolute",
                        name, expanded
                    ),
                ));
            }
            if !is_path_under_root(&nak.paths.root, &expanded) {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "NAK loader '{}' exec_path '{}' escapes NAK root '{}'",
                        name, expanded, nak.paths.root
                    ),
                ));
            }
            expanded_exec_paths.insert(name.clone(), expanded);
        }

        if let LoaderChoice::Named(name, loader) = choose_loader(nak, &pinned_loader) {
            expanded_loader_args = expand_list(
                &loader.args_template,
                &environment,
                &inputs.process_env,
                &format!("nak_record.loaders.{}.args_template", name),
                collector,
            );
        }
        if let Some(execution) = &nak.execution {
            if !execution.cwd.is_empty() {
                expanded_cwd = expand_placeholders(
                    &execution.cwd,
                    &environment,
                    &inputs.process_env,
                    "nak_record.execution.cwd",
                    collector,
                )
                .value;
            }
        }
    }

    let expanded_lib_prepend = expand_list(
        &profile.paths.library_prepend,
        &environment,
        &inputs.process_env,
        "profile.paths.library_prepend",
        collector,
    );
    let expanded_lib_append = expand_list(
        &profile.paths.library_append,
        &environment,
        &inputs.process_env,
        "profile.paths.library_append",
        collector,
    );
    let expanded_override_lib_prepend = expand_list(
        &record.overrides.paths.library_prepend,
        &environment,
        &inputs.process_env,
        "install_record.overrides.paths.library_prepend",
        collector,
    );
    let expanded_args_prepend = expand_list(
        &record.overrides.arguments.prepend,
        &environment,
        &inputs.process_env,
        "install_record.overrides.arguments.prepend",
        collector,
    );
    let expanded_args_append = expand_list(
        &record.overrides.arguments.append,
        &environment,
        &inputs.process_env,
        "install_record.overrides.arguments.append",
        collector,
    );
    let expanded_entry_args = expand_list(
        &manifest.entrypoint_args,
        &environment,
        &inputs.process_env,
        "manifest.entrypoint_args",
        collector,
    );

    // Step 7: capability derivation.
    let enforcement = derive_enforcement(
        &manifest.permissions_filesystem,
        &manifest.permissions_network,
        profile,
        collector,
    );
    contract.enforcement.filesystem = enforcement.filesystem;
    contract.enforcement.network = enforcement.network;
    contract.capability_usage = enforcement.usage;

    // Step 8: execution binary and initial arguments.
    let mut initial_args: Vec<String> = Vec::new();
    match nak_record {
        Some(nak) if nak.has_loaders() => match choose_loader(nak, &pinned_loader) {
            LoaderChoice::Named(name, loader) => {
                contract.execution.binary = expanded_exec_paths
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| loader.exec_path.clone());
                initial_args = expanded_loader_args;
            }
            LoaderChoice::MissingNamed(name) => {
                collector.emit_fields(
                    Warning::NakLoaderMissing,
                    &[("requested", &name), ("reason", "loader not found in NAK")],
                );
                return Err((
                    CriticalError::NakLoaderInvalid,
                    format!("loader '{}' not present in NAK record", name),
                ));
            }
            LoaderChoice::MultipleUnpinned => {
                collector.emit_fields(
                    Warning::NakLoaderRequired,
                    &[("reason", "NAK provides multiple loaders and none was selected")],
                );
                contract.execution.binary = contract.app.entrypoint.clone();
            }
            LoaderChoice::NoLoaders => {
                contract.execution.binary = contract.app.entrypoint.clone();
            }
        },
        // Libs-only runtime or nothing resolved: run the app entrypoint.
        _ => contract.execution.binary = contract.app.entrypoint.clone(),
    }

    contract.execution.arguments = expanded_args_prepend;
    contract.execution.arguments.extend(initial_args);
    contract.execution.arguments.extend(expanded_entry_args);
    contract.execution.arguments.extend(expanded_args_append);

    // Step 9: working directory.
    contract.execution.cwd = contract.app.root.clone();
    if let Some(nak) = nak_record {
        if !expanded_cwd.is_empty() {
            if is_absolute_path(&expanded_cwd) {
                if !is_path_under_root(&nak.paths.root, &expanded_cwd)
                    && !is_path_under_root(&contract.app.root, &expanded_cwd)
                {
                    return Err((
                        CriticalError::PathTraversal,
                        format!(
                            "execution.cwd '{}' is outside NAK root '{}' and app root '{}'",
                            expanded_cwd, nak.paths.root, contract.app.root
                        ),
                    ));
                }
                contract.execution.cwd = expanded_cwd.clone();
            } else {
                match normalize_under_root(&nak.paths.root, &expanded_cwd, false) {
                    Ok(cwd) => contract.execution.cwd = cwd,
                    Err(_) => {
                        return Err((
                            CriticalError::PathTraversal,
                            format!(
                                "execution.cwd '{}' escapes NAK root '{}'",
                                expanded_cwd, nak.paths.root
                            ),
                        ));
                    }
                }
            }
        }
    }

    // Step 10: library search paths.
    contract.execution.library_path_env_key = library_path_env_key().to_string();

    for path in &expanded_lib_prepend {
        if !is_absolute_path(path) {
            collector.emit_fields(
                Warning::InvalidLibraryPath,
                &[("path", path), ("source_path", "profile.paths.library_prepend")],
            );
            continue;
        }
        contract.execution.library_paths.push(path.clone());
    }
    for path in &expanded_override_lib_prepend {
        if !is_absolute_path(path) {
            collector.emit_fields(
                Warning::InvalidLibraryPath,
                &[
                    ("path", path),
                    ("source_path", "install_record.overrides.paths.library_prepend"),
                ],
            );
            continue;
        }
        contract.execution.library_paths.push(path.clone());
    }
    if let Some(nak) = nak_record {
        contract
            .execution
            .library_paths
            .extend(nak.paths.lib_dirs.iter().cloned());
    }
    for lib_dir in &manifest.lib_dirs {
        if is_absolute_path(lib_dir) {
            collector.emit_fields(Warning::InvalidManifest, &[("reason", "lib_dir_absolute")]);
            continue;
        }
        match normalize_under_root(&contract.app.root, lib_dir, false) {
            Ok(path) => contract.execution.library_paths.push(path),
            Err(_) => {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "manifest lib_dir '{}' escapes app root '{}'",
                        lib_dir, contract.app.root
                    ),
                ));
            }
        }
    }
    for path in &expanded_lib_append {
        if !is_absolute_path(path) {
            collector.emit_fields(
                Warning::InvalidLibraryPath,
                &[("path", path), ("source_path", "profile.paths.library_append")],
            );
            continue;
        }
        contract.execution.library_paths.push(path.clone());
    }

    // Step 11: asset exports; later entries with the same id overwrite.
    for export in &manifest.asset_exports {
        if is_absolute_path(&export.path) {
            collector.emit_fields(Warning::InvalidManifest, &[("reason", "asset_export_absolute")]);
            continue;
        }
        match normalize_under_root(&contract.app.root, &export.path, false) {
            Ok(path) => {
                contract.exports.insert(
                    export.id.clone(),
                    AssetExport {
                        id: export.id.clone(),
                        path,
                        kind: export.kind.clone(),
                    },
                );
            }
            Err(_) => {
                return Err((
                    CriticalError::PathTraversal,
                    format!(
                        "asset export '{}' path '{}' escapes app root '{}'",
                        export.id, export.path, contract.app.root
                    ),
                ));
            }
        }
    }

    contract.environment = environment;

    // Step 12: trust carry-through and staleness.
    let trust = &record.trust;
    contract.trust.state = trust.state;
    contract.trust.source = trust.source.clone();
    contract.trust.evaluated_at = trust.evaluated_at.clone();
    contract.trust.expires_at = trust.expires_at.clone();
    contract.trust.inputs_hash = trust.inputs_hash.clone();
    contract.trust.details = trust.details.clone();

    if !trust.present {
        contract.trust.state = TrustState::Unknown;
        collector.emit(Warning::TrustStateUnknown);
    } else {
        match trust.state {
            TrustState::Verified => {}
            TrustState::Unverified => collector.emit(Warning::TrustStateUnverified),
            TrustState::Failed => collector.emit(Warning::TrustStateFailed),
            TrustState::Unknown => collector.emit(Warning::TrustStateUnknown),
        }
    }

    if !trust.expires_at.is_empty()
        && !inputs.now.is_empty()
        && timestamp_before(&trust.expires_at, &inputs.now)
    {
        collector.emit(Warning::TrustStateStale);
    }

    Ok(())
}

/// Harvest `NAH_OVERRIDE_*` keys from the process-environment snapshot in
/// lexicographic order (layer 6).
fn apply_process_env_overrides(
    inputs: &CompositionInputs,
    environment: &mut BTreeMap<String, String>,
    collector: &mut WarningCollector,
    recorder: &mut TraceRecorder,
) {
    for (key, value) in &inputs.process_env {
        let Some(target) = key.strip_prefix("NAH_OVERRIDE_") else {
            continue;
        };

        if target == "ENVIRONMENT" {
            if !is_override_permitted(target, inputs.profile) {
                collector.emit_fields(
                    Warning::OverrideDenied,
                    &[("target", key), ("source_path", key)],
                );
                continue;
            }
            let parsed: Result<serde_json::Value, _> = serde_json::from_str(value);
            match parsed.ok().and_then(|v| v.as_object().cloned()) {
                Some(map) => {
                    for (k, v) in map {
                        if let Some(s) = v.as_str() {
                            environment.insert(k.clone(), s.to_string());
                            recorder.record_env(&k, s, "process_env", key, 6, EnvOp::Set, true);
                        }
                    }
                }
                None => {
                    collector.emit_fields(
                        Warning::OverrideInvalid,
                        &[("target", key), ("reason", "parse_failure"), ("source_path", key)],
                    );
                }
            }
        } else if let Some(warning_key) = target.strip_prefix("WARNINGS_") {
            if !is_override_permitted(target, inputs.profile) {
                collector.emit_fields(
                    Warning::OverrideDenied,
                    &[("target", key), ("source_path", key)],
                );
                continue;
            }
            let Some(action) = WarningAction::parse(value) else {
                collector.emit_fields(
                    Warning::OverrideInvalid,
                    &[("target", key), ("reason", "invalid_value"), ("source_path", key)],
                );
                continue;
            };
            if Warning::parse(warning_key).is_none() {
                collector.emit_fields(
                    Warning::OverrideInvalid,
                    &[("target", key), ("reason", "unknown_warning_key"), ("source_path", key)],
                );
                continue;
            }
            collector.apply_override(warning_key, action);
        } else {
            // Non-standard override targets are always denied.
            collector.emit_fields(
                Warning::OverrideDenied,
                &[("target", key), ("source_path", key)],
            );
        }
    }
}

/// Apply the pre-read overrides file (layer 7).
fn apply_overrides_file(
    inputs: &CompositionInputs,
    environment: &mut BTreeMap<String, String>,
    collector: &mut WarningCollector,
    recorder: &mut TraceRecorder,
) {
    let Some(file) = &inputs.overrides_file else {
        return;
    };

    if file.content.is_empty() {
        collector.emit_fields(
            Warning::OverrideInvalid,
            &[
                ("target", "OVERRIDES_FILE"),
                ("reason", "parse_failure"),
                ("source_path", &file.path),
            ],
        );
        return;
    }

    let overrides = match parse_overrides_content(&file.content) {
        Ok(overrides) => overrides,
        Err(reason) => {
            collector.emit_fields(
                Warning::OverrideInvalid,
                &[
                    ("target", "OVERRIDES_FILE"),
                    ("reason", reason),
                    ("source_path", &file.path),
                ],
            );
            return;
        }
    };

    if !overrides.environment.is_empty() {
        if !is_override_permitted("ENVIRONMENT", inputs.profile) {
            collector.emit_fields(
                Warning::OverrideDenied,
                &[
                    ("target", "NAH_OVERRIDE_ENVIRONMENT"),
                    ("source_path", &format!("{}:environment", file.path)),
                ],
            );
        } else {
            for (key, value) in &overrides.environment {
                environment.insert(key.clone(), value.clone());
                recorder.record_env(key, value, "overrides_file", &file.path, 7, EnvOp::Set, true);
            }
        }
    }

    for (warning_key, action_str) in &overrides.warnings {
        let target = format!("WARNINGS_{}", warning_key.to_ascii_uppercase());
        let source_path = format!("{}:warnings.{}", file.path, warning_key);

        if !is_override_permitted(&target, inputs.profile) {
            collector.emit_fields(
                Warning::OverrideDenied,
                &[
                    ("target", &format!("NAH_OVERRIDE_{}", target)),
                    ("source_path", &source_path),
                ],
            );
            continue;
        }
        let Some(action) = WarningAction::parse(action_str) else {
            collector.emit_fields(
                Warning::OverrideInvalid,
                &[
                    ("target", &format!("NAH_OVERRIDE_{}", target)),
                    ("reason", "invalid_value"),
                    ("source_path", &source_path),
                ],
            );
            continue;
        };
        if Warning::parse(warning_key).is_none() {
            collector.emit_fields(
                Warning::OverrideInvalid,
                &[
                    ("target", &format!("NAH_OVERRIDE_{}", target)),
                    ("reason", "unknown_warning_key"),
                    ("source_path", &source_path),
                ],
            );
            continue;
        }
        collector.apply_override(warning_key, action);
    }
}
