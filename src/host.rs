//! Host facade: the on-disk layout under the NAH root, and the glue that
//! assembles composer inputs from it.
//!
//! Layout:
//! - `<root>/registry/installs/*.{json,toml}`: app install records
//! - `<root>/registry/naks/*.{json,toml}`: runtime descriptors; the file
//!   name is the inventory's `record_ref`
//! - `<root>/host/profiles/*.{json,toml}`: host profiles
//! - `<root>/host/profile.current`: symlink naming the active profile
//! - `<install_root>/manifest.nah`: the app's binary manifest

use crate::compose::{compose_contract, CompositionInputs, OverridesFile};
use crate::contract::CompositionResult;
use crate::host_profile::{builtin_profile, parse_host_profile, HostProfile};
use crate::install_record::{parse_install_record, AppInstallRecord};
use crate::manifest::{parse_manifest, ManifestParse};
use crate::nak_record::parse_nak_record;
use crate::selection::Inventory;
use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Cached default root discovery.
static DEFAULT_ROOT_CACHE: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

/// Default NAH root: `$NAH_ROOT`, else `~/.nah`.
pub fn default_nah_root() -> PathBuf {
    {
        let cache = DEFAULT_ROOT_CACHE.lock().unwrap();
        if let Some(ref root) = *cache {
            return root.clone();
        }
    }

    let root = match std::env::var_os("NAH_ROOT") {
        Some(value) => PathBuf::from(value),
        None => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/"))
            .join(".nah"),
    };

    let mut cache = DEFAULT_ROOT_CACHE.lock().unwrap();
    *cache = Some(root.clone());
    root
}

/// One installed application as listed from the registry.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub id: String,
    pub version: String,
    pub instance_id: String,
    pub install_root: String,
    pub record_path: PathBuf,
}

/// Per-invocation knobs for contract composition.
#[derive(Debug, Clone, Default)]
pub struct ContractOptions {
    pub profile: Option<String>,
    pub loader: Option<String>,
    pub overrides_file: Option<PathBuf>,
    pub trace: bool,
}

pub struct NahHost {
    root: PathBuf,
}

/// List record files (json/toml) directly inside a directory, sorted by
/// file name for stable output.
fn record_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json") | Some("toml")
            )
        })
        .collect();
    files.sort();
    files
}

impl NahHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        NahHost { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn installs_dir(&self) -> PathBuf {
        self.root.join("registry").join("installs")
    }

    fn naks_dir(&self) -> PathBuf {
        self.root.join("registry").join("naks")
    }

    fn profiles_dir(&self) -> PathBuf {
        self.root.join("host").join("profiles")
    }

    fn profile_link(&self) -> PathBuf {
        self.root.join("host").join("profile.current")
    }

    /// Scan the install registry. Unparseable records are skipped with a
    /// debug log rather than failing the listing.
    pub fn list_applications(&self) -> Vec<AppInfo> {
        let mut apps = Vec::new();
        for path in record_files(&self.installs_dir()) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let parse = parse_install_record(&content, &path.display().to_string());
            if !parse.ok {
                tracing::debug!("skipping install record {}: {}", path.display(), parse.error);
                continue;
            }
            apps.push(AppInfo {
                id: parse.record.app.id.clone(),
                version: parse.record.app.version.clone(),
                instance_id: parse.record.install.instance_id.clone(),
                install_root: parse.record.install_root.clone(),
                record_path: path,
            });
        }
        apps
    }

    /// Find one installed app by id, optionally pinned to a version.
    pub fn find_application(&self, id: &str, version: Option<&str>) -> Result<AppInfo> {
        let matches: Vec<AppInfo> = self
            .list_applications()
            .into_iter()
            .filter(|app| app.id == id)
            .filter(|app| version.map(|v| app.version == v).unwrap_or(true))
            .collect();

        match matches.len() {
            0 => bail!("application not found: {}", id),
            1 => Ok(matches.into_iter().next().expect("len checked")),
            _ => {
                let versions: Vec<&str> = matches.iter().map(|m| m.version.as_str()).collect();
                bail!(
                    "multiple versions of {} installed ({}); pass id@version",
                    id,
                    versions.join(", ")
                )
            }
        }
    }

    pub fn load_install_record(&self, path: &Path) -> Result<AppInstallRecord> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read install record {}", path.display()))?;
        let parse = parse_install_record(&content, &path.display().to_string());
        if !parse.ok {
            bail!("invalid install record {}: {}", path.display(), parse.error);
        }
        Ok(parse.record)
    }

    /// Build the runtime inventory: file name → parsed descriptor.
    pub fn load_inventory(&self) -> Inventory {
        let mut inventory = Inventory::new();
        for path in record_files(&self.naks_dir()) {
            let Some(record_ref) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let parse = parse_nak_record(&content, &path.display().to_string());
            if !parse.ok {
                tracing::debug!("skipping NAK record {}: {}", path.display(), parse.error);
                continue;
            }
            inventory.insert(record_ref.to_string(), parse.record);
        }
        inventory
    }

    /// Read the app's binary manifest from its install root.
    pub fn load_manifest(&self, install_root: &str) -> Result<ManifestParse> {
        let path = Path::new(install_root).join("manifest.nah");
        let blob = fs::read(&path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Ok(parse_manifest(&blob))
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut names: Vec<String> = record_files(&self.profiles_dir())
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Name of the profile the `profile.current` symlink points at.
    pub fn active_profile_name(&self) -> Option<String> {
        let target = fs::read_link(self.profile_link()).ok()?;
        let stem = target.file_stem()?.to_str()?;
        Some(stem.to_string())
    }

    /// Point `profile.current` at a named profile, atomically.
    pub fn set_active_profile(&self, name: &str) -> Result<()> {
        let Some(path) = self.profile_file(name) else {
            bail!("profile not found: {}", name);
        };

        let host_dir = self.root.join("host");
        fs::create_dir_all(&host_dir)
            .with_context(|| format!("Failed to create {}", host_dir.display()))?;

        let target = Path::new("profiles").join(path.file_name().expect("profile file name"));
        let link = self.profile_link();
        let staged = host_dir.join(".profile.current.tmp");
        let _ = fs::remove_file(&staged);
        symlink(&target, &staged)
            .with_context(|| format!("Failed to stage symlink {}", staged.display()))?;
        fs::rename(&staged, &link)
            .with_context(|| format!("Failed to update {}", link.display()))?;
        Ok(())
    }

    fn profile_file(&self, name: &str) -> Option<PathBuf> {
        for ext in ["toml", "json"] {
            let path = self.profiles_dir().join(format!("{}.{}", name, ext));
            if path.is_file() {
                return Some(path);
            }
        }
        None
    }

    /// Resolve the effective profile: explicit name, then the
    /// `profile.current` symlink, then `default`, then the built-in empty
    /// profile. Fallbacks are reported as warning emissions for the
    /// composer to carry.
    pub fn resolve_profile(
        &self,
        explicit: Option<&str>,
    ) -> (HostProfile, Vec<(crate::warnings::Warning, crate::warnings::Fields)>) {
        use crate::warnings::{fields, Warning};
        let mut emissions = Vec::new();

        let try_load = |path: &Path, emissions: &mut Vec<_>| -> Option<HostProfile> {
            let content = fs::read_to_string(path).ok()?;
            let parse = parse_host_profile(&content, &path.display().to_string());
            if parse.ok {
                emissions.extend(parse.emissions);
                Some(parse.profile)
            } else {
                emissions.push((
                    Warning::ProfileParseError,
                    fields(&[
                        ("path", &path.display().to_string()),
                        ("error", &parse.error),
                    ]),
                ));
                None
            }
        };

        if let Some(name) = explicit {
            match self.profile_file(name) {
                Some(path) => {
                    if let Some(profile) = try_load(&path, &mut emissions) {
                        return (profile, emissions);
                    }
                }
                None => {
                    emissions.push((Warning::ProfileMissing, fields(&[("name", name)])));
                }
            }
        }

        let link = self.profile_link();
        if link.exists() || link.is_symlink() {
            match fs::read_link(&link) {
                Ok(target) => {
                    let path = self.root.join("host").join(target);
                    if let Some(profile) = try_load(&path, &mut emissions) {
                        return (profile, emissions);
                    }
                }
                Err(_) => {
                    emissions.push((
                        Warning::ProfileInvalid,
                        fields(&[("reason", "profile.current is not a symlink")]),
                    ));
                }
            }
        }

        if let Some(path) = self.profile_file("default") {
            if let Some(profile) = try_load(&path, &mut emissions) {
                return (profile, emissions);
            }
        } else {
            emissions.push((Warning::ProfileMissing, fields(&[("name", "default")])));
        }

        (builtin_profile(), emissions)
    }

    /// Compose the launch contract for an installed app, end to end.
    pub fn launch_contract(
        &self,
        app_id: &str,
        version: Option<&str>,
        options: &ContractOptions,
    ) -> Result<CompositionResult> {
        let app = self.find_application(app_id, version)?;
        let content = fs::read_to_string(&app.record_path).with_context(|| {
            format!("Failed to read install record {}", app.record_path.display())
        })?;
        let record_parse =
            parse_install_record(&content, &app.record_path.display().to_string());
        if !record_parse.ok {
            bail!(
                "invalid install record {}: {}",
                app.record_path.display(),
                record_parse.error
            );
        }
        let mut record = record_parse.record;

        if let Some(loader) = &options.loader {
            record.nak.loader = loader.clone();
        }

        let manifest_parse = self.load_manifest(&record.install_root)?;
        let (profile, mut seed_warnings) = self.resolve_profile(options.profile.as_deref());
        let inventory = self.load_inventory();

        let mut seed = record_parse.emissions;
        seed.extend(manifest_parse.emissions);
        seed.append(&mut seed_warnings);

        if let Some((critical, reason)) = manifest_parse.critical {
            // Header-level manifest damage: report through the composer's
            // envelope shape without composing.
            let mut result = CompositionResult {
                critical_error: Some(critical),
                critical_error_context: reason.to_string(),
                ..Default::default()
            };
            let mut collector = crate::warnings::WarningCollector::with_policy(
                profile.warnings.clone(),
            );
            collector.extend(seed);
            result.envelope.warnings = collector.finalize();
            return Ok(result);
        }

        let overrides_file = options.overrides_file.as_ref().map(|path| OverridesFile {
            path: path.display().to_string(),
            content: fs::read_to_string(path).unwrap_or_default(),
        });

        let inputs = CompositionInputs {
            manifest: &manifest_parse.manifest,
            install_record: &record,
            profile: &profile,
            inventory: &inventory,
            process_env: std::env::vars().collect(),
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            overrides_file,
            enable_trace: options.trace,
            seed_warnings: seed,
        };

        tracing::debug!(
            "composing contract for {}@{} under {}",
            manifest_parse.manifest.id,
            manifest_parse.manifest.version,
            self.root.display()
        );

        Ok(compose_contract(&inputs))
    }
}
