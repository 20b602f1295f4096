//! Typed application manifest extracted from the binary TLV form.

use crate::semver::{parse_range, parse_version, Range};
use crate::tlv::{self, tag, AssetExportParts, TlvEntry};
use crate::types::CriticalError;
use crate::warnings::{fields, Fields, Warning};
use once_cell::sync::Lazy;
use regex::Regex;

/// Reverse-DNS application id: at least two dot-separated labels.
static APP_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*(\.[A-Za-z0-9_-]+)+$").unwrap());

/// Decoded application manifest. String fields default to empty; the
/// composer decides which absences are fatal.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub nak_id: String,
    pub nak_version_req: Option<Range>,
    pub nak_loader: String,
    pub entrypoint_path: String,
    pub entrypoint_args: Vec<String>,
    pub env_vars: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub asset_dirs: Vec<String>,
    pub asset_exports: Vec<AssetExportParts>,
    pub permissions_filesystem: Vec<String>,
    pub permissions_network: Vec<String>,
    pub description: String,
    pub author: String,
    pub license: String,
    pub homepage: String,
}

#[derive(Debug, Default)]
pub struct ManifestParse {
    pub manifest: Manifest,
    pub emissions: Vec<(Warning, Fields)>,
    pub critical: Option<(CriticalError, &'static str)>,
}

impl ManifestParse {
    fn warn(&mut self, reason: &str) {
        self.emissions
            .push((Warning::InvalidManifest, fields(&[("reason", reason)])));
    }
}

/// Assemble a typed manifest from decoded TLV entries. First occurrence
/// wins for singular fields; repeatable fields accumulate in order.
pub fn manifest_from_entries(entries: &[TlvEntry], out: &mut ManifestParse) {
    let manifest = &mut out.manifest;
    let mut deferred: Vec<(Warning, Fields)> = Vec::new();

    for entry in entries {
        let value = entry.value.clone();
        match entry.tag {
            tag::ID => {
                if manifest.id.is_empty() {
                    manifest.id = value;
                }
            }
            tag::VERSION => {
                if manifest.version.is_empty() {
                    manifest.version = value;
                }
            }
            tag::NAK_ID => {
                if manifest.nak_id.is_empty() {
                    manifest.nak_id = value;
                }
            }
            tag::NAK_VERSION_REQ => {
                if manifest.nak_version_req.is_none() {
                    match parse_range(&value) {
                        Some(range) => manifest.nak_version_req = Some(range),
                        None => deferred.push((
                            Warning::InvalidManifest,
                            fields(&[("reason", "nak_version_req"), ("value", &value)]),
                        )),
                    }
                }
            }
            tag::NAK_LOADER => {
                if manifest.nak_loader.is_empty() {
                    manifest.nak_loader = value;
                }
            }
            tag::ENTRYPOINT_PATH => {
                if manifest.entrypoint_path.is_empty() {
                    manifest.entrypoint_path = value;
                }
            }
            tag::ENTRYPOINT_ARG => manifest.entrypoint_args.push(value),
            tag::ENV_VAR => manifest.env_vars.push(value),
            tag::LIB_DIR => manifest.lib_dirs.push(value),
            tag::ASSET_DIR => manifest.asset_dirs.push(value),
            tag::ASSET_EXPORT => match tlv::parse_asset_export(&value) {
                Some(parts) => manifest.asset_exports.push(parts),
                None => deferred.push((
                    Warning::InvalidManifest,
                    fields(&[("reason", "asset_export"), ("value", &value)]),
                )),
            },
            tag::PERMISSION_FILESYSTEM => manifest.permissions_filesystem.push(value),
            tag::PERMISSION_NETWORK => manifest.permissions_network.push(value),
            tag::DESCRIPTION => {
                if manifest.description.is_empty() {
                    manifest.description = value;
                }
            }
            tag::AUTHOR => {
                if manifest.author.is_empty() {
                    manifest.author = value;
                }
            }
            tag::LICENSE => {
                if manifest.license.is_empty() {
                    manifest.license = value;
                }
            }
            tag::HOMEPAGE => {
                if manifest.homepage.is_empty() {
                    manifest.homepage = value;
                }
            }
            _ => {} // unknown tags are forward-compatible
        }
    }

    out.emissions.extend(deferred);

    // Field-level validation. A standalone app may omit nak_id entirely.
    if out.manifest.id.is_empty() {
        out.warn("id_missing");
    } else if !APP_ID_REGEX.is_match(&out.manifest.id) {
        out.warn("id_not_reverse_dns");
    }

    if out.manifest.version.is_empty() {
        out.warn("version_missing");
    } else if parse_version(&out.manifest.version).is_none() {
        out.warn("version_invalid");
        out.manifest.version.clear();
    }

    if out.manifest.entrypoint_path.is_empty() {
        out.warn("entrypoint_missing");
    }
}

/// Decode a manifest blob all the way to typed fields. Header-level damage
/// surfaces as `critical`; everything else degrades to warnings.
pub fn parse_manifest(blob: &[u8]) -> ManifestParse {
    let decoded = tlv::decode_manifest_blob(blob);

    let mut out = ManifestParse {
        emissions: decoded.emissions,
        critical: decoded.critical,
        ..Default::default()
    };
    if out.critical.is_some() {
        return out;
    }

    manifest_from_entries(&decoded.entries, &mut out);
    out
}
