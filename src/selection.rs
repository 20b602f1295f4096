//! Runtime selection against the inventory.
//!
//! Two entry points: `select_nak` picks a runtime for a manifest the way an
//! installer would (canonical or mapped binding), and `load_pinned_nak`
//! revalidates the pin an install record already carries.

use crate::host_profile::{version_allowed_by_profile, HostProfile};
use crate::install_record::NakPin;
use crate::manifest::Manifest;
use crate::nak_record::NakRecord;
use crate::semver::{parse_version, satisfies};
use crate::types::BindingMode;
use crate::warnings::{Warning, WarningCollector};
use std::collections::BTreeMap;

/// The runtime inventory: opaque `record_ref` → descriptor.
pub type Inventory = BTreeMap<String, NakRecord>;

/// Outcome of install-time selection.
#[derive(Debug, Clone, Default)]
pub struct NakSelection {
    pub resolved: bool,
    pub record_ref: String,
    pub id: String,
    pub version: String,
    pub selection_reason: String,
}

/// Choose a runtime for the manifest from the inventory, honoring the
/// profile's allow/deny rules and binding mode.
pub fn select_nak(
    manifest: &Manifest,
    profile: &HostProfile,
    inventory: &Inventory,
    warnings: &mut WarningCollector,
) -> NakSelection {
    let unresolved = NakSelection::default();

    let Some(requirement) = manifest.nak_version_req.as_ref() else {
        warnings.emit_fields(Warning::InvalidManifest, &[("reason", "nak_version_req_invalid")]);
        return unresolved;
    };

    let candidates: Vec<(&String, &NakRecord)> = inventory
        .iter()
        .filter(|(_, record)| record.id == manifest.nak_id)
        .collect();

    if candidates.is_empty() {
        warnings.emit_fields(Warning::NakNotFound, &[("nak_id", &manifest.nak_id)]);
        return unresolved;
    }

    let mut valid: Vec<(&String, &NakRecord)> = Vec::new();
    for (record_ref, record) in candidates {
        if !version_allowed_by_profile(&record.version, profile) {
            continue;
        }
        let Some(version) = parse_version(&record.version) else {
            continue;
        };
        if satisfies(&version, requirement) {
            valid.push((record_ref, record));
        }
    }

    if valid.is_empty() {
        warnings.emit_fields(
            Warning::NakVersionUnsupported,
            &[
                ("nak_id", &manifest.nak_id),
                ("nak_version_req", &requirement.raw),
            ],
        );
        return unresolved;
    }

    let selected = match profile.nak.binding_mode {
        BindingMode::Mapped => {
            let key = requirement.selection_key();
            match profile.nak.map.get(&key) {
                Some(mapped_ref) => {
                    match valid.iter().find(|(record_ref, _)| *record_ref == mapped_ref) {
                        Some(entry) => *entry,
                        None => {
                            warnings.emit_fields(
                                Warning::NakVersionUnsupported,
                                &[
                                    ("nak_id", &manifest.nak_id),
                                    ("reason", "mapped_record_not_found"),
                                ],
                            );
                            return unresolved;
                        }
                    }
                }
                None => {
                    warnings.emit_fields(
                        Warning::NakVersionUnsupported,
                        &[("nak_id", &manifest.nak_id), ("selection_key", &key)],
                    );
                    return unresolved;
                }
            }
        }
        BindingMode::Canonical => {
            // Highest satisfying version wins; prerelease-aware ordering.
            let mut best: Option<(&String, &NakRecord)> = None;
            for &(record_ref, record) in &valid {
                let version = parse_version(&record.version);
                let best_version = best.and_then(|(_, b)| parse_version(&b.version));
                let better = match (&version, &best_version) {
                    (Some(v), Some(b)) => v > b,
                    (Some(_), None) => true,
                    _ => false,
                };
                if better {
                    best = Some((record_ref, record));
                }
            }
            match best {
                Some(entry) => entry,
                None => {
                    warnings
                        .emit_fields(Warning::NakVersionUnsupported, &[("nak_id", &manifest.nak_id)]);
                    return unresolved;
                }
            }
        }
    };

    NakSelection {
        resolved: true,
        record_ref: selected.0.clone(),
        id: selected.1.id.clone(),
        version: selected.1.version.clone(),
        selection_reason: format!("matched {}, allowed by profile", requirement.raw),
    }
}

/// Revalidate an install record's pin against the inventory: the record
/// must exist, agree with the pin and the manifest on identity and
/// version, still satisfy the manifest's range, and pass the profile's
/// allow/deny rules.
pub fn load_pinned_nak<'a>(
    pin: &NakPin,
    manifest: &Manifest,
    profile: &HostProfile,
    inventory: &'a Inventory,
    warnings: &mut WarningCollector,
) -> Option<&'a NakRecord> {
    if pin.record_ref.is_empty() {
        warnings.emit_fields(Warning::NakPinInvalid, &[("reason", "record_ref_empty")]);
        return None;
    }

    let Some(record) = inventory.get(&pin.record_ref) else {
        warnings.emit_fields(
            Warning::NakPinInvalid,
            &[("reason", "record_not_found"), ("record_ref", &pin.record_ref)],
        );
        return None;
    };

    if manifest.nak_id.is_empty() {
        warnings.emit_fields(Warning::InvalidManifest, &[("reason", "nak_id_missing")]);
        return None;
    }

    if pin.id != record.id || record.id != manifest.nak_id {
        warnings.emit_fields(
            Warning::NakPinInvalid,
            &[
                ("reason", "id_mismatch"),
                ("pin_id", &pin.id),
                ("record_id", &record.id),
                ("manifest_nak_id", &manifest.nak_id),
            ],
        );
        return None;
    }

    if pin.version != record.version {
        warnings.emit_fields(
            Warning::NakPinInvalid,
            &[
                ("reason", "version_mismatch"),
                ("pin_version", &pin.version),
                ("record_version", &record.version),
            ],
        );
        return None;
    }

    let Some(version) = parse_version(&record.version) else {
        warnings.emit_fields(
            Warning::NakPinInvalid,
            &[("reason", "invalid_version"), ("version", &record.version)],
        );
        return None;
    };

    let Some(requirement) = manifest.nak_version_req.as_ref() else {
        warnings.emit_fields(Warning::InvalidManifest, &[("reason", "nak_version_req_invalid")]);
        return None;
    };

    if !satisfies(&version, requirement) {
        warnings.emit_fields(
            Warning::NakPinInvalid,
            &[
                ("reason", "requirement_not_satisfied"),
                ("version", &record.version),
                ("requirement", &requirement.raw),
            ],
        );
        return None;
    }

    if !version_allowed_by_profile(&record.version, profile) {
        warnings.emit_fields(
            Warning::NakVersionUnsupported,
            &[("reason", "denied_by_profile"), ("version", &record.version)],
        );
        return None;
    }

    Some(record)
}
