//! Capability derivation.
//!
//! Manifest permission entries (`op:resource`) become capability keys
//! (`fs.read./data`, `net.connect.host`), which the host profile maps to
//! opaque enforcement identifiers.

use crate::host_profile::HostProfile;
use crate::warnings::{Warning, WarningCollector};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityDomain {
    Filesystem,
    Network,
}

impl CapabilityDomain {
    fn prefix(&self) -> &'static str {
        match self {
            CapabilityDomain::Filesystem => "fs",
            CapabilityDomain::Network => "net",
        }
    }

    fn valid_op(&self, op: &str) -> bool {
        match self {
            CapabilityDomain::Filesystem => matches!(op, "read" | "write" | "execute"),
            CapabilityDomain::Network => matches!(op, "connect" | "listen" | "bind"),
        }
    }
}

/// A declared capability with its derived lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub key: String,
    pub operation: String,
    pub resource: String,
}

#[derive(Debug)]
enum PermissionError {
    Malformed,
    UnknownOperation(String),
}

fn parse_permission(entry: &str, domain: CapabilityDomain) -> Result<Capability, PermissionError> {
    let (op, resource) = entry.split_once(':').ok_or(PermissionError::Malformed)?;
    if op.is_empty() || resource.is_empty() {
        return Err(PermissionError::Malformed);
    }
    if !domain.valid_op(op) {
        return Err(PermissionError::UnknownOperation(op.to_string()));
    }
    Ok(Capability {
        key: format!("{}.{}.{}", domain.prefix(), op, resource),
        operation: op.to_string(),
        resource: resource.to_string(),
    })
}

/// Look up an enforcement id: exact key first, then the per-operation
/// wildcard (`fs.read.*`).
fn lookup_enforcement(key: &str, operation: &str, domain: CapabilityDomain, profile: &HostProfile) -> Option<String> {
    if let Some(id) = profile.capabilities.get(key) {
        return Some(id.clone());
    }
    let wildcard = format!("{}.{}.*", domain.prefix(), operation);
    profile.capabilities.get(&wildcard).cloned()
}

/// How the contract reports declared capabilities back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilityUsage {
    pub present: bool,
    pub required_capabilities: Vec<String>,
    pub optional_capabilities: Vec<String>,
    pub critical_capabilities: Vec<String>,
}

#[derive(Debug, Default)]
pub struct EnforcementResult {
    pub filesystem: Vec<String>,
    pub network: Vec<String>,
    pub usage: CapabilityUsage,
}

fn derive_domain(
    entries: &[String],
    domain: CapabilityDomain,
    profile: &HostProfile,
    result: &mut EnforcementResult,
    warnings: &mut WarningCollector,
) {
    for entry in entries {
        let capability = match parse_permission(entry, domain) {
            Ok(capability) => capability,
            Err(PermissionError::Malformed) => {
                warnings.emit_fields(Warning::CapabilityMalformed, &[("entry", entry)]);
                continue;
            }
            Err(PermissionError::UnknownOperation(op)) => {
                warnings.emit_fields(
                    Warning::CapabilityUnknown,
                    &[("entry", entry), ("operation", &op)],
                );
                continue;
            }
        };

        result.usage.required_capabilities.push(capability.key.clone());

        match lookup_enforcement(&capability.key, &capability.operation, domain, profile) {
            Some(enforcement_id) => {
                let target = match domain {
                    CapabilityDomain::Filesystem => &mut result.filesystem,
                    CapabilityDomain::Network => &mut result.network,
                };
                target.push(enforcement_id);
            }
            None => {
                warnings.emit_fields(Warning::CapabilityMissing, &[("capability", &capability.key)]);
                result.usage.critical_capabilities.push(capability.key);
            }
        }
    }
}

/// Derive enforcement ids for all declared permissions, filesystem first,
/// preserving declaration order.
pub fn derive_enforcement(
    permissions_filesystem: &[String],
    permissions_network: &[String],
    profile: &HostProfile,
    warnings: &mut WarningCollector,
) -> EnforcementResult {
    let mut result = EnforcementResult {
        usage: CapabilityUsage {
            present: !permissions_filesystem.is_empty() || !permissions_network.is_empty(),
            ..Default::default()
        },
        ..Default::default()
    };

    derive_domain(permissions_filesystem, CapabilityDomain::Filesystem, profile, &mut result, warnings);
    derive_domain(permissions_network, CapabilityDomain::Network, profile, &mut result, warnings);

    result
}
