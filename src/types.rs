//! Shared value types for records and contracts.

use serde::{Deserialize, Serialize};

/// How an environment contribution composes against the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvOp {
    #[default]
    Set,
    Prepend,
    Append,
    Unset,
}

impl EnvOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvOp::Set => "set",
            EnvOp::Prepend => "prepend",
            EnvOp::Append => "append",
            EnvOp::Unset => "unset",
        }
    }

    pub fn parse(s: &str) -> Option<EnvOp> {
        match s.to_ascii_lowercase().as_str() {
            "set" => Some(EnvOp::Set),
            "prepend" => Some(EnvOp::Prepend),
            "append" => Some(EnvOp::Append),
            "unset" => Some(EnvOp::Unset),
            _ => None,
        }
    }
}

/// A tagged environment contribution: operation, payload, and the
/// separator used by prepend/append composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvValue {
    pub op: EnvOp,
    pub value: String,
    pub separator: String,
}

impl EnvValue {
    /// Plain `Set` contribution, the shorthand form in record files.
    pub fn set(value: impl Into<String>) -> Self {
        EnvValue {
            op: EnvOp::Set,
            value: value.into(),
            separator: ":".to_string(),
        }
    }

    pub fn new(op: EnvOp, value: impl Into<String>, separator: impl Into<String>) -> Self {
        EnvValue {
            op,
            value: value.into(),
            separator: separator.into(),
        }
    }
}

/// Trust assessment carried through composition untouched (apart from the
/// staleness comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustState {
    Verified,
    Unverified,
    Failed,
    #[default]
    Unknown,
}

impl TrustState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustState::Verified => "verified",
            TrustState::Unverified => "unverified",
            TrustState::Failed => "failed",
            TrustState::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<TrustState> {
        match s.to_ascii_lowercase().as_str() {
            "verified" => Some(TrustState::Verified),
            "unverified" => Some(TrustState::Unverified),
            "failed" => Some(TrustState::Failed),
            "unknown" => Some(TrustState::Unknown),
            _ => None,
        }
    }
}

impl Serialize for TrustState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TrustState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TrustState::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown trust state: {}", s)))
    }
}

/// How the host binds apps to runtime versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingMode {
    #[default]
    Canonical,
    Mapped,
}

impl BindingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingMode::Canonical => "canonical",
            BindingMode::Mapped => "mapped",
        }
    }

    pub fn parse(s: &str) -> Option<BindingMode> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" => Some(BindingMode::Canonical),
            "mapped" => Some(BindingMode::Mapped),
            _ => None,
        }
    }
}

/// Profile policy for per-invocation overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideMode {
    #[default]
    Allow,
    Deny,
    Allowlist,
}

impl OverrideMode {
    pub fn parse(s: &str) -> Option<OverrideMode> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Some(OverrideMode::Allow),
            "deny" => Some(OverrideMode::Deny),
            "allowlist" => Some(OverrideMode::Allowlist),
            _ => None,
        }
    }
}

/// Resolved disposition of a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningAction {
    #[default]
    Warn,
    Ignore,
    Error,
}

impl WarningAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningAction::Warn => "warn",
            WarningAction::Ignore => "ignore",
            WarningAction::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<WarningAction> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Some(WarningAction::Warn),
            "ignore" => Some(WarningAction::Ignore),
            "error" => Some(WarningAction::Error),
            _ => None,
        }
    }
}

/// The closed set of conditions that abort composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalError {
    ManifestMissing,
    EntrypointNotFound,
    PathTraversal,
    InstallRecordInvalid,
    NakLoaderInvalid,
}

impl CriticalError {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalError::ManifestMissing => "MANIFEST_MISSING",
            CriticalError::EntrypointNotFound => "ENTRYPOINT_NOT_FOUND",
            CriticalError::PathTraversal => "PATH_TRAVERSAL",
            CriticalError::InstallRecordInvalid => "INSTALL_RECORD_INVALID",
            CriticalError::NakLoaderInvalid => "NAK_LOADER_INVALID",
        }
    }
}

impl std::fmt::Display for CriticalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
