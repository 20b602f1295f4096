//! CLI subcommand implementations and shared helpers.

pub mod contract;
pub mod host;
pub mod list;
pub mod manifest;
pub mod profile;
pub mod show;
pub mod which;

pub use contract::{cmd_contract, ContractArgs};
pub use host::cmd_host;
pub use list::{cmd_list, ListArgs};
pub use manifest::{cmd_manifest, ManifestCommands};
pub use profile::{cmd_profile, ProfileCommands};
pub use show::{cmd_show, ShowArgs};
pub use which::{cmd_which, WhichArgs};

use crate::host::{default_nah_root, NahHost};
use std::path::PathBuf;

/// Resolve the NAH root from `--root` (with `~` expansion) or the
/// default discovery chain.
pub fn resolve_root(root: Option<&str>) -> PathBuf {
    match root {
        Some(value) => PathBuf::from(shellexpand::tilde(value).into_owned()),
        None => default_nah_root(),
    }
}

pub fn open_host(root: Option<&str>) -> NahHost {
    NahHost::new(resolve_root(root))
}

/// Split an `id[@version]` target.
pub fn parse_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('@') {
        Some((id, version)) if !version.is_empty() => (id, Some(version)),
        _ => (target, None),
    }
}
