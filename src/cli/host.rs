//! `nah host` - print host facts: root, hostname, platform, registry
//! counts, and the active profile.

use super::open_host;
use crate::contract::library_path_env_key;
use anyhow::Result;

pub fn cmd_host(root: Option<&str>) -> Result<()> {
    let host = open_host(root);

    let name = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    println!("root:             {}", host.root().display());
    println!("hostname:         {}", name);
    println!("library path key: {}", library_path_env_key());
    println!(
        "active profile:   {}",
        host.active_profile_name().unwrap_or_else(|| "(builtin)".to_string())
    );
    println!("applications:     {}", host.list_applications().len());
    println!("runtimes:         {}", host.load_inventory().len());
    Ok(())
}
