//! `nah which` - print installation paths for an app.

use super::{open_host, parse_target};
use anyhow::Result;
use clap::Args;
use std::path::Path;

#[derive(Args, Clone, Debug)]
pub struct WhichArgs {
    /// App to locate (id or id@version)
    pub target: String,

    /// Print only the install root
    #[arg(long)]
    pub root_only: bool,
}

pub fn cmd_which(root: Option<&str>, args: WhichArgs) -> Result<()> {
    let host = open_host(root);
    let (id, version) = parse_target(&args.target);
    let app = host.find_application(id, version)?;

    if args.root_only {
        println!("{}", app.install_root);
        return Ok(());
    }

    println!("install root:   {}", app.install_root);
    println!("install record: {}", app.record_path.display());
    let manifest_path = Path::new(&app.install_root).join("manifest.nah");
    if manifest_path.is_file() {
        println!("manifest:       {}", manifest_path.display());
    }
    Ok(())
}
