//! `nah list` - list installed applications and runtimes.

use super::open_host;
use anyhow::Result;
use clap::Args;
use owo_colors::{OwoColorize, Stream};

#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    /// List runtimes (NAKs) instead of applications
    #[arg(long)]
    pub naks: bool,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_list(root: Option<&str>, args: ListArgs) -> Result<()> {
    let host = open_host(root);

    if args.naks {
        let inventory = host.load_inventory();
        if args.json {
            let entries: Vec<serde_json::Value> = inventory
                .iter()
                .map(|(record_ref, record)| {
                    serde_json::json!({
                        "record_ref": record_ref,
                        "id": record.id,
                        "version": record.version,
                        "root": record.paths.root,
                        "loaders": record.loaders.keys().collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }
        if inventory.is_empty() {
            println!("No runtimes installed under {}", host.root().display());
            return Ok(());
        }
        println!(
            "{}",
            "Installed runtimes".if_supports_color(Stream::Stdout, |t| t.bold())
        );
        for (record_ref, record) in &inventory {
            println!("  {}@{}  ({})", record.id, record.version, record_ref);
        }
        return Ok(());
    }

    let apps = host.list_applications();
    if args.json {
        let entries: Vec<serde_json::Value> = apps
            .iter()
            .map(|app| {
                serde_json::json!({
                    "id": app.id,
                    "version": app.version,
                    "instance_id": app.instance_id,
                    "install_root": app.install_root,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if apps.is_empty() {
        println!("No applications installed under {}", host.root().display());
        return Ok(());
    }
    println!(
        "{}",
        "Installed applications".if_supports_color(Stream::Stdout, |t| t.bold())
    );
    for app in &apps {
        println!("  {}@{}  {}", app.id, app.version, app.install_root);
    }
    Ok(())
}
