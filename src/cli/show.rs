//! `nah show` - inspect an installed application: manifest fields,
//! install record, trust, and the runtime selection its range would make.

use super::{open_host, parse_target};
use crate::selection::select_nak;
use crate::warnings::WarningCollector;
use anyhow::Result;
use clap::Args;
use owo_colors::{OwoColorize, Stream};

#[derive(Args, Clone, Debug)]
pub struct ShowArgs {
    /// App to inspect (id or id@version)
    pub target: String,

    /// Host profile name (defaults to the active profile)
    #[arg(long)]
    pub profile: Option<String>,
}

fn heading(text: &str) -> String {
    format!("{}", text.if_supports_color(Stream::Stdout, |t| t.bold()))
}

pub fn cmd_show(root: Option<&str>, args: ShowArgs) -> Result<()> {
    let host = open_host(root);
    let (id, version) = parse_target(&args.target);

    let app = host.find_application(id, version)?;
    let record = host.load_install_record(&app.record_path)?;
    let manifest_parse = host.load_manifest(&record.install_root)?;
    if let Some((critical, reason)) = manifest_parse.critical {
        anyhow::bail!("manifest unreadable: {} ({})", critical, reason);
    }
    let manifest = &manifest_parse.manifest;

    println!("{}", heading(&format!("{}@{}", manifest.id, manifest.version)));
    if !manifest.description.is_empty() {
        println!("  {}", manifest.description);
    }
    println!("  instance:    {}", record.install.instance_id);
    println!("  root:        {}", record.install_root);
    println!("  entrypoint:  {}", manifest.entrypoint_path);
    if !manifest.author.is_empty() {
        println!("  author:      {}", manifest.author);
    }
    if !manifest.license.is_empty() {
        println!("  license:     {}", manifest.license);
    }

    if manifest.nak_id.is_empty() {
        println!("\n{}", heading("Runtime: standalone"));
    } else {
        println!("\n{}", heading("Runtime"));
        println!("  requires:  {}", manifest.nak_id);
        if let Some(range) = &manifest.nak_version_req {
            println!("  range:     {}", range);
        }
        if !record.nak.record_ref.is_empty() {
            println!(
                "  pinned:    {}@{} ({})",
                record.nak.id, record.nak.version, record.nak.record_ref
            );
        }
        if !record.nak.loader.is_empty() {
            println!("  loader:    {}", record.nak.loader);
        }

        // What selection would pick today, given the current inventory.
        let (profile, _) = host.resolve_profile(args.profile.as_deref());
        let inventory = host.load_inventory();
        let mut warnings = WarningCollector::new();
        let selection = select_nak(manifest, &profile, &inventory, &mut warnings);
        if selection.resolved {
            println!(
                "  selects:   {}@{} ({})",
                selection.id, selection.version, selection.record_ref
            );
        } else {
            for warning in warnings.finalize() {
                println!("  selects:   none ({})", warning.key);
            }
        }
    }

    println!("\n{}", heading("Trust"));
    if record.trust.present {
        println!("  state:     {}", record.trust.state.as_str());
        if !record.trust.source.is_empty() {
            println!("  source:    {}", record.trust.source);
        }
        if !record.trust.evaluated_at.is_empty() {
            println!("  evaluated: {}", record.trust.evaluated_at);
        }
        if !record.trust.expires_at.is_empty() {
            println!("  expires:   {}", record.trust.expires_at);
        }
    } else {
        println!("  state:     unknown (no assessment recorded)");
    }

    if !manifest.permissions_filesystem.is_empty() || !manifest.permissions_network.is_empty() {
        println!("\n{}", heading("Declared permissions"));
        for perm in &manifest.permissions_filesystem {
            println!("  fs:   {}", perm);
        }
        for perm in &manifest.permissions_network {
            println!("  net:  {}", perm);
        }
    }

    Ok(())
}
