//! `nah manifest` - inspect a binary manifest or generate one from a
//! JSON/TOML description.

use crate::manifest::parse_manifest;
use crate::tlv::ManifestBuilder;
use crate::values;
use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::PathBuf;

#[derive(Subcommand, Clone, Debug)]
pub enum ManifestCommands {
    /// Decode a manifest.nah blob and print its fields
    Inspect {
        /// Path to the manifest blob
        path: PathBuf,
    },

    /// Build a manifest.nah blob from a JSON/TOML description
    Create {
        /// Path to the description document
        #[arg(long)]
        from: PathBuf,

        /// Where to write the blob
        #[arg(long, short)]
        output: PathBuf,
    },
}

pub fn cmd_manifest(command: ManifestCommands) -> Result<()> {
    match command {
        ManifestCommands::Inspect { path } => cmd_inspect(&path),
        ManifestCommands::Create { from, output } => cmd_create(&from, &output),
    }
}

fn cmd_inspect(path: &PathBuf) -> Result<()> {
    let blob = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parse = parse_manifest(&blob);

    if let Some((critical, reason)) = parse.critical {
        bail!("not a valid manifest: {} ({})", critical, reason);
    }

    let m = &parse.manifest;
    println!("id:          {}", m.id);
    println!("version:     {}", m.version);
    if m.nak_id.is_empty() {
        println!("runtime:     standalone");
    } else {
        println!("runtime:     {}", m.nak_id);
        if let Some(range) = &m.nak_version_req {
            println!("range:       {}", range);
        }
        if !m.nak_loader.is_empty() {
            println!("loader:      {}", m.nak_loader);
        }
    }
    println!("entrypoint:  {}", m.entrypoint_path);
    for arg in &m.entrypoint_args {
        println!("arg:         {}", arg);
    }
    for env in &m.env_vars {
        println!("env:         {}", env);
    }
    for dir in &m.lib_dirs {
        println!("lib dir:     {}", dir);
    }
    for dir in &m.asset_dirs {
        println!("asset dir:   {}", dir);
    }
    for export in &m.asset_exports {
        if export.kind.is_empty() {
            println!("export:      {} -> {}", export.id, export.path);
        } else {
            println!("export:      {} -> {} ({})", export.id, export.path, export.kind);
        }
    }
    for perm in &m.permissions_filesystem {
        println!("fs perm:     {}", perm);
    }
    for perm in &m.permissions_network {
        println!("net perm:    {}", perm);
    }
    if !m.description.is_empty() {
        println!("description: {}", m.description);
    }

    for (warning, fields) in &parse.emissions {
        let reason = fields.get("reason").map(|s| s.as_str()).unwrap_or("");
        tracing::warn!("{}: {}", warning.key(), reason);
    }
    Ok(())
}

fn cmd_create(from: &PathBuf, output: &PathBuf) -> Result<()> {
    let content =
        fs::read_to_string(from).with_context(|| format!("Failed to read {}", from.display()))?;
    let doc = values::parse_document(&content)
        .map_err(|e| anyhow::anyhow!("{}: {}", from.display(), e))?;

    let mut builder = ManifestBuilder::new()
        .id(values::get_string(&doc, "id").unwrap_or_default())
        .version(values::get_string(&doc, "version").unwrap_or_default())
        .nak_id(values::get_string(&doc, "nak_id").unwrap_or_default())
        .nak_version_req(values::get_string(&doc, "nak_version_req").unwrap_or_default())
        .nak_loader(values::get_string(&doc, "nak_loader").unwrap_or_default())
        .entrypoint(values::get_string(&doc, "entrypoint").unwrap_or_default())
        .description(values::get_string(&doc, "description").unwrap_or_default())
        .author(values::get_string(&doc, "author").unwrap_or_default())
        .license(values::get_string(&doc, "license").unwrap_or_default())
        .homepage(values::get_string(&doc, "homepage").unwrap_or_default());

    for arg in values::get_string_array(&doc, "entrypoint_args") {
        builder = builder.entrypoint_arg(arg);
    }
    for (key, value) in values::get_string_map(&doc, "env") {
        builder = builder.env(&key, &value);
    }
    for dir in values::get_string_array(&doc, "lib_dirs") {
        builder = builder.lib_dir(dir);
    }
    for dir in values::get_string_array(&doc, "asset_dirs") {
        builder = builder.asset_dir(dir);
    }
    if let Some(exports) = doc.get("asset_exports").and_then(|v| v.as_array()) {
        for export in exports {
            let id = values::get_string(export, "id").unwrap_or_default();
            let path = values::get_string(export, "path").unwrap_or_default();
            let kind = values::get_string(export, "type").unwrap_or_default();
            if id.is_empty() || path.is_empty() {
                bail!("asset export entries need both id and path");
            }
            builder = builder.asset_export(&id, &path, &kind);
        }
    }
    if let Some(permissions) = values::get_object(&doc, "permissions") {
        for perm in values::get_string_array(permissions, "filesystem") {
            builder = builder.filesystem_permission(perm);
        }
        for perm in values::get_string_array(permissions, "network") {
            builder = builder.network_permission(perm);
        }
    }

    let blob = builder.build();

    // Refuse to write a blob the decoder would complain about.
    let parse = parse_manifest(&blob);
    if let Some((critical, reason)) = parse.critical {
        bail!("generated manifest failed validation: {} ({})", critical, reason);
    }
    for (warning, fields) in &parse.emissions {
        let reason = fields.get("reason").map(|s| s.as_str()).unwrap_or("");
        tracing::warn!("generated manifest: {}: {}", warning.key(), reason);
    }

    fs::write(output, &blob)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} ({} bytes)", output.display(), blob.len());
    Ok(())
}
