//! `nah profile` - list, inspect, and switch host profiles.

use super::open_host;
use anyhow::Result;
use clap::Subcommand;
use owo_colors::{OwoColorize, Stream};

#[derive(Subcommand, Clone, Debug)]
pub enum ProfileCommands {
    /// List available profiles
    List,

    /// Show a profile (active profile when no name given)
    Show {
        /// Profile name
        name: Option<String>,
    },

    /// Set the active profile
    Set {
        /// Profile name
        name: String,
    },

    /// Print the active profile name
    Which,
}

pub fn cmd_profile(root: Option<&str>, command: ProfileCommands) -> Result<()> {
    let host = open_host(root);

    match command {
        ProfileCommands::List => {
            let profiles = host.list_profiles();
            if profiles.is_empty() {
                println!("No profiles under {}", host.root().display());
                return Ok(());
            }
            let active = host.active_profile_name();
            for name in profiles {
                if active.as_deref() == Some(name.as_str()) {
                    println!("* {}", name);
                } else {
                    println!("  {}", name);
                }
            }
            Ok(())
        }

        ProfileCommands::Show { name } => {
            let (profile, emissions) = host.resolve_profile(name.as_deref());
            println!(
                "{}",
                profile
                    .source_path
                    .if_supports_color(Stream::Stdout, |t| t.bold())
            );
            println!("  binding mode:  {}", profile.nak.binding_mode.as_str());
            if !profile.nak.allow_versions.is_empty() {
                println!("  allow:         {}", profile.nak.allow_versions.join(", "));
            }
            if !profile.nak.deny_versions.is_empty() {
                println!("  deny:          {}", profile.nak.deny_versions.join(", "));
            }
            for (key, record_ref) in &profile.nak.map {
                println!("  map {} -> {}", key, record_ref);
            }
            for (key, value) in &profile.environment {
                println!("  env {} ({})", key, value.op.as_str());
            }
            for (key, action) in &profile.warnings {
                println!("  warning {} = {}", key, action.as_str());
            }
            for (warning, _) in emissions {
                tracing::warn!("profile fallback: {}", warning.key());
            }
            Ok(())
        }

        ProfileCommands::Set { name } => {
            host.set_active_profile(&name)?;
            println!("Active profile set to {}", name);
            Ok(())
        }

        ProfileCommands::Which => {
            match host.active_profile_name() {
                Some(name) => println!("{}", name),
                None => println!("(builtin)"),
            }
            Ok(())
        }
    }
}
