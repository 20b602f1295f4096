//! `nah contract` - compose and print a launch-contract envelope.

use super::{open_host, parse_target};
use crate::contract::serialize_envelope;
use crate::host::ContractOptions;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Clone, Debug)]
pub struct ContractArgs {
    /// App to compose for (id or id@version)
    pub target: String,

    /// Host profile name (defaults to the active profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Loader to use (overrides the install record's pin)
    #[arg(long)]
    pub loader: Option<String>,

    /// JSON overrides file (environment and warning actions)
    #[arg(long)]
    pub overrides_file: Option<String>,

    /// Include the per-key composition trace
    #[arg(long)]
    pub trace: bool,
}

/// Compose the contract and print the envelope. A critical error prints
/// the envelope too (warnings plus the error) and exits nonzero.
pub fn cmd_contract(root: Option<&str>, args: ContractArgs) -> Result<()> {
    let host = open_host(root);
    let (id, version) = parse_target(&args.target);

    let options = ContractOptions {
        profile: args.profile.clone(),
        loader: args.loader.clone(),
        overrides_file: args
            .overrides_file
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned())),
        trace: args.trace,
    };

    let result = host.launch_contract(id, version, &options)?;
    println!(
        "{}",
        serialize_envelope(&result.envelope, args.trace, result.critical_error)
    );

    if let Some(critical) = result.critical_error {
        tracing::error!("composition failed: {} ({})", critical, result.critical_error_context);
        std::process::exit(1);
    }
    Ok(())
}
