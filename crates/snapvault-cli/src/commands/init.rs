//! Init command - write a starter config file.

use std::path::Path;

use anyhow::Result;
use clap::Args as ClapArgs;

use crate::config::Config;

#[derive(ClapArgs, Clone)]
pub struct Args {}

pub fn execute(config_override: Option<&Path>, _args: &Args) -> Result<()> {
    let path = Config::write_template(config_override)?;
    println!("Wrote starter config to {}", path.display());
    println!("Fill in the store and transfer credentials before first use.");
    Ok(())
}
