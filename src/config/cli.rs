//! Command-line argument parsing

use std::path::PathBuf;

use clap::Parser;
use uuid::Uuid;

use crate::core::{
    error::ConfigError,
    types::{Address, Key128, is_unicast},
};

#[derive(Parser, Debug, Clone)]
#[clap(name = "mesh-provisioner", version, author)]
#[clap(about = "Unattended Bluetooth mesh provisioner")]
pub struct CliArgs {
    /// Unix socket of the mesh stack daemon
    #[clap(long, default_value = "/run/mesh-stack.sock")]
    pub socket_path: PathBuf,

    /// File the node directory is persisted to
    #[clap(long, default_value = "/var/lib/mesh-provisioner/directory.json")]
    pub directory_path: PathBuf,

    /// Unicast address of the provisioner's own node (hex with 0x prefix or decimal)
    #[clap(long, default_value = "0x0001", value_parser = parse_address)]
    pub self_address: Address,

    /// UUID the provisioner's own node is recorded under
    #[clap(long, default_value = "dddd0000-0000-0000-0000-000000000000")]
    pub self_uuid: Uuid,

    /// Network key index
    #[clap(long, default_value = "0")]
    pub net_idx: u16,

    /// Application key index
    #[clap(long, default_value = "0")]
    pub app_idx: u16,

    /// Network key (32 hex digits)
    #[clap(long, default_value = "1234567890abcdef1234567890abcdef")]
    pub net_key: Key128,

    /// Application key (32 hex digits)
    #[clap(long, default_value = "fedcba0987654321fedcba0987654321")]
    pub app_key: Key128,

    /// Device key of the provisioner's own node (32 hex digits)
    #[clap(long, default_value = "aabbccddeeff00112233445566778899")]
    pub device_key: Key128,

    /// Start in auto-admit mode
    #[clap(short, long)]
    pub auto_admit: bool,

    /// Attention timer sent with admission requests, in seconds
    #[clap(long, default_value = "0")]
    pub attention: u8,

    /// sysfs brightness file of the mode indicator LED
    #[clap(long)]
    pub led_path: Option<PathBuf>,

    /// Seconds to wait for a candidate beacon
    #[clap(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_timeout: u64,

    /// Seconds to wait for operator confirmation
    #[clap(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub confirm_timeout: u64,

    /// Seconds to wait for an admission to complete
    #[clap(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub complete_timeout: u64,

    /// Seconds to wait for a mesh stack reply
    #[clap(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout: u64,
}

/// Parse a unicast address given as `0x`-prefixed hex or decimal
pub fn parse_address(s: &str) -> Result<Address, ConfigError> {
    let s = s.trim();
    let address = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => Address::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", s, e)))?;

    if !is_unicast(address) {
        return Err(ConfigError::InvalidAddress(format!(
            "{:#06x} is not a unicast address",
            address
        )));
    }

    Ok(address)
}
