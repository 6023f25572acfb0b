//! Runtime settings

use std::{path::PathBuf, time::Duration};

use crate::{
    config::CliArgs,
    core::provisioner::{ProvisionerConfig, Timeouts},
};

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub socket_path: PathBuf,
    pub directory_path: PathBuf,
    pub led_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub provisioner: ProvisionerConfig,
}

impl Settings {
    /// Configuration consumed by the provisioning core
    pub fn provisioner_config(&self) -> ProvisionerConfig {
        self.provisioner.clone()
    }
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        let timeouts = Timeouts {
            scan: Duration::from_secs(args.scan_timeout),
            confirm: Duration::from_secs(args.confirm_timeout),
            complete: Duration::from_secs(args.complete_timeout),
        };

        Settings {
            socket_path: args.socket_path,
            directory_path: args.directory_path,
            led_path: args.led_path,
            request_timeout: Duration::from_secs(args.request_timeout),
            provisioner: ProvisionerConfig {
                net_idx: args.net_idx,
                net_key: args.net_key,
                app_idx: args.app_idx,
                app_key: args.app_key,
                self_address: args.self_address,
                self_device_key: args.device_key,
                self_uuid: args.self_uuid,
                auto_admit: args.auto_admit,
                attention: args.attention,
                timeouts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_provisioner_defaults() {
        let settings = Settings::from(CliArgs::parse_from(["mesh-provisioner"]));
        let config = settings.provisioner_config();
        let defaults = ProvisionerConfig::default();

        assert_eq!(config.net_key, defaults.net_key);
        assert_eq!(config.app_key, defaults.app_key);
        assert_eq!(config.self_device_key, defaults.self_device_key);
        assert_eq!(config.self_uuid, defaults.self_uuid);
        assert_eq!(config.self_address, defaults.self_address);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_timeouts_from_args() {
        let settings = Settings::from(CliArgs::parse_from([
            "mesh-provisioner",
            "--scan-timeout",
            "1",
            "--confirm-timeout",
            "60",
        ]));

        assert_eq!(settings.provisioner.timeouts.scan, Duration::from_secs(1));
        assert_eq!(settings.provisioner.timeouts.confirm, Duration::from_secs(60));
        assert_eq!(
            settings.provisioner.timeouts.complete,
            Duration::from_secs(10)
        );
    }
}
