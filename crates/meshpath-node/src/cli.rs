//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use meshpath::ServerConfig;

/// meshpath server.
///
/// Flags override values loaded from `--config`.
#[derive(Parser, Debug)]
#[command(name = "meshpath-node", version, about = "Runs a meshpath server")]
pub struct CliArgs {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8883.
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Directory for persistent state. In memory when absent.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Apply flag overrides to a loaded config.
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(ref addr) = self.bind {
            config.bind_addr = addr.clone();
        }
        if let Some(ref dir) = self.data_dir {
            config.data_dir = Some(dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::parse_from([
            "meshpath-node",
            "--bind",
            "127.0.0.1:9000",
            "--data-dir",
            "/tmp/mesh",
            "-v",
        ]);
        let mut config = ServerConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/mesh")));
        assert!(args.verbose);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = CliArgs::parse_from(["meshpath-node"]);
        let mut config = ServerConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config, ServerConfig::default());
        assert!(args.config.is_none());
    }
}
