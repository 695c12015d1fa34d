use crate::app::reporter::ReportFormat;
use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "gluetun-sync", version)]
#[command(about = "Syncs via HTTP requests port changes from gluetun")]
#[command(long_about = "Monitors the gluetun port file and issues a series of \
configured HTTP requests whenever it changes to keep other applications in sync.\n\n\
For example you can change the listening port (or the mapping) of any self-hosted \
software such as torrent clients, game servers or nextcloud.")]
pub struct CliConfig {
    /// Config file (default is /etc/gluetun-sync/config.toml, then ./config.toml)
    #[arg(long, env = "GLUESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path of the gluetun port file, overrides the config file
    #[arg(long, env = "GLUESYNC_PORT_FILE")]
    pub port_file: Option<String>,

    /// Synchronize just once and exit
    #[arg(short = '1', long, env = "GLUESYNC_ONCE")]
    pub once: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Print status events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl CliConfig {
    /// Applies command line overrides on top of the loaded file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port_file) = &self.port_file {
            config.port_file = Some(port_file.clone());
        }
    }

    pub fn report_format(&self) -> ReportFormat {
        if self.json {
            ReportFormat::Json
        } else {
            ReportFormat::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        CliConfig::command().debug_assert();
    }

    #[test]
    fn test_once_short_flag_and_override() {
        let cli = CliConfig::try_parse_from([
            "gluetun-sync",
            "-1",
            "--port-file",
            "/tmp/gluetun/forwarded_port",
            "--json",
        ])
        .unwrap();
        assert!(cli.once);
        assert_eq!(cli.report_format(), ReportFormat::Json);

        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.port_file.as_deref(), Some("/tmp/gluetun/forwarded_port"));
    }
}
