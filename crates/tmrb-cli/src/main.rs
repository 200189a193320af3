//! tm-remote-build CLI
//!
//! Loads, unloads and watches Openplanet plugins through the Remote Build
//! plugin running in the game. Compile output from `Openplanet.log` is
//! echoed to stdout while a command runs.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tmrb_core::config::{Config, Directories, Openplanet};
use tmrb_core::log::{LogMessageParser, LogTailer};
use tmrb_core::{LoadOptions, RemoteBuildClient};
use tmrb_rpc::{ControlChannel, PluginSource, PluginType};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Load or unload Openplanet plugins
#[derive(Parser)]
#[command(name = "tm-remote-build")]
#[command(about = "Load or unload Openplanet plugins")]
#[command(version)]
#[command(after_help = "\
Examples:
  tm-remote-build load folder MyPlugin -o OpenplanetNext
  tm-remote-build load zip MyPlugin -p 30000 --plugin-src app
  tm-remote-build unload MyPlugin -o Openplanet4
  tm-remote-build getlogs MyPlugin -o OpenplanetNext -b 4096

Defaults for host, port, op-dir and log polling can be set in config.json
in the platform config directory (tm-remote-build).
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a plugin
    Load {
        /// The type of plugin source to load from
        #[arg(value_enum)]
        plugin_type: SourceKind,

        #[command(flatten)]
        target: Target,

        /// Where to load the plugin from: "user" is the OpenplanetX/Plugins
        /// folder in the user profile, "app" is Openplanet/Plugins in the
        /// game directory
        #[arg(long, value_enum, default_value_t = SourceLocation::User)]
        plugin_src: SourceLocation,

        #[command(flatten)]
        watch: WatchArgs,
    },

    /// Unload a plugin
    Unload {
        #[command(flatten)]
        target: Target,
    },

    /// Get compilation logs
    #[command(name = "getlogs")]
    GetLogs {
        #[command(flatten)]
        target: Target,

        /// Replay this many bytes of the log before watching
        #[arg(short, long, default_value_t = 0)]
        back: u64,

        #[command(flatten)]
        watch: WatchArgs,
    },
}

impl Commands {
    fn target(&self) -> &Target {
        match self {
            Self::Load { target, .. } | Self::Unload { target } | Self::GetLogs { target, .. } => {
                target
            }
        }
    }
}

/// Arguments shared by every subcommand
#[derive(Args)]
#[command(group(ArgGroup::new("endpoint").args(["port", "openplanet"])))]
struct Target {
    /// The plugin ID: the folder name for a folder plugin, the file name
    /// without extension for a zipped plugin
    plugin_id: String,

    /// Directory holding Openplanet.log (queried from the game by default)
    #[arg(short = 'd', long)]
    op_dir: Option<PathBuf>,

    /// Host to connect to (IP or hostname)
    #[arg(long)]
    host: Option<String>,

    /// Port used by the Remote Build plugin
    #[arg(short, long)]
    port: Option<u16>,

    /// Use the default port of this build: OpenplanetNext, Openplanet4 or
    /// OpenplanetTurbo
    #[arg(short, long)]
    openplanet: Option<Openplanet>,

    /// Log Remote Build communication for debugging
    #[arg(short, long)]
    verbose: bool,
}

/// Log polling for commands that follow the log
#[derive(Args)]
struct WatchArgs {
    /// Consecutive empty checks after logs begin before stopping [default: 3]
    #[arg(short = 'l', long)]
    log_done_limit: Option<u32>,

    /// Seconds between log checks [default: 1.0]
    #[arg(short = 'i', long)]
    log_check_interval: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Folder,
    Zip,
}

impl From<SourceKind> for PluginType {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Folder => PluginType::Folder,
            SourceKind::Zip => PluginType::Zip,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceLocation {
    User,
    App,
}

impl From<SourceLocation> for PluginSource {
    fn from(location: SourceLocation) -> Self {
        match location {
            SourceLocation::User => PluginSource::User,
            SourceLocation::App => PluginSource::App,
        }
    }
}

/// Diagnostics go to stderr; rendered log lines own stdout.
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "error" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// File config with command line overrides applied
fn load_config(target: &Target, watch: Option<&WatchArgs>) -> Result<Config> {
    let config = match Directories::new() {
        Some(dirs) => Config::load(&dirs.config_file)
            .with_context(|| format!("Failed to load {}", dirs.config_file.display()))?,
        None => Config::default(),
    };
    Ok(apply_overrides(config, target, watch))
}

fn apply_overrides(mut config: Config, target: &Target, watch: Option<&WatchArgs>) -> Config {
    if let Some(host) = &target.host {
        config.host.clone_from(host);
    }
    if target.port.is_some() || target.openplanet.is_some() {
        config.port = target.port;
        config.openplanet = target.openplanet;
    }
    if let Some(op_dir) = &target.op_dir {
        config.op_dir = Some(op_dir.clone());
    }
    if let Some(watch) = watch {
        if let Some(limit) = watch.log_done_limit {
            config.log_done_limit = limit;
        }
        if let Some(interval) = watch.log_check_interval {
            config.log_check_interval = interval;
        }
    }
    config
}

/// Connect-on-demand client with the data folder already resolved
async fn connect_client(config: &Config) -> Result<RemoteBuildClient> {
    let Some(port) = config.resolved_port() else {
        bail!("Specify one of --port or --openplanet to reach the Remote Build plugin");
    };
    debug!("Using Remote Build at {}:{port}", config.host);

    let tailer = LogTailer::new().with_parser(LogMessageParser::new(
        config.plugin_path_marker.clone(),
    ));
    let channel = ControlChannel::new(config.host.clone(), port);
    let mut client = RemoteBuildClient::new(channel, tailer, config.op_dir.clone());

    if client.get_data_folder().await {
        debug!("Watching {:?}", client.tailer().file_path());
    } else {
        debug!("Openplanet data folder unknown, log output disabled");
    }
    Ok(client)
}

async fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Load {
            plugin_type,
            target,
            plugin_src,
            watch,
        } => {
            let config = load_config(&target, Some(&watch))?;
            let mut client = connect_client(&config).await?;
            let options = LoadOptions {
                source: plugin_src.into(),
                kind: plugin_type.into(),
                log_done_limit: config.log_done_limit,
                log_check_interval: config.log_check_interval(),
            };

            let loaded = client.load_plugin(&target.plugin_id, &options).await;
            report("load", &target.plugin_id, loaded);
            Ok(loaded)
        }
        Commands::Unload { target } => {
            let config = load_config(&target, None)?;
            let mut client = connect_client(&config).await?;

            let unloaded = client.unload_plugin(&target.plugin_id).await;
            report("unload", &target.plugin_id, unloaded);
            Ok(unloaded)
        }
        Commands::GetLogs {
            target,
            back,
            watch,
        } => {
            let config = load_config(&target, Some(&watch))?;
            let mut client = connect_client(&config).await?;
            if client.data_folder().is_none() {
                bail!("Could not locate Openplanet.log, pass --op-dir or start the game");
            }

            client
                .watch_logs(
                    &target.plugin_id,
                    back,
                    config.log_done_limit,
                    config.log_check_interval(),
                )
                .await;
            Ok(true)
        }
    }
}

fn report(action: &str, plugin_id: &str, success: bool) {
    if success {
        info!("Commanded {action} for plugin with ID \"{plugin_id}\"");
    } else {
        error!("Problem commanding {action} for plugin with ID \"{plugin_id}\"");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.command.target().verbose);

    // Dropping the command future closes any open log session.
    let success = tokio::select! {
        outcome = run(cli.command) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            false
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_parse_load() {
        let cli = Cli::try_parse_from([
            "tm-remote-build",
            "load",
            "folder",
            "MyPlugin",
            "-o",
            "Openplanet4",
            "--plugin-src",
            "app",
            "-l",
            "5",
            "-i",
            "0.5",
        ])
        .unwrap();

        let Commands::Load {
            plugin_type,
            target,
            plugin_src,
            watch,
        } = cli.command
        else {
            panic!("expected load");
        };
        assert!(matches!(plugin_type, SourceKind::Folder));
        assert!(matches!(plugin_src, SourceLocation::App));
        assert_eq!(target.plugin_id, "MyPlugin");
        assert_eq!(target.openplanet, Some(Openplanet::Openplanet4));
        assert_eq!(watch.log_done_limit, Some(5));
        assert_eq!(watch.log_check_interval, Some(0.5));
    }

    #[test]
    fn test_port_and_openplanet_conflict() {
        let result = Cli::try_parse_from([
            "tm-remote-build",
            "unload",
            "MyPlugin",
            "-p",
            "30000",
            "-o",
            "OpenplanetNext",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_openplanet_rejected() {
        let result = Cli::try_parse_from(["tm-remote-build", "unload", "MyPlugin", "-o", "Nope"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_getlogs() {
        let cli = Cli::try_parse_from([
            "tm-remote-build",
            "getlogs",
            "MyPlugin",
            "-p",
            "30000",
            "-b",
            "2048",
            "-v",
        ])
        .unwrap();

        assert!(cli.command.target().verbose);
        let Commands::GetLogs { back, target, .. } = cli.command else {
            panic!("expected getlogs");
        };
        assert_eq!(back, 2048);
        assert_eq!(target.port, Some(30000));
    }

    fn parse_target(args: &[&str]) -> Cli {
        let mut argv = vec!["tm-remote-build", "load", "zip", "MyPlugin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn overrides(cli: &Cli, config: Config) -> Config {
        let Commands::Load { target, watch, .. } = &cli.command else {
            panic!("expected load");
        };
        apply_overrides(config, target, Some(watch))
    }

    #[test]
    fn test_openplanet_flag_replaces_config_port() {
        let file_config = Config {
            port: Some(1),
            ..Config::default()
        };
        let cli = parse_target(&["-o", "OpenplanetTurbo"]);

        let config = overrides(&cli, file_config);

        assert_eq!(config.port, None);
        assert_eq!(config.resolved_port(), Some(30002));
    }

    #[test]
    fn test_config_values_kept_without_flags() {
        let file_config = Config {
            host: "10.0.0.2".to_string(),
            port: Some(31000),
            op_dir: Some(PathBuf::from("/games/op")),
            log_done_limit: 7,
            log_check_interval: 0.2,
            ..Config::default()
        };
        let cli = parse_target(&[]);

        let config = overrides(&cli, file_config.clone());

        assert_eq!(config, file_config);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_flags_override_config_values() {
        let cli = parse_target(&[
            "--host",
            "192.168.0.9",
            "-p",
            "30001",
            "-d",
            "/tmp/op",
            "-l",
            "1",
            "-i",
            "0.5",
        ]);

        let config = overrides(&cli, Config::default());

        assert_eq!(config.host, "192.168.0.9");
        assert_eq!(config.resolved_port(), Some(30001));
        assert_eq!(config.op_dir, Some(PathBuf::from("/tmp/op")));
        assert_eq!(config.log_done_limit, 1);
        assert_eq!(config.log_check_interval, 0.5);
    }
}
