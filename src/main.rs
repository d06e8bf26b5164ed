use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, Command};
use spotconnectd::auth::blob::decode_encrypted_auth_blob;
use spotconnectd::codec::messages::DeviceInfoWire;
use spotconnectd::config::{default_config_path, DeviceConfig};
use spotconnectd::{logging, Session, SessionConfig};
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("spotconnectd")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Client-side control plane for a Spotify Connect speaker")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to the device config file (default: ~/.config/spotconnectd/config.yml)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("Overrides the advertised device name"),
        )
        .arg(
            Arg::new("bitrate")
                .long("bitrate")
                .value_name("KBPS")
                .help("Overrides the advertised audio bitrate"),
        )
        .arg(
            Arg::new("zeroconf-port")
                .long("zeroconf-port")
                .value_name("PORT")
                .help("Port the zeroconf hand-off HTTP listener binds to (owned by the embedder, not this crate)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increases log verbosity; repeat for more (-vv, -vvv)"),
        )
}

fn log_level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let verbosity = matches.get_count("verbose");
    logging::init(log_level_for(verbosity), None).context("initializing logger")?;

    let config_path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };

    let mut config = if config_path.exists() {
        DeviceConfig::load(&config_path)?
    } else {
        DeviceConfig::default()
    };

    if let Some(name) = matches.get_one::<String>("name") {
        config.device_name = name.clone();
    }
    if let Some(bitrate) = matches.get_one::<String>("bitrate") {
        config.bitrate = bitrate
            .parse()
            .context("--bitrate must be a positive integer")?;
    }
    config.save(&config_path)?;

    let Some(blob_b64) = &config.encrypted_auth_blob else {
        bail!(
            "no credential on file at {}; pair this device via the zeroconf hand-off first",
            config_path.display()
        );
    };
    let auth_blob = decode_encrypted_auth_blob(&config.device_id, &config.username, blob_b64)
        .context("decoding persisted credential blob")?;

    let session = Session::new(SessionConfig {
        client_id: config.client_id.clone(),
        device_id: config.device_id.clone(),
        username: config.username.clone(),
        country: config.country.clone(),
        auth_blob,
        device: DeviceInfoWire {
            can_play: true,
            volume: 65535,
            name: config.device_name.clone(),
            device_id: config.device_id.clone(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            supported_types: vec!["audio/track".to_string(), "audio/episode".to_string()],
        },
    });

    session.run().await.context("session exited")
}
