use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

/// What the harness should do once the command line has been handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Reads stdin when absent.
    pub transcript: Option<path::PathBuf>,
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        )
        .subcommand(
            Command::new("keys").about("List all config keys as strings.")
        );
}

fn arg_transcript() -> Arg {
    return Arg::new("transcript")
        .long("transcript")
        .env("ALPHABLOCKS_TRANSCRIPT")
        .num_args(1)
        .help("JSON lines file of host steps and iframe messages to replay. Reads stdin when omitted.");
}

fn subcommand_replay() -> Command {
    return Command::new("replay")
        .about("Replays a transcript against an in-memory host page and prints every message sent to the assistant iframe.")
        .arg(arg_transcript());
}

fn arg_config(key: ConfigKey, env: &str, help: &str) -> Arg {
    let default = Config::default(key);
    let help = if default.is_empty() {
        help.to_string()
    } else {
        format!("{help} [default: {default}]")
    };

    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env.to_string())
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("alphablocks")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_config())
        .subcommand(subcommand_replay())
        .arg(arg_transcript())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("ALPHABLOCKS_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            arg_config(ConfigKey::Token, "ALPHABLOCKS_TOKEN", "Access token of the assistant to embed.")
                .short('t'),
        )
        .arg(arg_config(
            ConfigKey::Theme,
            "ALPHABLOCKS_THEME",
            "Theme passed to the assistant iframe.",
        ))
        .arg(arg_config(
            ConfigKey::Name,
            "ALPHABLOCKS_NAME",
            "Assistant display name shown on the chat pill.",
        ))
        .arg(arg_config(
            ConfigKey::Avatar,
            "ALPHABLOCKS_AVATAR",
            "Avatar image URL shown on the chat pill.",
        ))
        .arg(arg_config(
            ConfigKey::BgColor,
            "ALPHABLOCKS_BG_COLOR",
            "Chat pill background color.",
        ))
        .arg(arg_config(
            ConfigKey::TextColor,
            "ALPHABLOCKS_TEXT_COLOR",
            "Chat pill label color.",
        ))
        .arg(arg_config(
            ConfigKey::ApiURL,
            "ALPHABLOCKS_API_URL",
            "AlphaBlocks backend URL for assistant details and end user lookups.",
        ))
        .arg(arg_config(
            ConfigKey::ChatbotURL,
            "ALPHABLOCKS_CHATBOT_URL",
            "URL the assistant iframe is served from. Outbound messages are scoped to its origin.",
        ))
        .arg(arg_config(
            ConfigKey::StorefrontURL,
            "ALPHABLOCKS_STOREFRONT_URL",
            "Storefront hosting the cart API.",
        ))
        .arg(arg_config(
            ConfigKey::PageURL,
            "ALPHABLOCKS_PAGE_URL",
            "Location of the simulated host page.",
        ))
        .arg(arg_config(
            ConfigKey::ViewportWidth,
            "ALPHABLOCKS_VIEWPORT_WIDTH",
            "Inner width of the simulated host window.",
        ))
        .arg(arg_config(
            ConfigKey::ViewportHeight,
            "ALPHABLOCKS_VIEWPORT_HEIGHT",
            "Inner height of the simulated host window.",
        ));
}

fn replay_options(matches: &ArgMatches) -> ReplayOptions {
    return ReplayOptions {
        transcript: matches
            .get_one::<String>("transcript")
            .map(path::PathBuf::from),
    };
}

pub async fn parse() -> Result<Option<ReplayOptions>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
            }
            Some(("keys", _)) => {
                println!("{}", ConfigKey::VARIANTS.join("\n"));
            }
            _ => {
                subcommand_config().print_long_help()?;
            }
        },
        Some(("replay", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            return Ok(Some(replay_options(subcmd_matches)));
        }
        _ => {
            Config::load(build(), vec![&matches]).await?;
            return Ok(Some(replay_options(&matches)));
        }
    }

    return Ok(None);
}
