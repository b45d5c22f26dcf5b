#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiURL,
    Avatar,
    BgColor,
    ChatbotURL,
    ConfigFile,
    Name,
    PageURL,
    StorefrontURL,
    TextColor,
    Theme,
    Token,
    ViewportHeight,
    ViewportWidth,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    /// Numeric keys that fail to parse fall back to their default.
    pub fn get_u32(key: ConfigKey) -> u32 {
        return Config::get(key)
            .parse::<u32>()
            .or_else(|_| return Config::default(key).parse::<u32>())
            .unwrap_or(0);
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join("alphablocks/config.toml");

        let res = match key {
            ConfigKey::ApiURL => "http://localhost:8000".to_string(),
            ConfigKey::ChatbotURL => "http://localhost:3000".to_string(),
            ConfigKey::PageURL => "http://localhost:9292/".to_string(),
            ConfigKey::StorefrontURL => "http://localhost:9292".to_string(),
            ConfigKey::Theme => "light".to_string(),
            ConfigKey::ViewportHeight => "800".to_string(),
            ConfigKey::ViewportWidth => "1280".to_string(),
            ConfigKey::Avatar | ConfigKey::BgColor | ConfigKey::Name | ConfigKey::TextColor => {
                "".to_string()
            }

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
            ConfigKey::Token => "".to_string(),
        };

        return res;
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                let name = key.to_string();
                if let Some(val) = doc.get(&name) {
                    let declared = cmd
                        .get_arguments()
                        .any(|e| return e.get_long() == Some(name.as_str()));
                    if !declared {
                        continue;
                    }

                    if let Some(val_int) = val.as_integer() {
                        if val_int < 0 {
                            bail!(format!(
                                "config.toml has an invalid value for key '{key}': {val_int}"
                            ));
                        }
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        Config::set(key, val_str);
                    } else {
                        bail!(format!(
                            "config.toml has an invalid value for key '{key}', expected a string or integer"
                        ));
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            api_url = Config::get(ConfigKey::ApiURL),
            chatbot_url = Config::get(ConfigKey::ChatbotURL),
            storefront_url = Config::get(ConfigKey::StorefrontURL),
            page_url = Config::get(ConfigKey::PageURL),
            theme = Config::get(ConfigKey::Theme),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let name = key.to_string();
                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(name.as_str()))?;

                let help = arg
                    .get_help()
                    .map(|e| return e.to_string())
                    .unwrap_or_default();
                let description = help.split("[default:").next().unwrap_or("").trim();

                let val = Config::default(key);
                let line = if val.is_empty() {
                    format!("# {key} = \"\"")
                } else if val.parse::<u32>().is_ok() {
                    format!("{key} = {val}")
                } else {
                    format!("{key} = \"{val}\"")
                };

                return Some(format!("# {description}\n{line}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
