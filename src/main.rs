#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

use std::env;
use std::process;

use alphablocks::application::cli;
use alphablocks::application::cli::ReplayOptions;
use alphablocks::application::replay::Replay;
use alphablocks::configuration::Config;
use alphablocks::configuration::ConfigKey;
use alphablocks::domain::models::WidgetConfig;
use alphablocks::domain::services::WidgetController;
use alphablocks::infrastructure::backends::BackendManager;
use alphablocks::infrastructure::page::Page;
use anyhow::Error;
use anyhow::Result;
use tokio::fs;
use tokio::io;
use tokio::io::BufReader;

fn handle_error(err: Error) {
    eprintln!(
        "AlphaBlocks has failed with the following app version and error.\n\nVersion: {}\nError: {}",
        env!("CARGO_PKG_VERSION"),
        err
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

fn optional(key: ConfigKey) -> Option<String> {
    let val = Config::get(key);
    if val.is_empty() {
        return None;
    }

    return Some(val);
}

fn widget_config() -> WidgetConfig {
    return WidgetConfig {
        theme: optional(ConfigKey::Theme),
        name: optional(ConfigKey::Name),
        avatar: optional(ConfigKey::Avatar),
        bg_color: optional(ConfigKey::BgColor),
        text_color: optional(ConfigKey::TextColor),
        ..WidgetConfig::new(&Config::get(ConfigKey::Token))
    };
}

async fn replay(opts: ReplayOptions) -> Result<()> {
    let page = Page::new(
        &Config::get(ConfigKey::PageURL),
        Config::get_u32(ConfigKey::ViewportWidth),
        Config::get_u32(ConfigKey::ViewportHeight),
    );
    let controller = WidgetController::new(widget_config(), page, BackendManager::get())?;
    let mut replay = Replay::new(controller);
    let mut stdout = io::stdout();

    match opts.transcript {
        Some(path) => {
            let file = fs::File::open(path).await?;
            replay.run(BufReader::new(file), &mut stdout).await?;
        }
        None => {
            replay.run(BufReader::new(io::stdin()), &mut stdout).await?;
        }
    }

    return Ok(());
}

#[tokio::main]
async fn main() {
    better_panic::install();

    let debug_log_dir = env::var("ALPHABLOCKS_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("alphablocks")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("alphablocks")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let opts = match cli::parse().await {
        Ok(Some(opts)) => opts,
        Ok(None) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    if let Err(err) = replay(opts).await {
        handle_error(err);
    }
}
