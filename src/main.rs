#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::Error;

use crate::application::cli;
use crate::application::repl;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::SessionController;
use crate::infrastructure::api::HistoryLoader;
use crate::infrastructure::api::StreamClient;
use crate::infrastructure::api::TransportClient;

fn handle_error(err: Error) {
    eprintln!(
        "palaver failed with the following error.\n\nVersion: {}\nError: {}",
        env!("CARGO_PKG_VERSION"),
        err
    );

    process::exit(1);
}

#[tokio::main]
async fn main() {
    let debug_log_dir = env::var("PALAVER_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap()
            .join("palaver")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("palaver")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let ready_res = cli::parse().await;
    if let Err(ready_err) = ready_res {
        handle_error(ready_err);
        return;
    }
    if !ready_res.unwrap() {
        process::exit(0);
    }

    let transport = Arc::new(TransportClient::from_config());
    let history = HistoryLoader::new(transport.clone());
    let stream = StreamClient::from_config(transport);
    let mut controller =
        SessionController::new(history, stream, &Config::get(ConfigKey::SessionID));

    let no_stream = Config::get(ConfigKey::NoStream) == "true";
    if let Err(err) = repl::start(&mut controller, no_stream).await {
        handle_error(err);
    }

    process::exit(0);
}
