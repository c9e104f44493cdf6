use std::sync::Arc;

use anyhow::Result;
use clap::Arg;
use clap::ArgAction;
use clap::Command;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::SessionSummary;
use crate::infrastructure::api::HistoryLoader;
use crate::infrastructure::api::TransportClient;

fn build() -> Command {
    return Command::new("palaver")
        .about("Terminal client for a streaming chat service")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new(ConfigKey::ApiURL.to_string())
                .long("api-url")
                .env("PALAVER_API_URL")
                .help("Base address of the chat API")
                .num_args(1),
        )
        .arg(
            Arg::new(ConfigKey::SessionID.to_string())
                .long("session-id")
                .env("PALAVER_SESSION_ID")
                .help("Session to resume. Created lazily on first use")
                .num_args(1),
        )
        .arg(
            Arg::new(ConfigKey::RequestTimeout.to_string())
                .long("request-timeout")
                .env("PALAVER_REQUEST_TIMEOUT")
                .help("Request timeout in milliseconds")
                .num_args(1),
        )
        .arg(
            Arg::new(ConfigKey::MaxRetries.to_string())
                .long("max-retries")
                .env("PALAVER_MAX_RETRIES")
                .help("Retry budget for failed requests")
                .num_args(1),
        )
        .arg(
            Arg::new(ConfigKey::RetryBackoff.to_string())
                .long("retry-backoff")
                .env("PALAVER_RETRY_BACKOFF")
                .help("Backoff unit in milliseconds. The Nth retry waits N units")
                .num_args(1),
        )
        .arg(
            Arg::new(ConfigKey::Username.to_string())
                .long("username")
                .env("PALAVER_USERNAME")
                .help("Label shown for your own messages")
                .num_args(1),
        )
        .arg(
            Arg::new("no-stream")
                .long("no-stream")
                .help("Wait for each full reply instead of streaming it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sessions")
                .long("sessions")
                .help("List sessions on the server and exit")
                .action(ArgAction::SetTrue),
        );
}

fn format_session(session: &SessionSummary) -> String {
    let mut res = format!(
        "- (ID: {id}) {timestamp}, {count} messages",
        id = session.id,
        timestamp = session.timestamp,
        count = session.message_count
    );

    if !session.title.is_empty() {
        let mut title = session.title.to_string();
        if title.len() >= 70 {
            title = format!("{}...", &title[..67]);
        }
        res = format!("{res}, {title}");
    }

    return res;
}

async fn print_sessions_list() -> Result<()> {
    let transport = Arc::new(TransportClient::from_config());
    let sessions = HistoryLoader::new(transport)
        .sessions()
        .await?
        .iter()
        .map(|session| {
            return format_session(session);
        })
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

/// Loads configuration from defaults, environment, and flags. Returns false
/// when a one-shot command already handled the invocation.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();
    Config::load(&matches);

    if matches.get_flag("no-stream") {
        Config::set(ConfigKey::NoStream, "true");
    }

    if matches.get_flag("sessions") {
        print_sessions_list().await?;
        return Ok(false);
    }

    return Ok(true);
}
