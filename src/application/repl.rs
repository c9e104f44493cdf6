use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::signal;

use crate::domain::models::Message;
use crate::domain::models::StreamEvent;
use crate::domain::services::SessionController;

async fn print_message(stdout: &mut tokio::io::Stdout, message: &Message) -> Result<()> {
    let author = message.author.to_string();
    stdout
        .write_all(format!("{author}: {content}\n", content = message.content).as_bytes())
        .await?;

    return Ok(());
}

/// Drives one controller from stdin: reads a line, sends it, and prints the
/// reply's fragments as they arrive. Ctrl+C during a reply cancels the
/// stream and keeps whatever was already printed.
pub async fn start(controller: &mut SessionController, no_stream: bool) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    controller.load_history().await;
    if let Some(err) = controller.last_error() {
        stdout
            .write_all(format!("Could not load history: {err}\n").as_bytes())
            .await?;
    }
    for message in controller.messages().to_vec() {
        print_message(&mut stdout, &message).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let text = line.trim().to_string();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" || text == "/exit" || text == "/q" {
            break;
        }

        if no_stream {
            if let Err(err) = controller.send_plain(&text).await {
                stdout.write_all(format!("Error: {err}\n").as_bytes()).await?;
                continue;
            }
            if let Some(message) = controller.messages().last() {
                let message = message.clone();
                print_message(&mut stdout, &message).await?;
            }
            continue;
        }

        if !controller.send_message(&text) {
            continue;
        }

        loop {
            let mut interrupted = false;
            let next = tokio::select! {
                _ = signal::ctrl_c() => {
                    interrupted = true;
                    None
                }
                event = controller.next_event() => event,
            };

            if interrupted {
                controller.cancel();
                stdout.write_all(b"\n(cancelled)\n").await?;
                break;
            }

            let event = match next {
                Some(event) => event,
                None => break,
            };

            let done = matches!(event, StreamEvent::Done | StreamEvent::Failed(_));
            if let StreamEvent::Fragment(fragment) = &event {
                stdout.write_all(fragment.as_bytes()).await?;
                stdout.flush().await?;
            }
            controller.handle_event(event);
            if done {
                break;
            }
        }

        if let Some(err) = controller.last_error() {
            stdout
                .write_all(format!("\nError: {err}\n").as_bytes())
                .await?;
        } else {
            stdout.write_all(b"\n").await?;
        }
    }

    return Ok(());
}
