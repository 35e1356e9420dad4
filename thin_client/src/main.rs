use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use clap::Parser;
use color_eyre::Result;
use futures_util::{SinkExt, StreamExt};
use realm_proto::{decode_server_message, encode_command, ClientCommand};
use realm_sync::{load_client_config, ClientContext};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

mod app;
mod ui;

use app::{channel, AutoLogin, NetEvent, RealmApp};

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Realm terminal thin client", long_about = None)]
struct Cli {
    /// WebSocket URL of the game authority. Overrides the config file.
    #[arg(long)]
    endpoint: Option<String>,
    /// Client configuration JSON. Falls back to REALM_CLIENT_CONFIG_PATH, then built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log in automatically with this name after every connect.
    #[arg(long, requires = "password")]
    name: Option<String>,
    #[arg(long, requires = "name")]
    password: Option<String>,
}

/// Why a connection ended.
enum SessionEnd {
    Closed(String),
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    let log_writer_tx = log_tx.clone();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_writer_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let (mut config, source) = load_client_config(cli.config.as_deref());
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    info!(endpoint = %config.endpoint, ?source, "Connecting to realm authority");

    let endpoint = config.endpoint.clone();
    let reconnect_delay = config.reconnect_delay();
    let (event_tx, event_rx) = channel(config.inbound_capacity);
    let (command_tx, mut command_rx) = unbounded_channel::<ClientCommand>();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let auto_login = cli
        .name
        .zip(cli.password)
        .map(|(name, password)| AutoLogin { name, password });

    let context = ClientContext::new(config);
    let _ui_handle = std::thread::spawn(move || -> color_eyre::Result<()> {
        let app = RealmApp::new(context, event_rx, command_tx, shutdown_tx, log_rx, auto_login)?;
        app.run()
    });

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("Client requested shutdown");
            break;
        }
        match connect_async(endpoint.as_str()).await {
            Ok((stream, _response)) => {
                // Commands typed while offline target a session that no longer exists.
                while command_rx.try_recv().is_ok() {}
                if event_tx.send(NetEvent::Connected).await.is_err() {
                    break;
                }
                info!("Connected. Press 'q' to exit.");
                match pump_session(stream, &event_tx, &mut command_rx).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Closed(reason) => {
                        if event_tx.send(NetEvent::Disconnected(reason)).await.is_err() {
                            break;
                        }
                        info!("Reconnecting in {:?}...", reconnect_delay);
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            }
            Err(err) => {
                warn!("Failed to connect: {}", err);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }

    Ok(())
}

async fn pump_session<S>(
    stream: S,
    events: &tokio::sync::mpsc::Sender<NetEvent>,
    commands: &mut UnboundedReceiver<ClientCommand>,
) -> SessionEnd
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Closed("connection closed by authority".into())
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => return SessionEnd::Closed(err.to_string()),
                };
                match decode_server_message(&text) {
                    Ok(message) => {
                        trace!(tag = message.tag(), "frame.received");
                        if events.send(NetEvent::Message(message)).await.is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    Err(err) => warn!(%err, "frame.malformed"),
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    return SessionEnd::Shutdown;
                };
                let text = match encode_command(&command) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(action = command.action(), %err, "command.encode_failed");
                        continue;
                    }
                };
                if let Err(err) = write.send(Message::Text(text)).await {
                    return SessionEnd::Closed(err.to_string());
                }
                debug!(action = command.action(), "command.sent");
            }
        }
    }
}
