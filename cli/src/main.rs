use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use frames::{DecodePolicy, Message};
use session::{Session, SessionConfig, SessionError, Transport, TransportError};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::DecodeError),
    #[error("invalid hex input: {0}")]
    InvalidHex(String),
    #[error("text payload required for text messages")]
    MissingText,
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "tagwire", about = "Tagged-frame WebSocket session client")]
struct Cli {
    /// Peer URL; overrides `TAGWIRE_URL`.
    #[arg(long)]
    url: Option<String>,

    /// Accept trailing bytes on ping/close frames.
    #[arg(long, default_value_t = false)]
    lenient: bool,

    /// Decode `[tag, stream_id, data..]` frames from multiplexer clients.
    #[arg(long, default_value_t = false, conflicts_with = "lenient")]
    legacy: bool,

    /// Receive deadline in milliseconds; overrides `TAGWIRE_RECV_TIMEOUT_MS`.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Keep the connection open after a malformed inbound frame.
    #[arg(long, default_value_t = false)]
    keep_open_on_malformed: bool,

    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send ping, "A", "B", "CD", close.
    Demo,
    Send(SendArgs),
    Listen(ListenArgs),
    /// Print the wire bytes of a message as hex.
    Encode(EncodeArgs),
    /// Decode hex wire bytes into a message.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(required = true)]
    texts: Vec<String>,

    /// Send a ping before the first text.
    #[arg(long, default_value_t = false)]
    ping: bool,

    /// Skip the trailing close message; only the transport is shut down.
    #[arg(long, default_value_t = false)]
    no_close: bool,
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Stop after this many messages.
    #[arg(long)]
    max: Option<usize>,

    /// Print messages as JSON lines.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Wait without a receive deadline.
    #[arg(long, default_value_t = false)]
    wait: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[arg(value_enum)]
    kind: MessageKind,

    text: Option<String>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Hex bytes, whitespace allowed, e.g. `01 43 44`.
    #[arg(required = true)]
    hex: Vec<String>,

    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MessageKind {
    Ping,
    Text,
    Close,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = session_config(&cli);

    match cli.command {
        Command::Demo => run_demo(&config).await,
        Command::Send(args) => run_send(&config, args).await,
        Command::Listen(args) => run_listen(&config, args).await,
        Command::Encode(args) => run_encode(&args),
        Command::Decode(args) => run_decode(&args, config.decode_policy),
    }
}

fn session_config(cli: &Cli) -> SessionConfig {
    let mut config = SessionConfig::from_env();
    if let Some(url) = &cli.url {
        config.url.clone_from(url);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.recv_timeout = Duration::from_millis(timeout_ms);
    }
    if cli.lenient {
        config.decode_policy = DecodePolicy::Lenient;
    }
    if cli.legacy {
        config.decode_policy = DecodePolicy::Legacy;
    }
    if cli.keep_open_on_malformed {
        config.close_on_malformed = false;
    }
    config
}

// =============================================================================
// ONLINE COMMANDS
// =============================================================================

async fn run_demo(config: &SessionConfig) -> Result<(), CliError> {
    let mut session = Session::connect(config).await?;
    send_demo(&mut session).await?;
    session.close().await?;
    info!(url = %config.url, "demo sequence sent");
    Ok(())
}

async fn send_demo<T: Transport>(session: &mut Session<T>) -> Result<(), TransportError> {
    session.send_all(&demo_messages()).await
}

fn demo_messages() -> Vec<Message> {
    vec![
        Message::Ping,
        Message::text("A"),
        Message::text("B"),
        Message::text("CD"),
        Message::Close,
    ]
}

async fn run_send(config: &SessionConfig, args: SendArgs) -> Result<(), CliError> {
    let messages = send_messages(&args);
    let mut session = Session::connect(config).await?;
    session.send_all(&messages).await?;

    if args.no_close {
        session.into_inner().close().await?;
    } else {
        session.close().await?;
    }
    info!(count = messages.len(), close = !args.no_close, "messages sent");
    Ok(())
}

fn send_messages(args: &SendArgs) -> Vec<Message> {
    let mut messages = Vec::with_capacity(args.texts.len() + 1);
    if args.ping {
        messages.push(Message::Ping);
    }
    messages.extend(args.texts.iter().map(|text| Message::text(text.as_bytes())));
    messages
}

async fn run_listen(config: &SessionConfig, args: ListenArgs) -> Result<(), CliError> {
    let mut session = Session::connect(config).await?;
    let received = listen_then_close(&mut session, &args).await?;
    info!(received, "listen finished");
    Ok(())
}

/// Run [`listen`], then always finish the close handshake. A failed close is
/// logged so it cannot mask the listen result.
async fn listen_then_close<T: Transport>(
    session: &mut Session<T>,
    args: &ListenArgs,
) -> Result<usize, CliError> {
    let received = listen(session, args).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "close after listen failed");
    }
    received
}

async fn listen<T: Transport>(session: &mut Session<T>, args: &ListenArgs) -> Result<usize, CliError> {
    let mut received = 0_usize;
    while session.is_open() && args.max.is_none_or(|max| received < max) {
        let next = if args.wait {
            session.recv().await
        } else {
            session.recv_next().await
        };
        let message = match next {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(SessionError::Decode(e)) if session.is_open() => {
                warn!(error = %e, "skipping malformed frame");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        println!("{}", render(&message, args.json)?);
        received = received.saturating_add(1);
    }
    Ok(received)
}

// =============================================================================
// OFFLINE COMMANDS
// =============================================================================

fn run_encode(args: &EncodeArgs) -> Result<(), CliError> {
    let message = build_message(args.kind, args.text.as_deref())?;
    println!("{}", to_hex(&frames::encode_frame(&message)));
    Ok(())
}

fn run_decode(args: &DecodeArgs, policy: DecodePolicy) -> Result<(), CliError> {
    let bytes = parse_hex(&args.hex.join(" "))?;
    let message = frames::decode_frame_with(&bytes, policy)?;
    println!("{}", render(&message, args.json)?);
    Ok(())
}

fn build_message(kind: MessageKind, text: Option<&str>) -> Result<Message, CliError> {
    match kind {
        MessageKind::Ping => Ok(Message::Ping),
        MessageKind::Close => Ok(Message::Close),
        MessageKind::Text => text
            .map(|text| Message::text(text.as_bytes()))
            .ok_or(CliError::MissingText),
    }
}

fn render(message: &Message, json: bool) -> Result<String, CliError> {
    if json {
        return Ok(serde_json::to_string(message)?);
    }
    Ok(match message.text_lossy() {
        Some(text) => format!("text {text:?}"),
        None if message.is_close() => "close".to_owned(),
        None => "ping".to_owned(),
    })
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_hex(raw: &str) -> Result<Vec<u8>, CliError> {
    let digits = raw
        .split_whitespace()
        .map(|part| {
            part.strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part)
        })
        .collect::<String>();
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(CliError::InvalidHex(format!("non-hex character `{bad}` in `{raw}`")));
    }
    if !digits.len().is_multiple_of(2) {
        return Err(CliError::InvalidHex(format!("odd number of digits in `{raw}`")));
    }

    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|_| CliError::InvalidHex(raw.to_owned()))?;
            u8::from_str_radix(pair, 16).map_err(|_| CliError::InvalidHex(format!("bad byte `{pair}`")))
        })
        .collect()
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
