use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use live_voice::{
    create_router, AppState, AudioBackendConfig, AudioBackendFactory, AudioSource, Config,
    JsonFileArchive, LiveClient, LiveSession, NatsTransport, SessionState, StatusUpdate,
    TimedOutput, TranscriptUpdate,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "live-voice")]
#[command(about = "Real-time duplex voice conversation client")]
struct Args {
    /// Config file path (without extension)
    #[arg(short, long, default_value = "config/live-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hold one conversation, streaming a WAV file as the microphone
    Talk {
        /// WAV file used as microphone input
        #[arg(short, long)]
        input: String,
    },
    /// Serve the HTTP control API
    Serve {
        /// WAV file used as microphone input
        #[arg(short, long)]
        input: String,
    },
}

fn build_client(cfg: &Config, input: &str) -> (LiveClient, Arc<JsonFileArchive>) {
    let session_config = cfg.session();

    let input = PathBuf::from(shellexpand::tilde(input).as_ref());
    let microphone = AudioBackendFactory::create(
        AudioSource::File(input),
        AudioBackendConfig {
            target_sample_rate: session_config.input_sample_rate,
            target_channels: session_config.channels,
            buffer_duration_ms: session_config.frame_duration_ms,
        },
    );

    let archive = Arc::new(JsonFileArchive::new(cfg.archive_path()));
    let session = LiveSession::new(
        session_config,
        microphone,
        Box::new(TimedOutput::new()),
        Arc::new(NatsTransport::new(cfg.agent.nats_url.clone())),
        archive.clone(),
    );

    (LiveClient::spawn(session), archive)
}

async fn talk(client: LiveClient) -> Result<()> {
    let mut status = client.subscribe();

    client.start().await.context("Failed to start session")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping session");
                let stats = client.stop().await?;
                info!(
                    "Sent {} frames, scheduled {} chunks, archived: {}",
                    stats.frames_sent,
                    stats.chunks_scheduled,
                    stats.archived_entry.as_deref().unwrap_or("nothing")
                );
                break;
            }
            update = status.recv() => match update {
                Ok(StatusUpdate::Transcript { update }) => print_update(&update),
                Ok(StatusUpdate::State { state: SessionState::Idle, message }) => {
                    info!("Session ended: {}", message);
                    break;
                }
                Ok(StatusUpdate::State { state, message }) => info!("[{}] {}", state, message),
                Ok(StatusUpdate::Activity { message }) => info!("{}", message),
                Err(RecvError::Lagged(n)) => warn!("Missed {} status updates", n),
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

fn print_update(update: &TranscriptUpdate) {
    match update {
        TranscriptUpdate::Opened(m) | TranscriptUpdate::Updated(m) => {
            print!("\r{}: {}", m.speaker, m.text);
            std::io::stdout().flush().ok();
        }
        TranscriptUpdate::Finalized(m) => println!("\r{}: {}", m.speaker, m.text),
        TranscriptUpdate::Discarded { speaker, .. } => println!("\r{}: [interrupted]", speaker),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Live Voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Agent transport: {}", cfg.agent.nats_url);
    info!("Transcript archive: {}", cfg.archive_path().display());

    match args.command {
        Command::Talk { input } => {
            let (client, _archive) = build_client(&cfg, &input);
            talk(client).await?;
        }
        Command::Serve { input } => {
            let (client, archive) = build_client(&cfg, &input);
            let router = create_router(AppState::new(client, archive));

            let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            info!("HTTP server listening on {}", addr);
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
