use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::transport::{
    ClientMessage, Connection, LiveSetup, PendingConnection, ServerMessage, Transport,
    TransportEvent, OUTBOUND_CAPACITY,
};

/// Subject the client publishes to (setup + realtime input)
pub fn input_subject(session_id: &str) -> String {
    format!("live.{}.input", session_id)
}

/// Subject the agent publishes to (setup ack + server content)
pub fn output_subject(session_id: &str) -> String {
    format!("live.{}.output", session_id)
}

/// Remote stream carried over NATS subjects, one pair per session
pub struct NatsTransport {
    url: String,
}

impl NatsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    async fn open(&self, setup: LiveSetup) -> Result<PendingConnection> {
        let session_id = uuid::Uuid::new_v4().to_string();
        info!("Connecting to NATS at {} (session {})", self.url, session_id);

        let client = async_nats::connect(self.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        // Subscribe before sending setup so the acknowledgment can't be missed
        let mut subscriber = client
            .subscribe(output_subject(&session_id))
            .await
            .context("Failed to subscribe to agent output")?;

        let input = input_subject(&session_id);
        publish(&client, &input, &ClientMessage::Setup(setup))
            .await
            .context("Failed to send setup")?;

        info!("Setup sent on {}", input);

        let (event_tx, event_rx) = mpsc::channel(256);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(OUTBOUND_CAPACITY);

        let reader_tx = event_tx.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let events = match serde_json::from_slice::<ServerMessage>(&msg.payload) {
                    Ok(message) => TransportEvent::from_server_message(message),
                    Err(e) => {
                        warn!("Failed to parse agent message: {}", e);
                        continue;
                    }
                };
                for event in events {
                    if reader_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            debug!("Agent output subscription ended");
            let _ = reader_tx
                .send(TransportEvent::Closed(Some("subscription ended".to_string())))
                .await;
        });

        let writer_client = client.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = publish(&writer_client, &input, &message).await {
                    error!("Failed to publish to {}: {:#}", input, e);
                    let _ = event_tx.send(TransportEvent::Error(format!("{:#}", e))).await;
                    break;
                }
            }
        });

        Ok(PendingConnection {
            outbound: outbound_tx,
            events: event_rx,
            connection: Box::new(NatsConnection {
                client: Some(client),
                reader,
                writer,
            }),
        })
    }
}

async fn publish(client: &Client, subject: &str, message: &ClientMessage) -> Result<()> {
    let payload = serde_json::to_vec(message)?;
    client
        .publish(subject.to_string(), payload.into())
        .await
        .context("Failed to publish message")?;
    Ok(())
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn connect(&self, setup: LiveSetup) -> Result<PendingConnection, SessionError> {
        self.open(setup)
            .await
            .map_err(|e| SessionError::Transport(format!("{:#}", e)))
    }

    fn name(&self) -> &str {
        "NATS"
    }
}

struct NatsConnection {
    client: Option<Client>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

#[async_trait::async_trait]
impl Connection for NatsConnection {
    async fn close(&mut self) -> Result<()> {
        self.reader.abort();
        self.writer.abort();

        if let Some(client) = self.client.take() {
            info!("Closing NATS connection");
            client.flush().await.context("Failed to flush NATS connection")?;
            // async-nats closes the connection once the last client handle drops
        }

        Ok(())
    }
}

impl Drop for NatsConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
