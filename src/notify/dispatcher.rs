use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::json;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const MAX_PENDING: usize = 20;

/// Chat webhook target. Messages are posted as `{"content": ...}`.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build webhook client")?;

        Ok(Self { client, url })
    }

    /// The webhook answers GET with its own description once it is usable
    async fn verify(&self) -> Result<()> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("webhook not reachable: status {}", response.status()));
        }
        Ok(())
    }

    async fn post(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "content": message }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("webhook rejected message: status {}: {}", status, body));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum NotifySink {
    /// Write messages to the log only; always ready
    Log,
    Webhook(WebhookSink),
}

impl NotifySink {
    async fn connect(&self) -> Result<()> {
        match self {
            NotifySink::Log => Ok(()),
            NotifySink::Webhook(sink) => sink.verify().await,
        }
    }

    async fn send(&self, message: &str) -> Result<()> {
        match self {
            NotifySink::Log => {
                info!("\n{}", message);
                Ok(())
            }
            NotifySink::Webhook(sink) => sink.post(message).await,
        }
    }
}

/// Delivery state. Messages produced before the channel is usable wait in
/// `pending`, oldest dropped first once the buffer is full.
#[derive(Debug, Default)]
pub struct NotifierState {
    pub ready: bool,
    pub pending: VecDeque<String>,
}

impl NotifierState {
    fn buffer(&mut self, message: String) {
        if self.pending.len() == MAX_PENDING {
            self.pending.pop_front();
            warn!("Pending notification buffer full, dropping oldest message");
        }
        self.pending.push_back(message);
    }
}

pub struct Dispatcher {
    sink: NotifySink,
    state: Mutex<NotifierState>,
}

impl Dispatcher {
    pub fn new(sink: NotifySink) -> Self {
        Self {
            sink,
            state: Mutex::new(NotifierState::default()),
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.ready
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Check the channel and, once usable, flush anything buffered.
    pub async fn mark_ready(&self) -> bool {
        let mut state = self.state.lock().await;
        self.ensure_ready(&mut state).await
    }

    /// Send now if the channel is ready, otherwise hold the message until it is.
    /// Delivery failures are logged and never propagate to the caller.
    pub async fn deliver(&self, message: String) {
        let mut state = self.state.lock().await;

        if !self.ensure_ready(&mut state).await {
            debug!("Notification channel not ready, buffering message");
            state.buffer(message);
            return;
        }

        if let Err(e) = self.sink.send(&message).await {
            error!("Failed to send notification: {}", e);
        }
    }

    async fn ensure_ready(&self, state: &mut NotifierState) -> bool {
        if !state.ready {
            match self.sink.connect().await {
                Ok(()) => {
                    info!("Notification channel ready");
                    state.ready = true;
                }
                Err(e) => {
                    warn!("Notification channel unavailable: {}", e);
                    return false;
                }
            }
        }

        while let Some(message) = state.pending.pop_front() {
            if let Err(e) = self.sink.send(&message).await {
                error!("Failed to send pending notification: {}", e);
            }
        }
        true
    }
}
