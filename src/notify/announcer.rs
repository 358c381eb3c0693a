use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use crate::data::types::{ListingRecord, MarketSnapshot};
use crate::monitoring::logger::CsvLogger;
use crate::notify::dispatcher::Dispatcher;
use crate::notify::format::MessageFormatter;
use crate::tracking::poller::ListingHandler;

/// Turns poller findings into chat messages.
pub struct Announcer {
    formatter: MessageFormatter,
    dispatcher: Arc<Dispatcher>,
    recent_count: usize,
    event_log: Option<Arc<CsvLogger>>,
}

impl Announcer {
    pub fn new(formatter: MessageFormatter, dispatcher: Arc<Dispatcher>, recent_count: usize) -> Self {
        Self {
            formatter,
            dispatcher,
            recent_count,
            event_log: None,
        }
    }

    pub fn with_event_log(mut self, logger: Arc<CsvLogger>) -> Self {
        self.event_log = Some(logger);
        self
    }
}

impl ListingHandler for Announcer {
    async fn on_startup(&self, snapshot: Option<&MarketSnapshot>) {
        let message = self.formatter.startup(snapshot, self.recent_count, Utc::now());
        self.dispatcher.deliver(message).await;
    }

    async fn on_new_listings(&self, listings: &[ListingRecord]) {
        if let Some(logger) = &self.event_log {
            for listing in listings {
                if let Err(e) = logger.log_new_listing(listing) {
                    warn!("Failed to write event log: {:#}", e);
                }
            }
        }

        let message = self.formatter.new_listings(listings, Utc::now());
        self.dispatcher.deliver(message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::dispatcher::{NotifySink, WebhookSink};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn formatter() -> MessageFormatter {
        MessageFormatter::new("https://steamcommunity.com".to_string(), 216150, 1900)
    }

    #[tokio::test]
    async fn test_new_listings_are_posted_and_logged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("events.csv");
        let sink = NotifySink::Webhook(WebhookSink::new(format!("{}/hook", server.uri())).unwrap());
        let announcer = Announcer::new(formatter(), Arc::new(Dispatcher::new(sink)), 5)
            .with_event_log(Arc::new(CsvLogger::new(&log_path).unwrap()));

        announcer
            .on_new_listings(&[ListingRecord::new("Amber Ring").with_sell_price(99)])
            .await;

        let requests = server.received_requests().await.unwrap();
        let post = requests.iter().find(|r| r.method.as_str() == "POST").unwrap();
        let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
        assert!(body["content"].as_str().unwrap().contains("**Amber Ring**: $0.99"));

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("new_listing,Amber Ring,$0.99"));
    }

    #[tokio::test]
    async fn test_startup_buffers_until_channel_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = NotifySink::Webhook(WebhookSink::new(format!("{}/hook", server.uri())).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(sink));
        let announcer = Announcer::new(formatter(), dispatcher.clone(), 5);

        announcer.on_startup(None).await;
        assert_eq!(dispatcher.pending_len().await, 1);
    }
}
