use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};

// 1. MailerService Contract
/// MailerService
///
/// Defines the abstract contract for out-of-band mail delivery. This trait
/// allows us to swap the concrete implementation, from the real HTTP gateway
/// client (HttpMailClient) in production to the in-memory Mock (MockMailer)
/// during testing, without affecting the calling handlers.
///
/// Delivery is fire-and-forget from the application's perspective: a failure
/// is opaque and propagates as a generic server error, with no retries.
#[async_trait]
pub trait MailerService: Send + Sync {
    /// Delivers a single message to `recipient`.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String>;
}

/// MailerState
///
/// The concrete type used to share the mail service across the application state.
pub type MailerState = Arc<dyn MailerService>;

// 2. The Real Implementation (HTTP mail gateway)
/// HttpMailClient
///
/// Posts messages as JSON to an external mail gateway (MailHog-style in
/// local, a transactional provider in production). The gateway owns queuing,
/// retries and actual SMTP delivery.
#[derive(Clone)]
pub struct HttpMailClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl HttpMailClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl MailerService for HttpMailClient {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String> {
        let message = OutboundMessage {
            to: recipient,
            subject,
            body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("mail gateway returned {}", response.status()));
        }
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// SentMail
///
/// A captured message, inspectable by tests that assert on the confirmation
/// code side-channel.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// MockMailer
///
/// Records every message instead of delivering it. `new_failing()` simulates
/// a gateway outage so handlers' error propagation can be exercised.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    should_fail: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            sent: Arc::default(),
            should_fail: true,
        }
    }

    /// Snapshot of everything "delivered" so far.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailerService for MockMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), String> {
        if self.should_fail {
            return Err("mock mail gateway failure".to_string());
        }
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
