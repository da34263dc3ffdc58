// lib/src/notifications/mod.rs
//! Outbound e-mail. Services enqueue messages; a background worker delivers
//! them through an `EmailTransport`, retrying with exponential backoff.

pub mod templates;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use models::MedResult;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EmailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync + 'static {
    async fn send(&self, from: &str, message: &EmailMessage) -> MedResult<()>;
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, from: &str, message: &EmailMessage) -> MedResult<()> {
        info!(from, to = %message.to, subject = %message.subject, "email delivered to log transport");
        debug!(body = %message.body);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DeliveryStats {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Handle used by services to queue mail. Cheap to clone.
#[derive(Clone)]
pub struct Mailer {
    sender: mpsc::Sender<EmailMessage>,
    stats: Arc<DeliveryStats>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer").field("stats", &self.stats.snapshot()).finish()
    }
}

impl Mailer {
    /// Starts the delivery worker. It runs until every `Mailer` clone is
    /// dropped and the queue has drained.
    pub fn spawn(transport: Arc<dyn EmailTransport>, config: EmailConfig) -> (Mailer, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<EmailMessage>(config.queue_capacity.max(1));
        let stats = Arc::new(DeliveryStats::default());
        let worker_stats = stats.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                if deliver(transport.as_ref(), &config, &message).await {
                    worker_stats.sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            debug!("mail worker stopped");
        });

        (Mailer { sender, stats }, handle)
    }

    /// Queues a message without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, message: EmailMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(to = %message.to, subject = %message.subject, "mail queue full, dropping message");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(message)) => {
                warn!(to = %message.to, "mail worker is gone, dropping message");
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }
}

async fn deliver(transport: &dyn EmailTransport, config: &EmailConfig, message: &EmailMessage) -> bool {
    let mut attempt: u32 = 0;
    loop {
        match transport.send(&config.from_address, message).await {
            Ok(()) => return true,
            Err(e) if attempt < config.max_retries => {
                let delay = Duration::from_millis(config.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16)));
                warn!(to = %message.to, attempt = attempt + 1, ?delay, "email delivery failed: {}", e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(to = %message.to, subject = %message.subject, "giving up on email after {} attempts: {}", attempt + 1, e);
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::MedError;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Mutex;

    /// Fails the first `failures` sends, then records deliveries.
    #[derive(Default)]
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailTransport for FlakyTransport {
        async fn send(&self, _from: &str, message: &EmailMessage) -> MedResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(MedError::InternalError("smtp unavailable".into()));
            }
            self.delivered.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn config(max_retries: u32, queue_capacity: usize) -> EmailConfig {
        EmailConfig { from_address: "noreply@test.local".into(), max_retries, retry_backoff_ms: 1, queue_capacity }
    }

    fn message(n: usize) -> EmailMessage {
        EmailMessage { to: format!("user{n}@test.local"), subject: "hello".into(), body: "body".into() }
    }

    #[tokio::test]
    async fn retries_until_delivered() {
        let transport = Arc::new(FlakyTransport { failures: 2, ..Default::default() });
        let (mailer, handle) = Mailer::spawn(transport.clone(), config(3, 8));
        assert!(mailer.enqueue(message(1)));
        let stats = mailer.stats.clone();
        drop(mailer);
        handle.await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(transport.delivered.lock().await.len(), 1);
        assert_eq!(stats.snapshot(), DeliverySnapshot { sent: 1, failed: 0, dropped: 0 });
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let transport = Arc::new(FlakyTransport { failures: u32::MAX, ..Default::default() });
        let (mailer, handle) = Mailer::spawn(transport.clone(), config(2, 8));
        mailer.enqueue(message(1));
        let stats = mailer.stats.clone();
        drop(mailer);
        handle.await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(stats.snapshot().failed, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_instead_of_blocking() {
        let transport = Arc::new(FlakyTransport::default());
        let (mailer, handle) = Mailer::spawn(transport.clone(), config(0, 1));
        // The worker cannot run before we yield on a current-thread runtime.
        assert!(mailer.enqueue(message(1)));
        assert!(!mailer.enqueue(message(2)));
        assert_eq!(mailer.stats().dropped, 1);
        drop(mailer);
        handle.await.unwrap();
        assert_eq!(transport.delivered.lock().await.len(), 1);
    }
}
