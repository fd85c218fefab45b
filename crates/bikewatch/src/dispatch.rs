//! Post-commit effect dispatch.
//!
//! Effects produced by committed state changes are queued on a bounded
//! channel and delivered by a background task through a [`Notifier`].
//! Enqueueing never blocks the caller, and delivery failures are logged
//! rather than propagated: a notification can be lost, a recovery cannot.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::recovery::Effect;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport refused the message.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The notification has no recipients.
    #[error("no recipients configured")]
    NoRecipients,
}

/// The kind of message being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A bike with a promoted theft alert was recovered.
    PromotedAlertRecovered,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PromotedAlertRecovered => write!(f, "promoted_alert_recovered"),
        }
    }
}

/// A message for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What happened.
    pub kind: NotificationKind,
    /// Who receives it.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// The recovered record.
    pub stolen_record_id: i64,
    /// The promoted alert.
    pub theft_alert_id: i64,
}

impl Notification {
    /// Build the notification for an effect.
    #[must_use]
    pub fn for_effect(effect: &Effect, recipients: &[String]) -> Self {
        match *effect {
            Effect::NotifyPromotedAlertRecovery {
                stolen_record_id,
                theft_alert_id,
            } => Self {
                kind: NotificationKind::PromotedAlertRecovered,
                recipients: recipients.to_vec(),
                subject: format!("Promoted alert recovered: stolen record {stolen_record_id}"),
                stolen_record_id,
                theft_alert_id,
            },
        }
    }
}

/// Delivers notifications.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be delivered.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        info!(
            kind = %notification.kind,
            recipients = ?notification.recipients,
            stolen_record_id = notification.stolen_record_id,
            theft_alert_id = notification.theft_alert_id,
            "{}",
            notification.subject
        );
        Ok(())
    }
}

/// Keeps delivered notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|delivered| delivered.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|_| NotifyError::Delivery("recorder lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Delivery counts reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Notifications delivered.
    pub delivered: u64,
    /// Notifications that failed.
    pub failed: u64,
}

/// Queues effects for background delivery.
#[derive(Debug)]
pub struct EffectDispatcher {
    enabled: bool,
    tx: mpsc::Sender<Effect>,
    worker: JoinHandle<DispatchStats>,
}

impl EffectDispatcher {
    /// Start the delivery worker. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>, config: &NotificationConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let recipients = config.admin_recipients.clone();
        debug!(
            notifier = notifier.name(),
            capacity = config.queue_capacity,
            "Starting effect dispatcher"
        );
        let worker = tokio::spawn(run_worker(rx, notifier, recipients));
        Self {
            enabled: config.enabled,
            tx,
            worker,
        }
    }

    /// Queue effects without blocking. Returns how many were queued.
    ///
    /// A full or closed queue drops the effect with a warning.
    pub fn dispatch(&self, effects: impl IntoIterator<Item = Effect>) -> usize {
        let mut queued = 0;
        for effect in effects {
            if !self.enabled {
                info!(?effect, "Notifications disabled, dropping effect");
                continue;
            }
            match self.tx.try_send(effect) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(effect)) => {
                    warn!(?effect, "Effect queue full, dropping effect");
                }
                Err(mpsc::error::TrySendError::Closed(effect)) => {
                    warn!(?effect, "Effect queue closed, dropping effect");
                }
            }
        }
        queued
    }

    /// Close the queue and wait for queued deliveries to finish.
    pub async fn shutdown(self) -> DispatchStats {
        drop(self.tx);
        match self.worker.await {
            Ok(stats) => {
                debug!(
                    delivered = stats.delivered,
                    failed = stats.failed,
                    "Effect dispatcher stopped"
                );
                stats
            }
            Err(err) => {
                warn!(error = %err, "Effect dispatcher worker failed");
                DispatchStats::default()
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Effect>,
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Some(effect) = rx.recv().await {
        let notification = Notification::for_effect(&effect, &recipients);
        match notifier.deliver(&notification).await {
            Ok(()) => {
                stats.delivered += 1;
                info!(
                    kind = %notification.kind,
                    notifier = notifier.name(),
                    "Delivered notification"
                );
            }
            Err(err) => {
                stats.failed += 1;
                warn!(
                    kind = %notification.kind,
                    notifier = notifier.name(),
                    error = %err,
                    "Notification delivery failed"
                );
            }
        }
    }
    stats
}
