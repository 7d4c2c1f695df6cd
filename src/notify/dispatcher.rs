use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, RosterError};
use crate::notify::notification::{Notification, NotificationKind, NotificationStatus};
use crate::outcome::Outcome;

/// Push delivery to a recipient's device/session. Fire-and-forget:
/// implementations log their own failures; the dispatcher never lets a
/// failed push affect the mutation that triggered it.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn push(&self, notification: &Notification);
}

/// Default transport: records deliveries in the log only. Stands in for a
/// websocket or mobile-push integration.
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn push(&self, notification: &Notification) {
        tracing::info!(
            notification_id = %notification.id,
            recipient_id = %notification.recipient_id,
            message = %notification.message,
            "Notification delivered"
        );
    }
}

/// Per-recipient notification records and their read/archive state.
#[derive(Debug, Default)]
pub struct Inbox {
    notifications: HashMap<Uuid, Notification>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, notification: Notification) {
        self.notifications.insert(notification.id, notification);
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.notifications.get(&id)
    }

    /// Recipient acknowledges the notification.
    pub fn mark_read(&mut self, id: Uuid, actor: Uuid) -> Result<Outcome<Notification>> {
        let notification = self
            .notifications
            .get(&id)
            .ok_or_else(|| RosterError::not_found("notification", id))?;
        if notification.recipient_id != actor {
            return Err(RosterError::Unauthorized { actor });
        }
        match notification.status {
            NotificationStatus::Read => Ok(Outcome::already(notification.clone())),
            NotificationStatus::Unread => {
                if let Some(n) = self.notifications.get_mut(&id) {
                    n.status = NotificationStatus::Read;
                    Ok(Outcome::applied(n.clone()))
                } else {
                    Err(RosterError::not_found("notification", id))
                }
            }
            status => Err(RosterError::invalid_transition("UNREAD", status)),
        }
    }

    /// Archive a read notification. Archiving straight from UNREAD is
    /// rejected: a user acknowledges before archiving.
    pub fn archive(&mut self, id: Uuid, actor: Uuid) -> Result<Outcome<Notification>> {
        let notification = self
            .notifications
            .get(&id)
            .ok_or_else(|| RosterError::not_found("notification", id))?;
        if notification.recipient_id != actor {
            return Err(RosterError::Unauthorized { actor });
        }
        match notification.status {
            NotificationStatus::Archived => Ok(Outcome::already(notification.clone())),
            NotificationStatus::Read => {
                if let Some(n) = self.notifications.get_mut(&id) {
                    n.status = NotificationStatus::Archived;
                    Ok(Outcome::applied(n.clone()))
                } else {
                    Err(RosterError::not_found("notification", id))
                }
            }
            status => Err(RosterError::invalid_transition("READ", status)),
        }
    }

    /// Everything addressed to the recipient, newest first.
    pub fn for_recipient(&self, recipient_id: Uuid) -> Vec<&Notification> {
        let mut notifications: Vec<&Notification> = self
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }

    /// Non-archived notifications, newest first.
    pub fn active_for_recipient(&self, recipient_id: Uuid) -> Vec<&Notification> {
        self.for_recipient(recipient_id)
            .into_iter()
            .filter(|n| n.status != NotificationStatus::Archived)
            .collect()
    }

    pub fn unread_count(&self, recipient_id: Uuid) -> usize {
        self.notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && n.status == NotificationStatus::Unread)
            .count()
    }
}

/// At-least-once event fan-out.
///
/// `emit` inserts records synchronously, so an emitted notification is
/// immediately visible to `mark_read`/`archive`, while transport delivery
/// drains through a bounded channel on its own task. A full or closed
/// channel drops the push (the record survives); it never fails the
/// mutation that emitted.
#[derive(Clone)]
pub struct Dispatcher {
    inbox: Arc<RwLock<Inbox>>,
    tx: mpsc::Sender<Notification>,
    rx: Arc<std::sync::Mutex<Option<mpsc::Receiver<Notification>>>>,
}

impl Dispatcher {
    pub fn new(queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        Self {
            inbox: Arc::new(RwLock::new(Inbox::new())),
            tx,
            rx: Arc::new(std::sync::Mutex::new(Some(rx))),
        }
    }

    /// One notification per recipient. Returns the created records.
    pub async fn emit(
        &self,
        recipients: &[Uuid],
        kind: NotificationKind,
        message: &str,
        related_entity_id: Option<Uuid>,
    ) -> Vec<Notification> {
        let mut created = Vec::with_capacity(recipients.len());
        {
            let mut inbox = self.inbox.write().await;
            for &recipient_id in recipients {
                let notification =
                    Notification::new(recipient_id, kind, message, related_entity_id);
                inbox.insert(notification.clone());
                created.push(notification);
            }
        }
        for notification in &created {
            if let Err(e) = self.tx.try_send(notification.clone()) {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "Delivery queue rejected notification; record kept, push skipped"
                );
            }
        }
        created
    }

    /// Spawn the delivery loop. Call once; later calls find the receiver
    /// already taken and do nothing.
    pub fn spawn_delivery(
        &self,
        transport: Arc<dyn NotificationTransport>,
        cancel: CancellationToken,
    ) {
        let rx = match self.rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(mut rx) = rx else {
            tracing::warn!("Notification delivery loop already running");
            return;
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        // Drain what is already queued, then stop.
                        while let Ok(notification) = rx.try_recv() {
                            transport.push(&notification).await;
                        }
                        tracing::info!("Notification delivery loop stopped");
                        return;
                    }
                    next = rx.recv() => {
                        match next {
                            Some(notification) => transport.push(&notification).await,
                            None => return,
                        }
                    }
                }
            }
        });
    }

    pub async fn mark_read(&self, id: Uuid, actor: Uuid) -> Result<Outcome<Notification>> {
        self.inbox.write().await.mark_read(id, actor)
    }

    pub async fn archive(&self, id: Uuid, actor: Uuid) -> Result<Outcome<Notification>> {
        self.inbox.write().await.archive(id, actor)
    }

    pub async fn for_recipient(&self, recipient_id: Uuid) -> Vec<Notification> {
        let inbox = self.inbox.read().await;
        inbox
            .for_recipient(recipient_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn active_for_recipient(&self, recipient_id: Uuid) -> Vec<Notification> {
        let inbox = self.inbox.read().await;
        inbox
            .active_for_recipient(recipient_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn unread_count(&self, recipient_id: Uuid) -> usize {
        self.inbox.read().await.unread_count(recipient_id)
    }
}
