use std::{
    cell::RefCell,
    future::Future,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::{bytes::BytesMut, codec::Encoder};
use tracing::debug;

use crate::{RecordId, encoder::NotificationEncoder, error::NotifyError};

/// Payload handed to downstream automation once a new scale is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleNotification {
    pub record_id: RecordId,
    pub scale: f64,
    pub unit: String,
}

pub trait Notifier {
    fn notify_scale(
        &self,
        notification: &ScaleNotification,
    ) -> impl Future<Output = Result<(), NotifyError>>;
}

/// Appends notifications to a newline-delimited JSON outbox file.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Notifier for OutboxNotifier {
    async fn notify_scale(&self, notification: &ScaleNotification) -> Result<(), NotifyError> {
        let mut encoder = NotificationEncoder::default();
        let mut dst = BytesMut::with_capacity(256);
        encoder.encode(notification.clone(), &mut dst)?;

        let mut outbox = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        outbox.write_all(&dst).await?;
        outbox.flush().await?;
        debug!(
            "queued scale {} for {} in {}",
            notification.scale,
            notification.record_id,
            self.path.display()
        );
        Ok(())
    }
}

/// Keeps sent notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: RefCell<Vec<ScaleNotification>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<ScaleNotification> {
        self.sent.borrow().clone()
    }
}

impl Notifier for MemoryNotifier {
    async fn notify_scale(&self, notification: &ScaleNotification) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}
