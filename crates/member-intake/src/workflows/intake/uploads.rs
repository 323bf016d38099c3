use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::UploadSlot;

/// Binary asset picked by the user for one slot.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for FileBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBlob")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Successful provider response for an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub reference: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Storage provider receiving binary uploads. Re-invoking after a failure must be safe.
#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(&self, slot: UploadSlot, file: FileBlob)
        -> Result<UploadReceipt, UploadError>;
}

/// Failure raised while uploading a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("file is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("file type '{content_type}' is not accepted here")]
    UnsupportedType { content_type: String },
    #[error("file is empty")]
    Empty,
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("upload transport failed: {0}")]
    Transport(String),
}

/// Client-side acceptance rules for a slot, checked before the provider is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Media ranges such as `image/*` or `application/pdf`.
    pub accepted: Vec<&'static str>,
    pub max_bytes: u64,
}

impl UploadPolicy {
    pub fn check(&self, file: &FileBlob) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.size() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: file.size(),
                max: self.max_bytes,
            });
        }

        let unsupported = || UploadError::UnsupportedType {
            content_type: file.content_type.clone(),
        };
        let media: mime::Mime = file.content_type.parse().map_err(|_| unsupported())?;
        let accepted = self.accepted.iter().any(|range| {
            range
                .parse::<mime::Mime>()
                .map(|range| {
                    range.type_() == media.type_()
                        && (range.subtype() == mime::STAR || range.subtype() == media.subtype())
                })
                .unwrap_or(false)
        });

        if accepted {
            Ok(())
        } else {
            Err(unsupported())
        }
    }
}

/// Observable state of a slot's most recent upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Succeeded { reference: String },
    Failed { reason: String },
}

impl UploadStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Succeeded { .. } => "succeeded",
            UploadStatus::Failed { .. } => "failed",
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            UploadStatus::Succeeded { reference } => Some(reference),
            _ => None,
        }
    }
}

/// Identifies one started upload. Only the newest ticket of a slot may change that slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadTicket {
    pub slot: UploadSlot,
    generation: u64,
}

impl UploadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct UploadTask {
    generation: u64,
    file_name: Option<String>,
    status: UploadStatus,
}

/// Outcome of feeding a provider response back into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The ticket was current; the slot now holds `status`.
    Applied(UploadStatus),
    /// A newer selection replaced this ticket; the response was dropped.
    Superseded,
    /// The owning session was torn down; the response was dropped.
    Disposed,
}

/// Per-session arena of upload tasks keyed by slot.
#[derive(Debug, Default)]
pub struct UploadRegistry {
    tasks: BTreeMap<UploadSlot, UploadTask>,
    next_generation: u64,
    disposed: bool,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(
        &mut self,
        slot: UploadSlot,
        file_name: Option<String>,
        status: UploadStatus,
    ) -> UploadTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.tasks.insert(
            slot,
            UploadTask {
                generation,
                file_name,
                status,
            },
        );
        UploadTicket { slot, generation }
    }

    /// Begin a new upload for `slot`, superseding whatever the slot held before.
    pub fn start(&mut self, slot: UploadSlot, file_name: &str) -> UploadTicket {
        if self.is_pending(slot) {
            debug!(slot = slot.label(), "superseding in-flight upload");
        }
        let ticket = self.issue(slot, Some(file_name.to_string()), UploadStatus::Uploading);
        info!(
            slot = slot.label(),
            generation = ticket.generation,
            file = file_name,
            "upload started"
        );
        ticket
    }

    /// Mark a slot as already holding a reference, e.g. when hydrating an existing profile.
    pub fn seed(&mut self, slot: UploadSlot, reference: String) {
        self.issue(slot, None, UploadStatus::Succeeded { reference });
    }

    /// Reset a slot to idle. Any in-flight ticket for it becomes stale.
    pub fn clear(&mut self, slot: UploadSlot) {
        self.issue(slot, None, UploadStatus::Idle);
    }

    pub fn resolve(
        &mut self,
        ticket: UploadTicket,
        result: Result<UploadReceipt, UploadError>,
    ) -> Resolution {
        if self.disposed {
            debug!(
                slot = ticket.slot.label(),
                "dropping upload result for disposed session"
            );
            return Resolution::Disposed;
        }

        let Some(task) = self.tasks.get_mut(&ticket.slot) else {
            return Resolution::Superseded;
        };
        if task.generation != ticket.generation {
            debug!(
                slot = ticket.slot.label(),
                stale = ticket.generation,
                current = task.generation,
                "dropping superseded upload result"
            );
            return Resolution::Superseded;
        }

        task.status = match result {
            Ok(receipt) => {
                info!(
                    slot = ticket.slot.label(),
                    reference = %receipt.reference,
                    "upload succeeded"
                );
                UploadStatus::Succeeded {
                    reference: receipt.reference,
                }
            }
            Err(error) => {
                warn!(slot = ticket.slot.label(), %error, "upload failed");
                UploadStatus::Failed {
                    reason: error.to_string(),
                }
            }
        };
        Resolution::Applied(task.status.clone())
    }

    pub fn status(&self, slot: UploadSlot) -> UploadStatus {
        self.tasks
            .get(&slot)
            .map(|task| task.status.clone())
            .unwrap_or(UploadStatus::Idle)
    }

    pub fn file_name(&self, slot: UploadSlot) -> Option<&str> {
        self.tasks.get(&slot).and_then(|task| task.file_name.as_deref())
    }

    pub fn is_pending(&self, slot: UploadSlot) -> bool {
        matches!(
            self.tasks.get(&slot).map(|task| &task.status),
            Some(UploadStatus::Uploading)
        )
    }

    pub fn pending_slots(&self) -> Vec<UploadSlot> {
        UploadSlot::ALL
            .into_iter()
            .filter(|slot| self.is_pending(*slot))
            .collect()
    }

    pub fn is_succeeded(&self, slot: UploadSlot) -> bool {
        matches!(
            self.tasks.get(&slot).map(|task| &task.status),
            Some(UploadStatus::Succeeded { .. })
        )
    }

    /// Stop applying any further results. Irreversible.
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// An upload that has been registered but not yet driven to completion.
///
/// The job owns everything it needs, so callers may await it inline, join it with others,
/// or hand it to a runtime and feed the [`UploadCompletion`] back later.
pub struct UploadJob {
    ticket: UploadTicket,
    future: BoxFuture<'static, Result<UploadReceipt, UploadError>>,
}

impl UploadJob {
    pub(crate) fn spawn_with(
        ticket: UploadTicket,
        service: Arc<dyn UploadService>,
        file: FileBlob,
    ) -> Self {
        let slot = ticket.slot;
        Self {
            ticket,
            future: Box::pin(async move { service.upload(slot, file).await }),
        }
    }

    pub(crate) fn failed(ticket: UploadTicket, error: UploadError) -> Self {
        Self {
            ticket,
            future: Box::pin(async move { Err(error) }),
        }
    }

    pub fn ticket(&self) -> UploadTicket {
        self.ticket
    }

    pub async fn run(self) -> UploadCompletion {
        let result = self.future.await;
        UploadCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

impl fmt::Debug for UploadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadJob")
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// Provider response paired with the ticket it answers.
#[derive(Debug, Clone)]
pub struct UploadCompletion {
    pub ticket: UploadTicket,
    pub result: Result<UploadReceipt, UploadError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(reference: &str) -> Result<UploadReceipt, UploadError> {
        Ok(UploadReceipt {
            reference: reference.to_string(),
            uploaded_at: Utc::now(),
        })
    }

    #[test]
    fn newer_ticket_wins_when_older_resolves_last() {
        let mut registry = UploadRegistry::new();
        let first = registry.start(UploadSlot::Photo, "a.png");
        let second = registry.start(UploadSlot::Photo, "b.png");

        assert!(matches!(
            registry.resolve(second, receipt("y")),
            Resolution::Applied(_)
        ));
        assert_eq!(registry.resolve(first, receipt("x")), Resolution::Superseded);
        assert_eq!(registry.status(UploadSlot::Photo).reference(), Some("y"));
    }

    #[test]
    fn newer_ticket_wins_when_older_resolves_first() {
        let mut registry = UploadRegistry::new();
        let first = registry.start(UploadSlot::Photo, "a.png");
        let second = registry.start(UploadSlot::Photo, "b.png");

        assert_eq!(registry.resolve(first, receipt("x")), Resolution::Superseded);
        assert!(registry.is_pending(UploadSlot::Photo));
        registry.resolve(second, receipt("y"));
        assert_eq!(registry.status(UploadSlot::Photo).reference(), Some("y"));
    }

    #[test]
    fn slots_are_independent() {
        let mut registry = UploadRegistry::new();
        let photo = registry.start(UploadSlot::Photo, "a.png");
        let document = registry.start(UploadSlot::Document, "cv.pdf");

        registry.resolve(document, Err(UploadError::Transport("reset".to_string())));
        assert!(registry.is_pending(UploadSlot::Photo));
        assert_eq!(registry.pending_slots(), vec![UploadSlot::Photo]);

        registry.resolve(photo, receipt("p"));
        assert!(registry.is_succeeded(UploadSlot::Photo));
        assert_eq!(registry.status(UploadSlot::Document).label(), "failed");
    }

    #[test]
    fn disposed_registry_ignores_results() {
        let mut registry = UploadRegistry::new();
        let ticket = registry.start(UploadSlot::Document, "cv.pdf");
        registry.dispose();
        assert_eq!(registry.resolve(ticket, receipt("late")), Resolution::Disposed);
        assert!(registry.is_pending(UploadSlot::Document));
    }

    #[test]
    fn policy_rejects_wrong_type_and_size() {
        let policy = UploadPolicy {
            accepted: vec!["image/*"],
            max_bytes: 4,
        };
        assert!(policy.check(&FileBlob::new("a.png", "image/png", vec![1, 2])).is_ok());
        assert_eq!(
            policy.check(&FileBlob::new("a.pdf", "application/pdf", vec![1])),
            Err(UploadError::UnsupportedType {
                content_type: "application/pdf".to_string()
            })
        );
        assert_eq!(
            policy.check(&FileBlob::new("a.png", "image/png", vec![0; 5])),
            Err(UploadError::TooLarge { size: 5, max: 4 })
        );
        assert_eq!(
            policy.check(&FileBlob::new("a.png", "image/png", Vec::new())),
            Err(UploadError::Empty)
        );
        assert!(policy
            .check(&FileBlob::new("a.png", "not a mime", vec![1]))
            .is_err());
    }

    #[tokio::test]
    async fn failed_job_completes_with_its_error() {
        let mut registry = UploadRegistry::new();
        let ticket = registry.start(UploadSlot::Photo, "a.gif");
        let completion = UploadJob::failed(ticket, UploadError::Empty).run().await;
        assert_eq!(completion.ticket, ticket);
        assert_eq!(completion.result, Err(UploadError::Empty));
    }
}
