//! Tenant-keyed change notifications.
//!
//! An in-process bus with one broadcast channel per company topic.
//! Subscribing requires a scope that resolves to a company, and events are
//! keyed by the *resource's* owning company, never the actor's, so a
//! subscriber only ever observes changes to its own company's data.
//!
//! Delivery is at-most-once and best-effort: publishing never blocks a
//! repository operation, events published with no live subscribers are
//! dropped, and a lagged receiver loses the oldest events per broadcast
//! channel semantics.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ContextError;
use crate::projects::Project;
use crate::scope::{CompanyId, Scope};

/// Default per-topic channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// What happened to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectEventKind {
    /// The project was created.
    Created,
    /// The project was modified.
    Updated,
    /// The project was removed.
    Deleted,
}

impl ProjectEventKind {
    /// Returns the wire form of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectEventKind::Created => "created",
            ProjectEventKind::Updated => "updated",
            ProjectEventKind::Deleted => "deleted",
        }
    }
}

/// A change notification delivered to same-company subscribers.
///
/// Carries the full row as of the change; for deletions, the row as it
/// was before removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEvent {
    /// What happened.
    pub kind: ProjectEventKind,
    /// The project the event is about.
    pub project: Project,
}

impl ProjectEvent {
    /// The topic this event is delivered on.
    pub fn topic(&self) -> String {
        topic_for(self.project.company_id)
    }
}

fn topic_for(company_id: CompanyId) -> String {
    format!("projects:{}", company_id)
}

/// In-process change bus with one broadcast channel per company.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    topics: RwLock<HashMap<String, broadcast::Sender<ProjectEvent>>>,
    capacity: usize,
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner")
            .field("topics", &self.topics.read().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    /// Creates a bus with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus with the given per-topic capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Subscribes to the scope's company topic.
    ///
    /// Fails with [`ContextError::NoCompanyInScope`] when the scope
    /// resolves to no company.
    pub fn subscribe(
        &self,
        scope: &Scope,
    ) -> Result<broadcast::Receiver<ProjectEvent>, ContextError> {
        let company_id = scope.company_id().ok_or(ContextError::NoCompanyInScope)?;
        Ok(self.subscribe_company(company_id))
    }

    /// Subscribes directly to a company topic.
    ///
    /// For trusted callers that already hold a verified company id.
    pub fn subscribe_company(&self, company_id: CompanyId) -> broadcast::Receiver<ProjectEvent> {
        self.sender(&topic_for(company_id)).subscribe()
    }

    /// Publishes an event on the owning company's topic.
    ///
    /// Best-effort: without subscribers the event is dropped.
    pub fn publish(&self, kind: ProjectEventKind, project: &Project) {
        let event = ProjectEvent {
            kind,
            project: project.clone(),
        };
        let topic = event.topic();

        let Some(sender) = self.existing_sender(&topic) else {
            tracing::trace!(topic = %topic, "no subscribers, event dropped");
            return;
        };

        match sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(topic = %topic, kind = kind.as_str(), receivers, "event published");
            }
            Err(_) => {
                tracing::trace!(topic = %topic, "no live receivers, event dropped");
            }
        }
    }

    fn existing_sender(&self, topic: &str) -> Option<broadcast::Sender<ProjectEvent>> {
        self.inner.topics.read().get(topic).cloned()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<ProjectEvent> {
        if let Some(sender) = self.existing_sender(topic) {
            return sender;
        }
        let mut topics = self.inner.topics.write();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone()
    }
}
