//! Live query: an initial listing followed by change events, delivered as
//! full snapshots.

use log::{debug, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::data::types::Todo;
use crate::schema::ModelEvent;

/// The full visible item set at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub items: Vec<Todo>,
    /// false while initial pages are still arriving
    pub is_synced: bool,
}

/// Snapshot receiver passed to a live query
pub type SnapshotCallback = Box<dyn FnMut(Snapshot) + Send + 'static>;

/// Ordered item set a live query maintains between snapshots
#[derive(Debug, Default)]
pub(crate) struct ItemSet {
    items: Vec<Todo>,
}

impl ItemSet {
    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.id == id)
    }

    fn upsert(&mut self, todo: Todo) {
        match self.position(&todo.id) {
            Some(index) => self.items[index] = todo,
            None => self.items.push(todo),
        }
    }

    pub fn merge_page(&mut self, page: impl IntoIterator<Item = Todo>) {
        for todo in page {
            self.upsert(todo);
        }
    }

    pub fn apply(&mut self, event: ModelEvent, todo: Todo) {
        match event {
            ModelEvent::Create | ModelEvent::Update => self.upsert(todo),
            ModelEvent::Delete => {
                if let Some(index) = self.position(&todo.id) {
                    self.items.remove(index);
                }
            }
        }
    }

    pub fn snapshot(&self, is_synced: bool) -> Snapshot {
        Snapshot {
            items: self.items.clone(),
            is_synced,
        }
    }
}

/// Handle to a running live query.
///
/// Released exactly once, by [`ObserveSubscription::unsubscribe`] or on drop.
pub struct ObserveSubscription {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ObserveSubscription {
    /// Wrap a task that ends when `stop` fires
    pub fn new(stop: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            task: Some(task),
        }
    }

    pub fn is_active(&self) -> bool {
        self.stop.is_some()
    }

    /// Stop the live query and wait for its subscriptions to be released
    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Live query task failed: {}", e);
            }
        }
        debug!("Live query released");
    }
}

impl Drop for ObserveSubscription {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            debug!("Releasing live query on drop");
            let _ = stop.send(());
        }
    }
}
