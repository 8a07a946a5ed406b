use crate::client::RealtimeClient;
use crate::error::RealtimeError;
use crate::message::SubscriptionEvent;
use log::{debug, warn};
use tokio::sync::mpsc;

/// Receives the events of one or more subscriptions, tagged with their id
pub type EventSink = mpsc::UnboundedSender<(String, SubscriptionEvent)>;

/// An active subscription.
///
/// The `stop` frame is sent once, either by [`Subscription::unsubscribe`] or
/// when an unreleased subscription is dropped.
pub struct Subscription {
    id: String,
    /// `None` when events go to a shared sink
    events: Option<mpsc::UnboundedReceiver<(String, SubscriptionEvent)>>,
    client: Option<RealtimeClient>,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        events: Option<mpsc::UnboundedReceiver<(String, SubscriptionEvent)>>,
        client: RealtimeClient,
    ) -> Self {
        Self {
            id,
            events,
            client: Some(client),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    /// Next event; `None` once the connection dropped the route, or always
    /// when the subscription was started into a shared sink
    pub async fn next(&mut self) -> Option<SubscriptionEvent> {
        let events = self.events.as_mut()?;
        events.recv().await.map(|(_, event)| event)
    }

    pub async fn unsubscribe(mut self) -> Result<(), RealtimeError> {
        match self.client.take() {
            Some(client) => client.stop(&self.id).await,
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.stop(&id).await {
                        warn!("Error stopping subscription {}: {}", id, e);
                    }
                });
            }
            Err(_) => warn!(
                "Subscription {} dropped outside a runtime; stop frame not sent",
                id
            ),
        }
    }
}

/// Subscriptions read through one channel.
///
/// Events come out in the order the connection received them, whichever
/// member they belong to.
pub struct SubscriptionGroup {
    sink: EventSink,
    events: mpsc::UnboundedReceiver<(String, SubscriptionEvent)>,
    members: Vec<Subscription>,
}

impl SubscriptionGroup {
    pub fn new() -> Self {
        let (sink, events) = mpsc::unbounded_channel();
        Self {
            sink,
            events,
            members: Vec::new(),
        }
    }

    /// Start a member subscription and return its id
    pub async fn subscribe(
        &mut self,
        client: &RealtimeClient,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<String, RealtimeError> {
        let subscription = client
            .subscribe_into(query, variables, self.sink.clone())
            .await?;
        let id = subscription.id().to_string();
        self.members.push(subscription);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Next event of any member, with the member's id
    pub async fn next(&mut self) -> Option<(String, SubscriptionEvent)> {
        self.events.recv().await
    }

    /// Stop every member. All are stopped even if one fails; the first error
    /// is returned.
    pub async fn unsubscribe(self) -> Result<(), RealtimeError> {
        let mut first_error = None;
        for subscription in self.members {
            let id = subscription.id().to_string();
            if let Err(e) = subscription.unsubscribe().await {
                warn!("Error stopping subscription {}: {}", id, e);
                first_error.get_or_insert(e);
            }
        }
        debug!("Subscription group released");
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for SubscriptionGroup {
    fn default() -> Self {
        Self::new()
    }
}
