//! Typed data client for the owner-scoped `Todo` model
//!
//! Queries and mutations go over HTTP; the live query combines a paged
//! listing with realtime change subscriptions.

mod graphql;
mod observe;
mod types;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use amplify_todo_auth::Auth;
use amplify_todo_realtime::{
    RealtimeClient, RealtimeClientOptions, SubscriptionEvent, SubscriptionGroup,
};

use crate::config::{ClientOptions, DataOutputs};
use crate::error::Error;
use crate::fetch::Fetch;
use crate::schema::{DataSchema, ModelEvent, ModelSchema};

pub use graphql::GraphQLError;
pub use observe::{ObserveSubscription, Snapshot, SnapshotCallback};
pub use types::{CreateTodoInput, Todo, TodoPage};

use graphql::{take_field, GraphQLRequest, GraphQLResponse};
use observe::ItemSet;
use types::DeleteTodoInput;

/// What the application shell needs from the data layer
#[async_trait]
pub trait TodoBackend: Send + Sync {
    async fn create_todo(&self, input: CreateTodoInput) -> Result<Todo, Error>;

    async fn delete_todo(&self, id: &str) -> Result<Todo, Error>;

    /// Start a live query over every Todo the caller owns
    async fn observe_todos(&self, on_snapshot: SnapshotCallback)
        -> Result<ObserveSubscription, Error>;
}

/// The change subscriptions behind a live query, read in arrival order
struct ChangeStreams {
    group: SubscriptionGroup,
    events: HashMap<String, ModelEvent>,
}

impl ChangeStreams {
    async fn next(&mut self) -> Option<(ModelEvent, SubscriptionEvent)> {
        loop {
            let (id, message) = self.group.next().await?;
            match self.events.get(&id) {
                Some(&event) => return Some((event, message)),
                None => warn!("Event for unknown stream {}", id),
            }
        }
    }

    async fn release(self) {
        if let Err(e) = self.group.unsubscribe().await {
            warn!("Error releasing change streams: {}", e);
        }
    }
}

/// データクライアント
#[derive(Clone)]
pub struct DataClient {
    url: String,
    http_client: Client,
    auth: Arc<Auth>,
    realtime: RealtimeClient,
    model: ModelSchema,
    options: ClientOptions,
}

impl DataClient {
    pub fn new(
        data: &DataOutputs,
        auth: Arc<Auth>,
        http_client: Client,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let realtime = match &options.realtime_endpoint {
            Some(endpoint) => {
                RealtimeClient::with_endpoint(&data.url, endpoint, RealtimeClientOptions::default())?
            }
            None => RealtimeClient::new(&data.url)?,
        };
        let model = DataSchema::declared()
            .model("Todo")
            .cloned()
            .ok_or_else(|| Error::config("schema declares no Todo model"))?;

        Ok(Self {
            url: data.url.clone(),
            http_client,
            auth,
            realtime,
            model,
            options,
        })
    }

    pub fn model(&self) -> &ModelSchema {
        &self.model
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, Error> {
        let session = self.auth.valid_session().await?;
        let response: GraphQLResponse = Fetch::post(&self.http_client, &self.url)
            .authorization(&session.access_token)
            .timeout(self.options.request_timeout)
            .json(&GraphQLRequest { query, variables })?
            .execute()
            .await?;
        response.into_data()
    }

    async fn execute_field<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        field: &str,
    ) -> Result<T, Error> {
        let data = self.execute(query, variables).await?;
        take_field(data, field)
    }

    /// Create a Todo. `id` and `owner` come back from the service.
    pub async fn create(&self, input: CreateTodoInput) -> Result<Todo, Error> {
        let todo: Todo = self
            .execute_field(
                &self.model.create_mutation(),
                json!({ "input": input }),
                &self.model.mutation_field(ModelEvent::Create),
            )
            .await?;
        info!("Created todo {}", todo.id);
        Ok(todo)
    }

    pub async fn delete(&self, id: &str) -> Result<Todo, Error> {
        let todo: Todo = self
            .execute_field(
                &self.model.delete_mutation(),
                json!({ "input": DeleteTodoInput { id } }),
                &self.model.mutation_field(ModelEvent::Delete),
            )
            .await?;
        info!("Deleted todo {}", todo.id);
        Ok(todo)
    }

    /// 一覧の1ページを取得
    pub async fn list_page(&self, next_token: Option<&str>) -> Result<TodoPage, Error> {
        self.execute_field(
            &self.model.list_query(),
            json!({ "nextToken": next_token }),
            &self.model.list_field(),
        )
        .await
    }

    /// Every visible Todo, following `nextToken` to the end
    pub async fn list(&self) -> Result<Vec<Todo>, Error> {
        let mut todos = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let page = self.list_page(next_token.as_deref()).await?;
            todos.extend(page.items.into_iter().flatten());
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(todos),
            }
        }
    }

    async fn open_streams(&self, owner: &str) -> Result<ChangeStreams, Error> {
        let variables = match self.model.owner_field() {
            Some(field) => json!({ field: owner }),
            None => json!({}),
        };
        let mut streams = ChangeStreams {
            group: SubscriptionGroup::new(),
            events: HashMap::new(),
        };
        for event in [ModelEvent::Create, ModelEvent::Update, ModelEvent::Delete] {
            let opened = streams
                .group
                .subscribe(&self.realtime, &self.model.subscription(event), variables.clone())
                .await;
            let id = match opened {
                Ok(id) => id,
                Err(e) => {
                    streams.release().await;
                    return Err(e.into());
                }
            };
            debug!("Opened {:?} stream {}", event, id);
            streams.events.insert(id, event);
        }
        Ok(streams)
    }

    /// Live query over every Todo the caller owns.
    ///
    /// Change streams are opened before the listing, so nothing that happens
    /// during the listing is missed. One snapshot is emitted per page, then
    /// one per change.
    pub async fn observe_query<F>(&self, on_snapshot: F) -> Result<ObserveSubscription, Error>
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let session = self.auth.valid_session().await?;
        self.realtime.set_auth(Some(session.access_token.clone())).await;

        let streams = self.open_streams(&session.owner()).await?;

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let client = self.clone();
        let mut on_snapshot = on_snapshot;
        let task = tokio::spawn(async move {
            let mut streams = streams;
            tokio::select! {
                _ = &mut stop_rx => debug!("Live query stopped"),
                result = client.run_live_query(&mut streams, &mut on_snapshot) => {
                    if let Err(e) = result {
                        warn!("Live query ended: {}", e);
                    }
                }
            }
            streams.release().await;
        });

        Ok(ObserveSubscription::new(stop_tx, task))
    }

    async fn run_live_query<F>(&self, streams: &mut ChangeStreams, on_snapshot: &mut F) -> Result<(), Error>
    where
        F: FnMut(Snapshot) + Send,
    {
        let mut items = ItemSet::default();
        let mut next_token: Option<String> = None;
        loop {
            let page = self.list_page(next_token.as_deref()).await?;
            items.merge_page(page.items.into_iter().flatten());
            on_snapshot(items.snapshot(page.next_token.is_none()));
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        while let Some((event, message)) = streams.next().await {
            match message {
                SubscriptionEvent::Data(data) => {
                    match take_field::<Todo>(data, &self.model.subscription_field(event)) {
                        Ok(todo) => {
                            items.apply(event, todo);
                            on_snapshot(items.snapshot(true));
                        }
                        Err(e) => warn!("Ignoring malformed {:?} event: {}", event, e),
                    }
                }
                SubscriptionEvent::Error(e) => return Err(Error::data(e)),
                SubscriptionEvent::Complete => {
                    debug!("{:?} stream completed", event);
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TodoBackend for DataClient {
    async fn create_todo(&self, input: CreateTodoInput) -> Result<Todo, Error> {
        self.create(input).await
    }

    async fn delete_todo(&self, id: &str) -> Result<Todo, Error> {
        self.delete(id).await
    }

    async fn observe_todos(
        &self,
        on_snapshot: SnapshotCallback,
    ) -> Result<ObserveSubscription, Error> {
        self.observe_query(on_snapshot).await
    }
}
