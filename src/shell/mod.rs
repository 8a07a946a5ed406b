//! Application shell
//!
//! Owns the view state, keeps one live query open while mounted and turns
//! user actions into fire-and-forget calls on the data layer. The list only
//! changes when a snapshot arrives.

mod display_name;
mod view;

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::authenticator::SessionProvider;
use crate::data::{CreateTodoInput, ObserveSubscription, SnapshotCallback, Todo, TodoBackend};
use crate::error::Error;

pub use display_name::{avatar_text, resolve_display_name, FALLBACK_DISPLAY_NAME};
pub use view::{escape_html, render, Presentation, Theme, EMPTY_TEXT, LOADING_TEXT};

/// Text of the create prompt
pub const CREATE_PROMPT: &str = "Todo content";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Tile,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::List => "list",
            ViewMode::Tile => "tile",
        }
    }
}

/// 画面状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub todos: Vec<Todo>,
    pub is_loading: bool,
    pub display_name: String,
    pub view_mode: ViewMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            todos: Vec::new(),
            is_loading: true,
            display_name: FALLBACK_DISPLAY_NAME.to_string(),
            view_mode: ViewMode::List,
        }
    }
}

/// Asks the user for a line of text; `None` when cancelled
pub trait Prompt {
    fn ask(&mut self, message: &str) -> Option<String>;
}

pub struct AppShell {
    backend: Arc<dyn TodoBackend>,
    session: Arc<dyn SessionProvider>,
    presentation: Presentation,
    state: Arc<Mutex<ViewState>>,
    subscription: Option<ObserveSubscription>,
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppShell {
    pub fn new(
        backend: Arc<dyn TodoBackend>,
        session: Arc<dyn SessionProvider>,
        presentation: Presentation,
    ) -> Self {
        Self {
            backend,
            session,
            presentation,
            state: Arc::new(Mutex::new(ViewState::default())),
            subscription: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Load the display name and open the live query.
    ///
    /// A failed attribute fetch keeps the fallback name. Mounting twice
    /// without an unmount does nothing.
    pub async fn mount(&mut self) -> Result<(), Error> {
        if self.subscription.is_some() {
            debug!("mount(): already mounted");
            return Ok(());
        }

        {
            let mut state = lock(&self.state);
            let view_mode = state.view_mode;
            *state = ViewState {
                view_mode,
                ..ViewState::default()
            };
        }

        let state = Arc::clone(&self.state);
        let on_snapshot: SnapshotCallback = Box::new(move |snapshot| {
            let mut state = lock(&state);
            state.todos = snapshot.items;
            state.is_loading = false;
        });

        let (attributes, subscription) = tokio::join!(
            self.session.user_attributes(),
            self.backend.observe_todos(on_snapshot)
        );

        match attributes {
            Ok(attributes) => lock(&self.state).display_name = resolve_display_name(&attributes),
            Err(e) => debug!("Keeping fallback display name: {}", e),
        }

        self.subscription = Some(subscription?);
        info!("Shell mounted");
        Ok(())
    }

    /// Release the live query. Returns whether one was open.
    pub async fn unmount(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => {
                subscription.unsubscribe().await;
                info!("Shell unmounted");
                true
            }
            None => false,
        }
    }

    /// Prompt for content and create it in the background.
    ///
    /// Empty or cancelled input creates nothing.
    pub fn create_todo(&self, prompt: &mut dyn Prompt) -> Option<JoinHandle<()>> {
        let content = prompt.ask(CREATE_PROMPT).filter(|c| !c.is_empty())?;
        let backend = Arc::clone(&self.backend);
        Some(tokio::spawn(async move {
            if let Err(e) = backend.create_todo(CreateTodoInput { content }).await {
                warn!("Create failed: {}", e);
            }
        }))
    }

    pub fn delete_todo(&self, id: &str) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = backend.delete_todo(&id).await {
                warn!("Delete of {} failed: {}", id, e);
            }
        })
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        lock(&self.state).view_mode = mode;
    }

    /// Local state is left for the next mount to reset
    pub async fn sign_out(&self) -> Result<(), Error> {
        self.session.sign_out().await
    }

    pub fn state(&self) -> ViewState {
        lock(&self.state).clone()
    }

    pub fn render(&self) -> String {
        render(&self.state(), &self.presentation)
    }
}
