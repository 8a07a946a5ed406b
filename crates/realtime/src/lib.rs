//! Realtime subscription transport for amplify-todo
//!
//! This crate carries GraphQL subscriptions over the managed data service's
//! WebSocket endpoint (the `graphql-ws` subprotocol): connection handshake,
//! keep-alive supervision, start/stop of subscriptions and routing of data
//! frames to their subscribers.

mod client;
mod error;
mod message;
mod subscription;

pub use client::{ConnectionState, RealtimeClient, RealtimeClientOptions};
pub use error::RealtimeError;
pub use message::{MessageType, RealtimeMessage, SubscriptionEvent};
pub use subscription::{EventSink, Subscription, SubscriptionGroup};
