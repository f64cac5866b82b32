//! In-memory relay connector for tests.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;

use crate::{error::NostrError, event::Event, filter::Filter, relay_client::RelayConnector};

/// Serves a fixed event set per relay URL and records every query.
#[derive(Default)]
pub struct StaticConnector {
    events: HashMap<String, Vec<Event>>,
    delays: HashMap<String, Duration>,
    queried: Mutex<Vec<String>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, relay_url: &str, events: Vec<Event>) -> Self {
        self.events.entry(relay_url.to_owned()).or_default().extend(events);
        self
    }

    pub fn delay_for(mut self, relay_url: &str, delay: Duration) -> Self {
        self.delays.insert(relay_url.to_owned(), delay);
        self
    }

    /// Relay URLs queried so far, in order.
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls(&self) -> usize {
        self.queried().len()
    }
}

#[async_trait]
impl RelayConnector for StaticConnector {
    async fn query(&self, relay_url: &str, _filter: &Filter) -> Result<Vec<Event>, NostrError> {
        self.queried.lock().unwrap_or_else(PoisonError::into_inner).push(relay_url.to_owned());
        if let Some(delay) = self.delays.get(relay_url) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self.events.get(relay_url).cloned().unwrap_or_default())
    }
}
