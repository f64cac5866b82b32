//! Peer query aggregator.
//!
//! The pool holds the list of known peer relays in a randomised order fixed at
//! construction. A shared cursor advances once per attempt, so consecutive
//! queries (including concurrent ones) start at different peers and spread
//! load across the list.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::{event::Event, filter::Filter, relay_client::RelayConnector};

/// Tuning knobs for [`PeerPool`].
#[derive(Debug, Clone, Copy)]
pub struct PeerPoolConfig {
    /// Maximum number of peers contacted per query.
    pub attempts: usize,
    /// Deadline for each individual peer.
    pub timeout: Duration,
}

impl Default for PeerPoolConfig {
    fn default() -> Self {
        Self { attempts: 4, timeout: Duration::from_secs(2) }
    }
}

pub struct PeerPool {
    peers: Vec<String>,
    cursor: AtomicUsize,
    connector: Arc<dyn RelayConnector>,
    config: PeerPoolConfig,
}

impl PeerPool {
    /// Create a pool, shuffling `peers` once.
    pub fn new(
        mut peers: Vec<String>,
        connector: Arc<dyn RelayConnector>,
        config: PeerPoolConfig,
    ) -> Self {
        peers.shuffle(&mut rand::rng());
        Self::from_ordered(peers, connector, config)
    }

    /// Create a pool that keeps `peers` in the order given.
    pub fn from_ordered(
        peers: Vec<String>,
        connector: Arc<dyn RelayConnector>,
        config: PeerPoolConfig,
    ) -> Self {
        Self { peers, cursor: AtomicUsize::new(0), connector, config }
    }

    /// Query up to `attempts` distinct peers in sequence and merge what they return.
    ///
    /// Every returned event has a valid id and signature, matches `filter`,
    /// and appears once. Stops early as soon as `max_results` distinct events
    /// are collected. Peer failures and timeouts are skipped, never surfaced.
    pub async fn query(&self, filter: &Filter, max_results: usize) -> Vec<Event> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        if self.peers.is_empty() || max_results == 0 {
            return results;
        }

        for _ in 0..self.config.attempts.min(self.peers.len()) {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.peers.len();
            let peer = &self.peers[index];

            let events = match tokio::time::timeout(
                self.config.timeout,
                self.connector.query(peer, filter),
            )
            .await
            {
                Ok(Ok(events)) => events,
                Ok(Err(e)) => {
                    debug!(peer = %peer, error = %e, "Peer query failed");
                    continue;
                }
                Err(_) => {
                    debug!(peer = %peer, "Peer query timed out");
                    continue;
                }
            };

            for event in events {
                if !filter.matches(&event) || seen.contains(&event.id) {
                    continue;
                }
                if let Err(e) = event.verify() {
                    warn!(peer = %peer, error = %e, "Dropping invalid event from peer");
                    continue;
                }
                seen.insert(event.id.clone());
                results.push(event);
                if results.len() >= max_results {
                    return results;
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{EventBuilder, kind},
        keys::Keys,
        testing::StaticConnector,
    };

    fn note(content: &str) -> Event {
        let keys = Keys::from_secret_bytes(&[11u8; 32]).unwrap();
        EventBuilder::new(kind::TEXT_NOTE, 100, content).sign(&keys).unwrap()
    }

    fn pool(connector: Arc<StaticConnector>, config: PeerPoolConfig) -> PeerPool {
        PeerPool::from_ordered(
            vec!["wss://a".into(), "wss://b".into(), "wss://c".into()],
            connector,
            config,
        )
    }

    #[tokio::test]
    async fn merges_and_deduplicates_across_peers() {
        let shared = note("shared");
        let only_b = note("only b");
        let connector = Arc::new(
            StaticConnector::new()
                .with("wss://a", vec![shared.clone()])
                .with("wss://b", vec![shared.clone(), only_b.clone()]),
        );
        let pool = pool(connector, PeerPoolConfig::default());

        let events = pool.query(&Filter::new().kind(kind::TEXT_NOTE), 10).await;
        let ids: Vec<_> = events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![shared.id, only_b.id]);
    }

    #[tokio::test]
    async fn stops_at_max_results() {
        let event = note("one");
        let connector = Arc::new(
            StaticConnector::new().with("wss://a", vec![event.clone()]).with("wss://b", vec![event]),
        );
        let pool = pool(connector.clone(), PeerPoolConfig::default());

        let events = pool.query(&Filter::new(), 1).await;
        assert_eq!(events.len(), 1);
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn cursor_advances_between_queries() {
        let connector = Arc::new(StaticConnector::new());
        let config = PeerPoolConfig { attempts: 1, ..Default::default() };
        let pool = pool(connector.clone(), config);

        pool.query(&Filter::new(), 1).await;
        pool.query(&Filter::new(), 1).await;
        assert_eq!(connector.queried(), vec!["wss://a".to_owned(), "wss://b".to_owned()]);
    }

    #[tokio::test]
    async fn each_peer_is_asked_once_per_query() {
        let connector = Arc::new(StaticConnector::new().with("wss://a", vec![note("a")]));
        let pool = PeerPool::from_ordered(
            vec!["wss://a".into()],
            connector.clone(),
            PeerPoolConfig::default(),
        );

        assert_eq!(pool.query(&Filter::new(), 10).await.len(), 1);
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn slow_peer_is_skipped() {
        let fast = note("fast");
        let connector = Arc::new(
            StaticConnector::new()
                .with("wss://a", vec![note("slow")])
                .with("wss://b", vec![fast.clone()])
                .delay_for("wss://a", Duration::from_millis(200)),
        );
        let config = PeerPoolConfig { attempts: 2, timeout: Duration::from_millis(20) };
        let pool = pool(connector, config);

        let events = pool.query(&Filter::new(), 5).await;
        assert_eq!(events, vec![fast]);
    }

    #[tokio::test]
    async fn drops_events_with_bad_signatures_or_wrong_shape() {
        let mut forged = note("forged");
        forged.content = "tampered".into();
        let metadata = EventBuilder::new(kind::METADATA, 1, "{}")
            .sign(&Keys::from_secret_bytes(&[12u8; 32]).unwrap())
            .unwrap();
        let connector =
            Arc::new(StaticConnector::new().with("wss://a", vec![forged, metadata]));
        let pool = pool(connector, PeerPoolConfig { attempts: 1, ..Default::default() });

        assert!(pool.query(&Filter::new().kind(kind::TEXT_NOTE), 5).await.is_empty());
    }

    #[tokio::test]
    async fn empty_pool_returns_nothing() {
        let pool = PeerPool::new(vec![], Arc::new(StaticConnector::new()), PeerPoolConfig::default());
        assert!(pool.query(&Filter::new(), 5).await.is_empty());
    }
}
