use crate::config::{Settings, Term};
use crate::credentials::Credentials;
use crate::error::Result;
use crate::session;
use crate::store::SnapshotStore;
use crate::structs::Snapshot;

use log::{debug, info};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Live,
    CachedIfPresent,
}

/// Where live payloads come from.
pub trait Source {
    fn fetch_live(&self, term: &Term) -> impl Future<Output = Result<String>>;
}

/// Registration data behind the SSO login.
pub struct Portal<'a> {
    settings: &'a Settings,
    creds: &'a Credentials,
}

impl<'a> Portal<'a> {
    pub fn new(settings: &'a Settings, creds: &'a Credentials) -> Self {
        Self { settings, creds }
    }

    fn timeout(&self) -> Option<Duration> {
        self.settings.timeout_secs.map(Duration::from_secs)
    }
}

impl Source for Portal<'_> {
    /// Logs in with the term's registration URL as the target, then asks for
    /// it again over the authenticated session. Error statuses never count
    /// as a payload.
    async fn fetch_live(&self, term: &Term) -> Result<String> {
        let url = self.settings.registration_url_for(term);
        let (session, _) = session::login(&url, self.creds, self.timeout()).await?;
        let response = session.fetch(&url).await?;
        debug!("{} answered {}", response.url, response.status);
        Ok(response.body)
    }
}

pub struct Fetcher<'a, S> {
    source: S,
    store: &'a SnapshotStore,
}

impl<'a, S: Source> Fetcher<'a, S> {
    pub fn new(source: S, store: &'a SnapshotStore) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &SnapshotStore {
        self.store
    }

    /// Every live fetch replaces the stored snapshot for the term, so read
    /// the old one first if you need it.
    pub async fn fetch(&self, term: &Term, mode: FetchMode) -> Result<String> {
        let key = term.key();
        if mode == FetchMode::CachedIfPresent {
            if let Some(snapshot) = self.store.get(&key)? {
                info!(
                    "Cached data available from {}",
                    snapshot.captured_at.format("%Y-%m-%d %H:%M")
                );
                return Ok(snapshot.raw_payload);
            }
        }
        Ok(self.refresh(term).await?.raw_payload)
    }

    /// The `Live` path: fetch, store, and return the new snapshot.
    pub async fn refresh(&self, term: &Term) -> Result<Snapshot> {
        let payload = self.source.fetch_live(term).await?;
        self.store.put(&term.key(), &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Quarter;
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
        payload: &'static str,
    }

    impl Source for &Counting {
        async fn fetch_live(&self, _term: &Term) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.payload.to_string())
        }
    }

    #[tokio::test]
    async fn cached_mode_skips_the_network_when_a_snapshot_exists() {
        let store = SnapshotStore::in_memory().unwrap();
        let source = Counting {
            calls: Cell::new(0),
            payload: "live",
        };
        let term = Term::new(2017, Quarter::Fall);
        let fetcher = Fetcher::new(&source, &store);

        assert_eq!(fetcher.fetch(&term, FetchMode::CachedIfPresent).await.unwrap(), "live");
        assert_eq!(source.calls.get(), 1);

        store.put(&term.key(), "cached").unwrap();
        assert_eq!(fetcher.fetch(&term, FetchMode::CachedIfPresent).await.unwrap(), "cached");
        assert_eq!(source.calls.get(), 1);
    }

    #[tokio::test]
    async fn live_mode_always_fetches_and_overwrites() {
        let store = SnapshotStore::in_memory().unwrap();
        let source = Counting {
            calls: Cell::new(0),
            payload: "fresh",
        };
        let term = Term::new(2018, Quarter::Winter);
        store.put(&term.key(), "stale").unwrap();

        let fetcher = Fetcher::new(&source, &store);
        assert_eq!(fetcher.fetch(&term, FetchMode::Live).await.unwrap(), "fresh");
        assert_eq!(source.calls.get(), 1);
        assert_eq!(store.get(&term.key()).unwrap().unwrap().raw_payload, "fresh");
    }
}
