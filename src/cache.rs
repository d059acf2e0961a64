//! A TTL-bounded cache in front of the upstream fetch, with single-flight
//! refresh coordination and last-known-good fallback on upstream failure.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::warn;

use crate::model::{entries_from_services, DirectoryEntry};
use crate::upstream::UpstreamClient;

struct Inner {
    entries: Vec<DirectoryEntry>,
    last_refresh: Option<Instant>,
    refreshing: bool,
}

/// Shared, thread-safe front end to the service catalog.
///
/// `get_entries` never fails and never blocks longer than `ttl_seconds`: at
/// most one thread performs the actual upstream fetch at a time, and
/// everyone else either gets the fresh result or falls back to whatever was
/// last known good.
pub struct LazyCache {
    state: Mutex<Inner>,
    refreshed: Condvar,
    upstream: Mutex<Arc<UpstreamClient>>,
    base_dn: Mutex<String>,
    ttl: Mutex<Duration>,
}

impl LazyCache {
    pub fn new(upstream: UpstreamClient, base_dn: String, ttl_seconds: u64) -> Self {
        LazyCache {
            state: Mutex::new(Inner {
                entries: Vec::new(),
                last_refresh: None,
                refreshing: false,
            }),
            refreshed: Condvar::new(),
            upstream: Mutex::new(Arc::new(upstream)),
            base_dn: Mutex::new(base_dn),
            ttl: Mutex::new(Duration::from_secs(ttl_seconds.max(1))),
        }
    }

    fn ttl(&self) -> Duration {
        *self.ttl.lock().unwrap()
    }

    /// Return the current entry list, refreshing it first if the cached
    /// copy has expired. Never panics, never returns an error: on upstream
    /// failure this returns whatever was last cached (possibly empty).
    pub fn get_entries(&self) -> Vec<DirectoryEntry> {
        let ttl = self.ttl();
        {
            let guard = self.state.lock().unwrap();
            if Self::is_fresh(&guard, ttl) {
                return guard.entries.clone();
            }
            if guard.refreshing {
                let (guard, _timeout) = self
                    .refreshed
                    .wait_timeout(guard, ttl)
                    .unwrap();
                return guard.entries.clone();
            }
        }
        self.refresh_as_owner(ttl)
    }

    /// Force the next `get_entries` call to refresh, and swap in new
    /// upstream/base_dn/ttl settings — used when the config is reloaded.
    pub fn reload_settings(&self, upstream: UpstreamClient, base_dn: String, ttl_seconds: u64) {
        *self.upstream.lock().unwrap() = Arc::new(upstream);
        *self.base_dn.lock().unwrap() = base_dn;
        *self.ttl.lock().unwrap() = Duration::from_secs(ttl_seconds.max(1));
        let mut guard = self.state.lock().unwrap();
        guard.last_refresh = None;
    }

    fn is_fresh(inner: &Inner, ttl: Duration) -> bool {
        matches!(inner.last_refresh, Some(t) if t.elapsed() < ttl)
    }

    fn refresh_as_owner(&self, ttl: Duration) -> Vec<DirectoryEntry> {
        {
            let mut guard = self.state.lock().unwrap();
            // Another thread may have claimed refresh ownership, or
            // finished a refresh, between releasing the lock above and
            // acquiring it again here; re-check before claiming.
            if Self::is_fresh(&guard, ttl) {
                return guard.entries.clone();
            }
            if guard.refreshing {
                let (guard, _timeout) = self.refreshed.wait_timeout(guard, ttl).unwrap();
                return guard.entries.clone();
            }
            guard.refreshing = true;
        }

        let upstream = Arc::clone(&self.upstream.lock().unwrap());
        let base_dn = self.base_dn.lock().unwrap().clone();
        let fetched = upstream.fetch_services();

        let mut guard = self.state.lock().unwrap();
        let result = match fetched {
            Ok(services) => {
                let entries = entries_from_services(&services, &base_dn);
                guard.entries = entries.clone();
                guard.last_refresh = Some(Instant::now());
                entries
            }
            Err(e) => {
                warn!("upstream refresh failed, serving last-known-good: {e}");
                guard.entries.clone()
            }
        };
        guard.refreshing = false;
        self.refreshed.notify_all();
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn unreachable_upstream() -> UpstreamClient {
        // Nodes that resolve but refuse connections fast: loopback on an
        // unused port. fetch_services() fails quickly without real network
        // access, which is all these tests need.
        UpstreamClient::new(
            vec!["127.0.0.1:1".to_string()],
            Duration::from_millis(200),
            "phone".to_string(),
        )
    }

    #[test]
    fn test_empty_on_first_failure() {
        let cache = LazyCache::new(unreachable_upstream(), "dc=local,dc=mesh".to_string(), 60);
        assert!(cache.get_entries().is_empty());
    }

    #[test]
    fn test_reload_settings_forces_refresh() {
        let cache = LazyCache::new(unreachable_upstream(), "dc=local,dc=mesh".to_string(), 60);
        let _ = cache.get_entries();
        let last_refresh_before = cache.state.lock().unwrap().last_refresh;
        assert!(last_refresh_before.is_none());
        cache.reload_settings(unreachable_upstream(), "dc=other,dc=mesh".to_string(), 30);
        assert_eq!(*cache.base_dn.lock().unwrap(), "dc=other,dc=mesh");
    }

    #[test]
    fn test_single_flight_under_concurrent_readers() {
        let cache = Arc::new(LazyCache::new(
            unreachable_upstream(),
            "dc=local,dc=mesh".to_string(),
            60,
        ));
        let readers = 8;
        let barrier = Arc::new(Barrier::new(readers));
        let started = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..readers {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let started = Arc::clone(&started);
            handles.push(thread::spawn(move || {
                started.fetch_add(1, Ordering::SeqCst);
                barrier.wait();
                cache.get_entries()
            }));
        }
        for h in handles {
            assert!(h.join().unwrap().is_empty());
        }
        assert_eq!(started.load(Ordering::SeqCst), readers);
    }
}
