//! A named, expiring lock held through the store, renewed in the background for
//! as long as the guard lives.

use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Leases;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct LeaseLock {
    pub name: String,
    pub ttl: Duration,
    /// How long `acquire` keeps trying before giving up.
    pub wait: Duration,
}

impl LeaseLock {

    pub fn new(name: &str, ttl: Duration, wait: Duration) -> Self {

        return Self {
            name: name.to_string(),
            ttl,
            wait,
        };
    }

    pub fn acquire<L: Leases + ?Sized + 'static>(&self, store: Arc<L>) -> Result<LeaseGuard<L>> {

        let token = Uuid::new_v4().simple().to_string();
        let deadline = Instant::now() + self.wait;

        loop {
            if store.try_acquire_lease(&self.name, &token, self.ttl)? {
                debug!("Acquired lease {} as {}", self.name, token);
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::LockTimeout(self.name.clone()));
            }
            thread::sleep(POLL_INTERVAL.min(self.wait));
        }

        let (stop, stopped) = mpsc::channel::<()>();
        let renew_every = (self.ttl / 3).max(Duration::from_millis(1));

        let renewer = {
            let store = store.clone();
            let name = self.name.clone();
            let token = token.clone();
            let ttl = self.ttl;

            thread::spawn(move || loop {
                match stopped.recv_timeout(renew_every) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                match store.renew_lease(&name, &token, ttl) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!("Lease {} was lost before the holder finished", name);
                        break;
                    }
                    Err(e) => {
                        warn!("Renewing lease {} failed: {}", name, e);
                        break;
                    }
                }
            })
        };

        return Ok(LeaseGuard {
            store,
            name: self.name.clone(),
            token,
            stop: Some(stop),
            renewer: Some(renewer),
        });
    }
}

/// Holds a lease until dropped.
pub struct LeaseGuard<L: Leases + ?Sized + 'static> {
    store: Arc<L>,
    name: String,
    token: String,
    stop: Option<Sender<()>>,
    renewer: Option<JoinHandle<()>>,
}

impl<L: Leases + ?Sized + 'static> LeaseGuard<L> {

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl<L: Leases + ?Sized + 'static> Drop for LeaseGuard<L> {

    fn drop(&mut self) {

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(renewer) = self.renewer.take() {
            let _ = renewer.join();
        }
        if let Err(e) = self.store.release_lease(&self.name, &self.token) {
            warn!("Releasing lease {} failed: {}", self.name, e);
        }
        debug!("Released lease {}", self.name);
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn second_holder_times_out() {

        let store = Arc::new(MemoryStore::new());
        let lock = LeaseLock::new("name-lock", Duration::from_secs(30), Duration::from_millis(250));

        let _held = lock.acquire(store.clone()).unwrap();
        let start = Instant::now();
        let second = lock.acquire(store.clone());

        assert!(matches!(second, Err(Error::LockTimeout(ref name)) if name == "name-lock"));
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn drop_releases() {

        let store = Arc::new(MemoryStore::new());
        let lock = LeaseLock::new("name-lock", Duration::from_secs(30), Duration::from_millis(100));

        {
            let guard = lock.acquire(store.clone()).unwrap();
            assert!(!store.try_acquire_lease("name-lock", "someone-else", Duration::from_secs(1)).unwrap());
            assert_eq!(guard.token().len(), 32);
        }

        assert!(store.try_acquire_lease("name-lock", "someone-else", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn renewal_outlives_ttl() {

        let store = Arc::new(MemoryStore::new());
        let lock = LeaseLock::new("name-lock", Duration::from_millis(150), Duration::from_millis(50));

        let _guard = lock.acquire(store.clone()).unwrap();
        thread::sleep(Duration::from_millis(500));

        assert!(!store.try_acquire_lease("name-lock", "someone-else", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn waits_for_expired_holder() {

        let store = Arc::new(MemoryStore::new());
        // a crashed holder that never renews
        assert!(store.try_acquire_lease("name-lock", "crashed", Duration::from_millis(150)).unwrap());

        let lock = LeaseLock::new("name-lock", Duration::from_secs(30), Duration::from_secs(5));
        let guard = lock.acquire(store.clone()).unwrap();
        assert_ne!(guard.token(), "crashed");
    }
}
