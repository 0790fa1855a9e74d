//! Duplicate call suppression.
//!
//! [`SingleFlight`] coalesces concurrent calls for the same key into one
//! execution: the first caller runs its work future, every overlapping
//! caller waits for that result instead of running its own. The in-flight
//! table is locked for bookkeeping only; no caller ever blocks while
//! holding it. A flight is deregistered the moment it completes, so
//! results are shared only between calls that overlap in time. Nothing is
//! memoized here; caching is the store's job, not the coalescer's.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

type Outcome<T, E> = Option<Result<T, E>>;
type FlightMap<T, E> = HashMap<String, watch::Receiver<Outcome<T, E>>>;

/// A keyed coalescer for fallible async work.
pub struct SingleFlight<T, E> {
    flights: Mutex<FlightMap<T, E>>,
}

/// What a caller found in the flight table: either it leads the flight
/// and owes everyone a result broadcast, or it waits on one already in
/// the air.
enum Flight<T, E> {
    Lead(watch::Sender<Outcome<T, E>>),
    Wait(watch::Receiver<Outcome<T, E>>),
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, unless a call for the same key is already
    /// in flight, in which case wait for that call's outcome instead.
    ///
    /// Exactly one of a set of overlapping callers executes; all of them
    /// receive a clone of the same `Result`, errors included. If the
    /// executing caller is cancelled mid-flight, its registration is
    /// dropped and one waiter takes over with its own work future.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let mut work = Some(work);
        loop {
            match self.join(key) {
                Flight::Lead(tx) => {
                    let _deregister = Deregister {
                        flights: &self.flights,
                        key,
                    };
                    let work = work.take().expect("work future consumed once");
                    let result = work.await;
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
                Flight::Wait(mut rx) => loop {
                    {
                        let outcome = rx.borrow();
                        if let Some(result) = outcome.as_ref() {
                            return result.clone();
                        }
                    }
                    if rx.changed().await.is_err() {
                        // The leader was cancelled; contend to take over.
                        break;
                    }
                },
            }
        }
    }

    /// Register under `key` or attach to the flight already registered
    /// there. The table lock is confined to this call.
    fn join(&self, key: &str) -> Flight<T, E> {
        let mut flights = self.flights.lock();
        match flights.get(key) {
            Some(rx) => Flight::Wait(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                flights.insert(key.to_owned(), rx);
                Flight::Lead(tx)
            }
        }
    }
}

/// Removes the in-flight entry when the executing call ends, whether by
/// publishing a result or by being dropped mid-flight.
struct Deregister<'a, T, E> {
    flights: &'a Mutex<FlightMap<T, E>>,
    key: &'a str,
}

impl<T, E> Drop for Deregister<'_, T, E> {
    fn drop(&mut self) {
        self.flights.lock().remove(self.key);
    }
}
