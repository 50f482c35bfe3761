//! Debounced background address search.
//!
//! Every [`DebouncedSearch::push`] replaces the pending input and restarts
//! the quiet period. A search only starts once the input has been stable
//! for the whole delay, and a search that is still in flight when new
//! input arrives is dropped without producing a result. Results are
//! delivered in order through [`DebouncedSearch::next`].
//!
//! The loop stops when the handle is closed or dropped.

use std::sync::Arc;
use std::time::Duration;

use citysecure_dispatch_models::Address;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::address::normalize_query;
use crate::{AddressLookup, GeocodeError};

const RESULT_BUFFER: usize = 16;

/// One completed search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Normalized query that was sent.
    pub query: String,
    /// Matches, or why the search failed.
    pub result: Result<Vec<Address>, GeocodeError>,
}

/// Handle to a running debounced search loop.
pub struct DebouncedSearch {
    input: watch::Sender<String>,
    results: mpsc::Receiver<SearchOutcome>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    /// Spawns the search loop on the current tokio runtime.
    ///
    /// Queries shorter than `min_len` characters (after normalization) are
    /// ignored.
    #[must_use]
    pub fn spawn(lookup: Arc<dyn AddressLookup>, delay: Duration, min_len: usize) -> Self {
        let (input, input_rx) = watch::channel(String::new());
        let (results_tx, results) = mpsc::channel(RESULT_BUFFER);

        let task = tokio::spawn(run(lookup, input_rx, results_tx, delay, min_len));

        Self {
            input,
            results,
            task,
        }
    }

    /// Replaces the current input.
    pub fn push(&self, text: impl Into<String>) {
        self.input.send_replace(text.into());
    }

    /// Waits for the next completed search. Returns `None` once the loop
    /// has stopped and every result has been received.
    pub async fn next(&mut self) -> Option<SearchOutcome> {
        self.results.recv().await
    }

    /// Returns a completed search if one is ready, without waiting.
    pub fn try_next(&mut self) -> Option<SearchOutcome> {
        self.results.try_recv().ok()
    }

    /// Stops the loop, abandoning any pending or in-flight search.
    pub async fn close(self) {
        let Self { input, task, .. } = self;
        drop(input);
        if let Err(e) = task.await {
            log::warn!("Address search task ended abnormally: {e}");
        }
    }
}

async fn run(
    lookup: Arc<dyn AddressLookup>,
    mut input: watch::Receiver<String>,
    results: mpsc::Sender<SearchOutcome>,
    delay: Duration,
    min_len: usize,
) {
    // Set when a search was superseded: the change that cancelled it has
    // already been consumed, so skip waiting for another one.
    let mut pending = false;

    'outer: loop {
        if !pending && input.changed().await.is_err() {
            break;
        }
        pending = false;

        // Quiet period; any new input restarts it.
        loop {
            tokio::select! {
                () = tokio::time::sleep(delay) => break,
                changed = input.changed() => {
                    if changed.is_err() {
                        break 'outer;
                    }
                }
            }
        }

        let raw = input.borrow_and_update().clone();
        let Some(query) = normalize_query(&raw).filter(|q| q.chars().count() >= min_len) else {
            log::trace!("Ignoring short address query {raw:?}");
            continue;
        };

        log::debug!("Searching addresses for {query:?}");

        tokio::select! {
            result = lookup.search(&query) => {
                let outcome = SearchOutcome { query: query.clone(), result };
                if results.send(outcome).await.is_err() {
                    break;
                }
            }
            changed = input.changed() => {
                if changed.is_err() {
                    break;
                }
                log::debug!("Address search for {query:?} superseded by newer input");
                pending = true;
            }
        }
    }

    log::trace!("Address search loop stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::GeocodedAddress;

    struct RecordingLookup {
        latency: Duration,
        queries: Mutex<Vec<String>>,
    }

    impl RecordingLookup {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                latency,
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AddressLookup for RecordingLookup {
        async fn search(&self, text: &str) -> Result<Vec<Address>, GeocodeError> {
            self.queries.lock().unwrap().push(text.to_string());
            tokio::time::sleep(self.latency).await;
            Ok(vec![Address {
                id: 1,
                calle: Some(text.to_string()),
                numero: None,
                manzana: None,
                lote: None,
                urbanizacion: None,
                direccion_completa: Some(text.to_string()),
                sector_id: None,
                cuadrante_id: None,
                latitud: None,
                longitud: None,
                ubigeo_code: None,
            }])
        }

        async fn geocode(&self, _text: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
            Ok(None)
        }
    }

    const DELAY: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn burst_of_input_searches_once() {
        let lookup = RecordingLookup::new(Duration::ZERO);
        let mut search = DebouncedSearch::spawn(lookup.clone(), DELAY, 3);

        search.push("Jr");
        search.push("Jr Ica");
        search.push("Jr  Ica 123");

        let outcome = search.next().await.unwrap();
        assert_eq!(outcome.query, "Jr Ica 123");
        assert_eq!(outcome.result.unwrap().len(), 1);
        assert_eq!(lookup.queries(), vec!["Jr Ica 123".to_string()]);

        search.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn new_input_restarts_the_quiet_period() {
        let lookup = RecordingLookup::new(Duration::ZERO);
        let mut search = DebouncedSearch::spawn(lookup.clone(), DELAY, 3);

        search.push("Jr Ica");
        tokio::time::sleep(Duration::from_millis(300)).await;
        search.push("Jr Ica 123");
        tokio::time::sleep(Duration::from_millis(300)).await;

        // 600ms after the first keystroke, but only 300ms after the last.
        assert!(search.try_next().is_none());
        assert!(lookup.queries().is_empty());

        let outcome = search.next().await.unwrap();
        assert_eq!(outcome.query, "Jr Ica 123");
        assert_eq!(lookup.queries().len(), 1);

        search.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn short_queries_are_not_sent() {
        let lookup = RecordingLookup::new(Duration::ZERO);
        let mut search = DebouncedSearch::spawn(lookup.clone(), DELAY, 3);

        search.push(" ab ");
        tokio::time::sleep(DELAY * 2).await;
        assert!(lookup.queries().is_empty());

        search.push("abc");
        let outcome = search.next().await.unwrap();
        assert_eq!(outcome.query, "abc");

        search.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_search_is_dropped_when_superseded() {
        let lookup = RecordingLookup::new(Duration::from_secs(1));
        let mut search = DebouncedSearch::spawn(lookup.clone(), DELAY, 3);

        search.push("Av. Lima");
        // The first search starts at 500ms and would finish at 1500ms.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(lookup.queries(), vec!["Av. Lima".to_string()]);

        search.push("Av. Lima 200");
        let outcome = search.next().await.unwrap();
        assert_eq!(outcome.query, "Av. Lima 200");
        assert_eq!(lookup.queries().len(), 2);
        assert!(search.try_next().is_none());

        search.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_the_loop() {
        let lookup = RecordingLookup::new(Duration::ZERO);
        let search = DebouncedSearch::spawn(lookup.clone(), DELAY, 3);
        search.push("Jr Ica");
        search.close().await;
        assert!(lookup.queries().is_empty());
    }
}
