//! Viewer-side content state
//!
//! Drives one content pane: loading, ready, or failed with a retry action.
//! Background updates from the loader are forwarded into the state while
//! the view is alive and still showing the same request.

use crate::error::{ContentError, ErrorClass};
use crate::fetcher::ContentFetcher;
use crate::loader::ContentLoader;
use crate::record::ContentRecord;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentState {
    Idle,
    Loading,
    Ready(ContentRecord),
    Failed { message: String, retryable: bool },
}

impl ContentState {
    /// Every load failure offers a manual retry except rejected credentials
    fn from_error(error: &ContentError) -> Self {
        Self::Failed {
            message: error.user_message(),
            retryable: error.class() != ErrorClass::Auth,
        }
    }

    pub fn record(&self) -> Option<&ContentRecord> {
        match self {
            Self::Ready(record) => Some(record),
            _ => None,
        }
    }
}

pub struct ContentView<F: ContentFetcher> {
    loader: ContentLoader<F>,
    state: Arc<watch::Sender<ContentState>>,
    forwarder: Option<JoinHandle<()>>,
    last_request: Option<(String, String)>,
}

impl<F: ContentFetcher> ContentView<F> {
    pub fn new(loader: ContentLoader<F>) -> Self {
        let (state, _) = watch::channel(ContentState::Idle);
        Self {
            loader,
            state: Arc::new(state),
            forwarder: None,
            last_request: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ContentState {
        self.state.borrow().clone()
    }

    /// Show `country/path`; returns the state once the synchronous part is done
    pub async fn load(&mut self, country: &str, path: &str) -> ContentState {
        self.stop_forwarding();
        self.last_request = Some((country.to_string(), path.to_string()));
        self.state.send_replace(ContentState::Loading);

        let load = match self.loader.load_content(country, path).await {
            Ok(load) => load,
            Err(e) => {
                let failed = ContentState::from_error(&e);
                self.state.send_replace(failed.clone());
                return failed;
            }
        };

        // Publish the cached record before a background update can replace it
        let ready = ContentState::Ready(load.record);
        self.state.send_replace(ready.clone());

        if let Some(revalidation) = load.revalidation {
            let state = Arc::clone(&self.state);
            self.forwarder = Some(tokio::spawn(async move {
                if let Some(fresh) = revalidation.updated().await {
                    debug!(version = %fresh.version_tag, "Showing revalidated content");
                    state.send_replace(ContentState::Ready(fresh));
                }
            }));
        }

        ready
    }

    /// Re-run the last request (the error panel's retry button)
    pub async fn retry(&mut self) -> Option<ContentState> {
        let (country, path) = self.last_request.clone()?;
        Some(self.load(&country, &path).await)
    }

    fn stop_forwarding(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl<F: ContentFetcher> Drop for ContentView<F> {
    fn drop(&mut self) {
        // Stops notifications only; the revalidation's cache write still completes
        self.stop_forwarding();
    }
}
