//! Shared fixtures for loader tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use guidebook_core::{CacheConfig, ContentCache, ContentError, ContentFetcher};
use guidebook_types::ContentData;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

#[derive(Clone)]
pub enum Reply {
    Content(ContentData),
    NotFound,
    NetworkDown,
}

/// Fetcher returning scripted replies, optionally held behind a gate
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, country: &str, path: &str, reply: Reply) {
        self.replies
            .lock()
            .insert(format!("{country}/{path}"), reply);
    }

    /// Hold every fetch until the returned gate is notified
    pub fn gated(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, country: &str, path: &str) -> Result<ContentData, ContentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reply = self
            .replies
            .lock()
            .get(&format!("{country}/{path}"))
            .cloned()
            .unwrap_or(Reply::NotFound);

        match reply {
            Reply::Content(data) => Ok(data),
            Reply::NotFound => Err(ContentError::ContentNotFound {
                country: country.to_string(),
                path: path.to_string(),
            }),
            Reply::NetworkDown => Err(ContentError::Network {
                message: "connection refused".to_string(),
                source: None,
            }),
        }
    }
}

pub fn content(body: &str, tag: &str, minute: u32) -> ContentData {
    ContentData::new(
        body,
        tag,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
    )
}

pub fn temp_cache() -> (TempDir, Arc<ContentCache>) {
    let dir = tempfile::tempdir().unwrap();
    let cache = ContentCache::open(dir.path(), CacheConfig::default()).unwrap();
    (dir, Arc::new(cache))
}
