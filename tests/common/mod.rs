//! Helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cloud_reload::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub name: String,
    pub level: String,
}

impl AppConfig {
    pub fn new(name: &str, level: &str) -> Self {
        Self {
            name: name.to_string(),
            level: level.to_string(),
        }
    }
}

/// Write `cfg.yaml` into `dir` and return its path.
pub fn write_yaml(dir: &Path, name: &str, level: &str) -> PathBuf {
    let path = dir.join("cfg.yaml");
    std::fs::write(&path, format!("name: {}\nlevel: {}\n", name, level)).unwrap();
    path
}

pub fn read_yaml(path: &Path) -> AppConfig {
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Remote provider driven entirely by the test.
///
/// `fetch` returns the current document or fails when none is set. `watch`
/// pops the next scripted answer and reports "no change" once the script
/// runs out.
#[derive(Default)]
pub struct ScriptedProvider {
    document: Mutex<Option<String>>,
    script: Mutex<VecDeque<Result<bool>>>,
    watches: AtomicUsize,
}

impl ScriptedProvider {
    pub fn with_document(document: &str) -> Self {
        let provider = Self::default();
        provider.set_document(document);
        provider
    }

    pub fn set_document(&self, document: &str) {
        *self.document.lock().unwrap() = Some(document.to_string());
    }

    pub fn push_watch(&self, answer: Result<bool>) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn watch_count(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteProvider for ScriptedProvider {
    async fn fetch(&self, key_path: &str) -> Result<Vec<u8>> {
        self.document
            .lock()
            .unwrap()
            .clone()
            .map(String::into_bytes)
            .ok_or_else(|| ConfigError::SourceUnavailable(format!("no document at {}", key_path)))
    }

    async fn watch(&self, _key_path: &str) -> Result<bool> {
        self.watches.fetch_add(1, Ordering::SeqCst);
        let answer = self.script.lock().unwrap().pop_front();
        answer.unwrap_or(Ok(false))
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
