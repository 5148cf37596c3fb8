//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by rename keep triggering reloads. Events for other
//! files and saves that leave the contents unchanged are dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::AppConfig;

pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the channel on which reloaded configurations arrive.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (Self { path: path.to_path_buf(), updates }, rx)
    }

    /// Start watching. Reloading stops when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let path = self.path.clone();
        let updates = self.updates;
        let last_seen = Arc::new(Mutex::new(fs::read_to_string(&path).ok()));

        let handler = move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }
            if !event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name) {
                return;
            }

            let Ok(content) = fs::read_to_string(&path) else {
                return;
            };
            {
                let Ok(mut last) = last_seen.lock() else {
                    return;
                };
                if last.as_deref() == Some(content.as_str()) {
                    return;
                }
                *last = Some(content.clone());
            }

            match parse_config(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Config file changed; reloading");
                    let _ = updates.send(config);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Ignoring invalid config file; keeping current configuration");
                }
            }
        };

        let mut watcher = RecommendedWatcher::new(handler, Config::default().with_poll_interval(Duration::from_secs(2)))?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_on_change_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onboard-hero.toml");
        fs::write(&path, "[rate_limit]\nrequests = 10\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        fs::write(&path, "[rate_limit]\nwindow_secs = 0\n").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(&path, "[rate_limit]\nrequests = 25\n").unwrap();

        let config = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no reload")
            .unwrap();
        assert_eq!(config.rate_limit.requests, 25);
    }
}
