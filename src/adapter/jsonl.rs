//! JSON-lines file adapters
//!
//! Layout under the data directory:
//!
//! ```text
//! data/
//! ├── streams/<stream_type>/<stream_id>.jsonl   one event per line, append-only
//! ├── outbox/<channel>.jsonl                    outbox messages, append-only
//! └── snapshots/<view>/<stream_type>/<stream_id>/
//!     ├── latest.json
//!     └── previous.json                         backup of the prior snapshot
//! ```
//!
//! Appends are fsynced. Lines that fail to decode are skipped with a
//! warning so logs written by a newer schema stay readable.
//!
//! Path components are percent-encoded, so every stream, view and channel
//! gets its own files. A batch writes its outbox lines before its events;
//! the event append is the commit point. If it fails, nothing is committed
//! and the retried batch does not duplicate the outbox lines already written.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::types::{
    Event, OutboxMessage, SnapshotData, StoreResult, StoredSnapshot, StreamAddress, StreamCursor,
    ViewAddress, NO_OFFSET,
};
use crate::utils::{atomic_write_with_backup, read_optional};

use super::{check_append, EventStream, SnapshotAdapter, StreamAdapter};

/// Configuration for the JSONL adapters
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl JsonlConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to a stream's event log
    pub fn stream_path(&self, address: &StreamAddress) -> PathBuf {
        self.data_dir
            .join("streams")
            .join(encode_component(&address.stream_type))
            .join(format!("{}.jsonl", encode_component(&address.stream_id)))
    }

    /// Get path to an outbox channel log
    pub fn outbox_path(&self, channel: &str) -> PathBuf {
        self.data_dir
            .join("outbox")
            .join(format!("{}.jsonl", encode_component(channel)))
    }

    /// Get path to a view's snapshot directory
    pub fn snapshot_dir(&self, view: &ViewAddress) -> PathBuf {
        self.data_dir
            .join("snapshots")
            .join(encode_component(&view.view_name))
            .join(encode_component(&view.stream.stream_type))
            .join(encode_component(&view.stream.stream_id))
    }

    /// Get path to a view's latest snapshot
    pub fn latest_snapshot_path(&self, view: &ViewAddress) -> PathBuf {
        self.snapshot_dir(view).join("latest.json")
    }

    /// Get path to a view's previous snapshot (backup)
    pub fn previous_snapshot_path(&self, view: &ViewAddress) -> PathBuf {
        self.snapshot_dir(view).join("previous.json")
    }
}

/// Percent-encode one path component
///
/// Distinct names always map to distinct components. `.` and `..` are
/// spelled out so they never resolve to a directory.
fn encode_component(component: &str) -> String {
    match component {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => urlencoding::encode(component).into_owned(),
    }
}

/// Offset recorded on one JSONL line if it belongs to `address`
fn line_offset(line: &str, address: &StreamAddress) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let cursor = value.get("cursor")?;
    if cursor.get("streamType")?.as_str()? != address.stream_type
        || cursor.get("streamId")?.as_str()? != address.stream_id
    {
        return None;
    }
    cursor.get("offset")?.as_i64()
}

/// Append-only JSONL event log
pub struct JsonlStreamAdapter<E> {
    config: JsonlConfig,
    write_lock: Mutex<()>,
    _payload: PhantomData<fn() -> E>,
}

impl<E> JsonlStreamAdapter<E> {
    pub fn new(config: JsonlConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
            _payload: PhantomData,
        }
    }

    pub fn config(&self) -> &JsonlConfig {
        &self.config
    }

    async fn last_offset_on_disk(&self, address: &StreamAddress) -> EngineResult<i64> {
        let content = match read_optional(self.config.stream_path(address)).await? {
            Some(content) => content,
            None => return Ok(NO_OFFSET),
        };
        Ok(content
            .lines()
            .rev()
            .filter(|line| !line.trim().is_empty())
            .find_map(|line| line_offset(line, address))
            .unwrap_or(NO_OFFSET))
    }

    /// Lines still to append, dropping uncommitted ones already on disk
    ///
    /// Only lines flagged as belonging to offsets past the stored head are
    /// checked; each copy on disk absorbs one identical line.
    async fn unwritten_lines(path: &Path, lines: Vec<(String, bool)>) -> EngineResult<Vec<String>> {
        if !lines.iter().any(|(_, uncommitted)| *uncommitted) {
            return Ok(lines.into_iter().map(|(line, _)| line).collect());
        }
        let existing = read_optional(path).await?.unwrap_or_default();
        let mut on_disk: HashMap<&str, usize> = HashMap::new();
        for line in existing.lines() {
            *on_disk.entry(line).or_default() += 1;
        }

        Ok(lines
            .into_iter()
            .filter(|(line, uncommitted)| {
                if !uncommitted {
                    return true;
                }
                match on_disk.get_mut(line.as_str()) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        false
                    }
                    _ => true,
                }
            })
            .map(|(line, _)| line)
            .collect())
    }

    async fn append_lines(path: &Path, lines: &[String]) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        let mut buffer = String::new();
        for line in lines {
            buffer.push_str(line);
            buffer.push('\n');
        }
        file.write_all(buffer.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl<E> StreamAdapter<E> for JsonlStreamAdapter<E>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn get_events(&self, cursor: &StreamCursor) -> EventStream<E> {
        let path = self.config.stream_path(&cursor.address);
        let address = cursor.address.clone();
        let from = cursor.offset;

        Box::pin(async_stream::stream! {
            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
                Err(e) => {
                    yield Err(EngineError::from(e));
                    return;
                }
            };

            let mut lines = BufReader::new(file).lines();
            let mut line_num = 0usize;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(EngineError::from(e));
                        return;
                    }
                };
                line_num += 1;
                if line.trim().is_empty() {
                    continue;
                }

                match Event::<E>::from_json_line(&line) {
                    Ok(event) if event.cursor.address == address && event.offset() >= from => {
                        yield Ok(event)
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            line = line_num,
                            error = %e,
                            "skipping undecodable event"
                        );
                    }
                }
            }
        })
    }

    async fn get_last_offset(&self, address: &StreamAddress) -> EngineResult<i64> {
        self.last_offset_on_disk(address).await
    }

    async fn store_stream(
        &self,
        events: Vec<Event<E>>,
        messages: Vec<OutboxMessage>,
    ) -> EngineResult<StoreResult> {
        let result = StoreResult::count(events.len(), &messages);
        let _guard = self.write_lock.lock().await;

        let mut batch = None;
        if let Some(first) = events.first() {
            let address = first.cursor.address.clone();
            let last = self.last_offset_on_disk(&address).await?;
            check_append(&events, last)?;

            let stored_at = Utc::now();
            let mut lines = Vec::with_capacity(events.len());
            for mut event in events {
                event.stored_at = Some(stored_at);
                lines.push(event.to_json_line()?);
            }
            batch = Some((address, last, lines));
        }

        // Outbox first: the event append below commits the batch. A retry
        // after a failed commit skips messages the failed attempt wrote.
        let mut by_channel: BTreeMap<&str, Vec<(String, bool)>> = BTreeMap::new();
        for message in &messages {
            let uncommitted = match (&batch, &message.cursor) {
                (Some((address, last, _)), Some(cursor)) => {
                    cursor.address == *address && cursor.offset > *last
                }
                _ => false,
            };
            by_channel
                .entry(message.channel.as_str())
                .or_default()
                .push((serde_json::to_string(message)?, uncommitted));
        }
        for (channel, lines) in by_channel {
            let path = self.config.outbox_path(channel);
            let lines = Self::unwritten_lines(&path, lines).await?;
            if !lines.is_empty() {
                Self::append_lines(&path, &lines).await?;
            }
        }

        if let Some((address, _, lines)) = batch {
            Self::append_lines(&self.config.stream_path(&address), &lines).await?;
        }

        tracing::debug!(
            events = result.num_events,
            channels = result.num_messages_by_channel.len(),
            "stored stream batch"
        );
        Ok(result)
    }

    async fn close(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Latest-snapshot files with a one-deep backup
pub struct JsonlSnapshotAdapter<S> {
    config: JsonlConfig,
    _state: PhantomData<fn() -> S>,
}

impl<S> JsonlSnapshotAdapter<S> {
    pub fn new(config: JsonlConfig) -> Self {
        Self {
            config,
            _state: PhantomData,
        }
    }
}

impl<S: DeserializeOwned> JsonlSnapshotAdapter<S> {
    async fn read_snapshot(path: &Path) -> EngineResult<Option<StoredSnapshot<S>>> {
        match read_optional(path).await? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S> SnapshotAdapter<S> for JsonlSnapshotAdapter<S>
where
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get_snapshot(&self, view: &ViewAddress) -> EngineResult<StoredSnapshot<S>> {
        let latest = self.config.latest_snapshot_path(view);
        match Self::read_snapshot(&latest).await {
            Ok(Some(snapshot)) => return Ok(snapshot),
            Ok(None) => {}
            Err(EngineError::Json(e)) => {
                tracing::warn!(
                    path = %latest.display(),
                    error = %e,
                    "corrupt snapshot, falling back to backup"
                );
            }
            Err(e) => return Err(e),
        }

        let previous = self.config.previous_snapshot_path(view);
        match Self::read_snapshot(&previous).await {
            Ok(Some(snapshot)) => Ok(snapshot),
            Ok(None) => Ok(StoredSnapshot::empty()),
            Err(EngineError::Json(e)) => {
                tracing::warn!(path = %previous.display(), error = %e, "corrupt snapshot backup");
                Ok(StoredSnapshot::empty())
            }
            Err(e) => Err(e),
        }
    }

    async fn store_snapshot(&self, snapshot: SnapshotData<S>) -> EngineResult<()> {
        let latest = self.config.latest_snapshot_path(&snapshot.view);
        let previous = self.config.previous_snapshot_path(&snapshot.view);
        let offset = snapshot.offset;
        let json = serde_json::to_vec(&snapshot.into_stored())?;

        atomic_write_with_backup(&latest, &json, Some(&previous)).await?;
        tracing::debug!(path = %latest.display(), offset, "wrote snapshot");
        Ok(())
    }
}
