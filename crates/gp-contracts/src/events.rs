use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// JSONL log of everything that happens in one chat session.
///
/// Each line starts with `type`, `session_id`, `seq` and `ts`. Payload keys
/// are merged afterwards and win on collision. `seq` counts from 0 per
/// writer and is shared by clones.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    sink: Mutex<LogSink>,
}

#[derive(Debug)]
struct LogSink {
    file: File,
    next_seq: u64,
}

impl EventWriter {
    /// Opens `path` for appending, creating missing parent directories.
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            shared: Arc::new(SessionLog {
                path,
                session_id: session_id.into(),
                sink: Mutex::new(LogSink { file, next_seq: 0 }),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> Result<Value> {
        let mut sink = self
            .shared
            .sink
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        let seq = sink.next_seq;

        let mut event = EventPayload::new();
        event.insert("type".into(), event_type.into());
        event.insert("session_id".into(), self.shared.session_id.as_str().into());
        event.insert("seq".into(), seq.into());
        event.insert(
            "ts".into(),
            Utc::now()
                .to_rfc3339_opts(SecondsFormat::Micros, false)
                .into(),
        );
        event.extend(payload);

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        sink.file
            .write_all(line.as_bytes())
            .with_context(|| format!("failed to write {}", self.shared.path.display()))?;
        sink.next_seq += 1;
        Ok(Value::Object(event))
    }
}
