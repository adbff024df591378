//! In-memory backend with an optional JSON snapshot.
//!
//! Rows are kept in insertion order so newest-first listing is a reverse
//! walk. The snapshot is loaded once on open and rewritten on [`flush`].
//!
//! [`flush`]: crate::Persistence::flush

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ac_domain::ai::Ai;
use ac_domain::aicall::Aicall;
use ac_domain::error::{Error, Result};
use ac_domain::message::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::{AiFilter, AicallFilter, MessageFilter, Page};
use crate::traits::Persistence;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

trait Row: Clone {
    const KIND: &'static str;
    fn key(&self) -> Uuid;
}

impl Row for Aicall {
    const KIND: &'static str = "aicall";
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Message {
    const KIND: &'static str = "message";
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Row for Ai {
    const KIND: &'static str = "ai";
    fn key(&self) -> Uuid {
        self.id
    }
}

struct Table<T> {
    order: Vec<Uuid>,
    rows: HashMap<Uuid, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            rows: HashMap::new(),
        }
    }
}

impl<T: Row> Table<T> {
    fn from_rows(rows: Vec<T>) -> Self {
        let mut table = Self::default();
        for row in rows {
            let key = row.key();
            if table.rows.insert(key, row).is_none() {
                table.order.push(key);
            }
        }
        table
    }

    fn insert(&mut self, row: &T) -> Result<()> {
        let key = row.key();
        if self.rows.contains_key(&key) {
            return Err(Error::Validation(format!("{} {key} already exists", T::KIND)));
        }
        self.rows.insert(key, row.clone());
        self.order.push(key);
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<T> {
        self.rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    fn replace(&mut self, row: &T) -> Result<()> {
        let slot = self
            .rows
            .get_mut(&row.key())
            .ok_or_else(|| Error::not_found(T::KIND, row.key()))?;
        *slot = row.clone();
        Ok(())
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut T> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(T::KIND, id))
    }

    fn rows_in_order(&self) -> Vec<T> {
        self.order.iter().filter_map(|id| self.rows.get(id)).cloned().collect()
    }
}

/// Walk `ids` newest-first, skip past the page token, keep matching rows.
fn newest_first<'a, T: Clone + 'a>(
    ids: &'a [Uuid],
    rows: &'a HashMap<Uuid, T>,
    page: &Page,
    pred: impl Fn(&T) -> bool,
) -> Vec<T> {
    let mut iter = ids.iter().rev();
    if let Some(token) = page.token {
        for id in iter.by_ref() {
            if *id == token {
                break;
            }
        }
    }
    iter.filter_map(|id| rows.get(id))
        .filter(|row| pred(row))
        .take(page.limit())
        .cloned()
        .collect()
}

#[derive(Default)]
struct Tables {
    aicalls: Table<Aicall>,
    messages: Table<Message>,
    /// Message ids per aicall, in insertion order.
    messages_by_aicall: HashMap<Uuid, Vec<Uuid>>,
    ais: Table<Ai>,
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    aicalls: Vec<Aicall>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    ais: Vec<Ai>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryPersistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemoryPersistence {
    snapshot_path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the store, loading `snapshot_path` when it exists.
    pub fn open(snapshot_path: Option<&Path>) -> Result<Self> {
        let Some(path) = snapshot_path else {
            return Ok(Self::new());
        };

        let snapshot: Snapshot = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Other(format!("reading snapshot {}: {e}", path.display()))
            })?
        } else {
            Snapshot::default()
        };

        let mut messages_by_aicall: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for m in &snapshot.messages {
            messages_by_aicall.entry(m.aicall_id).or_default().push(m.id);
        }

        tracing::info!(
            aicalls = snapshot.aicalls.len(),
            messages = snapshot.messages.len(),
            ais = snapshot.ais.len(),
            path = %path.display(),
            "store snapshot loaded"
        );

        Ok(Self {
            snapshot_path: Some(path.to_path_buf()),
            tables: RwLock::new(Tables {
                aicalls: Table::from_rows(snapshot.aicalls),
                messages: Table::from_rows(snapshot.messages),
                messages_by_aicall,
                ais: Table::from_rows(snapshot.ais),
            }),
        })
    }

    fn snapshot_json(&self) -> Result<String> {
        let tables = self.tables.read();
        let snapshot = Snapshot {
            aicalls: tables.aicalls.rows_in_order(),
            messages: tables.messages.rows_in_order(),
            ais: tables.ais.rows_in_order(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }
}

fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait::async_trait]
impl Persistence for MemoryPersistence {
    async fn aicall_create(&self, aicall: &Aicall) -> Result<()> {
        self.tables.write().aicalls.insert(aicall)
    }

    async fn aicall_get(&self, id: Uuid) -> Result<Aicall> {
        self.tables.read().aicalls.get(id)
    }

    async fn aicall_update(&self, aicall: &Aicall) -> Result<()> {
        self.tables.write().aicalls.replace(aicall)
    }

    async fn aicall_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let row = tables.aicalls.get_mut(id)?;
        row.tm_delete = Some(at);
        row.tm_update = Some(at);
        Ok(())
    }

    async fn aicall_list(&self, filter: &AicallFilter, page: &Page) -> Result<Vec<Aicall>> {
        let tables = self.tables.read();
        let t = &tables.aicalls;
        Ok(newest_first(&t.order, &t.rows, page, |a| filter.matches(a)))
    }

    async fn message_create(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.write();
        tables.messages.insert(message)?;
        tables
            .messages_by_aicall
            .entry(message.aicall_id)
            .or_default()
            .push(message.id);
        Ok(())
    }

    async fn message_get(&self, id: Uuid) -> Result<Message> {
        self.tables.read().messages.get(id)
    }

    async fn message_list(
        &self,
        aicall_id: Uuid,
        filter: &MessageFilter,
        page: &Page,
    ) -> Result<Vec<Message>> {
        let tables = self.tables.read();
        let Some(ids) = tables.messages_by_aicall.get(&aicall_id) else {
            return Ok(Vec::new());
        };
        Ok(newest_first(ids, &tables.messages.rows, page, |m| filter.matches(m)))
    }

    async fn ai_create(&self, ai: &Ai) -> Result<()> {
        self.tables.write().ais.insert(ai)
    }

    async fn ai_get(&self, id: Uuid) -> Result<Ai> {
        self.tables.read().ais.get(id)
    }

    async fn ai_update(&self, ai: &Ai) -> Result<()> {
        self.tables.write().ais.replace(ai)
    }

    async fn ai_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let row = tables.ais.get_mut(id)?;
        row.tm_delete = Some(at);
        row.tm_update = Some(at);
        Ok(())
    }

    async fn ai_list(&self, filter: &AiFilter, page: &Page) -> Result<Vec<Ai>> {
        let tables = self.tables.read();
        let t = &tables.ais;
        Ok(newest_first(&t.order, &t.rows, page, |a| filter.matches(a)))
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };
        let json = self.snapshot_json()?;
        tokio::task::spawn_blocking(move || write_snapshot(&path, &json))
            .await
            .map_err(|e| Error::Other(format!("snapshot writer panicked: {e}")))??;
        tracing::debug!("store snapshot written");
        Ok(())
    }
}
