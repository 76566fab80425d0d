//! Session persistence
//!
//! Sessions are stored by id together with the id of the session the user
//! last had open.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::state::ChatSession;

pub trait SessionStore: Send + Sync {
    /// All sessions in creation order
    fn list(&self) -> Result<Vec<ChatSession>>;
    fn get(&self, id: &str) -> Result<Option<ChatSession>>;
    /// Insert or replace by id
    fn put(&self, session: &ChatSession) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    fn current(&self) -> Result<Option<String>>;
    fn set_current(&self, id: Option<&str>) -> Result<()>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredSessions {
    #[serde(default)]
    sessions: Vec<ChatSession>,
    #[serde(default)]
    current_session: Option<String>,
}

impl StoredSessions {
    fn get(&self, id: &str) -> Option<ChatSession> {
        self.sessions.iter().find(|s| s.id == id).cloned()
    }

    fn put(&mut self, session: &ChatSession) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => self.sessions.push(session.clone()),
        }
    }

    fn delete(&mut self, id: &str) {
        self.sessions.retain(|s| s.id != id);
        if self.current_session.as_deref() == Some(id) {
            self.current_session = None;
        }
    }
}

/// Single JSON file holding every session
pub struct JsonSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/quickinterview/sessions.json`
    pub fn open_default() -> Result<Self> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(Self::new(data_dir.join("quickinterview").join("sessions.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredSessions> {
        if !self.path.exists() {
            return Ok(StoredSessions::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write(&self, data: &StoredSessions) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredSessions)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut data = self.read()?;
        f(&mut data);
        self.write(&data)
    }
}

impl SessionStore for JsonSessionStore {
    fn list(&self) -> Result<Vec<ChatSession>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.sessions)
    }

    fn get(&self, id: &str) -> Result<Option<ChatSession>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.get(id))
    }

    fn put(&self, session: &ChatSession) -> Result<()> {
        self.update(|data| data.put(session))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.update(|data| data.delete(id))
    }

    fn current(&self) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.current_session)
    }

    fn set_current(&self, id: Option<&str>) -> Result<()> {
        self.update(|data| data.current_session = id.map(str::to_string))
    }
}

/// Non-persistent store
#[derive(Default)]
pub struct MemorySessionStore {
    data: Mutex<StoredSessions>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn list(&self) -> Result<Vec<ChatSession>> {
        Ok(self.data.lock().sessions.clone())
    }

    fn get(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.data.lock().get(id))
    }

    fn put(&self, session: &ChatSession) -> Result<()> {
        self.data.lock().put(session);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.data.lock().delete(id);
        Ok(())
    }

    fn current(&self) -> Result<Option<String>> {
        Ok(self.data.lock().current_session.clone())
    }

    fn set_current(&self, id: Option<&str>) -> Result<()> {
        self.data.lock().current_session = id.map(str::to_string);
        Ok(())
    }
}
