//! Session-scoped key-value store with per-entry expiry.
//!
//! Three key shapes live here, all with a 24-hour TTL:
//!
//! - `directions:{h1}:{h2}:{mode}`: cached route oracle results
//! - `itinerary:{session_id}`: current itinerary version
//! - `itinerary:{session_id}:prev`: previous version, kept for undo
//!
//! The store is process-wide and tolerates concurrent reads and writes;
//! writes are last-writer-wins. Lookups never fail: a miss, an expired entry
//! and a deserialization fault all read as `None`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::core::model::Itinerary;

/// Expiry applied to every entry.
pub const SESSION_TTL: Duration = Duration::from_secs(86_400);

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL map backing the session state and the directions cache.
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` with the standard TTL.
    pub fn put(&self, key: &str, value: String) {
        self.put_with_ttl(key, value, SESSION_TTL);
    }

    pub fn put_with_ttl(&self, key: &str, value: String, ttl: Duration) {
        let mut entries = self.entries.write();
        // Opportunistic sweep so abandoned sessions don't pile up.
        if entries.len() > 4096 {
            let now = Instant::now();
            entries.retain(|_, e| e.expires_at > now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Fetch a live entry, or `None` on miss/expiry.
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    // --- itinerary slots ---

    pub fn save_itinerary(&self, session_id: &str, itinerary: &Itinerary) {
        if let Ok(json) = serde_json::to_string(itinerary) {
            self.put(&format!("itinerary:{session_id}"), json);
        }
    }

    pub fn load_itinerary(&self, session_id: &str) -> Option<Itinerary> {
        let json = self.get(&format!("itinerary:{session_id}"))?;
        serde_json::from_str(&json).ok()
    }

    /// Snapshot into the undo slot.
    pub fn save_previous(&self, session_id: &str, itinerary: &Itinerary) {
        if let Ok(json) = serde_json::to_string(itinerary) {
            self.put(&format!("itinerary:{session_id}:prev"), json);
        }
    }

    pub fn load_previous(&self, session_id: &str) -> Option<Itinerary> {
        let json = self.get(&format!("itinerary:{session_id}:prev"))?;
        serde_json::from_str(&json).ok()
    }
}
