//! Response cache: bounded, insertion-ordered, time-limited.
//!
//! Entries are never updated in place. A stale or evicted entry is removed;
//! a fresh result for the same key is appended as a new entry.

use crate::types::ExecutionResult;
use cogloop_core::{truncate_chars, ExecutionContext};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

const PROMPT_KEY_CHARS: usize = 100;
const SYSTEM_KEY_CHARS: usize = 50;
const KEY_SEPARATOR: char = '\u{1f}';

/// Deterministic key from the prompt prefix, system prefix, agent, and phase.
pub fn cache_key(prompt: &str, system_prompt: &str, ctx: &ExecutionContext) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}",
        truncate_chars(prompt, PROMPT_KEY_CHARS),
        truncate_chars(system_prompt, SYSTEM_KEY_CHARS),
        ctx.agent_id,
        ctx.phase,
        sep = KEY_SEPARATOR
    )
}

struct CacheEntry {
    result: ExecutionResult,
    inserted: Instant,
    seq: u64,
}

pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<(String, u64)>,
    capacity: usize,
    ttl: Duration,
    next_seq: u64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            ttl,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy of the cached result with `cache_hit` set, if still fresh.
    pub fn get(&mut self, key: &str) -> Option<ExecutionResult> {
        let fresh = self.entries.get(key).map(|e| e.inserted.elapsed() < self.ttl)?;
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.result.as_cache_hit())
    }

    pub fn insert(&mut self, key: String, result: ExecutionResult) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.remove(&key);
        self.entries.insert(
            key.clone(),
            CacheEntry {
                result,
                inserted: Instant::now(),
                seq,
            },
        );
        self.order.push_back((key, seq));

        while self.entries.len() > self.capacity {
            let Some((old_key, old_seq)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&old_key).is_some_and(|e| e.seq == old_seq) {
                self.entries.remove(&old_key);
            }
        }
        // Drop order records whose entry was replaced or expired.
        if self.order.len() > self.capacity * 2 {
            let entries = &self.entries;
            self.order
                .retain(|(k, s)| entries.get(k).is_some_and(|e| e.seq == *s));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
