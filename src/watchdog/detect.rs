//! Output normalization, bounded sample buffers, and the loop detector.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::LazyLock;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digit regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Longest sample text kept in a loop report.
const SAMPLE_CHARS: usize = 100;

/// Fold case, collapse digit runs to `#` and whitespace runs to one space.
///
/// Messages that differ only in counters or timestamps normalize equal.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let digits = DIGITS.replace_all(&lower, "#");
    WHITESPACE.replace_all(&digits, " ").trim().to_string()
}

/// Short hex digest of the normalized text.
pub fn hash_message(text: &str) -> String {
    let digest = Sha256::digest(normalize(text).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(12);
    hex
}

/// One line of agent output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSample {
    pub text: String,
    pub hash: String,
    pub at: DateTime<Utc>,
}

impl OutputSample {
    pub fn new(text: &str, at: DateTime<Utc>) -> Self {
        Self {
            text: text.to_string(),
            hash: hash_message(text),
            at,
        }
    }
}

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Loop detector thresholds.
#[derive(Debug, Clone, Copy)]
pub struct LoopRule {
    pub window: Duration,
    pub threshold: usize,
    pub similarity: f64,
}

/// Histogram summary of the current window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopReport {
    pub is_loop: bool,
    pub dominant_hash: String,
    pub repeat_count: usize,
    pub total: usize,
    /// `repeat_count / total`, as a rounded percentage.
    pub dominance_pct: u32,
    /// First raw message carrying the dominant hash, truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
}

/// Analyse samples newer than `now - window`.
///
/// Returns `None` when the window holds fewer than `threshold` samples.
pub fn detect_loop(
    hashes: &RingBuffer<(String, DateTime<Utc>)>,
    raw: &RingBuffer<OutputSample>,
    rule: LoopRule,
    now: DateTime<Utc>,
) -> Option<LoopReport> {
    let window_start = now - rule.window;
    let recent: Vec<&str> = hashes
        .iter()
        .filter(|(_, at)| *at >= window_start)
        .map(|(h, _)| h.as_str())
        .collect();
    if recent.is_empty() || recent.len() < rule.threshold {
        return None;
    }

    let mut freq: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for &hash in &recent {
        let count = freq.entry(hash).or_insert(0);
        if *count == 0 {
            order.push(hash);
        }
        *count += 1;
    }

    // Ties go to the hash seen first in the window.
    let mut dominant = order[0];
    let mut max_count = 0;
    for hash in order {
        let count = freq[hash];
        if count > max_count {
            max_count = count;
            dominant = hash;
        }
    }

    let ratio = max_count as f64 / recent.len() as f64;
    let is_loop = max_count >= rule.threshold && ratio >= rule.similarity;
    let sample = if is_loop {
        raw.iter()
            .find(|s| s.hash == dominant)
            .map(|s| s.text.chars().take(SAMPLE_CHARS).collect())
    } else {
        None
    };

    Some(LoopReport {
        is_loop,
        dominant_hash: dominant.to_string(),
        repeat_count: max_count,
        total: recent.len(),
        dominance_pct: (ratio * 100.0).round() as u32,
        sample,
    })
}
