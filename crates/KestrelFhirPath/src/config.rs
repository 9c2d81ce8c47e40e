//! # Engine Configuration
//!
//! Evaluation limits and regex cache settings. Every field has a default, so a
//! configuration document only needs the keys it changes:
//!
//! ```json
//! { "limits": { "maxCollectionSize": 5000, "collectionOverflow": "truncate" },
//!   "regex": { "defaultTimeoutMs": 250 } }
//! ```
//!
//! The same settings can come from the environment:
//!
//! - `FHIRPATH_MAX_COLLECTION_SIZE`: largest collection an evaluation may build
//! - `FHIRPATH_MAX_DEPTH`: deepest expression nesting evaluated
//! - `FHIRPATH_COLLECTION_OVERFLOW`: `reject` (default) or `truncate`
//! - `FHIRPATH_REGEX_CACHE_SIZE`: compiled patterns kept
//! - `FHIRPATH_REGEX_MAX_PATTERN_LENGTH`: longest accepted pattern
//! - `FHIRPATH_REGEX_TIMEOUT_MS`: per-match timeout
//! - `FHIRPATH_REGEX_WORKER_THRESHOLD`: input size (bytes) matched on a worker thread
//! - `FHIRPATH_TIMEOUT_MS`: whole-evaluation deadline

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kestrel_fhirpath_support::EvaluationError;

/// What happens when an operation would produce more elements than
/// `max_collection_size` allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverflowPolicy {
    /// Fail with `InvalidExpression`.
    #[default]
    Reject,
    /// Keep the first `max_collection_size` elements and log a warning.
    Truncate,
}

impl FromStr for OverflowPolicy {
    type Err = EvaluationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(OverflowPolicy::Reject),
            "truncate" => Ok(OverflowPolicy::Truncate),
            other => Err(EvaluationError::parse(format!(
                "unknown collection overflow policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limits {
    pub max_collection_size: usize,
    pub max_depth: usize,
    pub collection_overflow: OverflowPolicy,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_collection_size: 100_000,
            max_depth: 256,
            collection_overflow: OverflowPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegexCacheConfig {
    /// Number of compiled patterns kept before the least recently used is evicted.
    pub capacity: usize,
    pub max_pattern_length: usize,
    pub default_timeout_ms: u64,
    /// Inputs at least this long are matched on a worker thread under a deadline.
    pub worker_threshold_bytes: usize,
    /// Worker threads allowed to run at once, abandoned ones included.
    pub max_workers: usize,
}

impl Default for RegexCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_pattern_length: 1_000,
            default_timeout_ms: 100,
            worker_threshold_bytes: 10_000,
            max_workers: 4,
        }
    }
}

impl RegexCacheConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub limits: Limits,
    pub regex: RegexCacheConfig,
    /// Deadline for a whole evaluation; `None` means no deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_timeout_ms: Option<u64>,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EvaluationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads `FHIRPATH_*` variables from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, EvaluationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`EngineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EvaluationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        if let Some(v) = parse_var(&lookup, "FHIRPATH_MAX_COLLECTION_SIZE")? {
            config.limits.max_collection_size = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_MAX_DEPTH")? {
            config.limits.max_depth = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_COLLECTION_OVERFLOW")? {
            config.limits.collection_overflow = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_REGEX_CACHE_SIZE")? {
            config.regex.capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_REGEX_MAX_PATTERN_LENGTH")? {
            config.regex.max_pattern_length = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_REGEX_TIMEOUT_MS")? {
            config.regex.default_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_REGEX_WORKER_THRESHOLD")? {
            config.regex.worker_threshold_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "FHIRPATH_REGEX_MAX_WORKERS")? {
            config.regex.max_workers = v;
        }
        config.evaluation_timeout_ms = parse_var(&lookup, "FHIRPATH_TIMEOUT_MS")?;
        Ok(config)
    }

    pub fn evaluation_timeout(&self) -> Option<Duration> {
        self.evaluation_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, EvaluationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EvaluationError::parse(format!("invalid value '{}' for {}", raw, key))),
    }
}
