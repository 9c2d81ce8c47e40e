//! # Regex Cache
//!
//! Compiled patterns for `matches()` and `replaceMatches()` are kept in a
//! bounded least-recently-used cache shared by every evaluation that uses the
//! same engine. A hit moves the pattern to the front, so lookups take the lock
//! exclusively for the short time that bookkeeping needs.
//!
//! Before compiling, patterns are screened: overly long patterns, stacked
//! quantifiers (`a**`, `a?*`, `a+{2}`), unbounded repetition of a group that
//! already contains a quantifier (`(a+)+`, `(a?)*`) and groups nested deeper
//! than [`MAX_GROUP_NESTING`] are rejected with `InvalidExpression`.
//!
//! Matching against inputs of at least `worker_threshold_bytes` runs on a worker
//! thread. The caller waits until the deadline passes or the cancellation token
//! fires, whichever comes first, and then reports `Timeout`; a late result
//! from the worker is discarded. An abandoned worker cannot be interrupted and
//! runs to completion, which the `regex` crate bounds linearly in the input
//! size. It keeps its slot until then, and at most `max_workers` slots exist;
//! when all are taken the call fails with `Timeout` without spawning a thread.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use kestrel_fhirpath_support::EvaluationError;

use crate::cancellation::CancellationToken;
use crate::config::RegexCacheConfig;

/// Deepest group nesting a pattern may use.
pub const MAX_GROUP_NESTING: usize = 5;

/// Upper bound on the compiled program size of a single pattern.
const COMPILED_SIZE_LIMIT: usize = 1 << 22;

/// How often a waiting caller re-checks its cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

static GLOBAL_CACHE: Lazy<Arc<RegexCache>> =
    Lazy::new(|| Arc::new(RegexCache::new(RegexCacheConfig::default())));

pub struct RegexCache {
    config: RegexCacheConfig,
    compiled: RwLock<LruCache<String, Arc<Regex>>>,
    active_workers: Arc<AtomicUsize>,
}

/// A reserved worker thread; released when the worker finishes.
struct WorkerSlot(Arc<AtomicUsize>);

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RegexCache {
    pub fn new(config: RegexCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            compiled: RwLock::new(LruCache::new(capacity)),
            active_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The process-wide cache used when no engine-specific cache is supplied.
    pub fn global() -> Arc<RegexCache> {
        GLOBAL_CACHE.clone()
    }

    pub fn config(&self) -> &RegexCacheConfig {
        &self.config
    }

    /// Number of compiled patterns currently cached.
    pub fn len(&self) -> usize {
        self.compiled.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.compiled.read().contains(pattern)
    }

    /// Worker threads still running, including abandoned ones.
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Acquire)
    }

    /// Returns the compiled form of `pattern`, compiling and caching it on a miss.
    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, EvaluationError> {
        let hit = self.compiled.write().get(pattern).cloned();
        if let Some(regex) = hit {
            return Ok(regex);
        }

        validate_pattern(pattern, self.config.max_pattern_length).inspect_err(|err| {
            warn!(pattern = %truncate_for_log(pattern), error = %err, "rejected regex pattern");
        })?;

        let regex = RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .size_limit(COMPILED_SIZE_LIMIT)
            .build()
            .map(Arc::new)
            .map_err(|err| {
                EvaluationError::invalid_expression_with_cause(
                    format!("invalid regular expression '{}'", pattern),
                    err,
                )
            })?;

        let mut cache = self.compiled.write();
        if let Some((evicted, _)) = cache.push(pattern.to_string(), regex.clone()) {
            if evicted != pattern {
                debug!(pattern = %truncate_for_log(&evicted), "evicted regex from cache");
            }
        }
        debug!(pattern = %truncate_for_log(pattern), size = cache.len(), "compiled regex");
        Ok(regex)
    }

    /// Whether `pattern` matches anywhere in `text`, using the configured default timeout.
    pub fn is_match(&self, pattern: &str, text: &str) -> Result<bool, EvaluationError> {
        let deadline = Instant::now() + self.config.default_timeout();
        self.match_with_timeout(pattern, text, deadline, None)
    }

    /// Whether `pattern` matches anywhere in `text`, failing with `Timeout` once
    /// `deadline` passes or `cancel` fires.
    pub fn match_with_timeout(
        &self,
        pattern: &str,
        text: &str,
        deadline: Instant,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, EvaluationError> {
        let regex = self.compile(pattern)?;
        if text.len() < self.config.worker_threshold_bytes {
            check_deadline(deadline, cancel)?;
            return Ok(regex.is_match(text));
        }
        let text = text.to_owned();
        self.run_with_deadline(move || regex.is_match(&text), deadline, cancel)
    }

    /// Replaces every match of `pattern` in `text`. `$1`-style group references
    /// in `replacement` are expanded.
    pub fn replace_with_timeout(
        &self,
        pattern: &str,
        text: &str,
        replacement: &str,
        deadline: Instant,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, EvaluationError> {
        let regex = self.compile(pattern)?;
        if text.len() < self.config.worker_threshold_bytes {
            check_deadline(deadline, cancel)?;
            return Ok(regex.replace_all(text, replacement).into_owned());
        }
        let text = text.to_owned();
        let replacement = replacement.to_owned();
        self.run_with_deadline(
            move || regex.replace_all(&text, replacement.as_str()).into_owned(),
            deadline,
            cancel,
        )
    }

    pub fn clear(&self) {
        self.compiled.write().clear();
    }

    fn reserve_worker(&self) -> Option<WorkerSlot> {
        let max = self.config.max_workers.max(1);
        self.active_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()?;
        Some(WorkerSlot(self.active_workers.clone()))
    }

    /// Runs `job` on a worker thread and waits for it until `deadline`.
    fn run_with_deadline<T, F>(
        &self,
        job: F,
        deadline: Instant,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, EvaluationError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        check_deadline(deadline, cancel)?;
        let slot = self.reserve_worker().ok_or_else(|| {
            warn!(max_workers = self.config.max_workers, "no regex worker available");
            EvaluationError::Timeout(format!(
                "all {} regex workers are busy",
                self.config.max_workers.max(1)
            ))
        })?;
        let (sender, receiver) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("fhirpath-regex".into())
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone when the caller timed out.
                let _ = sender.send(job());
            })
            .map_err(|err| {
                EvaluationError::invalid_expression_with_cause("could not start regex worker", err)
            })?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(result) => return Ok(result),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Err(err) = check_deadline(deadline, cancel) {
                        warn!("abandoning regex worker: {}", err);
                        return Err(err);
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(EvaluationError::invalid_expression(
                        "regex worker terminated without a result",
                    ));
                }
            }
        }
    }
}

fn check_deadline(deadline: Instant, cancel: Option<&CancellationToken>) -> Result<(), EvaluationError> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Err(EvaluationError::Timeout("regex match cancelled".into()));
    }
    if Instant::now() >= deadline {
        return Err(EvaluationError::Timeout("regex match exceeded its deadline".into()));
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Token {
    /// Start of the pattern, of a group or of an alternative.
    Start,
    Atom,
    /// A closed group with a quantifier somewhere inside it.
    QuantifiedGroup,
    Quantifier { lazy_allowed: bool },
}

#[derive(Clone, Copy, PartialEq)]
enum Repetition {
    Bounded,
    Unbounded,
}

/// Screens a pattern before compilation.
pub fn validate_pattern(pattern: &str, max_length: usize) -> Result<(), EvaluationError> {
    if pattern.len() > max_length {
        return Err(EvaluationError::invalid_expression(format!(
            "regex pattern is {} characters long, the limit is {}",
            pattern.len(),
            max_length
        )));
    }

    let chars: Vec<char> = pattern.chars().collect();
    // One entry per open group: whether it contains a quantifier.
    let mut groups: Vec<bool> = Vec::new();
    let mut last = Token::Start;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        let repetition = match c {
            '\\' => {
                i += 1;
                last = Token::Atom;
                continue;
            }
            '[' => {
                i = skip_class(&chars, i);
                last = Token::Atom;
                continue;
            }
            '(' => {
                groups.push(false);
                if groups.len() > MAX_GROUP_NESTING {
                    return Err(EvaluationError::invalid_expression(format!(
                        "regex groups are nested deeper than {}",
                        MAX_GROUP_NESTING
                    )));
                }
                if chars.get(i) == Some(&'?') {
                    // `(?:`, `(?P<name>` and flag groups such as `(?i)`.
                    while i < chars.len() && !matches!(chars[i], ':' | '>' | ')') {
                        i += 1;
                    }
                    if chars.get(i) == Some(&')') {
                        groups.pop();
                    }
                    i += 1;
                }
                last = Token::Start;
                continue;
            }
            ')' => {
                let quantified = groups.pop().unwrap_or(false);
                if let (true, Some(parent)) = (quantified, groups.last_mut()) {
                    *parent = true;
                }
                last = if quantified { Token::QuantifiedGroup } else { Token::Atom };
                continue;
            }
            '|' => {
                last = Token::Start;
                continue;
            }
            '*' | '+' => Repetition::Unbounded,
            '?' => {
                // A `?` right after a quantifier makes it lazy; the pair counts as one.
                if last == (Token::Quantifier { lazy_allowed: true }) {
                    last = Token::Quantifier { lazy_allowed: false };
                    continue;
                }
                Repetition::Bounded
            }
            '{' => match repetition_bounds(&chars, i) {
                Some((end, repetition)) => {
                    i = end;
                    repetition
                }
                None => {
                    last = Token::Atom;
                    continue;
                }
            },
            _ => {
                last = Token::Atom;
                continue;
            }
        };

        match last {
            Token::Quantifier { .. } => {
                return Err(EvaluationError::invalid_expression(
                    "regex pattern stacks quantifiers",
                ));
            }
            Token::QuantifiedGroup if repetition == Repetition::Unbounded => {
                return Err(EvaluationError::invalid_expression(
                    "regex pattern repeats a group that already contains a quantifier",
                ));
            }
            _ => {}
        }
        if let Some(group) = groups.last_mut() {
            *group = true;
        }
        last = Token::Quantifier { lazy_allowed: true };
    }
    Ok(())
}

/// Index just past the `]` closing a character class that starts before `i`.
fn skip_class(chars: &[char], mut i: usize) -> usize {
    if chars.get(i) == Some(&'^') {
        i += 1;
    }
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    let mut depth = 1usize;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

/// Parses `{n}`, `{n,}` or `{n,m}` whose body starts at `i`. Returns the index
/// past the closing brace; `None` when the brace is a literal.
fn repetition_bounds(chars: &[char], i: usize) -> Option<(usize, Repetition)> {
    let close = i + chars[i..].iter().position(|c| *c == '}')?;
    let body: String = chars[i..close].iter().collect();
    let (min, max) = match body.split_once(',') {
        Some((min, max)) => (min, Some(max)),
        None => (body.as_str(), None),
    };
    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !is_number(min.trim()) {
        return None;
    }
    let repetition = match max.map(str::trim) {
        None => Repetition::Bounded,
        Some("") => Repetition::Unbounded,
        Some(max) if is_number(max) => Repetition::Bounded,
        Some(_) => return None,
    };
    Some((close + 1, repetition))
}

fn truncate_for_log(pattern: &str) -> String {
    pattern.chars().take(64).collect()
}
