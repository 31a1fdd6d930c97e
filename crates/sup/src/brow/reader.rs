// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrent BSUP reader.
//!
//! # Pipeline
//!
//! ```text
//!  input ──> [frame thread] ──work(high_water)──> [decode workers] ──┐
//!                 │                                                  │
//!                 └──────── control / end / error ─────results───────┴──> pull()
//! ```
//!
//! - **Frame thread**: reads frames in order, applies types frames and
//!   end-of-stream markers to the local table, and numbers every unit it
//!   emits with a sequence.
//! - **Decode workers**: decompress and decode values frames against the
//!   table snapshot the frame was written under.
//! - **Consumer**: [`Reader::pull`] drains the results channel into a
//!   reorder buffer and hands items out in sequence order, so values and
//!   control messages come out exactly as they were written.
//!
//! With `threads == 0` everything runs inline on the caller's thread.

use super::parser::{Batch, DecodeOptions, Item, Parser, Unit, ValuesJob};
use crate::cancel::CancelToken;
use crate::config::{default_threads, Limits, RuntimeConfig, DEFAULT_HIGH_WATER};
use crate::error::{Error, Result};
use crate::projection::{Projection, Projector};
use crate::types::TypeRegistry;
use crate::value::Value;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a blocked thread waits before re-checking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reader configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderConfig {
    /// Decode workers; 0 decodes inline.
    pub threads: usize,
    /// Values frames in flight before the frame thread parks.
    pub high_water: usize,
    /// Input bounds; `None` uses the process-wide defaults.
    pub limits: Option<Limits>,
    /// Check every value body against its type.
    pub validate: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub projection: Projection,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: CancelToken,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            high_water: DEFAULT_HIGH_WATER,
            limits: None,
            validate: false,
            projection: Projection::all(),
            cancel: CancelToken::new(),
        }
    }
}

impl ReaderConfig {
    #[must_use]
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    #[must_use]
    pub fn high_water(mut self, n: usize) -> Self {
        self.high_water = n.max(1);
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

#[derive(Debug, Default)]
struct Stats {
    bytes_read: AtomicU64,
    values_read: AtomicU64,
    frames_read: AtomicU64,
}

/// Reader progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub bytes_read: u64,
    pub values_read: u64,
    pub frames_read: u64,
}

type Msg = (u64, Result<Option<Item>>);

struct Task {
    seq: u64,
    job: ValuesJob,
}

/// Send, re-checking cancellation while the channel is full.
fn send_until<T>(tx: &Sender<T>, mut msg: T, cancel: &CancelToken) -> bool {
    loop {
        match tx.send_timeout(msg, POLL_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(m)) => {
                if cancel.is_canceled() {
                    return false;
                }
                msg = m;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

fn frame_loop<R: Read>(
    mut parser: Parser<R>,
    work: Sender<Task>,
    results: Sender<Msg>,
    cancel: CancelToken,
    stats: Arc<Stats>,
) {
    let mut seq = 0u64;
    loop {
        if cancel.is_canceled() {
            return;
        }
        let unit = parser.next_unit();
        stats.bytes_read.store(parser.bytes_read(), Ordering::Relaxed);
        stats.frames_read.store(parser.frames_read(), Ordering::Relaxed);
        let msg = match unit {
            Ok(Some(Unit::Values(job))) => {
                if !send_until(&work, Task { seq, job }, &cancel) {
                    return;
                }
                seq += 1;
                continue;
            }
            Ok(Some(Unit::Control(Ok(c)))) => Ok(Some(Item::Control(c))),
            Ok(Some(Unit::Control(Err(e)))) => {
                log::warn!("[BROW] control frame decode failed: {}", e);
                Ok(Some(Item::ControlError(e)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        let last = !matches!(msg, Ok(Some(_)));
        if !send_until(&results, (seq, msg), &cancel) || last {
            return;
        }
        seq += 1;
    }
}

struct WorkerCtx {
    reg: Arc<TypeRegistry>,
    limits: Limits,
    validate: bool,
    projection: Projection,
    cancel: CancelToken,
    stats: Arc<Stats>,
}

fn decode_loop(ctx: WorkerCtx, work: Receiver<Task>, results: Sender<Msg>) {
    let mut projector = (!ctx.projection.is_all())
        .then(|| Projector::new(Arc::clone(&ctx.reg), ctx.projection.clone()));
    loop {
        let task = match work.recv_timeout(POLL_INTERVAL) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => {
                if ctx.cancel.is_canceled() {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };
        let mut opts = DecodeOptions {
            reg: &ctx.reg,
            limits: ctx.limits,
            validate: ctx.validate,
            projector: projector.as_mut(),
            cancel: &ctx.cancel,
        };
        let res = task.job.decode(&mut opts).map(|values| {
            ctx.stats
                .values_read
                .fetch_add(values.len() as u64, Ordering::Relaxed);
            Some(Item::Batch(Batch::new(task.seq, values)))
        });
        if !send_until(&results, (task.seq, res), &ctx.cancel) {
            return;
        }
    }
}

struct Pipeline {
    results: Receiver<Msg>,
    pending: BTreeMap<u64, Result<Option<Item>>>,
    next: u64,
    frame_thread: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    fn next(&mut self, cancel: &CancelToken) -> Result<Option<Item>> {
        loop {
            if let Some(entry) = self.pending.remove(&self.next) {
                self.next += 1;
                return entry;
            }
            cancel.check()?;
            match self.results.recv_timeout(POLL_INTERVAL) {
                Ok((seq, entry)) => {
                    self.pending.insert(seq, entry);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    cancel.check()?;
                    return Err(Error::Io(io::Error::other("BSUP reader pipeline stopped")));
                }
            }
        }
    }

    fn join(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.frame_thread.take() {
            // A frame thread blocked on input exits on its own once its
            // read returns; only join it when that already happened.
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::debug!("[BROW] detaching frame thread blocked on input");
            }
        }
    }
}

struct Inline {
    parser: Parser<Box<dyn Read + Send>>,
    projector: Option<Projector>,
    validate: bool,
    seq: u64,
}

impl Inline {
    fn next(&mut self, cancel: &CancelToken, stats: &Stats) -> Result<Option<Item>> {
        cancel.check()?;
        let unit = self.parser.next_unit();
        stats
            .bytes_read
            .store(self.parser.bytes_read(), Ordering::Relaxed);
        stats
            .frames_read
            .store(self.parser.frames_read(), Ordering::Relaxed);
        let seq = self.seq;
        self.seq += 1;
        match unit? {
            Some(Unit::Values(job)) => {
                let reg = Arc::clone(self.parser.registry());
                let mut opts = DecodeOptions {
                    reg: &reg,
                    limits: self.parser.limits(),
                    validate: self.validate,
                    projector: self.projector.as_mut(),
                    cancel,
                };
                let values = job.decode(&mut opts)?;
                stats
                    .values_read
                    .fetch_add(values.len() as u64, Ordering::Relaxed);
                Ok(Some(Item::Batch(Batch::new(seq, values))))
            }
            Some(Unit::Control(Ok(c))) => Ok(Some(Item::Control(c))),
            Some(Unit::Control(Err(e))) => {
                log::warn!("[BROW] control frame decode failed: {}", e);
                Ok(Some(Item::ControlError(e)))
            }
            None => Ok(None),
        }
    }
}

enum Engine {
    Inline(Box<Inline>),
    Pipeline(Pipeline),
}

/// BSUP reader producing values in stream order.
pub struct Reader {
    reg: Arc<TypeRegistry>,
    cancel: CancelToken,
    stats: Arc<Stats>,
    engine: Engine,
    buffered: VecDeque<Value>,
    finished: bool,
}

impl Reader {
    /// Start reading `input`; decoded types are interned in `reg`.
    pub fn new<R>(reg: Arc<TypeRegistry>, input: R, config: ReaderConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let limits = config
            .limits
            .unwrap_or_else(|| RuntimeConfig::global().limits());
        let stats = Arc::new(Stats::default());
        let cancel = config.cancel.clone();

        let engine = if config.threads == 0 {
            let input: Box<dyn Read + Send> = Box::new(input);
            let projector = (!config.projection.is_all())
                .then(|| Projector::new(Arc::clone(&reg), config.projection.clone()));
            Engine::Inline(Box::new(Inline {
                parser: Parser::new(Arc::clone(&reg), input, limits),
                projector,
                validate: config.validate,
                seq: 0,
            }))
        } else {
            let (work_tx, work_rx) = channel::bounded::<Task>(config.high_water.max(1));
            let (res_tx, res_rx) =
                channel::bounded::<Msg>(config.high_water.max(1) + config.threads);

            let mut workers = Vec::with_capacity(config.threads);
            for i in 0..config.threads {
                let ctx = WorkerCtx {
                    reg: Arc::clone(&reg),
                    limits,
                    validate: config.validate,
                    projection: config.projection.clone(),
                    cancel: cancel.clone(),
                    stats: Arc::clone(&stats),
                };
                let work = work_rx.clone();
                let results = res_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("sup-brow-decode-{}", i))
                    .spawn(move || decode_loop(ctx, work, results))?;
                workers.push(handle);
            }
            drop(work_rx);

            let parser = Parser::new(Arc::clone(&reg), input, limits);
            let frame_cancel = cancel.clone();
            let frame_stats = Arc::clone(&stats);
            let frame_thread = thread::Builder::new()
                .name("sup-brow-frames".to_string())
                .spawn(move || frame_loop(parser, work_tx, res_tx, frame_cancel, frame_stats))?;

            log::debug!(
                "[BROW] reader started with {} decode workers, high water {}",
                config.threads,
                config.high_water
            );
            Engine::Pipeline(Pipeline {
                results: res_rx,
                pending: BTreeMap::new(),
                next: 0,
                frame_thread: Some(frame_thread),
                workers,
            })
        };

        Ok(Self {
            reg,
            cancel,
            stats,
            engine,
            buffered: VecDeque::new(),
            finished: false,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.reg
    }

    /// Token that cancels this reader from any thread.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Next item in stream order; `Ok(None)` at the end.
    ///
    /// `done = true` stops the reader; it and every later pull return
    /// `Ok(None)`. After an error the stream is unusable and later pulls
    /// return `Ok(None)`.
    pub fn pull(&mut self, done: bool) -> Result<Option<Item>> {
        if done {
            self.shutdown();
            return Ok(None);
        }
        if self.finished {
            return Ok(None);
        }
        if let Err(e) = self.cancel.check() {
            self.shutdown();
            return Err(e);
        }
        let res = match &mut self.engine {
            Engine::Inline(inline) => inline.next(&self.cancel, &self.stats),
            Engine::Pipeline(p) => p.next(&self.cancel),
        };
        match res {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => {
                self.finished = true;
                self.stop_threads();
                Ok(None)
            }
            Err(e) => {
                self.shutdown();
                Err(e)
            }
        }
    }

    /// Next value, skipping control messages.
    pub fn read(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(v) = self.buffered.pop_front() {
                return Ok(Some(v));
            }
            match self.pull(false)? {
                Some(Item::Batch(b)) => self.buffered.extend(b.into_values()),
                Some(Item::Control(c)) => {
                    log::trace!("[BROW] skipping control message, format {}", c.format);
                }
                Some(Item::ControlError(_)) => {}
                None => return Ok(None),
            }
        }
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            bytes_read: self.stats.bytes_read.load(Ordering::Relaxed),
            values_read: self.stats.values_read.load(Ordering::Relaxed),
            frames_read: self.stats.frames_read.load(Ordering::Relaxed),
        }
    }

    fn stop_threads(&mut self) {
        if let Engine::Pipeline(p) = &mut self.engine {
            p.join();
        }
    }

    fn shutdown(&mut self) {
        self.finished = true;
        self.buffered.clear();
        self.cancel.cancel();
        self.stop_threads();
    }

    /// Cancel and release every thread.
    pub fn close(&mut self) {
        if !self.finished {
            log::debug!("[BROW] reader closed at {:?}", self.progress());
        }
        self.shutdown();
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Iterator for Reader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}
