// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! A blocking, single-assignment future shared between threads.

use std::fmt::{Debug, Formatter};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::{Error, Result};

type Callback<T> = Box<dyn FnOnce(&T) + Send + 'static>;

/// AsyncResult holds the eventual value of a job running elsewhere.
///
/// It starts pending and is resolved exactly once. Every clone observes the
/// same value. Waiting is done with [`AsyncResult::get`], or by registering
/// callbacks that run on the resolving thread.
///
/// ```
/// use std::time::Duration;
/// use s3lite_core::AsyncResult;
///
/// let result = AsyncResult::new();
/// let waiter = result.clone();
/// std::thread::spawn(move || result.resolve(42));
///
/// assert_eq!(waiter.get(Some(Duration::from_secs(5))).unwrap(), 42);
/// ```
pub struct AsyncResult<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

struct State<T> {
    value: Option<Arc<T>>,
    callbacks: Vec<Callback<T>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for AsyncResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("AsyncResult")
            .field("completed", &state.value.is_some())
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

impl<T: Send + Sync + 'static> AsyncResult<T> {
    /// Create a new pending result.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: None,
                    callbacks: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Create a new pending result with a callback already registered.
    pub fn with_callback(f: impl FnOnce(&T) + Send + 'static) -> Self {
        let result = Self::new();
        result.add_callback(f);
        result
    }

    /// Resolve this result with `value`.
    ///
    /// All waiters are woken before the callbacks run. Callbacks run on the
    /// current thread in registration order. A callback that panics is
    /// logged and skipped, the remaining callbacks still run.
    ///
    /// Returns [`ErrorKind::AlreadyResolved`](crate::ErrorKind::AlreadyResolved)
    /// if a value is already present. The first value is kept.
    pub fn resolve(&self, value: T) -> Result<()> {
        let (value, callbacks) = {
            let mut state = self.inner.state.lock();
            if state.value.is_some() {
                warn!("async result resolved more than once, keeping the first value");
                return Err(Error::already_resolved(
                    "async result has already been resolved",
                ));
            }

            let value = Arc::new(value);
            state.value = Some(value.clone());
            (value, mem::take(&mut state.callbacks))
        };

        self.inner.cond.notify_all();
        for callback in callbacks {
            // A panicking callback must not starve the ones after it.
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&value))).is_err() {
                warn!("async result callback panicked, running the remaining callbacks");
            }
        }
        Ok(())
    }

    /// Register a callback.
    ///
    /// If the result is already resolved the callback runs right away on the
    /// current thread.
    pub fn add_callback(&self, f: impl FnOnce(&T) + Send + 'static) {
        let value = {
            let mut state = self.inner.state.lock();
            match state.value.clone() {
                Some(v) => v,
                None => {
                    state.callbacks.push(Box::new(f));
                    return;
                }
            }
        };

        f(&value);
    }

    /// Check whether this result has been resolved.
    pub fn completed(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    /// Wait for the value and return a clone of it.
    ///
    /// `None` waits forever. On timeout an
    /// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout) error is returned
    /// and the result can be waited on again.
    pub fn get(&self, timeout: Option<Duration>) -> Result<T>
    where
        T: Clone,
    {
        let deadline = timeout.and_then(|d| Instant::now().checked_add(d));

        let mut state = self.inner.state.lock();
        loop {
            if let Some(v) = &state.value {
                return Ok(T::clone(v));
            }

            match deadline {
                None => self.inner.cond.wait(&mut state),
                Some(deadline) => {
                    if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                        return match &state.value {
                            Some(v) => Ok(T::clone(v)),
                            None => Err(Error::timeout(format!(
                                "async result not resolved within {:?}",
                                timeout.unwrap_or_default()
                            ))),
                        };
                    }
                }
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> AsyncResult<T> {
    /// Iterate over `results` in the order they complete.
    ///
    /// The iterator yields one item per input. If `timeout` passes before
    /// all of them are resolved, it yields a single `Timeout` error and ends.
    /// The deadline is shared by the whole iteration, not per item.
    ///
    /// Each call registers one callback per input. Callbacks on results that
    /// are still pending stay registered until those results resolve, so
    /// retrying after a `Timeout` adds another one every time.
    pub fn as_completed(results: &[AsyncResult<T>], timeout: Option<Duration>) -> AsCompleted<T> {
        let (tx, rx) = channel::unbounded();
        for result in results {
            let tx = tx.clone();
            result.add_callback(move |v: &T| {
                // The receiver may be gone if the caller stopped iterating.
                let _ = tx.send(v.clone());
            });
        }

        AsCompleted {
            rx,
            remaining: results.len(),
            deadline: timeout.and_then(|d| Instant::now().checked_add(d)),
            timeout,
        }
    }

    /// Wait until every result is resolved and return the values in input order.
    ///
    /// Fails with `Timeout` if `timeout` passes first. Like
    /// [`AsyncResult::as_completed`], every call leaves one callback on each
    /// pending input until it resolves.
    pub fn all_completed(results: &[AsyncResult<T>], timeout: Option<Duration>) -> Result<Vec<T>> {
        let latch = Arc::new(Latch::new(results.len()));
        for result in results {
            let latch = latch.clone();
            result.add_callback(move |_: &T| latch.count_down());
        }

        let deadline = timeout.and_then(|d| Instant::now().checked_add(d));
        if !latch.wait(deadline) {
            return Err(Error::timeout(format!(
                "{} of {} results not resolved within {:?}",
                latch.remaining(),
                results.len(),
                timeout.unwrap_or_default()
            )));
        }

        debug!("all {} async results completed", results.len());
        results.iter().map(|v| v.get(None)).collect()
    }
}

/// Iterator returned by [`AsyncResult::as_completed`].
pub struct AsCompleted<T> {
    rx: Receiver<T>,
    remaining: usize,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
}

impl<T> Debug for AsCompleted<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsCompleted")
            .field("remaining", &self.remaining)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl<T> Iterator for AsCompleted<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let received = match self.deadline {
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => self.rx.recv_deadline(deadline),
        };

        match received {
            Ok(v) => {
                self.remaining -= 1;
                Some(Ok(v))
            }
            Err(RecvTimeoutError::Timeout) => {
                let remaining = mem::take(&mut self.remaining);
                Some(Err(Error::timeout(format!(
                    "{remaining} results not completed within {:?}",
                    self.timeout.unwrap_or_default()
                ))))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.remaining = 0;
                Some(Err(Error::unexpected(
                    "async results dropped before being resolved",
                )))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// A countdown latch released once the count reaches zero.
#[derive(Debug)]
struct Latch {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Latch {
    fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    fn count_down(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.cond.notify_all();
        }
    }

    fn remaining(&self) -> usize {
        *self.count.lock()
    }

    /// Returns `false` if the deadline passed before the count reached zero.
    fn wait(&self, deadline: Option<Instant>) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            match deadline {
                None => self.cond.wait(&mut count),
                Some(deadline) => {
                    if self.cond.wait_until(&mut count, deadline).timed_out() {
                        return *count == 0;
                    }
                }
            }
        }
        true
    }
}
