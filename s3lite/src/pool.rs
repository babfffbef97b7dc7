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

use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use http::{HeaderMap, Request};
use log::{debug, warn};
use parking_lot::Mutex;
use s3lite_core::{AsCompleted, AsyncResult, Context, Error, Result};

use crate::list::{Object, Upload};
use crate::request_factory::{CopyOptions, ListUploadsOptions, UploadOptions};
use crate::{Config, Connection, MultipartUpload, Response};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result of a job submitted to a [`Pool`].
pub type PoolResult<T> = AsyncResult<Result<T>>;

/// Pool runs requests on a fixed set of worker threads.
///
/// Every operation returns a [`PoolResult`] right away. Bucket selection and
/// request building happen on the calling thread, so their errors are
/// returned directly. Signing, sending and decoding happen on a worker.
///
/// Dropping the pool closes it and waits for queued jobs to finish.
pub struct Pool {
    conn: Connection,
    size: usize,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("conn", &self.conn)
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Pool {
    /// Create a new pool with a blocking reqwest client and the process
    /// environment.
    #[cfg(feature = "default-context")]
    pub fn new(config: Config) -> Result<Self> {
        let size = config.pool_size;
        Self::with_connection(Connection::new(config)?, size)
    }

    /// Create a new pool on top of `ctx`.
    pub fn with_context(ctx: Context, config: Config) -> Result<Self> {
        let size = config.pool_size;
        Self::with_connection(Connection::with_context(ctx, config)?, size)
    }

    /// Create a new pool of `size` workers sharing `conn`.
    pub fn with_connection(conn: Connection, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::config_invalid("pool size must be at least 1"));
        }

        let (tx, rx) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for idx in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("s3lite-worker-{idx}"))
                .spawn(move || run_worker(rx))
                .map_err(|e| Error::unexpected("failed to spawn pool worker").with_source(e))?;
            workers.push(handle);
        }
        debug!("started pool with {size} workers");

        Ok(Self {
            conn,
            size,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    /// The connection shared by the workers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Run `f` on a worker.
    ///
    /// The returned result resolves with the output of `f`. A panicking job
    /// resolves with an `Unexpected` error.
    pub fn submit<T, F>(&self, f: F) -> Result<PoolResult<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let result = AsyncResult::new();
        let resolver = result.clone();
        let job: Job = Box::new(move || {
            let value = match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(v) => v,
                Err(e) => Err(Error::unexpected(format!(
                    "pool job panicked: {}",
                    panic_message(e.as_ref())
                ))),
            };
            // Only this job resolves the result.
            let _ = resolver.resolve(value);
        });

        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return Err(Error::pool_closed("pool has been closed"));
        };
        tx.send(job)
            .map_err(|_| Error::pool_closed("pool workers have stopped"))?;
        Ok(result)
    }

    /// Stop accepting jobs.
    ///
    /// Jobs already queued still run. With `wait` this blocks until all of
    /// them are done and the workers have exited.
    pub fn close(&self, wait: bool) {
        if self.sender.lock().take().is_some() {
            debug!("pool closed");
        }
        if !wait {
            return;
        }

        let current = thread::current().id();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.thread().id() == current {
                warn!("pool closed from its own worker, not joining it");
                continue;
            }
            if handle.join().is_err() {
                warn!("pool worker exited with a panic");
            }
        }
    }

    /// Run `f` with this pool, then close it and wait for the workers.
    ///
    /// The pool is closed even if `f` returns an error or panics, queued jobs
    /// still run to completion.
    pub fn scope<R>(self, f: impl FnOnce(&Pool) -> R) -> R {
        f(&self)
    }

    /// See [`AsyncResult::as_completed`].
    pub fn as_completed<T: Clone + Send + Sync + 'static>(
        &self,
        results: &[AsyncResult<T>],
        timeout: Option<Duration>,
    ) -> AsCompleted<T> {
        AsyncResult::as_completed(results, timeout)
    }

    /// See [`AsyncResult::all_completed`].
    pub fn all_completed<T: Clone + Send + Sync + 'static>(
        &self,
        results: &[AsyncResult<T>],
        timeout: Option<Duration>,
    ) -> Result<Vec<T>> {
        AsyncResult::all_completed(results, timeout)
    }

    fn submit_request(&self, req: Request<Bytes>) -> Result<PoolResult<Response>> {
        let conn = self.conn.clone();
        self.submit(move || conn.execute(req))
    }

    /// Download an object.
    pub fn get(&self, key: &str, bucket: Option<&str>) -> Result<PoolResult<Response>> {
        self.get_with_headers(key, bucket, HeaderMap::new())
    }

    /// Download an object, sending extra headers such as `Range`.
    pub fn get_with_headers(
        &self,
        key: &str,
        bucket: Option<&str>,
        headers: HeaderMap,
    ) -> Result<PoolResult<Response>> {
        let req = self
            .conn
            .factory()
            .get(self.conn.bucket(bucket)?, key, headers)?;
        self.submit_request(req)
    }

    /// Fetch the headers of an object.
    pub fn head_object(&self, key: &str, bucket: Option<&str>) -> Result<PoolResult<Response>> {
        let req =
            self.conn
                .factory()
                .head_object(self.conn.bucket(bucket)?, key, HeaderMap::new())?;
        self.submit_request(req)
    }

    /// Check that a bucket exists and is reachable.
    pub fn head_bucket(&self, bucket: Option<&str>) -> Result<PoolResult<Response>> {
        let req = self.conn.factory().head_bucket(self.conn.bucket(bucket)?)?;
        self.submit_request(req)
    }

    /// Delete an object.
    pub fn delete(&self, key: &str, bucket: Option<&str>) -> Result<PoolResult<Response>> {
        let req = self.conn.factory().delete(self.conn.bucket(bucket)?, key)?;
        self.submit_request(req)
    }

    /// Upload `body` as `key`.
    pub fn upload(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        bucket: Option<&str>,
        opts: &UploadOptions,
    ) -> Result<PoolResult<Response>> {
        let req = self
            .conn
            .factory()
            .upload(self.conn.bucket(bucket)?, key, body.into(), opts)?;
        self.submit_request(req)
    }

    /// Copy an object.
    ///
    /// `to_bucket` defaults to the source bucket.
    pub fn copy(
        &self,
        from_key: &str,
        from_bucket: Option<&str>,
        to_key: &str,
        to_bucket: Option<&str>,
        opts: &CopyOptions,
    ) -> Result<PoolResult<Response>> {
        let from_bucket = self.conn.bucket(from_bucket)?;
        let to_bucket = to_bucket.filter(|v| !v.is_empty()).unwrap_or(from_bucket);
        let req = self
            .conn
            .factory()
            .copy(from_bucket, from_key, to_bucket, to_key, opts)?;
        self.submit_request(req)
    }

    /// Replace the metadata of an object.
    pub fn update_metadata(
        &self,
        key: &str,
        bucket: Option<&str>,
        opts: &CopyOptions,
    ) -> Result<PoolResult<Response>> {
        let req = self
            .conn
            .factory()
            .update_metadata(self.conn.bucket(bucket)?, key, opts)?;
        self.submit_request(req)
    }

    /// List every object under `prefix`.
    pub fn list(&self, prefix: &str, bucket: Option<&str>) -> Result<PoolResult<Vec<Object>>> {
        let bucket = self.conn.bucket(bucket)?.to_string();
        let prefix = prefix.to_string();
        let conn = self.conn.clone();
        self.submit(move || conn.list(&prefix, Some(&bucket)))
    }

    /// List every multipart upload in progress.
    pub fn list_multipart_uploads(
        &self,
        bucket: Option<&str>,
        opts: &ListUploadsOptions,
    ) -> Result<PoolResult<Vec<Upload>>> {
        let bucket = self.conn.bucket(bucket)?.to_string();
        let opts = opts.clone();
        let conn = self.conn.clone();
        self.submit(move || conn.list_multipart_uploads(Some(&bucket), &opts))
    }

    /// Start a multipart upload of `key`.
    pub fn initiate_multipart_upload(
        &self,
        key: &str,
        bucket: Option<&str>,
    ) -> Result<PoolResult<MultipartUpload>> {
        let bucket = self.conn.bucket(bucket)?.to_string();
        let key = key.to_string();
        let conn = self.conn.clone();
        self.submit(move || MultipartUpload::initiate(&conn, &key, Some(&bucket)))
    }

    /// Upload one part of `upload` on a worker.
    pub fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: u32,
        body: impl Into<Bytes>,
        md5: Option<&str>,
    ) -> Result<PoolResult<Response>> {
        if part_number == 0 {
            return Err(Error::request_invalid("part numbers start at 1"));
        }

        let upload = upload.clone();
        let body = body.into();
        let md5 = md5.map(|v| v.to_string());
        self.submit(move || upload.upload_part(part_number, body, md5.as_deref()))
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.close(true);
    }
}

fn run_worker(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        // Jobs catch their own panics, callbacks run after them may not.
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("pool result callback panicked");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use s3lite_core::ErrorKind;

    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn pool(size: usize) -> Pool {
        let config = Config::new()
            .with_access_key_id("access_key_id")
            .with_secret_access_key("secret_access_key")
            .with_pool_size(size);
        Pool::with_context(Context::new(), config).expect("pool must be built")
    }

    #[test]
    fn test_submit() {
        init();

        let pool = pool(2);
        let result = pool.submit(|| Ok(1 + 1)).expect("submit must succeed");
        assert_eq!(
            result
                .get(Some(Duration::from_secs(5)))
                .expect("job must finish")
                .expect("job must succeed"),
            2
        );
    }

    #[test]
    fn test_submit_error() {
        init();

        let pool = pool(1);
        let result = pool
            .submit(|| -> Result<()> { Err(Error::request_invalid("bad request")) })
            .expect("submit must succeed");
        let err = result
            .get(Some(Duration::from_secs(5)))
            .expect("job must finish")
            .expect_err("job must fail");
        assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    }

    #[test]
    fn test_panicking_job_resolves() {
        init();

        let pool = pool(1);
        let result = pool
            .submit(|| -> Result<()> { panic!("boom") })
            .expect("submit must succeed");
        let err = result
            .get(Some(Duration::from_secs(5)))
            .expect("job must finish")
            .expect_err("job must fail");
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.message().contains("boom"), "{}", err.message());

        // The worker survives the panic.
        let result = pool.submit(|| Ok("alive")).expect("submit must succeed");
        assert_eq!(
            result
                .get(Some(Duration::from_secs(5)))
                .expect("job must finish")
                .expect("job must succeed"),
            "alive"
        );
    }

    #[test]
    fn test_zero_size() {
        let config = Config::new()
            .with_access_key_id("access_key_id")
            .with_secret_access_key("secret_access_key")
            .with_pool_size(0);
        let err = Pool::with_context(Context::new(), config).expect_err("size 0 must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_close_rejects_jobs() {
        init();

        let pool = pool(2);
        pool.close(true);
        assert!(pool.is_closed());

        let err = pool.submit(|| Ok(())).expect_err("closed pool must reject");
        assert_eq!(err.kind(), ErrorKind::PoolClosed);

        // Closing twice is fine.
        pool.close(false);
    }

    #[test]
    fn test_close_waits_for_queued_jobs() {
        init();

        let pool = pool(2);
        let done = Arc::new(AtomicUsize::new(0));
        let results: Vec<_> = (0..6)
            .map(|_| {
                let done = done.clone();
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(20));
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .expect("submit must succeed")
            })
            .collect();

        pool.close(true);
        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert!(results.iter().all(|v| v.completed()));
    }

    #[test]
    fn test_scope_closes_pool() {
        init();

        let done = Arc::new(AtomicUsize::new(0));
        let d = done.clone();
        let submitted = pool(3).scope(move |pool| {
            for _ in 0..5 {
                let d = d.clone();
                pool.submit(move || {
                    thread::sleep(Duration::from_millis(10));
                    d.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .expect("submit must succeed");
            }
            5
        });

        assert_eq!(done.load(Ordering::SeqCst), submitted);
    }

    /// Submit `n` slow jobs counting into `done`, keeping their results.
    fn submit_slow(
        pool: &Pool,
        n: usize,
        done: &Arc<AtomicUsize>,
        results: &Mutex<Vec<PoolResult<()>>>,
    ) {
        for _ in 0..n {
            let done = done.clone();
            let result = pool
                .submit(move || {
                    thread::sleep(Duration::from_millis(20));
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .expect("submit must succeed");
            results.lock().push(result);
        }
    }

    #[test]
    fn test_scope_closes_pool_on_panic() {
        init();

        let done = Arc::new(AtomicUsize::new(0));
        let results = Mutex::new(Vec::new());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pool(2).scope(|pool| {
                submit_slow(pool, 6, &done, &results);
                panic!("caller failed");
            })
        }));

        assert!(outcome.is_err());
        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert!(results.lock().iter().all(|v| v.completed()));
    }

    #[test]
    fn test_scope_closes_pool_on_error() {
        init();

        let done = Arc::new(AtomicUsize::new(0));
        let results = Mutex::new(Vec::new());
        let outcome: Result<()> = pool(2).scope(|pool| {
            submit_slow(pool, 6, &done, &results);
            Err(Error::request_invalid("caller failed"))
        });

        assert_eq!(
            outcome.expect_err("error must be returned").kind(),
            ErrorKind::RequestInvalid
        );
        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert!(results.lock().iter().all(|v| v.completed()));
    }

    #[test]
    fn test_panicking_callback_on_worker() {
        init();

        let pool = pool(1);
        let (tx, rx) = channel::bounded::<()>(0);
        let result = pool
            .submit(move || {
                let _ = rx.recv_timeout(Duration::from_secs(5));
                Ok(1)
            })
            .expect("submit must succeed");
        result.add_callback(|_| panic!("callback failed"));
        let mut completed = pool.as_completed(&[result.clone()], Some(Duration::from_secs(5)));
        tx.send(()).expect("job must be waiting");

        let value = completed
            .next()
            .expect("one value must be yielded")
            .expect("value must be delivered")
            .expect("job must succeed");
        assert_eq!(value, 1);
        assert!(completed.next().is_none());

        // The worker is still usable.
        let result = pool.submit(|| Ok(2)).expect("submit must succeed");
        assert_eq!(
            result
                .get(Some(Duration::from_secs(5)))
                .expect("job must finish")
                .expect("job must succeed"),
            2
        );
    }

    #[test]
    fn test_combinators() {
        init();

        let pool = pool(4);
        let results: Vec<_> = (0..8u64)
            .map(|idx| {
                pool.submit(move || {
                    thread::sleep(Duration::from_millis((8 - idx) * 5));
                    Ok(idx)
                })
                .expect("submit must succeed")
            })
            .collect();

        let values = pool
            .all_completed(&results, Some(Duration::from_secs(5)))
            .expect("all must complete");
        assert_eq!(
            values.into_iter().collect::<Result<Vec<_>>>().expect("all succeed"),
            (0..8).collect::<Vec<_>>()
        );

        let mut values: Vec<u64> = pool
            .as_completed(&results, Some(Duration::from_secs(5)))
            .map(|v| v.expect("must complete").expect("must succeed"))
            .collect();
        values.sort();
        assert_eq!(values, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_missing_bucket_is_synchronous() {
        init();

        let pool = pool(1);
        let err = pool.get("key", None).expect_err("no bucket must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
