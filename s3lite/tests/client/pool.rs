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

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use http::Method;
use rand::Rng;
use s3lite::{ErrorKind, UploadOptions};

use super::*;

const TIMEOUT: Option<Duration> = Some(Duration::from_secs(10));

#[test]
fn test_uploads_complete_in_any_order() -> Result<()> {
    // Random latency so that jobs finish out of submission order.
    let mock = MockHttpSend::new(|_| {
        thread::sleep(Duration::from_millis(rand::thread_rng().gen_range(0..50)));
        (200, String::new())
    });
    let pool = pool(&mock, 4);

    let results = (0..10)
        .map(|idx| {
            pool.upload(
                &format!("file-{idx}.txt"),
                format!("content {idx}"),
                None,
                &UploadOptions::default(),
            )
        })
        .collect::<s3lite::Result<Vec<_>>>()?;

    let mut done = 0;
    for resp in pool.as_completed(&results, TIMEOUT) {
        assert_eq!(resp??.status(), http::StatusCode::OK);
        done += 1;
    }
    assert_eq!(done, 10);

    let uris: BTreeSet<String> = mock.requests().into_iter().map(|v| v.uri).collect();
    assert_eq!(
        uris,
        (0..10)
            .map(|idx| format!("http://s3.amazonaws.com/bucket/file-{idx}.txt"))
            .collect::<BTreeSet<_>>()
    );
    Ok(())
}

#[test]
fn test_all_completed_keeps_submission_order() -> Result<()> {
    let mock = MockHttpSend::new(|req| (200, req.uri.clone()));
    let pool = pool(&mock, 3);

    let keys = ["c", "a", "b", "d"];
    let results = keys
        .iter()
        .map(|key| pool.get(key, None))
        .collect::<s3lite::Result<Vec<_>>>()?;

    let bodies = pool
        .all_completed(&results, TIMEOUT)?
        .into_iter()
        .map(|v| -> Result<String> { Ok(v?.text()?) })
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(
        bodies,
        keys.iter()
            .map(|key| format!("http://s3.amazonaws.com/bucket/{key}"))
            .collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn test_failed_request_resolves_with_error() -> Result<()> {
    let mock = MockHttpSend::new(|_| {
        (
            403,
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>".to_string(),
        )
    });
    let pool = pool(&mock, 2);

    let result = pool.delete("key", None)?;
    let err = result
        .get(TIMEOUT)?
        .expect_err("403 must resolve with an error");
    assert_eq!(err.kind(), ErrorKind::ResponseFailed);
    assert_eq!(err.message(), "AccessDenied: Access Denied");

    // Every waiter sees the same error.
    let again = result.get(TIMEOUT)?.expect_err("result is immutable");
    assert_eq!(again.message(), err.message());
    Ok(())
}

#[test]
fn test_callbacks_see_the_response() -> Result<()> {
    let mock = MockHttpSend::ok();
    let pool = pool(&mock, 1);

    let (tx, rx) = crossbeam::channel::bounded(1);
    let result = pool.head_bucket(None)?;
    result.add_callback(move |resp: &s3lite::Result<s3lite::Response>| {
        let _ = tx.send(resp.as_ref().map(|v| v.status()).ok());
    });

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(10))?,
        Some(http::StatusCode::OK)
    );
    Ok(())
}

#[test]
fn test_list_runs_on_worker() -> Result<()> {
    let mock = MockHttpSend::new(|_| {
        (
            200,
            "<ListBucketResult><Contents><Key>a</Key></Contents></ListBucketResult>".to_string(),
        )
    });
    let pool = pool(&mock, 2);

    let objects = pool.list("", Some("listing"))?.get(TIMEOUT)??;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, "a");
    assert_eq!(mock.requests()[0].method, Method::GET);
    Ok(())
}

#[test]
fn test_validation_errors_are_synchronous() {
    let mock = MockHttpSend::ok();
    let pool = Pool::with_context(
        Context::new().with_http_send(mock.clone()),
        Config::new()
            .with_access_key_id(ACCESS_KEY)
            .with_secret_access_key(SECRET_KEY),
    )
    .expect("pool must be built");

    let err = pool.get("key", None).expect_err("no bucket must fail");
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

    let err = pool
        .upload(
            "key",
            "body",
            Some("bucket"),
            &UploadOptions::default().with_content_type("bad\r\nvalue"),
        )
        .expect_err("invalid header must fail");
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);

    assert!(mock.requests().is_empty());
}

#[test]
fn test_drop_waits_for_queued_requests() {
    let mock = MockHttpSend::new(|_| {
        thread::sleep(Duration::from_millis(10));
        (200, String::new())
    });

    pool(&mock, 2).scope(|pool| {
        for idx in 0..8 {
            pool.delete(&format!("key-{idx}"), None)
                .expect("submit must succeed");
        }
    });

    assert_eq!(mock.requests().len(), 8);
}

#[test]
fn test_closed_pool_rejects_requests() {
    let mock = MockHttpSend::ok();
    let pool = pool(&mock, 1);
    pool.close(true);

    let err = pool.get("key", None).expect_err("closed pool must reject");
    assert_eq!(err.kind(), ErrorKind::PoolClosed);
}
