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

use std::time::Duration;

use anyhow::Result;
use http::Method;
use pretty_assertions::assert_eq;
use s3lite::{ErrorKind, MultipartUpload};

use super::*;

const UPLOAD_ID: &str = "VXBsb2FkIElEIGZvciA2aWWpbmcncyBteS1tb3ZpZS5tMnRzIHVwbG9hZA";

/// Answer like the service does for a two part upload.
fn multipart_service() -> MockHttpSend {
    MockHttpSend::new(|req| {
        let body = match req.method {
            Method::POST if req.uri.ends_with("?uploads") => format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
                  <Bucket>bucket</Bucket>
                  <Key>movie.m2ts</Key>
                  <UploadId>{UPLOAD_ID}</UploadId>
                </InitiateMultipartUploadResult>"#
            ),
            Method::GET if req.uri.contains("part-number-marker=1") => r#"<ListPartsResult>
                <IsTruncated>false</IsTruncated>
                <Part><PartNumber>2</PartNumber><ETag>"bbb"</ETag><Size>5</Size></Part>
            </ListPartsResult>"#
                .to_string(),
            Method::GET => r#"<ListPartsResult>
                <NextPartNumberMarker>1</NextPartNumberMarker>
                <IsTruncated>true</IsTruncated>
                <Part><PartNumber>1</PartNumber><ETag>"aaa"</ETag><Size>5</Size></Part>
            </ListPartsResult>"#
                .to_string(),
            _ => String::new(),
        };
        (200, body)
    })
}

#[test]
fn test_multipart_upload_flow() -> Result<()> {
    let mock = multipart_service();
    let conn = connection(&mock);

    let upload = conn.initiate_multipart_upload("movie.m2ts", None)?;
    assert_eq!(upload.upload_id(), UPLOAD_ID);
    assert_eq!(upload.bucket(), "bucket");
    assert_eq!(upload.key(), "movie.m2ts");

    upload.upload_part(1, "part1", None)?;
    upload.upload_part(2, "part2", Some("1B2M2Y8AsgTpgAmY7PhCfg=="))?;
    assert_eq!(upload.number_of_parts()?, 2);
    upload.complete()?;

    let requests = mock.requests();
    let summary: Vec<_> = requests
        .iter()
        .map(|v| (v.method.clone(), v.uri.as_str()))
        .collect();
    let upload_url = "http://s3.amazonaws.com/bucket/movie.m2ts";
    assert_eq!(
        summary,
        vec![
            (Method::POST, format!("{upload_url}?uploads").as_str()),
            (
                Method::PUT,
                format!("{upload_url}?partNumber=1&uploadId={UPLOAD_ID}").as_str()
            ),
            (
                Method::PUT,
                format!("{upload_url}?partNumber=2&uploadId={UPLOAD_ID}").as_str()
            ),
            (
                Method::GET,
                format!("{upload_url}?uploadId={UPLOAD_ID}&max-parts=1000").as_str()
            ),
            (
                Method::GET,
                format!("{upload_url}?uploadId={UPLOAD_ID}&max-parts=1000&part-number-marker=1")
                    .as_str()
            ),
            (
                Method::GET,
                format!("{upload_url}?uploadId={UPLOAD_ID}&max-parts=1000").as_str()
            ),
            (
                Method::GET,
                format!("{upload_url}?uploadId={UPLOAD_ID}&max-parts=1000&part-number-marker=1")
                    .as_str()
            ),
            (
                Method::POST,
                format!("{upload_url}?uploadId={UPLOAD_ID}").as_str()
            ),
        ]
    );

    assert_eq!(requests[1].header("content-length"), Some("5"));
    assert_eq!(requests[1].header("content-md5"), None);
    assert_eq!(
        requests[2].header("content-md5"),
        Some("1B2M2Y8AsgTpgAmY7PhCfg==")
    );
    assert_eq!(
        requests[7].body,
        "<CompleteMultipartUpload>\
         <Part><PartNumber>1</PartNumber><ETag>\"aaa\"</ETag></Part>\
         <Part><PartNumber>2</PartNumber><ETag>\"bbb\"</ETag></Part>\
         </CompleteMultipartUpload>"
    );
    assert!(requests.iter().all(|v| v.header("authorization").is_some()));
    Ok(())
}

#[test]
fn test_cancel() -> Result<()> {
    let mock = MockHttpSend::ok();
    let conn = connection(&mock);

    let upload = MultipartUpload::resume(&conn, "bucket", "movie.m2ts", "upload-id");
    upload.cancel()?;

    let req = &mock.requests()[0];
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(
        req.uri,
        "http://s3.amazonaws.com/bucket/movie.m2ts?uploadId=upload-id"
    );
    Ok(())
}

#[test]
fn test_complete_without_parts() {
    let mock = MockHttpSend::new(|_| {
        (
            200,
            "<ListPartsResult><IsTruncated>false</IsTruncated></ListPartsResult>".to_string(),
        )
    });
    let conn = connection(&mock);

    let upload = MultipartUpload::resume(&conn, "bucket", "key", "upload-id");
    let err = upload.complete().expect_err("no parts must fail");
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    // Only the listing has been sent.
    assert_eq!(mock.requests().len(), 1);
}

#[test]
fn test_part_number_starts_at_one() {
    let mock = MockHttpSend::ok();
    let conn = connection(&mock);

    let upload = MultipartUpload::resume(&conn, "bucket", "key", "upload-id");
    let err = upload
        .upload_part(0, "data", None)
        .expect_err("part 0 must fail");
    assert_eq!(err.kind(), ErrorKind::RequestInvalid);
    assert!(mock.requests().is_empty());
}

#[test]
fn test_parts_uploaded_on_pool() -> Result<()> {
    let mock = multipart_service();
    let pool = pool(&mock, 3);

    let upload = pool
        .initiate_multipart_upload("movie.m2ts", None)?
        .get(Some(Duration::from_secs(10)))??;

    let results = (1..=6u32)
        .map(|n| pool.upload_part(&upload, n, vec![b'x'; 16], None))
        .collect::<s3lite::Result<Vec<_>>>()?;
    for resp in pool.all_completed(&results, Some(Duration::from_secs(10)))? {
        assert!(resp?.etag().is_some());
    }

    let mut parts: Vec<_> = mock
        .requests()
        .into_iter()
        .filter(|v| v.method == Method::PUT)
        .map(|v| v.uri)
        .collect();
    parts.sort();
    assert_eq!(parts.len(), 6);
    assert!(parts[0].contains("partNumber=1&"), "{}", parts[0]);
    Ok(())
}
