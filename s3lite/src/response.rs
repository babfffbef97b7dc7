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

use bytes::Bytes;
use http::header::ETAG;
use http::{HeaderMap, StatusCode};
use s3lite_core::{Error, Result};

use crate::list::decode_error;

/// A successful response from the service.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Convert an http response, turning non-2xx statuses into
    /// [`ErrorKind::ResponseFailed`](s3lite_core::ErrorKind::ResponseFailed).
    pub fn from_http(resp: http::Response<Bytes>) -> Result<Self> {
        let (parts, body) = resp.into_parts();
        if !parts.status.is_success() {
            return Err(response_error(parts.status, &body));
        }

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// ETag header, if any.
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as utf-8.
    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }
}

fn response_error(status: StatusCode, body: &[u8]) -> Error {
    match decode_error(body) {
        Some(e) if e.message.is_empty() => Error::response_failed(status, e.code),
        Some(e) => Error::response_failed(status, format!("{}: {}", e.code, e.message)),
        None => Error::response_failed(
            status,
            format!("request failed with status {}", status.as_u16()),
        ),
    }
}
