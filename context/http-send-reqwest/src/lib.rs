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

//! Blocking [`HttpSend`] implementation backed by [`reqwest`].
//!
//! ```no_run
//! use s3lite_core::Context;
//! use s3lite_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//! ```

use bytes::Bytes;
use log::debug;
use reqwest::blocking::{Client, Request};
use s3lite_core::{Error, HttpSend, Result};

/// HttpSend implementation over a blocking [`reqwest::blocking::Client`].
///
/// The client keeps its own connection pool and is safe to share between
/// worker threads.
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::blocking::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl HttpSend for ReqwestHttpSend {
    fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req.map(|body| body.to_vec()))
            .map_err(|e| Error::request_invalid("convert request for reqwest").with_source(e))?;
        debug!("sending {} {}", req.method(), req.url());

        let resp = self
            .client
            .execute(req)
            .map_err(|e| Error::unexpected("send http request").with_source(e))?;

        let mut builder = http::Response::builder()
            .status(resp.status())
            .version(resp.version());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(resp.headers().clone());
        }

        let body = resp
            .bytes()
            .map_err(|e| Error::unexpected("read http response body").with_source(e))?;
        Ok(builder.body(body)?)
    }
}
