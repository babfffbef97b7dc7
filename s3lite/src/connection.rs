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
use http::{HeaderMap, Request};
use log::debug;
use s3lite_core::{Context, Error, Result, Signer};
use s3lite_s3_v2::{Credential, DefaultCredentialProvider, RequestSigner};

use crate::list::{decode_list_multipart_uploads, decode_list_objects, Object, Upload};
use crate::request_factory::{CopyOptions, ListUploadsOptions, RequestFactory, UploadOptions};
use crate::{Config, MultipartUpload, Response};

/// Connection runs requests on the calling thread.
///
/// It is cheap to clone and can be shared between threads.
#[derive(Clone, Debug)]
pub struct Connection {
    ctx: Context,
    signer: Signer<Credential>,
    factory: RequestFactory,
    default_bucket: Option<String>,
}

impl Connection {
    /// Create a new connection that sends requests with a blocking reqwest
    /// client and reads missing credentials from the process environment.
    #[cfg(feature = "default-context")]
    pub fn new(config: Config) -> Result<Self> {
        let ctx = Context::new()
            .with_http_send(s3lite_http_send_reqwest::ReqwestHttpSend::default())
            .with_env(s3lite_core::OsEnv);
        Self::with_context(ctx, config)
    }

    /// Create a new connection on top of `ctx`.
    ///
    /// Fails with `ConfigInvalid` if no credential can be found.
    pub fn with_context(ctx: Context, config: Config) -> Result<Self> {
        let signer = Signer::from_provider(
            &ctx,
            DefaultCredentialProvider::with_config(config.credential),
            RequestSigner::new(),
        )?;

        Ok(Self {
            ctx,
            signer,
            factory: RequestFactory::new(config.endpoint, config.tls),
            default_bucket: config.default_bucket.filter(|v| !v.is_empty()),
        })
    }

    /// Pick `bucket` or fall back to the default bucket.
    pub fn bucket<'a>(&'a self, bucket: Option<&'a str>) -> Result<&'a str> {
        bucket
            .filter(|v| !v.is_empty())
            .or(self.default_bucket.as_deref())
            .ok_or_else(|| {
                Error::config_invalid(
                    "You must specify a bucket in your request or set the default_bucket for the connection",
                )
            })
    }

    /// The factory used to build requests.
    pub fn factory(&self) -> &RequestFactory {
        &self.factory
    }

    /// Sign `req` and send it.
    pub fn execute(&self, req: Request<Bytes>) -> Result<Response> {
        let (mut parts, body) = req.into_parts();
        self.signer.sign(&mut parts)?;

        debug!("execute {} {}", parts.method, parts.uri);
        let resp = self.ctx.http_send(Request::from_parts(parts, body))?;
        debug!("response status {}", resp.status());
        Response::from_http(resp)
    }

    /// Download an object.
    pub fn get(&self, key: &str, bucket: Option<&str>) -> Result<Response> {
        self.get_with_headers(key, bucket, HeaderMap::new())
    }

    /// Download an object, sending extra headers such as `Range`.
    pub fn get_with_headers(
        &self,
        key: &str,
        bucket: Option<&str>,
        headers: HeaderMap,
    ) -> Result<Response> {
        self.execute(self.factory.get(self.bucket(bucket)?, key, headers)?)
    }

    /// Fetch the headers of an object.
    pub fn head_object(&self, key: &str, bucket: Option<&str>) -> Result<Response> {
        self.execute(
            self.factory
                .head_object(self.bucket(bucket)?, key, HeaderMap::new())?,
        )
    }

    /// Check that a bucket exists and is reachable.
    pub fn head_bucket(&self, bucket: Option<&str>) -> Result<Response> {
        self.execute(self.factory.head_bucket(self.bucket(bucket)?)?)
    }

    /// Delete an object.
    pub fn delete(&self, key: &str, bucket: Option<&str>) -> Result<Response> {
        self.execute(self.factory.delete(self.bucket(bucket)?, key)?)
    }

    /// Upload `body` as `key`.
    pub fn upload(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        bucket: Option<&str>,
        opts: &UploadOptions,
    ) -> Result<Response> {
        self.execute(
            self.factory
                .upload(self.bucket(bucket)?, key, body.into(), opts)?,
        )
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
    ) -> Result<Response> {
        let from_bucket = self.bucket(from_bucket)?;
        let to_bucket = to_bucket.filter(|v| !v.is_empty()).unwrap_or(from_bucket);
        self.execute(
            self.factory
                .copy(from_bucket, from_key, to_bucket, to_key, opts)?,
        )
    }

    /// Replace the metadata of an object.
    pub fn update_metadata(
        &self,
        key: &str,
        bucket: Option<&str>,
        opts: &CopyOptions,
    ) -> Result<Response> {
        self.execute(
            self.factory
                .update_metadata(self.bucket(bucket)?, key, opts)?,
        )
    }

    /// List every object under `prefix`, following pagination.
    pub fn list(&self, prefix: &str, bucket: Option<&str>) -> Result<Vec<Object>> {
        let bucket = self.bucket(bucket)?;

        let mut objects = Vec::new();
        let mut marker = String::new();
        loop {
            let resp = self.execute(self.factory.list_objects(bucket, prefix, &marker)?)?;
            let page = decode_list_objects(resp.body())?;
            objects.extend(page.objects);

            match page.next_marker {
                Some(next) => marker = next,
                None => break,
            }
            debug!("list {bucket}/{prefix} continues after {marker}");
        }
        Ok(objects)
    }

    /// List every multipart upload in progress, following pagination.
    pub fn list_multipart_uploads(
        &self,
        bucket: Option<&str>,
        opts: &ListUploadsOptions,
    ) -> Result<Vec<Upload>> {
        let bucket = self.bucket(bucket)?;

        let mut opts = opts.clone();
        let mut uploads = Vec::new();
        loop {
            let resp = self.execute(self.factory.list_multipart_uploads(bucket, &opts)?)?;
            let page = decode_list_multipart_uploads(resp.body())?;
            uploads.extend(page.uploads);

            match page.next_marker {
                Some((key, upload_id)) => {
                    opts.key_marker = Some(key);
                    opts.upload_id_marker = Some(upload_id);
                }
                None => break,
            }
        }
        Ok(uploads)
    }

    /// Start a multipart upload of `key`.
    pub fn initiate_multipart_upload(
        &self,
        key: &str,
        bucket: Option<&str>,
    ) -> Result<MultipartUpload> {
        MultipartUpload::initiate(self, key, bucket)
    }
}
