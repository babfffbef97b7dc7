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

//! Builders for every request sent to the service.
//!
//! Requests are returned unsigned. [`Connection`](crate::Connection) signs
//! and sends them.

use std::fmt::Write;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Request};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::escape::partial_escape;
use s3lite_core::Result;

use crate::list::Part;

/// Seconds in a year, the longest max-age caches are expected to honour.
pub const MAX_EXPIRES_SECS: u64 = 31_536_000;

const X_AMZ_ACL: &str = "x-amz-acl";
const X_AMZ_COPY_SOURCE: &str = "x-amz-copy-source";
const X_AMZ_METADATA_DIRECTIVE: &str = "x-amz-metadata-directive";
const CONTENT_MD5: &str = "content-md5";
const PUBLIC_READ: &str = "public-read";
const OCTET_STREAM: &str = "application/octet-stream";

/// Object keys keep their `/` separators.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// How long caches may keep an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expires {
    /// [`MAX_EXPIRES_SECS`].
    Max,
    /// Expire after the given duration.
    After(Duration),
}

impl Expires {
    /// Whole seconds used for `max-age`.
    pub fn as_secs(&self) -> u64 {
        match self {
            Expires::Max => MAX_EXPIRES_SECS,
            Expires::After(d) => d.as_secs(),
        }
    }
}

impl From<u64> for Expires {
    fn from(secs: u64) -> Self {
        Expires::After(Duration::from_secs(secs))
    }
}

impl From<Duration> for Expires {
    fn from(d: Duration) -> Self {
        Expires::After(d)
    }
}

/// Options for [`RequestFactory::upload`].
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Emit a `Cache-Control` header.
    pub expires: Option<Expires>,
    /// Content type of the object.
    ///
    /// Guessed from the key when `None`.
    pub content_type: Option<String>,
    /// Make the object readable by everyone.
    ///
    /// Default to `true`.
    pub public: bool,
    /// Extra headers, applied last.
    pub headers: HeaderMap,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            expires: None,
            content_type: None,
            public: true,
            headers: HeaderMap::new(),
        }
    }
}

impl UploadOptions {
    /// Set expires
    pub fn with_expires(mut self, expires: impl Into<Expires>) -> Self {
        self.expires = Some(expires.into());
        self
    }

    /// Set content_type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set public
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Add extra headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Options for [`RequestFactory::copy`] and [`RequestFactory::update_metadata`].
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Replace the object metadata with these headers.
    ///
    /// The source metadata is copied when this is `None` or empty.
    pub metadata: Option<HeaderMap>,
    /// Make the target readable by everyone.
    ///
    /// Default to `true`.
    pub public: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            metadata: None,
            public: true,
        }
    }
}

impl CopyOptions {
    /// Set metadata
    pub fn with_metadata(mut self, metadata: HeaderMap) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set public
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

/// Options for [`RequestFactory::list_multipart_uploads`].
#[derive(Debug, Clone)]
pub struct ListUploadsOptions {
    /// Only list uploads for keys starting with this prefix.
    pub prefix: String,
    /// Page size. Default to 1000.
    pub max_uploads: usize,
    /// Start listing after this key.
    pub key_marker: Option<String>,
    /// Together with `key_marker`, start listing after this upload.
    pub upload_id_marker: Option<String>,
}

impl Default for ListUploadsOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            max_uploads: 1000,
            key_marker: None,
            upload_id_marker: None,
        }
    }
}

impl ListUploadsOptions {
    /// Set prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set max_uploads
    pub fn with_max_uploads(mut self, max_uploads: usize) -> Self {
        self.max_uploads = max_uploads;
        self
    }
}

/// RequestFactory builds unsigned path-style requests for one endpoint.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    scheme: &'static str,
    endpoint: String,
}

impl RequestFactory {
    /// Create a new factory for `endpoint`.
    pub fn new(endpoint: impl Into<String>, tls: bool) -> Self {
        Self {
            scheme: if tls { "https" } else { "http" },
            endpoint: endpoint.into(),
        }
    }

    /// Build the url of `key` inside `bucket`.
    ///
    /// Leading `/` are stripped from the key and the rest is percent encoded.
    pub fn bucket_url(&self, bucket: &str, key: &str) -> String {
        let key = utf8_percent_encode(key.trim_start_matches('/'), KEY_ENCODE_SET);
        format!("{}://{}/{}/{}", self.scheme, self.endpoint, bucket, key)
    }

    fn query_url(&self, bucket: &str, key: &str, query: &str) -> String {
        format!("{}?{}", self.bucket_url(bucket, key), query)
    }

    /// GET an object.
    pub fn get(&self, bucket: &str, key: &str, headers: HeaderMap) -> Result<Request<Bytes>> {
        build(Method::GET, self.bucket_url(bucket, key), headers, Bytes::new())
    }

    /// HEAD an object.
    pub fn head_object(
        &self,
        bucket: &str,
        key: &str,
        headers: HeaderMap,
    ) -> Result<Request<Bytes>> {
        build(Method::HEAD, self.bucket_url(bucket, key), headers, Bytes::new())
    }

    /// HEAD a bucket.
    pub fn head_bucket(&self, bucket: &str) -> Result<Request<Bytes>> {
        build(
            Method::HEAD,
            self.bucket_url(bucket, ""),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// DELETE an object.
    pub fn delete(&self, bucket: &str, key: &str) -> Result<Request<Bytes>> {
        build(
            Method::DELETE,
            self.bucket_url(bucket, key),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// PUT `body` as `key`.
    pub fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &UploadOptions,
    ) -> Result<Request<Bytes>> {
        let content_type = match &opts.content_type {
            Some(v) => v.as_str(),
            None => mime_guess::from_path(key).first_raw().unwrap_or(OCTET_STREAM),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
        if opts.public {
            headers.insert(X_AMZ_ACL, HeaderValue::from_static(PUBLIC_READ));
        }
        if let Some(expires) = opts.expires {
            let secs = expires.as_secs();
            if secs > 0 {
                let mut value = format!("max-age={secs}");
                if opts.public {
                    value.push_str(", public");
                }
                headers.insert(CACHE_CONTROL, HeaderValue::from_str(&value)?);
            }
        }
        headers.extend(opts.headers.clone());

        build(Method::PUT, self.bucket_url(bucket, key), headers, body)
    }

    /// Copy `from_bucket/from_key` to `to_bucket/to_key`.
    pub fn copy(
        &self,
        from_bucket: &str,
        from_key: &str,
        to_bucket: &str,
        to_key: &str,
        opts: &CopyOptions,
    ) -> Result<Request<Bytes>> {
        let metadata = opts.metadata.as_ref().filter(|v| !v.is_empty());
        let source = format!(
            "/{}/{}",
            from_bucket,
            utf8_percent_encode(from_key.trim_start_matches('/'), KEY_ENCODE_SET)
        );

        let mut headers = HeaderMap::new();
        headers.insert(X_AMZ_COPY_SOURCE, HeaderValue::from_str(&source)?);
        headers.insert(
            X_AMZ_METADATA_DIRECTIVE,
            HeaderValue::from_static(if metadata.is_some() { "REPLACE" } else { "COPY" }),
        );
        if opts.public {
            headers.insert(X_AMZ_ACL, HeaderValue::from_static(PUBLIC_READ));
        }
        if let Some(metadata) = metadata {
            headers.extend(metadata.clone());
        }

        build(
            Method::PUT,
            self.bucket_url(to_bucket, to_key),
            headers,
            Bytes::new(),
        )
    }

    /// Replace the metadata of an object by copying it onto itself.
    pub fn update_metadata(
        &self,
        bucket: &str,
        key: &str,
        opts: &CopyOptions,
    ) -> Result<Request<Bytes>> {
        self.copy(bucket, key, bucket, key, opts)
    }

    /// List one page of objects under `prefix`, starting after `marker`.
    pub fn list_objects(&self, bucket: &str, prefix: &str, marker: &str) -> Result<Request<Bytes>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("prefix", prefix)
            .append_pair("marker", marker)
            .finish();

        build(
            Method::GET,
            self.query_url(bucket, "", &query),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// Start a multipart upload.
    pub fn initiate_multipart_upload(&self, bucket: &str, key: &str) -> Result<Request<Bytes>> {
        build(
            Method::POST,
            self.query_url(bucket, key, "uploads"),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// Upload one part.
    ///
    /// `length` defaults to the size of `body`.
    #[allow(clippy::too_many_arguments)]
    pub fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
        length: Option<u64>,
        md5: Option<&str>,
    ) -> Result<Request<Bytes>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("partNumber", &part_number.to_string())
            .append_pair("uploadId", upload_id)
            .finish();

        let mut headers = HeaderMap::new();
        if let Some(length) = length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        if let Some(md5) = md5 {
            headers.insert(CONTENT_MD5, HeaderValue::from_str(md5)?);
        }

        build(Method::PUT, self.query_url(bucket, key, &query), headers, body)
    }

    /// List one page of the parts of an upload.
    pub fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        max_parts: usize,
        part_number_marker: Option<&str>,
    ) -> Result<Request<Bytes>> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("uploadId", upload_id)
            .append_pair("max-parts", &max_parts.to_string());
        if let Some(marker) = part_number_marker {
            query.append_pair("part-number-marker", marker);
        }

        build(
            Method::GET,
            self.query_url(bucket, key, &query.finish()),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// Complete an upload from its parts.
    pub fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[Part],
    ) -> Result<Request<Bytes>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("uploadId", upload_id)
            .finish();

        let mut body = String::from("<CompleteMultipartUpload>");
        for part in parts {
            write!(
                body,
                "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
                part.part_number,
                partial_escape(&part.etag)
            )?;
        }
        body.push_str("</CompleteMultipartUpload>");

        build(
            Method::POST,
            self.query_url(bucket, key, &query),
            HeaderMap::new(),
            Bytes::from(body),
        )
    }

    /// Abort an upload.
    pub fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<Request<Bytes>> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("uploadId", upload_id)
            .finish();

        build(
            Method::DELETE,
            self.query_url(bucket, key, &query),
            HeaderMap::new(),
            Bytes::new(),
        )
    }

    /// List one page of the uploads in progress.
    pub fn list_multipart_uploads(
        &self,
        bucket: &str,
        opts: &ListUploadsOptions,
    ) -> Result<Request<Bytes>> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_key_only("uploads")
            .append_pair("max-uploads", &opts.max_uploads.to_string());
        if !opts.prefix.is_empty() {
            query.append_pair("prefix", &opts.prefix);
        }
        if let Some(v) = &opts.key_marker {
            query.append_pair("key-marker", v);
        }
        if let Some(v) = &opts.upload_id_marker {
            query.append_pair("upload-id-marker", v);
        }

        build(
            Method::GET,
            self.query_url(bucket, "", &query.finish()),
            HeaderMap::new(),
            Bytes::new(),
        )
    }
}

/// Assemble the request, setting `Content-Length` for non-empty bodies
/// unless the caller already did.
fn build(method: Method, url: String, headers: HeaderMap, body: Bytes) -> Result<Request<Bytes>> {
    let mut req = Request::builder().method(method).uri(url).body(body)?;
    *req.headers_mut() = headers;

    if !req.body().is_empty() && !req.headers().contains_key(CONTENT_LENGTH) {
        let length = HeaderValue::from(req.body().len());
        req.headers_mut().insert(CONTENT_LENGTH, length);
    }
    Ok(req)
}
