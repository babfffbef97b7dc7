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

//! S3 signature version 2 builder.
use std::collections::HashSet;
use std::fmt::Write;

use http::header::AUTHORIZATION;
use http::header::CONTENT_LENGTH;
use http::header::CONTENT_TYPE;
use http::header::DATE;
use http::HeaderName;
use http::HeaderValue;
use http::Method;
use log::debug;
use once_cell::sync::Lazy;
use s3lite_core::hash::base64_hmac_sha1;
use s3lite_core::time::format_http_date;
use s3lite_core::time::now;
use s3lite_core::time::DateTime;
use s3lite_core::{Error, Result, SignRequest, SigningRequest};

use super::constants::*;
use super::credential::Credential;

/// RequestSigner that implements the S3 HMAC-SHA1 (signature version 2) authorization.
///
/// - [Signing and Authenticating REST Requests](https://docs.aws.amazon.com/AmazonS3/latest/userguide/RESTAuthentication.html)
#[derive(Debug, Default)]
pub struct RequestSigner {
    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify the signing time used when the request carries no `Date`.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Build the string to sign for `parts`.
    ///
    /// A `Date` header is added to the request if neither `Date` nor
    /// `x-amz-date` is present, so calling this and then signing produces a
    /// consistent request.
    pub fn string_to_sign(&self, parts: &mut http::request::Parts) -> Result<String> {
        let mut ctx = SigningRequest::build(parts)?;
        let string_to_sign = self.build_string_to_sign(&mut ctx);
        ctx.apply(parts)?;
        string_to_sign
    }

    /// Construct string to sign
    ///
    /// ## Format
    ///
    /// ```text
    /// VERB + "\n" +
    /// Content-MD5 + "\n" +
    /// Content-Type + "\n" +
    /// Date + "\n" +
    /// CanonicalizedAmzHeaders +
    /// CanonicalizedResource;
    /// ```
    fn build_string_to_sign(&self, ctx: &mut SigningRequest) -> Result<String> {
        let date = if ctx.headers.contains_key(X_AMZ_DATE) {
            String::new()
        } else {
            match ctx.headers.get(DATE) {
                Some(v) => v.to_str()?.to_string(),
                None => {
                    let date = format_http_date(self.time.unwrap_or_else(now));
                    ctx.headers.insert(DATE, date.parse()?);
                    date
                }
            }
        };

        let mut s = String::new();
        writeln!(&mut s, "{}", ctx.method.as_str())?;
        writeln!(
            &mut s,
            "{}",
            ctx.header_get_or_default(&HeaderName::from_static(CONTENT_MD5))?
        )?;
        writeln!(&mut s, "{}", ctx.header_get_or_default(&CONTENT_TYPE)?)?;
        writeln!(&mut s, "{date}")?;
        s.write_str(&canonicalize_header(ctx)?)?;
        s.write_str(&canonicalize_resource(ctx))?;

        debug!("string to sign: {}", &s);
        Ok(s)
    }
}

impl SignRequest for RequestSigner {
    type Credential = Credential;

    fn sign_request(
        &self,
        parts: &mut http::request::Parts,
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let k = credential.ok_or_else(|| Error::credential_invalid("missing credential"))?;

        let mut ctx = SigningRequest::build(parts)?;

        let string_to_sign = self.build_string_to_sign(&mut ctx)?;
        let signature = base64_hmac_sha1(k.secret_access_key.as_bytes(), string_to_sign.as_bytes());

        ctx.headers.insert(AUTHORIZATION, {
            let mut value: HeaderValue = format!("AWS {}:{}", k.access_key_id, signature).parse()?;
            value.set_sensitive(true);

            value
        });

        // S3 rejects PUT requests without a length.
        if ctx.method == Method::PUT && !ctx.headers.contains_key(CONTENT_LENGTH) {
            ctx.headers
                .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        }

        ctx.apply(parts)
    }
}

/// Every `x-amz*` header as `name:value\n`, sorted by name.
fn canonicalize_header(ctx: &SigningRequest) -> Result<String> {
    let headers = ctx
        .header_to_vec_with_prefix(X_AMZ_PREFIX)?
        .into_iter()
        .map(|(k, v)| (k, v.trim().replace('\n', " ")))
        .collect::<Vec<_>>();
    if headers.is_empty() {
        return Ok(String::new());
    }

    let mut s = SigningRequest::header_to_string(headers, ":", "\n");
    s.push('\n');
    Ok(s)
}

fn canonicalize_resource(ctx: &SigningRequest) -> String {
    let mut s = String::new();

    if let Some(bucket) = ctx.host().and_then(resource_bucket) {
        s.push('/');
        s.push_str(bucket);
    }
    s.push_str(&ctx.path);

    let mut params = ctx.query_to_vec_with_filter(is_sub_resource);
    if !params.is_empty() {
        params.sort_by_cached_key(|(k, _)| k.to_ascii_lowercase());
        s.push('?');
        s.push_str(&SigningRequest::query_to_string(params, "=", "&"));
    }

    s
}

/// Find the bucket that must be moved into the resource for `host`.
///
/// - `bucket.s3.amazonaws.com` and `bucket.s3-eu-west-1.amazonaws.com` give `bucket`.
/// - `s3.amazonaws.com` and other bare endpoints give nothing.
/// - any other host is treated as a bucket CNAME and returned whole.
fn resource_bucket(host: &str) -> Option<&str> {
    let lower = host.to_ascii_lowercase();
    let Some(rest) = lower.strip_suffix(AMAZONAWS_SUFFIX) else {
        return Some(host);
    };

    if let Some((bucket, endpoint)) = rest.split_once('.') {
        if is_label(bucket) && is_s3_endpoint(endpoint) {
            return Some(&host[..bucket.len()]);
        }
    }
    if is_s3_endpoint(rest) {
        return None;
    }

    Some(host)
}

/// Matches `s3([.-][a-z0-9-]+)*`.
fn is_s3_endpoint(v: &str) -> bool {
    let Some(rest) = v.strip_prefix("s3") else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    if !rest.starts_with(['.', '-']) {
        return false;
    }

    rest[1..].split('.').all(is_label)
}

fn is_label(v: &str) -> bool {
    !v.is_empty()
        && v
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn is_sub_resource(param: &str) -> bool {
    SUBRESOURCES.contains(param.to_ascii_lowercase().as_str())
}

// Matched against the lower-cased query name.
static SUBRESOURCES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "acl",
        "delete",
        "lifecycle",
        "location",
        "partnumber",
        "response-cache-control",
        "response-content-disposition",
        "response-content-encoding",
        "response-content-language",
        "response-content-type",
        "response-expires",
        "torrent",
        "uploadid",
        "uploads",
        "versionid",
        "versioning",
    ])
});
