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

use std::mem;
use std::str::FromStr;

use http::header::HeaderName;
use http::uri::Authority;
use http::uri::PathAndQuery;
use http::uri::Scheme;
use http::HeaderMap;
use http::Method;
use http::Uri;

use crate::Result;

/// Signing context for request.
///
/// Query pairs are kept exactly as they appear on the wire: S3 signs the
/// raw sub-resource values, so nothing here decodes or re-encodes them.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme, `None` for origin-form uris like `/bucket/key`.
    pub scheme: Option<Scheme>,
    /// HTTP authority, `None` for origin-form uris like `/bucket/key`.
    pub authority: Option<Authority>,
    /// HTTP path, never empty.
    pub path: String,
    /// HTTP query parameters in their original order and encoding.
    pub query: Vec<(String, Option<String>)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let path = match paq.path() {
            "" => "/".to_string(),
            v => v.to_string(),
        };

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme,
            authority: uri.authority,
            path,
            query: paq.query().map(Self::query_parse).unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        // Return headers back.
        mem::swap(&mut parts.headers, &mut self.headers);
        parts.method = self.method;
        parts.uri = {
            let mut uri_parts = mem::take(&mut parts.uri).into_parts();
            uri_parts.scheme = self.scheme;
            uri_parts.authority = self.authority;
            uri_parts.path_and_query = {
                let paq = if self.query.is_empty() {
                    self.path
                } else {
                    let mut s = self.path;
                    s.push('?');
                    s.push_str(&Self::query_to_string(self.query, "=", "&"));
                    s
                };

                Some(PathAndQuery::from_str(&paq)?)
            };
            Uri::from_parts(uri_parts)?
        };

        Ok(())
    }

    /// Get the host without port, if the request has one.
    pub fn host(&self) -> Option<&str> {
        self.authority.as_ref().map(|v| v.host())
    }

    /// Split a raw query string into pairs without decoding them.
    ///
    /// ```shell
    /// "acl&versionId=a%2Bb" => [("acl", None), ("versionId", Some("a%2Bb"))]
    /// ```
    pub fn query_parse(query: &str) -> Vec<(String, Option<String>)> {
        query
            .split('&')
            .filter(|v| !v.is_empty())
            .map(|v| match v.split_once('=') {
                Some((k, v)) => (k.to_string(), Some(v.to_string())),
                None => (v.to_string(), None),
            })
            .collect()
    }

    /// Get query value by filter.
    pub fn query_to_vec_with_filter(
        &self,
        filter: impl Fn(&str) -> bool,
    ) -> Vec<(String, Option<String>)> {
        self.query
            .iter()
            // Filter all queries
            .filter(|(k, _)| filter(k))
            // Clone all queries
            .cloned()
            .collect()
    }

    /// Convert query to string, keeping the given order.
    ///
    /// ```shell
    /// [(a, Some(b)), (c, None)] => "a=b&c"
    /// ```
    pub fn query_to_string(query: Vec<(String, Option<String>)>, sep: &str, join: &str) -> String {
        let mut s = String::with_capacity(16);

        for (idx, (k, v)) in query.into_iter().enumerate() {
            if idx != 0 {
                s.push_str(join);
            }

            s.push_str(&k);
            if let Some(v) = v {
                s.push_str(sep);
                s.push_str(&v);
            }
        }

        s
    }

    /// Get header value by name.
    ///
    /// Returns empty string if header not found.
    #[inline]
    pub fn header_get_or_default(&self, key: &HeaderName) -> Result<&str> {
        match self.headers.get(key) {
            Some(v) => Ok(v.to_str()?),
            None => Ok(""),
        }
    }

    /// Get headers with given prefix, names are lower-cased.
    ///
    /// Repeated headers are folded into one entry with their values joined by `,`.
    pub fn header_to_vec_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = Vec::new();

        // `HeaderMap` stores names lower-cased already.
        for name in self.headers.keys() {
            if !name.as_str().starts_with(prefix) {
                continue;
            }

            let mut value = String::new();
            for (idx, v) in self.headers.get_all(name).iter().enumerate() {
                if idx != 0 {
                    value.push(',');
                }
                value.push_str(v.to_str()?);
            }

            headers.push((name.as_str().to_string(), value));
        }

        Ok(headers)
    }

    /// Convert sorted headers to string.
    ///
    /// ```shell
    /// [(a, b), (c, d)] => "a:b\nc:d"
    /// ```
    pub fn header_to_string(mut headers: Vec<(String, String)>, sep: &str, join: &str) -> String {
        let mut s = String::with_capacity(16);

        // Sort via header name.
        headers.sort();

        for (idx, (k, v)) in headers.into_iter().enumerate() {
            if idx != 0 {
                s.push_str(join);
            }

            s.push_str(&k);
            s.push_str(sep);
            s.push_str(&v);
        }

        s
    }
}
