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

use s3lite_core::Context;

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";
/// Number of worker threads used by a [`Pool`](crate::Pool) by default.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Config for [`Connection`](crate::Connection) and [`Pool`](crate::Pool).
#[derive(Clone, Debug)]
pub struct Config {
    /// Credential configuration.
    ///
    /// Keys left empty here are loaded from the environment.
    pub credential: s3lite_s3_v2::Config,
    /// Bucket used by operations that don't name one.
    pub default_bucket: Option<String>,
    /// Use `https` instead of `http`.
    ///
    /// Default to `false`.
    pub tls: bool,
    /// Host (and optional port) of the service.
    ///
    /// Requests are built path-style, so only S3-style hosts
    /// (`s3.amazonaws.com`, `s3-<region>.amazonaws.com`,
    /// `s3.<region>.amazonaws.com`) sign correctly. Any other host is taken
    /// for a bucket CNAME and ends up in the signed resource, e.g.
    /// `localhost:9000` signs `/localhost/<bucket>/<key>`.
    ///
    /// Default to [`DEFAULT_ENDPOINT`].
    pub endpoint: String,
    /// Number of worker threads started by a pool.
    ///
    /// Default to [`DEFAULT_POOL_SIZE`].
    pub pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credential: s3lite_s3_v2::Config::default(),
            default_bucket: None,
            tls: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl Config {
    /// Create a new Config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set access_key_id
    pub fn with_access_key_id(mut self, access_key_id: impl Into<String>) -> Self {
        self.credential = self.credential.with_access_key_id(access_key_id);
        self
    }

    /// Set secret_access_key
    pub fn with_secret_access_key(mut self, secret_access_key: impl Into<String>) -> Self {
        self.credential = self.credential.with_secret_access_key(secret_access_key);
        self
    }

    /// Set default_bucket
    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Set tls
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set pool_size
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Fill the credential keys from env, keeping the ones already set.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        self.credential = self.credential.from_env(ctx);
        self
    }
}
