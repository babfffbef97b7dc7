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

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use s3lite_core::*;

/// Signature version 2 signing.
pub mod s3 {
    pub use s3lite_s3_v2::*;
}

mod config;
pub use config::{Config, DEFAULT_ENDPOINT, DEFAULT_POOL_SIZE};

pub mod list;
pub use list::{Object, Part, Upload};

mod request_factory;
pub use request_factory::{
    CopyOptions, Expires, ListUploadsOptions, RequestFactory, UploadOptions, MAX_EXPIRES_SECS,
};

mod response;
pub use response::Response;

mod connection;
pub use connection::Connection;

mod multipart;
pub use multipart::MultipartUpload;

mod pool;
pub use pool::{Pool, PoolResult};
