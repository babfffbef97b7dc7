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

//! Signers for s3 services using signature version 2.
//!
//! ## Example
//!
//! ```
//! use s3lite_core::{Context, Result, Signer};
//! use s3lite_s3_v2::{RequestSigner, StaticCredentialProvider};
//!
//! # fn main() -> Result<()> {
//! let signer = Signer::from_provider(
//!     &Context::new(),
//!     StaticCredentialProvider::new("access_key_id", "secret_access_key"),
//!     RequestSigner::new(),
//! )?;
//!
//! let mut parts = http::Request::get("http://bucket.s3.amazonaws.com/key")
//!     .body(())?
//!     .into_parts()
//!     .0;
//! signer.sign(&mut parts)?;
//! assert!(parts.headers.contains_key("authorization"));
//! # Ok(())
//! # }
//! ```

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod sign_request;
pub use sign_request::RequestSigner;

mod provide_credential;
pub use provide_credential::*;

mod constants;
pub use constants::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
