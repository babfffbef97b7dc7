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

//! Print the string to sign and the signed headers of a request.
//!
//! Credentials are read from `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.

use anyhow::Result;
use s3lite_core::{Context, OsEnv, Signer};
use s3lite_s3_v2::{DefaultCredentialProvider, RequestSigner};

fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();

    let ctx = Context::new().with_env(OsEnv);
    let signer = Signer::from_provider(&ctx, DefaultCredentialProvider::new(), RequestSigner::new())?;

    let (mut parts, _) = http::Request::get("http://johnsmith.s3.amazonaws.com/photos/puppy.jpg?acl")
        .header("x-amz-meta-owner", "s3lite")
        .body(())?
        .into_parts();

    println!("string to sign:\n{}", RequestSigner::new().string_to_sign(&mut parts)?);

    signer.sign(&mut parts)?;
    for (name, value) in &parts.headers {
        println!("{name}: {value:?}");
    }
    Ok(())
}
