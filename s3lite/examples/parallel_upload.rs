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

//! Upload every file given on the command line through a worker pool.
//!
//! ```shell
//! AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=... \
//!   cargo run --example parallel_upload -- my-bucket a.txt b.png
//! ```

use std::env;
use std::fs;
use std::time::Duration;

use anyhow::{anyhow, Result};
use s3lite::{Config, Expires, Pool, UploadOptions};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let bucket = args
        .next()
        .ok_or_else(|| anyhow!("usage: parallel_upload <bucket> <file>..."))?;
    let files: Vec<String> = args.collect();

    let config = Config::new().with_default_bucket(bucket).with_tls(true);
    let opts = UploadOptions::default().with_expires(Expires::Max);

    Pool::new(config)?.scope(|pool| -> Result<()> {
        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            results.push(pool.upload(file, fs::read(file)?, None, &opts)?);
        }

        for resp in pool.as_completed(&results, Some(Duration::from_secs(300))) {
            let resp = resp??;
            println!("{} {:?}", resp.status(), resp.etag());
        }
        Ok(())
    })
}
