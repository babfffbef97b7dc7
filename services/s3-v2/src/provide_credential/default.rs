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

use log::debug;
use s3lite_core::{Context, ProvideCredential, Result};

use crate::config::Config;
use crate::credential::Credential;
use crate::provide_credential::EnvCredentialProvider;

/// DefaultCredentialProvider will try to load credential from different sources.
///
/// Resolution order:
///
/// 1. Values set on [`Config`]
/// 2. Environment variables
#[derive(Debug, Default)]
pub struct DefaultCredentialProvider {
    config: Config,
    env: EnvCredentialProvider,
}

impl DefaultCredentialProvider {
    /// Create a new DefaultCredentialProvider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a DefaultCredentialProvider preferring the keys set on `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            env: EnvCredentialProvider::new(),
        }
    }
}

impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if let (Some(ak), Some(sk)) = (&self.config.access_key_id, &self.config.secret_access_key)
        {
            debug!("loaded credential from config");
            return Ok(Some(Credential::new(ak, sk)));
        }

        let cred = self.env.provide_credential(ctx)?;
        if cred.is_some() {
            debug!("loaded credential from env");
        }
        Ok(cred)
    }
}
