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

use std::sync::Arc;

use crate::{Context, Error, ProvideCredential, Result, SignRequest, SigningCredential};

/// Signer is the main struct used to sign the request.
///
/// The credential is fixed at construction, so a signer can be shared by
/// any number of threads without locking.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    credential: K,
    builder: Arc<dyn SignRequest<Credential = K>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer with a known credential.
    pub fn new(credential: K, builder: impl SignRequest<Credential = K>) -> Self {
        Self {
            credential,
            builder: Arc::new(builder),
        }
    }

    /// Create a new signer by loading the credential from `provider`.
    ///
    /// Fails before any request is sent if no credential can be found or the
    /// found one is not valid.
    pub fn from_provider(
        ctx: &Context,
        provider: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K>,
    ) -> Result<Self> {
        let credential = provider
            .provide_credential(ctx)?
            .ok_or_else(|| Error::config_invalid("no credential found"))?;
        if !credential.is_valid() {
            return Err(Error::credential_invalid("loaded credential is not valid"));
        }

        Ok(Self::new(credential, builder))
    }

    /// Get the credential used by this signer.
    pub fn credential(&self) -> &K {
        &self.credential
    }

    /// Signing request.
    pub fn sign(&self, req: &mut http::request::Parts) -> Result<()> {
        self.builder.sign_request(req, Some(&self.credential))
    }
}
