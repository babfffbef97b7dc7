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

use std::fmt::Debug;

use crate::{Context, Result};

/// SigningCredential is the trait used by signer as the signing credential.
pub trait SigningCredential: Clone + Debug + Send + Sync + 'static {
    /// Check if the signing credential is valid.
    fn is_valid(&self) -> bool;
}

/// ProvideCredential is the trait used by signer to load the credential from the environment.
///
/// Credentials are resolved once, when the [`Signer`](crate::Signer) is built.
/// Returning `Ok(None)` means this provider has nothing to offer.
pub trait ProvideCredential: Debug + Send + Sync + 'static {
    /// Credential returned by this loader.
    type Credential: Send + Sync + 'static;

    /// Load signing credential from current env.
    fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

/// SignRequest is the trait used by signer to sign the request.
pub trait SignRequest: Debug + Send + Sync + 'static {
    /// Credential used by this builder.
    type Credential: Send + Sync + 'static;

    /// Sign the request in place.
    ///
    /// Implementations may add or overwrite headers such as `Date` or
    /// `Authorization`, nothing else of the request is changed.
    fn sign_request(
        &self,
        req: &mut http::request::Parts,
        credential: Option<&Self::Credential>,
    ) -> Result<()>;
}
