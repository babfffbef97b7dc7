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

use std::collections::HashMap;

use http::request::Parts;
use http::HeaderValue;
use s3lite_core::hash::base64_hmac_sha1;
use s3lite_core::{
    Context, Error, ProvideCredential, Result, SignRequest, Signer, SigningCredential, StaticEnv,
};

#[derive(Clone, Debug)]
struct MyCredential {
    api_key: String,
    api_secret: String,
}

impl SigningCredential for MyCredential {
    fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

/// Loads `MY_API_KEY` and `MY_API_SECRET` from the context env.
#[derive(Debug)]
struct MyCredentialLoader;

impl ProvideCredential for MyCredentialLoader {
    type Credential = MyCredential;

    fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let (Some(api_key), Some(api_secret)) =
            (ctx.env_var("MY_API_KEY"), ctx.env_var("MY_API_SECRET"))
        else {
            return Ok(None);
        };

        Ok(Some(MyCredential {
            api_key,
            api_secret,
        }))
    }
}

/// Signs `METHOD\nPATH` and sends it as `x-api-signature`.
#[derive(Debug)]
struct MyRequestSigner;

impl SignRequest for MyRequestSigner {
    type Credential = MyCredential;

    fn sign_request(&self, req: &mut Parts, credential: Option<&Self::Credential>) -> Result<()> {
        let cred = credential.ok_or_else(|| Error::credential_invalid("missing credential"))?;

        let string_to_sign = format!("{}\n{}", req.method, req.uri.path());
        let signature = base64_hmac_sha1(cred.api_secret.as_bytes(), string_to_sign.as_bytes());

        req.headers.insert("x-api-key", cred.api_key.parse()?);
        req.headers.insert("x-api-signature", {
            let mut value: HeaderValue = signature.parse()?;
            value.set_sensitive(true);
            value
        });
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let ctx = Context::new().with_env(StaticEnv {
        envs: HashMap::from([
            ("MY_API_KEY".to_string(), "demo-api-key".to_string()),
            ("MY_API_SECRET".to_string(), "demo-api-secret".to_string()),
        ]),
    });
    let signer = Signer::from_provider(&ctx, MyCredentialLoader, MyRequestSigner)?;

    let mut parts = http::Request::builder()
        .method("GET")
        .uri("https://api.example.com/v1/users")
        .body(())?
        .into_parts()
        .0;
    signer.sign(&mut parts)?;

    println!("Request signed successfully!");
    println!("Headers: {:?}", parts.headers);
    Ok(())
}
