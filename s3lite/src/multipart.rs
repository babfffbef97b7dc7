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

use bytes::Bytes;
use log::debug;
use s3lite_core::{Error, Result};

use crate::list::{decode_initiate_multipart_upload, decode_list_parts, Part};
use crate::{Connection, Response};

const MAX_PARTS_PER_PAGE: usize = 1000;

/// A multipart upload bound to a connection, bucket and key.
///
/// Parts may be uploaded from several threads at once, for example through
/// [`Pool::upload_part`](crate::Pool::upload_part).
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    conn: Connection,
    bucket: String,
    key: String,
    upload_id: String,
}

impl MultipartUpload {
    /// Start a new upload and remember its id.
    pub fn initiate(conn: &Connection, key: &str, bucket: Option<&str>) -> Result<Self> {
        let bucket = conn.bucket(bucket)?;
        let resp = conn.execute(conn.factory().initiate_multipart_upload(bucket, key)?)?;
        let upload_id = decode_initiate_multipart_upload(resp.body())?;
        debug!("initiated multipart upload {upload_id} for {bucket}/{key}");

        Ok(Self::resume(conn, bucket, key, upload_id))
    }

    /// Bind to an upload started earlier, for example one returned by
    /// [`Connection::list_multipart_uploads`].
    pub fn resume(
        conn: &Connection,
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            conn: conn.clone(),
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    /// Bucket of the upload.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key of the upload.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id of the upload.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Upload one part. Part numbers start at 1.
    ///
    /// `md5` is the base64 encoded MD5 digest of `body`, checked by the
    /// service when given.
    pub fn upload_part(
        &self,
        part_number: u32,
        body: impl Into<Bytes>,
        md5: Option<&str>,
    ) -> Result<Response> {
        if part_number == 0 {
            return Err(Error::request_invalid("part numbers start at 1"));
        }

        let body = body.into();
        let length = body.len() as u64;
        self.conn.execute(self.conn.factory().upload_part(
            &self.bucket,
            &self.key,
            &self.upload_id,
            part_number,
            body,
            Some(length),
            md5,
        )?)
    }

    /// List every uploaded part, following pagination.
    pub fn list_parts(&self) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let req = self.conn.factory().list_parts(
                &self.bucket,
                &self.key,
                &self.upload_id,
                MAX_PARTS_PER_PAGE,
                marker.as_deref(),
            )?;
            let page = decode_list_parts(self.conn.execute(req)?.body())?;
            parts.extend(page.parts);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(parts)
    }

    /// Number of parts uploaded so far.
    pub fn number_of_parts(&self) -> Result<usize> {
        Ok(self.list_parts()?.len())
    }

    /// Assemble the uploaded parts into the final object.
    pub fn complete(&self) -> Result<Response> {
        let parts = self.list_parts()?;
        if parts.is_empty() {
            return Err(Error::request_invalid(format!(
                "multipart upload {} has no parts to complete",
                self.upload_id
            )));
        }

        debug!(
            "completing multipart upload {} with {} parts",
            self.upload_id,
            parts.len()
        );
        self.conn.execute(self.conn.factory().complete_multipart_upload(
            &self.bucket,
            &self.key,
            &self.upload_id,
            &parts,
        )?)
    }

    /// Abort the upload and drop its parts.
    pub fn cancel(&self) -> Result<Response> {
        self.conn.execute(self.conn.factory().abort_multipart_upload(
            &self.bucket,
            &self.key,
            &self.upload_id,
        )?)
    }
}
