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

//! Decoders for the xml bodies returned by the service.

use quick_xml::de;
use s3lite_core::{Error, Result};
use serde::Deserialize;

/// An object returned by a bucket listing.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Object {
    /// Key of the object.
    pub key: String,
    /// Last modification time, as sent by the service.
    pub last_modified: String,
    /// ETag without the surrounding quotes.
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Storage class.
    pub storage_class: String,
}

/// A multipart upload in progress.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Upload {
    /// Key of the object being uploaded.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Start time, as sent by the service.
    pub initiated: String,
    /// Storage class.
    pub storage_class: String,
}

/// An uploaded part of a multipart upload.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Part {
    /// Part number, starting at 1.
    pub part_number: u32,
    /// Last modification time, as sent by the service.
    pub last_modified: String,
    /// ETag exactly as returned, quotes included.
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
}

/// One page of [`Object`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ObjectPage {
    /// Objects in this page.
    pub objects: Vec<Object>,
    /// Marker to request the next page, `None` on the last page.
    pub next_marker: Option<String>,
}

/// One page of [`Upload`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct UploadPage {
    /// Uploads in this page.
    pub uploads: Vec<Upload>,
    /// `(key-marker, upload-id-marker)` of the next page, `None` on the last page.
    pub next_marker: Option<(String, String)>,
}

/// One page of [`Part`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PartPage {
    /// Parts in this page.
    pub parts: Vec<Part>,
    /// Part number marker of the next page, `None` on the last page.
    pub next_marker: Option<String>,
}

/// Error body sent along a failed response.
#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ErrorResponse {
    /// Error code such as `NoSuchKey`.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Id of the failed request.
    pub request_id: String,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListBucketResult {
    is_truncated: bool,
    next_marker: Option<String>,
    contents: Vec<Object>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListMultipartUploadsResult {
    is_truncated: bool,
    next_key_marker: Option<String>,
    next_upload_id_marker: Option<String>,
    #[serde(rename = "Upload")]
    uploads: Vec<Upload>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ListPartsResult {
    is_truncated: bool,
    next_part_number_marker: Option<String>,
    #[serde(rename = "Part")]
    parts: Vec<Part>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InitiateMultipartUploadResult {
    upload_id: String,
}

fn from_slice<'de, T: Deserialize<'de>>(body: &'de [u8], what: &str) -> Result<T> {
    let body = std::str::from_utf8(body)
        .map_err(|e| Error::unexpected(format!("{what} is not valid utf-8")).with_source(e))?;
    de::from_str(body.trim())
        .map_err(|e| Error::unexpected(format!("failed to parse {what}")).with_source(e))
}

/// Treat empty or whitespace-only markers as absent.
fn marker(v: Option<String>) -> Option<String> {
    v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Decode a `ListBucketResult` body.
///
/// On a truncated page without `NextMarker` the last key is the marker.
pub fn decode_list_objects(body: &[u8]) -> Result<ObjectPage> {
    let result: ListBucketResult = from_slice(body, "list objects response")?;

    let mut objects = result.contents;
    for object in objects.iter_mut() {
        object.etag = object.etag.trim_matches('"').to_string();
    }

    let next_marker = if result.is_truncated {
        marker(result.next_marker).or_else(|| objects.last().map(|v| v.key.clone()))
    } else {
        None
    };
    Ok(ObjectPage {
        objects,
        next_marker,
    })
}

/// Decode a `ListMultipartUploadsResult` body.
pub fn decode_list_multipart_uploads(body: &[u8]) -> Result<UploadPage> {
    let result: ListMultipartUploadsResult = from_slice(body, "list multipart uploads response")?;

    let next_marker = if result.is_truncated {
        match (
            marker(result.next_key_marker),
            marker(result.next_upload_id_marker),
        ) {
            (Some(key), Some(upload_id)) => Some((key, upload_id)),
            _ => {
                return Err(Error::unexpected(
                    "truncated list multipart uploads response without next markers",
                ))
            }
        }
    } else {
        None
    };
    Ok(UploadPage {
        uploads: result.uploads,
        next_marker,
    })
}

/// Decode a `ListPartsResult` body.
pub fn decode_list_parts(body: &[u8]) -> Result<PartPage> {
    let result: ListPartsResult = from_slice(body, "list parts response")?;

    let next_marker = if result.is_truncated {
        marker(result.next_part_number_marker)
            .or_else(|| result.parts.last().map(|v| v.part_number.to_string()))
    } else {
        None
    };
    Ok(PartPage {
        parts: result.parts,
        next_marker,
    })
}

/// Decode an `InitiateMultipartUploadResult` body into its upload id.
pub fn decode_initiate_multipart_upload(body: &[u8]) -> Result<String> {
    let result: InitiateMultipartUploadResult =
        from_slice(body, "initiate multipart upload response")?;
    let upload_id = result.upload_id.trim();
    if upload_id.is_empty() {
        return Err(Error::unexpected(
            "initiate multipart upload response has no upload id",
        ));
    }
    Ok(upload_id.to_string())
}

/// Decode an `Error` body, `None` if it is not one.
pub fn decode_error(body: &[u8]) -> Option<ErrorResponse> {
    from_slice::<ErrorResponse>(body, "error response")
        .ok()
        .filter(|v| !v.code.is_empty())
}
