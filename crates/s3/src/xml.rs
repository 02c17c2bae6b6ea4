//! XML documents exchanged with the server
//!
//! Request bodies are written with `quick_xml::Writer`; response bodies are
//! deserialized with serde. Only the documents the client itself interprets
//! live here; configuration documents pass through as opaque text.

use std::collections::BTreeMap;
use std::io::{self, Write};

use osc_core::{Error, Result};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesText, Event};
use quick_xml::reader::Reader;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::multipart::Part;

/// Write `<tag>text</tag>`; only `<`, `>` and `&` are escaped so quoted
/// ETags stay literal.
fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::from_escaped(partial_escape(text)))?;
    Ok(())
}

fn finish(result: io::Result<()>, buf: Vec<u8>, document: &str) -> Result<Vec<u8>> {
    result.map_err(|e| Error::Xml(format!("failed to write {document}: {e}")))?;
    Ok(buf)
}

/// CompleteMultipartUpload body; `parts` must already be ascending
pub fn complete_multipart_upload(parts: &[Part]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64 + parts.len() * 96);
    let mut writer = Writer::new(&mut buf);
    let result = writer
        .create_element("CompleteMultipartUpload")
        .write_inner_content(|w| {
            for part in parts {
                w.create_element("Part").write_inner_content(|w| {
                    write_text_element(w, "PartNumber", &part.part_number.to_string())?;
                    write_text_element(w, "ETag", &format!("\"{}\"", part.etag))
                })?;
            }
            Ok(())
        })
        .map(|_| ());
    finish(result, buf, "CompleteMultipartUpload")
}

/// CreateBucketConfiguration body for a non-default location
pub fn create_bucket_configuration(location: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);
    let result = writer
        .create_element("CreateBucketConfiguration")
        .write_inner_content(|w| write_text_element(w, "LocationConstraint", location))
        .map(|_| ());
    finish(result, buf, "CreateBucketConfiguration")
}

/// Delete body for multi-object delete
pub fn delete_objects(objects: &[(String, Option<String>)], quiet: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);
    let result = writer
        .create_element("Delete")
        .write_inner_content(|w| {
            if quiet {
                write_text_element(w, "Quiet", "true")?;
            }
            for (key, version_id) in objects {
                w.create_element("Object").write_inner_content(|w| {
                    write_text_element(w, "Key", key)?;
                    if let Some(version_id) = version_id {
                        write_text_element(w, "VersionId", version_id)?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })
        .map(|_| ());
    finish(result, buf, "Delete")
}

/// LegalHold body
pub fn legal_hold(enabled: bool) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = Writer::new(&mut buf);
    let status = if enabled { "ON" } else { "OFF" };
    let result = writer
        .create_element("LegalHold")
        .write_inner_content(|w| write_text_element(w, "Status", status))
        .map(|_| ());
    finish(result, buf, "LegalHold")
}

/// Name of the root element, skipping the declaration and comments
pub fn root_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Deserialize a success document
pub fn parse<T: DeserializeOwned>(body: &str, document: &str) -> Result<T> {
    quick_xml::de::from_str(body).map_err(|e| Error::Xml(format!("invalid {document} document: {e}")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListAllMyBucketsResult {
    pub buckets: BucketList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketList {
    pub bucket: Vec<BucketEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketEntry {
    pub name: String,
    pub creation_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CommonPrefix {
    pub prefix: String,
}

/// ListObjects (v1) and ListObjectsV2 response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListBucketResult {
    pub name: String,
    pub is_truncated: bool,
    pub marker: Option<String>,
    pub next_marker: Option<String>,
    pub next_continuation_token: Option<String>,
    pub encoding_type: Option<String>,
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
    pub user_metadata: Option<BTreeMap<String, String>>,
}

/// ListObjectVersions response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListVersionsResult {
    pub name: String,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_version_id_marker: Option<String>,
    pub encoding_type: Option<String>,
    pub version: Vec<VersionEntry>,
    pub delete_marker: Vec<VersionEntry>,
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VersionEntry {
    pub key: String,
    pub version_id: Option<String>,
    pub is_latest: bool,
    pub last_modified: Option<String>,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InitiateMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CompleteMultipartUploadResult {
    pub location: Option<String>,
    pub bucket: String,
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CopyObjectResult {
    #[serde(rename = "ETag")]
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Multi-object delete response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeleteResult {
    pub deleted: Vec<DeletedEntry>,
    pub error: Vec<DeleteErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeletedEntry {
    pub key: String,
    pub version_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeleteErrorEntry {
    pub code: String,
    pub message: String,
    pub key: Option<String>,
    pub version_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListMultipartUploadsResult {
    pub bucket: String,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
    pub encoding_type: Option<String>,
    pub upload: Vec<UploadEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UploadEntry {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<String>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListPartsResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<u64>,
    pub part: Vec<PartEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PartEntry {
    pub part_number: u64,
    #[serde(rename = "ETag")]
    pub etag: String,
    pub last_modified: Option<String>,
    pub size: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LegalHold {
    pub status: String,
}
