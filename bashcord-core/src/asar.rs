// bashcord-core/src/asar.rs
//! Minimal Electron asar codec: enough to write the patched entry point and
//! to pull a top-level file back out of any archive.
//!
//! Layout: a size pickle (`u32 4`, `u32 header_len`), a header pickle
//! (`u32 payload_len`, `u32 json_len`, json, zero padding to 4 bytes), then
//! the file bodies. Offsets in the json are decimal strings relative to the
//! end of the header pickle. All integers are little endian.

use std::collections::BTreeMap;

use bashcord_common::error::{BashcordError, Result};
use serde::{Deserialize, Serialize};

const SIZE_PICKLE_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    files: BTreeMap<String, Node>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Node {
    Dir {
        files: BTreeMap<String, Node>,
    },
    File {
        size: u64,
        #[serde(default)]
        offset: Option<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        unpacked: bool,
    },
}

fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| BashcordError::Generic(format!("asar truncated at byte {at}")))
}

/// Builds an archive holding `files` at its top level, in the given order.
pub fn write_archive(files: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut nodes = BTreeMap::new();
    let mut offset = 0u64;
    for (name, data) in files {
        nodes.insert(
            (*name).to_string(),
            Node::File {
                size: data.len() as u64,
                offset: Some(offset.to_string()),
                unpacked: false,
            },
        );
        offset += data.len() as u64;
    }
    let json = serde_json::to_vec(&Header { files: nodes })?;

    let padded = align4(json.len());
    let payload_len = 4 + padded;
    let header_len = 4 + payload_len;

    let mut out = Vec::with_capacity(SIZE_PICKLE_LEN + header_len + offset as usize);
    out.extend_from_slice(&4u32.to_le_bytes());
    out.extend_from_slice(&(header_len as u32).to_le_bytes());
    out.extend_from_slice(&(payload_len as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&json);
    out.resize(SIZE_PICKLE_LEN + header_len, 0);
    for (_, data) in files {
        out.extend_from_slice(data);
    }
    Ok(out)
}

fn parse_header(archive: &[u8]) -> Result<(Header, usize)> {
    if read_u32(archive, 0)? != 4 {
        return Err(BashcordError::Generic("not an asar archive".to_string()));
    }
    let header_len = read_u32(archive, 4)? as usize;
    let json_len = read_u32(archive, 12)? as usize;
    let json = archive
        .get(16..16 + json_len)
        .ok_or_else(|| BashcordError::Generic("asar header truncated".to_string()))?;
    let header: Header = serde_json::from_slice(json)?;
    Ok((header, SIZE_PICKLE_LEN + header_len))
}

/// Names of the top-level entries of an archive.
pub fn list_files(archive: &[u8]) -> Result<Vec<String>> {
    let (header, _) = parse_header(archive)?;
    Ok(header.files.into_keys().collect())
}

/// Contents of the packed top-level file `name`, or `None` when absent,
/// a directory, or stored unpacked.
pub fn read_file(archive: &[u8], name: &str) -> Result<Option<Vec<u8>>> {
    let (header, base) = parse_header(archive)?;
    let Some(Node::File {
        size,
        offset: Some(offset),
        unpacked: false,
    }) = header.files.get(name)
    else {
        return Ok(None);
    };
    let offset: usize = offset
        .parse()
        .map_err(|e| BashcordError::Generic(format!("bad asar offset for {name}: {e}")))?;
    let start = base + offset;
    let end = start + *size as usize;
    archive
        .get(start..end)
        .map(|b| Some(b.to_vec()))
        .ok_or_else(|| BashcordError::Generic(format!("asar body for {name} is truncated")))
}
