/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::io::md5::{base64_md5, hex_md5};
use crate::io::FileChunk;
use crate::operation::upload::input::Callback;
use crate::xml::UploadPart;

const CHECKPOINT_MAGIC: &str = "FE8BB4EA-B593-4FAC-AD7A-2459A36E2E62";
const CHECKPOINT_SUFFIX: &str = ".cp";
const HASH_BUF_SIZE: usize = 64 * 1024;

/// Where, if anywhere, to persist the progress of an upload so it can be resumed.
///
/// With checkpoints enabled the upload records every finished part in a checkpoint file. A
/// later upload of the same file to the same object picks up where the previous one stopped,
/// as long as the file is unchanged. A failed resumable upload is not aborted on the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointConfig {
    enabled: bool,
    file_path: Option<PathBuf>,
    dir: Option<PathBuf>,
}

impl CheckpointConfig {
    /// Checkpoints disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Checkpoints enabled, stored in the OS temporary directory under a name derived from the
    /// source file and the destination
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Store the checkpoint at exactly `path`
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.enabled = true;
        self.file_path = Some(path.into());
        self
    }

    /// Store the checkpoint in `dir` under a derived name
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.enabled = true;
        self.dir = Some(dir.into());
        self
    }

    /// Whether checkpoints are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Checkpoint location for uploading `source` to `oss://bucket/key`
    pub(crate) fn path_for(&self, source: &Path, bucket: &str, key: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if let Some(path) = &self.file_path {
            return Some(path.clone());
        }
        let name = format!(
            "{}-{}{CHECKPOINT_SUFFIX}",
            hex_md5(source.to_string_lossy().as_bytes()),
            hex_md5(format!("oss://{bucket}/{key}").as_bytes()),
        );
        let dir = self.dir.clone().unwrap_or_else(std::env::temp_dir);
        Some(dir.join(name))
    }
}

/// Identity of the source file a checkpoint belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStat {
    pub(crate) size: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub(crate) last_modified: i64,
    /// Hex MD5 of the content, empty unless checkpoints are enabled
    #[serde(rename = "MD5")]
    pub(crate) md5: String,
}

/// The file being uploaded
#[derive(Debug, Clone)]
pub(crate) struct SourceFile {
    pub(crate) path: PathBuf,
    pub(crate) stat: FileStat,
}

impl SourceFile {
    /// Stat `path`, hashing its content when `with_md5` is set
    pub(crate) async fn open(path: &Path, with_md5: bool) -> Result<Self, Error> {
        let path = absolute(path)?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(crate::error::invalid_input(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let md5 = if with_md5 {
            file_md5(path.clone()).await?
        } else {
            String::new()
        };
        Ok(Self {
            path,
            stat: FileStat {
                size: metadata.len(),
                last_modified: modified.timestamp_nanos_opt().unwrap_or_default(),
                md5,
            },
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(path.clean());
    }
    Ok(std::env::current_dir()?.join(path).clean())
}

async fn file_md5(path: PathBuf) -> Result<String, Error> {
    let digest = tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(path)?;
        let mut ctx = md5::Context::new();
        let mut buf = vec![0u8; HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            ctx.consume(&buf[..n]);
        }
        Ok::<_, std::io::Error>(ctx.compute())
    })
    .await??;
    Ok(format!("{digest:x}"))
}

/// Upload state of one part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PartState {
    pub(crate) chunk: FileChunk,
    pub(crate) part: UploadPart,
    /// CRC64 of the part content
    #[serde(rename = "CRC64")]
    pub(crate) crc64: u64,
    pub(crate) is_completed: bool,
}

/// Progress of a multipart upload, persisted as JSON for resumable uploads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Checkpoint {
    pub(crate) magic: String,
    /// Base64 MD5 of the record serialized with this field empty
    #[serde(rename = "MD5")]
    pub(crate) md5: String,
    pub(crate) file_path: String,
    pub(crate) file_stat: FileStat,
    pub(crate) bucket: String,
    pub(crate) object_key: String,
    #[serde(rename = "UploadID")]
    pub(crate) upload_id: String,
    pub(crate) parts: Vec<PartState>,
    pub(crate) callback_val: String,
    pub(crate) callback_var: String,
}

impl Checkpoint {
    pub(crate) fn new(
        source: &SourceFile,
        bucket: &str,
        key: &str,
        upload_id: String,
        chunks: &[FileChunk],
        callback: &Callback,
    ) -> Self {
        Self {
            magic: CHECKPOINT_MAGIC.to_owned(),
            md5: String::new(),
            file_path: source.path.to_string_lossy().into_owned(),
            file_stat: source.stat.clone(),
            bucket: bucket.to_owned(),
            object_key: key.to_owned(),
            upload_id,
            parts: chunks
                .iter()
                .map(|chunk| PartState {
                    chunk: *chunk,
                    part: UploadPart {
                        part_number: chunk.number,
                        etag: String::new(),
                    },
                    crc64: 0,
                    is_completed: false,
                })
                .collect(),
            callback_val: callback.value.clone().unwrap_or_default(),
            callback_var: callback.var.clone().unwrap_or_default(),
        }
    }

    /// Read a checkpoint file. Any failure means there is no usable checkpoint.
    pub(crate) async fn load(path: &Path) -> Result<Self, Error> {
        let data = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn compute_md5(&self) -> Result<String, Error> {
        let unsigned = Checkpoint {
            md5: String::new(),
            ..self.clone()
        };
        Ok(base64_md5(&serde_json::to_vec(&unsigned)?))
    }

    /// Whether this checkpoint is intact and describes uploading `source` with `callback`
    pub(crate) fn is_valid(
        &self,
        source: &SourceFile,
        bucket: &str,
        key: &str,
        callback: &Callback,
    ) -> bool {
        if self.magic != CHECKPOINT_MAGIC {
            return false;
        }
        match self.compute_md5() {
            Ok(md5) if md5 == self.md5 => {}
            _ => return false,
        }
        let parts_dense = self
            .parts
            .iter()
            .enumerate()
            .all(|(i, p)| p.chunk.number == i as u64 + 1 && p.part.part_number == p.chunk.number);

        self.file_stat == source.stat
            && self.bucket == bucket
            && self.object_key == key
            && !self.upload_id.is_empty()
            && !self.parts.is_empty()
            && parts_dense
            && self.callback_val == callback.value.clone().unwrap_or_default()
            && self.callback_var == callback.var.clone().unwrap_or_default()
    }

    /// Seal the record with its MD5 and replace the file at `path`. A crash leaves either the
    /// old or the new record in place.
    pub(crate) async fn dump(&mut self, path: &Path) -> Result<(), Error> {
        self.md5 = self.compute_md5()?;
        let data = serde_json::to_vec(self)?;
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok::<_, std::io::Error>(())
        })
        .await??;
        Ok(())
    }

    /// Delete the checkpoint file, ignoring one that does not exist
    pub(crate) async fn remove(path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove checkpoint")
            }
        }
    }

    pub(crate) fn pending_chunks(&self) -> Vec<FileChunk> {
        self.parts
            .iter()
            .filter(|p| !p.is_completed)
            .map(|p| p.chunk)
            .collect()
    }

    pub(crate) fn completed_bytes(&self) -> u64 {
        self.parts
            .iter()
            .filter(|p| p.is_completed)
            .map(|p| p.chunk.size)
            .sum()
    }

    pub(crate) fn mark_completed(&mut self, part: UploadPart, crc64: u64) {
        let index = part.part_number as usize;
        if let Some(state) = index.checked_sub(1).and_then(|i| self.parts.get_mut(i)) {
            state.part = part;
            state.crc64 = crc64;
            state.is_completed = true;
        }
    }

    pub(crate) fn all_completed(&self) -> bool {
        self.parts.iter().all(|p| p.is_completed)
    }

    /// Completed parts in part number order
    pub(crate) fn upload_parts(&self) -> Vec<UploadPart> {
        self.parts.iter().map(|p| p.part.clone()).collect()
    }

    /// CRC64 of the whole file, combined from the part checksums
    pub(crate) fn combined_crc64(&self) -> u64 {
        self.parts.iter().fold(0, |crc, p| {
            crate::io::crc64::combine(crc, p.crc64, p.chunk.size)
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::path::Path;

    use tempfile::{NamedTempFile, TempDir};

    use super::{Checkpoint, CheckpointConfig, SourceFile};
    use crate::io::{crc64, plan_parts};
    use crate::operation::upload::input::Callback;
    use crate::xml::UploadPart;

    async fn source(content: &[u8]) -> (NamedTempFile, SourceFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        let source = SourceFile::open(file.path(), true).await.unwrap();
        (file, source)
    }

    fn checkpoint(source: &SourceFile) -> Checkpoint {
        let chunks = plan_parts(source.stat.size, 100 * 1024).unwrap();
        Checkpoint::new(
            source,
            "bucket",
            "key",
            "upload-1".to_owned(),
            &chunks,
            &Callback::default(),
        )
    }

    #[tokio::test]
    async fn test_dump_load_round_trip() {
        let (_file, source) = source(&vec![7u8; 250 * 1024]).await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.cp");

        let mut cp = checkpoint(&source);
        cp.mark_completed(
            UploadPart {
                part_number: 2,
                etag: "\"etag-2\"".to_owned(),
            },
            42,
        );
        cp.dump(&path).await.unwrap();

        let loaded = Checkpoint::load(&path).await.unwrap();
        assert_eq!(cp, loaded);
        assert!(loaded.is_valid(&source, "bucket", "key", &Callback::default()));
        assert_eq!(vec![1, 3], loaded.pending_chunks().iter().map(|c| c.number).collect::<Vec<_>>());
        assert_eq!(100 * 1024, loaded.completed_bytes());
    }

    #[tokio::test]
    async fn test_mutations_invalidate() {
        let (_file, source) = source(b"checkpointed content").await;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.cp");
        let mut cp = checkpoint(&source);
        cp.dump(&path).await.unwrap();
        let stored = Checkpoint::load(&path).await.unwrap();
        let callback = Callback::default();

        let mut tampered = stored.clone();
        tampered.magic = "not-a-checkpoint".to_owned();
        assert!(!tampered.is_valid(&source, "bucket", "key", &callback));

        // edits without resealing break the self MD5
        let mut tampered = stored.clone();
        tampered.upload_id = "other".to_owned();
        assert!(!tampered.is_valid(&source, "bucket", "key", &callback));

        let mut changed = source.clone();
        changed.stat.size += 1;
        assert!(!stored.is_valid(&changed, "bucket", "key", &callback));

        let mut changed = source.clone();
        changed.stat.last_modified += 1;
        assert!(!stored.is_valid(&changed, "bucket", "key", &callback));

        let mut changed = source.clone();
        changed.stat.md5 = "00".to_owned();
        assert!(!stored.is_valid(&changed, "bucket", "key", &callback));

        let with_value = Callback {
            value: Some("e30=".to_owned()),
            var: None,
        };
        assert!(!stored.is_valid(&source, "bucket", "key", &with_value));
        let with_var = Callback {
            value: None,
            var: Some("e30=".to_owned()),
        };
        assert!(!stored.is_valid(&source, "bucket", "key", &with_var));

        assert!(!stored.is_valid(&source, "bucket", "other-key", &callback));
        assert!(stored.is_valid(&source, "bucket", "key", &callback));
    }

    #[tokio::test]
    async fn test_file_md5() {
        let (_file, source) = source(b"hello").await;
        assert_eq!("5d41402abc4b2a76b9719d911017c592", source.stat.md5);
        assert!(source.path.is_absolute());
    }

    #[test]
    fn test_default_path() {
        let config = CheckpointConfig::enabled().dir("/var/cp");
        let path = config
            .path_for(Path::new("/data/a.bin"), "bucket", "key")
            .unwrap();
        assert_eq!(Path::new("/var/cp"), path.parent().unwrap());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".cp"));
        assert_eq!(2 * 32 + 1 + 3, name.len());

        let explicit = CheckpointConfig::enabled().file_path("/tmp/x.cp");
        assert_eq!(
            Some(Path::new("/tmp/x.cp").to_owned()),
            explicit.path_for(Path::new("/data/a.bin"), "bucket", "key")
        );
        assert_eq!(None, CheckpointConfig::disabled().path_for(Path::new("/a"), "b", "k"));
    }

    #[test]
    fn test_combined_crc() {
        let data = vec![3u8; 250 * 1024];
        let chunks = plan_parts(data.len() as u64, 100 * 1024).unwrap();
        let source = SourceFile {
            path: "/data".into(),
            stat: Default::default(),
        };
        let mut cp = Checkpoint::new(&source, "b", "k", "u".to_owned(), &chunks, &Callback::default());
        for chunk in &chunks {
            let start = chunk.offset as usize;
            let end = start + chunk.size as usize;
            cp.mark_completed(
                UploadPart {
                    part_number: chunk.number,
                    etag: String::new(),
                },
                crc64::checksum(&data[start..end]),
            );
        }
        assert!(cp.all_completed());
        assert_eq!(crc64::checksum(&data), cp.combined_crc64());
    }
}
