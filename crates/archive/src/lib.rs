// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Cray Inc.

//! Streaming tar packer for Session/Manifest staging archives (spec.md
//! §4.8, component C8).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;

pub use error::ArchiveError;

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tar::{Builder, EntryType, Header};

/// One regular file to pack: on-disk `source`, and where it lands in the
/// archive (`archive_path`, relative — e.g. `bin/mybinary`).
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub source: PathBuf,
    pub archive_path: String,
}

/// One empty directory entry to pack (e.g. `bin`, `lib`, `tmp`).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub archive_path: String,
}

const STREAM_BLOCK: usize = 256;

/// Pack `dirs` and `files` into a gnutar archive at `dest`, unlinking a
/// partial file on any write error.
pub fn pack(dest: &Path, dirs: &[DirEntry], files: &[FileEntry]) -> Result<(), ArchiveError> {
    match pack_inner(dest, dirs, files) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(dest);
            Err(e)
        }
    }
}

fn pack_inner(dest: &Path, dirs: &[DirEntry], files: &[FileEntry]) -> Result<(), ArchiveError> {
    let out = File::create(dest).map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let mut builder = Builder::new(out);

    for dir in dirs {
        append_directory(&mut builder, &dir.archive_path)?;
    }
    for file in files {
        append_file(&mut builder, file)?;
    }

    builder.finish().map_err(|source| ArchiveError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn append_directory<W: Write>(builder: &mut Builder<W>, archive_path: &str) -> Result<(), ArchiveError> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_mode(0o700);
    header.set_size(0);
    header.set_mtime(now_epoch());
    header.set_cksum();
    builder
        .append_data(&mut header, archive_path, std::io::empty())
        .map_err(|source| ArchiveError::Io {
            path: PathBuf::from(archive_path),
            source,
        })
}

fn append_file<W: Write>(builder: &mut Builder<W>, entry: &FileEntry) -> Result<(), ArchiveError> {
    let metadata = std::fs::symlink_metadata(&entry.source).map_err(|source| ArchiveError::Io {
        path: entry.source.clone(),
        source,
    })?;

    if !metadata.is_file() {
        return Err(ArchiveError::UnsupportedFileKind(entry.source.clone()));
    }

    let mut header = Header::new_gnu();
    header.set_metadata(&metadata);
    header.set_entry_type(EntryType::Regular);
    header.set_size(metadata.len());
    header.set_cksum();

    let source = File::open(&entry.source).map_err(|source| ArchiveError::Io {
        path: entry.source.clone(),
        source,
    })?;
    let reader = ChunkedReader {
        inner: source,
        chunk: [0u8; STREAM_BLOCK],
    };

    builder
        .append_data(&mut header, &entry.archive_path, reader)
        .map_err(|source| ArchiveError::Io {
            path: entry.source.clone(),
            source,
        })
}

/// Forces `append_data` to read in fixed 256-byte blocks rather than
/// whatever buffer size `tar` happens to request (spec.md §4.8).
struct ChunkedReader {
    inner: File,
    chunk: [u8; STREAM_BLOCK],
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let want = buf.len().min(STREAM_BLOCK);
        let read = self.inner.read(&mut self.chunk[..want])?;
        buf[..read].copy_from_slice(&self.chunk[..read]);
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn packs_directories_and_files() {
        let dir = tempdir().expect("tempdir");
        let src_file = dir.path().join("payload.bin");
        std::fs::write(&src_file, b"hello world, this is a staged binary").expect("write");

        let dest = dir.path().join("out.tar");
        pack(
            &dest,
            &[DirEntry {
                archive_path: "stage/bin".to_string(),
            }],
            &[FileEntry {
                source: src_file,
                archive_path: "stage/bin/payload.bin".to_string(),
            }],
        )
        .expect("pack");

        let mut archive = tar::Archive::new(File::open(&dest).expect("open"));
        let entries: Vec<_> = archive
            .entries()
            .expect("entries")
            .map(|e| e.expect("entry").path().expect("path").into_owned())
            .collect();
        assert!(entries.iter().any(|p| p == Path::new("stage/bin")));
        assert!(entries
            .iter()
            .any(|p| p == Path::new("stage/bin/payload.bin")));
    }

    #[test]
    fn unsupported_file_kind_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let fifo_stand_in = dir.path().join("missing");
        let dest = dir.path().join("out.tar");

        let result = pack(
            &dest,
            &[],
            &[FileEntry {
                source: fifo_stand_in,
                archive_path: "x".to_string(),
            }],
        );
        assert!(result.is_err());
        assert!(!dest.exists());
    }
}
