//! Binary persistence for item embeddings (`vectors.bin`).
//!
//! Header (47 bytes):
//! - version: u8
//! - model_id: [u8; 32] (SHA-256 of the embedding model name)
//! - dimensions: u16 (LE)
//! - entry_count: u64 (LE)
//! - checksum: u32 (CRC32 of the 43 bytes above, LE)
//!
//! Entries, repeated `entry_count` times:
//! - item_id: u64 (LE)
//! - content_hash: u64 (LE)
//! - embedding: [f32; dimensions] (LE)

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::semantic::index::VectorIndex;

const FORMAT_VERSION: u8 = 1;

const HEADER_SIZE: usize = 47;
const CHECKSUMMED_LEN: usize = 43;

#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: file uses different model")]
    ModelMismatch,

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

/// SHA-256 of a model name, stored in the header to detect model switches.
pub fn model_id(model_name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

pub struct VectorStorage {
    path: PathBuf,
}

#[derive(Debug)]
struct Header {
    version: u8,
    model_id: [u8; 32],
    dimensions: u16,
    entry_count: u64,
}

impl VectorStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all entries written for `expected_model_id`.
    pub fn load(&self, expected_model_id: &[u8; 32]) -> Result<VectorIndex, VectorStorageError> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let header = read_header(&mut reader)?;
        if header.model_id != *expected_model_id {
            return Err(VectorStorageError::ModelMismatch);
        }

        let dimensions = header.dimensions as usize;
        let mut index = VectorIndex::with_capacity(dimensions, header.entry_count as usize);

        for _ in 0..header.entry_count {
            let id = read_u64(&mut reader)?;
            let content_hash = read_u64(&mut reader)?;
            let mut embedding = Vec::with_capacity(dimensions);
            for _ in 0..dimensions {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf)?;
                embedding.push(f32::from_le_bytes(buf));
            }

            if let Err(err) = index.insert(id, content_hash, embedding) {
                log::warn!("skipping stored vector for item {id}: {err}");
            }
        }

        Ok(index)
    }

    /// Write the whole index: temp file, fsync, rename.
    pub fn save(&self, index: &VectorIndex, model_id: &[u8; 32]) -> Result<(), VectorStorageError> {
        let temp_path = self.path.with_extension("tmp");

        if let Err(err) = write_index(&temp_path, index, model_id) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err);
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn write_index(
    path: &Path,
    index: &VectorIndex,
    model_id: &[u8; 32],
) -> Result<(), VectorStorageError> {
    let mut writer = BufWriter::new(File::create(path)?);

    let mut header = [0u8; HEADER_SIZE];
    header[0] = FORMAT_VERSION;
    header[1..33].copy_from_slice(model_id);
    header[33..35].copy_from_slice(&(index.dimensions() as u16).to_le_bytes());
    header[35..43].copy_from_slice(&(index.len() as u64).to_le_bytes());
    let checksum = crc32fast::hash(&header[..CHECKSUMMED_LEN]);
    header[43..47].copy_from_slice(&checksum.to_le_bytes());
    writer.write_all(&header)?;

    for (id, entry) in index.iter() {
        writer.write_all(&id.to_le_bytes())?;
        writer.write_all(&entry.content_hash.to_le_bytes())?;
        for value in &entry.embedding {
            writer.write_all(&value.to_le_bytes())?;
        }
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    Ok(())
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, VectorStorageError> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;

    let version = bytes[0];
    if version > FORMAT_VERSION {
        return Err(VectorStorageError::VersionMismatch(version, FORMAT_VERSION));
    }

    let stored_checksum = u32::from_le_bytes([bytes[43], bytes[44], bytes[45], bytes[46]]);
    if stored_checksum != crc32fast::hash(&bytes[..CHECKSUMMED_LEN]) {
        return Err(VectorStorageError::ChecksumMismatch);
    }

    let mut model_id = [0u8; 32];
    model_id.copy_from_slice(&bytes[1..33]);

    let mut entry_count = [0u8; 8];
    entry_count.copy_from_slice(&bytes[35..43]);

    Ok(Header {
        version,
        model_id,
        dimensions: u16::from_le_bytes([bytes[33], bytes[34]]),
        entry_count: u64::from_le_bytes(entry_count),
    })
}

fn read_u64<R: Read>(reader: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
