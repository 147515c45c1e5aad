use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
    TableError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    embedding::EmbeddingSignature,
    error::{Error, Result},
    vector_index::{IndexEntry, Metadata, RetrievalResult, VectorIndex, rank},
};

/// Collection name -> next insertion sequence number.
const COLLECTIONS: TableDefinition<&str, u64> =
    TableDefinition::new("collections");

/// Collection name -> JSON [`EmbeddingSignature`] of its vectors.
const SIGNATURES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("embedding_signatures");

/// Header size: 8 bytes sequence + 4 bytes dimension.
const HEADER_SIZE: usize = 12;

const BACKEND: &str = "redb";

#[derive(Serialize, Deserialize)]
struct Payload {
    text: String,
    metadata: Metadata,
}

struct StoredEntry {
    sequence: u64,
    id: String,
    vector: Vec<f32>,
    payload: Payload,
}

fn corrupt(id: &str, message: impl std::fmt::Display) -> Error {
    Error::VectorIndex {
        backend: BACKEND,
        message: format!("entry '{id}' is corrupt: {message}"),
    }
}

/// Binary format per entry:
/// - 8 bytes: insertion sequence (u64 LE)
/// - 4 bytes: vector dimension D (u32 LE)
/// - D * 4 bytes: f32 LE values
/// - remaining bytes: JSON `{text, metadata}`
fn encode_entry(sequence: u64, entry: &IndexEntry) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&Payload {
        text: entry.text.clone(),
        metadata: entry.metadata.clone(),
    })
    .map_err(|e| Error::VectorIndex {
        backend: BACKEND,
        message: format!("cannot encode entry '{}': {e}", entry.id),
    })?;

    let vector: &[u8] = bytemuck::cast_slice(&entry.vector);
    let mut bytes =
        Vec::with_capacity(HEADER_SIZE + vector.len() + payload.len());
    bytes.extend_from_slice(&sequence.to_le_bytes());
    bytes.extend_from_slice(&(entry.vector.len() as u32).to_le_bytes());
    bytes.extend_from_slice(vector);
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode_sequence(bytes: &[u8]) -> Option<u64> {
    let header: [u8; 8] = bytes.get(0..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(header))
}

fn decode_entry(id: &str, bytes: &[u8]) -> Result<StoredEntry> {
    let sequence =
        decode_sequence(bytes).ok_or_else(|| corrupt(id, "truncated header"))?;
    let dimension: [u8; 4] = bytes
        .get(8..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| corrupt(id, "truncated header"))?;
    let dimension = u32::from_le_bytes(dimension) as usize;

    let vector_end = HEADER_SIZE + dimension * 4;
    let vector_bytes = bytes
        .get(HEADER_SIZE..vector_end)
        .ok_or_else(|| corrupt(id, "truncated vector"))?;
    // Values read back from redb carry no alignment guarantee.
    let vector: Vec<f32> = bytemuck::pod_collect_to_vec(vector_bytes);

    let payload: Payload = serde_json::from_slice(&bytes[vector_end..])
        .map_err(|e| corrupt(id, e))?;

    Ok(StoredEntry {
        sequence,
        id: id.to_string(),
        vector,
        payload,
    })
}

/// A collection of chunk vectors persisted in a redb file.
///
/// Each collection lives in its own table, so several collections can share
/// one database file. Opening a collection that already exists loads it
/// as-is; only a missing table leads to a new, empty collection.
pub struct RedbIndex {
    db: Database,
    name: String,
    table_name: String,
}

impl RedbIndex {
    /// Open (or create) the collection `name` in the database at `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use planrag::{RedbIndex, VectorIndex};
    ///
    /// let index =
    ///     RedbIndex::open(&tmp.path().join("vectors.redb"), "plan").unwrap();
    /// assert_eq!(index.count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Config(
                "collection name must not be empty".to_string(),
            ));
        }

        let db = Database::create(path)?;
        let index = Self {
            db,
            name: name.to_string(),
            table_name: format!("collection::{name}"),
        };

        let existing = {
            let txn = index.db.begin_read()?;
            match txn.open_table(index.table()) {
                Ok(table) => Some(table.len()?),
                Err(TableError::TableDoesNotExist(_)) => None,
                Err(e) => return Err(e.into()),
            }
        };

        match existing {
            Some(count) => {
                info!(collection = name, count, "loaded existing collection");
            }
            None => {
                let txn = index.db.begin_write()?;
                {
                    txn.open_table(index.table())?;
                    let mut meta = txn.open_table(COLLECTIONS)?;
                    meta.insert(name, 0u64)?;
                }
                txn.commit()?;
                info!(collection = name, path = %path.display(), "created collection");
            }
        }

        Ok(index)
    }

    fn table(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.table_name)
    }

    /// Names of every collection stored in this database file.
    pub fn collection_names(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let meta = match txn.open_table(COLLECTIONS) {
            Ok(meta) => meta,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in meta.iter()? {
            let (name, _) = entry?;
            names.push(name.value().to_string());
        }
        Ok(names)
    }

    /// Look up a stored entry by chunk id.
    pub fn get(&self, id: &str) -> Result<Option<IndexEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(self.table())?;

        let Some(guard) = table.get(id)? else {
            return Ok(None);
        };
        let stored = decode_entry(id, guard.value())?;
        Ok(Some(IndexEntry {
            id: stored.id,
            text: stored.payload.text,
            vector: stored.vector,
            metadata: stored.payload.metadata,
        }))
    }

    fn load_all(&self) -> Result<Vec<StoredEntry>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(self.table())?;

        let mut entries = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            entries.push(decode_entry(key.value(), value.value())?);
        }
        Ok(entries)
    }
}

impl VectorIndex for RedbIndex {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn collection_name(&self) -> &str {
        &self.name
    }

    fn upsert_batch(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let mut meta = txn.open_table(COLLECTIONS)?;
            let mut next =
                meta.get(self.name.as_str())?.map(|g| g.value()).unwrap_or(0);

            let mut table = txn.open_table(self.table())?;
            for entry in &entries {
                let existing = table
                    .get(entry.id.as_str())?
                    .and_then(|g| decode_sequence(g.value()));
                let sequence = match existing {
                    Some(sequence) => sequence,
                    None => {
                        next += 1;
                        next - 1
                    }
                };
                let bytes = encode_entry(sequence, entry)?;
                table.insert(entry.id.as_str(), bytes.as_slice())?;
            }

            meta.insert(self.name.as_str(), next)?;
        }
        txn.commit()?;

        debug!(collection = %self.name, count = entries.len(), "upserted entries");
        Ok(())
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let entries = self.load_all()?;
        rank(
            BACKEND,
            entries.iter().map(|e| {
                (
                    e.sequence,
                    e.id.as_str(),
                    e.payload.text.as_str(),
                    e.vector.as_slice(),
                )
            }),
            vector,
            k,
        )
    }

    fn count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(self.table())?;
        Ok(table.len()? as usize)
    }

    fn reset(&mut self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            txn.delete_table(self.table())?;
            txn.open_table(self.table())?;
            let mut meta = txn.open_table(COLLECTIONS)?;
            meta.insert(self.name.as_str(), 0u64)?;
            let mut signatures = txn.open_table(SIGNATURES)?;
            signatures.remove(self.name.as_str())?;
        }
        txn.commit()?;

        info!(collection = %self.name, "collection reset");
        Ok(())
    }

    fn embedding_signature(&self) -> Result<Option<EmbeddingSignature>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(SIGNATURES) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let Some(guard) = table.get(self.name.as_str())? else {
            return Ok(None);
        };
        let signature = serde_json::from_slice(guard.value()).map_err(|e| {
            Error::VectorIndex {
                backend: BACKEND,
                message: format!(
                    "embedding signature of '{}' is corrupt: {e}",
                    self.name
                ),
            }
        })?;
        Ok(Some(signature))
    }

    fn set_embedding_signature(
        &mut self,
        signature: &EmbeddingSignature,
    ) -> Result<()> {
        let bytes =
            serde_json::to_vec(signature).map_err(|e| Error::VectorIndex {
                backend: BACKEND,
                message: format!("cannot encode embedding signature: {e}"),
            })?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SIGNATURES)?;
            table.insert(self.name.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;

        debug!(collection = %self.name, model = %signature.model_name, "recorded embedding signature");
        Ok(())
    }
}

impl std::fmt::Debug for RedbIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbIndex")
            .field("collection", &self.name)
            .finish_non_exhaustive()
    }
}
