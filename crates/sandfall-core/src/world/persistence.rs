//! On-disk layout of a world: `world.meta` plus one file per chunk
//!
//! ```text
//! <root>/<world>/world.meta              RON WorldMeta
//! <root>/<world>/chunks/chunk_{x}_{y}.bin  bincode, lz4 compressed
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::chunk::Chunk;
use super::chunk_status::ChunkState;
use super::grid::TileBlock;
use crate::simulation::{CHUNK_H, CHUNK_W};

pub const META_VERSION: u32 = 1;
const META_FILE: &str = "world.meta";
const CHUNK_DIR: &str = "chunks";

/// World metadata stored in world.meta (RON format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub version: u32,
    pub world_name: String,
    pub seed: u64,
    pub created_at: String,
    pub last_opened: String,
}

impl WorldMeta {
    pub fn new(world_name: &str, seed: u64) -> Self {
        let now = chrono::Local::now().to_rfc3339();
        Self {
            version: META_VERSION,
            world_name: world_name.to_string(),
            seed,
            created_at: now.clone(),
            last_opened: now,
        }
    }
}

/// Read a `world.meta` file
pub fn load_world_meta(path: &Path) -> Result<WorldMeta> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read world meta {:?}", path))?;
    ron::from_str(&text).with_context(|| format!("Failed to parse world meta {:?}", path))
}

/// Remove a world directory and everything in it
pub fn delete_world(root: &Path, world_name: &str) -> Result<()> {
    let dir = root.join(world_name);
    if dir.exists() {
        std::fs::remove_dir_all(&dir).with_context(|| format!("Failed to delete world {:?}", dir))?;
        log::info!("[SAVE] Deleted world {:?}", dir);
    }
    Ok(())
}

/// Serialized form of a chunk: coordinates, generation state and tiles
#[derive(Serialize)]
struct ChunkRecordRef<'a> {
    x: i32,
    y: i32,
    state: ChunkState,
    data: &'a TileBlock,
}

#[derive(Deserialize)]
struct ChunkRecord {
    x: i32,
    y: i32,
    state: ChunkState,
    data: TileBlock,
}

/// Chunk and metadata storage for one world directory
#[derive(Debug, Clone)]
pub struct WorldPersistence {
    world_dir: PathBuf,
    world_name: String,
}

impl WorldPersistence {
    /// Open (creating if needed) `<root>/<world_name>/`
    pub fn new(root: &Path, world_name: &str) -> Result<Self> {
        let world_dir = root.join(world_name);
        std::fs::create_dir_all(world_dir.join(CHUNK_DIR))
            .context("Failed to create world directories")?;
        Ok(Self {
            world_dir,
            world_name: world_name.to_string(),
        })
    }

    pub fn world_dir(&self) -> &Path {
        &self.world_dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.world_dir.join(META_FILE)
    }

    fn chunk_path(&self, x: i32, y: i32) -> PathBuf {
        self.world_dir
            .join(CHUNK_DIR)
            .join(format!("chunk_{}_{}.bin", x, y))
    }

    pub fn has_chunk(&self, x: i32, y: i32) -> bool {
        self.chunk_path(x, y).exists()
    }

    /// Save a chunk with its tiles. Merged chunks are stored as ready to merge.
    pub fn save_chunk(&self, chunk: &Chunk) -> Result<()> {
        let data = chunk
            .data()
            .with_context(|| format!("Chunk ({}, {}) has no tile data to save", chunk.x, chunk.y))?;
        let path = self.chunk_path(chunk.x, chunk.y);
        let record = ChunkRecordRef {
            x: chunk.x,
            y: chunk.y,
            state: chunk.state().for_storage(),
            data,
        };

        let serialized =
            bincode_next::serde::encode_to_vec(&record, bincode_next::config::standard())
                .context("Failed to serialize chunk")?;
        let compressed = lz4_flex::compress_prepend_size(&serialized);
        let compressed_size = compressed.len();

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, compressed).context("Failed to write chunk temp file")?;
        std::fs::rename(&temp_path, &path).context("Failed to rename chunk file")?;

        log::debug!(
            "[SAVE] Chunk ({}, {}) - {} non-air tiles, {} bytes compressed",
            chunk.x,
            chunk.y,
            data.count_non_air(),
            compressed_size
        );
        Ok(())
    }

    /// Load a chunk. `Ok(None)` when no file exists for it.
    pub fn load_chunk(&self, x: i32, y: i32) -> Result<Option<Chunk>> {
        let path = self.chunk_path(x, y);
        if !path.exists() {
            return Ok(None);
        }

        let compressed = std::fs::read(&path).context("Failed to read chunk file")?;
        let serialized = lz4_flex::decompress_size_prepended(&compressed)
            .context("Failed to decompress chunk")?;
        let (record, _): (ChunkRecord, _) =
            bincode_next::serde::decode_from_slice(&serialized, bincode_next::config::standard())
                .map_err(|e| anyhow::anyhow!("Failed to deserialize chunk: {:?}", e))?;

        if (record.x, record.y) != (x, y) {
            anyhow::bail!(
                "Chunk file {:?} holds chunk ({}, {})",
                path,
                record.x,
                record.y
            );
        }

        let data = &record.data;
        if data.width != CHUNK_W || data.height != CHUNK_H || !data.is_consistent() {
            anyhow::bail!(
                "Chunk file {:?} holds a {}x{} block with {}/{}/{} cells",
                path,
                data.width,
                data.height,
                data.tiles.len(),
                data.layer2.len(),
                data.background.len()
            );
        }

        let mut chunk = Chunk::new(x, y);
        chunk.advance(record.state);
        chunk.put_data(record.data);
        log::debug!(
            "[LOAD] Chunk ({}, {}) from disk - {} non-air tiles",
            x,
            y,
            chunk.count_non_air()
        );
        Ok(Some(chunk))
    }

    pub fn save_meta(&self, meta: &WorldMeta) -> Result<()> {
        let serialized = ron::ser::to_string_pretty(meta, ron::ser::PrettyConfig::default())
            .context("Failed to serialize metadata")?;
        std::fs::write(self.meta_path(), serialized).context("Failed to write metadata file")?;
        Ok(())
    }

    /// Load the meta file, or create one for `seed` if the world is new.
    /// Either way `last_opened` is stamped with the current time.
    pub fn touch(&self, seed: u64) -> Result<WorldMeta> {
        let path = self.meta_path();
        let mut meta = if path.exists() {
            load_world_meta(&path)?
        } else {
            log::info!("[SAVE] Creating world '{}' with seed {}", self.world_name, seed);
            WorldMeta::new(&self.world_name, seed)
        };
        meta.last_opened = chrono::Local::now().to_rfc3339();
        self.save_meta(&meta)?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{MaterialId, MaterialInstance, Materials};

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sandfall_persist_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_chunk_survives_save_and_load() {
        let root = temp_root("chunk");
        let persistence = WorldPersistence::new(&root, "alpha").unwrap();
        let materials = Materials::new();

        let mut chunk = Chunk::new(-3, 7);
        chunk.advance(ChunkState::Merged);
        let mut block = TileBlock::new(CHUNK_W, CHUNK_H);
        block.set(4, 9, MaterialInstance::from_def(materials.get(MaterialId::SAND)));
        block.background[0] = 0x123456;
        chunk.put_data(block.clone());

        persistence.save_chunk(&chunk).unwrap();
        assert!(persistence.has_chunk(-3, 7));

        let loaded = persistence.load_chunk(-3, 7).unwrap().unwrap();
        assert_eq!(loaded.state(), ChunkState::ReadyToMerge);
        assert_eq!(loaded.data(), Some(&block));
        assert!(persistence.load_chunk(0, 0).unwrap().is_none());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_corrupt_chunk_is_an_error() {
        let root = temp_root("corrupt");
        let persistence = WorldPersistence::new(&root, "beta").unwrap();
        std::fs::write(persistence.chunk_path(1, 1), b"not a chunk").unwrap();
        assert!(persistence.load_chunk(1, 1).is_err());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_mis_sized_chunk_is_an_error() {
        let root = temp_root("missized");
        let persistence = WorldPersistence::new(&root, "delta").unwrap();

        let mut truncated = TileBlock::new(CHUNK_W, CHUNK_H);
        truncated.tiles.truncate(10);
        let mut chunk = Chunk::new(2, 0);
        chunk.advance(ChunkState::ReadyToMerge);
        chunk.put_data(truncated);
        persistence.save_chunk(&chunk).unwrap();
        assert!(persistence.load_chunk(2, 0).is_err());

        let mut small = Chunk::new(3, 0);
        small.advance(ChunkState::ReadyToMerge);
        small.put_data(TileBlock::new(8, 8));
        persistence.save_chunk(&small).unwrap();
        assert!(persistence.load_chunk(3, 0).is_err());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_touch_creates_then_updates_meta() {
        let root = temp_root("meta");
        let persistence = WorldPersistence::new(&root, "gamma").unwrap();

        let first = persistence.touch(1234).unwrap();
        assert_eq!(first.seed, 1234);
        assert_eq!(first.world_name, "gamma");

        // An existing world keeps its seed
        let second = persistence.touch(999).unwrap();
        assert_eq!(second.seed, 1234);
        assert_eq!(second.created_at, first.created_at);

        let on_disk = load_world_meta(&persistence.meta_path()).unwrap();
        assert_eq!(on_disk, second);

        delete_world(&root, "gamma").unwrap();
        assert!(!root.join("gamma").exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
