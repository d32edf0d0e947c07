use std::fs::OpenOptions;
use std::ops::Range;
use std::path::Path;
use std::process;

use anyhow::Context;
use bitvec::prelude::*;
use memmap::MmapMut;

use super::types::{Block, DirBlock};
use super::{BLOCK_SIZE, DISK_SIZE, INVALID_HANDLE, NUM_BLOCKS, ROOT_DIR_HANDLE, SUPERBLOCK_HANDLE};

/// Blocks 0 and 1 are the superblock and the root directory; the allocator
/// never hands them out.
const FIRST_ALLOCATABLE: usize = 2;

/// The disk image is treated as infallible media: once mapped, a failed flush
/// or an out-of-range access means the on-disk invariants can no longer be
/// maintained, so the process aborts.
pub(crate) fn fatal(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(-1);
}

/// A fixed-size virtual disk persisted as a single memory-mapped host file.
/// Block 0 holds the allocation bitmap, one bit per block.
#[derive(Debug)]
pub struct Disk {
    mmap: MmapMut,
}

impl Disk {
    /// Opens a disk image, creating and formatting it on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .with_context(|| format!("could not open disk image {}", path.display()))?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.set_len(DISK_SIZE)?;
        } else if len != DISK_SIZE {
            anyhow::bail!(
                "disk image {} is {} bytes, expected {}",
                path.display(),
                len,
                DISK_SIZE
            );
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut disk = Self { mmap };
        if !disk.is_allocated(SUPERBLOCK_HANDLE) {
            disk.format();
        }

        Ok(disk)
    }

    fn format(&mut self) {
        self.mmap[..].fill(0);
        let bits = self.bitmap_mut();
        bits.set(SUPERBLOCK_HANDLE as usize, true);
        bits.set(ROOT_DIR_HANDLE as usize, true);
        self.flush_superblock();
        self.write_block(ROOT_DIR_HANDLE, &DirBlock::new().to_block());
    }

    pub fn read_block(&self, n: u32) -> Block {
        let mut block = [0; BLOCK_SIZE];
        block.copy_from_slice(&self.mmap[block_range(n)]);
        block
    }

    /// Writes and flushes one block.
    pub fn write_block(&mut self, n: u32, block: &Block) {
        let range = block_range(n);
        self.mmap[range.clone()].copy_from_slice(block);
        if let Err(err) = self.mmap.flush_range(range.start, BLOCK_SIZE) {
            fatal(&format!("failed to flush block {n}: {err}"));
        }
    }

    /// Reserves the lowest free block, persists the bitmap, and returns the
    /// handle. Returns `INVALID_HANDLE` when the disk is full.
    pub fn get_free_block(&mut self) -> u32 {
        match self.bitmap().iter_zeros().find(|&i| i >= FIRST_ALLOCATABLE) {
            Some(i) => {
                self.bitmap_mut().set(i, true);
                self.flush_superblock();
                i as u32
            }
            None => INVALID_HANDLE,
        }
    }

    /// Returns a block to the free pool. The block's contents are left as-is.
    pub fn reclaim_block(&mut self, n: u32) {
        check_bounds(n);
        self.bitmap_mut().set(n as usize, false);
        self.flush_superblock();
    }

    pub fn is_allocated(&self, n: u32) -> bool {
        check_bounds(n);
        self.bitmap()[n as usize]
    }

    pub fn free_blocks(&self) -> usize {
        self.bitmap().count_zeros()
    }

    pub fn flush(&self) {
        if let Err(err) = self.mmap.flush() {
            fatal(&format!("failed to flush disk image: {err}"));
        }
    }

    fn bitmap(&self) -> &BitSlice<u8, Lsb0> {
        self.mmap[..BLOCK_SIZE].view_bits()
    }

    fn bitmap_mut(&mut self) -> &mut BitSlice<u8, Lsb0> {
        self.mmap[..BLOCK_SIZE].view_bits_mut()
    }

    fn flush_superblock(&mut self) {
        if let Err(err) = self.mmap.flush_range(0, BLOCK_SIZE) {
            fatal(&format!("failed to flush superblock: {err}"));
        }
    }
}

fn check_bounds(n: u32) {
    if n as usize >= NUM_BLOCKS {
        fatal(&format!("block {n} is out of range"));
    }
}

fn block_range(n: u32) -> Range<usize> {
    check_bounds(n);
    let n = n as usize;
    n * BLOCK_SIZE..(n + 1) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nimbus::types;
    use std::path::PathBuf;

    fn image(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("nimbusfs_device_{name}"));
        path.set_extension("img");
        if path.exists() {
            std::fs::remove_file(&path).unwrap();
        }
        path
    }

    #[test]
    fn open_formats_a_fresh_image() -> anyhow::Result<()> {
        let path = image("format");
        let disk = Disk::open(&path)?;

        assert!(disk.is_allocated(SUPERBLOCK_HANDLE));
        assert!(disk.is_allocated(ROOT_DIR_HANDLE));
        assert_eq!(disk.free_blocks(), NUM_BLOCKS - 2);

        let root = disk.read_block(ROOT_DIR_HANDLE);
        assert!(types::is_directory(&root));
        assert_eq!(DirBlock::from_block(&root).num_entries, 0);

        Ok(std::fs::remove_file(&path)?)
    }

    #[test]
    fn allocation_is_lowest_first() -> anyhow::Result<()> {
        let path = image("alloc");
        let mut disk = Disk::open(&path)?;

        assert_eq!(disk.get_free_block(), 2);
        assert_eq!(disk.get_free_block(), 3);
        assert_eq!(disk.get_free_block(), 4);

        disk.reclaim_block(3);
        assert_eq!(disk.get_free_block(), 3);
        assert_eq!(disk.get_free_block(), 5);

        Ok(std::fs::remove_file(&path)?)
    }

    #[test]
    fn allocator_exhaustion_returns_the_null_handle() -> anyhow::Result<()> {
        let path = image("exhaust");
        let mut disk = Disk::open(&path)?;

        for _ in 0..NUM_BLOCKS - 2 {
            assert_ne!(disk.get_free_block(), INVALID_HANDLE);
        }
        assert_eq!(disk.free_blocks(), 0);
        assert_eq!(disk.get_free_block(), INVALID_HANDLE);

        Ok(std::fs::remove_file(&path)?)
    }

    #[test]
    fn blocks_and_bitmap_persist_across_reopen() -> anyhow::Result<()> {
        let path = image("persist");
        let payload = [0xAB; BLOCK_SIZE];

        {
            let mut disk = Disk::open(&path)?;
            let handle = disk.get_free_block();
            assert_eq!(handle, 2);
            disk.write_block(handle, &payload);
        }

        let disk = Disk::open(&path)?;
        assert!(disk.is_allocated(2));
        assert_eq!(disk.read_block(2), payload);
        assert_eq!(disk.free_blocks(), NUM_BLOCKS - 3);

        Ok(std::fs::remove_file(&path)?)
    }
}
