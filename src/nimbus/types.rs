use serde::{Deserialize, Serialize};

use super::{
    BLOCK_SIZE, DIR_MAGIC, INODE_MAGIC, INVALID_HANDLE, MAX_DATA_BLOCKS, MAX_DIR_ENTRIES,
    MAX_FNAME_SIZE,
};

/// Raw image of a single disk block.
pub type Block = [u8; BLOCK_SIZE];

pub fn magic_of(block: &Block) -> u32 {
    u32::from_le_bytes([block[0], block[1], block[2], block[3]])
}

pub fn is_directory(block: &Block) -> bool {
    magic_of(block) == DIR_MAGIC
}

pub fn is_inode(block: &Block) -> bool {
    magic_of(block) == INODE_MAGIC
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// NUL-terminated, NUL-padded name.
    pub name: [u8; MAX_FNAME_SIZE + 1],
    pub block_num: u32,
}

impl DirEntry {
    pub const FREE: Self = Self {
        name: [0; MAX_FNAME_SIZE + 1],
        block_num: INVALID_HANDLE,
    };

    /// `name` must already be validated against `MAX_FNAME_SIZE`.
    pub fn new(name: &str, block_num: u32) -> Self {
        debug_assert!(name.len() <= MAX_FNAME_SIZE);
        let mut buf = [0; MAX_FNAME_SIZE + 1];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            name: buf,
            block_num,
        }
    }

    pub fn is_free(&self) -> bool {
        self.block_num == INVALID_HANDLE
    }

    /// Name bytes up to the terminating NUL.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    pub fn name_matches(&self, name: &str) -> bool {
        !self.is_free() && self.name_bytes() == name.as_bytes()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirBlock {
    pub magic: u32,
    pub num_entries: u32,
    pub entries: [DirEntry; MAX_DIR_ENTRIES],
}

impl DirBlock {
    pub fn new() -> Self {
        Self {
            magic: DIR_MAGIC,
            num_entries: 0,
            entries: [DirEntry::FREE; MAX_DIR_ENTRIES],
        }
    }

    /// Slot index of the live entry named `name`, if any.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name_matches(name))
    }

    pub fn to_block(&self) -> Block {
        pack(self)
    }

    pub fn from_block(block: &Block) -> Self {
        unpack(block)
    }
}

impl Default for DirBlock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub magic: u32,
    /// Logical file length in bytes.
    pub size: u32,
    pub blocks: [u32; MAX_DATA_BLOCKS],
}

impl Inode {
    pub fn new() -> Self {
        Self {
            magic: INODE_MAGIC,
            size: 0,
            blocks: [INVALID_HANDLE; MAX_DATA_BLOCKS],
        }
    }

    pub fn to_block(&self) -> Block {
        pack(self)
    }

    pub fn from_block(block: &Block) -> Self {
        unpack(block)
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self::new()
    }
}

// Typed blocks are fixed-size and encode to at most BLOCK_SIZE bytes, so
// neither direction can fail on a well-formed image.
fn pack<T: Serialize>(value: &T) -> Block {
    let mut block = [0; BLOCK_SIZE];
    let bytes = bincode::serialize(value).unwrap();
    block[..bytes.len()].copy_from_slice(&bytes);
    block
}

fn unpack<T: for<'de> Deserialize<'de>>(block: &Block) -> T {
    bincode::deserialize(&block[..]).unwrap()
}
