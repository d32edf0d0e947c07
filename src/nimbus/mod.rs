pub mod device;
pub mod error;
pub mod fs;
pub mod proto;
pub mod types;

pub const BLOCK_SIZE: usize = 128;
pub const NUM_BLOCKS: usize = 1024;
pub const DISK_SIZE: u64 = (NUM_BLOCKS * BLOCK_SIZE) as u64;

pub const MAX_DIR_ENTRIES: usize = 8;
pub const MAX_DATA_BLOCKS: usize = 30;
pub const MAX_FNAME_SIZE: usize = 9;
pub const MAX_FILE_SIZE: usize = MAX_DATA_BLOCKS * BLOCK_SIZE;

pub const DIR_MAGIC: u32 = 0xFFFF_FFFF;
pub const INODE_MAGIC: u32 = 0xFFFF_FFFE;

/// Block handles are block indices; 0 doubles as the null handle since the
/// superblock can never be the target of a directory entry.
pub const INVALID_HANDLE: u32 = 0;
pub const SUPERBLOCK_HANDLE: u32 = 0;
pub const ROOT_DIR_HANDLE: u32 = 1;
