use std::path::Path;

use super::device::{self, Disk};
use super::error::{FsError, Result};
use super::types::{self, Block, DirBlock, DirEntry, Inode};
use super::{
    BLOCK_SIZE, INVALID_HANDLE, MAX_DIR_ENTRIES, MAX_FILE_SIZE, MAX_FNAME_SIZE, ROOT_DIR_HANDLE,
};

/// The file system core: a mounted disk plus the current-directory cursor.
/// All name lookups are single-component within the current directory.
#[derive(Debug)]
pub struct FileSys {
    disk: Disk,
    cur_dir: u32,
}

impl FileSys {
    pub fn mount<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::attach(Disk::open(path)?))
    }

    pub fn attach(disk: Disk) -> Self {
        Self {
            disk,
            cur_dir: ROOT_DIR_HANDLE,
        }
    }

    pub fn unmount(self) {
        self.disk.flush();
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn disk_mut(&mut self) -> &mut Disk {
        &mut self.disk
    }

    pub fn cur_dir(&self) -> u32 {
        self.cur_dir
    }

    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        self.make_block(name, DirBlock::new().to_block())
    }

    pub fn create(&mut self, name: &str) -> Result<()> {
        self.make_block(name, Inode::new().to_block())
    }

    // Shared mkdir/create path. The new block is reserved before the name
    // checks run and handed back if the insert fails, so an exhausted
    // allocator wins over any insert error.
    fn make_block(&mut self, name: &str, block: Block) -> Result<()> {
        let mut cur = self.read_dir(self.cur_dir)?;

        let handle = self.disk.get_free_block();
        if handle == INVALID_HANDLE {
            eprintln!("Disk is full when creating \"{name}\"");
            return Err(FsError::DiskFull);
        }

        match insert_into_directory(&mut cur, handle, name) {
            Ok(()) => {
                self.disk.write_block(handle, &block);
                self.disk.write_block(self.cur_dir, &cur.to_block());
                Ok(())
            }
            Err(err) => {
                self.disk.reclaim_block(handle);
                Err(err)
            }
        }
    }

    /// Descends into a subdirectory of the current directory. Refuses to move
    /// the cursor onto a regular file.
    pub fn cd(&mut self, name: &str) -> Result<()> {
        let cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let target = cur.entries[slot].block_num;

        if !types::is_directory(&self.disk.read_block(target)) {
            return Err(FsError::FileNotDir);
        }
        self.cur_dir = target;
        Ok(())
    }

    /// Resets the cursor to the root directory. There are no parent pointers;
    /// this is the only way back up.
    pub fn home(&mut self) {
        self.cur_dir = ROOT_DIR_HANDLE;
    }

    pub fn rmdir(&mut self, name: &str) -> Result<()> {
        let mut cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let target = cur.entries[slot].block_num;

        let dir = self.read_dir(target)?;
        if dir.num_entries != 0 {
            return Err(FsError::DirNotEmpty);
        }

        self.disk.reclaim_block(target);
        cur.entries[slot] = DirEntry::FREE;
        cur.num_entries -= 1;
        self.disk.write_block(self.cur_dir, &cur.to_block());
        Ok(())
    }

    /// Lists the current directory in slot order, one name per line with a
    /// `/` suffix on directories, terminated by an extra newline.
    pub fn ls(&self) -> Result<String> {
        let cur = self.read_dir(self.cur_dir)?;
        let mut out = String::new();
        for entry in cur.entries.iter().filter(|e| !e.is_free()) {
            out.push_str(&String::from_utf8_lossy(entry.name_bytes()));
            if types::is_directory(&self.disk.read_block(entry.block_num)) {
                out.push('/');
            }
            out.push('\n');
        }
        out.push('\n');
        Ok(out)
    }

    /// Appends `data` to a file, all-or-nothing: every block the write needs
    /// is reserved up front, and on exhaustion the reservations are returned
    /// with the disk bit-identical to its pre-call state.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let inode_handle = cur.entries[slot].block_num;
        let mut inode = self.read_inode(inode_handle)?;

        let size = inode.size as usize;
        if data.len() > MAX_FILE_SIZE - size {
            return Err(FsError::AppendExceedsMaxSize);
        }

        // Blocks this write needs beyond what the file already owns: full
        // blocks past the tail of the current one, plus the working block
        // itself when it has never been allocated.
        let free_in_current = BLOCK_SIZE - size % BLOCK_SIZE;
        let alloc_size = data.len().saturating_sub(free_in_current);
        let mut needed = alloc_size / BLOCK_SIZE;
        if alloc_size % BLOCK_SIZE != 0 {
            needed += 1;
        }
        if inode.blocks[size / BLOCK_SIZE] == INVALID_HANDLE {
            needed += 1;
        }

        let mut handles = Vec::with_capacity(needed);
        for _ in 0..needed {
            let handle = self.disk.get_free_block();
            if handle == INVALID_HANDLE {
                eprintln!("Disk is full when appending to \"{name}\"");
                for handle in handles {
                    self.disk.reclaim_block(handle);
                }
                return Err(FsError::DiskFull);
            }
            handles.push(handle);
        }

        // Land each reservation in a formerly-free slot contiguous with the
        // existing data.
        let mut fresh = handles.into_iter();
        for ptr in inode.blocks[size / BLOCK_SIZE..].iter_mut() {
            if *ptr == INVALID_HANDLE {
                match fresh.next() {
                    Some(handle) => *ptr = handle,
                    None => break,
                }
            }
        }

        let mut copied = 0;
        while copied < data.len() {
            let handle = inode.blocks[inode.size as usize / BLOCK_SIZE];
            let mut block = self.disk.read_block(handle);
            let offset = inode.size as usize % BLOCK_SIZE;
            let n = (BLOCK_SIZE - offset).min(data.len() - copied);
            block[offset..offset + n].copy_from_slice(&data[copied..copied + n]);
            self.disk.write_block(handle, &block);
            inode.size += n as u32;
            copied += n;
        }
        self.disk.write_block(inode_handle, &inode.to_block());
        Ok(())
    }

    pub fn cat(&self, name: &str) -> Result<Vec<u8>> {
        self.head(name, MAX_FILE_SIZE)
    }

    /// First `n` bytes of a file followed by a newline. An empty file yields
    /// an empty body with no newline.
    pub fn head(&self, name: &str, n: usize) -> Result<Vec<u8>> {
        let cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let inode = self.read_inode(cur.entries[slot].block_num)?;

        if inode.size == 0 {
            return Ok(Vec::new());
        }

        let want = n.min(inode.size as usize);
        let mut out = Vec::with_capacity(want + 1);
        for i in 0..(want + BLOCK_SIZE - 1) / BLOCK_SIZE {
            let block = self.disk.read_block(inode.blocks[i]);
            let take = (want - out.len()).min(BLOCK_SIZE);
            out.extend_from_slice(&block[..take]);
        }
        out.push(b'\n');
        Ok(out)
    }

    pub fn rm(&mut self, name: &str) -> Result<()> {
        let mut cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let inode_handle = cur.entries[slot].block_num;
        let inode = self.read_inode(inode_handle)?;

        let used = (inode.size as usize + BLOCK_SIZE - 1) / BLOCK_SIZE;
        for i in 0..used {
            self.disk.reclaim_block(inode.blocks[i]);
        }
        self.disk.reclaim_block(inode_handle);

        cur.entries[slot] = DirEntry::FREE;
        cur.num_entries -= 1;
        self.disk.write_block(self.cur_dir, &cur.to_block());
        Ok(())
    }

    pub fn stat(&self, name: &str) -> Result<String> {
        let cur = self.read_dir(self.cur_dir)?;
        let slot = cur.find(name).ok_or(FsError::FileNotExists)?;
        let entry = &cur.entries[slot];

        let raw = self.disk.read_block(entry.block_num);
        let mut out = String::new();
        if types::is_directory(&raw) {
            out.push_str(&format!("Directory name: {name}/\n"));
            out.push_str(&format!("Directory block: {}\n", entry.block_num));
        } else {
            let inode = Inode::from_block(&raw);
            out.push_str(&format!("iNode block: {}\n", entry.block_num));
            out.push_str(&format!("Bytes in files: {}\n", inode.size));
            // The block count includes the inode block itself; clients parse
            // this text, so the formula is load-bearing.
            let blocks = if inode.size == 0 {
                1
            } else {
                inode.size as usize / BLOCK_SIZE + 2
            };
            out.push_str(&format!("Number of blocks: {blocks}\n"));
            let first = if inode.size == 0 {
                "N/A".to_string()
            } else {
                inode.blocks[0].to_string()
            };
            out.push_str(&format!("First block: {first}\n"));
        }
        Ok(out)
    }

    fn read_dir(&self, handle: u32) -> Result<DirBlock> {
        let raw = self.disk.read_block(handle);
        if !types::is_directory(&raw) {
            return Err(FsError::FileNotDir);
        }
        Ok(DirBlock::from_block(&raw))
    }

    fn read_inode(&self, handle: u32) -> Result<Inode> {
        let raw = self.disk.read_block(handle);
        if !types::is_inode(&raw) {
            return Err(FsError::FileIsDir);
        }
        Ok(Inode::from_block(&raw))
    }
}

// The checks run in a fixed order: duplicate name, directory capacity, name
// length.
fn insert_into_directory(dir: &mut DirBlock, handle: u32, name: &str) -> Result<()> {
    if dir.find(name).is_some() {
        return Err(FsError::FileExists);
    }
    if dir.num_entries as usize >= MAX_DIR_ENTRIES {
        return Err(FsError::DirFull);
    }
    if name.len() > MAX_FNAME_SIZE {
        return Err(FsError::FileNameTooLong);
    }

    match dir.entries.iter_mut().find(|e| e.is_free()) {
        Some(slot) => {
            *slot = DirEntry::new(name, handle);
            dir.num_entries += 1;
            Ok(())
        }
        // num_entries disagrees with the slot table; the image is corrupt.
        None => device::fatal("directory entry count does not match its slot table"),
    }
}
