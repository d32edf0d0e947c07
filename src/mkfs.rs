use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;

use crate::nimbus::device::Disk;
use crate::nimbus::DISK_SIZE;

/// Creates and formats a fresh disk image. Refuses to touch an existing file.
pub fn make<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("could not create disk image {}", path.display()))?;
    file.set_len(DISK_SIZE)?;
    drop(file);

    let disk = Disk::open(path)?;
    println!(
        "Created {} ({} bytes, {} free blocks)",
        path.display(),
        DISK_SIZE,
        disk.free_blocks()
    );
    Ok(())
}
