//! A tiny single-user networked file system.
//!
//! The on-disk format is a fixed-size array of 128-byte blocks persisted in
//! one host file: block 0 holds the allocation bitmap, block 1 the root
//! directory, and every other block is a directory, an inode, or file data.
//! A text protocol over TCP exposes the flat POSIX-like operations (`mkdir`,
//! `cd`, `ls`, `create`, `append`, `cat`, `head`, `rm`, `rmdir`, `stat`) to a
//! single remote client.

pub mod mkfs;
pub mod nimbus;
pub mod server;
pub mod shell;
