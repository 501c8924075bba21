//! A Unix-like block filesystem simulated atop a single host file.
//!
//! Layering, bottom to top:
//! 1. disk       - block device over the backing file (header, stats)
//! 2. layout     - pure arithmetic for the on-disk geometry
//! 3. bitmap     - round-robin allocators for inodes and data blocks
//! 4. superblock - filesystem-wide metadata, block 0
//! 5. inode      - fixed-size records in the inode table
//! 6. directory  - the flat root directory's fixed-size entries
//! 7. handle     - the in-memory open-file table
//! 8. users      - accounts and the owner/group/other permission model
//! 9. fileio     - byte-range read/write/seek over direct pointers
//! 10. fs        - the single mutable session tying it all together

pub mod bitmap;
pub mod directory;
pub mod disk;
pub mod fileio;
pub mod fs;
pub mod handle;
pub mod inode;
pub mod layout;
pub mod superblock;
pub mod users;

// vim:ts=2 sw=2
