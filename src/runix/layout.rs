//! Static arithmetic mapping logical roles to block numbers. Pure
//! functions only - computed identically at format time and at mount,
//! after which the superblock's persisted values are authoritative.

use super::disk::BLOCK_SIZE;
use super::inode::INODE_SIZE;

/// Superblock lives in logical block 0.
pub const SUPERBLOCK_BLOCK: u32 = 0;
/// Inode bitmap span starts at block 1.
pub const INODE_BITMAP_START: u32 = 1;
/// Data-block bitmap span starts at block 2.
pub const DATA_BITMAP_START: u32 = 2;
/// Maximum span, in blocks, reserved for either bitmap.
pub const BITMAP_BLOCKS: u32 = 4;
/// Inode table starts at block 8; blocks between the bitmaps and here
/// are padding.
pub const INODE_TABLE_START: u32 = 8;

pub const MAX_INODES: u32 = 1024;

pub fn inodes_per_block() -> u32 {
  (BLOCK_SIZE / INODE_SIZE) as u32
}

/// Blocks needed to hold the inode table.
pub fn inode_table_blocks(total_inodes: u32) -> u32 {
  (total_inodes * INODE_SIZE as u32 + BLOCK_SIZE as u32 - 1) / BLOCK_SIZE as u32
}

/// First block of the data region.
pub fn data_blocks_start(total_inodes: u32) -> u32 {
  INODE_TABLE_START + inode_table_blocks(total_inodes)
}

/// (table block, byte offset within it) for an inode number.
pub fn inode_location(inode_table_start: u32, inode_number: u32) -> (u32, usize) {
  let per_block = inodes_per_block();
  let block = inode_table_start + inode_number / per_block;
  let offset = (inode_number % per_block) as usize * INODE_SIZE;
  (block, offset)
}

/// Bytes needed to hold a bit array, rounded up.
pub fn bitmap_bytes(total_bits: u32) -> usize {
  ((total_bits as usize) + 7) / 8
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_geometry() {
    // 1024 inodes * 128 bytes = 128 blocks of table, data region at 136
    assert_eq!(inodes_per_block(), 8);
    assert_eq!(inode_table_blocks(MAX_INODES), 128);
    assert_eq!(data_blocks_start(MAX_INODES), 136);
  }

  #[test]
  fn inode_locations() {
    assert_eq!(inode_location(INODE_TABLE_START, 0), (8, 0));
    assert_eq!(inode_location(INODE_TABLE_START, 1), (8, INODE_SIZE));
    assert_eq!(inode_location(INODE_TABLE_START, 7), (8, 7 * INODE_SIZE));
    assert_eq!(inode_location(INODE_TABLE_START, 8), (9, 0));
    assert_eq!(inode_location(INODE_TABLE_START, 1023), (8 + 127, 7 * INODE_SIZE));
  }

  #[test]
  fn bitmap_sizing() {
    assert_eq!(bitmap_bytes(1024), 128);
    assert_eq!(bitmap_bytes(1), 1);
    assert_eq!(bitmap_bytes(8), 1);
    assert_eq!(bitmap_bytes(9), 2);
  }
}

// vim:ts=2 sw=2
