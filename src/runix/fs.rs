use std::str::FromStr;

use super::bitmap::Bitmap;
use super::directory::{self, DirEntry};
use super::disk::{Disk, DiskError};
use super::handle::{FileHandle, HandleTable, OPEN_READ, OPEN_WRITE};
use super::inode::{self, FileMode, FileType, Inode};
use super::layout;
use super::superblock::Superblock;
use super::users::{self, Perm, User, UserError, UserTable, ANONYMOUS_UID, ROOT_UID};
use crate::util::unixtime;

pub const DEFAULT_FILE_PERMISSIONS: u16 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
  /// Invalid parameter
  InvalidParam(&'static str),
  /// No space left (inode or block allocation exhausted, recoverable)
  NoSpace(&'static str),
  /// File or directory not found
  NotFound(&'static str),
  /// File already exists
  Exists(&'static str),
  /// Not a directory
  NotDirectory(&'static str),
  /// Is a directory
  IsDirectory(&'static str),
  /// Permission denied
  PermissionDenied(&'static str),
  /// File is currently open
  Busy(&'static str),
  /// Too many open files
  TooManyOpen(&'static str),
  /// I/O error at the filesystem layer
  Io(&'static str),
  /// On-disk structure failed validation
  Corrupted(&'static str),
  /// No filesystem mounted
  NotMounted(&'static str),
  /// A filesystem is already mounted
  AlreadyMounted(&'static str),
  /// Block index past the direct-pointer range
  AddressingLimit(&'static str),
  /// Lower-layer failure, carried unchanged
  Disk(DiskError),
}

impl From<DiskError> for FsError {
  fn from(err: DiskError) -> Self {
    FsError::Disk(err)
  }
}

/// The three standard positioning modes for seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
  Set,
  Cur,
  End,
}

impl FromStr for Whence {
  type Err = FsError;

  fn from_str(raw: &str) -> Result<Self, FsError> {
    match raw {
      "set" | "SET" | "0" => Ok(Whence::Set),
      "cur" | "CUR" | "1" => Ok(Whence::Cur),
      "end" | "END" | "2" => Ok(Whence::End),
      _ => Err(FsError::InvalidParam("seek: whence must be set, cur or end")),
    }
  }
}

/// Accept "/name" and "name", both root-relative. Any further slash is
/// a parse error - there is exactly one directory level.
pub fn parse_path(path: &str) -> Result<&str, FsError> {
  if path.is_empty() {
    return Err(FsError::InvalidParam("path: zero-length path"));
  }

  let name = path.strip_prefix('/').unwrap_or(path);
  if name.is_empty() {
    return Err(FsError::InvalidParam("path: missing file name"));
  }
  if name.contains('/') {
    return Err(FsError::InvalidParam("path: multi-level paths are not supported"));
  }

  Ok(name)
}

/// One mounted filesystem session: the superblock, both bitmaps, the
/// open-file table, the user table and the current user, all owning the
/// backing disk. Every mutating operation takes &mut self, which is the
/// whole concurrency story - single-threaded, synchronous, no locks.
#[derive(Debug)]
pub struct Filesystem {
  pub(super) disk: Disk,
  pub(super) superblock: Superblock,
  pub(super) inode_bitmap: Bitmap,
  pub(super) block_bitmap: Bitmap,
  pub(super) handles: HandleTable,
  pub(super) users: UserTable,
  pub(super) current_uid: u32,
}

impl Filesystem {
  /// Create a fresh filesystem on the disk: superblock, both bitmaps,
  /// root directory, then everything persisted and synced.
  pub fn format(mut disk: Disk) -> Result<Self, FsError> {
    let total_blocks = disk.total_blocks();
    let data_start = layout::data_blocks_start(layout::MAX_INODES);
    if total_blocks <= data_start {
      return Err(FsError::InvalidParam("format: disk too small for the layout"));
    }
    // the data bitmap has a fixed span; larger disks do not fit it
    let bitmap_capacity = layout::BITMAP_BLOCKS as usize * super::disk::BLOCK_SIZE;
    if layout::bitmap_bytes(total_blocks - data_start) > bitmap_capacity {
      return Err(FsError::InvalidParam("format: disk too large for the bitmap span"));
    }

    let mut superblock = Superblock::new(total_blocks);
    superblock.write(&mut disk)?;

    let mut inode_bitmap = Bitmap::new(superblock.total_inodes);
    let mut block_bitmap = Bitmap::new(superblock.total_blocks - superblock.data_blocks_start);

    directory::create_root(&mut disk, &mut superblock, &mut inode_bitmap, &mut block_bitmap)?;

    inode_bitmap.persist(&mut disk, layout::INODE_BITMAP_START, layout::BITMAP_BLOCKS)?;
    block_bitmap.persist(&mut disk, layout::DATA_BITMAP_START, layout::BITMAP_BLOCKS)?;

    // counts now include the root directory; rewrite with a fresh checksum
    superblock.write(&mut disk)?;
    disk.sync()?;

    Ok(Self {
      disk,
      superblock,
      inode_bitmap,
      block_bitmap,
      handles: HandleTable::new(),
      users: UserTable::new(),
      current_uid: ROOT_UID,
    })
  }

  /// Load an existing filesystem. Corruption is fatal to this attempt
  /// only - the backing file is left untouched for reformatting.
  pub fn mount(mut disk: Disk) -> Result<Self, FsError> {
    let mut superblock = Superblock::read(&mut disk)?;

    let inode_bitmap = Bitmap::load(
      &mut disk,
      layout::INODE_BITMAP_START,
      layout::BITMAP_BLOCKS,
      superblock.total_inodes,
    )?;
    let block_bitmap = Bitmap::load(
      &mut disk,
      layout::DATA_BITMAP_START,
      layout::BITMAP_BLOCKS,
      superblock.total_blocks - superblock.data_blocks_start,
    )?;

    // the recomputed counts are authoritative, stored ones self-heal
    superblock.free_inodes = inode_bitmap.free_count();
    superblock.free_blocks = block_bitmap.free_count();
    superblock.mount_count += 1;
    superblock.last_mount_time = unixtime();

    Ok(Self {
      disk,
      superblock,
      inode_bitmap,
      block_bitmap,
      handles: HandleTable::new(),
      users: UserTable::new(),
      current_uid: ROOT_UID,
    })
  }

  /// The only durability boundary: superblock, both bitmaps, fsync.
  pub fn sync(&mut self) -> Result<(), FsError> {
    self.superblock.last_write_time = unixtime();
    self.superblock.write(&mut self.disk)?;
    self
      .inode_bitmap
      .persist(&mut self.disk, layout::INODE_BITMAP_START, layout::BITMAP_BLOCKS)?;
    self
      .block_bitmap
      .persist(&mut self.disk, layout::DATA_BITMAP_START, layout::BITMAP_BLOCKS)?;
    self.disk.sync()?;
    Ok(())
  }

  pub fn unmount(mut self) -> Result<(), FsError> {
    self.sync()?;
    self.disk.close()?;
    Ok(())
  }

  /// Surrender the backing disk, discarding all session state.
  /// Used by the reformat path, which overwrites everything anyway.
  pub fn into_disk(self) -> Disk {
    self.disk
  }

  /// Verify the durable image is self-consistent: valid superblock,
  /// and persisted free counts matching the persisted bitmaps.
  pub fn check(&mut self) -> Result<(), FsError> {
    let on_disk = Superblock::read(&mut self.disk)?;

    let inode_bitmap = Bitmap::load(
      &mut self.disk,
      layout::INODE_BITMAP_START,
      layout::BITMAP_BLOCKS,
      on_disk.total_inodes,
    )?;
    let block_bitmap = Bitmap::load(
      &mut self.disk,
      layout::DATA_BITMAP_START,
      layout::BITMAP_BLOCKS,
      on_disk.total_blocks - on_disk.data_blocks_start,
    )?;

    if on_disk.free_inodes != inode_bitmap.free_count() {
      return Err(FsError::Corrupted("check: inode bitmap disagrees with superblock"));
    }
    if on_disk.free_blocks != block_bitmap.free_count() {
      return Err(FsError::Corrupted("check: block bitmap disagrees with superblock"));
    }

    self.superblock.last_check_time = unixtime();
    Ok(())
  }

  pub(super) fn root_inode(&mut self) -> Result<Inode, FsError> {
    inode::read_inode(&mut self.disk, &self.superblock, self.superblock.root_inode)
  }

  pub(super) fn current_gid(&self) -> u32 {
    self
      .users
      .find_by_uid(self.current_uid)
      .map(|user| user.gid)
      .unwrap_or(ANONYMOUS_UID)
  }

  /// Create an empty regular file owned by the current user.
  pub fn create(&mut self, path: &str) -> Result<u32, FsError> {
    let name = parse_path(path)?;

    let mut root = self.root_inode()?;
    if directory::lookup(&mut self.disk, &root, name)?.is_some() {
      return Err(FsError::Exists("create: file already exists"));
    }

    let inode_number = self
      .inode_bitmap
      .allocate_from(1)
      .ok_or(FsError::NoSpace("create: out of inodes"))?;

    let inode = Inode::new(
      inode_number,
      FileType::Regular,
      FileMode::new(DEFAULT_FILE_PERMISSIONS),
      self.current_uid,
      self.current_gid(),
    );

    if let Err(err) = inode::write_inode(&mut self.disk, &self.superblock, inode_number, &inode) {
      self.inode_bitmap.free(inode_number);
      return Err(err);
    }

    if let Err(err) = directory::insert(
      &mut self.disk,
      &mut self.superblock,
      &mut self.block_bitmap,
      &mut root,
      name,
      inode_number,
      FileType::Regular,
    ) {
      self.inode_bitmap.free(inode_number);
      return Err(err);
    }

    self.superblock.free_inodes = self.inode_bitmap.free_count();
    Ok(inode_number)
  }

  /// Open for read/write; read permission is required up front.
  pub fn open(&mut self, path: &str) -> Result<u32, FsError> {
    let name = parse_path(path)?;

    let root = self.root_inode()?;
    let inode_number = directory::lookup(&mut self.disk, &root, name)?
      .ok_or(FsError::NotFound("open: no such file"))?;

    let mut file_inode = inode::read_inode(&mut self.disk, &self.superblock, inode_number)?;
    if file_inode.is_directory() {
      return Err(FsError::IsDirectory("open: target is a directory"));
    }

    let gid = self.current_gid();
    if !users::check_permission(self.current_uid, gid, &file_inode, Perm::Read) {
      return Err(FsError::PermissionDenied("open: read permission denied"));
    }

    let fd = self
      .handles
      .open(inode_number, OPEN_READ | OPEN_WRITE, self.current_uid)
      .ok_or(FsError::TooManyOpen("open: handle table full"))?;

    file_inode.access_time = unixtime();
    inode::write_inode(&mut self.disk, &self.superblock, inode_number, &file_inode)?;

    Ok(fd)
  }

  pub fn close(&mut self, fd: u32) -> Result<(), FsError> {
    self.handles.close(fd)
  }

  /// Delete a regular file: tombstone its directory entry, drop the
  /// link, free the inode and its blocks once unreferenced.
  pub fn delete(&mut self, path: &str) -> Result<(), FsError> {
    let name = parse_path(path)?;

    let root = self.root_inode()?;
    let inode_number = directory::lookup(&mut self.disk, &root, name)?
      .ok_or(FsError::NotFound("delete: no such file"))?;

    let mut file_inode = inode::read_inode(&mut self.disk, &self.superblock, inode_number)?;
    if file_inode.is_directory() {
      return Err(FsError::IsDirectory("delete: target is a directory"));
    }

    let gid = self.current_gid();
    if !users::check_permission(self.current_uid, gid, &file_inode, Perm::Write) {
      return Err(FsError::PermissionDenied("delete: write permission denied"));
    }

    if self
      .handles
      .open_handles()
      .iter()
      .any(|(_, handle)| handle.inode_number == inode_number)
    {
      return Err(FsError::Busy("delete: file is open"));
    }

    directory::remove(&mut self.disk, &root, name)?;

    file_inode.link_count -= 1;
    if file_inode.link_count == 0 {
      inode::free_inode(
        &mut self.disk,
        &mut self.superblock,
        &mut self.inode_bitmap,
        &mut self.block_bitmap,
        inode_number,
      )?;
    } else {
      file_inode.change_time = unixtime();
      inode::write_inode(&mut self.disk, &self.superblock, inode_number, &file_inode)?;
    }

    Ok(())
  }

  /// Only the owner or the superuser may change permission bits.
  pub fn chmod(&mut self, fd: u32, mode: FileMode) -> Result<(), FsError> {
    let inode_number = self.handles.get(fd)?.inode_number;
    let mut file_inode = inode::read_inode(&mut self.disk, &self.superblock, inode_number)?;

    users::require_owner_or_root(self.current_uid, file_inode.owner_uid)
      .map_err(|_| FsError::PermissionDenied("chmod: not the owner"))?;

    file_inode.permissions = mode;
    file_inode.change_time = unixtime();
    inode::write_inode(&mut self.disk, &self.superblock, inode_number, &file_inode)
  }

  /// Only the superuser may reassign ownership; the target uid must be
  /// a known user.
  pub fn chown(&mut self, fd: u32, new_uid: u32, new_gid: u32) -> Result<(), FsError> {
    let inode_number = self.handles.get(fd)?.inode_number;

    users::require_root(self.current_uid)
      .map_err(|_| FsError::PermissionDenied("chown: superuser only"))?;
    if self.users.find_by_uid(new_uid).is_none() {
      return Err(FsError::NotFound("chown: no such user"));
    }

    let mut file_inode = inode::read_inode(&mut self.disk, &self.superblock, inode_number)?;
    file_inode.owner_uid = new_uid;
    file_inode.owner_gid = new_gid;
    file_inode.change_time = unixtime();
    inode::write_inode(&mut self.disk, &self.superblock, inode_number, &file_inode)
  }

  pub fn stat(&mut self, fd: u32) -> Result<Inode, FsError> {
    let inode_number = self.handles.get(fd)?.inode_number;
    inode::read_inode(&mut self.disk, &self.superblock, inode_number)
  }

  pub fn list_root(&mut self) -> Result<Vec<DirEntry>, FsError> {
    let root = self.root_inode()?;
    directory::read_entries(&mut self.disk, &root)
  }

  pub fn read_inode(&mut self, inode_number: u32) -> Result<Inode, FsError> {
    inode::read_inode(&mut self.disk, &self.superblock, inode_number)
  }

  // User-session passthroughs

  pub fn login(&mut self, username: &str, password: &str) -> Result<u32, UserError> {
    let uid = self.users.login(username, password)?;
    self.current_uid = uid;
    Ok(uid)
  }

  pub fn logout(&mut self) -> Result<(), UserError> {
    if self.current_uid == ANONYMOUS_UID {
      return Err(UserError::NotLoggedIn("logout: nobody is logged in"));
    }
    self.current_uid = ANONYMOUS_UID;
    Ok(())
  }

  pub fn create_user(
    &mut self,
    username: &str,
    password: &str,
    uid: u32,
    gid: u32,
  ) -> Result<u32, UserError> {
    self.users.create_user(username, password, uid, gid)
  }

  pub fn current_uid(&self) -> u32 {
    self.current_uid
  }

  pub fn current_username(&self) -> String {
    self
      .users
      .find_by_uid(self.current_uid)
      .map(|user| user.username.clone())
      .unwrap_or_else(|| format!("uid:{}", self.current_uid))
  }

  pub fn list_users(&self) -> Vec<&User> {
    self.users.users().collect()
  }

  pub fn superblock(&self) -> &Superblock {
    &self.superblock
  }

  pub fn disk(&self) -> &Disk {
    &self.disk
  }

  pub fn open_handles(&self) -> Vec<(u32, FileHandle)> {
    self.handles.open_handles()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runix::disk::BLOCK_SIZE;
  use crate::util::mktemp;

  pub fn testfs(tag: &str) -> Filesystem {
    let path = mktemp(tag);
    let disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
    Filesystem::format(disk).unwrap()
  }

  #[test]
  fn parse_path_rules() {
    assert_eq!(parse_path("/a.txt"), Ok("a.txt"));
    assert_eq!(parse_path("a.txt"), Ok("a.txt"));
    assert!(matches!(parse_path(""), Err(FsError::InvalidParam(_))));
    assert!(matches!(parse_path("/"), Err(FsError::InvalidParam(_))));
    assert!(matches!(parse_path("/a/b"), Err(FsError::InvalidParam(_))));
    assert!(matches!(parse_path("a/b"), Err(FsError::InvalidParam(_))));
  }

  #[test]
  fn format_accounts_for_the_root_directory() {
    let fs = testfs("fs-format");
    let superblock = fs.superblock();

    assert_eq!(superblock.free_inodes, superblock.total_inodes - 1);
    assert_eq!(
      superblock.free_blocks,
      superblock.total_blocks - superblock.data_blocks_start - 1
    );
  }

  #[test]
  fn format_rejects_a_too_small_disk() {
    let path = mktemp("fs-small");
    // data region would start at block 136; 100 blocks cannot hold it
    let disk = Disk::open_or_create(&path, 100 * BLOCK_SIZE as u64).unwrap();
    assert!(matches!(
      Filesystem::format(disk),
      Err(FsError::InvalidParam(_))
    ));
  }

  #[test]
  fn root_directory_contents_after_format() {
    let mut fs = testfs("fs-root");
    let entries = fs.list_root().unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name(), ".");
    assert_eq!(entries[1].name(), "..");
    let root_inode = fs.superblock().root_inode;
    assert!(entries.iter().all(|e| e.inode_number == root_inode));
  }

  #[test]
  fn create_then_open_then_close() {
    let mut fs = testfs("fs-create");

    let inode_number = fs.create("/notes.txt").unwrap();
    assert!(inode_number >= 2); // 0 reserved, 1 is the root

    let created = fs.read_inode(inode_number).unwrap();
    assert!(created.is_regular());
    assert_eq!(created.permissions.raw(), DEFAULT_FILE_PERMISSIONS);
    assert_eq!(created.owner_uid, ROOT_UID);
    assert_eq!(created.file_size, 0);

    assert!(matches!(
      fs.create("/notes.txt"),
      Err(FsError::Exists(_))
    ));

    let fd = fs.open("/notes.txt").unwrap();
    fs.close(fd).unwrap();
    assert!(matches!(fs.close(fd), Err(FsError::InvalidParam(_))));
  }

  #[test]
  fn open_missing_file_is_not_found() {
    let mut fs = testfs("fs-missing");
    assert!(matches!(fs.open("/ghost"), Err(FsError::NotFound(_))));
  }

  #[test]
  fn create_updates_free_inode_count() {
    let mut fs = testfs("fs-counts");
    let before = fs.superblock().free_inodes;

    fs.create("/one").unwrap();
    fs.create("/two").unwrap();

    assert_eq!(fs.superblock().free_inodes, before - 2);
  }

  #[test]
  fn delete_releases_everything() {
    let mut fs = testfs("fs-delete");

    let free_inodes = fs.superblock().free_inodes;
    let free_blocks = fs.superblock().free_blocks;

    fs.create("/victim").unwrap();
    let fd = fs.open("/victim").unwrap();
    fs.write(fd, b"some bytes that take a block").unwrap();

    // open files cannot be deleted
    assert!(matches!(fs.delete("/victim"), Err(FsError::Busy(_))));
    fs.close(fd).unwrap();

    fs.delete("/victim").unwrap();
    assert!(matches!(fs.open("/victim"), Err(FsError::NotFound(_))));
    assert_eq!(fs.superblock().free_inodes, free_inodes);
    assert_eq!(fs.superblock().free_blocks, free_blocks);

    assert!(matches!(fs.delete("/victim"), Err(FsError::NotFound(_))));
  }

  #[test]
  fn chmod_is_owner_or_root_only() {
    let mut fs = testfs("fs-chmod");
    fs.create_user("alice", "pw", 0, 0).unwrap();
    fs.create_user("bob", "pw", 0, 0).unwrap();

    fs.login("alice", "pw").unwrap();
    fs.create("/mine").unwrap();
    let fd = fs.open("/mine").unwrap();
    fs.chmod(fd, FileMode::new(0o600)).unwrap();
    assert_eq!(fs.stat(fd).unwrap().permissions.raw(), 0o600);
    fs.close(fd).unwrap();

    // bob cannot touch alice's bits, but can hold a handle on a
    // world-readable file
    fs.login("alice", "pw").unwrap();
    let fd = fs.open("/mine").unwrap();
    fs.chmod(fd, FileMode::new(0o644)).unwrap();
    fs.close(fd).unwrap();

    fs.login("bob", "pw").unwrap();
    let fd = fs.open("/mine").unwrap();
    assert!(matches!(
      fs.chmod(fd, FileMode::new(0o777)),
      Err(FsError::PermissionDenied(_))
    ));

    // the superuser always may
    fs.login("root", "root123").unwrap();
    fs.chmod(fd, FileMode::new(0o640)).unwrap();
    assert_eq!(fs.stat(fd).unwrap().permissions.raw(), 0o640);
  }

  #[test]
  fn chown_is_root_only_and_validates_target() {
    let mut fs = testfs("fs-chown");
    let alice_uid = fs.create_user("alice", "pw", 0, 0).unwrap();

    fs.create("/file").unwrap();
    let fd = fs.open("/file").unwrap();

    fs.chown(fd, alice_uid, 1000).unwrap();
    let stat = fs.stat(fd).unwrap();
    assert_eq!(stat.owner_uid, alice_uid);
    assert_eq!(stat.owner_gid, 1000);

    assert!(matches!(
      fs.chown(fd, 7777, 7777),
      Err(FsError::NotFound(_))
    ));

    fs.login("alice", "pw").unwrap();
    assert!(matches!(
      fs.chown(fd, ROOT_UID, users::ROOT_GID),
      Err(FsError::PermissionDenied(_))
    ));
  }

  #[test]
  fn open_respects_read_permission() {
    let mut fs = testfs("fs-perms");
    fs.create_user("alice", "pw", 0, 0).unwrap();
    fs.create_user("bob", "pw", 0, 0).unwrap();

    fs.login("alice", "pw").unwrap();
    fs.create("/secret").unwrap();
    let fd = fs.open("/secret").unwrap();
    fs.chmod(fd, FileMode::new(0o600)).unwrap();
    fs.close(fd).unwrap();

    // a user with no owner/group/other read bit is refused
    fs.login("bob", "pw").unwrap();
    assert!(matches!(
      fs.open("/secret"),
      Err(FsError::PermissionDenied(_))
    ));

    // the owner and the superuser get through
    fs.login("alice", "pw").unwrap();
    let fd = fs.open("/secret").unwrap();
    fs.close(fd).unwrap();

    fs.login("root", "root123").unwrap();
    let fd = fs.open("/secret").unwrap();
    fs.close(fd).unwrap();
  }

  #[test]
  fn too_many_open_files() {
    let mut fs = testfs("fs-toomany");
    fs.create("/f").unwrap();

    let mut fds = Vec::new();
    for _ in 0..crate::runix::handle::MAX_OPEN_FILES {
      fds.push(fs.open("/f").unwrap());
    }
    assert!(matches!(fs.open("/f"), Err(FsError::TooManyOpen(_))));

    for fd in fds {
      fs.close(fd).unwrap();
    }
  }

  #[test]
  fn login_logout_cycle() {
    let mut fs = testfs("fs-login");
    assert_eq!(fs.current_uid(), ROOT_UID);
    assert_eq!(fs.current_username(), "root");

    assert!(matches!(
      fs.login("root", "nope"),
      Err(UserError::WrongPassword(_))
    ));
    assert_eq!(fs.current_uid(), ROOT_UID);

    fs.logout().unwrap();
    assert_eq!(fs.current_uid(), ANONYMOUS_UID);
    assert!(matches!(fs.logout(), Err(UserError::NotLoggedIn(_))));

    fs.login("root", "root123").unwrap();
    assert_eq!(fs.current_uid(), ROOT_UID);
  }

  #[test]
  fn check_passes_on_a_synced_image() {
    let mut fs = testfs("fs-check");
    fs.create("/a").unwrap();
    fs.sync().unwrap();
    fs.check().unwrap();
  }

  #[test]
  fn remount_recovers_persisted_state() {
    let path = mktemp("fs-remount");

    {
      let disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
      let mut fs = Filesystem::format(disk).unwrap();
      fs.create("/persisted").unwrap();
      let fd = fs.open("/persisted").unwrap();
      fs.write(fd, b"still here after remount").unwrap();
      fs.close(fd).unwrap();
      fs.unmount().unwrap();
    }

    let disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
    let mut fs = Filesystem::mount(disk).unwrap();

    assert_eq!(fs.superblock().mount_count, 1);
    assert_eq!(fs.superblock().free_inodes, fs.superblock().total_inodes - 2);

    let fd = fs.open("/persisted").unwrap();
    assert_eq!(fs.read(fd, 1024).unwrap(), b"still here after remount");
    fs.close(fd).unwrap();
  }

  #[test]
  fn mount_rejects_an_unformatted_disk() {
    let path = mktemp("fs-unformatted");
    let mut disk = Disk::open_or_create(&path, 200 * BLOCK_SIZE as u64).unwrap();
    // an all-zero block 0 has neither magic nor checksum
    disk.zero_block(0).unwrap();

    assert!(matches!(
      Filesystem::mount(disk),
      Err(FsError::Corrupted(_))
    ));
  }
}

// vim:ts=2 sw=2
