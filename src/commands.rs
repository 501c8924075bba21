use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use fancy_regex::Regex;
use itertools::Itertools;

use crate::runix::disk::Disk;
use crate::runix::fs::{Filesystem, FsError, Whence};
use crate::runix::inode::{FileMode, FileType};
use crate::runix::users::UserError;

pub type Args = Vec<String>;
pub type ExitStatus = u32;

pub const EXIT_SUCCESS: ExitStatus = 0;
pub const EXIT_FAILURE: ExitStatus = 1;
pub const EXIT_ENOENT: ExitStatus = 127;

/// Shell-side session: the configured image location plus the mounted
/// filesystem, if any. `init` opens the image, `format` makes a
/// filesystem on it, everything else needs the mount.
pub struct Session {
  pub image_path: PathBuf,
  pub disk_size: u64,
  pub fs: Option<Filesystem>,
  pub pending_disk: Option<Disk>,
}

impl Session {
  pub fn new(image_path: PathBuf, disk_size: u64) -> Self {
    Self {
      image_path,
      disk_size,
      fs: None,
      pending_disk: None,
    }
  }

  fn require_fs(&mut self, command: &str) -> Option<&mut Filesystem> {
    if self.fs.is_none() {
      println!(
        "{command}: error: {:?}",
        FsError::NotMounted("run 'init' (and 'format' on a fresh image) first")
      );
    }
    self.fs.as_mut()
  }
}

fn human_time(timestamp: i64) -> String {
  DateTime::<Utc>::from_timestamp(timestamp, 0)
    .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_else(|| format!("@{timestamp}"))
}

// System commands

pub fn init(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("init: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      if session.fs.is_some() {
        println!("init: error: {:?}", FsError::AlreadyMounted("a filesystem is already mounted"));
        return EXIT_FAILURE;
      }

      let disk = match Disk::open_or_create(&session.image_path, session.disk_size) {
        Ok(disk) => disk,
        Err(err) => {
          println!("init: cannot open {}: {err:?}", session.image_path.display());
          return EXIT_FAILURE;
        }
      };

      println!(
        "init: disk ready: {} ({} blocks of {} bytes, volume {})",
        session.image_path.display(),
        disk.total_blocks(),
        disk.block_size(),
        disk.volume_id()
      );

      match Filesystem::mount(disk) {
        Ok(fs) => {
          println!(
            "init: mounted filesystem (mount #{}, {} free inodes, {} free blocks)",
            fs.superblock().mount_count,
            fs.superblock().free_inodes,
            fs.superblock().free_blocks
          );
          session.fs = Some(fs);
          EXIT_SUCCESS
        }
        Err(FsError::Corrupted(_)) => {
          // a fresh image has no superblock yet; that is not fatal
          println!("init: no valid filesystem on the image; run 'format' to create one");
          session.pending_disk = Some(
            match Disk::open_or_create(&session.image_path, session.disk_size) {
              Ok(disk) => disk,
              Err(err) => {
                println!("init: cannot reopen image: {err:?}");
                return EXIT_FAILURE;
              }
            },
          );
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("init: mount failed: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn format(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    /// Fill every block with this byte before formatting
    #[clap(short, long)]
    pattern: Option<u8>,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("format: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { pattern }) => {
      // reuse the disk from a mounted session or a pending init
      let mut disk = if let Some(fs) = session.fs.take() {
        fs.into_disk()
      } else if let Some(disk) = session.pending_disk.take() {
        disk
      } else {
        match Disk::open_or_create(&session.image_path, session.disk_size) {
          Ok(disk) => disk,
          Err(err) => {
            println!("format: cannot open {}: {err:?}", session.image_path.display());
            return EXIT_FAILURE;
          }
        }
      };

      if let Some(byte) = pattern {
        println!("format: filling {} blocks with 0x{byte:02x}", disk.total_blocks());
        if let Err(err) = disk.fill(byte) {
          println!("format: fill failed: {err:?}");
          return EXIT_FAILURE;
        }
      }

      match Filesystem::format(disk) {
        Ok(fs) => {
          let superblock = fs.superblock();
          println!("format: filesystem created");
          println!("  total inodes: {} (free: {})", superblock.total_inodes, superblock.free_inodes);
          println!(
            "  data blocks:  {} (free: {})",
            superblock.total_blocks - superblock.data_blocks_start,
            superblock.free_blocks
          );
          session.fs = Some(fs);
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("format: error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn status(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("status: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("status") else {
        return EXIT_FAILURE;
      };

      let superblock = *fs.superblock();
      let disk = fs.disk();
      let stats = disk.stats();

      println!("=== disk ===");
      println!("image:       {}", disk.path().display());
      println!("volume id:   {}", disk.volume_id());
      println!("geometry:    {} blocks x {} bytes = {} bytes", disk.total_blocks(), disk.block_size(), disk.size_bytes());
      println!("dirty:       {}", disk.is_dirty());
      println!("reads:       {} ({} bytes, {} errors, avg {:.6}s)", stats.total_reads, stats.bytes_read, stats.read_errors, stats.avg_read_time);
      println!("writes:      {} ({} bytes, {} errors, avg {:.6}s)", stats.total_writes, stats.bytes_written, stats.write_errors, stats.avg_write_time);
      if stats.last_operation_time > 0 {
        println!("last op:     {}", human_time(stats.last_operation_time));
      }
      println!("last sync:   {}", human_time(disk.last_sync_time()));

      println!("=== filesystem ===");
      println!("magic:       0x{:x} v{}", superblock.magic, superblock.version);
      println!("inodes:      {} total, {} free", superblock.total_inodes, superblock.free_inodes);
      println!(
        "blocks:      {} total, {} in data region, {} free",
        superblock.total_blocks,
        superblock.total_blocks - superblock.data_blocks_start,
        superblock.free_blocks
      );
      println!("layout:      inode table @{} ({} blocks), data @{}", superblock.inode_table_start, superblock.inode_table_blocks, superblock.data_blocks_start);
      println!("mounts:      {} of {}", superblock.mount_count, superblock.max_mount_count);
      println!("created:     {}", human_time(superblock.created_time));
      println!("last mount:  {}", human_time(superblock.last_mount_time));
      println!("last write:  {}", human_time(superblock.last_write_time));
      println!("open files:  {}", fs.open_handles().len());
      println!("user:        {} (uid {})", fs.current_username(), fs.current_uid());

      EXIT_SUCCESS
    }
  }
}

pub fn fsck(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("fsck: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("fsck") else {
        return EXIT_FAILURE;
      };

      match fs.check() {
        Ok(()) => {
          println!("fsck: durable image is consistent");
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("fsck: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn sync(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("sync: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("sync") else {
        return EXIT_FAILURE;
      };

      match fs.sync() {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
          println!("sync: error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

// User management commands

pub fn login(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    username: String,
    password: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("login: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { username, password }) => {
      let Some(fs) = session.require_fs("login") else {
        return EXIT_FAILURE;
      };

      match fs.login(&username, &password) {
        Ok(uid) => {
          println!("login: welcome {username} (uid {uid})");
          EXIT_SUCCESS
        }
        Err(UserError::WrongPassword(_)) => {
          println!("login: wrong password for '{username}'");
          EXIT_FAILURE
        }
        Err(UserError::NotFound(_)) => {
          println!("login: no such user: '{username}'");
          EXIT_ENOENT
        }
        Err(err) => {
          println!("login: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn logout(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("logout: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("logout") else {
        return EXIT_FAILURE;
      };

      match fs.logout() {
        Ok(()) => {
          println!("logout: now anonymous");
          EXIT_SUCCESS
        }
        Err(UserError::NotLoggedIn(_)) => {
          println!("logout: nobody is logged in");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("logout: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn adduser(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    username: String,
    password: String,
    /// Explicit uid; 0 auto-assigns from 1000 upward
    #[clap(default_value_t = 0)]
    uid: u32,
    /// Explicit gid; 0 uses the default group
    #[clap(default_value_t = 0)]
    gid: u32,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("adduser: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { username, password, uid, gid }) => {
      let Some(fs) = session.require_fs("adduser") else {
        return EXIT_FAILURE;
      };

      match fs.create_user(&username, &password, uid, gid) {
        Ok(uid) => {
          println!("adduser: created '{username}' (uid {uid})");
          EXIT_SUCCESS
        }
        Err(UserError::Exists(_)) => {
          println!("adduser: user '{username}' already exists");
          EXIT_FAILURE
        }
        Err(UserError::TableFull(_)) => {
          println!("adduser: user table is full");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("adduser: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn whoami(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("whoami: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("whoami") else {
        return EXIT_FAILURE;
      };

      println!("{}", fs.current_username());
      EXIT_SUCCESS
    }
  }
}

pub fn users(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("users: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("users") else {
        return EXIT_FAILURE;
      };

      println!("uid\tgid\tusername\tcreated");
      for user in fs.list_users() {
        println!(
          "{}\t{}\t{:<12}\t{}",
          user.uid,
          user.gid,
          user.username,
          human_time(user.created_time)
        );
      }
      println!("current user: {} (uid {})", fs.current_username(), fs.current_uid());
      EXIT_SUCCESS
    }
  }
}

pub fn chmod(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
    mode: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("chmod: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd, mode }) => {
      if !Regex::new("^[0-7]{3}$").unwrap().is_match(&mode).unwrap_or(false) {
        println!("chmod: invalid mode: '{mode}' (expected three octal digits)");
        return EXIT_FAILURE;
      }
      let raw = u16::from_str_radix(&mode, 8).expect("chmod: we know the mode is three octal digits");

      let Some(fs) = session.require_fs("chmod") else {
        return EXIT_FAILURE;
      };

      match fs.chmod(fd, FileMode::new(raw)) {
        Ok(()) => {
          println!("chmod: fd {fd} now {}", FileMode::new(raw));
          EXIT_SUCCESS
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("chmod: permission denied (owner or root only)");
          EXIT_FAILURE
        }
        Err(FsError::InvalidParam(_)) => {
          println!("chmod: bad file descriptor: {fd}");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("chmod: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn chown(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
    uid: u32,
    gid: u32,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("chown: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd, uid, gid }) => {
      let Some(fs) = session.require_fs("chown") else {
        return EXIT_FAILURE;
      };

      match fs.chown(fd, uid, gid) {
        Ok(()) => {
          println!("chown: fd {fd} now owned by {uid}:{gid}");
          EXIT_SUCCESS
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("chown: permission denied (root only)");
          EXIT_FAILURE
        }
        Err(FsError::NotFound(_)) => {
          println!("chown: no such user: uid {uid}");
          EXIT_ENOENT
        }
        Err(FsError::InvalidParam(_)) => {
          println!("chown: bad file descriptor: {fd}");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("chown: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

// File operation commands

pub fn create(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    filename: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("create: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { filename }) => {
      let Some(fs) = session.require_fs("create") else {
        return EXIT_FAILURE;
      };

      match fs.create(&filename) {
        Ok(inode_number) => {
          println!("create: '{filename}' (inode {inode_number})");
          EXIT_SUCCESS
        }
        Err(FsError::Exists(_)) => {
          println!("create: '{filename}': file exists");
          EXIT_FAILURE
        }
        Err(FsError::InvalidParam(_)) => {
          println!("create: '{filename}': invalid path (one flat directory level, name under 64 chars)");
          EXIT_FAILURE
        }
        Err(FsError::NoSpace(_)) => {
          println!("create: no space left on device");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("create: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn open(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    filename: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("open: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { filename }) => {
      let Some(fs) = session.require_fs("open") else {
        return EXIT_FAILURE;
      };

      match fs.open(&filename) {
        Ok(fd) => {
          println!("open: '{filename}' -> fd {fd}");
          EXIT_SUCCESS
        }
        Err(FsError::NotFound(_)) => {
          println!("open: '{filename}': no such file or directory");
          EXIT_ENOENT
        }
        Err(FsError::IsDirectory(_)) => {
          println!("open: '{filename}': is a directory");
          EXIT_FAILURE
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("open: '{filename}': permission denied");
          EXIT_FAILURE
        }
        Err(FsError::TooManyOpen(_)) => {
          println!("open: too many open files");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("open: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn close(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("close: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd }) => {
      let Some(fs) = session.require_fs("close") else {
        return EXIT_FAILURE;
      };

      match fs.close(fd) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
          println!("close: bad file descriptor {fd}: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn read(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
    bytes: usize,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("read: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd, bytes }) => {
      let Some(fs) = session.require_fs("read") else {
        return EXIT_FAILURE;
      };

      match fs.read(fd, bytes) {
        Ok(data) => {
          if data.is_empty() {
            println!("read: 0 bytes (end of file)");
          } else {
            println!("read: {} bytes:", data.len());
            println!("{}", String::from_utf8_lossy(&data));
          }
          EXIT_SUCCESS
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("read: permission denied");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("read: error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn write(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
    text: Vec<String>,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("write: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd, text }) => {
      let Some(fs) = session.require_fs("write") else {
        return EXIT_FAILURE;
      };

      let payload = text.iter().join(" ");
      match fs.write(fd, payload.as_bytes()) {
        Ok(written) => {
          // short writes are a normal outcome the caller must notice
          if written < payload.len() {
            println!("write: short write: {written} of {} bytes (disk full?)", payload.len());
          } else {
            println!("write: {written} bytes");
          }
          EXIT_SUCCESS
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("write: permission denied");
          EXIT_FAILURE
        }
        Err(FsError::NoSpace(_)) => {
          println!("write: no space left on device");
          EXIT_FAILURE
        }
        Err(FsError::AddressingLimit(_)) => {
          println!("write: file reached the maximum direct-addressed size");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("write: error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn seek(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
    offset: i64,
    /// set, cur or end
    #[clap(default_value = "set")]
    whence: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("seek: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd, offset, whence }) => {
      let parsed: Whence = match whence.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
          println!("seek: invalid whence: '{whence}' (expected set, cur or end)");
          return EXIT_FAILURE;
        }
      };

      let Some(fs) = session.require_fs("seek") else {
        return EXIT_FAILURE;
      };

      match fs.seek(fd, offset, parsed) {
        Ok(position) => {
          println!("seek: fd {fd} now at {position}");
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("seek: error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn tell(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("tell: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd }) => {
      let Some(fs) = session.require_fs("tell") else {
        return EXIT_FAILURE;
      };

      match fs.tell(fd) {
        Ok(position) => {
          println!("{position}");
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("tell: bad file descriptor {fd}: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn size(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    fd: u32,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("size: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { fd }) => {
      let Some(fs) = session.require_fs("size") else {
        return EXIT_FAILURE;
      };

      match fs.size(fd) {
        Ok(size) => {
          println!("{size}");
          EXIT_SUCCESS
        }
        Err(err) => {
          println!("size: bad file descriptor {fd}: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn rm(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {
    filename: String,
  }

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("rm: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs { filename }) => {
      let Some(fs) = session.require_fs("rm") else {
        return EXIT_FAILURE;
      };

      match fs.delete(&filename) {
        Ok(()) => EXIT_SUCCESS,
        Err(FsError::NotFound(_)) => {
          println!("rm: cannot remove '{filename}': No such file or directory");
          EXIT_ENOENT
        }
        Err(FsError::Busy(_)) => {
          println!("rm: cannot remove '{filename}': file is open");
          EXIT_FAILURE
        }
        Err(FsError::IsDirectory(_)) => {
          println!("rm: cannot remove '{filename}': Is a directory");
          EXIT_FAILURE
        }
        Err(FsError::PermissionDenied(_)) => {
          println!("rm: cannot remove '{filename}': Permission denied");
          EXIT_FAILURE
        }
        Err(err) => {
          println!("rm: unexpected error: {err:?}");
          EXIT_FAILURE
        }
      }
    }
  }
}

pub fn ls(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("ls: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("ls") else {
        return EXIT_FAILURE;
      };

      let entries = match fs.list_root() {
        Ok(entries) => entries,
        Err(err) => {
          println!("ls: error: {err:?}");
          return EXIT_FAILURE;
        }
      };

      for entry in entries {
        let inode = match fs.read_inode(entry.inode_number) {
          Ok(inode) => inode,
          Err(err) => {
            println!("ls: inode {}: {err:?}", entry.inode_number);
            return EXIT_FAILURE;
          }
        };

        let type_char = match FileType::try_from(inode.file_type) {
          Ok(FileType::Directory) => 'd',
          Ok(FileType::Regular) => '-',
          Ok(FileType::Symlink) => 'l',
          Ok(FileType::Special) => 'c',
          Err(()) => '?',
        };

        let owner = fs
          .list_users()
          .iter()
          .find(|user| user.uid == inode.owner_uid)
          .map(|user| user.username.clone())
          .unwrap_or_else(|| format!("{}", inode.owner_uid));

        println!(
          "{}{}\t{}\t{}:{}\t{}\t{}\t{}",
          type_char,
          inode.permissions,
          inode.link_count,
          owner,
          inode.owner_gid,
          inode.file_size,
          human_time(inode.modify_time),
          entry.name()
        );
      }

      EXIT_SUCCESS
    }
  }
}

pub fn lsof(args: Args, session: &mut Session) -> ExitStatus {
  #[derive(Debug, Parser)]
  struct BinArgs {}

  match BinArgs::try_parse_from(args.iter()) {
    Err(message) => {
      println!("lsof: invalid arguments: {message}");
      EXIT_FAILURE
    }
    Ok(BinArgs {}) => {
      let Some(fs) = session.require_fs("lsof") else {
        return EXIT_FAILURE;
      };

      let handles = fs.open_handles();
      if handles.is_empty() {
        println!("lsof: no open files");
        return EXIT_SUCCESS;
      }

      println!("fd\tinode\tpos\trefs\tuid\topened");
      for (fd, handle) in handles {
        println!(
          "{}\t{}\t{}\t{}\t{}\t{}",
          fd,
          handle.inode_number,
          handle.position,
          handle.ref_count,
          handle.owner_uid,
          human_time(handle.open_time)
        );
      }
      EXIT_SUCCESS
    }
  }
}

pub fn help(_args: Args, _session: &mut Session) -> ExitStatus {
  println!("system:");
  println!("  init                         open the disk image and mount");
  println!("  format [--pattern <byte>]    create a fresh filesystem");
  println!("  status                       disk and filesystem state");
  println!("  fsck                         verify the durable image");
  println!("  sync                         flush superblock, bitmaps, data");
  println!("  help                         this text");
  println!("  exit | quit                  sync and leave");
  println!("users:");
  println!("  login <user> <password>      switch user");
  println!("  logout                       drop to anonymous");
  println!("  adduser <user> <pw> [uid] [gid]");
  println!("  whoami                       current user");
  println!("  users                        list accounts");
  println!("  chmod <fd> <octal-mode>      change permission bits");
  println!("  chown <fd> <uid> <gid>       change ownership (root)");
  println!("files:");
  println!("  create <name>                new empty file in /");
  println!("  open <name>                  open, returns fd");
  println!("  close <fd>                   release fd");
  println!("  read <fd> <bytes>            read at the cursor");
  println!("  write <fd> <text...>         write at the cursor");
  println!("  seek <fd> <offset> [whence]  whence: set | cur | end");
  println!("  tell <fd>                    cursor position");
  println!("  size <fd>                    file size");
  println!("  rm <name>                    delete a file");
  println!("  ls                           list the root directory");
  println!("  lsof                         list open file handles");
  EXIT_SUCCESS
}

// vim:ts=2 sw=2
