mod commands;
mod config;
mod runix;
mod util;

use std::io::prelude::*;
use std::path::PathBuf;

use clap::Parser;

use commands::Session;
use config::ShellSchema;

const DEFAULT_DISK_FILE: &str = "filesystem.img";
const DEFAULT_DISK_SIZE_MB: u64 = 32;

/// Interactive shell for a Unix-like filesystem simulated on a single
/// host file.
#[derive(Debug, Parser)]
#[clap(name = "runix", version)]
struct Cli {
  /// Path to the disk image
  #[clap(short, long)]
  disk: Option<String>,

  /// Disk size in MiB when creating a fresh image
  #[clap(short, long)]
  size_mb: Option<u64>,

  /// YAML shell schema (flags override its values)
  #[clap(short, long)]
  config: Option<String>,
}

fn show_welcome() {
  println!("runix - block filesystem simulator");
  println!("type 'help' for commands, 'init' to mount, 'exit' to leave");
  println!();
}

pub fn main() {
  let cli = Cli::parse();

  let mut image_path = PathBuf::from(DEFAULT_DISK_FILE);
  let mut size_mb = DEFAULT_DISK_SIZE_MB;

  if let Some(schema_path) = &cli.config {
    match ShellSchema::load(schema_path) {
      Ok(schema) => {
        image_path = schema.image_path(schema_path);
        size_mb = schema.disk.size_mb;
      }
      Err(message) => {
        println!("{message}");
        std::process::exit(1);
      }
    }
  }

  if let Some(disk) = cli.disk {
    image_path = PathBuf::from(disk);
  }
  if let Some(size) = cli.size_mb {
    size_mb = size;
  }

  let mut session = Session::new(image_path, size_mb * 1024 * 1024);

  show_welcome();

  let mut line = String::new();
  loop {
    let prompt_user = session
      .fs
      .as_ref()
      .map(|fs| fs.current_username())
      .unwrap_or_else(|| String::from("-"));
    print!("{prompt_user}@runix# ");
    std::io::stdout().flush().expect("shell: stdout must be flushable");

    line.clear();
    match std::io::stdin().read_line(&mut line) {
      Ok(0) => break, // EOF
      Ok(_) => {}
      Err(err) => {
        println!("shell: read error: {err}");
        break;
      }
    }

    let args: commands::Args = line.split_whitespace().map(str::to_owned).collect();
    let Some(command) = args.first().cloned() else {
      continue;
    };

    match command.as_str() {
      "exit" | "quit" => break,
      "help" => {
        commands::help(args, &mut session);
      }
      "init" => {
        commands::init(args, &mut session);
      }
      "format" => {
        commands::format(args, &mut session);
      }
      "status" => {
        commands::status(args, &mut session);
      }
      "fsck" => {
        commands::fsck(args, &mut session);
      }
      "sync" => {
        commands::sync(args, &mut session);
      }
      "login" => {
        commands::login(args, &mut session);
      }
      "logout" => {
        commands::logout(args, &mut session);
      }
      "adduser" => {
        commands::adduser(args, &mut session);
      }
      "whoami" => {
        commands::whoami(args, &mut session);
      }
      "users" => {
        commands::users(args, &mut session);
      }
      "chmod" => {
        commands::chmod(args, &mut session);
      }
      "chown" => {
        commands::chown(args, &mut session);
      }
      "create" => {
        commands::create(args, &mut session);
      }
      "open" => {
        commands::open(args, &mut session);
      }
      "close" => {
        commands::close(args, &mut session);
      }
      "read" => {
        commands::read(args, &mut session);
      }
      "write" => {
        commands::write(args, &mut session);
      }
      "seek" => {
        commands::seek(args, &mut session);
      }
      "tell" => {
        commands::tell(args, &mut session);
      }
      "size" => {
        commands::size(args, &mut session);
      }
      "rm" => {
        commands::rm(args, &mut session);
      }
      "ls" => {
        commands::ls(args, &mut session);
      }
      "lsof" => {
        commands::lsof(args, &mut session);
      }
      _ => {
        println!("runix: unknown command: '{command}' (try 'help')");
      }
    }
  }

  // the only durability boundary is sync; make leaving one
  if let Some(fs) = session.fs.take() {
    match fs.unmount() {
      Ok(()) => println!("unmounted, bye"),
      Err(err) => println!("shell: unmount failed: {err:?}"),
    }
  }
}

// vim:ts=2 sw=2
