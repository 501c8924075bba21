use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Shell configuration loaded from a YAML schema, e.g.:
///
/// ```yaml
/// disk:
///   image: filesystem.img
///   size_mb: 32
/// ```
///
/// Command-line flags override whatever the schema provides.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ShellSchema {
  pub disk: DiskSchema,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct DiskSchema {
  pub image: String,
  pub size_mb: u64,
}

impl ShellSchema {
  pub fn load(path: &str) -> Result<Self, String> {
    let reader = std::fs::File::open(path)
      .map_err(|err| format!("config: cannot open {path}: {err}"))?;

    let schema: ShellSchema = serde_yaml::from_reader(reader)
      .map_err(|err| format!("config: cannot parse {path}: {err}"))?;

    if schema.disk.size_mb == 0 {
      return Err(format!("config: {path}: disk size_mb must be positive"));
    }

    Ok(schema)
  }

  /// Image path resolved relative to the schema file's directory.
  pub fn image_path(&self, schema_path: &str) -> PathBuf {
    let image = Path::new(&self.disk.image);
    if image.is_absolute() {
      return image.to_owned();
    }
    Path::new(schema_path)
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .join(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_schema() {
    let yaml = "disk:\n  image: filesystem.img\n  size_mb: 32\n";
    let schema: ShellSchema = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(schema.disk.image, "filesystem.img");
    assert_eq!(schema.disk.size_mb, 32);
  }

  #[test]
  fn image_path_is_schema_relative() {
    let schema = ShellSchema {
      disk: DiskSchema {
        image: "fs.img".to_owned(),
        size_mb: 4,
      },
    };
    assert_eq!(
      schema.image_path("/etc/runix/shell.yaml"),
      PathBuf::from("/etc/runix/fs.img")
    );
    assert_eq!(
      schema.image_path("shell.yaml"),
      PathBuf::from("fs.img")
    );
  }
}

// vim:ts=2 sw=2
