//! Durable node identity.
//!
//! A node's name is generated once, written to `<data_dir>/name`, and read back
//! on every later start. It is never regenerated while the file exists, because
//! the replicated membership refers to the node by this name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::info;

/// File holding the node name inside the data directory.
pub const NAME_FILE: &str = "name";

/// Length of a generated node name in hex characters.
const NAME_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    name: String,
    path: PathBuf,
}

impl NodeIdentity {
    /// Read the existing name from `dir`, or create and persist a new one.
    pub fn load_or_create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(NAME_FILE);

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let name = contents.trim().to_string();
                if name.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("name file {} is empty", path.display()),
                    ));
                }
                info!("Loaded node name {} from {}", name, path.display());
                Ok(Self { name, path })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let name = Self::generate_name();
                fs::write(&path, &name)?;
                info!("Generated node name {} at {}", name, path.display());
                Ok(Self { name, path })
            }
            Err(e) => Err(e),
        }
    }

    fn generate_name() -> String {
        let value: u32 = rand::rng().random();
        let mut name = format!("{:0width$x}", value, width = NAME_LEN);
        name.truncate(NAME_LEN);
        name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        for _ in 0..32 {
            let name = NodeIdentity::generate_name();
            assert_eq!(name.len(), NAME_LEN);
            assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_name_created_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();

        let first = NodeIdentity::load_or_create(dir.path()).unwrap();
        assert!(dir.path().join(NAME_FILE).exists());

        let second = NodeIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(first.name(), second.name());
    }

    #[test]
    fn test_existing_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(NAME_FILE), "node-a\n").unwrap();

        let identity = NodeIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(identity.name(), "node-a");
    }

    #[test]
    fn test_empty_name_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(NAME_FILE), "").unwrap();

        let err = NodeIdentity::load_or_create(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
