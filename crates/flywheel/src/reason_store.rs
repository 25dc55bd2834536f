use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::Error;

/// The keys the reason store accepts; anything else is a programming error.
const VALID_KEYS: [&str; 4] = ["from_repo", "installed_by", "reason", "releasever"];

/// The out-of-band per-package attribute store consulted for reason
/// propagation across upgrades.
///
/// One directory per installed NEVRA, one file per key. Concurrent writers
/// to the same package are not coordinated.
pub struct ReasonStore {
    root: PathBuf,
}

impl ReasonStore {
    /// A store rooted at the given directory; the directory is created on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> ReasonStore {
        ReasonStore { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, nevra: &str, key: &str) -> Result<PathBuf, Error> {
        if !VALID_KEYS.contains(&key) {
            return Err(Error::internal(format!(
                "'{key}' is not a reason store key"
            )));
        }
        Ok(self.root.join(nevra.replace('/', "_")).join(key))
    }

    /// Reads a value; `None` when the package or key has none stored.
    pub fn get_string(&self, nevra: &str, key: &str) -> Result<Option<String>, Error> {
        let path = self.entry(nevra, key)?;
        match fs_err::read_to_string(&path) {
            Ok(value) => Ok(Some(value.trim_end().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::FileInvalid {
                path,
                reason: err.to_string(),
            }),
        }
    }

    /// Writes a value, creating the package's directory as needed.
    pub fn set_string(&self, nevra: &str, key: &str, value: &str) -> Result<(), Error> {
        let path = self.entry(nevra, key)?;
        let dir = path.parent().expect("entry paths always have a parent");
        fs_err::create_dir_all(dir).map_err(|err| Error::FileInvalid {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })?;
        fs_err::write(&path, value).map_err(|err| Error::FileInvalid {
            path,
            reason: err.to_string(),
        })
    }

    /// Drops a single key of a package. Missing entries are fine.
    pub fn remove_string(&self, nevra: &str, key: &str) -> Result<(), Error> {
        let path = self.entry(nevra, key)?;
        match fs_err::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::FileInvalid {
                path,
                reason: err.to_string(),
            }),
        }
    }

    /// Drops everything stored for a package. Missing entries are fine.
    pub fn remove_all(&self, nevra: &str) -> Result<(), Error> {
        let dir = self.root.join(nevra.replace('/', "_"));
        match fs_err::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::FileInvalid {
                path: dir,
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::ReasonStore;
    use crate::Error;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReasonStore::new(dir.path());

        let nevra = "flask-2.0-1.fc100.noarch";
        assert_eq!(store.get_string(nevra, "reason").unwrap(), None);

        store.set_string(nevra, "reason", "user").unwrap();
        store.set_string(nevra, "installed_by", "1000").unwrap();
        assert_eq!(
            store.get_string(nevra, "reason").unwrap().as_deref(),
            Some("user")
        );

        store.remove_string(nevra, "reason").unwrap();
        assert_eq!(store.get_string(nevra, "reason").unwrap(), None);

        store.remove_all(nevra).unwrap();
        assert_eq!(store.get_string(nevra, "installed_by").unwrap(), None);
    }

    #[test]
    fn test_key_namespace_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReasonStore::new(dir.path());
        assert_matches!(
            store.set_string("a-1-1.noarch", "color", "green"),
            Err(Error::Internal(_))
        );
    }
}
