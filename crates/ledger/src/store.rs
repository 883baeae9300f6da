use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::Error;

#[derive(serde::Deserialize)]
struct Envelope<T> {
    version: u64,
    data: T,
}

#[derive(serde::Serialize)]
struct EnvelopeRef<'a, T> {
    version: u64,
    data: &'a T,
}

/// A JSON document on disk with optimistic concurrency.
///
/// `load` returns the value together with the version it was read at;
/// `commit` refuses to write if the on-disk version has moved since, so
/// overlapping read-modify-write cycles (duplicate webhook deliveries,
/// concurrent gateway instances sharing a volume) surface as
/// [`Error::Conflict`] instead of lost updates. Writes go through a temp
/// file in the same directory and an atomic rename.
pub struct VersionedStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> VersionedStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<(T, u64), Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
                Ok((envelope.data, envelope.version))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok((T::default(), 0)),
            Err(err) => Err(err.into()),
        }
    }

    pub fn commit(&self, data: &T, read_version: u64) -> Result<u64, Error> {
        let current = self.current_version()?;
        if current != read_version {
            return Err(Error::Conflict {
                path: self.path.display().to_string(),
                expected: read_version,
            });
        }

        let next = read_version + 1;
        let envelope = EnvelopeRef {
            version: next,
            data,
        };
        let json = serde_json::to_vec_pretty(&envelope)?;

        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "store path has no parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        std::fs::write(temp.path(), &json)?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        Ok(next)
    }

    /// Read-modify-write with bounded retries on version conflicts.
    pub fn update<R>(
        &self,
        max_attempts: u32,
        mut apply: impl FnMut(&mut T) -> R,
    ) -> Result<R, Error> {
        for _ in 0..max_attempts {
            let (mut data, version) = self.load()?;
            let out = apply(&mut data);
            match self.commit(&data, version) {
                Ok(_) => return Ok(out),
                Err(Error::Conflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::Contention {
            path: self.path.display().to_string(),
            attempts: max_attempts,
        })
    }

    fn current_version(&self) -> Result<u64, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&bytes)?;
                Ok(envelope.version)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}
