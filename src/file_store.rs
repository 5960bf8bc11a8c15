use anyhow::Result;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::route::Route;
use crate::route_repository::{RouteRepository, StorageError};
use crate::utils;

const TEMP_FILE_PREFIX: &str = ".tmp-";

/// A folder of named blobs. `replace` writes a temp file next to the target
/// and renames it over, so readers see either the old or the new content.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<BlobStore> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(BlobStore { dir })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with(TEMP_FILE_PREFIX)
            || name.contains(['/', '\\'])
            || name == ".."
        {
            bail!("invalid blob name: {:?}", name);
        }
        Ok(self.dir.join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_of(name)?.is_file())
    }

    pub fn fetch(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_of(name)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn replace(&self, name: &str, data: &[u8]) -> Result<()> {
        let target = self.path_of(name)?;
        let temp = self
            .dir
            .join(format!("{}{}-{}", TEMP_FILE_PREFIX, name, utils::random_token(8)));
        let write = || -> Result<()> {
            let mut file = File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&temp, &target)?;
            Ok(())
        };
        let result = write();
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }

    // Returns whether there was something to remove.
    pub fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path_of(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct FileRouteRepository {
    store: BlobStore,
}

impl FileRouteRepository {
    const FILE_NAME: &'static str = "last_route.json";

    pub fn open<P: AsRef<Path>>(dir: P) -> Result<FileRouteRepository> {
        Ok(FileRouteRepository {
            store: BlobStore::open(dir)?,
        })
    }
}

impl RouteRepository for FileRouteRepository {
    fn save(&mut self, route: &Route) -> Result<(), StorageError> {
        let data = route
            .to_json_bytes()
            .map_err(|e| StorageError::Corrupted(e.to_string()))?;
        self.store
            .replace(Self::FILE_NAME, &data)
            .map_err(StorageError::Unavailable)?;
        info!(
            "[file_store] last route replaced: num_of_points={}",
            route.len()
        );
        Ok(())
    }

    fn fetch_last(&mut self) -> Result<Route, StorageError> {
        match self
            .store
            .fetch(Self::FILE_NAME)
            .map_err(StorageError::Unavailable)?
        {
            None => Ok(Route::new()),
            Some(data) => {
                Route::from_json_bytes(&data).map_err(|e| StorageError::Corrupted(e.to_string()))
            }
        }
    }
}
