use crate::config::Config;
use crate::error::{DfsUtilError, Result};
use crate::fs::namespace::Namespace;
use crate::fs::FileSystem;
use crate::io::{FsInputStream, FsOutputStream};
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::status::FileStatus;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

/// A filesystem that lives entirely in process memory.
///
/// Cloning is cheap and every clone shares the same namespace.
#[derive(Clone)]
pub struct MemoryFileSystem {
    namespace: Arc<RwLock<Namespace>>,
}

impl MemoryFileSystem {
    pub fn new(config: &Config) -> Self {
        Self::with_owner(&config.client.user, &config.client.default_group)
    }

    pub fn with_owner(user: &str, group: &str) -> Self {
        Self {
            namespace: Arc::new(RwLock::new(Namespace::new(user, group))),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Namespace>> {
        read_namespace(&self.namespace)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Namespace>> {
        write_namespace(&self.namespace)
    }
}

fn read_namespace(namespace: &RwLock<Namespace>) -> Result<RwLockReadGuard<'_, Namespace>> {
    namespace
        .read()
        .map_err(|_| DfsUtilError::FSError("Namespace lock poisoned".to_owned()))
}

fn write_namespace(namespace: &RwLock<Namespace>) -> Result<RwLockWriteGuard<'_, Namespace>> {
    namespace
        .write()
        .map_err(|_| DfsUtilError::FSError("Namespace lock poisoned".to_owned()))
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn scheme(&self) -> &'static str {
        "memory"
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<bool> {
        self.write()?.mkdirs(path)?;
        Ok(true)
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<bool> {
        self.write()?.delete(path, recursive)
    }

    async fn exists(&self, path: &DfsPath) -> Result<bool> {
        Ok(self.read()?.exists(path))
    }

    async fn file_status(&self, path: &DfsPath) -> Result<FileStatus> {
        self.read()?.status(path)
    }

    async fn list_status(&self, path: &DfsPath) -> Result<Vec<FileStatus>> {
        self.read()?.list(path)
    }

    async fn create(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn FsOutputStream>> {
        self.write()?.create_file(path, overwrite)?;
        Ok(Box::new(MemoryOutputStream::new(
            Arc::clone(&self.namespace),
            path.clone(),
        )))
    }

    async fn append(&self, path: &DfsPath) -> Result<Box<dyn FsOutputStream>> {
        self.read()?.check_file(path)?;
        Ok(Box::new(MemoryOutputStream::new(
            Arc::clone(&self.namespace),
            path.clone(),
        )))
    }

    async fn open(&self, path: &DfsPath) -> Result<Box<dyn FsInputStream>> {
        let content = self.read()?.read_file(path)?;
        Ok(Box::new(MemoryInputStream {
            content,
            position: 0,
        }))
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<bool> {
        self.write()?.rename(src, dst)
    }

    async fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> Result<()> {
        self.write()?.set_permission(path, permission)
    }

    async fn set_owner(
        &self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        self.write()?.set_owner(path, owner, group)
    }
}

/// Buffers written bytes and appends them to the file on every flush.
struct MemoryOutputStream {
    namespace: Arc<RwLock<Namespace>>,
    path: DfsPath,
    buffer: Vec<u8>,
}

impl MemoryOutputStream {
    fn new(namespace: Arc<RwLock<Namespace>>, path: DfsPath) -> Self {
        Self {
            namespace,
            path,
            buffer: vec![],
        }
    }
}

#[async_trait]
impl FsOutputStream for MemoryOutputStream {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            write_namespace(&self.namespace)?.append_to_file(&self.path, &self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.flush().await
    }
}

struct MemoryInputStream {
    content: Vec<u8>,
    position: usize,
}

#[async_trait]
impl FsInputStream for MemoryInputStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = &self.content[self.position..];
        let read = std::cmp::min(remaining.len(), buf.len());
        buf[..read].copy_from_slice(&remaining[..read]);
        self.position += read;
        Ok(read)
    }
}
