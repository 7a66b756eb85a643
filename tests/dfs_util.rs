use dfsutil::config::{self, Config};
use dfsutil::error::{DfsUtilError, Result};
use dfsutil::fs::{FileSystem, MemoryFileSystem};
use dfsutil::io::{FsInputStream, FsOutputStream};
use dfsutil::path::DfsPath;
use dfsutil::permission::FsPermission;
use dfsutil::status::{ContentSummary, FileStatus};
use dfsutil::DfsUtil;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// Forwards to a memory filesystem and records every primitive call.
struct RecordingFileSystem {
    inner: MemoryFileSystem,
    calls: Arc<Mutex<Vec<String>>>,
    failure: Option<DfsUtilError>,
}

impl RecordingFileSystem {
    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match &self.failure {
            Some(err) => Err(DfsUtilError::FSError(err.to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FileSystem for RecordingFileSystem {
    fn scheme(&self) -> &'static str {
        "recording"
    }

    async fn mkdirs(&self, path: &DfsPath) -> Result<bool> {
        self.record(format!("mkdirs {}", path))?;
        self.inner.mkdirs(path).await
    }

    async fn delete(&self, path: &DfsPath, recursive: bool) -> Result<bool> {
        self.record(format!("delete {} {}", path, recursive))?;
        self.inner.delete(path, recursive).await
    }

    async fn exists(&self, path: &DfsPath) -> Result<bool> {
        self.record(format!("exists {}", path))?;
        self.inner.exists(path).await
    }

    async fn file_status(&self, path: &DfsPath) -> Result<FileStatus> {
        self.record(format!("file_status {}", path))?;
        self.inner.file_status(path).await
    }

    async fn list_status(&self, path: &DfsPath) -> Result<Vec<FileStatus>> {
        self.record(format!("list_status {}", path))?;
        self.inner.list_status(path).await
    }

    async fn create(&self, path: &DfsPath, overwrite: bool) -> Result<Box<dyn FsOutputStream>> {
        self.record(format!("create {} {}", path, overwrite))?;
        self.inner.create(path, overwrite).await
    }

    async fn append(&self, path: &DfsPath) -> Result<Box<dyn FsOutputStream>> {
        self.record(format!("append {}", path))?;
        self.inner.append(path).await
    }

    async fn open(&self, path: &DfsPath) -> Result<Box<dyn FsInputStream>> {
        self.record(format!("open {}", path))?;
        self.inner.open(path).await
    }

    async fn rename(&self, src: &DfsPath, dst: &DfsPath) -> Result<bool> {
        self.record(format!("rename {} {}", src, dst))?;
        self.inner.rename(src, dst).await
    }

    async fn set_permission(&self, path: &DfsPath, permission: FsPermission) -> Result<()> {
        self.record(format!("set_permission {} {:o}", path, permission.mode()))?;
        self.inner.set_permission(path, permission).await
    }

    async fn set_owner(
        &self,
        path: &DfsPath,
        owner: Option<&str>,
        group: Option<&str>,
    ) -> Result<()> {
        self.record(format!("set_owner {} {:?} {:?}", path, owner, group))?;
        self.inner.set_owner(path, owner, group).await
    }

    async fn content_summary(&self, path: &DfsPath) -> Result<ContentSummary> {
        self.record(format!("content_summary {}", path))?;
        self.inner.content_summary(path).await
    }

    async fn close(&self) -> Result<()> {
        self.record("close".to_owned())
    }
}

struct Fixture {
    util: DfsUtil,
    inner: MemoryFileSystem,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(test_config())
    }

    fn with_config(config: Config) -> Self {
        let inner = MemoryFileSystem::with_owner("hdfs", "supergroup");
        let calls = Arc::new(Mutex::new(vec![]));
        let fs = RecordingFileSystem {
            inner: inner.clone(),
            calls: Arc::clone(&calls),
            failure: None,
        };
        Self {
            util: DfsUtil::with_filesystem(Box::new(fs), config),
            inner,
            calls,
        }
    }

    fn failing(err: DfsUtilError) -> Self {
        let inner = MemoryFileSystem::with_owner("hdfs", "supergroup");
        let calls = Arc::new(Mutex::new(vec![]));
        let fs = RecordingFileSystem {
            inner: inner.clone(),
            calls: Arc::clone(&calls),
            failure: Some(err),
        };
        Self {
            util: DfsUtil::with_filesystem(Box::new(fs), test_config()),
            inner,
            calls,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn write(&self, file: &str, content: &str) {
        let mut out = self
            .inner
            .create(&DfsPath::new(file).unwrap(), true)
            .await
            .unwrap();
        out.write(content.as_bytes()).await.unwrap();
        out.shutdown().await.unwrap();
    }
}

fn test_config() -> Config {
    Config {
        filesystem: config::FileSystem::Memory {},
        dfs: config::Dfs::default(),
        client: config::Client {
            user: String::from("hdfs"),
            default_group: String::from("supergroup"),
            buffer_size: 10,
        },
    }
}

#[tokio::test]
async fn mkdir_forwards_the_normalized_path() -> Result<()> {
    let fixture = Fixture::new();

    assert!(fixture.util.mkdir("/data//xuzhengchuang/").await?);
    assert_eq!(fixture.calls(), vec!["mkdirs /data/xuzhengchuang"]);
    assert!(fixture.util.check("/data/xuzhengchuang").await?);

    Ok(())
}

#[tokio::test]
async fn clear_dir_deletes_recursively() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/data/xuz/word.txt", "x").await;

    assert!(fixture.util.clear_dir("/data").await?);
    assert_eq!(fixture.calls(), vec!["delete /data true"]);
    assert!(!fixture.util.clear_dir("/data").await?);

    Ok(())
}

#[tokio::test]
async fn change_permission_parses_the_mode() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/data/word.txt", "x").await;

    fixture
        .util
        .change_permission("/data/word.txt", "744")
        .await?;
    fixture
        .util
        .change_permission("/data", "rwx------")
        .await?;
    assert_eq!(
        fixture.calls(),
        vec!["set_permission /data/word.txt 744", "set_permission /data 700"]
    );

    let status = fixture.util.fs().file_status(&DfsPath::new("/data/word.txt")?).await?;
    assert_eq!(status.permission.to_string(), "rwxr--r--");

    Ok(())
}

#[tokio::test]
async fn invalid_modes_never_reach_the_filesystem() {
    let fixture = Fixture::new();

    let err = fixture
        .util
        .change_permission("/data", "rwz")
        .await
        .unwrap_err();
    assert!(matches!(err, DfsUtilError::InvalidPermission(_)));
    assert!(fixture.calls().is_empty());
}

#[tokio::test]
async fn failures_are_propagated_unchanged() {
    let fixture = Fixture::failing(DfsUtilError::RPCError("namenode down".to_owned()));
    let expected = DfsUtilError::FSError(
        DfsUtilError::RPCError("namenode down".to_owned()).to_string(),
    );

    assert_eq!(fixture.util.check("/data").await.unwrap_err(), expected);
    assert_eq!(fixture.util.mkdir("/data").await.unwrap_err(), expected);
    assert_eq!(
        fixture.util.file_statuses("/data").await.unwrap_err(),
        expected
    );
    assert_eq!(
        fixture
            .util
            .change_files_owner("/data", "root")
            .await
            .unwrap_err(),
        expected
    );
    assert_eq!(
        fixture.util.move_file("/a", "/b").await.unwrap_err(),
        expected
    );
}

#[tokio::test]
async fn append_creates_missing_files() -> Result<()> {
    let fixture = Fixture::new();

    let mut content: &[u8] = b"Welcome To Hadoop";
    let appended = fixture
        .util
        .append_content(&mut content, "/data/word.txt")
        .await?;
    assert_eq!(appended, 17);

    let mut content: &[u8] = b"!";
    fixture
        .util
        .append_content(&mut content, "/data/word.txt")
        .await?;

    assert_eq!(
        fixture.util.read_to_end("/data/word.txt").await?,
        b"Welcome To Hadoop!"
    );
    let calls = fixture.calls();
    assert_eq!(
        calls.iter().filter(|call| call.starts_with("create ")).count(),
        1
    );
    assert_eq!(
        calls
            .iter()
            .filter(|call| *call == "append /data/word.txt")
            .count(),
        2
    );

    Ok(())
}

#[tokio::test]
async fn append_respects_the_config() {
    let mut config = test_config();
    config.dfs.support_append = false;
    let fixture = Fixture::with_config(config);

    let mut content: &[u8] = b"data";
    let err = fixture
        .util
        .append_content(&mut content, "/word.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, DfsUtilError::Unsupported(_)));
    assert!(fixture.calls().is_empty());
}

#[tokio::test]
async fn list_file_filters_by_suffix() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/data/a.txt", "a").await;
    fixture.write("/data/b.csv", "b").await;
    fixture.write("/data/nested/c.txt", "c").await;

    let files = fixture.util.list_file("/data", ".txt").await?;
    assert_eq!(files, vec!["/data/a.txt", "/data/nested/c.txt"]);

    let files = fixture.util.list_file("/data", "").await?;
    assert_eq!(files.len(), 3);

    Ok(())
}

#[tokio::test]
async fn files_under_folder_lists_matching_directories() -> Result<()> {
    let fixture = Fixture::new();
    fixture.util.mkdir("/data/2020-01").await?;
    fixture.util.mkdir("/data/2020-02/deeper").await?;
    fixture.util.mkdir("/data/2021-01").await?;
    fixture.write("/data/2020.txt", "not a directory").await;

    let all = fixture.util.files_under_folder("/data", None).await?;
    assert_eq!(all.len(), 3);

    let matching = fixture
        .util
        .files_under_folder("/data", Some("2020"))
        .await?;
    let names: Vec<_> = matching.iter().map(|path| path.to_string()).collect();
    assert_eq!(names, vec!["/data/2020-01", "/data/2020-02"]);

    assert!(fixture
        .util
        .files_under_folder("/missing", None)
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn move_and_copy() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/in/word.txt", "Welcome To Hadoop").await;
    fixture.write("/in/sub/other.txt", "other").await;

    fixture.util.copy_file("/in", "/copy").await?;
    assert_eq!(
        fixture.util.read_to_end("/copy/word.txt").await?,
        b"Welcome To Hadoop"
    );
    assert_eq!(fixture.util.read_to_end("/copy/sub/other.txt").await?, b"other");
    assert!(fixture.util.copy_file("/in", "/in/sub").await.is_err());

    fixture.clear_calls();
    assert!(fixture.util.move_file("/in/word.txt", "/out.txt").await?);
    assert_eq!(fixture.calls(), vec!["rename /in/word.txt /out.txt"]);
    assert!(!fixture.util.check("/in/word.txt").await?);
    assert!(!fixture.util.move_file("/in/word.txt", "/out.txt").await?);

    Ok(())
}

#[tokio::test]
async fn output_stream_overwrites() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/word.txt", "old content").await;

    let mut out = fixture.util.output_stream("/word.txt").await?;
    out.write(b"new").await?;
    out.shutdown().await?;

    assert_eq!(fixture.util.read_to_end("/word.txt").await?, b"new");
    assert!(fixture.calls().contains(&"create /word.txt true".to_owned()));

    Ok(())
}

#[tokio::test]
async fn create_new_file_only_once() -> Result<()> {
    let fixture = Fixture::new();

    assert!(fixture.util.create_new_file("/data/empty").await?);
    assert!(!fixture.util.create_new_file("/data/empty").await?);
    assert_eq!(fixture.util.read_to_end("/data/empty").await?, b"");

    Ok(())
}

#[tokio::test]
async fn file_statuses_summarizes_usage() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/data/xuz/test/a", "12345").await;
    fixture.write("/data/xuz/test/b", "678").await;

    let summary = fixture.util.file_statuses("/data/xuz/test").await?;
    assert_eq!(fixture.calls()[0], "content_summary /data/xuz/test");
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.length, 8);
    assert_eq!(summary.directory_count, 1);

    Ok(())
}

#[tokio::test]
async fn change_files_owner_is_recursive() -> Result<()> {
    let fixture = Fixture::new();
    fixture.write("/data/xuz/word.txt", "x").await;
    fixture.write("/data/other.txt", "y").await;

    fixture.util.change_files_owner("/data", "root").await?;

    let owner_calls: Vec<_> = fixture
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("set_owner"))
        .collect();
    assert_eq!(owner_calls.len(), 4);
    assert!(owner_calls.contains(&"set_owner /data Some(\"root\") Some(\"supergroup\")".to_owned()));

    for path in &["/data", "/data/xuz", "/data/xuz/word.txt", "/data/other.txt"] {
        let status = fixture.inner.file_status(&DfsPath::new(path)?).await?;
        assert_eq!(status.owner, "root", "path: {}", path);
        assert_eq!(status.group, "supergroup", "path: {}", path);
    }

    Ok(())
}

#[tokio::test]
async fn destroy_closes_the_filesystem() -> Result<()> {
    let fixture = Fixture::new();
    let calls = Arc::clone(&fixture.calls);

    fixture.util.destroy().await?;
    assert_eq!(*calls.lock().unwrap(), vec!["close"]);

    Ok(())
}

#[tokio::test]
async fn set_fs_hands_back_the_previous_filesystem() -> Result<()> {
    let mut fixture = Fixture::new();
    let replacement = MemoryFileSystem::with_owner("other", "other");

    let previous = fixture.util.set_fs(Box::new(replacement));
    assert_eq!(previous.scheme(), "recording");
    assert_eq!(fixture.util.fs().scheme(), "memory");

    Ok(())
}

#[tokio::test]
async fn memory_filesystem_from_config() -> Result<()> {
    let util = DfsUtil::with_config(test_config())?;
    assert_eq!(util.fs().scheme(), "memory");

    util.mkdir("/data").await?;
    let status = util.fs().file_status(&DfsPath::new("/data")?).await?;
    assert_eq!(status.owner, "hdfs");
    assert_eq!(status.group, "supergroup");

    util.destroy().await
}
