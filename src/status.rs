use crate::error::Result;
use crate::path::DfsPath;
use crate::permission::FsPermission;
use crate::proto;

/// Metadata of a single file or directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileStatus {
    pub path: DfsPath,
    pub len: u64,
    pub is_dir: bool,
    pub permission: FsPermission,
    pub owner: String,
    pub group: String,
}

impl FileStatus {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// Space and file count usage below a path.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ContentSummary {
    /// Total bytes of all files.
    pub length: u64,
    pub file_count: u64,
    /// Number of directories, the summarized directory included.
    pub directory_count: u64,
}

impl ContentSummary {
    pub(crate) fn add(&mut self, status: &FileStatus) {
        if status.is_dir {
            self.directory_count += 1;
        } else {
            self.file_count += 1;
            self.length += status.len;
        }
    }
}

impl std::convert::TryFrom<proto::FileStatus> for FileStatus {
    type Error = crate::error::DfsUtilError;

    fn try_from(status: proto::FileStatus) -> Result<Self> {
        let proto::FileStatus {
            path,
            len,
            is_dir,
            permission,
            owner,
            group,
        } = status;
        Ok(Self {
            path: DfsPath::new(&path)?,
            len,
            is_dir,
            permission: FsPermission::new(permission as u16),
            owner,
            group,
        })
    }
}

impl From<proto::ContentSummaryResponse> for ContentSummary {
    fn from(summary: proto::ContentSummaryResponse) -> Self {
        let proto::ContentSummaryResponse {
            length,
            file_count,
            directory_count,
        } = summary;
        Self {
            length,
            file_count,
            directory_count,
        }
    }
}
