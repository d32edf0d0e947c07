use thiserror::Error;

/// One variant per wire status code. Operations return these directly; the
/// dispatcher turns them into the response header.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("target block is not a directory")]
    FileNotDir,
    #[error("target block is not a regular file")]
    FileIsDir,
    #[error("name already exists in the directory")]
    FileExists,
    #[error("no entry with that name")]
    FileNotExists,
    #[error("file name is too long")]
    FileNameTooLong,
    #[error("no free blocks left on disk")]
    DiskFull,
    #[error("directory has no free entry slots")]
    DirFull,
    #[error("directory is not empty")]
    DirNotEmpty,
    #[error("append would exceed the maximum file size")]
    AppendExceedsMaxSize,
    #[error("unrecognized command")]
    CommandNotFound,
}

impl FsError {
    pub fn code(self) -> u16 {
        match self {
            Self::FileNotDir => 500,
            Self::FileIsDir => 501,
            Self::FileExists => 502,
            Self::FileNotExists => 503,
            Self::FileNameTooLong => 504,
            Self::DiskFull => 505,
            Self::DirFull => 506,
            Self::DirNotEmpty => 507,
            Self::AppendExceedsMaxSize => 508,
            Self::CommandNotFound => 509,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::FileNotDir => "FILE_NOT_DIR",
            Self::FileIsDir => "FILE_IS_DIR",
            Self::FileExists => "FILE_EXISTS",
            Self::FileNotExists => "FILE_NOT_EXISTS",
            Self::FileNameTooLong => "FILE_NAME_TOO_LONG",
            Self::DiskFull => "DISK_FULL",
            Self::DirFull => "DIR_FULL",
            Self::DirNotEmpty => "DIR_NOT_EMPTY",
            Self::AppendExceedsMaxSize => "APPEND_EXCEEDS_MAX_SIZE",
            Self::CommandNotFound => "COMMAND_NOT_FOUND",
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
