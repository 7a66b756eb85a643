//! A small utility layer over distributed filesystem clients.
//!
//! [`DfsUtil`] wraps any [`fs::FileSystem`] and exposes string based helpers
//! for the usual chores: creating and clearing directories, uploading and
//! downloading files, changing permissions and owners, appending, listing
//! and summarizing space usage.

pub mod config;
pub mod error;
pub mod fs;
pub mod io;
pub mod path;
pub mod permission;
pub mod status;
pub mod util;
pub mod utils;

pub use util::DfsUtil;

pub mod proto {
    tonic::include_proto!("dfsutil.proto");
}
