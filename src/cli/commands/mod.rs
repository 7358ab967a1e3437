//! One module per subcommand; each exposes `execute`.

pub mod add;
pub mod completions;
pub mod delete;
pub mod download;
pub mod get;
pub mod init;
pub mod list;
pub mod sync;
