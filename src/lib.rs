mod bits;
mod bucket;
mod bytes;
mod command;
mod config;
mod consts;
mod directory;
mod error;
mod execute;
mod hash;
mod hash_file;
mod parse;
mod record;
mod repl;
mod setup;
mod stdin;

// Single file extendible hashing
// Fixed size records are spread over fixed size buckets through a directory
// addressed by the low bits of each key's hash

pub use bits::*;
pub use bucket::Bucket;
pub use command::*;
pub use config::HashFileConfig;
pub use consts::*;
pub use directory::Directory;
pub use error::*;
pub use execute::execute_command;
pub use hash::*;
pub use hash_file::*;
pub use record::*;
pub use repl::run_repl;
pub use setup::*;
pub use stdin::process_from_stdin;
