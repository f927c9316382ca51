use crate::config::HashFileConfig;
use crate::error::{Error, Result};
use crate::hash_file::HashFile;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::info;

/// Base name of the files used when `--db` is not given
pub const DEFAULT_DB_NAME: &str = "hash_data";

#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Files are `<name>.ehd` and `<name>.ehf`
    pub name: PathBuf,
    /// Start from an empty store even if the files exist
    pub create: bool,
    pub config: HashFileConfig,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            name: PathBuf::from(DEFAULT_DB_NAME),
            create: false,
            config: HashFileConfig::new(),
        }
    }
}

/// Command line arguments of the binary
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub repl: bool,
    pub verbose: bool,
    pub setup: SetupOptions,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> std::result::Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--repl" => parsed.repl = true,
            "--verbose" | "-v" => parsed.verbose = true,
            "--new" => parsed.setup.create = true,
            "--coalesce" => {
                parsed.setup.config = parsed.setup.config.coalesce_on_delete();
            }
            "--db" => {
                let name = args.next().ok_or("Expected a name after --db")?;
                parsed.setup.name = PathBuf::from(name);
            }
            _ => return Err(format!("Unknown argument: {}", arg)),
        }
    }
    Ok(parsed)
}

/// Opens the store named in `options`, creating it when it does not exist yet
pub fn setup_db(options: &SetupOptions) -> Result<HashFile> {
    let mut store = HashFile::new(options.config.clone());
    if options.create {
        store.create(&options.name)?;
        return Ok(store);
    }
    match store.open(&options.name) {
        Err(Error::Open { source, .. }) if source.kind() == ErrorKind::NotFound => {
            info!(name = %options.name.display(), "no existing store, creating one");
            store.create(&options.name)?;
        }
        result => result?,
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Key, Payload};
    use tempfile::tempdir;

    fn args(list: &[&str]) -> std::result::Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn argument_parsing() {
        let parsed = args(&[]).unwrap();
        assert!(!parsed.repl);
        assert_eq!(parsed.setup.name, PathBuf::from(DEFAULT_DB_NAME));

        let parsed = args(&["--repl", "--db", "books", "--new", "-v"]).unwrap();
        assert!(parsed.repl);
        assert!(parsed.verbose);
        assert!(parsed.setup.create);
        assert_eq!(parsed.setup.name, PathBuf::from("books"));

        assert!(args(&["--db"]).is_err());
        assert!(args(&["--bogus"]).is_err());
    }

    #[test]
    fn creates_then_reopens() {
        let dir = tempdir().unwrap();
        let options = SetupOptions {
            name: dir.path().join("store"),
            ..SetupOptions::default()
        };
        let key = Key::try_from("1").unwrap();

        let mut store = setup_db(&options).unwrap();
        store
            .insert(&key, &Payload::try_from("one").unwrap())
            .unwrap();
        store.close().unwrap();

        let mut store = setup_db(&options).unwrap();
        assert!(store.retrieve(&key).unwrap().is_some());
        store.close().unwrap();

        let fresh = SetupOptions {
            create: true,
            ..options
        };
        let mut store = setup_db(&fresh).unwrap();
        assert!(store.retrieve(&key).unwrap().is_none());
    }
}
