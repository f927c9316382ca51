use crate::command::*;
use crate::error::{Insert, Removal, Result};
use crate::hash::KeyHasher;
use crate::hash_file::HashFile;

/// Runs `cmd` against `store` and renders the answer for the user
///
/// `Exit` closes the store, writing the directory back.
pub fn execute_command<H: KeyHasher>(store: &mut HashFile<H>, cmd: Command) -> Result<String> {
    let output = match cmd {
        Command::Put(PutCommand(key, payload)) => match store.insert(&key, &payload)? {
            Insert::Inserted => "OK".to_string(),
            Insert::AlreadyPresent => format!("Key {} already present", key),
        },
        Command::Get(GetCommand(key)) => match store.retrieve(&key)? {
            Some(payload) => payload.to_string(),
            None => format!("Key {} not found", key),
        },
        Command::Delete(DeleteCommand(key)) => match store.delete(&key)? {
            Removal::Deleted => "OK".to_string(),
            Removal::NotPresent => format!("Key {} not found", key),
        },
        Command::Summary => store.summary()?.to_string(),
        Command::Exit => {
            store.close()?;
            "Bye".to_string()
        }
    };
    Ok(output)
}
