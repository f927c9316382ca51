use crate::parse::parse_command;
use crate::record::{Key, Payload};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct PutCommand(pub Key, pub Payload);

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCommand(pub Key);

#[derive(Debug, Clone, PartialEq)]
pub struct GetCommand(pub Key);

/// A single line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Put(PutCommand),
    Delete(DeleteCommand),
    Get(GetCommand),
    /// Dump the directory and every bucket it reaches
    Summary,
    Exit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_command(s)
    }
}
