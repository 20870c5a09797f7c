// Protocol module - line-oriented text commands and their responses
//
// One datagram carries one command (`NAME`, `NAME:ARG`, `NAME:ARG1,ARG2`)
// and gets one response (`NAME:STATUS[,KEY=VALUE...]`).

pub mod command;
pub mod dispatch;
pub mod response;

pub use command::{parse, Command, CommandEntry, COMMAND_TABLE};
pub use dispatch::{dispatch, execute, help_text};
pub use response::Response;
