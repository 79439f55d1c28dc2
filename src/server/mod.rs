//! TCP command boundary
//!
//! Text protocol, one command per delivered message:
//! - `START_RECORDING[:path]` -> `RECORDING_STARTED`
//! - `STOP_RECORDING[:path]`  -> `RECORDING_STOPPED`
//! - `EXIT` / `QUIT`          -> `SERVER_STOPPING`
//! - anything else            -> `UNKNOWN_COMMAND`

mod command;
mod listener;

pub use command::{reply, Command};
pub use listener::run;
