//! Runtime components for process management

pub mod command;
pub mod launcher;
pub mod process;
pub mod sequencer;
pub mod supervisor;

pub use command::*;
pub use launcher::*;
pub use process::*;
pub use sequencer::*;
pub use supervisor::*;
