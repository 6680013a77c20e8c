mod error;
pub use error::{ExecError, ExecResult};

mod command;
pub use command::BackendCommand;

mod instance;
pub use instance::ServerInstance;

mod util;
pub use util::remove_if_exists;
