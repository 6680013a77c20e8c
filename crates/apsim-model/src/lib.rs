mod input_file;
pub use input_file::{DERIVED_EXTENSIONS, FileKind, INPUT_EXTENSION, InputFile};

mod instance_status;
pub use instance_status::InstanceStatus;

mod instance_info;
pub use instance_info::InstanceInfo;

/// Name of the recovery ledger file inside the data directory.
pub const LEDGER_FILE_NAME: &str = "server-manager.lock";
