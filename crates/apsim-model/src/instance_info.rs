use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{InputFile, InstanceStatus};

/// Snapshot of the backend instance currently held by the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    /// Primary input the backend runs against.
    pub input_file: InputFile,
    /// OS process id, if the process was spawned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Supervisor state.
    pub status: InstanceStatus,
    /// Whether the OS process is still alive.
    ///
    /// A `Running` instance whose backend crashed reports `false` here.
    pub alive: bool,
    /// When the process was spawned.
    #[serde(with = "time_serde", skip_serializing_if = "Option::is_none", default)]
    pub started_at: Option<SystemTime>,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let secs = match time {
            Some(t) => Some(
                t.duration_since(UNIX_EPOCH)
                    .map_err(serde::ser::Error::custom)?
                    .as_secs(),
            ),
            None => None,
        };
        secs.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}
