use std::io;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

/// Delete `path`, treating a missing file as success.
///
/// Returns `Ok(true)` if a file was removed.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum OutputStream {
    Stdout,
    Stderr,
}

/// Drain `reader` line by line into the log, stdout at `info` and stderr at `error`.
///
/// Each stream gets its own task so neither can stall the other or the child.
pub(crate) fn spawn_relay<R>(reader: R, stream: OutputStream, pid: Option<u32>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match stream {
                    OutputStream::Stdout => info!(target: "apsim.backend.stdout", pid, "{line}"),
                    OutputStream::Stderr => error!(target: "apsim.backend.stderr", pid, "{line}"),
                },
                Ok(None) => break,
                Err(e) => {
                    trace!(target: "apsim.exec", pid, ?stream, error = %e, "output relay stopped");
                    break;
                }
            }
        }
    })
}
