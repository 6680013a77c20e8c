use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Stream `src` into `dest` without ever exposing a partial file under `dest`.
///
/// Bytes go to a hidden sibling first, are synced, and then renamed over
/// `dest`. The temp file is removed if anything fails.
pub(crate) async fn write_atomic<R>(dest: &Path, src: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let tmp = temp_sibling(dest);
    match copy_synced(&tmp, src).await {
        Ok(written) => match tokio::fs::rename(&tmp, dest).await {
            Ok(()) => Ok(written),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e)
            }
        },
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            Err(e)
        }
    }
}

async fn copy_synced<R>(tmp: &Path, src: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp)
        .await?;
    let written = tokio::io::copy(src, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = format!(".{}.part", Uuid::new_v4());
    match dest.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn writes_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");

        let written = write_atomic(&dest, &mut &b"hello"[..]).await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert_eq!(entries(dir.path()), vec!["out.txt".to_string()]);
    }

    #[tokio::test]
    async fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        std::fs::write(&dest, b"old contents that are longer").unwrap();

        write_atomic(&dest, &mut &b"new"[..]).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nope").join("out.txt");

        assert!(write_atomic(&dest, &mut &b"x"[..]).await.is_err());
        assert!(entries(dir.path()).is_empty());
    }
}
