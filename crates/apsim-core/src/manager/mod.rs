use std::path::PathBuf;
use std::sync::Arc;

use apsim_exec::{BackendCommand, ServerInstance, remove_if_exists};
use apsim_model::{FileKind, InputFile, InstanceInfo};
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::{
    config::ManagerConfig,
    error::CoreError,
    ledger::RecoveryLedger,
    metrics::{MetricsHandle, SwapOutcome, noop_metrics},
    store::FileStore,
};

/// Owns the single backend slot.
///
/// Every transition of the slot (swap, resume, shutdown) runs under one
/// lock from observing the current instance to persisting the ledger, so at
/// most one backend process is alive at any time. Upload bytes are written
/// before the lock is taken.
pub struct InstanceManager {
    store: FileStore,
    ledger: RecoveryLedger,
    backend: BackendCommand,
    slot: Mutex<Option<ServerInstance>>,
    metrics: MetricsHandle,
}

impl InstanceManager {
    pub fn new(data_dir: impl Into<PathBuf>, backend: BackendCommand) -> Self {
        let data_dir = data_dir.into();
        Self {
            ledger: RecoveryLedger::in_dir(&data_dir),
            store: FileStore::new(data_dir),
            backend,
            slot: Mutex::new(None),
            metrics: noop_metrics(),
        }
    }

    pub fn from_config(cfg: &ManagerConfig) -> Self {
        Self::new(cfg.data_dir.clone(), cfg.backend.clone())
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn ledger(&self) -> &RecoveryLedger {
        &self.ledger
    }

    /// Persist `upload` as a new primary input and swap the backend onto it.
    ///
    /// Once the upload is stored the swap runs on its own task, so dropping
    /// the returned future (a client hanging up) never leaves it half done.
    ///
    /// Any failure after the upload is saved aborts the whole swap: the new
    /// input is deleted, the slot is left empty and the ledger holds nothing.
    /// A missing backend is preferred over a stale one.
    #[instrument(level = "debug", skip_all)]
    pub async fn deploy<R>(self: &Arc<Self>, upload: &mut R) -> Result<InputFile, CoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let input = self.store.save_primary(upload).await?;
        self.metrics.record_upload(FileKind::Primary);

        let swap = tokio::spawn(Arc::clone(self).swap(input).in_current_span());
        swap.await?
    }

    async fn swap(self: Arc<Self>, input: InputFile) -> Result<InputFile, CoreError> {
        let mut slot = self.slot.lock().await;
        let result = self.swap_locked(&mut slot, &input).await;
        self.metrics.set_backend_running(slot.is_some());

        match result {
            Ok(()) => {
                self.metrics.record_swap(SwapOutcome::Started);
                info!(input = %input, "backend swapped to new input");
                Ok(input)
            }
            Err(e) => {
                self.metrics.record_swap(SwapOutcome::Failed);
                warn!(input = %input, "swap aborted; no backend running");
                discard_input(&input).await;
                Err(e)
            }
        }
    }

    async fn swap_locked(
        &self,
        slot: &mut Option<ServerInstance>,
        input: &InputFile,
    ) -> Result<(), CoreError> {
        if let Some(mut old) = slot.take() {
            debug!(old = %old.input(), pid = ?old.pid(), "stopping current backend");
            old.stop().await?;
            self.ledger.clear().await?;
        }

        let mut instance = ServerInstance::new(input.clone(), self.backend.clone());
        instance.start()?;

        if let Err(e) = self.ledger.write(input.path()).await {
            if let Err(stop_err) = instance.stop().await {
                warn!(error = %stop_err, "failed to stop backend after ledger error");
            }
            return Err(e.into());
        }

        *slot = Some(instance);
        Ok(())
    }

    /// Store a side file under `name`. Never touches the backend or the ledger.
    #[instrument(level = "debug", skip(self, upload))]
    pub async fn upload_auxiliary<R>(&self, name: &str, upload: &mut R) -> Result<PathBuf, CoreError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let path = self.store.save_auxiliary(name, upload).await?;
        self.metrics.record_upload(FileKind::Auxiliary);
        info!(path = %path.display(), "auxiliary file stored");
        Ok(path)
    }

    /// Restart the backend for the input recorded in the ledger.
    ///
    /// Does nothing when the ledger is empty, the recorded file is gone, or a
    /// backend is already held. The ledger is not rewritten and the input is
    /// not deleted.
    #[instrument(level = "debug", skip(self))]
    pub async fn resume(&self) -> Result<Option<InputFile>, CoreError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            debug!("resume skipped: backend already running");
            return Ok(None);
        }

        let Some(path) = self.ledger.read().await? else {
            debug!("resume skipped: ledger empty");
            return Ok(None);
        };

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                info!(input = %path.display(), "resume skipped: recorded input no longer exists");
                return Ok(None);
            }
            Err(e) => {
                warn!(input = %path.display(), error = %e, "resume skipped: cannot access recorded input");
                return Ok(None);
            }
        }

        let input = InputFile::new(path);
        let mut instance = ServerInstance::new(input.clone(), self.backend.clone());
        instance.start()?;
        *slot = Some(instance);

        self.metrics.record_swap(SwapOutcome::Resumed);
        self.metrics.set_backend_running(true);
        info!(input = %input, "backend resumed from ledger");
        Ok(Some(input))
    }

    /// Snapshot of the current backend, if any.
    pub async fn status(&self) -> Option<InstanceInfo> {
        let mut slot = self.slot.lock().await;
        slot.as_mut().map(ServerInstance::info)
    }

    /// Kill the backend for manager shutdown.
    ///
    /// Files and ledger stay in place so the next start resumes the same input.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut instance) = slot.take() {
            instance.detach().await;
        }
        self.metrics.set_backend_running(false);
    }
}

async fn discard_input(input: &InputFile) {
    for path in input.owned_paths() {
        if let Err(e) = remove_if_exists(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove input of aborted swap");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use apsim_model::{InstanceStatus, LEDGER_FILE_NAME};

    use super::*;
    use crate::metrics::MetricsBackend;

    /// Stand-in backend: creates its `.db` next to the input, like the real one,
    /// then idles until killed.
    fn fake_backend() -> BackendCommand {
        BackendCommand::new("/bin/sh").with_args([
            "-c",
            r#"touch "${1%.apsimx}.db"; exec sleep 30"#,
            "backend",
        ])
    }

    fn manager(dir: &Path) -> Arc<InstanceManager> {
        Arc::new(InstanceManager::new(dir, fake_backend()))
    }

    /// Like `fake_backend`, but on start every backend appends to `overlap` the
    /// pid of any earlier backend that is still alive.
    fn exclusive_backend(track: &Path) -> BackendCommand {
        let script = format!(
            r#"for p in $(cat "{pids}" 2>/dev/null); do kill -0 "$p" 2>/dev/null && echo "$p" >> "{overlap}"; done; echo $$ >> "{pids}"; touch "${{1%.apsimx}}.db"; exec sleep 30"#,
            pids = track.join("pids").display(),
            overlap = track.join("overlap").display(),
        );
        BackendCommand::new("/bin/sh").with_args(["-c".to_string(), script, "backend".to_string()])
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn wait_for(path: &Path) {
        for _ in 0..100 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never appeared", path.display());
    }

    #[derive(Default)]
    struct RecordingMetrics {
        uploads: StdMutex<HashMap<FileKind, u32>>,
        swaps: StdMutex<Vec<SwapOutcome>>,
        running: StdMutex<Option<bool>>,
    }

    impl MetricsBackend for RecordingMetrics {
        fn record_upload(&self, kind: FileKind) {
            *self.uploads.lock().unwrap().entry(kind).or_default() += 1;
        }
        fn record_swap(&self, outcome: SwapOutcome) {
            self.swaps.lock().unwrap().push(outcome);
        }
        fn set_backend_running(&self, running: bool) {
            *self.running.lock().unwrap() = Some(running);
        }
    }

    #[tokio::test]
    async fn first_upload_starts_backend_and_writes_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let a = mgr.deploy(&mut &b"model a"[..]).await.unwrap();

        let info = mgr.status().await.expect("backend should be held");
        assert_eq!(info.input_file, a);
        assert_eq!(info.status, InstanceStatus::Running);
        assert!(info.alive);
        assert_eq!(mgr.ledger().read().await.unwrap(), Some(a.path().to_path_buf()));

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn second_upload_replaces_first_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let a = mgr.deploy(&mut &b"model a"[..]).await.unwrap();
        let a_db = a.path().with_extension("db");
        wait_for(&a_db).await;

        let b = mgr.deploy(&mut &b"model b"[..]).await.unwrap();

        for path in a.owned_paths() {
            assert!(!path.exists(), "{} should be gone", path.display());
        }
        assert_eq!(mgr.status().await.unwrap().input_file, b);
        assert_eq!(mgr.ledger().read().await.unwrap(), Some(b.path().to_path_buf()));
        assert_eq!(std::fs::read(b.path()).unwrap(), b"model b");

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_uploads_never_overlap_backends() {
        let dir = tempfile::tempdir().unwrap();
        let track = tempfile::tempdir().unwrap();
        let mgr = Arc::new(InstanceManager::new(dir.path(), exclusive_backend(track.path())));

        let mut handles = Vec::new();
        for i in 0..8u8 {
            let mgr = Arc::clone(&mgr);
            handles.push(tokio::spawn(async move {
                let body = vec![b'0' + i; 64];
                mgr.deploy(&mut body.as_slice()).await
            }));
        }
        let mut deployed = Vec::new();
        for handle in handles {
            deployed.push(handle.await.unwrap().unwrap());
        }

        let current = mgr.status().await.expect("one backend must remain");
        assert_eq!(current.status, InstanceStatus::Running);
        assert!(deployed.contains(&current.input_file));
        assert_eq!(
            mgr.ledger().read().await.unwrap(),
            Some(current.input_file.path().to_path_buf())
        );

        // Every superseded input was stopped and deleted.
        for input in deployed.iter().filter(|i| **i != current.input_file) {
            assert!(!input.path().exists(), "{input} should have been cleaned up");
        }
        let remaining: Vec<String> = entries(dir.path())
            .into_iter()
            .filter(|n| n.ends_with(".apsimx"))
            .collect();
        assert_eq!(remaining.len(), 1);

        // Wait until the last backend has checked for survivors and registered itself.
        let pids = track.path().join("pids");
        let last = current.pid.unwrap().to_string();
        for _ in 0..100 {
            let seen = std::fs::read_to_string(&pids).unwrap_or_default();
            if seen.lines().any(|l| l == last) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(
            std::fs::read_to_string(&pids).unwrap().lines().any(|l| l == last),
            "last backend never registered"
        );
        let overlap = std::fs::read_to_string(track.path().join("overlap")).unwrap_or_default();
        assert!(overlap.is_empty(), "backends alive at the same time: {overlap}");

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn abandoned_deploy_still_completes_swap() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let a = mgr.deploy(&mut &b"model a"[..]).await.unwrap();
        wait_for(&a.path().with_extension("db")).await;

        // Hold the slot so the second swap is parked right at the critical section,
        // then give up on its caller.
        let guard = mgr.slot.lock().await;
        let mut pending = Box::pin({
            let mgr = Arc::clone(&mgr);
            async move { mgr.deploy(&mut &b"model b"[..]).await }
        });
        let parked = tokio::time::timeout(Duration::from_millis(500), &mut pending).await;
        assert!(parked.is_err(), "swap cannot finish while the slot is held");
        drop(pending);
        drop(guard);

        // The lock is fair, so this waits for the swap queued ahead of it.
        let current = {
            let slot = mgr.slot.lock().await;
            slot.as_ref().map(|i| i.input().clone())
        }
        .expect("new backend must be held");

        assert_ne!(current, a);
        assert_eq!(std::fs::read(current.path()).unwrap(), b"model b");
        for path in a.owned_paths() {
            assert!(!path.exists(), "{} should be gone", path.display());
        }
        assert_eq!(mgr.ledger().read().await.unwrap(), Some(current.path().to_path_buf()));
        let inputs: Vec<String> = entries(dir.path())
            .into_iter()
            .filter(|n| n.ends_with(".apsimx"))
            .collect();
        assert_eq!(inputs.len(), 1);

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn failed_start_leaves_no_backend_and_no_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = Arc::new(InstanceManager::new(
            dir.path(),
            BackendCommand::new("/nonexistent/apsim-server"),
        ));

        let err = mgr.deploy(&mut &b"model"[..]).await.unwrap_err();

        assert!(matches!(err, CoreError::Exec(apsim_exec::ExecError::Spawn { .. })));
        assert!(mgr.status().await.is_none());
        assert_eq!(mgr.ledger().read().await.unwrap(), None);
        assert!(entries(dir.path()).is_empty(), "aborted upload must be removed");
    }

    #[tokio::test]
    async fn missing_data_dir_fails_before_any_swap() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir.path().join("absent"));

        let err = mgr.deploy(&mut &b"model"[..]).await.unwrap_err();

        assert!(matches!(err, CoreError::Store(crate::StoreError::OutputDirectoryUnavailable(_))));
        assert!(mgr.status().await.is_none());
    }

    #[tokio::test]
    async fn auxiliary_upload_does_not_touch_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        mgr.upload_auxiliary("weather.met", &mut &b"year 1"[..]).await.unwrap();
        let path = mgr
            .upload_auxiliary("weather.met", &mut &b"year 2 data"[..])
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"year 2 data");
        assert!(mgr.status().await.is_none());
        assert_eq!(mgr.ledger().read().await.unwrap(), None);
        assert_eq!(entries(dir.path()), vec!["weather.met".to_string()]);
    }

    #[tokio::test]
    async fn auxiliary_upload_keeps_running_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let a = mgr.deploy(&mut &b"model"[..]).await.unwrap();

        mgr.upload_auxiliary("weather.met", &mut &b"met"[..]).await.unwrap();

        let info = mgr.status().await.unwrap();
        assert_eq!(info.input_file, a);
        assert!(info.alive);
        assert_eq!(mgr.ledger().read().await.unwrap(), Some(a.path().to_path_buf()));

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn resume_starts_recorded_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("apsim-input-file-resume.apsimx");
        std::fs::write(&input, b"model").unwrap();
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), input.to_str().unwrap()).unwrap();
        let mgr = manager(dir.path());

        let resumed = mgr.resume().await.unwrap();

        assert_eq!(resumed.as_ref().map(InputFile::path), Some(input.as_path()));
        let info = mgr.status().await.unwrap();
        assert_eq!(info.status, InstanceStatus::Running);
        assert_eq!(info.input_file.path(), input);
        assert!(input.exists(), "resume must not delete the input");
        assert_eq!(mgr.ledger().read().await.unwrap(), Some(input.clone()));

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn resume_skips_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("apsim-input-file-gone.apsimx");
        std::fs::write(dir.path().join(LEDGER_FILE_NAME), gone.to_str().unwrap()).unwrap();
        let mgr = manager(dir.path());

        assert_eq!(mgr.resume().await.unwrap(), None);
        assert!(mgr.status().await.is_none());
    }

    #[tokio::test]
    async fn resume_without_ledger_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        assert_eq!(mgr.resume().await.unwrap(), None);
        assert!(mgr.status().await.is_none());
    }

    #[tokio::test]
    async fn resume_with_backend_held_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let a = mgr.deploy(&mut &b"model"[..]).await.unwrap();

        assert_eq!(mgr.resume().await.unwrap(), None);
        assert_eq!(mgr.status().await.unwrap().input_file, a);

        mgr.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_then_restart_resumes_same_input() {
        let dir = tempfile::tempdir().unwrap();
        let first = manager(dir.path());
        let a = first.deploy(&mut &b"model"[..]).await.unwrap();

        first.shutdown().await;
        assert!(first.status().await.is_none());
        assert!(a.path().exists());
        drop(first);

        let second = manager(dir.path());
        assert_eq!(second.resume().await.unwrap(), Some(a.clone()));
        assert_eq!(second.status().await.unwrap().input_file, a);

        second.shutdown().await;
    }

    #[tokio::test]
    async fn metrics_follow_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(RecordingMetrics::default());
        let mgr = Arc::new(InstanceManager::new(dir.path(), fake_backend()).with_metrics(metrics.clone()));

        mgr.deploy(&mut &b"a"[..]).await.unwrap();
        mgr.upload_auxiliary("weather.met", &mut &b"met"[..]).await.unwrap();
        assert_eq!(*metrics.running.lock().unwrap(), Some(true));

        mgr.shutdown().await;
        assert_eq!(*metrics.running.lock().unwrap(), Some(false));
        assert_eq!(*metrics.swaps.lock().unwrap(), vec![SwapOutcome::Started]);

        let uploads = metrics.uploads.lock().unwrap();
        assert_eq!(uploads.get(&FileKind::Primary), Some(&1));
        assert_eq!(uploads.get(&FileKind::Auxiliary), Some(&1));
    }
}
