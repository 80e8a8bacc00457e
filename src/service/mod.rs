//! Service lifecycle: provisioning, launch, discovery and shutdown.
//!
//! One local service instance is shared by every client on the machine. A
//! run file advertises its pid and port; `start` first tries to adopt the
//! advertised instance and only provisions a fresh one when discovery
//! fails. Stopping is best effort and never blocks a client from exiting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::settings::Settings;

pub mod binary;
pub mod health;
pub mod platform;
pub mod process;
pub mod runfile;

use binary::{ArtifactFetcher, BinaryProvisioner, HttpFetcher};
use health::HealthProbe;
use process::ProcessLauncher;
use runfile::{RunFileRegistry, ServiceRecord};

/// How long a freshly launched instance gets to write its run file.
const REGISTRATION_TIMEOUT: Duration = Duration::from_millis(3500);
const REGISTRATION_POLL: Duration = Duration::from_millis(500);

/// Post-launch probing is lenient; the service may still be binding.
const LAUNCH_PROBE_ATTEMPTS: u32 = 10;
const LAUNCH_PROBE_DELAY: Duration = Duration::from_secs(1);

/// Starts (or adopts) the local service and returns its base URL.
///
/// Convenience over [`ServiceManager`] for clients that only need an
/// endpoint; the launched instance stays up after the manager is dropped.
pub async fn start(settings: &Settings) -> Result<String> {
    let mut manager = ServiceManager::new(settings)?;
    let port = manager.start().await?;
    Ok(health::base_url(port))
}

/// Observed state of the local service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// No instance is registered or reachable.
    Stopped,
    /// An instance is registered and answered a health probe.
    Ready { port: u16 },
    /// An instance is registered but did not answer; its record is
    /// reported as-is so callers can still reach for the port.
    Unconfirmed { port: u16 },
}

/// Manages the shared local service instance.
pub struct ServiceManager {
    provisioner: BinaryProvisioner,
    launcher: ProcessLauncher,
    registry: RunFileRegistry,
    probe: HealthProbe,
    child: Option<Child>,
}

impl ServiceManager {
    /// Builds a manager from settings, using the HTTP artifact fetcher.
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_fetcher(settings, Arc::new(HttpFetcher::default()))
    }

    pub fn with_fetcher(settings: &Settings, fetcher: Arc<dyn ArtifactFetcher>) -> Result<Self> {
        let install_dir = match &settings.install_dir {
            Some(dir) => dir.clone(),
            None => platform::install_dir()?,
        };
        let run_dir: PathBuf = match &settings.run_file_dir {
            Some(dir) => dir.clone(),
            None => platform::run_file_dir()?,
        };
        let asset_url = settings.asset_url(&platform::asset_name(&settings.version)?);

        Ok(ServiceManager {
            provisioner: BinaryProvisioner::new(
                install_dir,
                settings.version.clone(),
                asset_url,
                fetcher,
            ),
            launcher: ProcessLauncher,
            registry: RunFileRegistry::new(&run_dir),
            probe: HealthProbe::default(),
            child: None,
        })
    }

    /// Ensures an instance is running and returns its port.
    ///
    /// Idempotent: an already-registered live instance is adopted as-is.
    /// When launch succeeds but the first health probes all miss, the
    /// registered port is still returned; later calls surface real errors.
    pub async fn start(&mut self) -> Result<u16> {
        if let Some(record) = self.discover().await {
            debug!(pid = record.pid, port = record.port, "adopting running service");
            return Ok(record.port);
        }

        let binary = self.provisioner.ensure().await?;
        self.registry.delete()?;
        let child = self.launcher.launch(&binary)?;
        self.child = Some(child);

        let record = self.await_registration().await?;
        info!(pid = record.pid, port = record.port, "service registered");

        let lenient = HealthProbe::new(LAUNCH_PROBE_ATTEMPTS, LAUNCH_PROBE_DELAY);
        if !lenient.wait_healthy(record.port).await {
            warn!(port = record.port, "service registered but not yet healthy");
        }
        Ok(record.port)
    }

    /// Stops the local instance: the spawned child if we own one, else the
    /// process advertised in the run file. Always forgets the record.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = process::terminate_child(&mut child).await {
                warn!(error = %e, "failed to stop spawned service");
            }
        } else if let Some(record) = self.registry.load() {
            if process::pid_alive(record.pid) {
                process::terminate_pid(record.pid).await;
            }
        }
        self.registry.delete()
    }

    /// Reports the observed state without changing anything.
    pub async fn status(&self) -> ServiceStatus {
        let Some(record) = self.registry.load() else {
            return ServiceStatus::Stopped;
        };
        if cfg!(unix) && !process::pid_alive(record.pid) {
            return ServiceStatus::Stopped;
        }
        if self.probe.wait_healthy(record.port).await {
            ServiceStatus::Ready { port: record.port }
        } else if cfg!(unix) {
            ServiceStatus::Unconfirmed { port: record.port }
        } else {
            // Without a pid probe the record alone proves nothing.
            ServiceStatus::Stopped
        }
    }

    pub async fn is_running(&self) -> bool {
        !matches!(self.status().await, ServiceStatus::Stopped)
    }

    /// Tries to adopt the instance advertised by the run file.
    ///
    /// A live process is adopted even when its health probe misses, with
    /// the same leniency the post-launch path applies: the instance may
    /// still be binding, and replacing it would leak a duplicate. Without
    /// a pid probe the health endpoint is the only accepted evidence.
    async fn discover(&self) -> Option<ServiceRecord> {
        let record = self.registry.load()?;
        if cfg!(unix) {
            if !process::pid_alive(record.pid) {
                debug!(pid = record.pid, "run file points at a dead process");
                return None;
            }
            if !self.probe.wait_healthy(record.port).await {
                warn!(
                    pid = record.pid,
                    port = record.port,
                    "adopting live instance that has not answered a health probe"
                );
            }
            Some(record)
        } else if self.probe.wait_healthy(record.port).await {
            Some(record)
        } else {
            None
        }
    }

    /// Polls for the run file a fresh launch is expected to write.
    async fn await_registration(&self) -> Result<ServiceRecord> {
        let deadline = tokio::time::Instant::now() + REGISTRATION_TIMEOUT;
        loop {
            if let Some(record) = self.registry.load() {
                return Ok(record);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::StartTimeout {
                    timeout: REGISTRATION_TIMEOUT,
                });
            }
            tokio::time::sleep(REGISTRATION_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingFetcher {
        payload: Vec<u8>,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(payload: Vec<u8>) -> Arc<Self> {
            Arc::new(CountingFetcher {
                payload,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ArtifactFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    /// A release archive whose binary runs but never writes a run file.
    #[cfg(unix)]
    fn idle_release_archive() -> Vec<u8> {
        let script = b"#!/bin/sh\nsleep 30\n";
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, platform::binary_name(), &script[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn manager_with(
        dir: &std::path::Path,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> ServiceManager {
        let settings = Settings {
            install_dir: Some(dir.join("install")),
            run_file_dir: Some(dir.to_path_buf()),
            ..Settings::default()
        };
        ServiceManager::with_fetcher(&settings, fetcher).unwrap()
    }

    fn manager_in(dir: &std::path::Path) -> ServiceManager {
        manager_with(dir, Arc::new(HttpFetcher::default()))
    }

    #[tokio::test]
    async fn status_without_a_run_file_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        assert_eq!(manager.status().await, ServiceStatus::Stopped);
        assert!(!manager.is_running().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn record_of_a_dead_process_reads_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path());
        manager
            .registry
            .store(&ServiceRecord {
                pid: 4_000_000,
                port: 1,
            })
            .unwrap();
        assert_eq!(manager.status().await, ServiceStatus::Stopped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn live_but_unhealthy_record_is_adopted_without_a_relaunch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::new(Vec::new());
        let mut manager = manager_with(dir.path(), fetcher.clone());

        // Our own pid is alive; nothing listens on port 1, so every
        // health probe misses.
        let record = ServiceRecord {
            pid: std::process::id(),
            port: 1,
        };
        manager.registry.store(&record).unwrap();

        assert_eq!(manager.start().await.unwrap(), 1);
        assert_eq!(manager.start().await.unwrap(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(manager.registry.load(), Some(record));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_that_never_registers_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CountingFetcher::new(idle_release_archive());
        let mut manager = manager_with(dir.path(), fetcher.clone());

        match manager.start().await {
            Err(Error::StartTimeout { timeout }) => {
                assert_eq!(timeout, REGISTRATION_TIMEOUT);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_an_instance_clears_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager
            .registry
            .store(&ServiceRecord {
                pid: 4_000_000,
                port: 1,
            })
            .unwrap();
        manager.stop().await.unwrap();
        assert_eq!(manager.registry.load(), None);
    }
}
