//! # Spore Drive: configuration and deployment client
//!
//! This library manages a local drive service instance and provides typed,
//! async access to its two surfaces: configuration sessions and deployment
//! drives. The heavy lifting (parsing configurations, SSH-ing into hosts,
//! rolling out binaries) happens inside the service; this crate provisions
//! the service binary, keeps exactly one instance running per machine, and
//! speaks its Connect-RPC protocol.
//!
//! ## Key Concepts
//!
//! - **`ServiceManager`**: Downloads the pinned service release, launches it
//!   detached, and discovers already-running instances through a run file.
//!   All clients on a machine share one instance.
//!
//! - **`Config`**: A configuration session. Walking its wrapper tree
//!   (`cloud()`, `hosts()`, `auth()`, `shapes()`) accumulates an operation
//!   path; terminal calls like `get`, `set` and `list` encode the path into
//!   a single request and execute it remotely.
//!
//! - **`Drive` / `Course`**: The deployment surface. A drive binds a
//!   configuration to a tau binary source; plotting a course selects shapes,
//!   and displacing it performs the rollout with streamed progress.
//!
//! ## Quickstart Example
//!
//! ```no_run
//! use anyhow::Result;
//! use futures::StreamExt;
//! use spore_drive::{Config, CourseConfig, Drive, Settings, TauSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     // Provision and start (or adopt) the local service.
//!     let url = spore_drive::start(&Settings::default()).await?;
//!
//!     // Open a fresh configuration session and describe the cloud.
//!     let mut config = Config::new(&url);
//!     config.init().await?;
//!     config.cloud()?.domain().root().set("example.com").await?;
//!     config.shapes()?.shape("compute").services().set(vec!["seer".into()]).await?;
//!     config.commit().await?;
//!
//!     // Deploy it.
//!     let mut drive = Drive::new(&url, &config, Some(TauSource::Latest)).await?;
//!     let course = drive.plot(CourseConfig::new(vec!["compute".into()])).await?;
//!     course.displace().await?;
//!
//!     let mut progress = course.progress().await?;
//!     while let Some(step) = progress.next().await {
//!         let step = step?;
//!         println!("{} {}: {}%", step.path, step.name, step.progress);
//!     }
//!
//!     drive.free().await?;
//!     config.free().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod drive;
pub mod error;
pub mod ops;
pub mod rpc;
pub mod schema;
pub mod service;
pub mod settings;

// Re-export public-facing components.
pub use config::types::{
    AuthConfig, BootstrapConfig, CloudConfig, DomainConfig, HostConfig, HostsConfig,
    LocationConfig, P2pConfig, PortsConfig, ShapeConfig, ShapesConfig, SignerConfig, SshConfig,
};
pub use config::{Config, ConfigSource};
pub use drive::{Course, CourseConfig, Drive, TauSource};
pub use error::{Error, Result};
pub use schema::config::BundleType;
pub use service::{ServiceManager, ServiceStatus, start};
pub use settings::Settings;
