//! Drives and courses: deploying a configuration onto its hosts.
//!
//! A drive binds one configuration session to a tau binary source. Plotting
//! a course picks the shapes to deploy; displacing the course performs the
//! rollout, with progress reported as a server stream.

use futures::Stream;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rpc::DriveClient;
use crate::schema::drive as drv;
use crate::schema::drive::DisplacementProgress;

/// Where the deployed tau binary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TauSource {
    /// Latest published release.
    Latest,
    /// A pinned release version.
    Version(String),
    /// A direct download URL.
    Url(String),
    /// A binary already present on the service host.
    Path(String),
}

/// Shape selection and rollout parallelism for one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseConfig {
    pub shapes: Vec<String>,
    pub concurrency: u32,
}

impl Default for CourseConfig {
    fn default() -> Self {
        CourseConfig {
            shapes: Vec::new(),
            concurrency: 1,
        }
    }
}

impl TauSource {
    fn apply(self, request: &mut drv::DriveRequest) {
        match self {
            TauSource::Latest => request.latest = Some(true),
            TauSource::Version(v) => request.version = Some(v),
            TauSource::Url(u) => request.url = Some(u),
            TauSource::Path(p) => request.path = Some(p),
        }
    }
}

impl CourseConfig {
    pub fn new(shapes: Vec<String>) -> Self {
        CourseConfig {
            shapes,
            ..CourseConfig::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Validation(
                "course concurrency must be at least 1".to_owned(),
            ));
        }
        // The wire field is a signed 32-bit integer.
        if self.concurrency > i32::MAX as u32 {
            return Err(Error::Validation(format!(
                "course concurrency {} exceeds the supported maximum {}",
                self.concurrency,
                i32::MAX
            )));
        }
        Ok(())
    }
}

/// A configuration bound to a tau source, ready to plot courses.
pub struct Drive {
    client: DriveClient,
    handle: Option<drv::Drive>,
}

impl Drive {
    /// Creates a drive for an initialized configuration session.
    ///
    /// `tau` defaults to the service's own choice when `None`.
    pub async fn new(base_url: &str, config: &Config, tau: Option<TauSource>) -> Result<Self> {
        let mut request = drv::DriveRequest {
            config: config.handle()?,
            ..drv::DriveRequest::default()
        };
        if let Some(tau) = tau {
            tau.apply(&mut request);
        }

        let client = DriveClient::new(base_url);
        let handle = client.new_drive(&request).await?;
        Ok(Drive {
            client,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.handle.as_ref().map(|h| h.id.as_str())
    }

    fn handle(&self) -> Result<&drv::Drive> {
        self.handle.as_ref().ok_or(Error::NotInitialized("drive"))
    }

    /// Plots a course over the selected shapes.
    pub async fn plot(&self, course: CourseConfig) -> Result<Course> {
        course.validate()?;
        let request = drv::PlotRequest {
            drive: self.handle()?.clone(),
            shapes: course.shapes,
            concurrency: course.concurrency as i32,
        };
        let handle = self.client.plot(&request).await?;
        Ok(Course {
            client: self.client.clone(),
            handle,
        })
    }

    /// Releases the drive on the service side.
    pub async fn free(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            self.client.free(&handle).await?;
        }
        Ok(())
    }
}

/// A plotted course; displacement performs the deployment.
pub struct Course {
    client: DriveClient,
    handle: drv::Course,
}

impl Course {
    pub fn id(&self) -> &str {
        &self.handle.id
    }

    /// Starts the rollout. Returns once the service accepted the course;
    /// follow [`progress`](Self::progress) for completion.
    pub async fn displace(&self) -> Result<()> {
        self.client.displace(&self.handle).await?;
        Ok(())
    }

    /// Streams progress records until the rollout finishes or aborts.
    pub async fn progress(
        &self,
    ) -> Result<impl Stream<Item = Result<DisplacementProgress>> + Unpin> {
        self.client.progress(&self.handle).await
    }

    /// Asks the service to abandon the rollout.
    pub async fn abort(&self) -> Result<()> {
        self.client.abort(&self.handle).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let course = CourseConfig {
            shapes: vec!["compute".into()],
            concurrency: 0,
        };
        assert!(matches!(course.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn concurrency_above_the_wire_range_is_rejected() {
        let course = CourseConfig {
            shapes: vec!["compute".into()],
            concurrency: u32::MAX,
        };
        assert!(matches!(course.validate(), Err(Error::Validation(_))));

        let max = CourseConfig {
            shapes: Vec::new(),
            concurrency: i32::MAX as u32,
        };
        max.validate().unwrap();
    }

    #[test]
    fn default_course_deploys_everything_serially() {
        let course = CourseConfig::default();
        assert!(course.shapes.is_empty());
        assert_eq!(course.concurrency, 1);
        course.validate().unwrap();
    }

    #[test]
    fn tau_source_maps_onto_request_fields() {
        let mut request = drv::DriveRequest::default();
        TauSource::Version("1.2.3".into()).apply(&mut request);
        assert_eq!(request.version.as_deref(), Some("1.2.3"));
        assert!(request.latest.is_none() && request.url.is_none() && request.path.is_none());

        let mut request = drv::DriveRequest::default();
        TauSource::Latest.apply(&mut request);
        assert_eq!(request.latest, Some(true));
    }
}
