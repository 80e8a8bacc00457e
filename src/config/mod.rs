//! Configuration sessions and the typed operation tree.
//!
//! A [`Config`] opens one session against the service and hands out cheap
//! wrapper values (`Cloud`, `Hosts`, ...) that accumulate an operation path
//! while walking the tree. Nothing talks to the service until a terminal
//! call like `get`, `set` or `list` folds the path into a single request.
//!
//! Wrappers borrow nothing: each one owns its path and a shared session
//! handle, so they can be held across awaits and cloned freely.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ops::{Action, OpPath, Selector};
use crate::rpc::ConfigClient;
use crate::schema::config as cfg;
use crate::schema::config::{BundleConfig, BundleType, Op, Return, Source, SourceUpload};

pub mod leaf;
pub mod types;

use leaf::{BytesLeaf, ListLeaf, StringLeaf, U64Leaf, list_value, string_value};
use types::{
    AuthConfig, BootstrapConfig, CloudConfig, DomainConfig, HostConfig, HostsConfig, P2pConfig,
    PortsConfig, ShapeConfig, ShapesConfig, SignerConfig, SshConfig,
};

/// Archive frames are streamed in fixed-size chunks.
const UPLOAD_CHUNK: usize = 32 * 1024;

/// One open session: the client plus the server-issued handle.
pub(crate) struct Session {
    client: ConfigClient,
    handle: cfg::Config,
}

impl Session {
    /// Folds, binds and executes one operation.
    ///
    /// Remote failures degrade to an empty response envelope so value reads
    /// surface as "not set" rather than aborting a whole traversal; schema
    /// errors always propagate since they indicate a bad request.
    pub(crate) async fn run(&self, path: &OpPath, action: Action) -> Result<Return> {
        let request = path.fold(action)?;
        let op = Op::bind(self.handle.clone(), &request)?;
        match self.client.do_op(&op).await {
            Ok(ret) => Ok(ret),
            Err(e @ (Error::Transport(_) | Error::Rpc { .. } | Error::Decode(_))) => {
                warn!(path = %path.dotted(), error = %e, "operation failed, treating as empty");
                Ok(Return::default())
            }
            Err(e) => Err(e),
        }
    }
}

/// Where a session gets its initial contents.
pub enum ConfigSource {
    /// Fresh, empty configuration.
    New,
    /// A directory on the service host.
    Directory(String),
    /// A configuration archive uploaded from memory.
    Archive(Vec<u8>),
}

/// A configuration session against a running service instance.
pub struct Config {
    client: ConfigClient,
    source: ConfigSource,
    session: Option<Arc<Session>>,
}

impl Config {
    /// Prepares an empty session; call [`init`](Self::init) to open it.
    pub fn new(base_url: &str) -> Self {
        Config {
            client: ConfigClient::new(base_url),
            source: ConfigSource::New,
            session: None,
        }
    }

    /// Prepares a session loading from a directory on the service host.
    pub fn from_directory(base_url: &str, directory: impl Into<String>) -> Self {
        Config {
            client: ConfigClient::new(base_url),
            source: ConfigSource::Directory(directory.into()),
            session: None,
        }
    }

    /// Prepares a session seeded from archive bytes.
    pub fn from_archive(base_url: &str, archive: Vec<u8>) -> Self {
        Config {
            client: ConfigClient::new(base_url),
            source: ConfigSource::Archive(archive),
            session: None,
        }
    }

    /// Opens the session. Idempotent; a second call is a no-op.
    pub async fn init(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let handle = match &self.source {
            ConfigSource::New => self.client.new_session().await?,
            ConfigSource::Directory(dir) => {
                let source = Source {
                    root: dir.clone(),
                    path: "/".to_owned(),
                };
                self.client.load(&source).await?
            }
            ConfigSource::Archive(bytes) => {
                let frames: Vec<SourceUpload> = bytes
                    .chunks(UPLOAD_CHUNK)
                    .map(|c| SourceUpload::chunk(c.to_vec()))
                    .collect();
                self.client.upload(&frames).await?
            }
        };
        debug!(id = %handle.id, "configuration session opened");
        self.session = Some(Arc::new(Session {
            client: self.client.clone(),
            handle,
        }));
        Ok(())
    }

    /// The server-issued session id, once initialized.
    pub fn id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.handle.id.as_str())
    }

    pub(crate) fn handle(&self) -> Result<cfg::Config> {
        Ok(self.session()?.handle.clone())
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.session
            .clone()
            .ok_or(Error::NotInitialized("configuration session"))
    }

    pub fn cloud(&self) -> Result<Cloud> {
        Ok(Cloud {
            session: self.session()?,
            path: OpPath::root("cloud"),
        })
    }

    pub fn hosts(&self) -> Result<Hosts> {
        Ok(Hosts {
            session: self.session()?,
            path: OpPath::root("hosts"),
        })
    }

    pub fn auth(&self) -> Result<Auth> {
        Ok(Auth {
            session: self.session()?,
            path: OpPath::root("auth"),
        })
    }

    pub fn shapes(&self) -> Result<Shapes> {
        Ok(Shapes {
            session: self.session()?,
            path: OpPath::root("shapes"),
        })
    }

    /// Persists pending changes on the service side.
    pub async fn commit(&self) -> Result<()> {
        let session = self.session()?;
        session.client.commit(&session.handle).await?;
        Ok(())
    }

    /// Downloads the configuration as one archive blob.
    pub async fn download(&self, bundle_type: BundleType) -> Result<Vec<u8>> {
        let session = self.session()?;
        let request = BundleConfig {
            id: session.handle.clone(),
            bundle_type,
        };
        let mut frames = session.client.download(&request).await?;
        let mut archive = Vec::new();
        while let Some(frame) = frames.next().await {
            if let Some(chunk) = frame?.chunk {
                archive.extend_from_slice(&chunk.0);
            }
        }
        Ok(archive)
    }

    /// Releases the session. Safe to call on an uninitialized config.
    pub async fn free(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.client.free(&session.handle).await?;
        }
        Ok(())
    }
}

/// Cloud-level settings: domain and peer-to-peer networking.
#[derive(Clone)]
pub struct Cloud {
    session: Arc<Session>,
    path: OpPath,
}

impl Cloud {
    pub fn domain(&self) -> Domain {
        Domain {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("domain")),
        }
    }

    pub fn p2p(&self) -> P2p {
        P2p {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("p2p")),
        }
    }

    pub async fn set(&self, value: CloudConfig) -> Result<()> {
        if let Some(domain) = value.domain {
            self.domain().set(domain).await?;
        }
        if let Some(p2p) = value.p2p {
            self.p2p().set(p2p).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Domain {
    session: Arc<Session>,
    path: OpPath,
}

impl Domain {
    pub fn root(&self) -> StringLeaf {
        StringLeaf::new(self.session.clone(), self.path.push(Selector::tag("root")))
    }

    pub fn generated(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("generated")),
        )
    }

    pub fn validation(&self) -> Validation {
        Validation {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("validation")),
        }
    }

    pub async fn set(&self, value: DomainConfig) -> Result<()> {
        if let Some(root) = value.root {
            self.root().set(root).await?;
        }
        if let Some(generated) = value.generated {
            self.generated().set(generated).await?;
        }
        Ok(())
    }
}

/// Domain validation key material.
#[derive(Clone)]
pub struct Validation {
    session: Arc<Session>,
    path: OpPath,
}

impl Validation {
    pub fn keys(&self) -> ValidationKeys {
        ValidationKeys {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("keys")),
        }
    }

    /// Generates a fresh validation key pair on the service side.
    pub async fn generate(&self) -> Result<()> {
        self.session.run(&self.path, Action::Generate).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ValidationKeys {
    session: Arc<Session>,
    path: OpPath,
}

impl ValidationKeys {
    /// Key file locations inside the configuration.
    pub fn path(&self) -> ValidationKeyPaths {
        ValidationKeyPaths {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("path")),
        }
    }

    /// Raw key material.
    pub fn data(&self) -> ValidationKeyData {
        ValidationKeyData {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("data")),
        }
    }
}

#[derive(Clone)]
pub struct ValidationKeyPaths {
    session: Arc<Session>,
    path: OpPath,
}

impl ValidationKeyPaths {
    pub fn private_key(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("privateKey")),
        )
    }

    pub fn public_key(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("publicKey")),
        )
    }
}

#[derive(Clone)]
pub struct ValidationKeyData {
    session: Arc<Session>,
    path: OpPath,
}

impl ValidationKeyData {
    pub fn private_key(&self) -> BytesLeaf {
        BytesLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("privateKey")),
        )
    }

    pub fn public_key(&self) -> BytesLeaf {
        BytesLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("publicKey")),
        )
    }
}

#[derive(Clone)]
pub struct P2p {
    session: Arc<Session>,
    path: OpPath,
}

impl P2p {
    pub fn bootstrap(&self) -> Bootstrap {
        Bootstrap {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("bootstrap")),
        }
    }

    pub fn swarm(&self) -> Swarm {
        Swarm {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("swarm")),
        }
    }

    pub async fn set(&self, value: P2pConfig) -> Result<()> {
        if let Some(bootstrap) = value.bootstrap {
            self.bootstrap().set(bootstrap).await?;
        }
        Ok(())
    }
}

/// Bootstrap peer lists, one per shape.
#[derive(Clone)]
pub struct Bootstrap {
    session: Arc<Session>,
    path: OpPath,
}

impl Bootstrap {
    pub fn shape(&self, shape: impl Into<String>) -> BootstrapShape {
        BootstrapShape {
            session: self.session.clone(),
            path: self.path.push(Selector::shaped("select", shape)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, value: BootstrapConfig) -> Result<()> {
        for (shape, nodes) in value.shapes {
            if !nodes.is_empty() {
                self.shape(shape).nodes().set(nodes).await?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct BootstrapShape {
    session: Arc<Session>,
    path: OpPath,
}

impl BootstrapShape {
    pub fn nodes(&self) -> ListLeaf {
        ListLeaf::new(self.session.clone(), self.path.push(Selector::tag("nodes")))
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Swarm {
    session: Arc<Session>,
    path: OpPath,
}

impl Swarm {
    pub fn key(&self) -> SwarmKey {
        SwarmKey {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("key")),
        }
    }

    /// Generates a fresh swarm key on the service side.
    pub async fn generate(&self) -> Result<()> {
        self.session.run(&self.path, Action::Generate).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SwarmKey {
    session: Arc<Session>,
    path: OpPath,
}

impl SwarmKey {
    pub fn path(&self) -> StringLeaf {
        StringLeaf::new(self.session.clone(), self.path.push(Selector::tag("path")))
    }

    pub fn data(&self) -> BytesLeaf {
        BytesLeaf::new(self.session.clone(), self.path.push(Selector::tag("data")))
    }
}

/// The machines the cloud is deployed onto.
#[derive(Clone)]
pub struct Hosts {
    session: Arc<Session>,
    path: OpPath,
}

impl Hosts {
    pub fn host(&self, name: impl Into<String>) -> Host {
        Host {
            session: self.session.clone(),
            path: self.path.push(Selector::named("select", name)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, value: HostsConfig) -> Result<()> {
        for (name, host) in value.hosts {
            self.host(name).set(host).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Host {
    session: Arc<Session>,
    path: OpPath,
}

impl Host {
    pub fn addresses(&self) -> ListLeaf {
        ListLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("addresses")),
        )
    }

    pub fn ssh(&self) -> Ssh {
        Ssh {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("ssh")),
        }
    }

    /// Geographic location, stored as a `lat,long` string.
    pub fn location(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("location")),
        )
    }

    pub fn shapes(&self) -> HostShapes {
        HostShapes {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("shapes")),
        }
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }

    pub async fn set(&self, value: HostConfig) -> Result<()> {
        if let Some(addr) = value.addr {
            self.addresses().set(addr).await?;
        }
        if let Some(ssh) = value.ssh {
            self.ssh().set(ssh).await?;
        }
        if let Some(location) = value.location {
            self.location().set(location.to_string()).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Ssh {
    session: Arc<Session>,
    path: OpPath,
}

impl Ssh {
    /// The `host:port` endpoint used to reach the machine.
    pub fn address(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("address")),
        )
    }

    /// Names of signers allowed to authenticate.
    pub fn auth(&self) -> ListLeaf {
        ListLeaf::new(self.session.clone(), self.path.push(Selector::tag("auth")))
    }

    pub async fn set(&self, value: SshConfig) -> Result<()> {
        if let Some(addr) = value.full_addr() {
            self.address().set(addr).await?;
        }
        if let Some(auth) = value.auth {
            self.auth().set(auth).await?;
        }
        Ok(())
    }
}

/// Shape instances assigned to one host.
#[derive(Clone)]
pub struct HostShapes {
    session: Arc<Session>,
    path: OpPath,
}

impl HostShapes {
    pub fn shape(&self, name: impl Into<String>) -> HostShape {
        HostShape {
            session: self.session.clone(),
            path: self.path.push(Selector::named("select", name)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }
}

#[derive(Clone)]
pub struct HostShape {
    session: Arc<Session>,
    path: OpPath,
}

impl HostShape {
    fn instance(&self) -> OpPath {
        self.path.push(Selector::tag("select"))
    }

    /// The instance id of this shape on this host.
    pub async fn id(&self) -> Result<String> {
        let path = self.instance();
        let ret = self.session.run(&path, Action::Id).await?;
        string_value(ret, &path)
    }

    /// The instance private key.
    pub fn key(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.instance().push(Selector::tag("key")),
        )
    }

    /// Generates the instance id and key on the service side.
    pub async fn generate(&self) -> Result<()> {
        let path = self.instance();
        self.session.run(&path, Action::Generate).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }
}

/// SSH signers used to authenticate against hosts.
#[derive(Clone)]
pub struct Auth {
    session: Arc<Session>,
    path: OpPath,
}

impl Auth {
    pub fn signer(&self, name: impl Into<String>) -> Signer {
        Signer {
            session: self.session.clone(),
            path: self.path.push(Selector::named("select", name)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, value: AuthConfig) -> Result<()> {
        for (name, signer) in value.signers {
            self.signer(name).set(signer).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Signer {
    session: Arc<Session>,
    path: OpPath,
}

impl Signer {
    pub fn username(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("username")),
        )
    }

    pub fn password(&self) -> StringLeaf {
        StringLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("password")),
        )
    }

    pub fn key(&self) -> SshKey {
        SshKey {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("key")),
        }
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }

    /// Applies signer credentials. A signer authenticates with either a
    /// password or a key file, never both.
    pub async fn set(&self, value: SignerConfig) -> Result<()> {
        if value.password.is_some() && value.key.is_some() {
            return Err(Error::Validation(
                "signer cannot use both a password and a key".to_owned(),
            ));
        }
        if let Some(username) = value.username {
            self.username().set(username).await?;
        }
        if let Some(password) = value.password {
            self.password().set(password).await?;
        }
        if let Some(key) = value.key {
            self.key().path().set(key).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SshKey {
    session: Arc<Session>,
    path: OpPath,
}

impl SshKey {
    pub fn path(&self) -> StringLeaf {
        StringLeaf::new(self.session.clone(), self.path.push(Selector::tag("path")))
    }

    pub fn data(&self) -> BytesLeaf {
        BytesLeaf::new(self.session.clone(), self.path.push(Selector::tag("data")))
    }
}

/// Deployment shapes: named service bundles.
#[derive(Clone)]
pub struct Shapes {
    session: Arc<Session>,
    path: OpPath,
}

impl Shapes {
    pub fn shape(&self, name: impl Into<String>) -> Shape {
        Shape {
            session: self.session.clone(),
            path: self.path.push(Selector::named("select", name)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, value: ShapesConfig) -> Result<()> {
        for (name, shape) in value.shapes {
            self.shape(name).set(shape).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Shape {
    session: Arc<Session>,
    path: OpPath,
}

impl Shape {
    pub fn services(&self) -> ListLeaf {
        ListLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("services")),
        )
    }

    pub fn ports(&self) -> Ports {
        Ports {
            session: self.session.clone(),
            path: self.path.push(Selector::tag("ports")),
        }
    }

    pub fn plugins(&self) -> ListLeaf {
        ListLeaf::new(
            self.session.clone(),
            self.path.push(Selector::tag("plugins")),
        )
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }

    pub async fn set(&self, value: ShapeConfig) -> Result<()> {
        if let Some(services) = value.services {
            self.services().set(services).await?;
        }
        if let Some(ports) = value.ports {
            self.ports().set(ports).await?;
        }
        if let Some(plugins) = value.plugins {
            self.plugins().set(plugins).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Ports {
    session: Arc<Session>,
    path: OpPath,
}

impl Ports {
    pub fn port(&self, name: impl Into<String>) -> Port {
        Port {
            session: self.session.clone(),
            path: self.path.push(Selector::named("select", name)),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let ret = self.session.run(&self.path, Action::List).await?;
        Ok(list_value(ret))
    }

    pub async fn set(&self, value: PortsConfig) -> Result<()> {
        for (name, port) in value.ports {
            self.port(name).set(port).await?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Port {
    session: Arc<Session>,
    path: OpPath,
}

impl Port {
    fn leaf(&self) -> U64Leaf {
        U64Leaf::new(self.session.clone(), self.path.clone())
    }

    pub async fn get(&self) -> Result<u64> {
        self.leaf().get().await
    }

    pub async fn set(&self, value: u64) -> Result<()> {
        self.leaf().set(value).await
    }

    pub async fn delete(&self) -> Result<()> {
        self.session.run(&self.path, Action::Delete(None)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Arc<Session> {
        Arc::new(Session {
            client: ConfigClient::new("http://127.0.0.1:1"),
            handle: cfg::Config { id: "t".into() },
        })
    }

    #[test]
    fn uninitialized_sessions_are_rejected() {
        let config = Config::new("http://127.0.0.1:1");
        assert!(config.id().is_none());
        assert!(matches!(config.cloud(), Err(Error::NotInitialized(_))));
        assert!(matches!(config.shapes(), Err(Error::NotInitialized(_))));
    }

    #[test]
    fn wrappers_accumulate_dotted_paths() {
        let cloud = Cloud {
            session: session(),
            path: OpPath::root("cloud"),
        };
        assert_eq!(
            cloud.domain().validation().keys().path().path.dotted(),
            "cloud.domain.validation.keys.path"
        );
        assert_eq!(
            cloud.p2p().bootstrap().shape("seed").path.dotted(),
            "cloud.p2p.bootstrap.select[seed]"
        );

        let hosts = Hosts {
            session: session(),
            path: OpPath::root("hosts"),
        };
        assert_eq!(
            hosts.host("h1").shapes().shape("compute").instance().dotted(),
            "hosts.select[h1].shapes.select[compute].select"
        );
    }

    #[test]
    fn sibling_wrappers_do_not_share_path_state() {
        let cloud = Cloud {
            session: session(),
            path: OpPath::root("cloud"),
        };
        let domain = cloud.domain();
        let p2p = cloud.p2p();
        assert_eq!(domain.path.dotted(), "cloud.domain");
        assert_eq!(p2p.path.dotted(), "cloud.p2p");
        assert_eq!(cloud.path.dotted(), "cloud");
    }
}
