//! # Provider Facade
//!
//! [`Provider`] is the entry point used by the CLI and by higher layers. It
//! owns one configuration document and resolves it on first use; every
//! accessor then reads the same [`ProviderConfig`]. Lifecycle operations
//! render the backend tree from that configuration and run the provisioning
//! backend.
//!
//! Each lifecycle operation moves through
//! `Unresolved -> Resolved -> BackendInvoked -> {Succeeded, Failed}`.
//! Configuration and pool errors stop the operation before the backend is
//! touched. A backend failure is returned with the backend's output verbatim
//! and is never retried.
//!
//! The collaborators are held as trait objects, so tests can drive a
//! provider with recording doubles:
//!
//! ```no_run
//! use blade_provider::provider::Provider;
//! use blade_provider::config::load_document;
//! use std::path::Path;
//!
//! # fn main() -> blade_provider::error::Result<()> {
//! let document = load_document(Path::new("provider.yaml"), &[])?;
//! let mut provider = Provider::with_defaults(document, "/tmp/build")?;
//! for blade in provider.get_blades()? {
//!     println!("{} {:?}", blade.name, blade.address);
//! }
//! provider.deploy()?;
//! # Ok(())
//! # }
//! ```

use std::cell::{Cell, OnceCell};
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Serialize;
use serde_yaml::Value as YamlValue;

use crate::backend::{Backend, BackendOutputs, TerragruntBackend, Verb};
use crate::cloud::{lookup_project_id, CloudCli, GcloudCli};
use crate::config::{ProviderConfig, ProviderSettings};
use crate::error::{Error, Result};
use crate::instances::{Interconnect, ResourceInstance};
use crate::process::Invocation;
use crate::render::BuildTree;
use crate::secrets::{CloudSecretStore, SecretsManager};

/// Where the current (or last) lifecycle operation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    Unresolved,
    Resolved,
    BackendInvoked,
    Succeeded,
    Failed,
}

/// Options for [`Provider::remove`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Remove even when resources are flagged `deletion_protection`.
    pub force: bool,
}

/// A blade instance together with what the backend reported for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BladeView<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub hostname: &'a str,
    pub address: Option<&'a str>,
    pub external_address: Option<&'a str>,
}

/// The resolved topology, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology<'a> {
    pub project: String,
    pub blades: Vec<BladeView<'a>>,
    pub interconnects: &'a [Interconnect],
    pub secrets: Vec<&'a str>,
}

pub struct Provider {
    document: YamlValue,
    config: OnceCell<ProviderConfig>,
    tree: BuildTree,
    backend: Box<dyn Backend>,
    cloud: Box<dyn CloudCli>,
    project_id: OnceCell<String>,
    outputs: Option<BackendOutputs>,
    state: Cell<OperationState>,
}

impl Provider {
    pub fn new(
        document: YamlValue,
        tree: BuildTree,
        backend: Box<dyn Backend>,
        cloud: Box<dyn CloudCli>,
    ) -> Self {
        Self {
            document,
            config: OnceCell::new(),
            tree,
            backend,
            cloud,
            project_id: OnceCell::new(),
            outputs: None,
            state: Cell::new(OperationState::Unresolved),
        }
    }

    /// A provider running the backend and cloud CLI named in the document's
    /// `commands` section, logging their output under `build_dir/logs`.
    pub fn with_defaults(document: YamlValue, build_dir: impl Into<PathBuf>) -> Result<Self> {
        let settings = ProviderSettings::from_document(&document)?;
        let tree = BuildTree::new(build_dir);
        let backend = TerragruntBackend::new(&settings.commands.backend)
            .with_output_log(tree.output_log());
        let cloud = GcloudCli::new(&settings.commands.cloud).with_output_log(tree.output_log());
        Ok(Self::new(document, tree, Box::new(backend), Box::new(cloud)))
    }

    pub fn state(&self) -> OperationState {
        self.state.get()
    }

    pub fn build_tree(&self) -> &BuildTree {
        &self.tree
    }

    /// The resolved configuration, resolving it on first call.
    pub fn config(&self) -> Result<&ProviderConfig> {
        if let Some(config) = self.config.get() {
            return Ok(config);
        }
        let config = self.track(ProviderConfig::resolve(&self.document))?;
        self.state.set(OperationState::Resolved);
        Ok(self.config.get_or_init(|| config))
    }

    /// Replace the configuration document. The next access resolves it from
    /// scratch.
    pub fn reconfigure(&mut self, document: YamlValue) {
        self.document = document;
        self.config = OnceCell::new();
        self.project_id = OnceCell::new();
        self.outputs = None;
        self.state.set(OperationState::Unresolved);
    }

    pub fn get_blades(&self) -> Result<&[ResourceInstance]> {
        Ok(self.config()?.blades())
    }

    pub fn get_interconnects(&self) -> Result<&[Interconnect]> {
        Ok(self.config()?.interconnects())
    }

    pub fn get_secrets(&self) -> Result<&SecretsManager> {
        Ok(self.config()?.secrets())
    }

    /// Outputs from the last successful `deploy` or `show`.
    pub fn outputs(&self) -> Option<&BackendOutputs> {
        self.outputs.as_ref()
    }

    /// The cloud project id, looked up once per provider.
    pub fn project_id(&self) -> Result<&str> {
        if let Some(id) = self.project_id.get() {
            return Ok(id);
        }
        let name = self.config()?.project_name();
        let id = lookup_project_id(self.cloud.as_ref(), &name)?;
        Ok(self.project_id.get_or_init(|| id))
    }

    /// Resolve and render, then run `plan`.
    pub fn validate(&self) -> Result<Invocation> {
        self.render()?;
        self.invoke(Verb::Plan, &self.tree.backend_dir())
    }

    /// Render the backend tree for the resolved configuration.
    pub fn render(&self) -> Result<Vec<PathBuf>> {
        let config = self.config()?;
        self.track(self.tree.render(config))
    }

    /// Apply the configuration, create declared secrets and refresh outputs.
    pub fn deploy(&mut self) -> Result<()> {
        self.render()?;
        self.invoke(Verb::Apply, &self.tree.backend_dir())?;
        let secrets = self.config()?.secrets();
        if !secrets.is_empty() {
            let store = CloudSecretStore::new(self.cloud.as_ref(), self.project_id()?);
            self.track(secrets.deploy(&store))?;
        }
        self.refresh_outputs()?;
        self.state.set(OperationState::Succeeded);
        info!("Deploy finished");
        Ok(())
    }

    /// Delete declared secrets and destroy every backend resource.
    ///
    /// Fails before touching anything when a resource is flagged
    /// `deletion_protection` and `options.force` is not set.
    pub fn remove(&mut self, options: RemoveOptions) -> Result<()> {
        let protected = self.config()?.protected_resources().to_vec();
        if !protected.is_empty() && !options.force {
            return self.track(Err(Error::DeletionProtected {
                resources: protected,
            }));
        }
        self.render()?;
        let secrets = self.config()?.secrets();
        if !secrets.is_empty() {
            let store = CloudSecretStore::new(self.cloud.as_ref(), self.project_id()?);
            self.track(secrets.remove(&store))?;
        }
        self.invoke(Verb::Destroy, &self.tree.backend_dir())?;
        self.outputs = None;
        self.state.set(OperationState::Succeeded);
        info!("Remove finished");
        Ok(())
    }

    /// Query the backend for its outputs and return the topology.
    pub fn show(&mut self) -> Result<Topology<'_>> {
        self.render()?;
        self.refresh_outputs()?;
        self.state.set(OperationState::Succeeded);
        self.topology()
    }

    /// The topology from resolved configuration and any cached outputs,
    /// without running the backend.
    pub fn topology(&self) -> Result<Topology<'_>> {
        let config = self.config()?;
        let outputs = self.outputs.as_ref();
        let blades = config
            .blades()
            .iter()
            .map(|blade| BladeView {
                class: &blade.class,
                name: &blade.name,
                hostname: &blade.hostname,
                address: blade.address.as_deref(),
                external_address: outputs.and_then(|o| o.external_address(&blade.name)),
            })
            .collect();
        Ok(Topology {
            project: config.project_name(),
            blades,
            interconnects: config.interconnects(),
            secrets: config.secrets().names().collect(),
        })
    }

    /// Destroy only the virtual blades, leaving networks in place.
    pub fn dismantle(&mut self) -> Result<()> {
        self.render()?;
        self.invoke(Verb::Destroy, &self.tree.virtual_blade_dir())?;
        self.state.set(OperationState::Succeeded);
        Ok(())
    }

    /// Re-create the virtual blades after [`Provider::dismantle`].
    pub fn restore(&mut self) -> Result<()> {
        self.render()?;
        self.invoke(Verb::Apply, &self.tree.virtual_blade_dir())?;
        self.refresh_outputs()?;
        self.state.set(OperationState::Succeeded);
        Ok(())
    }

    /// Read the current value of a declared secret.
    pub fn read_secret(&self, name: &str) -> Result<String> {
        let secrets = self.config()?.secrets();
        secrets.get(name)?;
        let store = CloudSecretStore::new(self.cloud.as_ref(), self.project_id()?);
        secrets.read(&store, name)
    }

    /// Store a new value for a declared secret.
    pub fn store_secret(&self, name: &str, value: &[u8]) -> Result<()> {
        let secrets = self.config()?.secrets();
        secrets.get(name)?;
        let store = CloudSecretStore::new(self.cloud.as_ref(), self.project_id()?);
        secrets.write(&store, name, value)
    }

    /// Paths of the public and private SSH key stored in `secret`.
    ///
    /// Unless `ignore_missing` is set, both files must be readable.
    pub fn ssh_key_paths(&self, secret: &str, ignore_missing: bool) -> Result<(PathBuf, PathBuf)> {
        let dir = self.tree.ssh_key_dir(secret);
        let public = dir.join("id_rsa.pub");
        let private = dir.join("id_rsa");
        if !ignore_missing {
            for path in [&public, &private] {
                File::open(path).map_err(|e| {
                    std::io::Error::new(
                        e.kind(),
                        format!("SSH key '{}' is not readable: {}", path.display(), e),
                    )
                })?;
            }
        }
        Ok((public, private))
    }

    fn refresh_outputs(&mut self) -> Result<()> {
        let invocation = self.invoke(Verb::Output, &self.tree.backend_dir())?;
        let outputs = self.track(BackendOutputs::parse(&invocation.stdout))?;
        self.outputs = Some(outputs);
        Ok(())
    }

    fn invoke(&self, verb: Verb, workdir: &Path) -> Result<Invocation> {
        self.state.set(OperationState::BackendInvoked);
        self.track(self.backend.run(verb, workdir))
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!("Operation failed: {}", e);
            self.state.set(OperationState::Failed);
        }
        result
    }
}
