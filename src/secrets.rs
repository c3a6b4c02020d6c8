//! # Secrets Manager
//!
//! Secrets are declared in the `secrets` section of the configuration:
//!
//! ```yaml
//! secrets:
//!   blade_ssh_key:
//!     name: acme-blade-ssh-key
//!     labels: {owner: platform}
//!     annotations: {rotation: manual}
//!     application_metadata: {}
//! ```
//!
//! Declarations are collected once, when the configuration is resolved.
//! Values live only in the external secret store; every read and write goes
//! through a [`SecretStore`] and nothing is cached between calls.

use std::collections::BTreeMap;

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::cloud::CloudCli;
use crate::error::{Error, Result};

/// A declared secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretDefinition {
    /// Name of the secret in the store.
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Free-form data for the layers consuming the secret.
    #[serde(default)]
    pub application_metadata: Mapping,
}

impl SecretDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            application_metadata: Mapping::new(),
        }
    }

    /// Check that labels and annotations can be passed as `k=v,k=v`.
    pub fn validate(&self) -> Result<()> {
        let no_whitespace = Regex::new(r"^\S*$").map_err(|e| Error::config(e.to_string()))?;
        for (field, entries) in [("labels", &self.labels), ("annotations", &self.annotations)] {
            for (key, value) in entries {
                if !no_whitespace.is_match(key) || !no_whitespace.is_match(value) {
                    return Err(Error::ConfigParse {
                        message: format!(
                            "secret '{}' has whitespace in '{}' entry ['{}':'{}']",
                            self.name, field, key, value
                        ),
                        hint: None,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Join a map into the `k=v,k=v` form used on the command line.
pub fn expand_pairs(pairs: &BTreeMap<String, String>) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Backing storage for secret values.
pub trait SecretStore {
    /// Register an empty secret.
    fn create(&self, secret: &SecretDefinition) -> Result<()>;

    /// Delete a secret and all of its versions.
    fn delete(&self, secret: &SecretDefinition) -> Result<()>;

    /// Store `data` as the newest version.
    fn add_version(&self, secret: &SecretDefinition, data: &[u8]) -> Result<()>;

    /// Fetch the newest version.
    fn access_latest(&self, secret: &SecretDefinition) -> Result<String>;
}

/// The cloud secret manager, driven through the cloud CLI.
pub struct CloudSecretStore<'a> {
    cli: &'a dyn CloudCli,
    project_id: String,
}

impl<'a> CloudSecretStore<'a> {
    pub fn new(cli: &'a dyn CloudCli, project_id: impl Into<String>) -> Self {
        Self {
            cli,
            project_id: project_id.into(),
        }
    }

    fn project_arg(&self) -> String {
        format!("--project={}", self.project_id)
    }

    fn run(&self, secret: &SecretDefinition, args: Vec<String>, input: Option<&[u8]>) -> Result<String> {
        self.cli
            .run(&args, input)
            .map(|invocation| invocation.stdout)
            .map_err(|e| Error::SecretStore {
                name: secret.name.clone(),
                message: e.to_string(),
            })
    }
}

impl SecretStore for CloudSecretStore<'_> {
    fn create(&self, secret: &SecretDefinition) -> Result<()> {
        secret.validate()?;
        let mut args = vec![
            "secrets".to_string(),
            "create".to_string(),
            secret.name.clone(),
            self.project_arg(),
        ];
        if !secret.labels.is_empty() {
            args.push(format!("--labels={}", expand_pairs(&secret.labels)));
        }
        if !secret.annotations.is_empty() {
            args.push(format!("--set-annotations={}", expand_pairs(&secret.annotations)));
        }
        self.run(secret, args, None).map(|_| ())
    }

    fn delete(&self, secret: &SecretDefinition) -> Result<()> {
        let args = vec![
            "secrets".to_string(),
            "delete".to_string(),
            secret.name.clone(),
            self.project_arg(),
            "--quiet".to_string(),
        ];
        self.run(secret, args, None).map(|_| ())
    }

    fn add_version(&self, secret: &SecretDefinition, data: &[u8]) -> Result<()> {
        let args = vec![
            "secrets".to_string(),
            "versions".to_string(),
            "add".to_string(),
            self.project_arg(),
            "--data-file=-".to_string(),
            secret.name.clone(),
        ];
        self.run(secret, args, Some(data)).map(|_| ())
    }

    fn access_latest(&self, secret: &SecretDefinition) -> Result<String> {
        let args = vec![
            "secrets".to_string(),
            "versions".to_string(),
            "access".to_string(),
            "latest".to_string(),
            self.project_arg(),
            format!("--secret={}", secret.name),
        ];
        self.run(secret, args, None)
            .map(|stdout| stdout.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// The declared secrets of one provider configuration, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecretsManager {
    secrets: BTreeMap<String, SecretDefinition>,
}

impl SecretsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the manager from the `secrets` configuration section.
    ///
    /// Every entry must carry a `name`; all offending keys are reported
    /// together.
    pub fn from_config(section: Option<&YamlValue>) -> Result<Self> {
        let mut manager = Self::new();
        let entries = match section {
            None | Some(YamlValue::Null) => return Ok(manager),
            Some(YamlValue::Mapping(entries)) => entries,
            Some(_) => return Err(Error::config("'secrets' must be a mapping")),
        };

        let unnamed: Vec<String> = entries
            .iter()
            .filter(|(_, secret)| secret.get("name").and_then(YamlValue::as_str).is_none())
            .map(|(key, _)| key.as_str().map(str::to_string).unwrap_or_else(|| format!("{:?}", key)))
            .collect();
        if !unnamed.is_empty() {
            return Err(Error::ConfigParse {
                message: format!(
                    "the following secrets (by key) do not define a 'name' field: {}",
                    unnamed.join(", ")
                ),
                hint: None,
            });
        }

        for (key, value) in entries {
            let secret: SecretDefinition =
                serde_yaml::from_value(value.clone()).map_err(|e| Error::ConfigParse {
                    message: format!("secret '{}': {}", key.as_str().unwrap_or("?"), e),
                    hint: None,
                })?;
            manager.declare(secret)?;
        }
        Ok(manager)
    }

    /// Add a secret declaration.
    pub fn declare(&mut self, secret: SecretDefinition) -> Result<()> {
        secret.validate()?;
        if self.secrets.contains_key(&secret.name) {
            return Err(Error::config(format!(
                "secret name '{}' is declared more than once",
                secret.name
            )));
        }
        debug!("Declared secret '{}'", secret.name);
        self.secrets.insert(secret.name.clone(), secret);
        Ok(())
    }

    /// The declaration of `name`.
    pub fn get(&self, name: &str) -> Result<&SecretDefinition> {
        self.secrets.get(name).ok_or_else(|| Error::UnknownSecret {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &SecretDefinition> {
        self.secrets.values()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Read the current value of `name` from the store.
    pub fn read(&self, store: &dyn SecretStore, name: &str) -> Result<String> {
        let secret = self.get(name)?;
        store.access_latest(secret)
    }

    /// Store `value` as the new value of `name`.
    pub fn write(&self, store: &dyn SecretStore, name: &str, value: &[u8]) -> Result<()> {
        let secret = self.get(name)?;
        store.add_version(secret, value)?;
        info!("Stored a new version of secret '{}'", name);
        Ok(())
    }

    /// Create every declared secret in the store.
    pub fn deploy(&self, store: &dyn SecretStore) -> Result<()> {
        for secret in self.secrets.values() {
            store.create(secret)?;
            info!("Created secret '{}'", secret.name);
        }
        Ok(())
    }

    /// Delete every declared secret from the store.
    pub fn remove(&self, store: &dyn SecretStore) -> Result<()> {
        for secret in self.secrets.values() {
            store.delete(secret)?;
            info!("Deleted secret '{}'", secret.name);
        }
        Ok(())
    }
}
