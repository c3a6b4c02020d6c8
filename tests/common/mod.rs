//! Common test utilities for integration tests.
//!
//! This module provides shared helpers for CLI end-to-end tests:
//!
//! - [`prelude`]: re-exports of the crates every test file uses
//! - [`configs`]: provider configurations covering the usual shapes
//! - [`TestFixture`]: a temporary directory holding a `provider.yaml`, an
//!   isolated build directory and optional fake collaborator scripts
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = TestFixture::new().with_config(configs::SINGLE_BLADE);
//! fixture.command().arg("validate").assert().success();
//! ```

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;

/// Common imports for CLI tests.
#[allow(unused_imports)]
pub mod prelude {
    pub use super::{configs, TestFixture};
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;
}

/// Provider configurations used across tests.
#[allow(dead_code)]
pub mod configs {
    /// Settings only, no classes.
    pub const MINIMAL: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab}
"#;

    /// One network and one unsuffixed blade.
    pub const SINGLE_BLADE: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab, zone: us-central1-a}
  blade_interconnects:
    net:
      network_name: cluster
      ipv4_cidr: 10.0.0.0/24
  virtual_blades:
    compute:
      hostname: node
      machine_type: e2-small
      count: 1
      blade_interconnect:
        subnetwork: cluster
"#;

    /// Inheritance through a pure base class, with an address pool.
    pub const INHERITED: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab}
  blade_interconnects:
    base-net:
      pure_base_class: true
      ipv4_cidr: 10.0.0.0/24
    net:
      parent_class: base-net
      network_name: cluster
  virtual_blades:
    base-blade:
      pure_base_class: true
      machine_type: n1-standard-4
      hostname: node
      count: 0
      blade_interconnect:
        subnetwork: cluster
    compute:
      parent_class: base-blade
      count: 3
      blade_interconnect:
        ip_addrs: [10.0.0.2, 10.0.0.3, 10.0.0.4]
    gpu:
      parent_class: compute
      hostname: gpu
      count: 1
      add_hostname_suffix: true
      machine_type: a2-highgpu-1g
"#;

    /// Two classes that name each other as parent.
    pub const CYCLIC: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab}
  virtual_blades:
    a: {parent_class: b}
    b: {parent_class: a}
"#;

    /// A class whose parent does not exist.
    pub const UNKNOWN_PARENT: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab}
  virtual_blades:
    compute: {parent_class: missing, count: 1}
"#;

    /// A network flagged with deletion protection.
    pub const PROTECTED: &str = r#"
provider:
  organization: {name: acme}
  project: {base_name: lab}
  blade_interconnects:
    net:
      network_name: cluster
      ipv4_cidr: 10.0.0.0/24
      deletion_protection: true
"#;
}

/// Fake backend: records its arguments next to itself and answers `output`
/// with a single blade address.
#[allow(dead_code)]
pub const FAKE_BACKEND: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/backend.calls"
case "$2" in
  output) echo '{"blades": {"value": {"node": "34.0.0.1"}}}' ;;
esac
"#;

/// Fake backend that always fails.
#[allow(dead_code)]
pub const FAILING_BACKEND: &str = r#"#!/bin/sh
echo "quota exceeded" >&2
exit 3
"#;

/// A test fixture that provides a temporary directory with optional config.
///
/// Commands created through [`TestFixture::command`] run inside the
/// directory with `--build-dir` pointing at `build/` below it, so no test
/// writes to the user's cache.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `provider.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("provider.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add an executable script and return its absolute path.
    #[cfg(unix)]
    #[allow(dead_code)]
    pub fn script(&self, name: &str, content: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path().join(name);
        std::fs::write(&path, content).expect("Failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
        path
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.path().join("provider.yaml")
    }

    /// The build directory commands are pointed at.
    pub fn build_dir(&self) -> PathBuf {
        self.path().join("build")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("blade-provider");
        cmd.current_dir(self.path())
            .env_remove("BLADE_PROVIDER_CONFIG")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--build-dir")
            .arg(self.build_dir());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_config(configs::MINIMAL);
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        for config in [
            configs::MINIMAL,
            configs::SINGLE_BLADE,
            configs::INHERITED,
            configs::CYCLIC,
            configs::UNKNOWN_PARENT,
            configs::PROTECTED,
        ] {
            let parsed: Result<serde_yaml::Value, _> = serde_yaml::from_str(config);
            assert!(parsed.is_ok(), "Config should be valid YAML: {}", config);
        }
    }
}
