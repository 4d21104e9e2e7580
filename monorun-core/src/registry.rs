//! Package discovery from `package.json` manifests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::package::Package;

/// The subset of a `package.json` manifest the registry cares about.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

impl Manifest {
    /// Union of dependency names across all three tables. Version ranges
    /// are discarded; only the names matter for graph purposes.
    fn dependency_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        names.extend(self.dependencies.keys().cloned());
        names.extend(self.dev_dependencies.keys().cloned());
        names.extend(self.peer_dependencies.keys().cloned());
        names.into_iter().collect()
    }
}

/// Scans a directory tree for packages.
///
/// Looks for `package.json` files up to a few levels deep, skipping
/// `node_modules`, and parses them into `Package` records.
pub struct Registry {
    packages_dir: PathBuf,
}

impl Registry {
    pub fn new(packages_dir: impl AsRef<Path>) -> Self {
        Self {
            packages_dir: packages_dir.as_ref().to_path_buf(),
        }
    }

    /// Returns all discovered packages, sorted by name.
    pub fn list_packages(&self) -> Result<Vec<Package>> {
        let manifest_files: Vec<PathBuf> = WalkDir::new(&self.packages_dir)
            .max_depth(3)
            .into_iter()
            .filter_entry(|e| e.file_name() != "node_modules")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == "package.json")
            .map(|e| e.path().to_path_buf())
            .collect();

        let packages: Result<Vec<Package>> = manifest_files
            .into_par_iter()
            .map(|manifest_path| {
                let content = std::fs::read_to_string(&manifest_path)?;
                let manifest: Manifest =
                    serde_json::from_str(&content).map_err(|error| Error::Manifest {
                        path: manifest_path.clone(),
                        error,
                    })?;

                let location = manifest_path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| self.packages_dir.clone());

                Ok(Package::new(
                    manifest.name.clone(),
                    manifest.version.clone(),
                    location,
                    manifest.dependency_names(),
                    manifest.scripts,
                ))
            })
            .collect();

        let mut packages = packages?;
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }
}
