//! Package data model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A package discovered in the repository.
///
/// Identity is the package name, unique within a run. Dependency names are
/// the raw declared names; whether they resolve to another package in the
/// same run is decided by the dependency graph, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub location: PathBuf,
    #[serde(
        deserialize_with = "deserialize_deps",
        serialize_with = "serialize_deps"
    )]
    pub deps: SmallVec<[String; 4]>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

fn deserialize_deps<'de, D>(deserializer: D) -> Result<SmallVec<[String; 4]>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let vec: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(SmallVec::from_vec(vec))
}

fn serialize_deps<S>(deps: &SmallVec<[String; 4]>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let vec: Vec<&String> = deps.iter().collect();
    vec.serialize(serializer)
}

impl Package {
    pub fn new(
        name: String,
        version: String,
        location: PathBuf,
        deps: Vec<String>,
        scripts: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            version,
            location,
            deps: SmallVec::from_vec(deps),
            scripts,
        }
    }

    /// Whether the package declares a script under the given name.
    #[inline]
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}
