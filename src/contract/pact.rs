//! Pact specification v2 contract files.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ContractError;

pub const PACT_SPECIFICATION_VERSION: &str = "2.0.0";

// Contract files written by this process. Guards read-merge-write cycles of
// tests sharing a file; the first write of a run replaces what was on disk.
static WRITTEN: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacticipant {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Type,
    Regex,
    Integer,
    Decimal,
    Equality,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchingRule {
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuleKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

impl MatchingRule {
    pub fn type_match() -> Self {
        Self {
            kind: Some(RuleKind::Type),
            ..Self::default()
        }
    }

    pub fn min_type(min: usize) -> Self {
        Self {
            kind: Some(RuleKind::Type),
            min: Some(min),
            ..Self::default()
        }
    }

    pub fn regex(regex: impl Into<String>) -> Self {
        Self {
            kind: Some(RuleKind::Regex),
            regex: Some(regex.into()),
            ..Self::default()
        }
    }

    /// v2 files may omit `match` when `regex` or `min`/`max` imply it.
    pub fn kind(&self) -> RuleKind {
        match self.kind {
            Some(kind) => kind,
            None if self.regex.is_some() => RuleKind::Regex,
            None if self.min.is_some() || self.max.is_some() => RuleKind::Type,
            None => RuleKind::Equality,
        }
    }
}

/// Rules keyed by JSON path, e.g. `$.body[*].id` or `$.headers.Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchingRules(BTreeMap<String, MatchingRule>);

impl MatchingRules {
    pub fn insert(&mut self, path: impl Into<String>, rule: MatchingRule) {
        self.0.insert(path.into(), rule);
    }

    pub fn get(&self, path: &str) -> Option<&MatchingRule> {
        self.0.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MatchingRule)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PactRequest {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(
        rename = "matchingRules",
        default,
        skip_serializing_if = "MatchingRules::is_empty"
    )]
    pub matching_rules: MatchingRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PactResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(
        rename = "matchingRules",
        default,
        skip_serializing_if = "MatchingRules::is_empty"
    )]
    pub matching_rules: MatchingRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub description: String,
    #[serde(
        rename = "providerState",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_state: Option<String>,
    pub request: PactRequest,
    pub response: PactResponse,
}

impl Interaction {
    fn same_key(&self, other: &Interaction) -> bool {
        self.description == other.description && self.provider_state == other.provider_state
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationVersion {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "pactSpecification")]
    pub pact_specification: SpecificationVersion,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            pact_specification: SpecificationVersion {
                version: PACT_SPECIFICATION_VERSION.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pact {
    pub consumer: Pacticipant,
    pub provider: Pacticipant,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Pact {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Pacticipant {
                name: consumer.into(),
            },
            provider: Pacticipant {
                name: provider.into(),
            },
            interactions: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.consumer.name, self.provider.name)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ContractError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| ContractError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Adds `other`'s interactions, replacing ones with the same description and state.
    pub fn merge(&mut self, other: Pact) {
        for interaction in other.interactions {
            match self
                .interactions
                .iter_mut()
                .find(|existing| existing.same_key(&interaction))
            {
                Some(existing) => *existing = interaction,
                None => self.interactions.push(interaction),
            }
        }
    }

    /// Writes `<dir>/<consumer>-<provider>.json`.
    ///
    /// The first write of a file in this process overwrites it, so
    /// interactions a consumer no longer declares drop out of the contract.
    /// Later writes merge with what the earlier ones left.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ContractError> {
        let dir = dir.as_ref();
        let path = dir.join(self.file_name());

        let mut written = WRITTEN.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        fs::create_dir_all(dir).map_err(|source| ContractError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let merged = if written.contains(&path) && path.exists() {
            let mut existing = Pact::load(&path)?;
            existing.merge(self.clone());
            existing
        } else {
            self.clone()
        };

        let mut contents = serde_json::to_string_pretty(&merged)?;
        contents.push('\n');
        fs::write(&path, contents).map_err(|source| ContractError::Io {
            path: path.clone(),
            source,
        })?;

        written.insert(path.clone());
        tracing::info!(path = %path.display(), "Wrote contract");

        Ok(path)
    }
}
