use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Dev,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Prod => write!(f, "prod"),
            Environment::Dev => write!(f, "dev"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Workspace,
    Datarepo,
    Storage,
    Warehouse,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Workspace => write!(f, "workspace"),
            Service::Datarepo => write!(f, "datarepo"),
            Service::Storage => write!(f, "storage"),
            Service::Warehouse => write!(f, "warehouse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceRef {
    namespace: String,
    name: String,
}

impl WorkspaceRef {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for WorkspaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for WorkspaceRef {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = value
            .trim()
            .split_once('/')
            .ok_or_else(|| DeliveryError::InvalidWorkspace(value.to_string()))?;
        let namespace = namespace.trim();
        let name = name.trim();
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(DeliveryError::InvalidWorkspace(value.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "OWNER")]
    Owner,
    #[serde(rename = "WRITER")]
    Writer,
    #[serde(rename = "READER")]
    Reader,
    #[serde(rename = "NO ACCESS")]
    NoAccess,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Owner => "OWNER",
            AccessLevel::Writer => "WRITER",
            AccessLevel::Reader => "READER",
            AccessLevel::NoAccess => "NO ACCESS",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "OWNER" => Ok(AccessLevel::Owner),
            "WRITER" => Ok(AccessLevel::Writer),
            "READER" => Ok(AccessLevel::Reader),
            "NO ACCESS" | "NO_ACCESS" | "NONE" => Ok(AccessLevel::NoAccess),
            _ => Err(DeliveryError::InvalidAccessLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUri {
    bucket: String,
    object: String,
}

impl ObjectUri {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

impl FromStr for ObjectUri {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let rest = value
            .trim()
            .strip_prefix("gs://")
            .ok_or_else(|| DeliveryError::InvalidObjectUri(value.to_string()))?;
        let (bucket, object) = rest
            .split_once('/')
            .ok_or_else(|| DeliveryError::InvalidObjectUri(value.to_string()))?;
        if bucket.is_empty() || object.is_empty() {
            return Err(DeliveryError::InvalidObjectUri(value.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }
}

/// First column header of an entity table, e.g. `entity:sample_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHeader {
    entity_type: String,
}

impl EntityHeader {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

impl FromStr for EntityHeader {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let entity_type = value
            .trim()
            .strip_prefix("entity:")
            .and_then(|rest| rest.strip_suffix("_id"))
            .filter(|ty| {
                !ty.is_empty()
                    && ty
                        .chars()
                        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
            })
            .ok_or_else(|| DeliveryError::InvalidEntityHeader(value.to_string()))?;
        Ok(Self {
            entity_type: entity_type.to_string(),
        })
    }
}

pub fn parse_bool(column: &str, value: &str) -> Result<bool, DeliveryError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" | "" => Ok(false),
        _ => Err(DeliveryError::InvalidBool {
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_workspace_ref_valid() {
        let ws: WorkspaceRef = " delivery-ns / cohort_a ".parse().unwrap();
        assert_eq!(ws.namespace(), "delivery-ns");
        assert_eq!(ws.name(), "cohort_a");
        assert_eq!(ws.to_string(), "delivery-ns/cohort_a");
    }

    #[test]
    fn parse_workspace_ref_invalid() {
        assert_matches!(
            "no-slash".parse::<WorkspaceRef>(),
            Err(DeliveryError::InvalidWorkspace(_))
        );
        assert_matches!(
            "a/b/c".parse::<WorkspaceRef>(),
            Err(DeliveryError::InvalidWorkspace(_))
        );
    }

    #[test]
    fn parse_entity_header() {
        let header: EntityHeader = "entity:sample_id".parse().unwrap();
        assert_eq!(header.entity_type(), "sample");
        assert_matches!(
            "membership:sample_set_id".parse::<EntityHeader>(),
            Err(DeliveryError::InvalidEntityHeader(_))
        );
    }
}
