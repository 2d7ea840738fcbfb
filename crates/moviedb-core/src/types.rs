//! Core types: key definitions, table schemas, table status, return-value modes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// The scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    /// String (`S`).
    S,
    /// Number (`N`).
    N,
    /// Binary (`B`).
    B,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::S => "S",
            ScalarType::N => "N",
            ScalarType::B => "B",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an attribute in the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRole {
    /// Partition key.
    Hash,
    /// Sort key.
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub role: KeyRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

/// A resolved key attribute (name + type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: String,
    pub key_type: ScalarType,
}

/// Definition of a table as sent to `create_table`.
///
/// Mirrors the service's request shape: the key schema names the key
/// attributes and their roles, the attribute definitions give their types.
/// [`TableSchema::validate`] checks that the two agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub throughput: ProvisionedThroughput,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_schema: Vec::new(),
            attribute_definitions: Vec::new(),
            throughput: ProvisionedThroughput {
                read_capacity_units: 1,
                write_capacity_units: 1,
            },
        }
    }

    /// Declare the partition key and its attribute definition.
    pub fn partition_key(self, name: &str, key_type: ScalarType) -> Self {
        self.key(name, KeyRole::Hash).attribute(name, key_type)
    }

    /// Declare the sort key and its attribute definition.
    pub fn sort_key(self, name: &str, key_type: ScalarType) -> Self {
        self.key(name, KeyRole::Range).attribute(name, key_type)
    }

    /// Add a key schema element without an attribute definition.
    pub fn key(mut self, name: &str, role: KeyRole) -> Self {
        self.key_schema.push(KeySchemaElement {
            attribute_name: name.to_string(),
            role,
        });
        self
    }

    /// Add an attribute definition.
    pub fn attribute(mut self, name: &str, attribute_type: ScalarType) -> Self {
        self.attribute_definitions.push(AttributeDefinition {
            attribute_name: name.to_string(),
            attribute_type,
        });
        self
    }

    pub fn throughput(mut self, read: i64, write: i64) -> Self {
        self.throughput = ProvisionedThroughput {
            read_capacity_units: read,
            write_capacity_units: write,
        };
        self
    }

    /// Check the schema for internal consistency.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyTableName);
        }

        // Attribute definitions: a name may repeat only with the same type.
        let mut declared: Vec<&AttributeDefinition> = Vec::new();
        for def in &self.attribute_definitions {
            match declared
                .iter()
                .find(|d| d.attribute_name == def.attribute_name)
            {
                Some(prev) if prev.attribute_type != def.attribute_type => {
                    return Err(SchemaError::AttributeTypeConflict {
                        name: def.attribute_name.clone(),
                        declared: prev.attribute_type,
                        requested: def.attribute_type,
                    });
                }
                Some(_) => {}
                None => declared.push(def),
            }
        }

        let hashes = self
            .key_schema
            .iter()
            .filter(|k| k.role == KeyRole::Hash)
            .count();
        if hashes != 1 {
            return Err(SchemaError::MissingPartitionKey);
        }
        let ranges = self
            .key_schema
            .iter()
            .filter(|k| k.role == KeyRole::Range)
            .count();
        if ranges > 1 {
            return Err(SchemaError::MultipleSortKeys);
        }

        for (i, key) in self.key_schema.iter().enumerate() {
            if self.key_schema[..i]
                .iter()
                .any(|k| k.attribute_name == key.attribute_name)
            {
                return Err(SchemaError::DuplicateKeyAttribute(
                    key.attribute_name.clone(),
                ));
            }
            if !declared
                .iter()
                .any(|d| d.attribute_name == key.attribute_name)
            {
                return Err(SchemaError::UndefinedKeyAttribute(
                    key.attribute_name.clone(),
                ));
            }
        }

        for def in &declared {
            if !self
                .key_schema
                .iter()
                .any(|k| k.attribute_name == def.attribute_name)
            {
                return Err(SchemaError::UnusedAttributeDefinition(
                    def.attribute_name.clone(),
                ));
            }
        }

        let ProvisionedThroughput {
            read_capacity_units: read,
            write_capacity_units: write,
        } = self.throughput;
        if read < 1 || write < 1 {
            return Err(SchemaError::InvalidCapacity { read, write });
        }

        Ok(())
    }

    /// The partition key definition, if declared.
    pub fn partition_key_def(&self) -> Option<KeyDefinition> {
        self.key_def(KeyRole::Hash)
    }

    /// The sort key definition, if declared.
    pub fn sort_key_def(&self) -> Option<KeyDefinition> {
        self.key_def(KeyRole::Range)
    }

    fn key_def(&self, role: KeyRole) -> Option<KeyDefinition> {
        let key = self.key_schema.iter().find(|k| k.role == role)?;
        let def = self
            .attribute_definitions
            .iter()
            .find(|d| d.attribute_name == key.attribute_name)?;
        Some(KeyDefinition {
            name: key.attribute_name.clone(),
            key_type: def.attribute_type,
        })
    }
}

/// Lifecycle status of a table as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Updating,
    Deleting,
    Active,
    /// A status this crate does not know about, kept verbatim.
    Other(String),
}

impl TableStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "CREATING" => TableStatus::Creating,
            "UPDATING" => TableStatus::Updating,
            "DELETING" => TableStatus::Deleting,
            "ACTIVE" => TableStatus::Active,
            other => TableStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which attributes a write returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnValues {
    #[default]
    None,
    AllOld,
    UpdatedOld,
    AllNew,
    UpdatedNew,
}

impl ReturnValues {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnValues::None => "NONE",
            ReturnValues::AllOld => "ALL_OLD",
            ReturnValues::UpdatedOld => "UPDATED_OLD",
            ReturnValues::AllNew => "ALL_NEW",
            ReturnValues::UpdatedNew => "UPDATED_NEW",
        }
    }
}
