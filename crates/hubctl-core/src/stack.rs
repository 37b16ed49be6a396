//! Provider-side stacks
//!
//! A stack is a named group of cloud resources created and destroyed as one
//! unit. Its outputs are what later provisioning steps consume.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle status of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    Absent,
    Creating,
    CreateComplete,
    Deleting,
    DeleteComplete,
    Failed,
}

impl StackStatus {
    /// Map a CloudFormation status string onto the lifecycle
    pub fn from_provider(status: &str) -> Self {
        match status {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => Self::CreateComplete,
            "DELETE_IN_PROGRESS" => Self::Deleting,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            s if s.contains("FAILED") || s.contains("ROLLBACK") => Self::Failed,
            s if s.ends_with("_IN_PROGRESS") => Self::Creating,
            _ => Self::Failed,
        }
    }

    /// Whether a blocking wait can stop at this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Absent | Self::CreateComplete | Self::DeleteComplete | Self::Failed
        )
    }

    /// Whether a stack in this status occupies its name
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent | Self::DeleteComplete)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "ABSENT",
            Self::Creating => "CREATING",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::Deleting => "DELETING",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Authorization a stack template needs from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Template creates IAM resources with generated names
    Iam,
    /// Template creates IAM resources with explicit names
    NamedIam,
}

impl Capability {
    pub fn as_provider_str(&self) -> &'static str {
        match self {
            Capability::Iam => "CAPABILITY_IAM",
            Capability::NamedIam => "CAPABILITY_NAMED_IAM",
        }
    }
}

/// A named, provider-side resource group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub status: StackStatus,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            name: name.into(),
            status,
            outputs: BTreeMap::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.status == StackStatus::CreateComplete
    }
}
