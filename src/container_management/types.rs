//! Core types shared by the runtime backends and the label index.

use std::collections::HashMap;
use std::fmt;

use crate::error_handling::types::ConfigError;

/// Kind of container attribute a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Exists,
    Equals,
}

/// Predicate over a container's labels, e.g. `containerlab exists` or
/// `containerlab = srl01`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericFilter {
    pub filter_type: FilterType,
    pub field: String,
    pub operator: FilterOperator,
    pub match_value: Option<String>,
}

impl GenericFilter {
    pub fn label_exists(field: &str) -> Self {
        Self {
            filter_type: FilterType::Label,
            field: field.to_string(),
            operator: FilterOperator::Exists,
            match_value: None,
        }
    }

    pub fn label_equals(field: &str, value: &str) -> Self {
        Self {
            filter_type: FilterType::Label,
            field: field.to_string(),
            operator: FilterOperator::Equals,
            match_value: Some(value.to_string()),
        }
    }

    /// `equals` needs a non-empty value, `exists` must not carry one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.field.trim().is_empty() {
            return Err(ConfigError::MalformedFilter(
                "filter field must not be empty".to_string(),
            ));
        }
        match (self.operator, &self.match_value) {
            (FilterOperator::Exists, Some(v)) => Err(ConfigError::MalformedFilter(format!(
                "exists filter on {} must not carry a match value ({})",
                self.field, v
            ))),
            (FilterOperator::Equals, None) => Err(ConfigError::MalformedFilter(format!(
                "filter on {} requires a match value",
                self.field
            ))),
            (FilterOperator::Equals, Some(v)) if v.trim().is_empty() => {
                Err(ConfigError::MalformedFilter(format!(
                    "filter on {} has an empty match value",
                    self.field
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn matches(&self, record: &ContainerRecord) -> bool {
        let value = match self.filter_type {
            FilterType::Label => record.label(&self.field),
        };
        match self.operator {
            FilterOperator::Exists => value.is_some(),
            FilterOperator::Equals => value.is_some() && value == self.match_value.as_deref(),
        }
    }
}

impl fmt::Display for GenericFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operator, &self.match_value) {
            (FilterOperator::Exists, _) => write!(f, "{} exists", self.field),
            (FilterOperator::Equals, Some(v)) => write!(f, "{}={}", self.field, v),
            (_, None) => write!(f, "{} <malformed>", self.field),
        }
    }
}

/// A container as reported by the runtime, with its labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRecord {
    /// Runtime assigned identifier.
    pub id: String,
    /// Container names, without the leading `/` some engines report.
    pub names: Vec<String>,
    pub image: String,
    /// Engine reported state, e.g. `running` or `exited`.
    pub state: String,
    pub labels: HashMap<String, String>,
}

impl ContainerRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn matches_all(&self, filters: &[GenericFilter]) -> bool {
        filters.iter().all(|f| f.matches(self))
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}
