use crate::container_management::types::GenericFilter;
use crate::error_handling::types::ConfigError;
use crate::lab_discovery::labels;

/// Discovery filters; every constructor scopes by the ownership label.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipFilter {
    ownership: GenericFilter,
}

impl OwnershipFilter {
    /// Matches every container owned by any lab.
    pub fn any_lab() -> Self {
        Self {
            ownership: GenericFilter::label_exists(labels::CONTAINERLAB),
        }
    }

    /// Matches the containers of lab `name`.
    pub fn lab(name: &str) -> Self {
        Self {
            ownership: GenericFilter::label_equals(labels::CONTAINERLAB, name),
        }
    }

    /// Filters to hand to the runtime, rejected when malformed.
    pub fn to_filters(&self) -> Result<Vec<GenericFilter>, ConfigError> {
        self.ownership.validate()?;
        Ok(vec![self.ownership.clone()])
    }
}
