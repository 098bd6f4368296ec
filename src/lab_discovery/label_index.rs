use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::container_management::types::ContainerRecord;
use crate::error_handling::types::DiscoveryError;
use crate::lab_discovery::filter::OwnershipFilter;
use crate::lab_discovery::labels;

/// Which containers discovery should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryTarget {
    /// No topology given: the first lab found wins.
    AnyLab,
    /// Containers of the named lab only, deployed from an explicit topology.
    Lab { name: String, topology: PathBuf },
    /// Every lab on the runtime.
    AllLabs,
}

/// Result of a discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Topology file path mapped to its lab directory. An empty directory
    /// means the containers did not carry one.
    Labs(BTreeMap<PathBuf, PathBuf>),
    /// Not a single container matched in single lab mode. Not an error.
    NoContainersFound,
}

/// Lab ownership information extracted from one container's labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabMembership {
    pub lab: String,
    pub node: Option<String>,
    pub topo_file: Option<PathBuf>,
    pub lab_dir: Option<PathBuf>,
    /// Runtime identity of the container.
    pub container_id: String,
    pub container_name: Option<String>,
    pub state: String,
}

impl LabMembership {
    /// `None` for containers without the ownership label.
    pub fn from_record(record: &ContainerRecord) -> Option<Self> {
        let lab = record.label(labels::CONTAINERLAB)?.to_string();
        Some(Self {
            lab,
            node: record.label(labels::NODE_NAME).map(str::to_string),
            topo_file: record
                .label(labels::TOPO_FILE)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            lab_dir: record
                .label(labels::NODE_LAB_DIR)
                .filter(|p| !p.is_empty())
                .map(|p| parent_dir(Path::new(p))),
            container_id: record.id.clone(),
            container_name: record.names.first().cloned(),
            state: record.state.clone(),
        })
    }
}

/// The node label points at `<lab dir>/<node>`; the lab directory is its parent.
fn parent_dir(node_dir: &Path) -> PathBuf {
    node_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Read-only view of lab ownership on a runtime.
#[derive(Clone)]
pub struct LabelIndex {
    runtime: Arc<dyn ContainerRuntime>,
}

impl LabelIndex {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Finds the labs to destroy.
    ///
    /// Single lab modes report [`Discovery::NoContainersFound`] only when no
    /// container matches; [`DiscoveryTarget::AllLabs`] treats that as
    /// [`DiscoveryError::NoLabsFound`]. Matching containers whose topology
    /// cannot be derived are a [`DiscoveryError::MissingTopology`].
    pub async fn discover(
        &self,
        ctx: &OpContext,
        target: &DiscoveryTarget,
    ) -> Result<Discovery, DiscoveryError> {
        let filter = match target {
            DiscoveryTarget::Lab { name, .. } => OwnershipFilter::lab(name),
            DiscoveryTarget::AnyLab | DiscoveryTarget::AllLabs => OwnershipFilter::any_lab(),
        };
        let members = self.members(ctx, &filter).await?;
        debug!("Discovery for {:?} matched {} containers", target, members.len());

        let Some(first) = members.first() else {
            if *target == DiscoveryTarget::AllLabs {
                return Err(DiscoveryError::NoLabsFound);
            }
            info!("No containerlab containers found");
            return Ok(Discovery::NoContainersFound);
        };

        match target {
            DiscoveryTarget::AllLabs => {
                let topos = group_by_topology(&members);
                if topos.is_empty() {
                    return Err(DiscoveryError::MissingTopology(first.lab.clone()));
                }
                info!("Found {} lab(s) to destroy", topos.len());
                Ok(Discovery::Labs(topos))
            }
            DiscoveryTarget::Lab { topology, .. } => {
                let lab_dir = members
                    .iter()
                    .find_map(|m| m.lab_dir.clone())
                    .unwrap_or_default();
                Ok(Discovery::Labs(BTreeMap::from([(topology.clone(), lab_dir)])))
            }
            DiscoveryTarget::AnyLab => {
                // all containers of one lab share the same topology and lab dir
                let Some(labelled) = members.iter().find(|m| m.topo_file.is_some()) else {
                    return Err(DiscoveryError::MissingTopology(first.lab.clone()));
                };
                Ok(Discovery::Labs(group_by_topology(std::slice::from_ref(
                    labelled,
                ))))
            }
        }
    }

    /// Every container of lab `name`.
    pub async fn lab_members(
        &self,
        ctx: &OpContext,
        name: &str,
    ) -> Result<Vec<LabMembership>, DiscoveryError> {
        self.members(ctx, &OwnershipFilter::lab(name)).await
    }

    async fn members(
        &self,
        ctx: &OpContext,
        filter: &OwnershipFilter,
    ) -> Result<Vec<LabMembership>, DiscoveryError> {
        let filters = filter.to_filters()?;
        let records = self.runtime.list_containers(ctx, &filters).await?;
        Ok(records.iter().filter_map(LabMembership::from_record).collect())
    }
}

/// Collapses memberships into topology file → lab directory, last seen wins.
pub fn group_by_topology(members: &[LabMembership]) -> BTreeMap<PathBuf, PathBuf> {
    let mut topos = BTreeMap::new();
    for member in members {
        let Some(topo) = &member.topo_file else {
            warn!(
                "Container {} of lab {} carries no topology file label, skipping",
                member.container_id, member.lab
            );
            continue;
        };
        topos.insert(topo.clone(), member.lab_dir.clone().unwrap_or_default());
    }
    topos
}
