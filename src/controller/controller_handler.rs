use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::configuration::types::DestroyOptions;
use crate::container_management::registry::RuntimeRegistry;
use crate::container_management::runtime::{ContainerRuntime, OpContext};
use crate::controller::lab_dir;
use crate::error_handling::types::*;
use crate::lab_discovery::{Discovery, DiscoveryTarget, LabelIndex};
use crate::network::host::HostNetwork;
use crate::network::{resolve_links, resolve_management_network};
use crate::teardown::TeardownEngine;
use crate::topology::builder::{bind_containers, LabBuilder};

/// Drives one `destroy` invocation across every selected lab.
pub struct Controller {
    options: DestroyOptions,
    runtime: Arc<dyn ContainerRuntime>,
    host: Arc<dyn HostNetwork>,
}

/// What a batch did, lab by lab.
#[derive(Debug)]
pub struct BatchReport {
    /// Tags every log line of one invocation.
    pub run_id: Uuid,
    pub destroyed: Vec<String>,
    pub failed: Vec<(String, LabError)>,
    pub removed_dirs: Vec<PathBuf>,
}

impl Controller {
    /// Validates `options` and creates the runtime they name.
    ///
    /// Nothing reaches the runtime when validation fails.
    pub fn new(
        options: DestroyOptions,
        registry: &RuntimeRegistry,
        host: Arc<dyn HostNetwork>,
    ) -> Result<Self, DestroyError> {
        options.validate().map_err(|e| {
            error!("Invalid options: {}", e);
            e
        })?;
        let runtime = registry.create(&options.runtime, &options.runtime_config())?;
        Ok(Self {
            options,
            runtime,
            host,
        })
    }

    /// Same as [`Controller::new`] with an already created runtime.
    pub fn with_runtime(
        options: DestroyOptions,
        runtime: Arc<dyn ContainerRuntime>,
        host: Arc<dyn HostNetwork>,
    ) -> Result<Self, DestroyError> {
        options.validate()?;
        Ok(Self {
            options,
            runtime,
            host,
        })
    }

    /// Runs the batch and folds per-lab failures into
    /// [`DestroyError::LabsFailed`]. Details are in the log.
    pub async fn run(&self, ctx: &OpContext) -> Result<(), DestroyError> {
        let report = self.run_batch(ctx).await?;
        if report.failed.is_empty() {
            info!("Destroyed {} lab(s)", report.destroyed.len());
            return Ok(());
        }
        Err(DestroyError::LabsFailed(report.failed.len()))
    }

    /// Discovers the labs to destroy and tears them down one after another.
    ///
    /// Only option and discovery problems are returned as errors; a lab that
    /// fails is recorded in the report and the next one is processed.
    pub async fn run_batch(&self, ctx: &OpContext) -> Result<BatchReport, DestroyError> {
        let mut report = BatchReport {
            run_id: Uuid::new_v4(),
            destroyed: Vec::new(),
            failed: Vec::new(),
            removed_dirs: Vec::new(),
        };
        info!("[{}] Starting destroy with runtime {}", report.run_id, self.runtime.name());
        let index = LabelIndex::new(Arc::clone(&self.runtime));

        let target = if self.options.all {
            DiscoveryTarget::AllLabs
        } else if let Some(topo) = &self.options.topology {
            let name = LabBuilder::for_destroy(topo, &self.options).lab_name()?;
            DiscoveryTarget::Lab {
                name,
                topology: topo.clone(),
            }
        } else {
            DiscoveryTarget::AnyLab
        };

        let topos = match index.discover(ctx, &target).await? {
            Discovery::Labs(topos) => topos,
            Discovery::NoContainersFound => {
                info!("no containerlab containers found");
                if self.options.cleanup {
                    if let Some(dir) = lab_dir::fallback_cleanup(self.options.topology.as_deref())
                    {
                        report.removed_dirs.push(dir);
                    }
                }
                return Ok(report);
            }
        };

        for (topo, discovered_dir) in &topos {
            info!("[{}] Destroying lab defined in {}", report.run_id, topo.display());
            match self
                .destroy_lab(ctx, &index, topo, discovered_dir, &mut report)
                .await
            {
                Ok(name) => report.destroyed.push(name),
                Err((name, e)) => {
                    error!(
                        "[{}] Error occurred during the {} lab deletion: {}",
                        report.run_id, name, e
                    );
                    report.failed.push((name, e));
                }
            }
        }
        Ok(report)
    }

    async fn destroy_lab(
        &self,
        ctx: &OpContext,
        index: &LabelIndex,
        topo: &Path,
        discovered_dir: &Path,
        report: &mut BatchReport,
    ) -> Result<String, (String, LabError)> {
        let lab_label = topo.display().to_string();
        let builder = LabBuilder::for_destroy(topo, &self.options).with_lab_dir(discovered_dir);
        let mut lab = match builder.build() {
            Ok(lab) => lab,
            Err(e) => {
                if self.options.cleanup && lab_dir::remove_lab_dir(discovered_dir) {
                    report.removed_dirs.push(discovered_dir.to_path_buf());
                }
                return Err((lab_label, e.into()));
            }
        };

        match index.lab_members(ctx, &lab.name).await {
            Ok(members) => bind_containers(&mut lab, &members),
            Err(e) => warn!(
                "Could not list containers of lab {}, removing by name: {}",
                lab.name, e
            ),
        }

        if let Err(e) = resolve_management_network(ctx, self.runtime.as_ref(), &mut lab).await {
            return Err((lab.name, e.into()));
        }
        if let Err(e) = resolve_links(&mut lab) {
            return Err((lab.name, e.into()));
        }
        debug!(
            "Lab {} resolved: bridge {:?}, {} link(s)",
            lab.name,
            lab.mgmt.bridge,
            lab.links.len()
        );

        let mut engine = TeardownEngine::new(Arc::clone(&self.runtime), Arc::clone(&self.host));
        if self.options.graceful {
            engine = engine.with_graceful_stop(self.options.stop_timeout);
        }
        let result = engine
            .destroy(ctx, &lab, self.options.max_workers, self.options.keep_mgmt_net)
            .await;

        // attempted whatever the teardown outcome
        if self.options.cleanup && lab_dir::remove_lab_dir(&lab.lab_dir) {
            report.removed_dirs.push(lab.lab_dir.clone());
        }

        match result {
            Ok(outcome) => {
                debug!(
                    "Lab {} torn down at {}",
                    outcome.lab,
                    outcome.finished_at.to_rfc3339()
                );
                Ok(lab.name)
            }
            Err(e) => Err((lab.name, e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_management::mock_runtime::{MockEvent, MockRuntime};
    use crate::container_management::types::ContainerRecord;
    use crate::lab_discovery::labels;
    use crate::network::host::recording::RecordingHostNetwork;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;

    /// Writes `<dir>/<lab>.clab.yml` and creates `<dir>/clab-<lab>`.
    fn write_lab(dir: &Path, lab: &str, nodes: &[&str], extra_links: &str) -> PathBuf {
        let mut yaml = format!("name: {}\ntopology:\n  nodes:\n", lab);
        for node in nodes {
            yaml.push_str(&format!("    {}:\n      kind: linux\n", node));
        }
        yaml.push_str("  links:\n");
        yaml.push_str(extra_links);
        if extra_links.is_empty() {
            yaml.push_str("    []\n");
        }
        let topo = dir.join(format!("{}.clab.yml", lab));
        fs::write(&topo, yaml).unwrap();
        fs::create_dir_all(dir.join(format!("clab-{}", lab))).unwrap();
        topo
    }

    fn controller(options: DestroyOptions, runtime: &Arc<MockRuntime>) -> Controller {
        Controller::with_runtime(options, runtime.clone(), Arc::new(RecordingHostNetwork::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn failed_lab_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = MockRuntime::new();
        for (lab, links) in [
            ("lab-a", ""),
            ("lab-b", "    - endpoints: [\"n1:eth1\", \"ghost:eth1\"]\n"),
            ("lab-c", ""),
        ] {
            let topo = write_lab(dir.path(), lab, &["n1", "n2"], links);
            runtime = runtime.with_lab(
                lab,
                &topo,
                &dir.path().join(format!("clab-{}", lab)),
                &["n1", "n2"],
            );
        }
        let runtime = Arc::new(runtime);
        let options = DestroyOptions {
            all: true,
            ..Default::default()
        };

        let report = controller(options.clone(), &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(report.destroyed, vec!["lab-a".to_string(), "lab-c".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "lab-b");
        assert!(matches!(report.failed[0].1, LabError::Resolution(_)));
        assert_eq!(runtime.container_count(), 2);

        let err = controller(options, &runtime)
            .run(&OpContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, DestroyError::LabsFailed(1)));
    }

    #[tokio::test]
    async fn conflicting_options_never_reach_the_runtime() {
        let runtime = Arc::new(MockRuntime::new());
        let options = DestroyOptions {
            cleanup: true,
            node_filter: vec!["n1".to_string()],
            ..Default::default()
        };
        let res = Controller::with_runtime(
            options,
            runtime.clone(),
            Arc::new(RecordingHostNetwork::new()),
        );
        assert!(matches!(res, Err(DestroyError::ConfigurationError(_))));
        assert_eq!(runtime.call_count(), 0);
    }

    #[test]
    fn unknown_runtime_is_rejected() {
        let options = DestroyOptions {
            runtime: "containerd".to_string(),
            ..Default::default()
        };
        let res = Controller::new(
            options,
            &RuntimeRegistry::empty(),
            Arc::new(RecordingHostNetwork::new()),
        );
        assert!(matches!(
            res,
            Err(DestroyError::RuntimeError(RuntimeError::UnknownRuntime(_)))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn nothing_found_falls_back_to_current_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("clab-b")).unwrap();
        fs::create_dir(dir.path().join("clab-a")).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let runtime = Arc::new(MockRuntime::new());
        let options = DestroyOptions {
            cleanup: true,
            ..Default::default()
        };
        let res = controller(options, &runtime)
            .run(&OpContext::background())
            .await;

        std::env::set_current_dir(previous).unwrap();
        assert!(res.is_ok());
        assert!(!dir.path().join("clab-a").exists());
        assert!(dir.path().join("clab-b").exists());
    }

    #[tokio::test]
    #[serial]
    async fn all_mode_with_no_labs_fails_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("clab-a")).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let runtime = Arc::new(MockRuntime::new());
        let options = DestroyOptions {
            all: true,
            cleanup: true,
            ..Default::default()
        };
        let res = controller(options, &runtime)
            .run(&OpContext::background())
            .await;

        std::env::set_current_dir(previous).unwrap();
        assert!(matches!(
            res,
            Err(DestroyError::DiscoveryError(DiscoveryError::NoLabsFound))
        ));
        assert!(dir.path().join("clab-a").exists());
        assert_eq!(runtime.count(&MockEvent::List), 1);
        assert_eq!(runtime.call_count(), 1);
    }

    #[tokio::test]
    async fn explicit_topology_only_destroys_that_lab() {
        let dir = tempfile::tempdir().unwrap();
        let topo_a = write_lab(dir.path(), "lab-a", &["n1"], "");
        let topo_b = write_lab(dir.path(), "lab-b", &["n1"], "");
        let runtime = Arc::new(
            MockRuntime::new()
                .with_lab("lab-a", &topo_a, &dir.path().join("clab-lab-a"), &["n1"])
                .with_lab("lab-b", &topo_b, &dir.path().join("clab-lab-b"), &["n1"]),
        );
        let options = DestroyOptions {
            topology: Some(topo_a),
            cleanup: true,
            ..Default::default()
        };

        let report = controller(options, &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(report.destroyed, vec!["lab-a".to_string()]);
        assert_eq!(report.removed_dirs, vec![dir.path().join("clab-lab-a")]);
        assert_eq!(runtime.count(&MockEvent::Remove("clab-lab-b-n1".to_string())), 0);
        assert_eq!(runtime.container_count(), 1);
        assert!(dir.path().join("clab-lab-b").exists());
    }

    #[tokio::test]
    async fn containers_missing_from_topology_are_removed_too() {
        let dir = tempfile::tempdir().unwrap();
        let topo = write_lab(dir.path(), "lab-a", &["n1"], "");
        let runtime = Arc::new(MockRuntime::new().with_lab(
            "lab-a",
            &topo,
            &dir.path().join("clab-lab-a"),
            &["n1", "leftover"],
        ));

        let report = controller(DestroyOptions::default(), &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(report.destroyed, vec!["lab-a".to_string()]);
        assert_eq!(runtime.container_count(), 0);
        assert_eq!(
            runtime.count(&MockEvent::Remove("clab-lab-a-leftover".to_string())),
            1
        );
    }

    #[tokio::test]
    async fn node_filter_keeps_other_nodes_and_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let topo = write_lab(dir.path(), "lab-a", &["n1", "n2"], "");
        let runtime = Arc::new(
            MockRuntime::new()
                .with_lab("lab-a", &topo, &dir.path().join("clab-lab-a"), &["n1", "n2"])
                .with_network("clab", "br-clab"),
        );
        let options = DestroyOptions {
            topology: Some(topo),
            node_filter: vec!["n2".to_string()],
            ..Default::default()
        };

        controller(options, &runtime)
            .run(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(runtime.container_count(), 1);
        assert_eq!(runtime.count(&MockEvent::Remove("clab-lab-a-n2".to_string())), 1);
        assert!(runtime.has_network("clab"));
    }

    #[tokio::test]
    async fn unlabelled_first_container_does_not_trigger_the_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("clab-aaa-unrelated")).unwrap();
        let topo = write_lab(dir.path(), "lab-a", &["n1", "n2"], "");
        let bare_labels = HashMap::from([
            (labels::CONTAINERLAB.to_string(), "lab-a".to_string()),
            (labels::NODE_NAME.to_string(), "n1".to_string()),
        ]);
        let runtime = Arc::new(
            MockRuntime::new()
                .with_container(ContainerRecord {
                    id: "bare-n1".to_string(),
                    names: vec!["clab-lab-a-n1".to_string()],
                    state: "running".to_string(),
                    labels: bare_labels,
                    ..Default::default()
                })
                .with_lab("lab-a", &topo, &dir.path().join("clab-lab-a"), &["n2"]),
        );
        let options = DestroyOptions {
            topology: Some(topo),
            cleanup: true,
            ..Default::default()
        };

        let report = controller(options, &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(report.destroyed, vec!["lab-a".to_string()]);
        assert_eq!(runtime.container_count(), 0);
        assert_eq!(report.removed_dirs, vec![dir.path().join("clab-lab-a")]);
        assert!(dir.path().join("clab-aaa-unrelated").exists());
    }

    #[tokio::test]
    #[serial]
    async fn lab_without_topology_labels_fails_without_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("clab-aaa-unrelated")).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let runtime = Arc::new(MockRuntime::new().with_container(ContainerRecord {
            id: "bare-n1".to_string(),
            names: vec!["clab-lab-a-n1".to_string()],
            labels: HashMap::from([(labels::CONTAINERLAB.to_string(), "lab-a".to_string())]),
            ..Default::default()
        }));
        let options = DestroyOptions {
            cleanup: true,
            ..Default::default()
        };
        let res = controller(options, &runtime)
            .run(&OpContext::background())
            .await;

        std::env::set_current_dir(previous).unwrap();
        assert!(matches!(
            res,
            Err(DestroyError::DiscoveryError(DiscoveryError::MissingTopology(_)))
        ));
        assert!(dir.path().join("clab-aaa-unrelated").exists());
        assert_eq!(runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn cleanup_runs_even_when_a_node_fails() {
        let dir = tempfile::tempdir().unwrap();
        let topo = write_lab(dir.path(), "lab-a", &["n1", "n2"], "");
        let lab_dir = dir.path().join("clab-lab-a");
        let runtime = Arc::new(
            MockRuntime::new()
                .with_lab("lab-a", &topo, &lab_dir, &["n1", "n2"])
                .failing_removal("clab-lab-a-n2"),
        );
        let options = DestroyOptions {
            topology: Some(topo),
            cleanup: true,
            ..Default::default()
        };

        let report = controller(options, &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert!(report.destroyed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "lab-a");
        assert!(matches!(report.failed[0].1, LabError::Teardown(_)));
        assert_eq!(report.removed_dirs, vec![lab_dir.clone()]);
        assert!(!lab_dir.exists());
        assert_eq!(runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn unbuildable_lab_still_has_its_directory_removed() {
        let dir = tempfile::tempdir().unwrap();
        let lab_dir = dir.path().join("clab-lab-a");
        fs::create_dir(&lab_dir).unwrap();
        let missing_topo = dir.path().join("gone.clab.yml");
        let runtime = Arc::new(MockRuntime::new().with_lab("lab-a", &missing_topo, &lab_dir, &["n1"]));
        let options = DestroyOptions {
            all: true,
            cleanup: true,
            ..Default::default()
        };

        let report = controller(options, &runtime)
            .run_batch(&OpContext::background())
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].1, LabError::Build(_)));
        assert_eq!(report.removed_dirs, vec![lab_dir.clone()]);
        assert!(!lab_dir.exists());
        assert_eq!(runtime.container_count(), 1);
    }
}
