//! Provisioning pipeline
//!
//! Runs [`ResourceStep`]s in declared order to build a cluster and in reverse
//! order to destroy it. Creation is resumable: steps whose stack is already
//! complete are skipped and their outputs reused, so re-running after a
//! failure picks up at the failed step. Nothing is rolled back automatically.

use hubctl_core::StackStatus;
use hubctl_engine::Renderer;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::aws::AwsCli;
use crate::directory::{AwsDirectory, ClusterDirectory};
use crate::error::{CloudError, Result};
use crate::progress::{ProgressObserver, StepOutcome};
use crate::stack::{AwsStackManager, MemoryStackManager, StackManager, WaitPolicy};
use crate::step::ResourceStep;

/// Collaborators shared by every step of a pipeline
#[derive(Clone)]
pub struct Backends {
    pub stacks: Arc<dyn StackManager>,
    pub directory: Arc<dyn ClusterDirectory>,
    pub renderer: Arc<Renderer>,
}

impl Backends {
    pub fn new(
        stacks: Arc<dyn StackManager>,
        directory: Arc<dyn ClusterDirectory>,
        renderer: Arc<Renderer>,
    ) -> Self {
        Self {
            stacks,
            directory,
            renderer,
        }
    }

    /// CloudFormation and EKS through the `aws` CLI
    pub fn aws(aws: AwsCli, policy: WaitPolicy, renderer: Arc<Renderer>) -> Self {
        Self::new(
            Arc::new(AwsStackManager::new(aws.clone(), policy)),
            Arc::new(AwsDirectory::new(aws)),
            renderer,
        )
    }

    /// One in-memory manager serving as both stack manager and directory
    pub fn memory(manager: &MemoryStackManager) -> Self {
        Self::new(
            Arc::new(manager.clone()),
            Arc::new(manager.clone()),
            Arc::new(Renderer::embedded()),
        )
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

/// Results accumulated over one run; keys are written once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepResults(BTreeMap<String, String>);

impl StepResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), for keys a complete pipeline always produces
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| CloudError::InvalidPipeline {
            message: format!("no step produces '{}'", key),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Add a result; re-adding the same value is a no-op, a different one an error
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        match self.0.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(CloudError::ConflictingResult {
                existing: existing.clone(),
                key,
                value,
            }),
            None => {
                self.0.insert(key, value);
                Ok(())
            }
        }
    }

    pub fn extend(&mut self, outputs: BTreeMap<String, String>) -> Result<()> {
        outputs
            .into_iter()
            .try_for_each(|(key, value)| self.insert(key, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outcome of tearing down one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownEntry {
    pub step: String,
    pub stack: String,
    pub outcome: StepOutcome,
}

/// Per-step outcomes of a teardown, in the order steps were visited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub cluster: String,
    pub entries: Vec<TeardownEntry>,
}

impl TeardownReport {
    fn new(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            entries: Vec::new(),
        }
    }

    /// Stacks removed by this teardown
    pub fn deleted(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.outcome == StepOutcome::Deleted)
            .map(|e| e.stack.as_str())
            .collect()
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_failure())
            .map(|e| e.step.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| !e.outcome.is_failure())
    }

    /// [`CloudError::TeardownIncomplete`] if any step failed
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        Err(CloudError::TeardownIncomplete {
            steps: self.failed_steps().into_iter().map(String::from).collect(),
            cluster: self.cluster,
        })
    }
}

/// Ordered resource steps with their shared collaborators
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<ResourceStep>,
    backends: Backends,
}

impl Pipeline {
    /// Build a pipeline, checking that steps are in dependency order
    ///
    /// Every input of a step must be produced by an earlier step, no result
    /// may be produced twice, and step names and stack suffixes are unique.
    pub fn new(steps: Vec<ResourceStep>, backends: Backends) -> Result<Self> {
        let invalid = |message: String| Err(CloudError::InvalidPipeline { message });

        let mut names = BTreeSet::new();
        let mut suffixes = BTreeSet::new();
        let mut produced: BTreeMap<&str, &str> = BTreeMap::new();

        for step in &steps {
            if !names.insert(step.name()) {
                return invalid(format!("step '{}' is declared twice", step.name()));
            }
            if !suffixes.insert(step.suffix()) {
                return invalid(format!("stack suffix '{}' is used twice", step.suffix()));
            }
            for key in step.input_keys() {
                if !produced.contains_key(key) {
                    return invalid(format!(
                        "step '{}' needs '{}', which no earlier step produces",
                        step.name(),
                        key
                    ));
                }
            }
            for key in step.result_keys() {
                if let Some(owner) = produced.insert(key, step.name()) {
                    return invalid(format!(
                        "'{}' is produced by both '{}' and '{}'",
                        key,
                        owner,
                        step.name()
                    ));
                }
            }
        }

        Ok(Self { steps, backends })
    }

    pub fn steps(&self) -> &[ResourceStep] {
        &self.steps
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Stack names of `cluster`, in creation order
    pub fn stack_names(&self, cluster: &str) -> Vec<String> {
        self.steps.iter().map(|s| s.stack_name(cluster)).collect()
    }

    /// Bring every stack of `cluster` to completion
    ///
    /// Halts at the first failing step. Stacks created before it are kept.
    pub async fn create(
        &self,
        cluster: &str,
        observer: &mut dyn ProgressObserver,
    ) -> Result<StepResults> {
        observer.begin(cluster, self.steps.len());
        let mut results = StepResults::new();

        for step in &self.steps {
            let stack_name = step.stack_name(cluster);
            observer.step_started(step.name(), &stack_name);

            match self.run_step(step, cluster, &mut results).await {
                Ok(outcome) => observer.step_finished(step.name(), &stack_name, &outcome),
                Err(e) => {
                    observer.step_finished(
                        step.name(),
                        &stack_name,
                        &StepOutcome::Failed(e.to_string()),
                    );
                    observer.finish();
                    return Err(e);
                }
            }
        }

        observer.finish();
        Ok(results)
    }

    async fn run_step(
        &self,
        step: &ResourceStep,
        cluster: &str,
        results: &mut StepResults,
    ) -> Result<StepOutcome> {
        let (outputs, outcome) = match step.current(&self.backends, cluster).await? {
            Some(stack) if stack.is_complete() => {
                tracing::info!("step {}: stack {} already complete", step.name(), stack.name);
                (
                    step.collect_outputs(&self.backends, cluster, &stack).await?,
                    StepOutcome::Skipped,
                )
            }
            _ => (
                step.apply(&self.backends, cluster, results).await?,
                StepOutcome::Created,
            ),
        };
        results.extend(outputs)?;
        Ok(outcome)
    }

    /// Delete every stack of `cluster`, last created first
    ///
    /// Keeps going past failures; check the report with
    /// [`TeardownReport::into_result`].
    pub async fn teardown(
        &self,
        cluster: &str,
        observer: &mut dyn ProgressObserver,
    ) -> TeardownReport {
        observer.begin(cluster, self.steps.len());
        let mut report = TeardownReport::new(cluster);

        for step in self.steps.iter().rev() {
            let stack_name = step.stack_name(cluster);
            observer.step_started(step.name(), &stack_name);

            let outcome = match step.teardown(&self.backends, cluster).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("step {}: could not delete {}: {}", step.name(), stack_name, e);
                    StepOutcome::Failed(e.to_string())
                }
            };

            observer.step_finished(step.name(), &stack_name, &outcome);
            report.entries.push(TeardownEntry {
                step: step.name().to_string(),
                stack: stack_name,
                outcome,
            });
        }

        observer.finish();
        report
    }

    /// Results of a fully provisioned cluster, `None` if any stack is missing
    /// or incomplete. Never creates or deletes anything.
    pub async fn inspect(&self, cluster: &str) -> Result<Option<StepResults>> {
        let mut results = StepResults::new();
        for step in &self.steps {
            match step.current(&self.backends, cluster).await? {
                Some(stack) if stack.is_complete() => {
                    results.extend(step.collect_outputs(&self.backends, cluster, &stack).await?)?
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(results))
    }

    /// Stack status of every step, in creation order
    pub async fn status(&self, cluster: &str) -> Result<Vec<(String, StackStatus)>> {
        let mut statuses = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let status = step
                .current(&self.backends, cluster)
                .await?
                .map(|stack| stack.status)
                .unwrap_or(StackStatus::Absent);
            statuses.push((step.name().to_string(), status));
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::stack::StackOperation;
    use crate::testing::{RecordingObserver, demo_manager, demo_pipeline};
    use hubctl_core::{Capability, Stack};

    #[test]
    fn test_results_only_grow() {
        let mut results = StepResults::new();
        results.insert("vpc_id", "vpc-1").unwrap();
        results.insert("vpc_id", "vpc-1").unwrap();

        let err = results.insert("vpc_id", "vpc-2").unwrap_err();
        assert!(matches!(err, CloudError::ConflictingResult { .. }));
        assert_eq!(results.get("vpc_id"), Some("vpc-1"));
    }

    #[tokio::test]
    async fn test_create_then_rerun_creates_nothing() {
        let mgr = demo_manager("demo");
        let pipeline = demo_pipeline(&mgr);

        let first = pipeline.create("demo", &mut NoProgress).await.unwrap();
        assert_eq!(mgr.operation_counts().creates, 6);

        mgr.reset_counts();
        let mut observer = RecordingObserver::default();
        let second = pipeline.create("demo", &mut observer).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mgr.operation_counts().creates, 0);
        assert_eq!(mgr.operation_counts().deletes, 0);
        assert!(observer.finished.iter().all(|(_, o)| *o == StepOutcome::Skipped));
        assert_eq!(observer.finished.len(), 6);
    }

    #[tokio::test]
    async fn test_teardown_after_create_leaves_nothing() {
        let mgr = demo_manager("demo");
        let pipeline = demo_pipeline(&mgr);

        pipeline.create("demo", &mut NoProgress).await.unwrap();
        let report = pipeline.teardown("demo", &mut NoProgress).await;

        assert!(report.is_complete());
        assert_eq!(report.deleted().len(), 6);
        assert!(mgr.stack_names().is_empty());
        insta::assert_debug_snapshot!(mgr.deletes(), @r###"
        [
            "demo-utilities",
            "demo-spot-nodes",
            "demo-node-group",
            "demo-cluster",
            "demo-vpc",
            "demo-role",
        ]
        "###);
    }

    #[tokio::test]
    async fn test_teardown_of_unknown_cluster_is_noop() {
        let mgr = MemoryStackManager::new();
        let pipeline = demo_pipeline(&mgr);

        let report = pipeline.teardown("ghost", &mut NoProgress).await;
        assert!(report.is_complete());
        assert!(report.deleted().is_empty());
        assert!(report
            .entries
            .iter()
            .all(|e| e.outcome == StepOutcome::AlreadyAbsent));
        assert_eq!(mgr.deletes().len(), 6);
    }

    #[tokio::test]
    async fn test_failure_halts_and_rerun_resumes() {
        let mgr = demo_manager("demo");
        mgr.fail_next_create("demo-node-group");
        let pipeline = demo_pipeline(&mgr);

        let err = pipeline.create("demo", &mut NoProgress).await.unwrap_err();
        assert!(matches!(err, CloudError::StepFailed { ref step, .. } if step == "workers"));

        let statuses = pipeline.status("demo").await.unwrap();
        assert_eq!(
            statuses.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            vec![
                StackStatus::CreateComplete,
                StackStatus::CreateComplete,
                StackStatus::CreateComplete,
                StackStatus::Failed,
                StackStatus::Absent,
                StackStatus::Absent,
            ]
        );
        assert_eq!(pipeline.inspect("demo").await.unwrap(), None);

        mgr.reset_counts();
        pipeline.create("demo", &mut NoProgress).await.unwrap();
        assert_eq!(
            mgr.operations(),
            vec![
                StackOperation::Delete("demo-node-group".to_string()),
                StackOperation::Create("demo-node-group".to_string()),
                StackOperation::Create("demo-spot-nodes".to_string()),
                StackOperation::Create("demo-utilities".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_is_not_a_step_failure() {
        let mgr = demo_manager("demo");
        mgr.stall_next_create("demo-cluster");
        let pipeline = demo_pipeline(&mgr);

        let mut observer = RecordingObserver::default();
        let err = pipeline.create("demo", &mut observer).await.unwrap_err();
        assert!(matches!(err, CloudError::Timeout { ref stack, .. } if stack == "demo-cluster"));
        assert!(observer.finished.last().is_some_and(|(step, o)| step == "control-plane" && o.is_failure()));
        assert_eq!(observer.finished.len(), 3);
    }

    #[tokio::test]
    async fn test_rerun_after_timeout_picks_up_the_stack() {
        let mgr = demo_manager("demo");
        mgr.stall_next_create("demo-cluster");
        let pipeline = demo_pipeline(&mgr);

        let err = pipeline.create("demo", &mut NoProgress).await.unwrap_err();
        assert!(matches!(err, CloudError::Timeout { .. }));

        assert!(mgr.finish_stalled_create("demo-cluster"));
        mgr.reset_counts();
        let results = pipeline.create("demo", &mut NoProgress).await.unwrap();

        assert_eq!(results.get("endpoint_url"), Some("https://x"));
        assert_eq!(
            mgr.operations(),
            vec![
                StackOperation::Create("demo-node-group".to_string()),
                StackOperation::Create("demo-spot-nodes".to_string()),
                StackOperation::Create("demo-utilities".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_teardown_continues_past_failures() {
        let mgr = demo_manager("demo");
        let pipeline = demo_pipeline(&mgr);
        pipeline.create("demo", &mut NoProgress).await.unwrap();
        mgr.fail_next_delete("demo-node-group");

        let report = pipeline.teardown("demo", &mut NoProgress).await;
        assert_eq!(report.failed_steps(), vec!["workers"]);
        assert_eq!(mgr.deletes().len(), 6);
        assert_eq!(mgr.stack_names(), vec!["demo-node-group"]);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, CloudError::TeardownIncomplete { ref steps, .. } if steps == &["workers"]));
    }

    #[tokio::test]
    async fn test_swapping_independent_steps_gives_same_results() {
        let mgr = demo_manager("demo");
        let pipeline = demo_pipeline(&mgr);
        let expected = pipeline.create("demo", &mut NoProgress).await.unwrap();

        let mut steps = pipeline.steps().to_vec();
        steps.swap(0, 1);
        assert_eq!(steps[0].name(), "network");

        let other = demo_manager("demo");
        let swapped = Pipeline::new(steps, Backends::memory(&other)).unwrap();
        let results = swapped.create("demo", &mut NoProgress).await.unwrap();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let mgr = MemoryStackManager::new();
        let steps = vec![
            ResourceStep::new("workers", "node-group", "t").input("VpcId", "vpc_id"),
            ResourceStep::new("network", "vpc", "t").output("VpcId", "vpc_id"),
        ];
        let err = Pipeline::new(steps, Backends::memory(&mgr)).unwrap_err();
        assert!(matches!(err, CloudError::InvalidPipeline { ref message } if message.contains("vpc_id")));
    }

    #[test]
    fn test_duplicate_result_is_rejected() {
        let mgr = MemoryStackManager::new();
        let steps = vec![
            ResourceStep::new("a", "a", "t").output("X", "x"),
            ResourceStep::new("b", "b", "t").output("Y", "x"),
        ];
        assert!(Pipeline::new(steps, Backends::memory(&mgr)).is_err());
    }

    #[tokio::test]
    async fn test_inspect_is_read_only() {
        let mgr = demo_manager("demo");
        let pipeline = demo_pipeline(&mgr);
        assert_eq!(pipeline.inspect("demo").await.unwrap(), None);

        pipeline.create("demo", &mut NoProgress).await.unwrap();
        mgr.reset_counts();
        let results = pipeline.inspect("demo").await.unwrap().unwrap();
        assert_eq!(results.get("endpoint_url"), Some("https://x"));
        assert_eq!(mgr.operation_counts().creates, 0);
        assert!(mgr.operations().is_empty());
    }

    #[tokio::test]
    async fn test_role_stack_needs_named_iam() {
        let mgr = demo_manager("demo");
        demo_pipeline(&mgr).create("demo", &mut NoProgress).await.unwrap();
        assert_eq!(mgr.capabilities("demo-role"), vec![Capability::NamedIam]);
        assert_eq!(mgr.capabilities("demo-node-group"), vec![Capability::Iam]);
        assert_eq!(
            mgr.stack("demo-cluster").map(|s: Stack| s.parameters["RoleStackName"].clone()),
            Some("demo-role".to_string())
        );
    }
}
