//! In-memory stack manager for testing
//!
//! Stacks complete instantly unless a fault is scripted for them. The manager
//! also answers control-plane and group lookups so a whole pipeline can run
//! without a provider.

use async_trait::async_trait;
use hubctl_core::{Capability, Stack, StackStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{
    Parameters, StackManager, WaitPolicy, absent_if_missing, wait_until_deleted,
    wait_until_terminal,
};
use crate::directory::{ClusterDirectory, ControlPlane, Principal};
use crate::error::{CloudError, Result};

/// A mutating call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackOperation {
    Create(String),
    Delete(String),
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub describes: usize,
    pub creates: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct State {
    stacks: BTreeMap<String, Stack>,
    templates: BTreeMap<String, String>,
    capabilities: BTreeMap<String, Vec<Capability>>,
    outputs: BTreeMap<String, BTreeMap<String, String>>,
    failing_creates: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    doomed_deletes: BTreeSet<String>,
    stalled_creates: BTreeSet<String>,
    control_planes: BTreeMap<String, ControlPlane>,
    groups: BTreeMap<String, Vec<Principal>>,
    log: Vec<StackOperation>,
    counts: OperationCounts,
}

/// In-memory stack manager and cluster directory
#[derive(Clone)]
pub struct MemoryStackManager {
    state: Arc<Mutex<State>>,
    policy: WaitPolicy,
}

impl MemoryStackManager {
    /// Create an empty manager; waits give up after 100ms
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            policy: WaitPolicy::new(Duration::from_millis(100), Duration::from_millis(5)),
        }
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Outputs the stack `name` publishes once created
    pub fn script_outputs<'a>(
        &self,
        name: &str,
        outputs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> &Self {
        self.lock().outputs.insert(
            name.to_string(),
            outputs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Register a managed control plane
    pub fn script_control_plane(&self, name: &str, endpoint_url: &str, ca_cert: &str) -> &Self {
        self.lock().control_planes.insert(
            name.to_string(),
            ControlPlane {
                name: name.to_string(),
                endpoint_url: endpoint_url.to_string(),
                ca_cert: ca_cert.to_string(),
            },
        );
        self
    }

    /// Register an identity group
    pub fn script_group(&self, group: &str, members: Vec<Principal>) -> &Self {
        self.lock().groups.insert(group.to_string(), members);
        self
    }

    /// The next create of `name` ends `Failed`
    pub fn fail_next_create(&self, name: &str) -> &Self {
        self.lock().failing_creates.insert(name.to_string());
        self
    }

    /// The next delete of `name` ends `Failed`
    pub fn fail_next_delete(&self, name: &str) -> &Self {
        self.lock().failing_deletes.insert(name.to_string());
        self
    }

    /// The next create of `name` never leaves `Creating`
    pub fn stall_next_create(&self, name: &str) -> &Self {
        self.lock().stalled_creates.insert(name.to_string());
        self
    }

    /// A stalled create of `name` finishes; `false` if none was stalled
    pub fn finish_stalled_create(&self, name: &str) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let outputs = state.outputs.get(name).cloned().unwrap_or_default();
        match state.stacks.get_mut(name) {
            Some(stack) if stack.status == StackStatus::Creating => {
                stack.status = StackStatus::CreateComplete;
                stack.outputs = outputs;
                true
            }
            _ => false,
        }
    }

    /// Put a stack in place as if an earlier run had left it
    pub fn insert(&self, stack: Stack) -> &Self {
        self.lock().stacks.insert(stack.name.clone(), stack);
        self
    }

    pub fn operations(&self) -> Vec<StackOperation> {
        self.lock().log.clone()
    }

    /// Names passed to `delete`, in call order
    pub fn deletes(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter_map(|op| match op {
                StackOperation::Delete(name) => Some(name.clone()),
                StackOperation::Create(_) => None,
            })
            .collect()
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.lock().counts.clone()
    }

    pub fn reset_counts(&self) {
        let mut state = self.lock();
        state.counts = OperationCounts::default();
        state.log.clear();
    }

    pub fn stack(&self, name: &str) -> Option<Stack> {
        self.lock().stacks.get(name).cloned()
    }

    pub fn stack_names(&self) -> Vec<String> {
        self.lock().stacks.keys().cloned().collect()
    }

    /// Template body the stack was last created from
    pub fn template_body(&self, name: &str) -> Option<String> {
        self.lock().templates.get(name).cloned()
    }

    pub fn capabilities(&self, name: &str) -> Vec<Capability> {
        self.lock()
            .capabilities
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Current copy of a stack; a doomed deletion turns `Failed` once seen
    fn lookup(&self, name: &str) -> Result<Stack> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let stack = state
            .stacks
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound {
                name: name.to_string(),
            })?;
        let seen = stack.clone();
        if stack.status == StackStatus::Deleting && state.doomed_deletes.remove(name) {
            stack.status = StackStatus::Failed;
        }
        Ok(seen)
    }
}

impl Default for MemoryStackManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackManager for MemoryStackManager {
    async fn create(
        &self,
        name: &str,
        template_body: &str,
        parameters: &Parameters,
        capabilities: &[Capability],
    ) -> Result<Stack> {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.counts.creates += 1;
            state.log.push(StackOperation::Create(name.to_string()));

            if state.stacks.get(name).is_some_and(|s| s.status.is_present()) {
                return Err(CloudError::AlreadyExists {
                    name: name.to_string(),
                });
            }

            let status = if state.failing_creates.remove(name) {
                StackStatus::Failed
            } else if state.stalled_creates.remove(name) {
                StackStatus::Creating
            } else {
                StackStatus::CreateComplete
            };

            let mut stack = Stack::new(name, status);
            stack.parameters = parameters.clone();
            if status == StackStatus::CreateComplete {
                stack.outputs = state.outputs.get(name).cloned().unwrap_or_default();
            }

            state
                .templates
                .insert(name.to_string(), template_body.to_string());
            state
                .capabilities
                .insert(name.to_string(), capabilities.to_vec());
            state.stacks.insert(name.to_string(), stack);
        }

        wait_until_terminal(name, &self.policy, || async { self.lookup(name) }).await
    }

    async fn describe(&self, name: &str) -> Result<Stack> {
        self.lock().counts.describes += 1;
        self.lookup(name)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            state.counts.deletes += 1;
            state.log.push(StackOperation::Delete(name.to_string()));

            let Some(stack) = state.stacks.get_mut(name) else {
                return Ok(());
            };
            if state.failing_deletes.remove(name) {
                stack.status = StackStatus::Deleting;
                state.doomed_deletes.insert(name.to_string());
            } else {
                state.stacks.remove(name);
            }
        }

        wait_until_deleted(name, &self.policy, || async { self.lookup(name) }).await
    }

    async fn wait(&self, name: &str) -> Result<Stack> {
        wait_until_terminal(name, &self.policy, || async {
            absent_if_missing(name, self.lookup(name))
        })
        .await
    }
}

#[async_trait]
impl ClusterDirectory for MemoryStackManager {
    async fn describe_cluster(&self, control_plane_name: &str) -> Result<ControlPlane> {
        self.lock()
            .control_planes
            .get(control_plane_name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                name: control_plane_name.to_string(),
            })
    }

    async fn group_members(&self, group: &str) -> Result<Vec<Principal>> {
        self.lock()
            .groups
            .get(group)
            .cloned()
            .ok_or_else(|| CloudError::NotFound {
                name: group.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_publishes_scripted_outputs() {
        let mgr = MemoryStackManager::new();
        mgr.script_outputs("demo-vpc", [("VpcId", "vpc-1")]);

        let stack = mgr
            .create("demo-vpc", "body", &Parameters::new(), &[])
            .await
            .unwrap();
        assert!(stack.is_complete());
        assert_eq!(stack.output("VpcId"), Some("vpc-1"));
        assert!(mgr.exists("demo-vpc").await.unwrap());
        assert_eq!(mgr.template_body("demo-vpc").as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_create_rejects_taken_name() {
        let mgr = MemoryStackManager::new();
        mgr.create("demo-role", "", &Parameters::new(), &[]).await.unwrap();
        let err = mgr
            .create("demo-role", "", &Parameters::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_failed_create_is_returned_not_raised() {
        let mgr = MemoryStackManager::new();
        mgr.fail_next_create("demo-role");
        let stack = mgr
            .create("demo-role", "", &Parameters::new(), &[])
            .await
            .unwrap();
        assert_eq!(stack.status, StackStatus::Failed);
        assert!(stack.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_create_times_out() {
        let mgr = MemoryStackManager::new().with_policy(WaitPolicy::new(
            Duration::from_millis(20),
            Duration::from_millis(5),
        ));
        mgr.stall_next_create("demo-cluster");
        let err = mgr
            .create("demo-cluster", "", &Parameters::new(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Timeout { status: StackStatus::Creating, .. }));
    }

    #[tokio::test]
    async fn test_wait_picks_up_a_finished_stall() {
        let mgr = MemoryStackManager::new();
        mgr.script_outputs("demo-cluster", [("Endpoint", "https://x")]);
        mgr.stall_next_create("demo-cluster");
        assert!(mgr
            .create("demo-cluster", "", &Parameters::new(), &[])
            .await
            .is_err());

        assert!(mgr.finish_stalled_create("demo-cluster"));
        let stack = mgr.wait("demo-cluster").await.unwrap();
        assert!(stack.is_complete());
        assert_eq!(stack.output("Endpoint"), Some("https://x"));
        assert!(!mgr.finish_stalled_create("demo-cluster"));
    }

    #[tokio::test]
    async fn test_wait_on_missing_stack_is_absent() {
        let mgr = MemoryStackManager::new();
        assert_eq!(mgr.wait("demo-vpc").await.unwrap().status, StackStatus::Absent);
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let mgr = MemoryStackManager::new();
        mgr.delete("demo-vpc").await.unwrap();
        assert_eq!(mgr.deletes(), vec!["demo-vpc"]);
        assert!(!mgr.exists("demo-vpc").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_delete_is_an_error() {
        let mgr = MemoryStackManager::new();
        mgr.insert(Stack::new("demo-vpc", StackStatus::CreateComplete));
        mgr.fail_next_delete("demo-vpc");

        let err = mgr.delete("demo-vpc").await.unwrap_err();
        assert!(matches!(err, CloudError::Provider { .. }));
        assert_eq!(mgr.stack("demo-vpc").unwrap().status, StackStatus::Failed);

        // the fault is one-shot
        mgr.delete("demo-vpc").await.unwrap();
        assert!(mgr.stack_names().is_empty());
    }
}
