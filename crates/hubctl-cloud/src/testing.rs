//! Fixtures shared by the pipeline and provider tests

use crate::pipeline::{Backends, Pipeline};
use crate::progress::{ProgressObserver, StepOutcome};
use crate::provider::{EksOptions, eks_steps};
use crate::stack::MemoryStackManager;

/// A manager scripted so every EKS step of `cluster` succeeds
pub(crate) fn demo_manager(cluster: &str) -> MemoryStackManager {
    let mgr = MemoryStackManager::new();
    let node_role = format!("arn:aws:iam::1:role/{}-node", cluster);
    let node_profile = format!("arn:aws:iam::1:instance-profile/{}-node", cluster);
    let role_arn = format!("arn:aws:iam::1:role/{}-role", cluster);
    let node_role_name = format!("{}-node", cluster);

    mgr.script_outputs(&format!("{}-role", cluster), [("RoleArn", role_arn.as_str())])
        .script_outputs(
            &format!("{}-vpc", cluster),
            [
                ("SecurityGroups", "sg-cp"),
                ("SubnetIds", "subnet-1,subnet-2,subnet-3"),
                ("VpcId", "vpc-1"),
            ],
        )
        .script_outputs(
            &format!("{}-node-group", cluster),
            [
                ("NodeInstanceRole", node_role.as_str()),
                ("NodeInstanceProfile", node_profile.as_str()),
                ("NodeInstanceRoleName", node_role_name.as_str()),
                ("NodeSecurityGroup", "sg-1"),
            ],
        )
        .script_outputs(&format!("{}-utilities", cluster), [("efsId", "fs-1")])
        .script_control_plane(&format!("{}-cluster", cluster), "https://x", "Y");
    mgr
}

/// The EKS pipeline over `mgr`
pub(crate) fn demo_pipeline(mgr: &MemoryStackManager) -> Pipeline {
    Pipeline::new(eks_steps(&EksOptions::default()), Backends::memory(mgr))
        .expect("EKS steps are in dependency order")
}

/// Observer that keeps every notification
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    pub started: Vec<String>,
    pub finished: Vec<(String, StepOutcome)>,
    pub runs: usize,
}

impl ProgressObserver for RecordingObserver {
    fn begin(&mut self, _cluster: &str, _steps: usize) {
        self.runs += 1;
    }

    fn step_started(&mut self, step: &str, _stack: &str) {
        self.started.push(step.to_string());
    }

    fn step_finished(&mut self, step: &str, _stack: &str, outcome: &StepOutcome) {
        self.finished.push((step.to_string(), outcome.clone()));
    }
}
