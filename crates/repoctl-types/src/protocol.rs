use serde::{Deserialize, Serialize};

use crate::build::{ChecksumTriple, OperationResult, ResultStatus};
use crate::session::Session;

/// `role ∈ {build, auxiliary}` machine descriptor offered by an agent
/// (§4.2 "Request", §6 "Task-request manifest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineRole {
    Build,
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OfferedMachine {
    pub name: String,
    pub summary: String,
    pub role: MachineRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_minimum: Option<u64>,
}

/// Posted by agent to `?build-task` (§6 "Task-request manifest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskRequest {
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub toolchain_name: String,
    pub toolchain_version: String,
    pub machine: Vec<OfferedMachine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary_ram: Option<u64>,
}

/// Nested `task` descriptor in the response manifest (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskDescriptor {
    pub package_name: String,
    pub package_version: String,
    pub repository_location: String,
    pub trust: Vec<String>,
    pub requirements: Vec<String>,
    pub tests: Vec<String>,
    pub dependency_checksum: String,
    pub worker_checksum: String,
    pub machine: String,
    pub auxiliary_machines: Vec<AuxiliaryMachineAssignment>,
    pub target: String,
    pub environment: Vec<(String, String)>,
    pub arguments: Vec<String>,
    pub warning_regexes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactive_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuxiliaryMachineAssignment {
    pub environment_name: String,
    pub machine: String,
}

/// Task-response manifest (§6): empty (`task: None`) when no work is
/// available for this agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upload_url: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskDescriptor>,
}

impl TaskResponse {
    pub fn empty() -> Self {
        TaskResponse {
            session: None,
            challenge: None,
            result_url: None,
            upload_url: vec![],
            agent_checksum: None,
            task: None,
        }
    }
}

/// Posted by agent to `?build-result` (§6 "Result-request manifest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResultRequest {
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_checksum: Option<String>,
    pub result: ResultBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResultBody {
    pub package_name: String,
    pub package_version: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub operations: Vec<OperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_checksum: Option<String>,
}

impl ResultBody {
    pub fn reported_checksums(&self, agent_checksum: Option<String>) -> ChecksumTriple {
        ChecksumTriple {
            agent_checksum,
            worker_checksum: self.worker_checksum.clone(),
            dependency_checksum: self.dependency_checksum.clone(),
        }
    }
}

/// `service-action ∈ {start, load}` (§6 "CI submission manifest").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    Start,
    Load,
}

/// Persisted to disk under `ci-data/<uuid>/request.manifest` (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CiSubmission {
    pub id: String,
    pub repository: String,
    pub package: Vec<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub interactive: Option<String>,
    #[serde(default)]
    pub simulate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_action: Option<ServiceAction>,
    #[serde(default)]
    pub custom: Vec<(String, String)>,
}

/// Written to `result.manifest` alongside a CI submission (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CiResult {
    pub status: CiResultStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiResultStatus {
    Success,
    Failure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_response_empty_has_no_task() {
        let resp = TaskResponse::empty();
        assert!(resp.task.is_none());
        assert!(resp.session.is_none());
    }

    #[test]
    fn task_request_roundtrips_json() {
        let req = TaskRequest {
            agent: "agent1".into(),
            fingerprint: None,
            toolchain_name: "gcc".into(),
            toolchain_version: "13.1".into(),
            machine: vec![OfferedMachine {
                name: "x86_64-linux".into(),
                summary: "box".into(),
                role: MachineRole::Build,
                ram_minimum: None,
            }],
            interactive_login: None,
            auxiliary_ram: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: TaskRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn result_body_carries_reported_checksums() {
        let body = ResultBody {
            package_name: "libx".into(),
            package_version: "1.0".into(),
            status: ResultStatus::Skip,
            operations: vec![],
            worker_checksum: Some("w".into()),
            dependency_checksum: Some("d".into()),
        };
        let triple = body.reported_checksums(Some("a".into()));
        assert_eq!(triple.agent_checksum.as_deref(), Some("a"));
        assert_eq!(triple.worker_checksum.as_deref(), Some("w"));
    }
}
