//! Auxiliary-machine assignment (§4.2 "Auxiliary machines"): pick a
//! machine for each auxiliary environment name a package's build
//! arguments reference, respecting the task's RAM budget and the
//! configured cap on auxiliary machine count.
//!
//! Simplification (see DESIGN.md): assignment is first-fit in request
//! order rather than a general constraint solver. Environment names
//! that repeat share the first machine assigned to that name, matching
//! the spec's "environment-name collisions must share a single
//! machine".

use std::collections::BTreeSet;

use repoctl_types::protocol::{AuxiliaryMachineAssignment, OfferedMachine};
use repoctl_types::{fits_ram_budget, TargetConfigMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxiliaryAssignError {
    /// §4.2 "exceeding the configured auxiliary-machine cap aborts the
    /// build with a synthetic `configure` result".
    TooManyEnvironments { requested: usize, max: u32 },
    NoSuitableMachine { environment_name: String },
}

/// Assign one machine per requested auxiliary environment name, in
/// request order. `environment_names` may repeat.
pub fn assign(
    environment_names: &[String],
    offered: &[&OfferedMachine],
    configs: &TargetConfigMap,
    ram_budget: u64,
    max_auxiliary_machines: u32,
) -> Result<Vec<AuxiliaryMachineAssignment>, AuxiliaryAssignError> {
    let distinct: BTreeSet<&str> = environment_names.iter().map(String::as_str).collect();
    if distinct.len() > max_auxiliary_machines as usize {
        return Err(AuxiliaryAssignError::TooManyEnvironments {
            requested: distinct.len(),
            max: max_auxiliary_machines,
        });
    }

    let mut assigned: Vec<(String, String)> = Vec::new();
    let mut used_ram: u64 = 0;
    let mut taken: BTreeSet<&str> = BTreeSet::new();

    for name in environment_names {
        if assigned.iter().any(|(n, _)| n == name) {
            continue;
        }
        let machine = offered
            .iter()
            .find(|m| {
                !taken.contains(m.name.as_str())
                    && crate::precheck::resolve_target_config(configs, &m.name).is_some()
                    && fits_ram_budget(used_ram, m.ram_minimum.unwrap_or(0), ram_budget)
            })
            .ok_or_else(|| AuxiliaryAssignError::NoSuitableMachine {
                environment_name: name.clone(),
            })?;

        used_ram += machine.ram_minimum.unwrap_or(0);
        taken.insert(machine.name.as_str());
        assigned.push((name.clone(), machine.name.clone()));
    }

    let by_name: std::collections::BTreeMap<&str, &str> =
        assigned.iter().map(|(n, m)| (n.as_str(), m.as_str())).collect();
    Ok(environment_names
        .iter()
        .map(|n| AuxiliaryMachineAssignment {
            environment_name: n.clone(),
            machine: by_name[n.as_str()].to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::protocol::MachineRole;
    use repoctl_types::BuildTargetConfig;

    fn configs() -> TargetConfigMap {
        TargetConfigMap {
            configs: vec![BuildTargetConfig {
                name: "linux-gcc".into(),
                pattern: "x86_64-*-linux-gnu".into(),
                classes: vec![],
            }],
            class_parents: Default::default(),
        }
    }

    fn machine(name: &str, ram: Option<u64>) -> OfferedMachine {
        OfferedMachine {
            name: name.to_string(),
            summary: "box".into(),
            role: MachineRole::Auxiliary,
            ram_minimum: ram,
        }
    }

    #[test]
    fn repeated_environment_name_shares_one_machine() {
        let m1 = machine("x86_64-pc-linux-gnu", Some(100));
        let m2 = machine("x86_64-unknown-linux-gnu", Some(100));
        let offered = vec![&m1, &m2];
        let result = assign(
            &["db".to_string(), "db".to_string()],
            &offered,
            &configs(),
            0,
            9,
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].machine, result[1].machine);
    }

    #[test]
    fn too_many_distinct_environments_is_rejected() {
        let m1 = machine("x86_64-pc-linux-gnu", None);
        let offered = vec![&m1];
        let names: Vec<String> = (0..10).map(|i| format!("env{i}")).collect();
        let err = assign(&names, &offered, &configs(), 0, 9).unwrap_err();
        assert_eq!(err, AuxiliaryAssignError::TooManyEnvironments { requested: 10, max: 9 });
    }

    #[test]
    fn ram_budget_exhaustion_yields_no_suitable_machine() {
        let m1 = machine("x86_64-pc-linux-gnu", Some(900));
        let offered = vec![&m1];
        let err = assign(&["db".to_string()], &offered, &configs(), 500, 9).unwrap_err();
        assert_eq!(
            err,
            AuxiliaryAssignError::NoSuitableMachine { environment_name: "db".into() }
        );
    }
}
