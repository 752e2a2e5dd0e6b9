use crate::{ProjectEntry, ProjectId, ProjectIdEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Divergences between the project registry and the id registry.
///
/// The two files describe one relation. Every id must appear exactly once in
/// each, and every customer name exactly once in the id registry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Ids present in the project registry but missing from the id registry.
    pub missing_from_projid: Vec<ProjectId>,
    /// Ids present in the id registry but missing from the project registry.
    pub missing_from_projects: Vec<ProjectId>,
    /// Ids listed more than once in the project registry.
    pub duplicate_project_ids: Vec<ProjectId>,
    /// Ids listed more than once in the id registry.
    pub duplicate_projid_ids: Vec<ProjectId>,
    /// Customer names listed more than once in the id registry.
    pub duplicate_customers: Vec<String>,
}

impl ConsistencyReport {
    pub fn build(projects: &[ProjectEntry], ids: &[ProjectIdEntry]) -> Self {
        let project_ids = count(projects.iter().map(|e| e.project_id));
        let projid_ids = count(ids.iter().map(|e| e.project_id));
        let customers = count(ids.iter().map(|e| e.customer.clone()));

        let known_projects: BTreeSet<_> = project_ids.keys().copied().collect();
        let known_projid: BTreeSet<_> = projid_ids.keys().copied().collect();

        Self {
            missing_from_projid: known_projects.difference(&known_projid).copied().collect(),
            missing_from_projects: known_projid.difference(&known_projects).copied().collect(),
            duplicate_project_ids: duplicates(project_ids),
            duplicate_projid_ids: duplicates(projid_ids),
            duplicate_customers: duplicates(customers),
        }
    }

    pub fn is_consistent(&self) -> bool {
        *self == Self::default()
    }
}

fn count<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn duplicates<K>(counts: BTreeMap<K, usize>) -> Vec<K> {
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(k, _)| k)
        .collect()
}
