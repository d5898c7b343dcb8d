//! Collapses module revisions into one entry per (case-insensitive) module name.
//!
//! Nothing here touches the record store: callers pass the rows in, the functions shape
//! them for listings and are re-run on every request.

use crate::domain::model::Module;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

/// All uploads sharing a module name, presented as their newest revision.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersionGroup {
    /// Lowercased grouping key.
    pub name: String,
    pub latest: Module,
    pub version_count: usize,
}

/// One entry of a module's version history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersion {
    #[serde(flatten)]
    pub module: Module,
    pub is_current: bool,
}

/// Groups modules by lowercased name.
///
/// Inside a group revisions are ordered newest first; equal `created_at` values keep
/// their input order. Groups come out newest-latest first, ties in discovery order.
pub fn group<I>(modules: I) -> Vec<ModuleVersionGroup>
where
    I: IntoIterator<Item = Module>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut partitions: Vec<(String, Vec<Module>)> = Vec::new();

    for module in modules {
        let key = module.group_key();
        match index.get(&key) {
            Some(&slot) => partitions[slot].1.push(module),
            None => {
                index.insert(key.clone(), partitions.len());
                partitions.push((key, vec![module]));
            }
        }
    }

    let mut groups: Vec<ModuleVersionGroup> = partitions
        .into_iter()
        .filter_map(|(name, mut revisions)| {
            sort_newest_first(&mut revisions);
            let version_count = revisions.len();
            revisions.into_iter().next().map(|latest| ModuleVersionGroup {
                name,
                latest,
                version_count,
            })
        })
        .collect();

    groups.sort_by(|a, b| b.latest.created_at.cmp(&a.latest.created_at));
    groups
}

/// Full history of the module called `name` (case-insensitive), newest first.
/// Exactly the head, the group's `latest`, is flagged current.
pub fn list_versions<I>(modules: I, name: &str) -> Vec<ModuleVersion>
where
    I: IntoIterator<Item = Module>,
{
    let key = name.to_lowercase();
    let mut revisions: Vec<Module> = modules
        .into_iter()
        .filter(|m| m.group_key() == key)
        .collect();
    sort_newest_first(&mut revisions);

    revisions
        .into_iter()
        .enumerate()
        .map(|(i, module)| ModuleVersion {
            module,
            is_current: i == 0,
        })
        .collect()
}

// `sort_by` is stable, which is what keeps ties in input order.
fn sort_newest_first(revisions: &mut [Module]) {
    revisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
