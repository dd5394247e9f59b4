//! Greedy assignment of saved monitors onto the paths of a fresh query.
//!
//! Saved monitors are processed in profile order. Each one walks the passes
//! from strongest to weakest evidence and takes the first unused path that
//! satisfies a pass. A taken path is never offered again and no assignment is
//! revisited, so profile order decides ties.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::identity::IdentityMap;
use crate::monitor::{MonitorConfig, MonitorIdentity};
use crate::topology::CurrentPath;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPass {
    DevicePath,
    EdidCodes,
    FriendlyName,
    TargetId,
}

impl MatchPass {
    pub const FIRST: MatchPass = MatchPass::DevicePath;

    pub fn next(self) -> Option<MatchPass> {
        match self {
            MatchPass::DevicePath => Some(MatchPass::EdidCodes),
            MatchPass::EdidCodes => Some(MatchPass::FriendlyName),
            MatchPass::FriendlyName => Some(MatchPass::TargetId),
            MatchPass::TargetId => None,
        }
    }

    fn accepts(self, saved: &MonitorConfig, path: &CurrentPath, identity: Option<&MonitorIdentity>) -> bool {
        let wanted = &saved.identity;
        match (self, identity) {
            (MatchPass::DevicePath, Some(current)) => {
                !wanted.device_path.is_empty() && current.device_path == wanted.device_path
            }
            (MatchPass::EdidCodes, Some(current)) => {
                current.manufacturer == wanted.manufacturer && current.product_code == wanted.product_code
            }
            (MatchPass::FriendlyName, Some(current)) => {
                !wanted.friendly_name.is_empty()
                    && !current.friendly_name.is_empty()
                    && current.friendly_name == wanted.friendly_name
            }
            // volatile and adapter-relative, so it may well be a different panel
            (MatchPass::TargetId, _) => path.target.id == saved.hint.target_id,
            (_, None) => false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Assignment<'a> {
    pub monitor: &'a MonitorConfig,
    pub path_index: usize,
    pub pass: MatchPass,
}

#[derive(Debug, Default)]
pub struct MatchOutcome<'a> {
    pub assignments: Vec<Assignment<'a>>,
    pub unmatched: Vec<&'a MonitorConfig>,
}

impl MatchOutcome<'_> {
    pub fn missing_names(&self) -> Vec<String> {
        self.unmatched.iter().map(|m| m.display_name()).collect()
    }
}

/// Match `saved` monitors onto `paths`, skipping and then extending `used`.
pub fn match_monitors<'a, I>(
    saved: I,
    paths: &[CurrentPath],
    identities: &IdentityMap,
    used: &mut BTreeSet<usize>,
) -> MatchOutcome<'a>
where
    I: IntoIterator<Item = &'a MonitorConfig>,
{
    let mut outcome = MatchOutcome::default();

    for monitor in saved {
        match find_path(monitor, paths, identities, used) {
            Some((path_index, pass)) => {
                debug!(monitor = %monitor.display_name(), path_index, ?pass, "matched saved monitor");
                used.insert(path_index);
                outcome.assignments.push(Assignment { monitor, path_index, pass });
            }
            None => {
                warn!(monitor = %monitor.display_name(), "saved monitor is not connected");
                outcome.unmatched.push(monitor);
            }
        }
    }

    outcome
}

fn find_path(
    saved: &MonitorConfig,
    paths: &[CurrentPath],
    identities: &IdentityMap,
    used: &BTreeSet<usize>,
) -> Option<(usize, MatchPass)> {
    let mut pass = Some(MatchPass::FIRST);

    while let Some(current) = pass {
        let hit = paths
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .find(|(_, path)| current.accepts(saved, path, identities.for_path(path)));

        if let Some((i, _)) = hit {
            return Some((i, current));
        }
        pass = current.next();
    }

    None
}
