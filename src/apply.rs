use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::{ApplyStage, DisplayError, Result};
use crate::identity::IdentityMap;
use crate::matching::{match_monitors, Assignment};
use crate::profile::DisplayProfile;
use crate::source_ids::SourceIdAllocator;
use crate::topology::{
    query_all_paths, CurrentPath, DisplayApi, ModeRecord, SetFlags, SourceMode, Topology, PATH_ACTIVE,
};

/// Paths and modes handed to the OS "set" primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigRequest {
    pub paths: Vec<CurrentPath>,
    pub modes: Vec<ModeRecord>,
}

impl ConfigRequest {
    /// The same paths with every mode reference dropped, so the OS picks all modes.
    pub fn topology_only(&self) -> Vec<CurrentPath> {
        self.paths
            .iter()
            .map(|path| {
                let mut path = *path;
                path.source.mode_idx = None;
                path.target.mode_idx = None;
                path
            })
            .collect()
    }
}

/// Build one active path per assignment, with a fresh mode list.
pub fn build_config(assignments: &[Assignment<'_>], topology: &Topology) -> Result<ConfigRequest> {
    let mut request = ConfigRequest::default();
    let mut source_ids = SourceIdAllocator::new();

    for assignment in assignments {
        let saved = assignment.monitor;
        let original = &topology.paths[assignment.path_index];
        let mut path = *original;

        path.flags = PATH_ACTIVE;
        path.target.rotation = saved.rotation;
        path.source.id = source_ids.allocate(path.source.adapter_id, saved.hint.source_id)?;

        path.source.mode_idx = Some(request.modes.len());
        request.modes.push(ModeRecord::source(
            path.source.adapter_id,
            path.source.id,
            SourceMode {
                width: saved.width,
                height: saved.height,
                pixel_format: PIXEL_FORMAT_32BPP,
                x: saved.x,
                y: saved.y,
            },
        ));

        // Reuse the timing the OS already had for this target; otherwise let it choose.
        path.target.mode_idx = match topology.target_mode_record(original) {
            Some(record) => {
                let mut record = *record;
                record.id = path.target.id;
                record.adapter_id = path.target.adapter_id;
                request.modes.push(record);
                Some(request.modes.len() - 1)
            }
            None => None,
        };

        request.paths.push(path);
    }

    Ok(request)
}

const PIXEL_FORMAT_32BPP: u32 = 4;

/// Which attempt of the protocol the OS accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliedVia {
    Precise,
    TopologyOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProtocolState {
    ValidatePrecise,
    ApplyPrecise,
    ValidateTopology,
    ApplyTopology,
}

/// Validate then apply the precise configuration, falling back to a topology-only apply
/// when the precise one does not validate. States only ever move forward.
pub fn run_protocol<A: DisplayApi + ?Sized>(api: &A, request: &ConfigRequest) -> Result<AppliedVia> {
    let topology_paths = request.topology_only();
    let mut state = ProtocolState::ValidatePrecise;

    loop {
        info!(?state, paths = request.paths.len(), "set display config");
        state = match state {
            ProtocolState::ValidatePrecise => {
                let status = api.set_config(
                    &request.paths,
                    &request.modes,
                    SetFlags::VALIDATE | SetFlags::USE_SUPPLIED_DISPLAY_CONFIG | SetFlags::ALLOW_CHANGES,
                );
                if status.is_success() {
                    ProtocolState::ApplyPrecise
                } else {
                    warn!(%status, "precise configuration rejected, retrying with topology only");
                    ProtocolState::ValidateTopology
                }
            }
            ProtocolState::ApplyPrecise => {
                let status = api.set_config(
                    &request.paths,
                    &request.modes,
                    SetFlags::APPLY
                        | SetFlags::USE_SUPPLIED_DISPLAY_CONFIG
                        | SetFlags::ALLOW_CHANGES
                        | SetFlags::SAVE_TO_DATABASE,
                );
                return if status.is_success() {
                    Ok(AppliedVia::Precise)
                } else {
                    Err(DisplayError::ApplyFailed { status, stage: ApplyStage::Precise })
                };
            }
            ProtocolState::ValidateTopology => {
                let status = api.set_config(
                    &topology_paths,
                    &[],
                    SetFlags::VALIDATE
                        | SetFlags::TOPOLOGY_SUPPLIED
                        | SetFlags::ALLOW_CHANGES
                        | SetFlags::ALLOW_PATH_ORDER_CHANGES,
                );
                if !status.is_success() {
                    return Err(DisplayError::ValidationFailed { status });
                }
                ProtocolState::ApplyTopology
            }
            ProtocolState::ApplyTopology => {
                let status = api.set_config(
                    &topology_paths,
                    &[],
                    SetFlags::APPLY
                        | SetFlags::TOPOLOGY_SUPPLIED
                        | SetFlags::ALLOW_CHANGES
                        | SetFlags::ALLOW_PATH_ORDER_CHANGES
                        | SetFlags::PATH_PERSIST_IF_REQUIRED,
                );
                return if status.is_success() {
                    Ok(AppliedVia::TopologyOnly)
                } else {
                    Err(DisplayError::ApplyFailed { status, stage: ApplyStage::TopologyOnly })
                };
            }
        };
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyReport {
    pub matched_count: usize,
    pub requested_count: usize,
    pub missing: Vec<String>,
    pub applied_via: AppliedVia,
}

/// Re-apply a saved profile onto whatever paths the OS reports right now.
pub fn apply_profile<A: DisplayApi + ?Sized>(api: &A, profile: &DisplayProfile) -> Result<ApplyReport> {
    profile.ensure_appliable()?;

    let topology = query_all_paths(api)?;
    let identities = IdentityMap::resolve(api, &topology.paths);

    let mut used = BTreeSet::new();
    let outcome = match_monitors(profile.active_monitors(), &topology.paths, &identities, &mut used);
    let missing = outcome.missing_names();

    if outcome.assignments.is_empty() {
        return Err(DisplayError::NoMonitorsMatched { missing });
    }

    let request = build_config(&outcome.assignments, &topology)?;
    let applied_via = run_protocol(api, &request)?;

    let report = ApplyReport {
        matched_count: outcome.assignments.len(),
        requested_count: profile.active_count(),
        missing,
        applied_via,
    };
    info!(
        profile = %profile.name,
        matched = report.matched_count,
        requested = report.requested_count,
        ?applied_via,
        "applied display profile"
    );
    Ok(report)
}

/// Outcome of an apply in the shape callers display.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyResult {
    pub success: bool,
    pub message: String,
    pub matched_count: usize,
    pub missing: Vec<String>,
    pub error_code: i32,
}

impl From<&Result<ApplyReport>> for ApplyResult {
    fn from(outcome: &Result<ApplyReport>) -> Self {
        match outcome {
            Ok(report) => ApplyResult {
                success: true,
                message: if report.missing.is_empty() {
                    format!("Profile applied successfully ({} monitors)", report.matched_count)
                } else {
                    format!(
                        "Profile applied ({} monitors matched, {} missing)",
                        report.matched_count,
                        report.missing.len()
                    )
                },
                matched_count: report.matched_count,
                missing: report.missing.clone(),
                error_code: 0,
            },
            Err(err) => ApplyResult {
                success: false,
                message: err.to_string(),
                matched_count: 0,
                missing: match err {
                    DisplayError::NoMonitorsMatched { missing } => missing.clone(),
                    _ => Vec::new(),
                },
                error_code: err.status_code(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_current_config;
    use crate::monitor::{MonitorConfig, MonitorIdentity, RefreshRate, Rotation};
    use crate::sim::{SimDisplay, SimMonitor};
    use crate::topology::OsStatus;

    fn desk() -> SimDisplay {
        SimDisplay::new()
            .with_monitor(SimMonitor::new(1, 0x1100, "DEL", 0xA0C4, "DELL U2719D").active_at(0, 0, 0, 2560, 1440))
            .with_monitor(SimMonitor::new(1, 0x1101, "GSM", 0x5B08, "LG HDR 4K").active_at(1, 2560, 0, 3840, 2160))
            .with_monitor(SimMonitor::new(1, 0x1102, "SAM", 0x0F12, "SAMSUNG"))
    }

    fn active_identities(profile: &DisplayProfile) -> Vec<MonitorIdentity> {
        profile.active_monitors().map(|m| m.identity.clone()).collect()
    }

    fn ghost(name: &str, target_id: u32) -> MonitorConfig {
        let mut monitor = MonitorConfig {
            identity: MonitorIdentity {
                manufacturer: "BNQ".to_string(),
                product_code: 0x7F2D,
                friendly_name: name.to_string(),
                device_path: format!(r"\\?\DISPLAY#BNQ7F2D#{}", name),
                ..Default::default()
            },
            active: true,
            width: 1920,
            height: 1080,
            ..Default::default()
        };
        monitor.hint.target_id = target_id;
        monitor
    }

    #[test]
    fn test_apply_then_capture_reproduces_active_identities() {
        let sim = desk();
        let mut profile = capture_current_config(&sim).unwrap();
        // swap which monitors are on and move them around
        profile.monitors[0].active = false;
        profile.monitors[2].active = true;
        profile.monitors[2].width = 1920;
        profile.monitors[2].height = 1080;
        profile.monitors[2].x = -1920;
        profile.monitors[2].rotation = Rotation::Rotate180;

        let report = apply_profile(&sim, &profile).unwrap();
        assert_eq!(report.applied_via, AppliedVia::Precise);
        assert_eq!(report.matched_count, 2);

        let after = capture_current_config(&sim).unwrap();
        assert_eq!(active_identities(&after), active_identities(&profile));
        let samsung = after.active_monitors().find(|m| m.identity.manufacturer == "SAM").unwrap();
        assert_eq!((samsung.x, samsung.width), (-1920, 1920));
        assert_eq!(samsung.rotation, Rotation::Rotate180);
    }

    #[test]
    fn test_empty_active_set_makes_no_os_call() {
        let sim = desk();
        let mut profile = capture_current_config(&sim).unwrap();
        for monitor in &mut profile.monitors {
            monitor.active = false;
        }
        let calls_before = sim.total_calls();

        assert!(matches!(apply_profile(&sim, &profile), Err(DisplayError::EmptyActiveSet)));
        let empty = DisplayProfile::new("Nothing", vec![]);
        assert!(matches!(apply_profile(&sim, &empty), Err(DisplayError::NoMonitorsInProfile)));
        assert_eq!(sim.total_calls(), calls_before);
    }

    #[test]
    fn test_partial_match_still_applies() {
        let sim = desk();
        let mut profile = capture_current_config(&sim).unwrap();
        profile.monitors.push(ghost("BenQ GW2480", 0x7700));
        profile.monitors.push(ghost("BenQ EW3270U", 0x7701));

        let report = apply_profile(&sim, &profile).unwrap();
        assert_eq!(report.matched_count, 2);
        assert_eq!(report.requested_count, 4);
        assert_eq!(report.missing, ["BenQ GW2480", "BenQ EW3270U"]);
        assert!(sim.set_calls().iter().any(|c| c.flags.contains(SetFlags::APPLY)));

        let result = ApplyResult::from(&Ok(report));
        assert!(result.success);
        assert_eq!(result.message, "Profile applied (2 monitors matched, 2 missing)");
    }

    #[test]
    fn test_nothing_matched_is_an_error_without_set_call() {
        let sim = desk();
        let profile = DisplayProfile::new("Elsewhere", vec![ghost("BenQ GW2480", 0x7700)]);
        match apply_profile(&sim, &profile) {
            Err(DisplayError::NoMonitorsMatched { missing }) => assert_eq!(missing, ["BenQ GW2480"]),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(sim.set_calls().is_empty());
    }

    #[test]
    fn test_precise_rejection_falls_back_to_topology() {
        let sim = desk();
        let profile = capture_current_config(&sim).unwrap();
        sim.script([OsStatus::INVALID_PARAMETER]);

        let report = apply_profile(&sim, &profile).unwrap();
        assert_eq!(report.applied_via, AppliedVia::TopologyOnly);

        let calls = sim.set_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].flags.contains(SetFlags::VALIDATE | SetFlags::USE_SUPPLIED_DISPLAY_CONFIG));
        assert_eq!(
            calls[1].flags,
            SetFlags::VALIDATE | SetFlags::TOPOLOGY_SUPPLIED | SetFlags::ALLOW_CHANGES | SetFlags::ALLOW_PATH_ORDER_CHANGES
        );
        assert!(calls[2].flags.contains(SetFlags::APPLY | SetFlags::PATH_PERSIST_IF_REQUIRED));
        assert_eq!(calls[1].mode_count, 0);
        assert!(calls[1].all_mode_indices_invalid);
    }

    #[test]
    fn test_both_validations_failing_is_terminal() {
        let sim = desk();
        let profile = capture_current_config(&sim).unwrap();
        sim.script([OsStatus::INVALID_PARAMETER, OsStatus(0x1F)]);

        match apply_profile(&sim, &profile) {
            Err(DisplayError::ValidationFailed { status }) => assert_eq!(status, OsStatus(0x1F)),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(sim.set_calls().len(), 2);
    }

    #[test]
    fn test_apply_failure_after_validation_keeps_status() {
        let sim = desk();
        let profile = capture_current_config(&sim).unwrap();
        sim.script([OsStatus::SUCCESS, OsStatus(5)]);

        let outcome = apply_profile(&sim, &profile);
        match &outcome {
            Err(DisplayError::ApplyFailed { status, stage }) => {
                assert_eq!(*status, OsStatus(5));
                assert_eq!(*stage, ApplyStage::Precise);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // no fallback once the precise validate has passed
        assert_eq!(sim.set_calls().len(), 2);

        let result = ApplyResult::from(&outcome);
        assert!(!result.success);
        assert_eq!(result.error_code, 5);
    }

    #[test]
    fn test_topology_apply_failure_is_reported() {
        let sim = desk();
        let profile = capture_current_config(&sim).unwrap();
        sim.script([OsStatus::INVALID_PARAMETER, OsStatus::SUCCESS, OsStatus(0x32)]);

        match apply_profile(&sim, &profile) {
            Err(DisplayError::ApplyFailed { status, stage }) => {
                assert_eq!(status, OsStatus(0x32));
                assert_eq!(stage, ApplyStage::TopologyOnly);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_source_ids_are_unique_per_adapter() {
        let sim = desk();
        let mut profile = capture_current_config(&sim).unwrap();
        // every saved monitor claims source 0
        for monitor in &mut profile.monitors {
            monitor.active = true;
            monitor.hint.source_id = 0;
            monitor.width = 1920;
            monitor.height = 1080;
        }
        profile.monitors[1].x = 1920;
        profile.monitors[2].x = 3840;

        let topology = query_all_paths(&sim).unwrap();
        let identities = IdentityMap::resolve(&sim, &topology.paths);
        let mut used = BTreeSet::new();
        let outcome = match_monitors(profile.active_monitors(), &topology.paths, &identities, &mut used);
        let request = build_config(&outcome.assignments, &topology).unwrap();

        let mut pairs: Vec<_> = request.paths.iter().map(|p| (p.source.adapter_id, p.source.id)).collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), 3);
        assert_eq!(request.paths[0].source.id, 0);

        assert!(apply_profile(&sim, &profile).is_ok());
    }

    #[test]
    fn test_build_config_copies_target_mode_only_when_usable() {
        let sim = desk();
        let mut profile = capture_current_config(&sim).unwrap();
        profile.monitors[2].active = true;
        profile.monitors[2].x = 6400;
        profile.monitors[2].width = 1920;
        profile.monitors[2].height = 1080;

        let topology = query_all_paths(&sim).unwrap();
        let identities = IdentityMap::resolve(&sim, &topology.paths);
        let mut used = BTreeSet::new();
        let outcome = match_monitors(profile.active_monitors(), &topology.paths, &identities, &mut used);
        let request = build_config(&outcome.assignments, &topology).unwrap();

        assert_eq!(request.paths.len(), 3);
        assert!(request.paths.iter().all(|p| p.is_active()));
        // two previously active monitors bring their timing along, the third lets the OS choose
        assert_eq!(request.modes.len(), 5);
        assert!(request.paths[2].target.mode_idx.is_none());

        let dell = &request.paths[0];
        let source = request.modes[dell.source.mode_idx.unwrap()];
        assert_eq!(source.id, dell.source.id);
        assert_eq!(source.as_source().unwrap().width, 2560);
        let target = request.modes[dell.target.mode_idx.unwrap()];
        assert_eq!(target.id, dell.target.id);
        assert_eq!(target.as_target().unwrap().v_sync, RefreshRate::new(60000, 1000));
    }
}
