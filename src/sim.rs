//! In-memory display backend for tests.
//!
//! Reports topology the way an all-paths query does: active paths first, then
//! one inactive path for every other source slot of each target's adapter.
//! `set_config` checks the request, and on apply makes exactly the supplied
//! paths active.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use crate::monitor::{RefreshRate, Rotation};
use crate::topology::{
    AdapterId, CurrentPath, DisplayApi, ModeRecord, OsStatus, PathSource, PathTarget, SetFlags, SourceMode,
    TargetDeviceName, TargetMode, PATH_ACTIVE,
};

const MIN_SOURCES_PER_ADAPTER: u32 = 4;

/// Pack a three-letter PNP id the way the OS reports it.
pub fn encode_manufacturer_id(code: &str) -> u16 {
    let packed = code
        .bytes()
        .fold(0u16, |acc, b| (acc << 5) | u16::from(b - b'A' + 1));
    packed.swap_bytes()
}

#[derive(Clone, Copy, Debug)]
struct ActiveState {
    source_id: u32,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    rotation: Rotation,
}

#[derive(Clone, Debug)]
pub struct SimMonitor {
    adapter: AdapterId,
    target_id: u32,
    name: TargetDeviceName,
    resolvable: bool,
    active: Option<ActiveState>,
    last_size: Option<(u32, u32)>,
    timing: TargetMode,
}

impl SimMonitor {
    pub fn new(adapter_low: u32, target_id: u32, manufacturer: &str, product: u16, friendly_name: &str) -> Self {
        SimMonitor {
            adapter: AdapterId::new(adapter_low, 0),
            target_id,
            name: TargetDeviceName {
                edid_ids_valid: true,
                output_technology: 10,
                edid_manufacture_id: encode_manufacturer_id(manufacturer),
                edid_product_code_id: product,
                connector_instance: 1,
                friendly_name: friendly_name.to_string(),
                device_path: format!(r"\\?\DISPLAY#{}{:04X}#{:X}", manufacturer, product, target_id),
            },
            resolvable: true,
            active: None,
            last_size: None,
            timing: TargetMode {
                pixel_rate: 148_500_000,
                h_sync: RefreshRate::new(67_500, 1),
                v_sync: RefreshRate::new(60_000, 1000),
                active_width: 1920,
                active_height: 1080,
                total_width: 2200,
                total_height: 1125,
                video_standard: 255,
                scan_line_ordering: 1,
            },
        }
    }

    pub fn active_at(mut self, source_id: u32, x: i32, y: i32, width: u32, height: u32) -> Self {
        self.active = Some(ActiveState {
            source_id,
            x,
            y,
            width,
            height,
            rotation: Rotation::Identity,
        });
        self
    }

    pub fn rotated(mut self, rotation: Rotation) -> Self {
        if let Some(active) = &mut self.active {
            active.rotation = rotation;
        }
        self
    }

    pub fn unresolvable(mut self) -> Self {
        self.resolvable = false;
        self
    }

    fn path(&self, source_id: u32, modes: (Option<usize>, Option<usize>), rotation: Rotation, flags: u32) -> CurrentPath {
        CurrentPath {
            source: PathSource {
                adapter_id: self.adapter,
                id: source_id,
                mode_idx: modes.0,
                status_flags: 0,
            },
            target: PathTarget {
                adapter_id: self.adapter,
                id: self.target_id,
                mode_idx: modes.1,
                output_technology: self.name.output_technology,
                rotation,
                scaling: 1,
                refresh_rate: self.timing.v_sync,
                scan_line_ordering: 1,
                available: true,
                status_flags: 0,
            },
            flags,
        }
    }
}

pub enum TopologyChange {
    Plug(SimMonitor),
    Unplug(u32),
}

#[derive(Clone, Debug)]
pub struct SetCall {
    pub flags: SetFlags,
    pub path_count: usize,
    pub mode_count: usize,
    pub all_mode_indices_invalid: bool,
}

#[derive(Default)]
struct SimState {
    monitors: Vec<SimMonitor>,
    inactive_first: bool,
    after_size_query: Option<TopologyChange>,
    grow_forever: bool,
    size_failure: Option<OsStatus>,
    scripted: VecDeque<OsStatus>,
    set_calls: Vec<SetCall>,
}

impl SimState {
    fn sources_for(&self, adapter: AdapterId) -> u32 {
        let targets = self.monitors.iter().filter(|m| m.adapter == adapter).count() as u32;
        targets.max(MIN_SOURCES_PER_ADAPTER)
    }

    fn enumerate(&self) -> (Vec<CurrentPath>, Vec<ModeRecord>) {
        let mut active = Vec::new();
        let mut inactive = Vec::new();
        let mut modes = Vec::new();

        for monitor in &self.monitors {
            if let Some(state) = monitor.active {
                modes.push(ModeRecord::source(
                    monitor.adapter,
                    state.source_id,
                    SourceMode {
                        width: state.width,
                        height: state.height,
                        pixel_format: 4,
                        x: state.x,
                        y: state.y,
                    },
                ));
                modes.push(ModeRecord::target(monitor.adapter, monitor.target_id, monitor.timing));
                let indices = (Some(modes.len() - 2), Some(modes.len() - 1));
                active.push(monitor.path(state.source_id, indices, state.rotation, PATH_ACTIVE));
            }

            for source_id in 0..self.sources_for(monitor.adapter) {
                if monitor.active.map(|a| a.source_id) == Some(source_id) {
                    continue;
                }
                inactive.push(monitor.path(source_id, (None, None), Rotation::Identity, 0));
            }
        }

        let paths = if self.inactive_first {
            inactive.into_iter().chain(active).collect()
        } else {
            active.into_iter().chain(inactive).collect()
        };
        (paths, modes)
    }

    fn apply_change(&mut self, change: TopologyChange) {
        match change {
            TopologyChange::Plug(monitor) => self.monitors.push(monitor),
            TopologyChange::Unplug(target_id) => self.monitors.retain(|m| m.target_id != target_id),
        }
    }

    fn check(&self, paths: &[CurrentPath], modes: &[ModeRecord], flags: SetFlags) -> Result<(), OsStatus> {
        let invalid = Err(OsStatus::INVALID_PARAMETER);
        if paths.is_empty() || flags.contains(SetFlags::VALIDATE) == flags.contains(SetFlags::APPLY) {
            return invalid;
        }
        let topology_only = flags.contains(SetFlags::TOPOLOGY_SUPPLIED);
        if topology_only && !modes.is_empty() {
            return invalid;
        }

        let mut targets = HashSet::new();
        let mut sources = HashSet::new();
        for path in paths {
            let known = self
                .monitors
                .iter()
                .any(|m| m.adapter == path.target.adapter_id && m.target_id == path.target.id);
            if !path.is_active()
                || !known
                || !targets.insert(path.target_key())
                || !sources.insert((path.source.adapter_id, path.source.id))
                || path.source.id >= self.sources_for(path.source.adapter_id)
            {
                return invalid;
            }

            if topology_only {
                if path.source.mode_idx.is_some() || path.target.mode_idx.is_some() {
                    return invalid;
                }
                continue;
            }

            let source_ok = path
                .source
                .mode_idx
                .and_then(|i| modes.get(i))
                .filter(|r| r.id == path.source.id && r.adapter_id == path.source.adapter_id)
                .and_then(ModeRecord::as_source)
                .is_some();
            if !source_ok {
                return invalid;
            }
            if let Some(i) = path.target.mode_idx {
                match modes.get(i) {
                    Some(r) if r.as_target().is_some() && r.id == path.target.id => {}
                    _ => return invalid,
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, paths: &[CurrentPath], modes: &[ModeRecord]) {
        for monitor in &mut self.monitors {
            if let Some(state) = monitor.active.take() {
                monitor.last_size = Some((state.width, state.height));
            }
        }

        let mut next_x = 0i32;
        for path in paths {
            let source = path.source.mode_idx.and_then(|i| modes.get(i)).and_then(ModeRecord::as_source).copied();
            let timing = path.target.mode_idx.and_then(|i| modes.get(i)).and_then(ModeRecord::as_target).copied();
            let Some(monitor) = self
                .monitors
                .iter_mut()
                .find(|m| m.adapter == path.target.adapter_id && m.target_id == path.target.id)
            else {
                continue;
            };

            let state = match source {
                Some(mode) => ActiveState {
                    source_id: path.source.id,
                    x: mode.x,
                    y: mode.y,
                    width: mode.width,
                    height: mode.height,
                    rotation: path.target.rotation,
                },
                None => {
                    let (width, height) = monitor
                        .last_size
                        .unwrap_or((monitor.timing.active_width, monitor.timing.active_height));
                    let state = ActiveState {
                        source_id: path.source.id,
                        x: next_x,
                        y: 0,
                        width,
                        height,
                        rotation: path.target.rotation,
                    };
                    next_x += width as i32;
                    state
                }
            };

            if let Some(timing) = timing {
                monitor.timing = timing;
            }
            monitor.active = Some(state);
        }
    }
}

#[derive(Default)]
pub struct SimDisplay {
    state: RefCell<SimState>,
    size_queries: Cell<usize>,
    name_queries: Cell<usize>,
    total_calls: Cell<usize>,
}

impl SimDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_monitor(self, monitor: SimMonitor) -> Self {
        self.state.borrow_mut().monitors.push(monitor);
        self
    }

    pub fn inactive_paths_first(self) -> Self {
        self.state.borrow_mut().inactive_first = true;
        self
    }

    pub fn after_size_query(&self, change: TopologyChange) {
        self.state.borrow_mut().after_size_query = Some(change);
    }

    pub fn keep_growing(&self) {
        self.state.borrow_mut().grow_forever = true;
    }

    pub fn fail_size_query(&self, status: OsStatus) {
        self.state.borrow_mut().size_failure = Some(status);
    }

    /// Statuses returned by the next `set_config` calls. A scripted success still runs the checks.
    pub fn script(&self, statuses: impl IntoIterator<Item = OsStatus>) {
        self.state.borrow_mut().scripted.extend(statuses);
    }

    pub fn set_calls(&self) -> Vec<SetCall> {
        self.state.borrow().set_calls.clone()
    }

    pub fn size_queries(&self) -> usize {
        self.size_queries.get()
    }

    pub fn device_name_queries(&self) -> usize {
        self.name_queries.get()
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.get()
    }

    fn count(&self, counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
        self.total_calls.set(self.total_calls.get() + 1);
    }
}

impl DisplayApi for SimDisplay {
    fn buffer_sizes(&self) -> Result<(usize, usize), OsStatus> {
        self.count(&self.size_queries);
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.size_failure {
            return Err(status);
        }

        let (paths, modes) = state.enumerate();
        if let Some(change) = state.after_size_query.take() {
            state.apply_change(change);
        }
        if state.grow_forever {
            let target_id = 0x9000 + self.size_queries.get() as u32;
            state.monitors.push(SimMonitor::new(9, target_id, "NEW", 1, "Hotplugged"));
        }
        Ok((paths.len(), modes.len()))
    }

    fn query_config(&self, paths: &mut [CurrentPath], modes: &mut [ModeRecord]) -> Result<(usize, usize), OsStatus> {
        self.total_calls.set(self.total_calls.get() + 1);
        let (found_paths, found_modes) = self.state.borrow().enumerate();
        if found_paths.len() > paths.len() || found_modes.len() > modes.len() {
            return Err(OsStatus::INSUFFICIENT_BUFFER);
        }
        paths[..found_paths.len()].copy_from_slice(&found_paths);
        modes[..found_modes.len()].copy_from_slice(&found_modes);
        Ok((found_paths.len(), found_modes.len()))
    }

    fn target_device_name(&self, adapter_id: AdapterId, target_id: u32) -> Result<TargetDeviceName, OsStatus> {
        self.count(&self.name_queries);
        let state = self.state.borrow();
        match state
            .monitors
            .iter()
            .find(|m| m.adapter == adapter_id && m.target_id == target_id)
        {
            Some(monitor) if monitor.resolvable => Ok(monitor.name.clone()),
            Some(_) => Err(OsStatus::GEN_FAILURE),
            None => Err(OsStatus::INVALID_PARAMETER),
        }
    }

    fn set_config(&self, paths: &[CurrentPath], modes: &[ModeRecord], flags: SetFlags) -> OsStatus {
        self.total_calls.set(self.total_calls.get() + 1);
        let mut state = self.state.borrow_mut();
        state.set_calls.push(SetCall {
            flags,
            path_count: paths.len(),
            mode_count: modes.len(),
            all_mode_indices_invalid: paths
                .iter()
                .all(|p| p.source.mode_idx.is_none() && p.target.mode_idx.is_none()),
        });

        if let Some(status) = state.scripted.pop_front() {
            if !status.is_success() {
                return status;
            }
        }
        if let Err(status) = state.check(paths, modes, flags) {
            return status;
        }
        if flags.contains(SetFlags::APPLY) {
            state.commit(paths, modes);
        }
        OsStatus::SUCCESS
    }
}
