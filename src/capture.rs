use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::Result;
use crate::identity::IdentityMap;
use crate::monitor::{MonitorConfig, MonitorIdentity, VolatileIds};
use crate::profile::DisplayProfile;
use crate::topology::{query_all_paths, CurrentPath, DisplayApi, Topology};

/// One entry per physical monitor the OS can name, active or not.
pub fn capture_monitors<A: DisplayApi + ?Sized>(api: &A) -> Result<Vec<MonitorConfig>> {
    let topology = query_all_paths(api)?;
    let identities = IdentityMap::resolve(api, &topology.paths);
    Ok(monitors_from_topology(&topology, &identities))
}

pub fn capture_current_config<A: DisplayApi + ?Sized>(api: &A) -> Result<DisplayProfile> {
    let monitors = capture_monitors(api)?;
    info!(
        monitors = monitors.len(),
        active = monitors.iter().filter(|m| m.active).count(),
        "captured current display configuration"
    );
    Ok(DisplayProfile::new("", monitors))
}

fn monitors_from_topology(topology: &Topology, identities: &IdentityMap) -> Vec<MonitorConfig> {
    let mut monitors: Vec<MonitorConfig> = Vec::new();
    // All-paths queries list a target once per candidate source.
    let mut seen: HashMap<String, usize> = HashMap::new();

    for path in &topology.paths {
        let Some(identity) = identities.for_path(path) else {
            continue;
        };

        let key = if identity.device_path.is_empty() {
            format!("{}#{}", path.target.adapter_id, path.target.id)
        } else {
            identity.device_path.clone()
        };

        match seen.get(&key) {
            Some(&idx) if !monitors[idx].active && path.is_active() => {
                debug!(target_id = path.target.id, "active path replaces inactive duplicate");
                monitors[idx] = monitor_from_path(path, identity, topology);
            }
            Some(_) => {}
            None => {
                seen.insert(key, monitors.len());
                monitors.push(monitor_from_path(path, identity, topology));
            }
        }
    }

    monitors
}

fn monitor_from_path(path: &CurrentPath, identity: &MonitorIdentity, topology: &Topology) -> MonitorConfig {
    let mut monitor = MonitorConfig {
        identity: identity.clone(),
        active: path.is_active(),
        rotation: path.target.rotation,
        hint: VolatileIds {
            adapter_id: path.source.adapter_id,
            source_id: path.source.id,
            target_id: path.target.id,
        },
        ..Default::default()
    };

    if !monitor.active {
        return monitor;
    }

    if let Some(source) = topology.source_mode(path) {
        monitor.width = source.width;
        monitor.height = source.height;
        monitor.x = source.x;
        monitor.y = source.y;
        monitor.primary = source.x == 0 && source.y == 0;
    }

    if let Some(target) = topology.target_mode(path) {
        monitor.refresh_rate = target.v_sync;
    }

    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{RefreshRate, Rotation};
    use crate::sim::{SimDisplay, SimMonitor};

    fn office() -> SimDisplay {
        SimDisplay::new()
            .with_monitor(SimMonitor::new(1, 0x1100, "DEL", 0xA0C4, "DELL U2719D").active_at(0, 0, 0, 2560, 1440))
            .with_monitor(
                SimMonitor::new(1, 0x1101, "GSM", 0x5B08, "LG HDR 4K")
                    .active_at(1, 2560, -200, 3840, 2160)
                    .rotated(Rotation::Rotate90),
            )
            .with_monitor(SimMonitor::new(1, 0x1102, "SAM", 0x0F12, "SAMSUNG"))
            .with_monitor(SimMonitor::new(1, 0x1103, "ACR", 0x0001, "").unresolvable())
    }

    #[test]
    fn test_capture_one_entry_per_monitor() {
        let monitors = capture_monitors(&office()).unwrap();
        assert_eq!(monitors.len(), 3);
        let names: Vec<_> = monitors.iter().map(|m| m.identity.friendly_name.as_str()).collect();
        assert_eq!(names, ["DELL U2719D", "LG HDR 4K", "SAMSUNG"]);
    }

    #[test]
    fn test_capture_reads_modes_of_active_monitors() {
        let monitors = capture_monitors(&office()).unwrap();

        let dell = &monitors[0];
        assert!(dell.active && dell.primary);
        assert_eq!((dell.width, dell.height, dell.x, dell.y), (2560, 1440, 0, 0));
        assert_eq!(dell.refresh_rate, RefreshRate::new(60000, 1000));
        assert_eq!(dell.identity.manufacturer, "DEL");
        assert_eq!(dell.hint.target_id, 0x1100);

        let lg = &monitors[1];
        assert!(lg.active && !lg.primary);
        assert_eq!((lg.x, lg.y), (2560, -200));
        assert_eq!(lg.rotation, Rotation::Rotate90);
        assert_eq!(lg.hint.source_id, 1);

        let samsung = &monitors[2];
        assert!(!samsung.active);
        assert_eq!((samsung.width, samsung.height), (0, 0));
    }

    #[test]
    fn test_active_path_wins_over_earlier_inactive_duplicate() {
        let sim = SimDisplay::new()
            .with_monitor(SimMonitor::new(1, 0x1100, "DEL", 0xA0C4, "DELL U2719D").active_at(1, 0, 0, 1920, 1080))
            .inactive_paths_first();
        let monitors = capture_monitors(&sim).unwrap();
        assert_eq!(monitors.len(), 1);
        assert!(monitors[0].active);
        assert_eq!(monitors[0].hint.source_id, 1);
    }

    #[test]
    fn test_capture_profile_has_timestamps() {
        let profile = capture_current_config(&office()).unwrap();
        assert_eq!(profile.active_count(), 2);
        assert_eq!(profile.created_at, profile.modified_at);
    }
}
