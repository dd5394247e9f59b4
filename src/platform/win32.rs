//! `DisplayApi` over the Windows CCD functions.

use std::mem;

use tracing::{trace, warn};
use windows::core::BOOL;
use windows::Win32::Devices::Display::{
    DisplayConfigGetDeviceInfo, GetDisplayConfigBufferSizes, QueryDisplayConfig, SetDisplayConfig,
    DISPLAYCONFIG_2DREGION, DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME, DISPLAYCONFIG_DEVICE_INFO_HEADER,
    DISPLAYCONFIG_MODE_INFO, DISPLAYCONFIG_MODE_INFO_0, DISPLAYCONFIG_MODE_INFO_TYPE,
    DISPLAYCONFIG_MODE_INFO_TYPE_SOURCE, DISPLAYCONFIG_MODE_INFO_TYPE_TARGET, DISPLAYCONFIG_PATH_INFO,
    DISPLAYCONFIG_PATH_SOURCE_INFO, DISPLAYCONFIG_PATH_SOURCE_INFO_0, DISPLAYCONFIG_PATH_TARGET_INFO,
    DISPLAYCONFIG_PATH_TARGET_INFO_0, DISPLAYCONFIG_PIXELFORMAT, DISPLAYCONFIG_RATIONAL, DISPLAYCONFIG_ROTATION,
    DISPLAYCONFIG_SCALING, DISPLAYCONFIG_SCANLINE_ORDERING, DISPLAYCONFIG_SOURCE_MODE,
    DISPLAYCONFIG_TARGET_DEVICE_NAME, DISPLAYCONFIG_TARGET_MODE, DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY,
    DISPLAYCONFIG_VIDEO_SIGNAL_INFO, DISPLAYCONFIG_VIDEO_SIGNAL_INFO_0, QDC_ALL_PATHS, SET_DISPLAY_CONFIG_FLAGS,
};
use windows::Win32::Foundation::{LUID, POINTL, WIN32_ERROR};

use crate::monitor::{RefreshRate, Rotation};
use crate::topology::{
    AdapterId, CurrentPath, DisplayApi, ModeKind, ModeRecord, OsStatus, PathSource, PathTarget, SetFlags,
    SourceMode, TargetDeviceName, TargetMode,
};

const MODE_IDX_INVALID: u32 = 0xFFFF_FFFF;
const TARGET_NAME_EDID_IDS_VALID: u32 = 0x4;

// Mode payloads are written into the union by value.
const _: () = assert!(mem::size_of::<DISPLAYCONFIG_SOURCE_MODE>() <= mem::size_of::<DISPLAYCONFIG_MODE_INFO_0>());
const _: () = assert!(mem::size_of::<DISPLAYCONFIG_TARGET_MODE>() <= mem::size_of::<DISPLAYCONFIG_MODE_INFO_0>());

#[derive(Clone, Copy, Debug, Default)]
pub struct Win32Display;

impl DisplayApi for Win32Display {
    fn buffer_sizes(&self) -> Result<(usize, usize), OsStatus> {
        let mut path_count = 0u32;
        let mut mode_count = 0u32;
        let status = unsafe { GetDisplayConfigBufferSizes(QDC_ALL_PATHS, &raw mut path_count, &raw mut mode_count) };
        check(status)?;
        trace!(path_count, mode_count, "GetDisplayConfigBufferSizes");
        Ok((path_count as usize, mode_count as usize))
    }

    fn query_config(&self, paths: &mut [CurrentPath], modes: &mut [ModeRecord]) -> Result<(usize, usize), OsStatus> {
        let mut raw_paths = vec![DISPLAYCONFIG_PATH_INFO::default(); paths.len()];
        let mut raw_modes = vec![DISPLAYCONFIG_MODE_INFO::default(); modes.len()];
        let mut path_count = raw_paths.len() as u32;
        let mut mode_count = raw_modes.len() as u32;

        let status = unsafe {
            QueryDisplayConfig(
                QDC_ALL_PATHS,
                &raw mut path_count,
                raw_paths.as_mut_ptr(),
                &raw mut mode_count,
                raw_modes.as_mut_ptr(),
                None,
            )
        };
        check(status)?;

        let (path_count, mode_count) = (path_count as usize, mode_count as usize);
        for (dst, src) in paths.iter_mut().zip(raw_paths.iter().take(path_count)) {
            *dst = path_from_raw(src);
        }
        for (dst, src) in modes.iter_mut().zip(raw_modes.iter().take(mode_count)) {
            *dst = mode_from_raw(src);
        }
        Ok((path_count, mode_count))
    }

    fn target_device_name(&self, adapter_id: AdapterId, target_id: u32) -> Result<TargetDeviceName, OsStatus> {
        let mut name = DISPLAYCONFIG_TARGET_DEVICE_NAME {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER {
                r#type: DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME,
                size: mem::size_of::<DISPLAYCONFIG_TARGET_DEVICE_NAME>() as u32,
                adapterId: to_luid(adapter_id),
                id: target_id,
            },
            ..Default::default()
        };

        let status = unsafe { DisplayConfigGetDeviceInfo(&raw mut name.header) };
        if status != 0 {
            return Err(OsStatus(status));
        }

        let flags = unsafe { name.flags.Anonymous.value };
        Ok(TargetDeviceName {
            edid_ids_valid: flags & TARGET_NAME_EDID_IDS_VALID != 0,
            output_technology: name.outputTechnology.0 as u32,
            edid_manufacture_id: name.edidManufactureId,
            edid_product_code_id: name.edidProductCodeId,
            connector_instance: name.connectorInstance,
            friendly_name: utf16_to_string(&name.monitorFriendlyDeviceName),
            device_path: utf16_to_string(&name.monitorDevicePath),
        })
    }

    fn set_config(&self, paths: &[CurrentPath], modes: &[ModeRecord], flags: SetFlags) -> OsStatus {
        let raw_paths: Vec<DISPLAYCONFIG_PATH_INFO> = paths.iter().map(path_to_raw).collect();
        let raw_modes: Vec<DISPLAYCONFIG_MODE_INFO> = modes.iter().map(mode_to_raw).collect();
        // topology-only requests must pass no mode array at all
        let mode_arg = (!raw_modes.is_empty()).then_some(raw_modes.as_slice());

        let status = unsafe { SetDisplayConfig(Some(&raw_paths), mode_arg, SET_DISPLAY_CONFIG_FLAGS(flags.bits())) };
        trace!(flags = format_args!("{:#x}", flags.bits()), status, "SetDisplayConfig");
        OsStatus(status)
    }
}

fn check(status: WIN32_ERROR) -> Result<(), OsStatus> {
    if status.is_err() {
        return Err(OsStatus(status.0 as i32));
    }
    Ok(())
}

fn utf16_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|c| *c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len]).trim().to_string()
}

fn from_luid(luid: LUID) -> AdapterId {
    AdapterId::new(luid.LowPart, luid.HighPart)
}

fn to_luid(adapter: AdapterId) -> LUID {
    LUID {
        LowPart: adapter.low,
        HighPart: adapter.high,
    }
}

fn from_mode_idx(raw: u32) -> Option<usize> {
    (raw != MODE_IDX_INVALID).then_some(raw as usize)
}

fn to_mode_idx(idx: Option<usize>) -> u32 {
    idx.map_or(MODE_IDX_INVALID, |i| i as u32)
}

fn from_rational(r: DISPLAYCONFIG_RATIONAL) -> RefreshRate {
    RefreshRate::new(r.Numerator, r.Denominator)
}

fn to_rational(r: RefreshRate) -> DISPLAYCONFIG_RATIONAL {
    DISPLAYCONFIG_RATIONAL {
        Numerator: r.numerator,
        Denominator: r.denominator,
    }
}

fn path_from_raw(raw: &DISPLAYCONFIG_PATH_INFO) -> CurrentPath {
    let source = &raw.sourceInfo;
    let target = &raw.targetInfo;
    // Not virtual-mode aware, so both unions hold the plain mode index.
    let (source_idx, target_idx) = unsafe { (source.Anonymous.modeInfoIdx, target.Anonymous.modeInfoIdx) };

    CurrentPath {
        source: PathSource {
            adapter_id: from_luid(source.adapterId),
            id: source.id,
            mode_idx: from_mode_idx(source_idx),
            status_flags: source.statusFlags,
        },
        target: PathTarget {
            adapter_id: from_luid(target.adapterId),
            id: target.id,
            mode_idx: from_mode_idx(target_idx),
            output_technology: target.outputTechnology.0 as u32,
            rotation: Rotation::from_raw(target.rotation.0 as u32),
            scaling: target.scaling.0 as u32,
            refresh_rate: from_rational(target.refreshRate),
            scan_line_ordering: target.scanLineOrdering.0 as u32,
            available: target.targetAvailable.as_bool(),
            status_flags: target.statusFlags,
        },
        flags: raw.flags,
    }
}

fn path_to_raw(path: &CurrentPath) -> DISPLAYCONFIG_PATH_INFO {
    DISPLAYCONFIG_PATH_INFO {
        sourceInfo: DISPLAYCONFIG_PATH_SOURCE_INFO {
            adapterId: to_luid(path.source.adapter_id),
            id: path.source.id,
            Anonymous: DISPLAYCONFIG_PATH_SOURCE_INFO_0 {
                modeInfoIdx: to_mode_idx(path.source.mode_idx),
            },
            statusFlags: path.source.status_flags,
        },
        targetInfo: DISPLAYCONFIG_PATH_TARGET_INFO {
            adapterId: to_luid(path.target.adapter_id),
            id: path.target.id,
            Anonymous: DISPLAYCONFIG_PATH_TARGET_INFO_0 {
                modeInfoIdx: to_mode_idx(path.target.mode_idx),
            },
            outputTechnology: DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY(path.target.output_technology as i32),
            rotation: DISPLAYCONFIG_ROTATION(path.target.rotation.to_raw() as i32),
            scaling: DISPLAYCONFIG_SCALING(path.target.scaling as i32),
            refreshRate: to_rational(path.target.refresh_rate),
            scanLineOrdering: DISPLAYCONFIG_SCANLINE_ORDERING(path.target.scan_line_ordering as i32),
            targetAvailable: BOOL::from(path.target.available),
            statusFlags: path.target.status_flags,
        },
        flags: path.flags,
    }
}

fn mode_from_raw(raw: &DISPLAYCONFIG_MODE_INFO) -> ModeRecord {
    let adapter_id = from_luid(raw.adapterId);
    match raw.infoType {
        DISPLAYCONFIG_MODE_INFO_TYPE_SOURCE => {
            let mode = unsafe { raw.Anonymous.sourceMode };
            ModeRecord::source(
                adapter_id,
                raw.id,
                SourceMode {
                    width: mode.width,
                    height: mode.height,
                    pixel_format: mode.pixelFormat.0 as u32,
                    x: mode.position.x,
                    y: mode.position.y,
                },
            )
        }
        DISPLAYCONFIG_MODE_INFO_TYPE_TARGET => {
            let signal = unsafe { raw.Anonymous.targetMode }.targetVideoSignalInfo;
            ModeRecord::target(
                adapter_id,
                raw.id,
                TargetMode {
                    pixel_rate: signal.pixelRate,
                    h_sync: from_rational(signal.hSyncFreq),
                    v_sync: from_rational(signal.vSyncFreq),
                    active_width: signal.activeSize.cx,
                    active_height: signal.activeSize.cy,
                    total_width: signal.totalSize.cx,
                    total_height: signal.totalSize.cy,
                    video_standard: unsafe { signal.Anonymous.videoStandard },
                    scan_line_ordering: signal.scanLineOrdering.0 as u32,
                },
            )
        }
        DISPLAYCONFIG_MODE_INFO_TYPE(other) => {
            // keep the slot so later indices still line up
            warn!(info_type = other, "ignoring unsupported display mode record");
            ModeRecord {
                adapter_id,
                id: raw.id,
                ..Default::default()
            }
        }
    }
}

fn mode_to_raw(mode: &ModeRecord) -> DISPLAYCONFIG_MODE_INFO {
    let (info_type, payload) = match &mode.kind {
        ModeKind::Source(source) => (
            DISPLAYCONFIG_MODE_INFO_TYPE_SOURCE,
            DISPLAYCONFIG_MODE_INFO_0 {
                sourceMode: DISPLAYCONFIG_SOURCE_MODE {
                    width: source.width,
                    height: source.height,
                    pixelFormat: DISPLAYCONFIG_PIXELFORMAT(source.pixel_format as i32),
                    position: POINTL { x: source.x, y: source.y },
                },
            },
        ),
        ModeKind::Target(target) => (
            DISPLAYCONFIG_MODE_INFO_TYPE_TARGET,
            DISPLAYCONFIG_MODE_INFO_0 {
                targetMode: DISPLAYCONFIG_TARGET_MODE {
                    targetVideoSignalInfo: DISPLAYCONFIG_VIDEO_SIGNAL_INFO {
                        pixelRate: target.pixel_rate,
                        hSyncFreq: to_rational(target.h_sync),
                        vSyncFreq: to_rational(target.v_sync),
                        activeSize: DISPLAYCONFIG_2DREGION {
                            cx: target.active_width,
                            cy: target.active_height,
                        },
                        totalSize: DISPLAYCONFIG_2DREGION {
                            cx: target.total_width,
                            cy: target.total_height,
                        },
                        Anonymous: DISPLAYCONFIG_VIDEO_SIGNAL_INFO_0 {
                            videoStandard: target.video_standard,
                        },
                        scanLineOrdering: DISPLAYCONFIG_SCANLINE_ORDERING(target.scan_line_ordering as i32),
                    },
                },
            },
        ),
    };

    DISPLAYCONFIG_MODE_INFO {
        infoType: info_type,
        id: mode.id,
        adapterId: to_luid(mode.adapter_id),
        Anonymous: payload,
    }
}
