//! Live display topology as reported by the OS display-configuration API.
//!
//! Everything here lives for a single query. Mode records are addressed by
//! their index in the query's mode array, never by reference.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DisplayError, Result};
use crate::monitor::{RefreshRate, Rotation};

/// Rounds of size negotiation before giving up on a topology that keeps growing.
pub const MAX_QUERY_ATTEMPTS: usize = 8;

/// Set on `CurrentPath::flags` when the path is driving its target.
pub const PATH_ACTIVE: u32 = 0x0000_0001;

/// Locally unique adapter id (a LUID). Reassigned on every boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdapterId {
    pub low: u32,
    pub high: i32,
}

impl AdapterId {
    pub fn new(low: u32, high: i32) -> Self {
        AdapterId { low, high }
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}:{:08X}", self.high as u32, self.low)
    }
}

/// Numeric status from an OS primitive. Zero is success; everything else is surfaced verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OsStatus(pub i32);

impl OsStatus {
    pub const SUCCESS: OsStatus = OsStatus(0);
    pub const GEN_FAILURE: OsStatus = OsStatus(31);
    pub const NOT_SUPPORTED: OsStatus = OsStatus(50);
    pub const INVALID_PARAMETER: OsStatus = OsStatus(87);
    pub const INSUFFICIENT_BUFFER: OsStatus = OsStatus(122);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for OsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathSource {
    pub adapter_id: AdapterId,
    pub id: u32,
    pub mode_idx: Option<usize>,
    pub status_flags: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathTarget {
    pub adapter_id: AdapterId,
    pub id: u32,
    pub mode_idx: Option<usize>,
    pub output_technology: u32,
    pub rotation: Rotation,
    pub scaling: u32,
    pub refresh_rate: RefreshRate,
    pub scan_line_ordering: u32,
    pub available: bool,
    pub status_flags: u32,
}

/// One source-to-target association from a topology query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CurrentPath {
    pub source: PathSource,
    pub target: PathTarget,
    pub flags: u32,
}

impl CurrentPath {
    pub fn is_active(&self) -> bool {
        self.flags & PATH_ACTIVE != 0
    }

    pub fn target_key(&self) -> TargetKey {
        (self.target.adapter_id, self.target.id)
    }
}

/// Adapter-scoped target address used to look up identities.
pub type TargetKey = (AdapterId, u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceMode {
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub x: i32,
    pub y: i32,
}

/// Video signal timing of a target mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TargetMode {
    pub pixel_rate: u64,
    pub h_sync: RefreshRate,
    pub v_sync: RefreshRate,
    pub active_width: u32,
    pub active_height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub video_standard: u32,
    pub scan_line_ordering: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeKind {
    Source(SourceMode),
    Target(TargetMode),
}

impl Default for ModeKind {
    fn default() -> Self {
        ModeKind::Source(SourceMode::default())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeRecord {
    pub adapter_id: AdapterId,
    /// Source id or target id, depending on the kind.
    pub id: u32,
    pub kind: ModeKind,
}

impl ModeRecord {
    pub fn source(adapter_id: AdapterId, id: u32, mode: SourceMode) -> Self {
        ModeRecord { adapter_id, id, kind: ModeKind::Source(mode) }
    }

    pub fn target(adapter_id: AdapterId, id: u32, mode: TargetMode) -> Self {
        ModeRecord { adapter_id, id, kind: ModeKind::Target(mode) }
    }

    pub fn as_source(&self) -> Option<&SourceMode> {
        match &self.kind {
            ModeKind::Source(mode) => Some(mode),
            ModeKind::Target(_) => None,
        }
    }

    pub fn as_target(&self) -> Option<&TargetMode> {
        match &self.kind {
            ModeKind::Target(mode) => Some(mode),
            ModeKind::Source(_) => None,
        }
    }
}

/// Flag set for the OS "set configuration" primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetFlags(u32);

impl SetFlags {
    pub const TOPOLOGY_SUPPLIED: SetFlags = SetFlags(0x0000_0010);
    pub const USE_SUPPLIED_DISPLAY_CONFIG: SetFlags = SetFlags(0x0000_0020);
    pub const VALIDATE: SetFlags = SetFlags(0x0000_0040);
    pub const APPLY: SetFlags = SetFlags(0x0000_0080);
    pub const SAVE_TO_DATABASE: SetFlags = SetFlags(0x0000_0200);
    pub const ALLOW_CHANGES: SetFlags = SetFlags(0x0000_0400);
    pub const PATH_PERSIST_IF_REQUIRED: SetFlags = SetFlags(0x0000_0800);
    pub const ALLOW_PATH_ORDER_CHANGES: SetFlags = SetFlags(0x0000_2000);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SetFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SetFlags {
    type Output = SetFlags;

    fn bitor(self, rhs: SetFlags) -> SetFlags {
        SetFlags(self.0 | rhs.0)
    }
}

/// EDID-derived naming the OS reports for one target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetDeviceName {
    pub edid_ids_valid: bool,
    pub output_technology: u32,
    /// Packed, byte-swapped EDID manufacturer id exactly as the OS hands it over.
    pub edid_manufacture_id: u16,
    pub edid_product_code_id: u16,
    pub connector_instance: u32,
    pub friendly_name: String,
    pub device_path: String,
}

/// The OS primitives the reconciliation engine is written against.
pub trait DisplayApi {
    /// Element counts needed for an all-paths query.
    fn buffer_sizes(&self) -> std::result::Result<(usize, usize), OsStatus>;

    /// Fills the fixed-size buffers and returns how many entries of each were written.
    /// Fails with `OsStatus::INSUFFICIENT_BUFFER` when the topology no longer fits.
    fn query_config(
        &self,
        paths: &mut [CurrentPath],
        modes: &mut [ModeRecord],
    ) -> std::result::Result<(usize, usize), OsStatus>;

    fn target_device_name(
        &self,
        adapter_id: AdapterId,
        target_id: u32,
    ) -> std::result::Result<TargetDeviceName, OsStatus>;

    fn set_config(&self, paths: &[CurrentPath], modes: &[ModeRecord], flags: SetFlags) -> OsStatus;
}

/// Paths and modes from one query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Topology {
    pub paths: Vec<CurrentPath>,
    pub modes: Vec<ModeRecord>,
}

impl Topology {
    fn mode(&self, idx: Option<usize>) -> Option<&ModeRecord> {
        idx.and_then(|i| self.modes.get(i))
    }

    pub fn source_mode(&self, path: &CurrentPath) -> Option<&SourceMode> {
        self.mode(path.source.mode_idx).and_then(ModeRecord::as_source)
    }

    /// The target-mode record a path points at, if it points at a usable one.
    pub fn target_mode_record(&self, path: &CurrentPath) -> Option<&ModeRecord> {
        self.mode(path.target.mode_idx).filter(|m| m.as_target().is_some())
    }

    pub fn target_mode(&self, path: &CurrentPath) -> Option<&TargetMode> {
        self.target_mode_record(path).and_then(ModeRecord::as_target)
    }
}

/// Query every path the OS knows about, active or not.
pub fn query_all_paths<A: DisplayApi + ?Sized>(api: &A) -> Result<Topology> {
    let mut last_status = OsStatus::INSUFFICIENT_BUFFER;

    for attempt in 1..=MAX_QUERY_ATTEMPTS {
        let (path_capacity, mode_capacity) = api
            .buffer_sizes()
            .map_err(|status| DisplayError::TopologyQueryFailed { status })?;

        let mut paths = vec![CurrentPath::default(); path_capacity];
        let mut modes = vec![ModeRecord::default(); mode_capacity];

        match api.query_config(&mut paths, &mut modes) {
            Ok((path_count, mode_count)) if path_count <= path_capacity && mode_count <= mode_capacity => {
                paths.truncate(path_count);
                modes.truncate(mode_count);
                debug!(attempt, paths = path_count, modes = mode_count, "queried display topology");
                return Ok(Topology { paths, modes });
            }
            Ok((path_count, mode_count)) => {
                warn!(
                    path_count, path_capacity, mode_count, mode_capacity,
                    "topology query reported more entries than were allocated"
                );
                last_status = OsStatus::INSUFFICIENT_BUFFER;
            }
            Err(status) if status == OsStatus::INSUFFICIENT_BUFFER => {
                debug!(attempt, "topology grew between size and data query, retrying");
                last_status = status;
            }
            Err(status) => return Err(DisplayError::TopologyQueryFailed { status }),
        }
    }

    Err(DisplayError::TopologyQueryFailed { status: last_status })
}
