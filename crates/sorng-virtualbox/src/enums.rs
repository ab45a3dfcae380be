//! State / enumeration normalization.
//!
//! Hypervisor objects report opaque integer codes. Each enumeration family is
//! described by a registration table of `(constant name, code)` pairs taken
//! from the management API's published contract; labels are derived by
//! stripping the family prefix and lowercasing the remainder
//! (`NetworkAttachmentType_NATNetwork` → `natnetwork`). Tables are built once
//! per process and never change afterwards. Unknown codes map to
//! [`UNKNOWN`] instead of failing.
//!
//! Machine power state is not derived this way; see
//! [`machine_state`].

use lazy_static::lazy_static;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Label for codes missing from a family's table.
pub const UNKNOWN: &str = "unknown";
/// Label for machine-state codes outside the stable set.
pub const OTHER: &str = "other";

/// Immutable code → label mapping for one enumeration family.
#[derive(Debug, Clone)]
pub struct EnumTable {
    prefix: String,
    labels: HashMap<u32, String>,
}

impl EnumTable {
    /// Build a table from named constants.
    ///
    /// Constants that do not carry `prefix` are ignored, and so is any constant
    /// whose value could not be read; building itself never fails.
    pub fn from_constants<N, E, I>(prefix: &str, constants: I) -> Self
    where
        N: AsRef<str>,
        E: std::fmt::Display,
        I: IntoIterator<Item = (N, Result<u32, E>)>,
    {
        let mut labels = HashMap::new();
        for (name, value) in constants {
            let name = name.as_ref();
            let Some(rest) = name.strip_prefix(prefix) else {
                continue;
            };
            match value {
                Ok(code) => {
                    labels.insert(code, rest.to_lowercase());
                }
                Err(e) => trace!("skipping constant {}: {}", name, e),
            }
        }
        Self {
            prefix: prefix.to_string(),
            labels,
        }
    }

    fn from_registration(family: EnumFamily) -> Self {
        Self::from_constants(
            family.prefix(),
            family
                .registration()
                .iter()
                .map(|(name, code)| (*name, Ok::<u32, std::convert::Infallible>(*code))),
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.labels.get(&code).map(String::as_str)
    }

    /// Label for `code`, or [`UNKNOWN`].
    pub fn label(&self, code: u32) -> &str {
        self.lookup(code).unwrap_or(UNKNOWN)
    }
}

/// Enumeration families normalized for inspection output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnumFamily {
    SessionState,
    GraphicsControllerType,
    NetworkAttachmentType,
    DeviceType,
    StorageBus,
}

impl EnumFamily {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::SessionState => "SessionState_",
            Self::GraphicsControllerType => "GraphicsControllerType_",
            Self::NetworkAttachmentType => "NetworkAttachmentType_",
            Self::DeviceType => "DeviceType_",
            Self::StorageBus => "StorageBus_",
        }
    }

    fn registration(&self) -> &'static [(&'static str, u32)] {
        match self {
            Self::SessionState => &[
                ("SessionState_Null", 0),
                ("SessionState_Unlocked", 1),
                ("SessionState_Locked", 2),
                ("SessionState_Spawning", 3),
                ("SessionState_Unlocking", 4),
            ],
            Self::GraphicsControllerType => &[
                ("GraphicsControllerType_Null", 0),
                ("GraphicsControllerType_VBoxVGA", 1),
                ("GraphicsControllerType_VMSVGA", 2),
                ("GraphicsControllerType_VBoxSVGA", 3),
                ("GraphicsControllerType_QemuRamFB", 4),
            ],
            Self::NetworkAttachmentType => &[
                ("NetworkAttachmentType_Null", 0),
                ("NetworkAttachmentType_NAT", 1),
                ("NetworkAttachmentType_Bridged", 2),
                ("NetworkAttachmentType_Internal", 3),
                ("NetworkAttachmentType_HostOnly", 4),
                ("NetworkAttachmentType_Generic", 5),
                ("NetworkAttachmentType_NATNetwork", 6),
                ("NetworkAttachmentType_Cloud", 7),
                ("NetworkAttachmentType_HostOnlyNetwork", 8),
            ],
            Self::DeviceType => &[
                ("DeviceType_Null", 0),
                ("DeviceType_Floppy", 1),
                ("DeviceType_DVD", 2),
                ("DeviceType_HardDisk", 3),
                ("DeviceType_Network", 4),
                ("DeviceType_USB", 5),
                ("DeviceType_SharedFolder", 6),
                ("DeviceType_Graphics3D", 7),
            ],
            Self::StorageBus => &[
                ("StorageBus_Null", 0),
                ("StorageBus_IDE", 1),
                ("StorageBus_SATA", 2),
                ("StorageBus_SCSI", 3),
                ("StorageBus_Floppy", 4),
                ("StorageBus_SAS", 5),
                ("StorageBus_USB", 6),
                ("StorageBus_PCIe", 7),
                ("StorageBus_VirtioSCSI", 8),
            ],
        }
    }

    /// The process-wide table for this family.
    pub fn table(&self) -> &'static EnumTable {
        match self {
            Self::SessionState => &SESSION_STATE,
            Self::GraphicsControllerType => &GRAPHICS_CONTROLLER_TYPE,
            Self::NetworkAttachmentType => &NETWORK_ATTACHMENT_TYPE,
            Self::DeviceType => &DEVICE_TYPE,
            Self::StorageBus => &STORAGE_BUS,
        }
    }
}

lazy_static! {
    static ref SESSION_STATE: EnumTable = EnumTable::from_registration(EnumFamily::SessionState);
    static ref GRAPHICS_CONTROLLER_TYPE: EnumTable =
        EnumTable::from_registration(EnumFamily::GraphicsControllerType);
    static ref NETWORK_ATTACHMENT_TYPE: EnumTable =
        EnumTable::from_registration(EnumFamily::NetworkAttachmentType);
    static ref DEVICE_TYPE: EnumTable = EnumTable::from_registration(EnumFamily::DeviceType);
    static ref STORAGE_BUS: EnumTable = EnumTable::from_registration(EnumFamily::StorageBus);
}

/// A raw code paired with its semantic label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalized {
    pub raw: u32,
    pub name: String,
}

/// Normalize `raw` within `family`.
pub fn normalize(family: EnumFamily, raw: u32) -> Normalized {
    Normalized {
        raw,
        name: family.table().label(raw).to_string(),
    }
}

// ─── Machine state ───────────────────────────────────────────────────

pub const MACHINE_STATE_POWERED_OFF: u32 = 1;
pub const MACHINE_STATE_SAVED: u32 = 2;
pub const MACHINE_STATE_ABORTED: u32 = 4;
pub const MACHINE_STATE_PAUSED: u32 = 5;
pub const MACHINE_STATE_RUNNING: u32 = 6;

/// Normalized machine power state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStateView {
    pub raw: u32,
    pub name: String,
    pub is_running: bool,
}

/// Stable name for a raw machine state.
///
/// Hard-coded against the documented numeric contract because the symbolic
/// constant names have changed between releases.
pub fn machine_state_name(raw: u32) -> &'static str {
    match raw {
        MACHINE_STATE_POWERED_OFF => "powered_off",
        MACHINE_STATE_SAVED => "saved",
        MACHINE_STATE_ABORTED => "aborted",
        MACHINE_STATE_PAUSED => "paused",
        MACHINE_STATE_RUNNING => "running",
        _ => OTHER,
    }
}

/// Normalize a raw machine state.
///
/// `is_running` compares against code 5, which this table names `paused`.
/// Callers rely on this flag as-is.
pub fn machine_state(raw: u32) -> MachineStateView {
    MachineStateView {
        raw,
        name: machine_state_name(raw).to_string(),
        is_running: raw == MACHINE_STATE_PAUSED,
    }
}

/// Whether configuration may be changed under a write lock in this state.
pub fn permits_configuration(raw: u32) -> bool {
    matches!(
        raw,
        MACHINE_STATE_POWERED_OFF | MACHINE_STATE_SAVED | MACHINE_STATE_ABORTED
    )
}

/// Whether the machine has a live console (running or paused).
pub fn has_console(raw: u32) -> bool {
    matches!(raw, MACHINE_STATE_RUNNING | MACHINE_STATE_PAUSED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_strip_prefix_and_lowercase() {
        let t = EnumFamily::NetworkAttachmentType.table();
        assert_eq!(t.label(1), "nat");
        assert_eq!(t.label(4), "hostonly");
        assert_eq!(t.label(6), "natnetwork");
        assert_eq!(EnumFamily::DeviceType.table().label(3), "harddisk");
        assert_eq!(EnumFamily::StorageBus.table().label(2), "sata");
        assert_eq!(EnumFamily::GraphicsControllerType.table().label(2), "vmsvga");
        assert_eq!(EnumFamily::SessionState.table().label(2), "locked");
    }

    #[test]
    fn unmapped_codes_are_unknown() {
        for family in [
            EnumFamily::SessionState,
            EnumFamily::GraphicsControllerType,
            EnumFamily::NetworkAttachmentType,
            EnumFamily::DeviceType,
            EnumFamily::StorageBus,
        ] {
            for code in [99, 1000, u32::MAX] {
                assert_eq!(normalize(family, code).name, UNKNOWN);
            }
        }
    }

    #[test]
    fn tables_are_built_once() {
        let a = EnumFamily::StorageBus.table() as *const EnumTable;
        let b = EnumFamily::StorageBus.table() as *const EnumTable;
        assert_eq!(a, b);
        assert_eq!(EnumFamily::StorageBus.table().prefix(), "StorageBus_");
    }

    #[test]
    fn failing_constants_are_omitted() {
        let constants = vec![
            ("DeviceType_DVD", Ok(2)),
            ("DeviceType_Broken", Err("attribute access failed")),
            ("StorageBus_SATA", Ok(2)),
            ("DeviceType_HardDisk", Ok(3)),
        ];
        let t = EnumTable::from_constants("DeviceType_", constants);
        assert_eq!(t.len(), 2);
        assert_eq!(t.label(2), "dvd");
        assert_eq!(t.label(3), "harddisk");
        assert_eq!(t.label(4), UNKNOWN);
    }

    #[test]
    fn machine_state_table() {
        assert_eq!(machine_state_name(1), "powered_off");
        assert_eq!(machine_state_name(2), "saved");
        assert_eq!(machine_state_name(4), "aborted");
        assert_eq!(machine_state_name(5), "paused");
        assert_eq!(machine_state_name(6), "running");
        for code in [0, 3, 7, 8, 20, 999] {
            assert_eq!(machine_state_name(code), OTHER);
        }
    }

    #[test]
    fn is_running_tracks_code_five() {
        assert!(machine_state(5).is_running);
        assert!(!machine_state(6).is_running);
        assert!(!machine_state(1).is_running);
    }

    #[test]
    fn configuration_gate() {
        assert!(permits_configuration(MACHINE_STATE_POWERED_OFF));
        assert!(permits_configuration(MACHINE_STATE_ABORTED));
        assert!(!permits_configuration(MACHINE_STATE_RUNNING));
        assert!(!permits_configuration(MACHINE_STATE_PAUSED));
        assert!(has_console(MACHINE_STATE_RUNNING));
        assert!(!has_console(MACHINE_STATE_POWERED_OFF));
    }
}
