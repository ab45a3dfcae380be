//! Read-only VM inspection.
//!
//! Produces a structured record of a machine's identity, power state,
//! hardware, display, network, storage, audio and snapshot summary. No lock
//! is taken. Only the root machine lookup can fail the call; every
//! sub-object is read defensively and degrades to its absent or empty form.

use crate::api::VirtualBoxApi;
use crate::enums::{machine_state, normalize, EnumFamily, MachineStateView, Normalized};
use crate::input::provided;
use crate::session::SessionManager;
use crate::types::{
    AttributeBag, MachineInfo, MediumAttachmentInfo, NETWORK_ADAPTER_SLOTS,
};
use chrono::{SecondsFormat, TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Record ───────────────────────────────────────────────────────────

/// Inspection result, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum VmInspection {
    #[serde(rename = "OK")]
    Ok(Box<VmDetails>),
    #[serde(rename = "ERR")]
    Err { message: String },
}

impl VmInspection {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Err {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn details(&self) -> Option<&VmDetails> {
        match self {
            Self::Ok(d) => Some(d),
            Self::Err { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmDetails {
    pub identity: Identity,
    pub state: StateSection,
    pub hardware: Hardware,
    pub display: Option<DisplaySection>,
    pub network: Vec<NetworkEntry>,
    pub storage: Vec<StorageEntry>,
    pub audio: Option<AudioSection>,
    pub snapshots: Snapshots,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub id: String,
    pub os_type_id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSection {
    pub vm_state: MachineStateView,
    pub session_state: Normalized,
    /// RFC 3339, UTC.
    pub last_state_change: Option<String>,
    pub accessible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hardware {
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub memory_balloon_mb: u64,
    pub cpu_execution_cap: u32,
    pub page_fusion_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySection {
    /// `None` when the adapter reports no usable controller code.
    pub graphics_controller: Option<Normalized>,
    pub vram_mb: Option<u64>,
    pub monitor_count: Option<u64>,
    pub accelerate_3d: bool,
    pub accelerate_2d: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    /// Zero-based adapter slot.
    pub slot: u32,
    pub adapter_type_raw: u32,
    pub attachment: Normalized,
    pub mac_address: String,
    pub cable_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub controller_name: String,
    pub bus: Normalized,
    pub controller_type_raw: u32,
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub port: i32,
    pub device: i32,
    pub device_type: Normalized,
    pub medium: MediumEntry,
}

/// Mounted medium; every field is null for an empty drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediumEntry {
    pub name: Option<String>,
    pub location: Option<String>,
    pub logical_size: Option<i64>,
    pub format: Option<String>,
    pub state: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSection {
    pub enabled: bool,
    pub audio_controller_raw: Option<u64>,
    pub audio_driver_raw: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshots {
    pub count: u32,
    pub current_snapshot_id: Option<String>,
}

// ── Attribute fallback ───────────────────────────────────────────────

const GRAPHICS_CONTROLLER: &[&str] = &["graphicsControllerType", "GraphicsControllerType"];
const VRAM_SIZE: &[&str] = &["VRAMSize", "vramSize"];
const MONITOR_COUNT: &[&str] = &["monitorCount", "MonitorCount"];
const ACCELERATE_3D: &[&str] = &["accelerate3DEnabled", "Accelerate3DEnabled"];
const ACCELERATE_2D: &[&str] = &["accelerate2DVideoEnabled", "Accelerate2DVideoEnabled"];
const AUDIO_ENABLED: &[&str] = &["enabled", "Enabled"];
const AUDIO_CONTROLLER: &[&str] = &["audioController", "AudioController"];
const AUDIO_DRIVER: &[&str] = &["audioDriver", "AudioDriver"];

/// First non-null attribute among `candidates`, in order.
pub fn resolve<'a>(bag: &'a AttributeBag, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|name| bag.get(*name))
        .find(|v| !v.is_null())
}

fn resolve_u64(bag: &AttributeBag, candidates: &[&str]) -> Option<u64> {
    resolve(bag, candidates).and_then(Value::as_u64)
}

fn resolve_u32(bag: &AttributeBag, candidates: &[&str]) -> Option<u32> {
    resolve_u64(bag, candidates).and_then(|v| u32::try_from(v).ok())
}

fn resolve_bool(bag: &AttributeBag, candidates: &[&str]) -> bool {
    resolve(bag, candidates)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn rfc3339_from_millis(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ── Inspector ────────────────────────────────────────────────────────

/// Builds [`VmInspection`] records.
pub struct InspectManager;

impl InspectManager {
    pub async fn show_vm_info(api: &dyn VirtualBoxApi, vm_name: &str) -> VmInspection {
        let Some(name) = provided(vm_name) else {
            return VmInspection::error("vm_name is required");
        };
        let machine = match SessionManager::resolve(api, name).await {
            Ok(m) => m,
            Err(e) => return VmInspection::error(e.message),
        };
        debug!("Inspecting '{}' ({})", machine.name, machine.id);

        let details = VmDetails {
            identity: Identity {
                name: machine.name.clone(),
                id: machine.id.clone(),
                os_type_id: machine.os_type_id.clone(),
                description: machine.description.clone(),
            },
            state: StateSection {
                vm_state: machine_state(machine.state),
                session_state: normalize(EnumFamily::SessionState, machine.session_state),
                last_state_change: rfc3339_from_millis(machine.last_state_change_ms),
                accessible: machine.accessible,
            },
            hardware: Hardware {
                cpu_count: machine.cpu_count,
                memory_mb: machine.memory_mb,
                memory_balloon_mb: machine.memory_balloon_mb,
                cpu_execution_cap: machine.cpu_execution_cap,
                page_fusion_enabled: machine.page_fusion_enabled,
            },
            display: Self::display(api, &machine).await,
            network: Self::network(api, &machine, NETWORK_ADAPTER_SLOTS).await,
            storage: Self::storage(api, &machine).await,
            audio: Self::audio(api, &machine).await,
            snapshots: Snapshots {
                count: machine.snapshot_count,
                current_snapshot_id: machine.current_snapshot_id.clone(),
            },
        };
        VmInspection::Ok(Box::new(details))
    }

    async fn display(api: &dyn VirtualBoxApi, machine: &MachineInfo) -> Option<DisplaySection> {
        let bag = match api.graphics_adapter(&machine.id).await {
            Ok(bag) => bag,
            Err(e) => {
                warn!("Graphics adapter of '{}' unreadable: {}", machine.name, e);
                return None;
            }
        };
        let controller = resolve_u32(&bag, GRAPHICS_CONTROLLER)
            .map(|raw| normalize(EnumFamily::GraphicsControllerType, raw));
        if controller.is_none() {
            debug!("Graphics controller of '{}' not reported", machine.name);
        }
        Some(DisplaySection {
            graphics_controller: controller,
            vram_mb: resolve_u64(&bag, VRAM_SIZE),
            monitor_count: resolve_u64(&bag, MONITOR_COUNT),
            accelerate_3d: resolve_bool(&bag, ACCELERATE_3D),
            accelerate_2d: resolve_bool(&bag, ACCELERATE_2D),
        })
    }

    /// Enabled adapters only.
    async fn network(api: &dyn VirtualBoxApi, machine: &MachineInfo, slots: u32) -> Vec<NetworkEntry> {
        let mut entries = Vec::new();
        for slot in 0..slots {
            let adapter = match api.network_adapter(&machine.id, slot).await {
                Ok(a) => a,
                Err(e) => {
                    debug!("Adapter slot {} of '{}' unreadable: {}", slot, machine.name, e);
                    continue;
                }
            };
            if !adapter.enabled {
                continue;
            }
            entries.push(NetworkEntry {
                slot,
                adapter_type_raw: adapter.adapter_type,
                attachment: normalize(EnumFamily::NetworkAttachmentType, adapter.attachment_type),
                mac_address: adapter.mac_address,
                cable_connected: adapter.cable_connected,
            });
        }
        entries
    }

    async fn storage(api: &dyn VirtualBoxApi, machine: &MachineInfo) -> Vec<StorageEntry> {
        let controllers = match api.storage_controllers(&machine.id).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Storage controllers of '{}' unreadable: {}", machine.name, e);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(controllers.len());
        for ctl in controllers {
            let devices = match api.medium_attachments(&machine.id, &ctl.name).await {
                Ok(atts) => atts.into_iter().map(device_entry).collect(),
                Err(e) => {
                    debug!("Attachments on '{}' unreadable: {}", ctl.name, e);
                    Vec::new()
                }
            };
            entries.push(StorageEntry {
                bus: normalize(EnumFamily::StorageBus, ctl.bus),
                controller_type_raw: ctl.controller_type,
                controller_name: ctl.name,
                devices,
            });
        }
        entries
    }

    async fn audio(api: &dyn VirtualBoxApi, machine: &MachineInfo) -> Option<AudioSection> {
        match api.audio_adapter(&machine.id).await {
            Ok(bag) => Some(AudioSection {
                enabled: resolve_bool(&bag, AUDIO_ENABLED),
                audio_controller_raw: resolve_u64(&bag, AUDIO_CONTROLLER),
                audio_driver_raw: resolve_u64(&bag, AUDIO_DRIVER),
            }),
            Err(e) => {
                debug!("Audio adapter of '{}' unreadable: {}", machine.name, e);
                None
            }
        }
    }
}

fn device_entry(att: MediumAttachmentInfo) -> DeviceEntry {
    let medium = att
        .medium
        .map(|m| MediumEntry {
            name: Some(m.name),
            location: Some(m.location),
            logical_size: Some(m.logical_size),
            format: Some(m.format),
            state: Some(m.state),
        })
        .unwrap_or_default();
    DeviceEntry {
        port: att.port,
        device: att.device,
        device_type: normalize(EnumFamily::DeviceType, att.device_type),
        medium,
    }
}
