//! Shared types for the VirtualBox management crate.
//!
//! Covers the management API's enumerations (lock type, device type, storage
//! bus, attachment types, clipboard / DND modes, ...), the live machine views
//! returned by the API, the flat request types accepted from the command
//! shell, and the service configuration.

use serde::{Deserialize, Serialize};

// ─── Locking ─────────────────────────────────────────────────────────

/// `LockType` as understood by `IMachine::lockMachine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LockType {
    Shared = 1,
    Write = 2,
}

/// Front end used when launching a VM process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchMode {
    Headless,
    Gui,
}

impl Default for LaunchMode {
    fn default() -> Self {
        Self::Headless
    }
}

impl LaunchMode {
    pub fn from_headless(headless: bool) -> Self {
        if headless {
            Self::Headless
        } else {
            Self::Gui
        }
    }

    /// Name passed to `launchVMProcess`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headless => "headless",
            Self::Gui => "gui",
        }
    }
}

/// `CleanupMode` for `IMachine::unregister`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CleanupMode {
    /// Unregister only; attached media stay registered and on disk.
    UnregisterOnly = 1,
    /// Detach everything and return the hard disks for deletion.
    DetachAllReturnHardDisksOnly = 3,
}

// ─── Media ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    Floppy = 1,
    Dvd = 2,
    HardDisk = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessMode {
    ReadOnly = 1,
    ReadWrite = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediumVariant {
    Standard = 0,
    Fixed = 0x10000,
}

impl MediumVariant {
    /// `"fixed"` (any case) selects a preallocated image, anything else is dynamic.
    pub fn from_input(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("fixed") {
            Self::Fixed
        } else {
            Self::Standard
        }
    }
}

// ─── Storage controllers ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageBus {
    Ide = 1,
    Sata = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageControllerType {
    IntelAhci = 3,
    Piix4 = 5,
}

/// Controller layout used when a controller has to be created on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerLayout {
    pub bus: StorageBus,
    pub controller_type: StorageControllerType,
    pub port_count: Option<u32>,
}

impl ControllerLayout {
    /// Resolve a requested controller name to a creatable layout.
    ///
    /// Only `SATA` (AHCI) and `IDE` (PIIX4) are supported.
    pub fn for_name(name: &str, sata_ports: u32) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SATA" => Some(Self {
                bus: StorageBus::Sata,
                controller_type: StorageControllerType::IntelAhci,
                port_count: Some(sata_ports),
            }),
            "IDE" => Some(Self {
                bus: StorageBus::Ide,
                controller_type: StorageControllerType::Piix4,
                port_count: None,
            }),
            _ => None,
        }
    }
}

// ─── Networking ──────────────────────────────────────────────────────

/// Network attachment selectable through `set_network_adapter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkMode {
    Nat,
    Bridged,
    HostOnly,
    NatNetwork,
}

impl NetworkMode {
    pub fn from_input(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nat" => Some(Self::Nat),
            "bridged" => Some(Self::Bridged),
            "hostonly" => Some(Self::HostOnly),
            "natnetwork" => Some(Self::NatNetwork),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nat => "nat",
            Self::Bridged => "bridged",
            Self::HostOnly => "hostonly",
            Self::NatNetwork => "natnetwork",
        }
    }

    /// `NetworkAttachmentType` code for this mode.
    pub fn attachment_code(&self) -> u32 {
        match self {
            Self::Nat => 1,
            Self::Bridged => 2,
            Self::HostOnly => 4,
            Self::NatNetwork => 6,
        }
    }
}

// ─── Display / integration ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GraphicsControllerType {
    None = 0,
    VBoxVga = 1,
    VmSvga = 2,
    VBoxSvga = 3,
}

impl GraphicsControllerType {
    pub fn from_input(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "vboxvga" => Some(Self::VBoxVga),
            "vmsvga" => Some(Self::VmSvga),
            "vboxsvga" => Some(Self::VBoxSvga),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VBoxVga => "vboxvga",
            Self::VmSvga => "vmsvga",
            Self::VBoxSvga => "vboxsvga",
        }
    }
}

/// Direction mode shared by `ClipboardMode` and `DnDMode`; the API uses the
/// same numeric values for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferMode {
    Disabled = 0,
    HostToGuest = 1,
    GuestToHost = 2,
    Bidirectional = 3,
}

impl TransferMode {
    pub fn from_input(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Some(Self::Disabled),
            "hosttoguest" => Some(Self::HostToGuest),
            "guesttohost" => Some(Self::GuestToHost),
            "bidirectional" => Some(Self::Bidirectional),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::HostToGuest => "hosttoguest",
            Self::GuestToHost => "guesttohost",
            Self::Bidirectional => "bidirectional",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointingHidType {
    Ps2Mouse = 2,
    UsbTablet = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsbControllerType {
    Ohci = 1,
    Ehci = 2,
    Xhci = 3,
}

// ─── Live machine views ──────────────────────────────────────────────

/// Registry entry as returned by machine enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSummary {
    pub id: String,
    pub name: String,
}

/// Live read of a managed machine. Re-read for every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineInfo {
    pub id: String,
    pub name: String,
    pub os_type_id: String,
    #[serde(default)]
    pub description: String,
    /// Full path of the `.vbox` settings file.
    pub settings_file_path: String,
    /// Raw `MachineState` code.
    pub state: u32,
    /// Raw `SessionState` code.
    pub session_state: u32,
    /// Milliseconds since the Unix epoch.
    pub last_state_change_ms: i64,
    pub accessible: bool,
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub memory_balloon_mb: u64,
    pub cpu_execution_cap: u32,
    pub page_fusion_enabled: bool,
    pub snapshot_count: u32,
    #[serde(default)]
    pub current_snapshot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageControllerInfo {
    pub name: String,
    /// Raw `StorageBus` code.
    pub bus: u32,
    /// Raw `StorageControllerType` code.
    pub controller_type: u32,
    pub port_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediumInfo {
    pub id: String,
    pub name: String,
    pub location: String,
    pub logical_size: i64,
    pub format: String,
    /// Raw `MediumState` code.
    pub state: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediumAttachmentInfo {
    pub controller: String,
    pub port: i32,
    pub device: i32,
    /// Raw `DeviceType` code.
    pub device_type: u32,
    /// `None` for an empty drive.
    #[serde(default)]
    pub medium: Option<MediumInfo>,
}

impl MediumAttachmentInfo {
    /// Whether a medium is actually mounted in this slot.
    pub fn is_occupied(&self) -> bool {
        self.medium.is_some()
    }

    /// Coarse medium kind reported when a slot is occupied.
    pub fn medium_kind(&self) -> &'static str {
        if self.device_type == DeviceType::HardDisk as u32 {
            "disk"
        } else {
            "dvd"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAdapterInfo {
    pub slot: u32,
    pub enabled: bool,
    /// Raw `NetworkAdapterType` code.
    pub adapter_type: u32,
    /// Raw `NetworkAttachmentType` code.
    pub attachment_type: u32,
    pub mac_address: String,
    pub cable_connected: bool,
}

/// Loosely-typed attribute bag for sub-objects whose attribute names drift
/// across API versions (graphics adapter, audio adapter).
pub type AttributeBag = serde_json::Map<String, serde_json::Value>;

/// Platform architecture passed to `createMachine` (required since 7.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlatformArchitecture {
    X86,
}

impl PlatformArchitecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
        }
    }
}

/// Arguments for `IVirtualBox::createMachine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMachineSpec {
    /// Empty lets the hypervisor pick its default machine folder.
    pub settings_file: String,
    pub name: String,
    pub platform: PlatformArchitecture,
    pub groups: Vec<String>,
    pub os_type_id: String,
}

/// Result of `IUnattended::detectIsoOS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedOs {
    #[serde(default)]
    pub os_type_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Fields applied to an unattended installer before `prepare()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnattendedSettings {
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub full_user_name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    pub locale: String,
    pub time_zone: String,
    pub install_guest_additions: bool,
}

/// Guest OS family of an unattended install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
        }
    }
}

// ─── Requests ────────────────────────────────────────────────────────
//
// Flat, primitive-only request shapes as received from the command shell.
// Empty strings mean "not provided"; managers fall back to `VBoxConfig`.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListVmsRequest {
    pub filter_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateVmRequest {
    pub vm_name: String,
    pub ostype: String,
    pub base_folder: String,
    pub iso_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartVmRequest {
    pub vm_name: String,
    pub headless: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopVmRequest {
    pub vm_name: String,
    pub force: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteVmRequest {
    pub vm_name: String,
    pub delete_disks: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifyVmRequest {
    pub vm_name: String,
    pub cpus: String,
    pub memory_mb: String,
    pub vrde: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateDiskRequest {
    pub vm_name: String,
    pub disk_size_gb: String,
    pub disk_format: String,
    pub disk_variant: String,
    pub storage_controller: String,
    pub port: String,
    pub device: String,
    pub disk_dir: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachIsoRequest {
    pub vm_name: String,
    pub iso_path: String,
    pub storage_controller: String,
    pub port: String,
    pub device: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkAdapterRequest {
    pub vm_name: String,
    /// 1-based adapter number.
    pub adapter: String,
    pub mode: String,
    pub network_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedFolderRequest {
    pub vm_name: String,
    pub share_name: String,
    pub host_path: String,
    pub readonly: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModifyDisplayRequest {
    pub vm_name: String,
    pub vram_mb: String,
    pub monitor_count: String,
    pub scale_factor: String,
    pub acceleration_3d: String,
    pub acceleration_2d: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnattendedInstallRequest {
    pub vm_name: String,
    pub iso_path: String,
    pub user: String,
    pub password: String,
    pub full_name: String,
    pub hostname: String,
    pub locale: String,
    pub timezone: String,
    pub install_additions: String,
    pub headless: String,
}

// ─── Configuration ───────────────────────────────────────────────────

/// Network adapter slots per machine.
pub const NETWORK_ADAPTER_SLOTS: u32 = 8;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VBoxConfig {
    /// Progress wait bound in milliseconds; `None` waits indefinitely.
    #[serde(default)]
    pub progress_timeout_ms: Option<u64>,
    /// Launch headless unless the caller asks for a GUI.
    #[serde(default = "default_true")]
    pub default_headless: bool,
    #[serde(default = "default_disk_format")]
    pub default_disk_format: String,
    #[serde(default = "default_disk_size_gb")]
    pub default_disk_size_gb: u64,
    #[serde(default = "default_controller")]
    pub default_storage_controller: String,
    #[serde(default = "default_sata_ports")]
    pub sata_port_count: u32,
    /// Port used for ISO attachment when none is given.
    #[serde(default = "default_iso_port")]
    pub default_iso_port: i32,
    #[serde(default = "default_hostname_suffix")]
    pub hostname_suffix: String,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

fn default_true() -> bool {
    true
}
fn default_disk_format() -> String {
    "VDI".to_string()
}
fn default_disk_size_gb() -> u64 {
    50
}
fn default_controller() -> String {
    "SATA".to_string()
}
fn default_sata_ports() -> u32 {
    4
}
fn default_iso_port() -> i32 {
    1
}
fn default_hostname_suffix() -> String {
    ".local".to_string()
}
fn default_locale() -> String {
    "en_US".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for VBoxConfig {
    fn default() -> Self {
        Self {
            progress_timeout_ms: None,
            default_headless: true,
            default_disk_format: default_disk_format(),
            default_disk_size_gb: default_disk_size_gb(),
            default_storage_controller: default_controller(),
            sata_port_count: default_sata_ports(),
            default_iso_port: default_iso_port(),
            hostname_suffix: default_hostname_suffix(),
            default_locale: default_locale(),
            default_timezone: default_timezone(),
        }
    }
}
