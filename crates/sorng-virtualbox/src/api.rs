//! Management API seam.
//!
//! The VirtualBox Main API (machine registry, sessions, consoles, media,
//! unattended installer, progress objects) is consumed exclusively through
//! these traits. A concrete binding (web service, XPCOM, COM) implements them;
//! operations receive the client as `&dyn VirtualBoxApi` so tests can
//! substitute a fake.
//!
//! Errors returned by implementations should use
//! [`VBoxErrorKind::HypervisorCallFailed`](crate::error::VBoxErrorKind) with
//! the hypervisor's message and, where available, its numeric result code;
//! this crate classifies them further where it matters (lock contention).

use crate::error::VBoxResult;
use crate::types::*;
use async_trait::async_trait;

/// Registry-level and read-only access to the hypervisor.
#[async_trait]
pub trait VirtualBoxApi: Send + Sync {
    // ── Registry ─────────────────────────────────────────────────────

    /// All registered machines.
    async fn list_machines(&self) -> VBoxResult<Vec<MachineSummary>>;

    /// Live read of one machine, looked up by name or UUID.
    async fn find_machine(&self, name_or_id: &str) -> VBoxResult<MachineInfo>;

    /// `createMachine`; the result is not registered yet.
    async fn create_machine(&self, spec: &CreateMachineSpec) -> VBoxResult<MachineInfo>;

    async fn register_machine(&self, machine_id: &str) -> VBoxResult<()>;

    /// Unregister and return the media ids handed back for deletion.
    async fn unregister_machine(
        &self,
        machine_id: &str,
        mode: CleanupMode,
    ) -> VBoxResult<Vec<String>>;

    /// Delete the settings file and the given media.
    async fn delete_config(
        &self,
        machine_id: &str,
        media: Vec<String>,
    ) -> VBoxResult<Box<dyn ProgressApi>>;

    // ── Sessions ─────────────────────────────────────────────────────

    /// `lockMachine` on a fresh session object.
    async fn lock_machine(&self, machine_id: &str, lock: LockType)
        -> VBoxResult<Box<dyn SessionApi>>;

    /// `launchVMProcess`; the returned session holds a shared lock.
    async fn launch_vm_process(
        &self,
        machine_id: &str,
        mode: LaunchMode,
    ) -> VBoxResult<(Box<dyn SessionApi>, Box<dyn ProgressApi>)>;

    // ── Media ────────────────────────────────────────────────────────

    /// `createMedium`; returns the new (not yet materialized) medium.
    async fn create_medium(
        &self,
        format: &str,
        location: &str,
        access: AccessMode,
        device_type: DeviceType,
    ) -> VBoxResult<MediumInfo>;

    /// `createBaseStorage` for a medium returned by `create_medium`.
    async fn create_base_storage(
        &self,
        medium_id: &str,
        size_bytes: u64,
        variant: MediumVariant,
    ) -> VBoxResult<Box<dyn ProgressApi>>;

    /// `openMedium` on an existing image.
    async fn open_medium(
        &self,
        location: &str,
        device_type: DeviceType,
        access: AccessMode,
        force_new_uuid: bool,
    ) -> VBoxResult<MediumInfo>;

    // ── Read-only machine details ────────────────────────────────────

    async fn storage_controllers(&self, machine_id: &str)
        -> VBoxResult<Vec<StorageControllerInfo>>;

    async fn medium_attachments(
        &self,
        machine_id: &str,
        controller: &str,
    ) -> VBoxResult<Vec<MediumAttachmentInfo>>;

    async fn network_adapter(&self, machine_id: &str, slot: u32)
        -> VBoxResult<NetworkAdapterInfo>;

    /// Graphics adapter attributes under their API names.
    async fn graphics_adapter(&self, machine_id: &str) -> VBoxResult<AttributeBag>;

    /// Audio adapter attributes under their API names.
    async fn audio_adapter(&self, machine_id: &str) -> VBoxResult<AttributeBag>;

    // ── Unattended ───────────────────────────────────────────────────

    async fn create_unattended_installer(&self) -> VBoxResult<Box<dyn UnattendedApi>>;
}

/// A locked session object.
///
/// Which view is usable depends on the lock type: write locks expose
/// [`machine`](SessionApi::machine), shared locks on a running VM expose
/// [`console`](SessionApi::console). The crate's `Session` wrapper enforces
/// the pairing at compile time.
#[async_trait]
pub trait SessionApi: Send + Sync {
    fn lock_type(&self) -> LockType;

    /// The session's mutable machine copy.
    fn machine(&self) -> &dyn MutableMachineApi;

    /// The console of the running VM, if the session has one.
    fn console(&self) -> Option<&dyn ConsoleApi>;

    async fn unlock(&self) -> VBoxResult<()>;
}

/// The editable machine obtained through a write-locked session.
#[async_trait]
pub trait MutableMachineApi: Send + Sync {
    async fn set_cpu_count(&self, count: u32) -> VBoxResult<()>;
    async fn set_memory_size(&self, mb: u64) -> VBoxResult<()>;
    async fn set_vrde_enabled(&self, enabled: bool) -> VBoxResult<()>;

    // Graphics adapter
    async fn set_vram_size(&self, mb: u32) -> VBoxResult<()>;
    async fn set_monitor_count(&self, count: u32) -> VBoxResult<()>;
    async fn set_accelerate_3d(&self, enabled: bool) -> VBoxResult<()>;
    async fn set_accelerate_2d_video(&self, enabled: bool) -> VBoxResult<()>;
    async fn set_graphics_controller(&self, kind: GraphicsControllerType) -> VBoxResult<()>;

    // Host integration
    async fn clipboard_mode(&self) -> VBoxResult<TransferMode>;
    async fn set_clipboard_mode(&self, mode: TransferMode) -> VBoxResult<()>;
    async fn dnd_mode(&self) -> VBoxResult<TransferMode>;
    async fn set_dnd_mode(&self, mode: TransferMode) -> VBoxResult<()>;
    async fn usb_controller_count(&self) -> VBoxResult<usize>;
    async fn add_usb_controller(&self, name: &str, kind: UsbControllerType) -> VBoxResult<()>;
    async fn set_pointing_hid_type(&self, kind: PointingHidType) -> VBoxResult<()>;
    async fn create_shared_folder(
        &self,
        name: &str,
        host_path: &str,
        writable: bool,
        automount: bool,
        auto_mount_point: &str,
    ) -> VBoxResult<()>;
    async fn remove_shared_folder(&self, name: &str) -> VBoxResult<()>;

    // Storage
    async fn storage_controllers(&self) -> VBoxResult<Vec<StorageControllerInfo>>;
    async fn add_storage_controller(&self, name: &str, bus: StorageBus) -> VBoxResult<()>;
    async fn set_storage_controller_type(
        &self,
        name: &str,
        kind: StorageControllerType,
    ) -> VBoxResult<()>;
    async fn set_storage_controller_port_count(&self, name: &str, ports: u32) -> VBoxResult<()>;
    async fn medium_attachments(&self, controller: &str) -> VBoxResult<Vec<MediumAttachmentInfo>>;
    async fn attach_device(
        &self,
        controller: &str,
        port: i32,
        device: i32,
        device_type: DeviceType,
        medium_id: &str,
    ) -> VBoxResult<()>;

    // Network adapters (0-based slots)
    async fn set_adapter_enabled(&self, slot: u32, enabled: bool) -> VBoxResult<()>;
    async fn set_adapter_attachment(&self, slot: u32, attachment_type: u32) -> VBoxResult<()>;
    async fn set_bridged_interface(&self, slot: u32, name: &str) -> VBoxResult<()>;
    async fn set_host_only_interface(&self, slot: u32, name: &str) -> VBoxResult<()>;
    async fn set_nat_network(&self, slot: u32, name: &str) -> VBoxResult<()>;

    /// Persist pending changes to the settings file.
    async fn save_settings(&self) -> VBoxResult<()>;
}

/// Console of a running VM, obtained through a shared-locked session.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Send the ACPI power button event.
    async fn power_button(&self) -> VBoxResult<()>;

    /// Hard power off.
    async fn power_down(&self) -> VBoxResult<Box<dyn ProgressApi>>;
}

/// Handle on an asynchronous hypervisor task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// Block until the task completes or `timeout_ms` elapses (`-1` = forever).
    async fn wait_for_completion(&self, timeout_ms: i64) -> VBoxResult<()>;

    async fn completed(&self) -> VBoxResult<bool>;

    /// Result code after completion; `None` if this API version does not
    /// expose one.
    async fn result_code(&self) -> VBoxResult<Option<i64>>;

    fn description(&self) -> String;
}

/// `IUnattended` installer handle.
#[async_trait]
pub trait UnattendedApi: Send + Sync {
    async fn set_iso_path(&self, path: &str) -> VBoxResult<()>;
    async fn set_machine(&self, machine_id: &str) -> VBoxResult<()>;
    async fn detect_iso_os(&self) -> VBoxResult<DetectedOs>;
    async fn configure(&self, settings: &UnattendedSettings) -> VBoxResult<()>;
    async fn prepare(&self) -> VBoxResult<()>;
    async fn construct_media(&self) -> VBoxResult<()>;
    async fn reconfigure_vm(&self) -> VBoxResult<()>;
}
