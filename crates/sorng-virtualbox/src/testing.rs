//! In-memory hypervisor used by the unit tests.
//!
//! Models just enough of the management API to exercise the lock protocol,
//! progress handling and storage topology: a registry of machines, per-machine
//! exclusive locks, media, and a call log tests can assert on. Any method can
//! be made to fail with [`FakeVBox::fail`].

use crate::api::*;
use crate::error::{
    VBoxError, VBoxErrorKind, VBoxResult, VBOX_E_INVALID_OBJECT_STATE, VBOX_E_OBJECT_NOT_FOUND,
};
use crate::types::*;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) struct FakeMachine {
    pub info: MachineInfo,
    pub registered: bool,
    pub vrde: bool,
    pub controllers: Vec<StorageControllerInfo>,
    pub attachments: Vec<MediumAttachmentInfo>,
    pub adapters: Vec<NetworkAdapterInfo>,
    pub adapter_targets: HashMap<u32, String>,
    pub graphics: AttributeBag,
    pub audio: AttributeBag,
    pub clipboard: TransferMode,
    pub dnd: TransferMode,
    pub usb_controllers: Vec<(String, UsbControllerType)>,
    pub pointing: PointingHidType,
    pub shared_folders: Vec<(String, String, bool)>,
    pub saves: usize,
}

impl FakeMachine {
    fn new(id: String, name: &str, os_type_id: &str, settings_file: String, state: u32) -> Self {
        let adapters = (0..8)
            .map(|slot| NetworkAdapterInfo {
                slot,
                enabled: slot == 0,
                adapter_type: 6,
                attachment_type: if slot == 0 { 1 } else { 0 },
                mac_address: format!("0800270000{:02X}", slot + 1),
                cable_connected: slot == 0,
            })
            .collect();
        let graphics = json!({
            "graphicsControllerType": 2,
            "VRAMSize": 16,
            "monitorCount": 1,
            "accelerate3DEnabled": false,
            "accelerate2DVideoEnabled": false,
        });
        let audio = json!({ "enabled": true, "audioController": 0, "audioDriver": 1 });
        Self {
            info: MachineInfo {
                id,
                name: name.to_string(),
                os_type_id: os_type_id.to_string(),
                description: String::new(),
                settings_file_path: settings_file,
                state,
                session_state: 1,
                last_state_change_ms: 1_700_000_000_000,
                accessible: true,
                cpu_count: 1,
                memory_mb: 1024,
                memory_balloon_mb: 0,
                cpu_execution_cap: 100,
                page_fusion_enabled: false,
                snapshot_count: 0,
                current_snapshot_id: None,
            },
            registered: true,
            vrde: false,
            controllers: Vec::new(),
            attachments: Vec::new(),
            adapters,
            adapter_targets: HashMap::new(),
            graphics: graphics.as_object().cloned().unwrap_or_default(),
            audio: audio.as_object().cloned().unwrap_or_default(),
            clipboard: TransferMode::Disabled,
            dnd: TransferMode::Disabled,
            usb_controllers: Vec::new(),
            pointing: PointingHidType::Ps2Mouse,
            shared_folders: Vec::new(),
            saves: 0,
        }
    }

    fn adapter_mut(&mut self, slot: u32) -> VBoxResult<&mut NetworkAdapterInfo> {
        self.adapters
            .get_mut(slot as usize)
            .ok_or_else(|| VBoxError::call_failed(format!("Invalid adapter slot {}", slot)))
    }

    fn controller_mut(&mut self, name: &str) -> VBoxResult<&mut StorageControllerInfo> {
        self.controllers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                VBoxError::call_failed(format!("Could not find a storage controller named '{}'", name))
            })
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    machines: Vec<FakeMachine>,
    locks: HashMap<String, LockType>,
    lock_calls: usize,
    calls: Vec<String>,
    failures: HashMap<&'static str, VBoxError>,
    media: Vec<MediumInfo>,
    deleted: Vec<(String, Vec<String>)>,
    launch_code: Option<i64>,
    detect_fails: bool,
    hang_progress: bool,
    unattended: Option<UnattendedSettings>,
    next_id: usize,
}

impl FakeState {
    fn check(&mut self, method: &'static str) -> VBoxResult<()> {
        self.calls.push(method.to_string());
        match self.failures.get(method) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-0000-0000-{:012}", self.next_id)
    }

    fn index_of(&self, name_or_id: &str) -> Option<usize> {
        self.machines
            .iter()
            .position(|m| m.info.name == name_or_id || m.info.id == name_or_id)
    }

    fn machine(&self, name_or_id: &str) -> VBoxResult<&FakeMachine> {
        self.index_of(name_or_id)
            .map(|i| &self.machines[i])
            .ok_or_else(|| not_found(name_or_id))
    }

    fn machine_mut(&mut self, name_or_id: &str) -> VBoxResult<&mut FakeMachine> {
        match self.index_of(name_or_id) {
            Some(i) => Ok(&mut self.machines[i]),
            None => Err(not_found(name_or_id)),
        }
    }

    fn take_lock(&mut self, machine_id: &str, lock: LockType) -> VBoxResult<()> {
        self.lock_calls += 1;
        if self.locks.contains_key(machine_id) {
            return Err(VBoxError::with_code(
                VBoxErrorKind::HypervisorCallFailed,
                "The machine is already locked for a session (or being unlocked)",
                VBOX_E_INVALID_OBJECT_STATE,
            ));
        }
        self.locks.insert(machine_id.to_string(), lock);
        self.machine_mut(machine_id)?.info.session_state = 2;
        Ok(())
    }
}

fn not_found(name_or_id: &str) -> VBoxError {
    VBoxError::with_code(
        VBoxErrorKind::HypervisorCallFailed,
        format!("Could not find a registered machine named '{}'", name_or_id),
        VBOX_E_OBJECT_NOT_FOUND,
    )
}

/// Fake management API client.
#[derive(Clone, Default)]
pub(crate) struct FakeVBox {
    state: Arc<Mutex<FakeState>>,
}

impl FakeVBox {
    pub fn new() -> Self {
        Self::default()
    }

    fn st(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    // ── Setup ────────────────────────────────────────────────────────

    /// Register a machine with default hardware. Returns its id.
    pub fn add_machine(&self, name: &str, state: u32) -> String {
        let mut st = self.st();
        let id = st.next_id();
        let settings = format!("/vms/{0}/{0}.vbox", name);
        st.machines
            .push(FakeMachine::new(id.clone(), name, "Ubuntu_64", settings, state));
        id
    }

    pub fn edit_machine(&self, name: &str, f: impl FnOnce(&mut FakeMachine)) {
        let mut st = self.st();
        f(st.machine_mut(name).unwrap());
    }

    pub fn add_controller(&self, vm: &str, name: &str, bus: StorageBus) {
        self.edit_machine(vm, |m| {
            m.controllers.push(StorageControllerInfo {
                name: name.to_string(),
                bus: bus as u32,
                controller_type: 0,
                port_count: 1,
            })
        });
    }

    /// Mount an existing medium at a slot.
    pub fn attach(
        &self,
        vm: &str,
        controller: &str,
        port: i32,
        device: i32,
        device_type: DeviceType,
        location: &str,
    ) {
        let mut st = self.st();
        let id = st.next_id();
        let medium = MediumInfo {
            id,
            name: location.rsplit('/').next().unwrap_or(location).to_string(),
            location: location.to_string(),
            logical_size: 20 * 1024 * 1024 * 1024,
            format: "VDI".to_string(),
            state: 1,
        };
        st.media.push(medium.clone());
        st.machine_mut(vm).unwrap().attachments.push(MediumAttachmentInfo {
            controller: controller.to_string(),
            port,
            device,
            device_type: device_type as u32,
            medium: Some(medium),
        });
    }

    /// Make `method` fail with `err` from now on.
    pub fn fail(&self, method: &'static str, err: VBoxError) {
        self.st().failures.insert(method, err);
    }

    pub fn set_launch_code(&self, code: i64) {
        self.st().launch_code = Some(code);
    }

    /// Launch and power-down progress handles never complete.
    pub fn set_progress_hangs(&self, hangs: bool) {
        self.st().hang_progress = hangs;
    }

    pub fn set_detect_fails(&self, fails: bool) {
        self.st().detect_fails = fails;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn machine(&self, name: &str) -> FakeMachine {
        self.st().machine(name).unwrap().clone()
    }

    pub fn has_machine(&self, name: &str) -> bool {
        self.st().index_of(name).is_some()
    }

    pub fn lock_calls(&self) -> usize {
        self.st().lock_calls
    }

    pub fn is_locked(&self, name: &str) -> bool {
        let st = self.st();
        match st.index_of(name) {
            Some(i) => st.locks.contains_key(&st.machines[i].info.id),
            None => false,
        }
    }

    pub fn save_calls(&self, name: &str) -> usize {
        self.st().machine(name).map(|m| m.saves).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<String> {
        self.st().calls.clone()
    }

    pub fn called(&self, method: &str) -> bool {
        self.st().calls.iter().any(|c| c == method)
    }

    pub fn media(&self) -> Vec<MediumInfo> {
        self.st().media.clone()
    }

    pub fn deleted(&self) -> Vec<(String, Vec<String>)> {
        self.st().deleted.clone()
    }

    pub fn unattended_settings(&self) -> Option<UnattendedSettings> {
        self.st().unattended.clone()
    }
}

#[async_trait]
impl VirtualBoxApi for FakeVBox {
    async fn list_machines(&self) -> VBoxResult<Vec<MachineSummary>> {
        let mut st = self.st();
        st.check("list_machines")?;
        Ok(st
            .machines
            .iter()
            .filter(|m| m.registered)
            .map(|m| MachineSummary {
                id: m.info.id.clone(),
                name: m.info.name.clone(),
            })
            .collect())
    }

    async fn find_machine(&self, name_or_id: &str) -> VBoxResult<MachineInfo> {
        let mut st = self.st();
        st.check("find_machine")?;
        let m = st.machine(name_or_id)?;
        if !m.registered {
            return Err(not_found(name_or_id));
        }
        Ok(m.info.clone())
    }

    async fn create_machine(&self, spec: &CreateMachineSpec) -> VBoxResult<MachineInfo> {
        let mut st = self.st();
        st.check("create_machine")?;
        if st.index_of(&spec.name).is_some() {
            return Err(VBoxError::call_failed(format!(
                "Machine settings file for '{}' already exists",
                spec.name
            )));
        }
        let id = st.next_id();
        let settings = if spec.settings_file.is_empty() {
            format!("/vms/{0}/{0}.vbox", spec.name)
        } else {
            spec.settings_file.clone()
        };
        let mut m = FakeMachine::new(id, &spec.name, &spec.os_type_id, settings, 1);
        m.registered = false;
        let info = m.info.clone();
        st.machines.push(m);
        Ok(info)
    }

    async fn register_machine(&self, machine_id: &str) -> VBoxResult<()> {
        let mut st = self.st();
        st.check("register_machine")?;
        st.machine_mut(machine_id)?.registered = true;
        Ok(())
    }

    async fn unregister_machine(
        &self,
        machine_id: &str,
        mode: CleanupMode,
    ) -> VBoxResult<Vec<String>> {
        let mut st = self.st();
        st.check("unregister_machine")?;
        let m = st.machine_mut(machine_id)?;
        m.registered = false;
        if mode == CleanupMode::UnregisterOnly {
            return Ok(Vec::new());
        }
        let disks = m
            .attachments
            .iter()
            .filter(|a| a.device_type == DeviceType::HardDisk as u32)
            .filter_map(|a| a.medium.as_ref().map(|med| med.id.clone()))
            .collect();
        m.attachments.clear();
        Ok(disks)
    }

    async fn delete_config(
        &self,
        machine_id: &str,
        media: Vec<String>,
    ) -> VBoxResult<Box<dyn ProgressApi>> {
        let mut st = self.st();
        st.check("delete_config")?;
        let i = st.index_of(machine_id).ok_or_else(|| not_found(machine_id))?;
        let m = st.machines.remove(i);
        st.media.retain(|med| !media.contains(&med.id));
        st.deleted.push((m.info.name, media));
        Ok(Box::new(FakeProgress::ok()))
    }

    async fn lock_machine(
        &self,
        machine_id: &str,
        lock: LockType,
    ) -> VBoxResult<Box<dyn SessionApi>> {
        let running = {
            let mut st = self.st();
            st.check("lock_machine")?;
            st.take_lock(machine_id, lock)?;
            crate::enums::has_console(st.machine(machine_id)?.info.state)
        };
        Ok(Box::new(FakeSession::new(
            self.state.clone(),
            machine_id,
            lock,
            lock == LockType::Shared && running,
        )))
    }

    async fn launch_vm_process(
        &self,
        machine_id: &str,
        mode: LaunchMode,
    ) -> VBoxResult<(Box<dyn SessionApi>, Box<dyn ProgressApi>)> {
        let (code, hang) = {
            let mut st = self.st();
            st.check("launch_vm_process")?;
            st.calls.push(format!("launch:{}", mode.as_str()));
            st.take_lock(machine_id, LockType::Shared)?;
            let code = st.launch_code.unwrap_or(0);
            if code == 0 {
                st.machine_mut(machine_id)?.info.state = crate::enums::MACHINE_STATE_RUNNING;
            }
            (code, st.hang_progress)
        };
        let session = FakeSession::new(self.state.clone(), machine_id, LockType::Shared, true);
        let progress = if hang {
            FakeProgress::hanging()
        } else {
            FakeProgress::failed(code)
        };
        Ok((Box::new(session), Box::new(progress)))
    }

    async fn create_medium(
        &self,
        format: &str,
        location: &str,
        _access: AccessMode,
        _device_type: DeviceType,
    ) -> VBoxResult<MediumInfo> {
        let mut st = self.st();
        st.check("create_medium")?;
        let id = st.next_id();
        let medium = MediumInfo {
            id,
            name: location.rsplit('/').next().unwrap_or(location).to_string(),
            location: location.to_string(),
            logical_size: 0,
            format: format.to_string(),
            state: 0,
        };
        st.media.push(medium.clone());
        Ok(medium)
    }

    async fn create_base_storage(
        &self,
        medium_id: &str,
        size_bytes: u64,
        variant: MediumVariant,
    ) -> VBoxResult<Box<dyn ProgressApi>> {
        let mut st = self.st();
        st.check("create_base_storage")?;
        st.calls.push(format!("base_storage:{}:{:?}", size_bytes, variant));
        let medium = st
            .media
            .iter_mut()
            .find(|m| m.id == medium_id)
            .ok_or_else(|| VBoxError::call_failed("medium not found"))?;
        medium.logical_size = size_bytes as i64;
        medium.state = 1;
        Ok(Box::new(FakeProgress::ok()))
    }

    async fn open_medium(
        &self,
        location: &str,
        device_type: DeviceType,
        _access: AccessMode,
        _force_new_uuid: bool,
    ) -> VBoxResult<MediumInfo> {
        let mut st = self.st();
        st.check("open_medium")?;
        if let Some(m) = st.media.iter().find(|m| m.location == location) {
            return Ok(m.clone());
        }
        let id = st.next_id();
        let medium = MediumInfo {
            id,
            name: location.rsplit('/').next().unwrap_or(location).to_string(),
            location: location.to_string(),
            logical_size: 0,
            format: if device_type == DeviceType::Dvd { "RAW" } else { "VDI" }.to_string(),
            state: 1,
        };
        st.media.push(medium.clone());
        Ok(medium)
    }

    async fn storage_controllers(
        &self,
        machine_id: &str,
    ) -> VBoxResult<Vec<StorageControllerInfo>> {
        let mut st = self.st();
        st.check("storage_controllers")?;
        Ok(st.machine(machine_id)?.controllers.clone())
    }

    async fn medium_attachments(
        &self,
        machine_id: &str,
        controller: &str,
    ) -> VBoxResult<Vec<MediumAttachmentInfo>> {
        let mut st = self.st();
        st.check("medium_attachments")?;
        Ok(st
            .machine(machine_id)?
            .attachments
            .iter()
            .filter(|a| a.controller == controller)
            .cloned()
            .collect())
    }

    async fn network_adapter(
        &self,
        machine_id: &str,
        slot: u32,
    ) -> VBoxResult<NetworkAdapterInfo> {
        let mut st = self.st();
        st.check("network_adapter")?;
        st.machine(machine_id)?
            .adapters
            .get(slot as usize)
            .cloned()
            .ok_or_else(|| VBoxError::call_failed(format!("Invalid adapter slot {}", slot)))
    }

    async fn graphics_adapter(&self, machine_id: &str) -> VBoxResult<AttributeBag> {
        let mut st = self.st();
        st.check("graphics_adapter")?;
        Ok(st.machine(machine_id)?.graphics.clone())
    }

    async fn audio_adapter(&self, machine_id: &str) -> VBoxResult<AttributeBag> {
        let mut st = self.st();
        st.check("audio_adapter")?;
        Ok(st.machine(machine_id)?.audio.clone())
    }

    async fn create_unattended_installer(&self) -> VBoxResult<Box<dyn UnattendedApi>> {
        self.st().check("create_unattended_installer")?;
        Ok(Box::new(FakeUnattended {
            state: self.state.clone(),
            iso: Mutex::new(None),
            machine: Mutex::new(None),
        }))
    }
}

// ── Sessions ─────────────────────────────────────────────────────────

pub(crate) struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    machine_id: String,
    lock: LockType,
    console: Option<FakeConsole>,
}

impl FakeSession {
    fn new(state: Arc<Mutex<FakeState>>, machine_id: &str, lock: LockType, console: bool) -> Self {
        let console = if console {
            Some(FakeConsole {
                state: state.clone(),
                machine_id: machine_id.to_string(),
            })
        } else {
            None
        };
        Self {
            state,
            machine_id: machine_id.to_string(),
            lock,
            console,
        }
    }

    fn edit<R>(
        &self,
        method: &'static str,
        f: impl FnOnce(&mut FakeMachine) -> VBoxResult<R>,
    ) -> VBoxResult<R> {
        let mut st = self.state.lock().unwrap();
        st.check(method)?;
        f(st.machine_mut(&self.machine_id)?)
    }
}

#[async_trait]
impl SessionApi for FakeSession {
    fn lock_type(&self) -> LockType {
        self.lock
    }

    fn machine(&self) -> &dyn MutableMachineApi {
        self
    }

    fn console(&self) -> Option<&dyn ConsoleApi> {
        self.console.as_ref().map(|c| c as &dyn ConsoleApi)
    }

    async fn unlock(&self) -> VBoxResult<()> {
        let mut st = self.state.lock().unwrap();
        st.check("unlock")?;
        st.locks.remove(&self.machine_id);
        if let Ok(m) = st.machine_mut(&self.machine_id) {
            m.info.session_state = 1;
        }
        Ok(())
    }
}

#[async_trait]
impl MutableMachineApi for FakeSession {
    async fn set_cpu_count(&self, count: u32) -> VBoxResult<()> {
        self.edit("set_cpu_count", |m| {
            m.info.cpu_count = count;
            Ok(())
        })
    }

    async fn set_memory_size(&self, mb: u64) -> VBoxResult<()> {
        self.edit("set_memory_size", |m| {
            m.info.memory_mb = mb;
            Ok(())
        })
    }

    async fn set_vrde_enabled(&self, enabled: bool) -> VBoxResult<()> {
        self.edit("set_vrde_enabled", |m| {
            m.vrde = enabled;
            Ok(())
        })
    }

    async fn set_vram_size(&self, mb: u32) -> VBoxResult<()> {
        self.edit("set_vram_size", |m| {
            m.graphics.insert("VRAMSize".into(), json!(mb));
            Ok(())
        })
    }

    async fn set_monitor_count(&self, count: u32) -> VBoxResult<()> {
        self.edit("set_monitor_count", |m| {
            m.graphics.insert("monitorCount".into(), json!(count));
            Ok(())
        })
    }

    async fn set_accelerate_3d(&self, enabled: bool) -> VBoxResult<()> {
        self.edit("set_accelerate_3d", |m| {
            m.graphics.insert("accelerate3DEnabled".into(), json!(enabled));
            Ok(())
        })
    }

    async fn set_accelerate_2d_video(&self, enabled: bool) -> VBoxResult<()> {
        self.edit("set_accelerate_2d_video", |m| {
            m.graphics.insert("accelerate2DVideoEnabled".into(), json!(enabled));
            Ok(())
        })
    }

    async fn set_graphics_controller(&self, kind: GraphicsControllerType) -> VBoxResult<()> {
        self.edit("set_graphics_controller", |m| {
            m.graphics
                .insert("graphicsControllerType".into(), json!(kind as u32));
            Ok(())
        })
    }

    async fn clipboard_mode(&self) -> VBoxResult<TransferMode> {
        self.edit("clipboard_mode", |m| Ok(m.clipboard))
    }

    async fn set_clipboard_mode(&self, mode: TransferMode) -> VBoxResult<()> {
        self.edit("set_clipboard_mode", |m| {
            m.clipboard = mode;
            Ok(())
        })
    }

    async fn dnd_mode(&self) -> VBoxResult<TransferMode> {
        self.edit("dnd_mode", |m| Ok(m.dnd))
    }

    async fn set_dnd_mode(&self, mode: TransferMode) -> VBoxResult<()> {
        self.edit("set_dnd_mode", |m| {
            m.dnd = mode;
            Ok(())
        })
    }

    async fn usb_controller_count(&self) -> VBoxResult<usize> {
        self.edit("usb_controller_count", |m| Ok(m.usb_controllers.len()))
    }

    async fn add_usb_controller(&self, name: &str, kind: UsbControllerType) -> VBoxResult<()> {
        self.edit("add_usb_controller", |m| {
            m.usb_controllers.push((name.to_string(), kind));
            Ok(())
        })
    }

    async fn set_pointing_hid_type(&self, kind: PointingHidType) -> VBoxResult<()> {
        self.edit("set_pointing_hid_type", |m| {
            m.pointing = kind;
            Ok(())
        })
    }

    async fn create_shared_folder(
        &self,
        name: &str,
        host_path: &str,
        writable: bool,
        _automount: bool,
        _auto_mount_point: &str,
    ) -> VBoxResult<()> {
        self.edit("create_shared_folder", |m| {
            if m.shared_folders.iter().any(|(n, _, _)| n == name) {
                return Err(VBoxError::call_failed(format!(
                    "Shared folder named '{}' already exists",
                    name
                )));
            }
            m.shared_folders
                .push((name.to_string(), host_path.to_string(), writable));
            Ok(())
        })
    }

    async fn remove_shared_folder(&self, name: &str) -> VBoxResult<()> {
        self.edit("remove_shared_folder", |m| {
            let before = m.shared_folders.len();
            m.shared_folders.retain(|(n, _, _)| n != name);
            if m.shared_folders.len() == before {
                return Err(VBoxError::call_failed(format!(
                    "Could not find a shared folder named '{}'",
                    name
                )));
            }
            Ok(())
        })
    }

    async fn storage_controllers(&self) -> VBoxResult<Vec<StorageControllerInfo>> {
        self.edit("session_storage_controllers", |m| Ok(m.controllers.clone()))
    }

    async fn add_storage_controller(&self, name: &str, bus: StorageBus) -> VBoxResult<()> {
        self.edit("add_storage_controller", |m| {
            m.controllers.push(StorageControllerInfo {
                name: name.to_string(),
                bus: bus as u32,
                controller_type: 0,
                port_count: 1,
            });
            Ok(())
        })
    }

    async fn set_storage_controller_type(
        &self,
        name: &str,
        kind: StorageControllerType,
    ) -> VBoxResult<()> {
        self.edit("set_storage_controller_type", |m| {
            m.controller_mut(name)?.controller_type = kind as u32;
            Ok(())
        })
    }

    async fn set_storage_controller_port_count(&self, name: &str, ports: u32) -> VBoxResult<()> {
        self.edit("set_storage_controller_port_count", |m| {
            m.controller_mut(name)?.port_count = ports;
            Ok(())
        })
    }

    async fn medium_attachments(&self, controller: &str) -> VBoxResult<Vec<MediumAttachmentInfo>> {
        self.edit("session_medium_attachments", |m| {
            Ok(m
                .attachments
                .iter()
                .filter(|a| a.controller == controller)
                .cloned()
                .collect())
        })
    }

    async fn attach_device(
        &self,
        controller: &str,
        port: i32,
        device: i32,
        device_type: DeviceType,
        medium_id: &str,
    ) -> VBoxResult<()> {
        let mut st = self.state.lock().unwrap();
        st.check("attach_device")?;
        let medium = st
            .media
            .iter()
            .find(|m| m.id == medium_id)
            .cloned()
            .ok_or_else(|| VBoxError::call_failed("medium not found"))?;
        let m = st.machine_mut(&self.machine_id)?;
        m.controller_mut(controller)?;
        if m.attachments.iter().any(|a| {
            a.controller == controller && a.port == port && a.device == device && a.is_occupied()
        }) {
            return Err(VBoxError::call_failed("Medium is already attached to this slot"));
        }
        m.attachments.retain(|a| {
            !(a.controller == controller && a.port == port && a.device == device)
        });
        m.attachments.push(MediumAttachmentInfo {
            controller: controller.to_string(),
            port,
            device,
            device_type: device_type as u32,
            medium: Some(medium),
        });
        Ok(())
    }

    async fn set_adapter_enabled(&self, slot: u32, enabled: bool) -> VBoxResult<()> {
        self.edit("set_adapter_enabled", |m| {
            m.adapter_mut(slot)?.enabled = enabled;
            Ok(())
        })
    }

    async fn set_adapter_attachment(&self, slot: u32, attachment_type: u32) -> VBoxResult<()> {
        self.edit("set_adapter_attachment", |m| {
            m.adapter_mut(slot)?.attachment_type = attachment_type;
            Ok(())
        })
    }

    async fn set_bridged_interface(&self, slot: u32, name: &str) -> VBoxResult<()> {
        self.edit("set_bridged_interface", |m| {
            m.adapter_targets.insert(slot, name.to_string());
            Ok(())
        })
    }

    async fn set_host_only_interface(&self, slot: u32, name: &str) -> VBoxResult<()> {
        self.edit("set_host_only_interface", |m| {
            m.adapter_targets.insert(slot, name.to_string());
            Ok(())
        })
    }

    async fn set_nat_network(&self, slot: u32, name: &str) -> VBoxResult<()> {
        self.edit("set_nat_network", |m| {
            m.adapter_targets.insert(slot, name.to_string());
            Ok(())
        })
    }

    async fn save_settings(&self) -> VBoxResult<()> {
        self.edit("save_settings", |m| {
            m.saves += 1;
            Ok(())
        })
    }
}

pub(crate) struct FakeConsole {
    state: Arc<Mutex<FakeState>>,
    machine_id: String,
}

#[async_trait]
impl ConsoleApi for FakeConsole {
    async fn power_button(&self) -> VBoxResult<()> {
        self.state.lock().unwrap().check("power_button")
    }

    async fn power_down(&self) -> VBoxResult<Box<dyn ProgressApi>> {
        let mut st = self.state.lock().unwrap();
        st.check("power_down")?;
        if st.hang_progress {
            return Ok(Box::new(FakeProgress::hanging()));
        }
        st.machine_mut(&self.machine_id)?.info.state = crate::enums::MACHINE_STATE_POWERED_OFF;
        Ok(Box::new(FakeProgress::ok()))
    }
}

// ── Progress ─────────────────────────────────────────────────────────

pub(crate) struct FakeProgress {
    completed: bool,
    code: Option<i64>,
    hang: bool,
}

impl FakeProgress {
    pub fn ok() -> Self {
        Self::failed(0)
    }

    pub fn failed(code: i64) -> Self {
        Self {
            completed: true,
            code: Some(code),
            hang: false,
        }
    }

    /// Never completes.
    pub fn hanging() -> Self {
        Self {
            completed: false,
            code: None,
            hang: true,
        }
    }
}

#[async_trait]
impl ProgressApi for FakeProgress {
    async fn wait_for_completion(&self, _timeout_ms: i64) -> VBoxResult<()> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn completed(&self) -> VBoxResult<bool> {
        Ok(self.completed)
    }

    async fn result_code(&self) -> VBoxResult<Option<i64>> {
        Ok(self.code)
    }

    fn description(&self) -> String {
        "fake task".to_string()
    }
}

// ── Unattended ───────────────────────────────────────────────────────

pub(crate) struct FakeUnattended {
    state: Arc<Mutex<FakeState>>,
    iso: Mutex<Option<String>>,
    machine: Mutex<Option<String>>,
}

#[async_trait]
impl UnattendedApi for FakeUnattended {
    async fn set_iso_path(&self, path: &str) -> VBoxResult<()> {
        self.state.lock().unwrap().check("set_iso_path")?;
        *self.iso.lock().unwrap() = Some(path.to_string());
        Ok(())
    }

    async fn set_machine(&self, machine_id: &str) -> VBoxResult<()> {
        self.state.lock().unwrap().check("set_machine")?;
        *self.machine.lock().unwrap() = Some(machine_id.to_string());
        Ok(())
    }

    async fn detect_iso_os(&self) -> VBoxResult<DetectedOs> {
        let mut st = self.state.lock().unwrap();
        st.check("detect_iso_os")?;
        if st.detect_fails || self.iso.lock().unwrap().is_none() {
            return Err(VBoxError::call_failed("detectIsoOS: unsupported ISO image"));
        }
        Ok(DetectedOs {
            os_type_id: Some("Ubuntu_64".to_string()),
            version: Some("22.04".to_string()),
        })
    }

    async fn configure(&self, settings: &UnattendedSettings) -> VBoxResult<()> {
        let mut st = self.state.lock().unwrap();
        st.check("configure")?;
        st.unattended = Some(settings.clone());
        Ok(())
    }

    async fn prepare(&self) -> VBoxResult<()> {
        if self.machine.lock().unwrap().is_none() {
            return Err(VBoxError::call_failed("No machine set for unattended install"));
        }
        self.state.lock().unwrap().check("prepare")
    }

    async fn construct_media(&self) -> VBoxResult<()> {
        self.state.lock().unwrap().check("construct_media")
    }

    async fn reconfigure_vm(&self) -> VBoxResult<()> {
        self.state.lock().unwrap().check("reconfigure_vm")
    }
}
