//! Aggregate service facade for the VirtualBox management crate.
//!
//! Owns the injected management API client and the runtime configuration and
//! delegates to the domain managers. Exposed to Tauri via `VBoxServiceState`.
//! The state mutex only guards the config; operations run on a `handle()`
//! taken under the lock, so requests never queue behind each other.

use crate::api::VirtualBoxApi;
use crate::display::DisplayManager;
use crate::envelope::Envelope;
use crate::inspect::{InspectManager, VmInspection};
use crate::integration::IntegrationManager;
use crate::network::NetworkManager;
use crate::storage::StorageManager;
use crate::types::*;
use crate::unattended::UnattendedManager;
use crate::vm::VmManager;

use std::sync::Arc;
use tokio::sync::Mutex;

/// Alias for Tauri managed state.
pub type VBoxServiceState = Arc<Mutex<VBoxService>>;

/// Central VirtualBox management service.
#[derive(Clone)]
pub struct VBoxService {
    api: Arc<dyn VirtualBoxApi>,
    config: VBoxConfig,
}

impl VBoxService {
    /// Create a service around `api` with the default config.
    pub fn new(api: Arc<dyn VirtualBoxApi>) -> Self {
        Self::with_config(api, VBoxConfig::default())
    }

    pub fn with_config(api: Arc<dyn VirtualBoxApi>, config: VBoxConfig) -> Self {
        Self { api, config }
    }

    /// Wrap into the shared state handed to Tauri.
    pub fn into_state(self) -> VBoxServiceState {
        Arc::new(Mutex::new(self))
    }

    /// Detached copy sharing the same API client, for running an operation
    /// after the state lock is dropped.
    pub fn handle(&self) -> VBoxService {
        self.clone()
    }

    pub fn config(&self) -> &VBoxConfig {
        &self.config
    }

    /// Update the config at runtime.
    pub fn set_config(&mut self, config: VBoxConfig) {
        log::info!("VirtualBox service config updated");
        self.config = config;
    }

    pub fn api(&self) -> &dyn VirtualBoxApi {
        self.api.as_ref()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  VM Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn list_vms(&self, req: &ListVmsRequest) -> Envelope {
        VmManager::list_vms(self.api(), req).await
    }

    pub async fn show_vm_info(&self, vm_name: &str) -> VmInspection {
        InspectManager::show_vm_info(self.api(), vm_name).await
    }

    pub async fn create_vm(&self, req: &CreateVmRequest) -> Envelope {
        VmManager::create_vm(self.api(), req).await
    }

    pub async fn start_vm(&self, req: &StartVmRequest) -> Envelope {
        VmManager::start_vm(self.api(), &self.config, req).await
    }

    pub async fn stop_vm(&self, req: &StopVmRequest) -> Envelope {
        VmManager::stop_vm(self.api(), &self.config, req).await
    }

    pub async fn delete_vm(&self, req: &DeleteVmRequest) -> Envelope {
        VmManager::delete_vm(self.api(), &self.config, req).await
    }

    pub async fn modify_vm(&self, req: &ModifyVmRequest) -> Envelope {
        VmManager::modify_vm(self.api(), req).await
    }

    pub fn get_ip(&self, vm_name: &str) -> Envelope {
        VmManager::get_ip(vm_name)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Storage
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn create_disk(&self, req: &CreateDiskRequest) -> Envelope {
        StorageManager::create_disk(self.api(), &self.config, req).await
    }

    pub async fn attach_iso(&self, req: &AttachIsoRequest) -> Envelope {
        StorageManager::attach_iso(self.api(), &self.config, req).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Networking
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn set_network_adapter(&self, req: &NetworkAdapterRequest) -> Envelope {
        NetworkManager::set_network_adapter(self.api(), req).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Display
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn modify_display(&self, req: &ModifyDisplayRequest) -> Envelope {
        DisplayManager::modify_display(self.api(), req).await
    }

    pub async fn set_graphics_controller(&self, vm_name: &str, controller: &str) -> Envelope {
        DisplayManager::set_graphics_controller(self.api(), vm_name, controller).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Guest Integration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn add_shared_folder(&self, req: &SharedFolderRequest) -> Envelope {
        IntegrationManager::add_shared_folder(self.api(), req).await
    }

    pub async fn remove_shared_folder(&self, vm_name: &str, share_name: &str) -> Envelope {
        IntegrationManager::remove_shared_folder(self.api(), vm_name, share_name).await
    }

    pub async fn set_mouse_integration(&self, vm_name: &str, enabled: bool) -> Envelope {
        IntegrationManager::set_mouse_integration(self.api(), vm_name, enabled).await
    }

    pub async fn set_clipboard_mode(&self, vm_name: &str, mode: &str) -> Envelope {
        IntegrationManager::set_clipboard_mode(self.api(), vm_name, mode).await
    }

    pub async fn set_drag_and_drop(&self, vm_name: &str, mode: &str) -> Envelope {
        IntegrationManager::set_drag_and_drop(self.api(), vm_name, mode).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Unattended Install
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn unattended_linux_install(&self, req: &UnattendedInstallRequest) -> Envelope {
        UnattendedManager::linux_install(self.api(), &self.config, req).await
    }

    pub async fn unattended_windows_install(&self, req: &UnattendedInstallRequest) -> Envelope {
        UnattendedManager::windows_install(self.api(), &self.config, req).await
    }
}
