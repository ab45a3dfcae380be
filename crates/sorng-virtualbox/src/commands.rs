//! Tauri command handlers for the VirtualBox management crate.
//!
//! Each command takes a service handle under the `VBoxServiceState` lock,
//! drops the lock, then delegates. Commands are prefixed with `vbox_`. Operation outcomes, failures
//! included, come back as an `Envelope`; `Err` is reserved for failures of
//! the command plumbing itself.

use crate::envelope::Envelope;
use crate::inspect::VmInspection;
use crate::service::VBoxServiceState;
use crate::types::*;
use tauri::State;

fn opt(value: Option<String>) -> String {
    value.unwrap_or_default()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
pub async fn vbox_get_config(state: State<'_, VBoxServiceState>) -> Result<VBoxConfig, String> {
    let svc = state.lock().await;
    Ok(svc.config().clone())
}

#[tauri::command]
pub async fn vbox_set_config(
    state: State<'_, VBoxServiceState>,
    config: VBoxConfig,
) -> Result<(), String> {
    let mut svc = state.lock().await;
    svc.set_config(config);
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
pub async fn vbox_list_vms(
    state: State<'_, VBoxServiceState>,
    filter_text: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .list_vms(&ListVmsRequest {
            filter_text: opt(filter_text),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_show_vm_info(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
) -> Result<VmInspection, String> {
    let svc = state.lock().await.handle();
    Ok(svc.show_vm_info(&vm_name).await)
}

#[tauri::command]
pub async fn vbox_create_vm(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    ostype: Option<String>,
    base_folder: Option<String>,
    iso_path: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .create_vm(&CreateVmRequest {
            vm_name,
            ostype: opt(ostype),
            base_folder: opt(base_folder),
            iso_path: opt(iso_path),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_start_vm(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    headless: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .start_vm(&StartVmRequest {
            vm_name,
            headless: opt(headless),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_stop_vm(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    force: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .stop_vm(&StopVmRequest {
            vm_name,
            force: opt(force),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_delete_vm(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    delete_disks: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .delete_vm(&DeleteVmRequest {
            vm_name,
            delete_disks: opt(delete_disks),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_modify_vm(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    cpus: Option<String>,
    memory_mb: Option<String>,
    vrde: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .modify_vm(&ModifyVmRequest {
            vm_name,
            cpus: opt(cpus),
            memory_mb: opt(memory_mb),
            vrde: opt(vrde),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_get_ip(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc.get_ip(&vm_name))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
#[allow(clippy::too_many_arguments)]
pub async fn vbox_create_disk(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    disk_size_gb: Option<String>,
    disk_format: Option<String>,
    disk_variant: Option<String>,
    storage_controller: Option<String>,
    port: Option<String>,
    device: Option<String>,
    disk_dir: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .create_disk(&CreateDiskRequest {
            vm_name,
            disk_size_gb: opt(disk_size_gb),
            disk_format: opt(disk_format),
            disk_variant: opt(disk_variant),
            storage_controller: opt(storage_controller),
            port: opt(port),
            device: opt(device),
            disk_dir: opt(disk_dir),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_attach_iso(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    iso_path: String,
    storage_controller: Option<String>,
    port: Option<String>,
    device: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .attach_iso(&AttachIsoRequest {
            vm_name,
            iso_path,
            storage_controller: opt(storage_controller),
            port: opt(port),
            device: opt(device),
        })
        .await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Networking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
pub async fn vbox_set_network_adapter(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    adapter: Option<String>,
    mode: Option<String>,
    network_name: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .set_network_adapter(&NetworkAdapterRequest {
            vm_name,
            adapter: opt(adapter),
            mode: opt(mode),
            network_name: opt(network_name),
        })
        .await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Guest Integration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
pub async fn vbox_add_shared_folder(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    share_name: String,
    host_path: String,
    readonly: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .add_shared_folder(&SharedFolderRequest {
            vm_name,
            share_name,
            host_path,
            readonly: opt(readonly),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_remove_shared_folder(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    share_name: String,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc.remove_shared_folder(&vm_name, &share_name).await)
}

#[tauri::command]
pub async fn vbox_set_mouse_integration(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    enabled: bool,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc.set_mouse_integration(&vm_name, enabled).await)
}

#[tauri::command]
pub async fn vbox_set_clipboard_mode(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    mode: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc.set_clipboard_mode(&vm_name, &opt(mode)).await)
}

#[tauri::command]
pub async fn vbox_set_drag_and_drop(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    mode: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc.set_drag_and_drop(&vm_name, &opt(mode)).await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Display
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
pub async fn vbox_modify_display(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    vram_mb: Option<String>,
    monitor_count: Option<String>,
    scale_factor: Option<String>,
    acceleration_3d: Option<String>,
    acceleration_2d: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .modify_display(&ModifyDisplayRequest {
            vm_name,
            vram_mb: opt(vram_mb),
            monitor_count: opt(monitor_count),
            scale_factor: opt(scale_factor),
            acceleration_3d: opt(acceleration_3d),
            acceleration_2d: opt(acceleration_2d),
        })
        .await)
}

#[tauri::command]
pub async fn vbox_set_graphics_controller(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    controller: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .set_graphics_controller(&vm_name, &opt(controller))
        .await)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Unattended Install
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tauri::command]
#[allow(clippy::too_many_arguments)]
pub async fn vbox_unattended_linux_install(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    iso_path: String,
    user: String,
    password: String,
    hostname: Option<String>,
    locale: Option<String>,
    timezone: Option<String>,
    install_additions: Option<String>,
    headless: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .unattended_linux_install(&UnattendedInstallRequest {
            vm_name,
            iso_path,
            user,
            password,
            full_name: String::new(),
            hostname: opt(hostname),
            locale: opt(locale),
            timezone: opt(timezone),
            install_additions: opt(install_additions),
            headless: opt(headless),
        })
        .await)
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
pub async fn vbox_unattended_windows_install(
    state: State<'_, VBoxServiceState>,
    vm_name: String,
    iso_path: String,
    user: String,
    password: String,
    full_name: Option<String>,
    hostname: Option<String>,
    locale: Option<String>,
    timezone: Option<String>,
    install_additions: Option<String>,
    headless: Option<String>,
) -> Result<Envelope, String> {
    let svc = state.lock().await.handle();
    Ok(svc
        .unattended_windows_install(&UnattendedInstallRequest {
            vm_name,
            iso_path,
            user,
            password,
            full_name: opt(full_name),
            hostname: opt(hostname),
            locale: opt(locale),
            timezone: opt(timezone),
            install_additions: opt(install_additions),
            headless: opt(headless),
        })
        .await)
}
