//! VM lifecycle: list, create, start, stop, delete, modify, IP lookup.

use crate::api::VirtualBoxApi;
use crate::enums::{machine_state_name, MACHINE_STATE_POWERED_OFF};
use crate::envelope::{failure, Envelope};
use crate::error::{VBoxError, VBoxErrorKind, VBoxResult};
use crate::input::{on_off, parse_flag, parse_number, provided, required};
use crate::progress::{ProgressTracker, WaitTimeout};
use crate::session::SessionManager;
use crate::types::*;
use log::{debug, info};
use std::path::Path;

/// ERR envelope when `machine` is not powered off, `None` otherwise.
pub(crate) fn powered_off_gate(machine: &MachineInfo) -> Option<Envelope> {
    if machine.state == MACHINE_STATE_POWERED_OFF {
        return None;
    }
    Some(
        Envelope::err("VM must be powered off")
            .field("vm", machine.name.as_str())
            .field("state", machine_state_name(machine.state))
            .with_kind(VBoxErrorKind::InvalidMachineState),
    )
}

/// Manager for VirtualBox machine lifecycle operations.
pub struct VmManager;

impl VmManager {
    // ── Query / List ─────────────────────────────────────────────────

    /// List registered machines, optionally filtered by a case-insensitive
    /// name substring.
    pub async fn list_vms(api: &dyn VirtualBoxApi, req: &ListVmsRequest) -> Envelope {
        let filter = req.filter_text.trim().to_lowercase();
        let machines = match api.list_machines().await {
            Ok(m) => m,
            Err(e) => return Envelope::err("Failed to list VMs").error(&e),
        };

        let mut names: Vec<String> = machines
            .into_iter()
            .map(|m| m.name)
            .filter(|n| filter.is_empty() || n.to_lowercase().contains(&filter))
            .collect();
        debug!("{} VMs match filter '{}'", names.len(), filter);

        if names.is_empty() {
            return if filter.is_empty() {
                Envelope::warn("No VirtualBox VMs found")
            } else {
                Envelope::warn("No VMs matched filter").field("filter", req.filter_text.as_str())
            };
        }

        names.sort();
        Envelope::ok("VMs listed")
            .field("count", names.len())
            .field("filter", provided(&req.filter_text))
            .field("vms", names.join(", "))
    }

    /// Best-effort IP lookup. Needs Guest Additions properties, which are
    /// not read yet.
    pub fn get_ip(vm_name: &str) -> Envelope {
        match required("vm_name", vm_name) {
            Ok(name) => Envelope::warn("IP detection not implemented")
                .field("vm", name)
                .field(
                    "hint",
                    "Requires Guest Additions; check VM/guest network properties",
                ),
            Err(e) => failure("Failed to get IP", vm_name, &e),
        }
    }

    // ── Create / Delete ──────────────────────────────────────────────

    /// Create and register a new machine.
    pub async fn create_vm(api: &dyn VirtualBoxApi, req: &CreateVmRequest) -> Envelope {
        Self::try_create_vm(api, req)
            .await
            .unwrap_or_else(|e| failure("Failed to create VM", req.vm_name.trim(), &e))
    }

    async fn try_create_vm(api: &dyn VirtualBoxApi, req: &CreateVmRequest) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let os_type = provided(&req.ostype).unwrap_or("Other");

        let settings_file = match provided(&req.base_folder) {
            Some(base) => {
                let folder = Path::new(base).join(name);
                tokio::fs::create_dir_all(&folder).await.map_err(|e| {
                    VBoxError::call_failed(format!(
                        "Cannot create VM folder {}: {}",
                        folder.display(),
                        e
                    ))
                })?;
                folder
                    .join(format!("{}.vbox", name))
                    .to_string_lossy()
                    .into_owned()
            }
            None => String::new(),
        };

        let spec = CreateMachineSpec {
            settings_file,
            name: name.to_string(),
            platform: PlatformArchitecture::X86,
            groups: Vec::new(),
            os_type_id: os_type.to_string(),
        };
        info!("Creating VM '{}' ({})", name, os_type);
        let machine = api.create_machine(&spec).await?;
        api.register_machine(&machine.id).await?;

        Ok(Envelope::ok("VM created")
            .field("vm", name)
            .field("os_type", os_type)
            .field("platform", spec.platform.as_str())
            .field("iso_provided", provided(&req.iso_path).is_some()))
    }

    /// Unregister a machine. With `delete_disks` its hard disks are deleted
    /// too; otherwise all media stay on disk.
    pub async fn delete_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &DeleteVmRequest,
    ) -> Envelope {
        Self::try_delete_vm(api, cfg, req)
            .await
            .unwrap_or_else(|e| failure("Failed to delete VM", req.vm_name.trim(), &e))
    }

    async fn try_delete_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &DeleteVmRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let machine = SessionManager::resolve(api, name).await?;
        let timeout = WaitTimeout::from_millis(cfg.progress_timeout_ms);

        if parse_flag(&req.delete_disks, false) {
            info!("Deleting VM '{}' with its disks", name);
            let media = api
                .unregister_machine(&machine.id, CleanupMode::DetachAllReturnHardDisksOnly)
                .await?;
            let progress = api.delete_config(&machine.id, media).await?;
            ProgressTracker::wait(progress.as_ref(), timeout, "delete VM").await?;
            Ok(Envelope::ok("VM deleted")
                .field("vm", name)
                .field("disks", "removed"))
        } else {
            info!("Unregistering VM '{}'", name);
            api.unregister_machine(&machine.id, CleanupMode::UnregisterOnly)
                .await?;
            let progress = api.delete_config(&machine.id, Vec::new()).await?;
            ProgressTracker::wait(progress.as_ref(), timeout, "delete VM settings").await?;
            Ok(Envelope::ok("VM unregistered")
                .field("vm", name)
                .field("disks", "preserved"))
        }
    }

    // ── Power ────────────────────────────────────────────────────────

    /// Launch the VM process and wait for it to come up.
    pub async fn start_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &StartVmRequest,
    ) -> Envelope {
        Self::try_start_vm(api, cfg, req)
            .await
            .unwrap_or_else(|e| failure("Failed to start VM", req.vm_name.trim(), &e))
    }

    async fn try_start_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &StartVmRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let mode = LaunchMode::from_headless(parse_flag(&req.headless, cfg.default_headless));
        let machine = SessionManager::resolve(api, name).await?;

        let (session, progress) = SessionManager::launch(api, &machine, mode).await?;
        let waited = ProgressTracker::wait(
            progress.as_ref(),
            WaitTimeout::from_millis(cfg.progress_timeout_ms),
            "launch VM",
        )
        .await;
        session.release().await;
        waited?;

        info!("VM '{}' started ({})", name, mode.as_str());
        Ok(Envelope::ok("VM started")
            .field("vm", name)
            .field("mode", mode.as_str()))
    }

    /// ACPI shutdown, or a hard power-off when `force` is set.
    pub async fn stop_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &StopVmRequest,
    ) -> Envelope {
        Self::try_stop_vm(api, cfg, req)
            .await
            .unwrap_or_else(|e| failure("Failed to stop VM", req.vm_name.trim(), &e))
    }

    async fn try_stop_vm(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &StopVmRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let force = parse_flag(&req.force, false);
        let machine = SessionManager::resolve(api, name).await?;

        let session = SessionManager::acquire_shared(api, &machine).await?;
        let outcome = async {
            let console = session.console()?;
            if force {
                let progress = console.power_down().await?;
                ProgressTracker::wait(
                    progress.as_ref(),
                    WaitTimeout::from_millis(cfg.progress_timeout_ms),
                    "power down",
                )
                .await?;
                Ok::<_, VBoxError>("forced power down")
            } else {
                console.power_button().await?;
                Ok::<_, VBoxError>("ACPI shutdown signal sent")
            }
        }
        .await;
        session.release().await;
        let method = outcome?;

        info!("Stop requested for '{}': {}", name, method);
        Ok(Envelope::ok("VM stop requested")
            .field("vm", name)
            .field("method", method))
    }

    // ── Configure ────────────────────────────────────────────────────

    /// Change CPU count, memory size and/or VRDE state.
    pub async fn modify_vm(api: &dyn VirtualBoxApi, req: &ModifyVmRequest) -> Envelope {
        Self::try_modify_vm(api, req)
            .await
            .unwrap_or_else(|e| failure("Failed to modify VM", req.vm_name.trim(), &e))
    }

    async fn try_modify_vm(api: &dyn VirtualBoxApi, req: &ModifyVmRequest) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let cpus = parse_number::<u32>("cpus", &req.cpus)?;
        let memory_mb = parse_number::<u64>("memory_mb", &req.memory_mb)?;
        let vrde = provided(&req.vrde).map(|v| parse_flag(v, false));

        let machine = SessionManager::resolve(api, name).await?;
        if cpus.is_none() && memory_mb.is_none() && vrde.is_none() {
            return Ok(Envelope::warn("No changes requested")
                .field("vm", name)
                .field("hint", "Provide cpus, memory_mb, or vrde"));
        }

        let changes = SessionManager::with_write_lock(api, &machine, move |mm| {
            Box::pin(async move {
                let mut changed = Vec::new();
                if let Some(n) = cpus {
                    mm.set_cpu_count(n).await?;
                    changed.push(format!("cpus={}", n));
                }
                if let Some(mb) = memory_mb {
                    mm.set_memory_size(mb).await?;
                    changed.push(format!("memory_mb={}", mb));
                }
                if let Some(on) = vrde {
                    mm.set_vrde_enabled(on).await?;
                    changed.push(format!("vrde={}", on_off(on)));
                }
                mm.save_settings().await?;
                Ok::<_, VBoxError>(changed)
            })
        })
        .await?;

        info!("VM '{}' updated: {}", name, changes.join(", "));
        Ok(Envelope::ok("VM updated")
            .field("vm", name)
            .field("changes", changes.join(", ")))
    }
}
