//! Storage management: disk creation, ISO attachment and the storage
//! controllers they need.
//!
//! Both attach operations follow the same policy: the machine must be powered
//! off, the requested controller is created on demand (SATA/AHCI or IDE/PIIX4
//! only), and an occupied `(controller, port, device)` slot is reported
//! instead of overwritten. The occupancy check happens before anything is
//! changed and again under the lock right before attaching.

use crate::api::{MutableMachineApi, VirtualBoxApi};
use crate::envelope::{failure, Envelope};
use crate::error::{VBoxError, VBoxErrorKind, VBoxResult};
use crate::input::{number_or, provided, required};
use crate::progress::{ProgressTracker, WaitTimeout};
use crate::session::SessionManager;
use crate::types::*;
use crate::vm::powered_off_gate;
use log::{debug, info};
use std::path::{Path, PathBuf};

const OCCUPIED_HINT: &str = "Hard disks are typically on port 0; use port>=1 for ISO";

/// A `(controller, port, device)` attachment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachTarget {
    pub controller: String,
    pub port: i32,
    pub device: i32,
}

impl AttachTarget {
    fn occupant<'a>(&self, attachments: &'a [MediumAttachmentInfo]) -> Option<&'a MediumAttachmentInfo> {
        attachments.iter().find(|a| {
            a.controller == self.controller
                && a.port == self.port
                && a.device == self.device
                && a.is_occupied()
        })
    }

    fn occupied_envelope(&self, vm: &str, occupant: &MediumAttachmentInfo) -> Envelope {
        let err = VBoxError::target_occupied(&self.controller, self.port, self.device);
        debug!("{}", err);
        Envelope::err("Medium already attached at target")
            .field("vm", vm)
            .field("controller", self.controller.as_str())
            .field("port", self.port)
            .field("device", self.device)
            .field("attached_type", occupant.medium_kind())
            .field("hint", OCCUPIED_HINT)
            .with_kind(err.kind)
    }
}

/// Outcome of the read-only checks that precede an attach.
enum Preflight {
    /// Controller exists, or must be created with this layout.
    Ready(Option<ControllerLayout>),
    /// Rejected before any change; the envelope says why.
    Rejected(Envelope),
}

/// Manager for disk and optical media attachment.
pub struct StorageManager;

impl StorageManager {
    // ── Disks ────────────────────────────────────────────────────────

    /// Create (or reuse) a hard disk image and attach it.
    pub async fn create_disk(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &CreateDiskRequest,
    ) -> Envelope {
        Self::try_create_disk(api, cfg, req)
            .await
            .unwrap_or_else(|e| failure("Failed to create/attach disk", req.vm_name.trim(), &e))
    }

    async fn try_create_disk(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &CreateDiskRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let size_gb = number_or::<u64>("disk_size_gb", &req.disk_size_gb, cfg.default_disk_size_gb)?;
        let format = provided(&req.disk_format).unwrap_or(cfg.default_disk_format.as_str());
        let variant = MediumVariant::from_input(&req.disk_variant);
        let target = AttachTarget {
            controller: provided(&req.storage_controller)
                .unwrap_or(cfg.default_storage_controller.as_str())
                .to_string(),
            port: number_or("port", &req.port, 0)?,
            device: number_or("device", &req.device, 0)?,
        };
        let size_bytes = size_gb
            .checked_mul(1024 * 1024 * 1024)
            .ok_or_else(|| VBoxError::invalid_input("disk_size_gb is too large"))?;

        let machine = SessionManager::resolve(api, name).await?;
        if let Some(env) = powered_off_gate(&machine) {
            return Ok(env);
        }
        let layout = match Self::preflight(api, cfg, &machine, &target).await? {
            Preflight::Ready(layout) => layout,
            Preflight::Rejected(env) => return Ok(env),
        };
        if let Some(layout) = layout {
            Self::create_controller(api, &machine, &target.controller, layout).await?;
        }

        let dir = match provided(&req.disk_dir) {
            Some(d) => PathBuf::from(d),
            None => Path::new(&machine.settings_file_path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let disk_path = dir.join(format!("{}.vdi", name));
        let disk_path_str = disk_path.to_string_lossy().into_owned();

        let exists = tokio::fs::try_exists(&disk_path).await.map_err(|e| {
            VBoxError::call_failed(format!("Cannot check disk path {}: {}", disk_path_str, e))
        })?;
        let medium = if exists {
            debug!("Reusing existing disk {}", disk_path_str);
            api.open_medium(&disk_path_str, DeviceType::HardDisk, AccessMode::ReadWrite, false)
                .await?
        } else {
            info!(
                "Creating {} GB {} disk {} ({:?})",
                size_gb, format, disk_path_str, variant
            );
            let medium = api
                .create_medium(format, &disk_path_str, AccessMode::ReadWrite, DeviceType::HardDisk)
                .await?;
            let progress = api.create_base_storage(&medium.id, size_bytes, variant).await?;
            ProgressTracker::wait(
                progress.as_ref(),
                WaitTimeout::from_millis(cfg.progress_timeout_ms),
                "create base storage",
            )
            .await?;
            medium
        };

        if let Some(env) =
            Self::attach(api, &machine, &target, DeviceType::HardDisk, &medium.id).await?
        {
            return Ok(env);
        }

        Ok(Envelope::ok("Disk attached")
            .field("vm", name)
            .field("size_gb", size_gb)
            .field("disk_path", disk_path_str)
            .field("created", !exists)
            .field("controller", target.controller.as_str())
            .field("port", target.port)
            .field("device", target.device))
    }

    // ── Optical media ────────────────────────────────────────────────

    /// Attach an ISO image as a DVD.
    pub async fn attach_iso(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &AttachIsoRequest,
    ) -> Envelope {
        let iso = req.iso_path.trim();
        match Self::try_attach_iso(api, cfg, req).await {
            Ok(env) => env,
            Err(e) if e.kind == VBoxErrorKind::InvalidInput => Envelope::err(e.message.clone())
                .field("vm", provided(&req.vm_name))
                .field("iso", provided(iso))
                .with_kind(e.kind),
            Err(e) => Envelope::err("Failed to attach ISO")
                .field("vm", req.vm_name.trim())
                .field("iso", iso)
                .error(&e),
        }
    }

    async fn try_attach_iso(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &AttachIsoRequest,
    ) -> VBoxResult<Envelope> {
        let (name, iso) = match (provided(&req.vm_name), provided(&req.iso_path)) {
            (Some(n), Some(i)) => (n, i),
            _ => {
                return Err(VBoxError::invalid_input(
                    "vm_name and iso_path are required",
                ))
            }
        };
        let target = AttachTarget {
            controller: provided(&req.storage_controller)
                .unwrap_or(cfg.default_storage_controller.as_str())
                .to_string(),
            port: number_or("port", &req.port, cfg.default_iso_port)?,
            device: number_or("device", &req.device, 0)?,
        };

        let machine = SessionManager::resolve(api, name).await?;
        if let Some(env) = powered_off_gate(&machine) {
            return Ok(env);
        }
        let layout = match Self::preflight(api, cfg, &machine, &target).await? {
            Preflight::Ready(layout) => layout,
            Preflight::Rejected(env) => return Ok(env),
        };
        if let Some(layout) = layout {
            Self::create_controller(api, &machine, &target.controller, layout).await?;
        }

        let medium = api
            .open_medium(iso, DeviceType::Dvd, AccessMode::ReadOnly, false)
            .await?;
        if let Some(env) = Self::attach(api, &machine, &target, DeviceType::Dvd, &medium.id).await? {
            return Ok(env);
        }

        info!("ISO {} attached to '{}'", iso, name);
        Ok(Envelope::ok("ISO attached")
            .field("vm", name)
            .field("iso", iso)
            .field("controller", target.controller.as_str())
            .field("port", target.port)
            .field("device", target.device))
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Read-only checks: occupancy of the target slot, and whether the
    /// controller exists or can be created.
    async fn preflight(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        machine: &MachineInfo,
        target: &AttachTarget,
    ) -> VBoxResult<Preflight> {
        let controllers = api.storage_controllers(&machine.id).await?;
        if controllers.iter().any(|c| c.name == target.controller) {
            let attachments = api.medium_attachments(&machine.id, &target.controller).await?;
            if let Some(occupant) = target.occupant(&attachments) {
                return Ok(Preflight::Rejected(
                    target.occupied_envelope(&machine.name, occupant),
                ));
            }
            return Ok(Preflight::Ready(None));
        }

        match ControllerLayout::for_name(&target.controller, cfg.sata_port_count) {
            Some(layout) => Ok(Preflight::Ready(Some(layout))),
            None => {
                let err = VBoxError::unsupported("controller type", &target.controller);
                Ok(Preflight::Rejected(
                    Envelope::err("Unsupported controller type")
                        .field("vm", machine.name.as_str())
                        .field("controller", target.controller.as_str())
                        .with_kind(err.kind),
                ))
            }
        }
    }

    async fn create_controller(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
        name: &str,
        layout: ControllerLayout,
    ) -> VBoxResult<()> {
        info!(
            "Adding {:?} controller '{}' to '{}'",
            layout.bus, name, machine.name
        );
        let name = name.to_string();
        SessionManager::with_write_lock(api, machine, move |mm| {
            Box::pin(async move {
                ensure_controller(mm, &name, layout).await?;
                mm.save_settings().await
            })
        })
        .await
    }

    /// Attach under a write lock. Returns the occupied-slot envelope if the
    /// slot was taken in the meantime.
    async fn attach(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
        target: &AttachTarget,
        device_type: DeviceType,
        medium_id: &str,
    ) -> VBoxResult<Option<Envelope>> {
        let session = SessionManager::acquire_write(api, machine).await?;
        let outcome = async {
            let mm = session.machine();
            let attachments = mm.medium_attachments(&target.controller).await?;
            if let Some(occupant) = target.occupant(&attachments) {
                return Ok(Some(target.occupied_envelope(&machine.name, occupant)));
            }
            mm.attach_device(
                &target.controller,
                target.port,
                target.device,
                device_type,
                medium_id,
            )
            .await?;
            mm.save_settings().await?;
            Ok::<_, VBoxError>(None)
        }
        .await;
        session.release().await;
        outcome
    }
}

/// Create `name` with `layout` unless the machine already has it.
pub async fn ensure_controller(
    mm: &dyn MutableMachineApi,
    name: &str,
    layout: ControllerLayout,
) -> VBoxResult<bool> {
    if mm.storage_controllers().await?.iter().any(|c| c.name == name) {
        return Ok(false);
    }
    mm.add_storage_controller(name, layout.bus).await?;
    mm.set_storage_controller_type(name, layout.controller_type)
        .await?;
    if let Some(ports) = layout.port_count {
        mm.set_storage_controller_port_count(name, ports).await?;
    }
    Ok(true)
}
