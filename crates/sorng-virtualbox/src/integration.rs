//! Guest integration: shared folders, mouse, clipboard and drag-and-drop.

use crate::api::{MutableMachineApi, VirtualBoxApi};
use crate::envelope::{failure, Envelope};
use crate::error::{VBoxError, VBoxErrorKind, VBoxResult};
use crate::input::{parse_flag, provided, required};
use crate::session::SessionManager;
use crate::types::*;
use futures::future::BoxFuture;
use log::{debug, info};

/// Name given to the USB controller added for tablet pointing.
const TABLET_USB_CONTROLLER: &str = "USB";

/// Which of the two transfer-mode settings an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferSetting {
    Clipboard,
    DragAndDrop,
}

impl TransferSetting {
    fn unknown_summary(&self) -> &'static str {
        match self {
            Self::Clipboard => "Unknown clipboard mode",
            Self::DragAndDrop => "Unknown drag and drop mode",
        }
    }

    fn ok_summary(&self) -> &'static str {
        match self {
            Self::Clipboard => "Clipboard mode updated",
            Self::DragAndDrop => "Drag and drop mode updated",
        }
    }

    fn failure_summary(&self) -> &'static str {
        match self {
            Self::Clipboard => "Failed to set clipboard mode",
            Self::DragAndDrop => "Failed to set drag and drop mode",
        }
    }

    /// Read the current mode, then write `mode`. Returns the previous mode.
    fn apply<'s>(
        self,
        mm: &'s dyn MutableMachineApi,
        mode: TransferMode,
    ) -> BoxFuture<'s, VBoxResult<TransferMode>> {
        Box::pin(async move {
            let previous = match self {
                Self::Clipboard => {
                    let prev = mm.clipboard_mode().await?;
                    mm.set_clipboard_mode(mode).await?;
                    prev
                }
                Self::DragAndDrop => {
                    let prev = mm.dnd_mode().await?;
                    mm.set_dnd_mode(mode).await?;
                    prev
                }
            };
            mm.save_settings().await?;
            Ok(previous)
        })
    }
}

/// Manager for guest integration settings.
pub struct IntegrationManager;

impl IntegrationManager {
    // ── Shared folders ───────────────────────────────────────────────

    /// Add a permanent, auto-mounted shared folder.
    pub async fn add_shared_folder(api: &dyn VirtualBoxApi, req: &SharedFolderRequest) -> Envelope {
        let (Some(name), Some(share), Some(host_path)) = (
            provided(&req.vm_name),
            provided(&req.share_name),
            provided(&req.host_path),
        ) else {
            return Envelope::err("vm_name, share_name, and host_path are required")
                .field("vm", provided(&req.vm_name))
                .field("share", provided(&req.share_name))
                .field("host_path", provided(&req.host_path))
                .with_kind(VBoxErrorKind::InvalidInput);
        };
        let readonly = parse_flag(&req.readonly, false);

        let result = async {
            let machine = SessionManager::resolve(api, name).await?;
            let (share_name, path) = (share.to_string(), host_path.to_string());
            SessionManager::with_write_lock(api, &machine, move |mm| {
                Box::pin(async move {
                    mm.create_shared_folder(&share_name, &path, !readonly, true, "")
                        .await?;
                    mm.save_settings().await
                })
            })
            .await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Shared folder '{}' -> '{}' added to '{}'", share, host_path, name);
                Envelope::ok("Shared folder added")
                    .field("vm", name)
                    .field("share", share)
                    .field("host_path", host_path)
                    .field("readonly", readonly)
                    .field("automount", true)
            }
            Err(e) => Envelope::err("Failed to add shared folder")
                .field("vm", name)
                .field("share", share)
                .error(&e),
        }
    }

    pub async fn remove_shared_folder(
        api: &dyn VirtualBoxApi,
        vm_name: &str,
        share_name: &str,
    ) -> Envelope {
        let (Some(name), Some(share)) = (provided(vm_name), provided(share_name)) else {
            return Envelope::err("vm_name and share_name are required")
                .field("vm", provided(vm_name))
                .field("share", provided(share_name))
                .with_kind(VBoxErrorKind::InvalidInput);
        };

        let result = async {
            let machine = SessionManager::resolve(api, name).await?;
            let share_name = share.to_string();
            SessionManager::with_write_lock(api, &machine, move |mm| {
                Box::pin(async move {
                    mm.remove_shared_folder(&share_name).await?;
                    mm.save_settings().await
                })
            })
            .await
        }
        .await;

        match result {
            Ok(()) => {
                info!("Shared folder '{}' removed from '{}'", share, name);
                Envelope::ok("Shared folder removed")
                    .field("vm", name)
                    .field("share", share)
            }
            Err(e) => Envelope::err("Failed to remove shared folder")
                .field("vm", name)
                .field("share", share)
                .error(&e),
        }
    }

    // ── Mouse ────────────────────────────────────────────────────────

    /// Enabled switches the pointing device to a USB tablet, adding an xHCI
    /// controller first when the VM has no USB controller. Disabled goes
    /// back to a PS/2 mouse.
    pub async fn set_mouse_integration(
        api: &dyn VirtualBoxApi,
        vm_name: &str,
        enabled: bool,
    ) -> Envelope {
        Self::try_set_mouse_integration(api, vm_name, enabled)
            .await
            .unwrap_or_else(|e| failure("Failed to set mouse integration", vm_name.trim(), &e))
    }

    async fn try_set_mouse_integration(
        api: &dyn VirtualBoxApi,
        vm_name: &str,
        enabled: bool,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", vm_name)?;
        let machine = SessionManager::resolve(api, name).await?;
        let usb_added = SessionManager::with_write_lock(api, &machine, move |mm| {
            Box::pin(async move {
                let mut added = false;
                if enabled {
                    if mm.usb_controller_count().await? == 0 {
                        mm.add_usb_controller(TABLET_USB_CONTROLLER, UsbControllerType::Xhci)
                            .await?;
                        added = true;
                    }
                    mm.set_pointing_hid_type(PointingHidType::UsbTablet).await?;
                } else {
                    mm.set_pointing_hid_type(PointingHidType::Ps2Mouse).await?;
                }
                mm.save_settings().await?;
                Ok::<_, VBoxError>(added)
            })
        })
        .await?;

        if usb_added {
            debug!("Added xHCI controller '{}' to '{}'", TABLET_USB_CONTROLLER, name);
        }
        info!("Mouse integration on '{}' set to {}", name, enabled);
        Ok(Envelope::ok("Mouse integration updated")
            .field("vm", name)
            .field("enabled", enabled))
    }

    // ── Clipboard / drag and drop ────────────────────────────────────

    /// Blank selects `bidirectional`.
    pub async fn set_clipboard_mode(api: &dyn VirtualBoxApi, vm_name: &str, mode: &str) -> Envelope {
        Self::set_transfer_mode(api, TransferSetting::Clipboard, vm_name, mode).await
    }

    /// Blank selects `bidirectional`.
    pub async fn set_drag_and_drop(api: &dyn VirtualBoxApi, vm_name: &str, mode: &str) -> Envelope {
        Self::set_transfer_mode(api, TransferSetting::DragAndDrop, vm_name, mode).await
    }

    async fn set_transfer_mode(
        api: &dyn VirtualBoxApi,
        setting: TransferSetting,
        vm_name: &str,
        mode: &str,
    ) -> Envelope {
        Self::try_set_transfer_mode(api, setting, vm_name, mode)
            .await
            .unwrap_or_else(|e| failure(setting.failure_summary(), vm_name.trim(), &e))
    }

    async fn try_set_transfer_mode(
        api: &dyn VirtualBoxApi,
        setting: TransferSetting,
        vm_name: &str,
        mode: &str,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", vm_name)?;
        let requested = provided(mode).unwrap_or("bidirectional");
        let Some(mode) = TransferMode::from_input(requested) else {
            return Ok(Envelope::err(setting.unknown_summary())
                .field("vm", name)
                .field("mode", requested)
                .with_kind(VBoxErrorKind::UnsupportedOption));
        };

        let machine = SessionManager::resolve(api, name).await?;
        let previous =
            SessionManager::with_write_lock(api, &machine, move |mm| setting.apply(mm, mode))
                .await?;

        info!(
            "'{}' {:?} mode {} -> {}",
            name,
            setting,
            previous.as_str(),
            mode.as_str()
        );
        Ok(Envelope::ok(setting.ok_summary())
            .field("vm", name)
            .field("mode", mode.as_str())
            .field("previous", previous.as_str()))
    }
}
