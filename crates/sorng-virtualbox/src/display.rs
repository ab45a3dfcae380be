//! Display settings: VRAM, monitors, acceleration and graphics controller.

use crate::api::VirtualBoxApi;
use crate::envelope::{failure, Envelope};
use crate::error::{VBoxError, VBoxErrorKind, VBoxResult};
use crate::input::{on_off, parse_flag, parse_number, provided, required};
use crate::session::SessionManager;
use crate::types::*;
use log::{info, warn};

/// Manager for graphics adapter settings.
pub struct DisplayManager;

impl DisplayManager {
    /// Apply any of VRAM size, monitor count and 2D/3D acceleration.
    ///
    /// `scale_factor` is accepted but not applied; requesting it downgrades
    /// the result to WARN.
    pub async fn modify_display(api: &dyn VirtualBoxApi, req: &ModifyDisplayRequest) -> Envelope {
        Self::try_modify_display(api, req)
            .await
            .unwrap_or_else(|e| failure("Failed to modify display", req.vm_name.trim(), &e))
    }

    async fn try_modify_display(
        api: &dyn VirtualBoxApi,
        req: &ModifyDisplayRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let vram_mb = parse_number::<u32>("vram_mb", &req.vram_mb)?;
        let monitors = parse_number::<u32>("monitor_count", &req.monitor_count)?;
        let accel_3d = provided(&req.acceleration_3d).map(|v| parse_flag(v, false));
        let accel_2d = provided(&req.acceleration_2d).map(|v| parse_flag(v, false));
        let scale_factor = provided(&req.scale_factor);

        let machine = SessionManager::resolve(api, name).await?;
        let nothing_to_apply =
            vram_mb.is_none() && monitors.is_none() && accel_3d.is_none() && accel_2d.is_none();

        let changes = if nothing_to_apply {
            Vec::new()
        } else {
            SessionManager::with_write_lock(api, &machine, move |mm| {
                Box::pin(async move {
                    let mut changed = Vec::new();
                    if let Some(mb) = vram_mb {
                        mm.set_vram_size(mb).await?;
                        changed.push(format!("vram_mb={}", mb));
                    }
                    if let Some(n) = monitors {
                        mm.set_monitor_count(n).await?;
                        changed.push(format!("monitor_count={}", n));
                    }
                    if let Some(on) = accel_3d {
                        mm.set_accelerate_3d(on).await?;
                        changed.push(format!("acceleration_3d={}", on_off(on)));
                    }
                    if let Some(on) = accel_2d {
                        mm.set_accelerate_2d_video(on).await?;
                        changed.push(format!("acceleration_2d={}", on_off(on)));
                    }
                    mm.save_settings().await?;
                    Ok::<_, VBoxError>(changed)
                })
            })
            .await?
        };

        if let Some(scale) = scale_factor {
            warn!("scale_factor '{}' requested for '{}' but not applied", scale, name);
            let changes = if changes.is_empty() {
                None
            } else {
                Some(changes.join(", "))
            };
            return Ok(
                Envelope::warn("Display updated (partial); scale_factor not implemented")
                    .field("vm", name)
                    .field("changes", changes)
                    .field("scale_factor", scale),
            );
        }
        if changes.is_empty() {
            return Ok(Envelope::warn("No display changes requested").field("vm", name));
        }

        info!("Display of '{}' updated: {}", name, changes.join(", "));
        Ok(Envelope::ok("Display updated")
            .field("vm", name)
            .field("changes", changes.join(", ")))
    }

    /// Switch the graphics controller (`none`, `vboxvga`, `vmsvga`,
    /// `vboxsvga`). Blank selects `vmsvga`.
    pub async fn set_graphics_controller(
        api: &dyn VirtualBoxApi,
        vm_name: &str,
        controller: &str,
    ) -> Envelope {
        Self::try_set_graphics_controller(api, vm_name, controller)
            .await
            .unwrap_or_else(|e| failure("Failed to set graphics controller", vm_name.trim(), &e))
    }

    async fn try_set_graphics_controller(
        api: &dyn VirtualBoxApi,
        vm_name: &str,
        controller: &str,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", vm_name)?;
        let requested = provided(controller).unwrap_or("vmsvga");
        let Some(kind) = GraphicsControllerType::from_input(requested) else {
            return Ok(Envelope::err("Unknown controller type")
                .field("vm", name)
                .field("controller", requested)
                .with_kind(VBoxErrorKind::UnsupportedOption));
        };

        let machine = SessionManager::resolve(api, name).await?;
        SessionManager::with_write_lock(api, &machine, move |mm| {
            Box::pin(async move {
                mm.set_graphics_controller(kind).await?;
                mm.save_settings().await
            })
        })
        .await?;

        info!("'{}' graphics controller set to {}", name, kind.as_str());
        Ok(Envelope::ok("Graphics controller updated")
            .field("vm", name)
            .field("controller", kind.as_str()))
    }
}
