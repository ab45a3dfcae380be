//! Network adapter configuration.

use crate::api::VirtualBoxApi;
use crate::envelope::{failure, Envelope};
use crate::error::{VBoxError, VBoxErrorKind, VBoxResult};
use crate::input::{number_or, provided, required};
use crate::session::SessionManager;
use crate::types::*;
use log::info;

/// Manager for VM network adapters.
pub struct NetworkManager;

impl NetworkManager {
    /// Enable adapter `adapter` (1-based) and attach it in `mode`.
    ///
    /// `network_name` selects the bridged interface, host-only interface or
    /// NAT network, depending on the mode; it is ignored for plain NAT.
    pub async fn set_network_adapter(
        api: &dyn VirtualBoxApi,
        req: &NetworkAdapterRequest,
    ) -> Envelope {
        match Self::try_set_network_adapter(api, req).await {
            Ok(env) => env,
            Err(e) if e.kind == VBoxErrorKind::InvalidInput => {
                failure("Failed to set network adapter", &req.vm_name, &e)
            }
            Err(e) => Envelope::err("Failed to set network adapter")
                .field("vm", req.vm_name.trim())
                .field("adapter", req.adapter.trim())
                .error(&e),
        }
    }

    async fn try_set_network_adapter(
        api: &dyn VirtualBoxApi,
        req: &NetworkAdapterRequest,
    ) -> VBoxResult<Envelope> {
        let name = required("vm_name", &req.vm_name)?;
        let adapter = number_or::<u32>("adapter", &req.adapter, 1)?;
        if adapter == 0 || adapter > NETWORK_ADAPTER_SLOTS {
            return Err(VBoxError::invalid_input(format!(
                "adapter must be between 1 and {}",
                NETWORK_ADAPTER_SLOTS
            )));
        }
        let requested = provided(&req.mode).unwrap_or("nat");
        let mode = match NetworkMode::from_input(requested) {
            Some(m) => m,
            None => {
                return Ok(Envelope::err("Unknown network mode")
                    .field("vm", name)
                    .field("adapter", adapter)
                    .field("mode", requested)
                    .with_kind(VBoxErrorKind::UnsupportedOption))
            }
        };
        let network_name = provided(&req.network_name).map(str::to_string);

        let machine = SessionManager::resolve(api, name).await?;
        let slot = adapter - 1;
        let target = network_name.clone();
        SessionManager::with_write_lock(api, &machine, move |mm| {
            Box::pin(async move {
                mm.set_adapter_enabled(slot, true).await?;
                mm.set_adapter_attachment(slot, mode.attachment_code())
                    .await?;
                if let Some(target) = target.as_deref() {
                    match mode {
                        NetworkMode::Nat => {}
                        NetworkMode::Bridged => mm.set_bridged_interface(slot, target).await?,
                        NetworkMode::HostOnly => mm.set_host_only_interface(slot, target).await?,
                        NetworkMode::NatNetwork => mm.set_nat_network(slot, target).await?,
                    }
                }
                mm.save_settings().await
            })
        })
        .await?;

        info!("'{}' adapter {} set to {}", name, adapter, mode.as_str());
        Ok(Envelope::ok("Network adapter updated")
            .field("vm", name)
            .field("adapter", adapter)
            .field("mode", mode.as_str())
            .field("network_name", network_name))
    }
}
