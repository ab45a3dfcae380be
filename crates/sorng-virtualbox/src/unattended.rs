//! Unattended guest OS installation.
//!
//! Both flavours run the same pipeline: bind an installer to the ISO and the
//! machine, detect the guest OS, apply the account and locale settings,
//! prepare / construct media / reconfigure the VM, then launch it and wait
//! for the launch to complete. They differ in how OS detection failures and
//! the optional identity fields are treated:
//!
//! | step            | Linux                      | Windows                       |
//! |-----------------|----------------------------|-------------------------------|
//! | OS detection    | failure reported, skipped  | failure aborts the install    |
//! | full user name  | the account name           | only when given               |
//! | hostname        | given or `<vm>.local`      | only when given               |

use crate::api::{UnattendedApi, VirtualBoxApi};
use crate::envelope::Envelope;
use crate::error::{VBoxErrorKind, VBoxResult};
use crate::input::{parse_flag, provided};
use crate::progress::{ProgressTracker, WaitTimeout};
use crate::session::SessionManager;
use crate::types::*;
use crate::vm::powered_off_gate;
use log::{debug, info, warn};

/// Validated inputs of one install.
struct InstallPlan<'a> {
    os: OsFamily,
    vm: &'a str,
    iso: &'a str,
    settings: UnattendedSettings,
    /// Hostname reported back, whether or not it was applied.
    hostname: String,
    mode: LaunchMode,
}

/// Outcome of the OS detection step.
enum Detection {
    Found(DetectedOs),
    Skipped,
}

impl Detection {
    fn status(&self) -> &'static str {
        match self {
            Self::Found(_) => "ok",
            Self::Skipped => "skipped",
        }
    }

    fn describe(&self) -> Option<String> {
        match self {
            Self::Found(os) => Some(format!(
                "OSType={}, Version={}",
                os.os_type_id.as_deref().unwrap_or("unknown"),
                os.version.as_deref().unwrap_or("unknown")
            )),
            Self::Skipped => None,
        }
    }
}

/// Manager for unattended installs.
pub struct UnattendedManager;

impl UnattendedManager {
    pub async fn linux_install(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &UnattendedInstallRequest,
    ) -> Envelope {
        Self::install(api, cfg, req, OsFamily::Linux).await
    }

    pub async fn windows_install(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &UnattendedInstallRequest,
    ) -> Envelope {
        Self::install(api, cfg, req, OsFamily::Windows).await
    }

    async fn install(
        api: &dyn VirtualBoxApi,
        cfg: &VBoxConfig,
        req: &UnattendedInstallRequest,
        os: OsFamily,
    ) -> Envelope {
        let plan = match Self::plan(cfg, req, os) {
            Ok(plan) => plan,
            Err(env) => return env,
        };

        let machine = match SessionManager::resolve(api, plan.vm).await {
            Ok(m) => m,
            Err(e) => return Self::failed(&plan, &e),
        };
        if let Some(env) = powered_off_gate(&machine) {
            return env;
        }

        let timeout = WaitTimeout::from_millis(cfg.progress_timeout_ms);
        match Self::run(api, &machine, &plan, timeout).await {
            Ok(detection) => {
                info!(
                    "{} unattended install of '{}' started from '{}'",
                    os.label(),
                    plan.vm,
                    plan.iso
                );
                Self::started(&plan, &detection)
            }
            Err(e) => Self::failed(&plan, &e),
        }
    }

    /// Validate the request and fill in defaults. Missing inputs come back
    /// as the ERR envelope to return.
    fn plan<'a>(
        cfg: &VBoxConfig,
        req: &'a UnattendedInstallRequest,
        os: OsFamily,
    ) -> Result<InstallPlan<'a>, Envelope> {
        let (Some(vm), Some(iso)) = (provided(&req.vm_name), provided(&req.iso_path)) else {
            return Err(Envelope::err("vm_name and iso_path are required")
                .field("vm", provided(&req.vm_name))
                .field("iso", provided(&req.iso_path))
                .with_kind(VBoxErrorKind::InvalidInput));
        };
        let (Some(user), Some(password)) = (provided(&req.user), provided(&req.password)) else {
            return Err(Envelope::err("user and password are required")
                .field("vm", vm)
                .field("user", provided(&req.user))
                .with_kind(VBoxErrorKind::InvalidInput));
        };

        let default_hostname = format!("{}{}", vm, cfg.hostname_suffix);
        let given_hostname = provided(&req.hostname).map(str::to_string);
        let (full_user_name, hostname) = match os {
            OsFamily::Linux => (
                Some(provided(&req.full_name).unwrap_or(user).to_string()),
                Some(given_hostname.unwrap_or_else(|| default_hostname.clone())),
            ),
            OsFamily::Windows => (provided(&req.full_name).map(str::to_string), given_hostname),
        };

        let settings = UnattendedSettings {
            user: user.to_string(),
            password: password.to_string(),
            full_user_name,
            hostname: hostname.clone(),
            locale: provided(&req.locale)
                .unwrap_or(cfg.default_locale.as_str())
                .replace('-', "_"),
            time_zone: provided(&req.timezone)
                .unwrap_or(cfg.default_timezone.as_str())
                .to_string(),
            install_guest_additions: parse_flag(&req.install_additions, true),
        };

        Ok(InstallPlan {
            os,
            vm,
            iso,
            settings,
            hostname: hostname.unwrap_or(default_hostname),
            mode: LaunchMode::from_headless(parse_flag(&req.headless, cfg.default_headless)),
        })
    }

    async fn run(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
        plan: &InstallPlan<'_>,
        timeout: WaitTimeout,
    ) -> VBoxResult<Detection> {
        let installer = api.create_unattended_installer().await?;
        let detection = Self::bind(installer.as_ref(), machine, plan).await?;

        installer.configure(&plan.settings).await?;
        debug!("Preparing unattended install for '{}'", plan.vm);
        installer.prepare().await?;
        installer.construct_media().await?;
        installer.reconfigure_vm().await?;

        let (session, progress) = SessionManager::launch(api, machine, plan.mode).await?;
        let waited = ProgressTracker::wait(progress.as_ref(), timeout, "launch VM").await;
        session.release().await;
        waited?;
        Ok(detection)
    }

    /// Attach ISO and machine to the installer and run OS detection.
    async fn bind(
        installer: &dyn UnattendedApi,
        machine: &MachineInfo,
        plan: &InstallPlan<'_>,
    ) -> VBoxResult<Detection> {
        installer.set_iso_path(plan.iso).await?;
        match plan.os {
            OsFamily::Linux => {
                installer.set_machine(&machine.id).await?;
                match installer.detect_iso_os().await {
                    Ok(os) => Ok(Detection::Found(os)),
                    Err(e) => {
                        warn!("OS detection skipped for '{}': {}", plan.iso, e);
                        Ok(Detection::Skipped)
                    }
                }
            }
            OsFamily::Windows => {
                let os = installer.detect_iso_os().await?;
                installer.set_machine(&machine.id).await?;
                Ok(Detection::Found(os))
            }
        }
    }

    fn started(plan: &InstallPlan<'_>, detection: &Detection) -> Envelope {
        let env = Envelope::ok(format!("{} unattended install started", plan.os.label()))
            .field("vm", plan.vm)
            .field("iso", plan.iso)
            .field("launch", plan.mode.as_str())
            .field("guest_additions", plan.settings.install_guest_additions);
        match plan.os {
            OsFamily::Linux => env
                .field("detect_iso_os", detection.status())
                .field("detection", detection.describe()),
            OsFamily::Windows => env
                .field("user", plan.settings.user.as_str())
                .field("hostname", plan.hostname.as_str()),
        }
    }

    fn failed(plan: &InstallPlan<'_>, err: &crate::error::VBoxError) -> Envelope {
        Envelope::err(format!(
            "Failed to start {} unattended install",
            plan.os.label()
        ))
        .field("vm", plan.vm)
        .field("iso", plan.iso)
        .error(err)
    }
}
