//! Session lock management.
//!
//! Every mutation runs inside a write-locked session and every console
//! interaction inside a shared one. A [`Session`] is typed by its lock mode:
//! `Session<Write>` only exposes the editable machine, `Session<Shared>` only
//! the console. Sessions are released explicitly with [`Session::release`];
//! one dropped without release (early return, panic) schedules an unlock on
//! the current tokio runtime.

use crate::api::{ConsoleApi, MutableMachineApi, ProgressApi, SessionApi, VirtualBoxApi};
use crate::enums::{has_console, machine_state_name, permits_configuration};
use crate::error::{
    VBoxError, VBoxErrorKind, VBoxResult, VBOX_E_INVALID_OBJECT_STATE, VBOX_E_INVALID_VM_STATE,
    VBOX_E_OBJECT_NOT_FOUND,
};
use crate::types::{LaunchMode, LockType, MachineInfo};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

mod sealed {
    pub trait Sealed {}
}

/// Lock mode marker.
pub trait LockMode: sealed::Sealed + Send + Sync + 'static {
    const LOCK: LockType;
}

/// Exclusive lock; configuration may be changed.
#[derive(Debug)]
pub struct Write;

/// Shared lock; console access to a running VM.
#[derive(Debug)]
pub struct Shared;

impl sealed::Sealed for Write {}
impl sealed::Sealed for Shared {}

impl LockMode for Write {
    const LOCK: LockType = LockType::Write;
}

impl LockMode for Shared {
    const LOCK: LockType = LockType::Shared;
}

/// A held machine lock.
pub struct Session<M: LockMode> {
    id: Uuid,
    vm: String,
    inner: Arc<dyn SessionApi>,
    released: bool,
    _mode: PhantomData<M>,
}

impl<M: LockMode> Session<M> {
    fn new(vm: &str, inner: Box<dyn SessionApi>) -> Self {
        let id = Uuid::new_v4();
        if inner.lock_type() != M::LOCK {
            warn!(
                "Session {} on '{}' reports {:?} lock, expected {:?}",
                id,
                vm,
                inner.lock_type(),
                M::LOCK
            );
        }
        debug!("Session {} holds {:?} lock on '{}'", id, M::LOCK, vm);
        Self {
            id,
            vm: vm.to_string(),
            inner: Arc::from(inner),
            released: false,
            _mode: PhantomData,
        }
    }

    /// Correlation id used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn vm(&self) -> &str {
        &self.vm
    }

    /// Unlock the machine. Unlock failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match self.inner.unlock().await {
            Ok(()) => debug!("Session {} released '{}'", self.id, self.vm),
            Err(e) => warn!(
                "Session {} failed to release '{}': {}",
                self.id, self.vm, e
            ),
        }
    }
}

impl Session<Write> {
    /// The session's editable machine.
    pub fn machine(&self) -> &dyn MutableMachineApi {
        self.inner.machine()
    }
}

impl Session<Shared> {
    /// Console of the running VM.
    pub fn console(&self) -> VBoxResult<&dyn ConsoleApi> {
        self.inner.console().ok_or_else(|| {
            VBoxError::new(
                VBoxErrorKind::InvalidMachineState,
                format!("VM '{}' has no console in this session", self.vm),
            )
        })
    }
}

impl<M: LockMode> Drop for Session<M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let id = self.id;
        let vm = std::mem::take(&mut self.vm);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Session {} on '{}' dropped unreleased; unlocking", id, vm);
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    if let Err(e) = inner.unlock().await {
                        warn!("Deferred unlock of '{}' ({}) failed: {}", vm, id, e);
                    }
                });
            }
            Err(_) => warn!(
                "Session {} on '{}' dropped outside a runtime; lock not released",
                id, vm
            ),
        }
    }
}

/// Acquires and scopes machine locks.
pub struct SessionManager;

impl SessionManager {
    /// Live read of a machine by name or id, with not-found classified.
    pub async fn resolve(api: &dyn VirtualBoxApi, name_or_id: &str) -> VBoxResult<MachineInfo> {
        api.find_machine(name_or_id).await.map_err(|e| {
            if e.kind == VBoxErrorKind::MachineNotFound || e.code == Some(VBOX_E_OBJECT_NOT_FOUND) {
                VBoxError {
                    kind: VBoxErrorKind::MachineNotFound,
                    ..e
                }
            } else {
                e
            }
        })
    }

    /// Take the exclusive lock needed to change configuration.
    ///
    /// Fails with `InvalidMachineState` without calling the hypervisor when
    /// the machine is inaccessible or not powered off / saved / aborted.
    pub async fn acquire_write(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
    ) -> VBoxResult<Session<Write>> {
        Self::ensure_accessible(machine)?;
        if !permits_configuration(machine.state) {
            return Err(VBoxError::invalid_state(
                &machine.name,
                machine_state_name(machine.state),
                "powered_off, saved or aborted",
            ));
        }
        Self::lock(api, machine).await
    }

    /// Take a shared lock for console operations on a running or paused VM.
    pub async fn acquire_shared(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
    ) -> VBoxResult<Session<Shared>> {
        Self::ensure_accessible(machine)?;
        if !has_console(machine.state) {
            return Err(VBoxError::invalid_state(
                &machine.name,
                machine_state_name(machine.state),
                "running or paused",
            ));
        }
        Self::lock(api, machine).await
    }

    /// Launch the VM process. The returned session holds the shared lock
    /// created by the launch and must be released once the progress is done.
    pub async fn launch(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
        mode: LaunchMode,
    ) -> VBoxResult<(Session<Shared>, Box<dyn ProgressApi>)> {
        Self::ensure_accessible(machine)?;
        info!("Launching '{}' ({})", machine.name, mode.as_str());
        let (inner, progress) = api
            .launch_vm_process(&machine.id, mode)
            .await
            .map_err(|e| Self::classify_lock_error(&machine.name, e))?;
        Ok((Session::new(&machine.name, inner), progress))
    }

    /// Run `f` against the editable machine under a write lock and release
    /// the lock afterwards, whatever `f` returned.
    pub async fn with_write_lock<T, F>(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
        f: F,
    ) -> VBoxResult<T>
    where
        F: for<'s> FnOnce(&'s dyn MutableMachineApi) -> BoxFuture<'s, VBoxResult<T>>,
    {
        let session = Self::acquire_write(api, machine).await?;
        let result = f(session.machine()).await;
        if let Err(e) = &result {
            debug!("Session {} body failed: {}", session.id(), e);
        }
        session.release().await;
        result
    }

    /// Map a failed lock call to a typed error.
    ///
    /// An existing lock on the machine is reported as `LockContention`, a
    /// machine in the wrong state as `InvalidMachineState`, a missing machine
    /// as `MachineNotFound`; anything else passes through verbatim as
    /// `HypervisorCallFailed`.
    pub fn classify_lock_error(vm: &str, err: VBoxError) -> VBoxError {
        if err.kind == VBoxErrorKind::LockContention
            || err.code == Some(VBOX_E_INVALID_OBJECT_STATE)
            || mentions_existing_lock(&err.message)
        {
            VBoxError::lock_contention(vm, &err.message)
        } else if err.code == Some(VBOX_E_INVALID_VM_STATE) {
            VBoxError {
                kind: VBoxErrorKind::InvalidMachineState,
                ..err
            }
        } else if err.code == Some(VBOX_E_OBJECT_NOT_FOUND) {
            VBoxError {
                kind: VBoxErrorKind::MachineNotFound,
                ..err
            }
        } else {
            VBoxError {
                kind: VBoxErrorKind::HypervisorCallFailed,
                ..err
            }
        }
    }

    fn ensure_accessible(machine: &MachineInfo) -> VBoxResult<()> {
        if machine.accessible {
            Ok(())
        } else {
            Err(VBoxError::new(
                VBoxErrorKind::InvalidMachineState,
                format!("VM '{}' is not accessible", machine.name),
            ))
        }
    }

    async fn lock<M: LockMode>(
        api: &dyn VirtualBoxApi,
        machine: &MachineInfo,
    ) -> VBoxResult<Session<M>> {
        debug!("Locking '{}' ({:?})", machine.name, M::LOCK);
        let inner = api
            .lock_machine(&machine.id, M::LOCK)
            .await
            .map_err(|e| Self::classify_lock_error(&machine.name, e))?;
        Ok(Session::new(&machine.name, inner))
    }
}

fn mentions_existing_lock(message: &str) -> bool {
    let m = message.to_ascii_lowercase();
    m.contains("already locked") || m.contains("is locked for a session")
}
