//! # SortOfRemote NG – VirtualBox Management
//!
//! Mediation layer between a command shell and a VirtualBox management API.
//! Every operation takes primitive string / boolean arguments and returns a
//! normalized result envelope (`OK` / `WARN` / `ERR`) or, for inspection, a
//! structured record. Provides:
//!
//! - **VM Lifecycle** – list, create, start (headless or GUI), stop (ACPI or
//!   forced), delete with or without disks, CPU / memory / VRDE changes
//! - **Storage** – disk creation and attachment, ISO attachment, with
//!   on-demand SATA / IDE controllers and occupied-slot detection
//! - **Networking** – NAT, bridged, host-only and NAT-network adapters
//! - **Display** – VRAM, monitors, 2D / 3D acceleration, graphics controller
//! - **Guest Integration** – shared folders, mouse, clipboard, drag and drop
//! - **Unattended Install** – Linux and Windows guest installation from ISO
//! - **Inspection** – read-only machine records with normalized enum codes
//!
//! The management API is injected as `Arc<dyn VirtualBoxApi>`; configuration
//! changes run under a write-locked session that is always released.

pub mod types;
pub mod error;
pub mod input;
pub mod envelope;
pub mod enums;
pub mod api;
pub mod progress;
pub mod session;
pub mod vm;
pub mod storage;
pub mod network;
pub mod display;
pub mod integration;
pub mod unattended;
pub mod inspect;
pub mod service;
#[cfg(feature = "tauri-commands")]
pub mod commands;

#[cfg(test)]
pub(crate) mod testing;
