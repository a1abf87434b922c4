// =============================================================================
// APRK SFW - sun50i Platform Power Management
// =============================================================================
// Secure-world power management for the Allwinner sun50i SoC: the PSCI
// transition handler table plus the console, interrupt controller and CPU
// power sequencing it drives.
//
// SPDX-License-Identifier: GPL-2.0
// Copyright (c) 2025 APRK
// =============================================================================

#![cfg_attr(not(test), no_std)]

use aprk_arch_arm64::cpu;
use spin::Once;

pub mod config;
pub mod console;
pub mod hal;
pub mod lock;
pub mod logger;
pub mod power;
pub mod psci;
pub mod soc;
pub mod topology;

use hal::{Sun50iConsole, Sun50iCpu, Sun50iGic, Sun50iSoc};
use power::PowerController;

/// The handler table wired to the real sun50i devices.
pub type Sun50iPower<R> = PowerController<R, Sun50iCpu, Sun50iGic, Sun50iConsole, Sun50iSoc>;

static PM_SETUP: Once = Once::new();

/// Build the platform's power transition handler table.
///
/// Called by the PSCI runtime on the primary core during cold boot. The
/// console lock and logger come up exactly once even if the runtime asks
/// again.
pub fn setup_pm<R: psci::PsciRuntime>(runtime: R) -> Sun50iPower<R> {
    PM_SETUP.call_once(|| {
        console::init_lock();
        logger::init();
        log::info!("sun50i power handlers ready at EL{}", cpu::current_el());
    });

    Sun50iPower::new(runtime, Sun50iCpu, Sun50iGic::new(), Sun50iConsole, Sun50iSoc)
}

// =============================================================================
// Panic Handler
// =============================================================================

/// Panic handler for firmware panics.
///
/// A panic in a power handler means a broken contract with the PSCI
/// runtime. Nothing can be salvaged at that point; report and park.
#[cfg(all(target_arch = "aarch64", not(test)))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    crate::println!();
    crate::println!("!! FIRMWARE PANIC !!");

    if let Some(location) = info.location() {
        crate::println!(
            "Location: {}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        );
    }

    if let Some(message) = info.message().as_str() {
        crate::println!("Message: {}", message);
    } else {
        crate::println!("Message: {}", info.message());
    }

    cpu::halt();
}
