// =============================================================================
// APRK SFW - Hardware Seams
// =============================================================================
// Traits the power coordinator drives its collaborators through, plus the
// bindings to the real sun50i devices. Tests substitute recording fakes for
// the same traits.
// =============================================================================

use aprk_arch_arm64::cpu::{self, Scr};
use aprk_arch_arm64::gic::Gic;

use crate::config;
use crate::console;
use crate::soc;

/// Core-local control: exception routing, barriers and low-power waits.
pub trait CoreCtl {
    fn read_scr(&self) -> Scr;
    fn write_scr(&self, scr: Scr);
    fn isb(&self);
    fn dsb(&self);
    fn wfi(&self);
    /// Join the coherency domain; must precede cache enablement.
    fn enable_smp(&self);
}

/// Interrupt-controller operations, split the way the transitions use them.
pub trait GicOps {
    /// Arm the calling core's CPU interface.
    fn cpuif_setup(&self);
    /// Disarm the calling core's CPU interface.
    fn cpuif_deactivate(&self);
    /// Banked per-core distributor state (SGIs and PPIs).
    fn pcpu_distif_setup(&self);
    /// Global distributor re-init after shared peripherals lost power.
    fn distif_setup(&self);
}

/// Console bring-up and tear-down around deep power states.
pub trait ConsoleOps {
    fn init(&self);
    fn exit(&self);
}

/// SoC power-control block: rails, resets and resume vectors.
pub trait SocOps {
    /// Record where a core re-enters the secure world when it next resets.
    fn set_secondary_entry(&self, entry: u64, core: u32);
    fn cpu_power_up(&self, cluster: u32, core: u32);
    fn cpu_power_down(&self, cluster: u32, core: u32);
    /// Request a supply change; a negative return means the request was not
    /// taken.
    fn set_cpu_voltage(&self, millivolts: i32) -> i32;
    /// Raw word write, used for value-triggered reset hardware.
    fn mmio_write32(&self, addr: usize, value: u32);
}

// =============================================================================
// sun50i Device Bindings
// =============================================================================

/// EL3 system-register access on the live core.
pub struct Sun50iCpu;

impl CoreCtl for Sun50iCpu {
    fn read_scr(&self) -> Scr {
        cpu::read_scr()
    }

    fn write_scr(&self, scr: Scr) {
        cpu::write_scr(scr)
    }

    fn isb(&self) {
        cpu::isb()
    }

    fn dsb(&self) {
        cpu::dsb()
    }

    fn wfi(&self) {
        cpu::wfi()
    }

    fn enable_smp(&self) {
        cpu::enable_smp()
    }
}

/// The GICv2 at its sun50i addresses.
pub struct Sun50iGic {
    gic: Gic,
}

impl Sun50iGic {
    pub const fn new() -> Self {
        Self {
            gic: Gic::new(config::GICD_BASE, config::GICC_BASE),
        }
    }
}

impl GicOps for Sun50iGic {
    fn cpuif_setup(&self) {
        self.gic.cpuif_setup()
    }

    fn cpuif_deactivate(&self) {
        self.gic.cpuif_deactivate()
    }

    fn pcpu_distif_setup(&self) {
        self.gic.pcpu_distif_setup()
    }

    fn distif_setup(&self) {
        self.gic.distif_setup()
    }
}

/// The locked platform console.
pub struct Sun50iConsole;

impl ConsoleOps for Sun50iConsole {
    fn init(&self) {
        console::init()
    }

    fn exit(&self) {
        console::exit()
    }
}

/// The sun50i CPU configuration and power-control blocks.
pub struct Sun50iSoc;

impl SocOps for Sun50iSoc {
    fn set_secondary_entry(&self, entry: u64, core: u32) {
        soc::set_secondary_entry(entry, core)
    }

    fn cpu_power_up(&self, cluster: u32, core: u32) {
        soc::cpu_power_up(cluster, core)
    }

    fn cpu_power_down(&self, cluster: u32, core: u32) {
        soc::cpu_power_down(cluster, core)
    }

    fn set_cpu_voltage(&self, millivolts: i32) -> i32 {
        soc::set_cpu_voltage(millivolts)
    }

    fn mmio_write32(&self, addr: usize, value: u32) {
        soc::mmio_write32(addr, value)
    }
}
