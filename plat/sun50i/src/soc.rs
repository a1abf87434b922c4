// =============================================================================
// APRK SFW - sun50i CPU Power Sequencing
// =============================================================================
// Drives the CPU configuration block and the PRCM power controller. These
// registers gate resets, output clamps and the power switches of each core,
// and hold the reset vector secondaries fetch on release.
// =============================================================================

use core::ptr;

// =============================================================================
// Register Maps
// =============================================================================

/// Register addresses across CPUCFG, R_PRCM and R_CPUCFG
mod regs {
    use crate::config::{CPUCFG_BASE, R_CPUCFG_BASE, R_PRCM_BASE};

    /// Cluster control register 0, holds the per-core AArch64 select bits
    pub const fn cls_ctrl_reg0(cluster: u32) -> usize {
        CPUCFG_BASE + 0x10 * cluster as usize
    }

    /// Debug power-up request register
    pub const DBG_REG0: usize = CPUCFG_BASE + 0x20;

    /// Per-cluster core reset control
    pub const fn rst_ctrl_reg(cluster: u32) -> usize {
        CPUCFG_BASE + 0x80 + 4 * cluster as usize
    }

    /// Reset vector base address, low word
    pub const fn rvbar_lo_reg(core: u32) -> usize {
        CPUCFG_BASE + 0xa0 + 8 * core as usize
    }

    /// Reset vector base address, high word
    pub const fn rvbar_hi_reg(core: u32) -> usize {
        CPUCFG_BASE + 0xa4 + 8 * core as usize
    }

    /// Per-cluster output clamp gating
    pub const fn poweroff_gating_reg(cluster: u32) -> usize {
        R_PRCM_BASE + 0x100 + 4 * cluster as usize
    }

    /// Per-core power switch clamp
    pub const fn power_clamp_reg(cluster: u32, core: u32) -> usize {
        R_PRCM_BASE + 0x140 + 0x10 * cluster as usize + 4 * core as usize
    }

    /// Per-cluster core power-on reset
    pub const fn poweron_rst_reg(cluster: u32) -> usize {
        R_CPUCFG_BASE + 0x30 + 4 * cluster as usize
    }
}

/// Clamp values opening the power switch in steps, widest resistance first.
const POWER_CLAMP_RELEASE: [u32; 5] = [0xfe, 0xf8, 0xe0, 0x80, 0x00];

/// Clamp value with the power switch fully closed.
const POWER_CLAMP_OFF: u32 = 0xff;

/// First AArch64 select bit in cluster control register 0.
const CLS_CTRL_AA64_SHIFT: u32 = 24;

// =============================================================================
// MMIO Accessors
// =============================================================================

fn read32(addr: usize) -> u32 {
    // SAFETY: We trust that addr names a valid device register
    unsafe { ptr::read_volatile(addr as *const u32) }
}

/// Write a 32-bit device register.
pub fn mmio_write32(addr: usize, value: u32) {
    // SAFETY: We trust that addr names a valid device register
    unsafe { ptr::write_volatile(addr as *mut u32, value) }
}

fn setbits32(addr: usize, bits: u32) {
    mmio_write32(addr, read32(addr) | bits);
}

fn clrbits32(addr: usize, bits: u32) {
    mmio_write32(addr, read32(addr) & !bits);
}

// =============================================================================
// Core Power Sequencing
// =============================================================================

/// Latch the address a powered-on core starts fetching from.
pub fn set_secondary_entry(entry: u64, core: u32) {
    mmio_write32(regs::rvbar_lo_reg(core), entry as u32);
    mmio_write32(regs::rvbar_hi_reg(core), (entry >> 32) as u32);
}

/// Walk the power switch of one core open.
fn enable_power(cluster: u32, core: u32) {
    if read32(regs::power_clamp_reg(cluster, core)) == 0 {
        return;
    }
    for step in POWER_CLAMP_RELEASE {
        mmio_write32(regs::power_clamp_reg(cluster, core), step);
    }
}

/// Close the power switch of one core.
fn disable_power(cluster: u32, core: u32) {
    if read32(regs::power_clamp_reg(cluster, core)) == POWER_CLAMP_OFF {
        return;
    }
    mmio_write32(regs::power_clamp_reg(cluster, core), POWER_CLAMP_OFF);
}

/// Power a core up and release it into reset fetch.
///
/// The core must be held in reset before its rail energizes, and the output
/// clamps open only between those two steps.
pub fn cpu_power_up(cluster: u32, core: u32) {
    clrbits32(regs::rst_ctrl_reg(cluster), 1 << core);
    clrbits32(regs::poweron_rst_reg(cluster), 1 << core);
    setbits32(regs::cls_ctrl_reg0(cluster), 1 << (CLS_CTRL_AA64_SHIFT + core));
    enable_power(cluster, core);
    clrbits32(regs::poweroff_gating_reg(cluster), 1 << core);
    setbits32(regs::poweron_rst_reg(cluster), 1 << core);
    setbits32(regs::rst_ctrl_reg(cluster), 1 << core);
    setbits32(regs::DBG_REG0, 1 << core);
}

/// Clamp a core's outputs and drop its rail.
///
/// The caller has already parked the core; reversing the power-up order
/// keeps the fabric from seeing glitches off a dying core.
pub fn cpu_power_down(cluster: u32, core: u32) {
    clrbits32(regs::DBG_REG0, 1 << core);
    setbits32(regs::poweroff_gating_reg(cluster), 1 << core);
    clrbits32(regs::poweron_rst_reg(cluster), 1 << core);
    disable_power(cluster, core);
}

/// Request a CPU rail voltage change, in millivolts; negative cuts the rail.
///
/// Rail control lives on the management co-processor and this firmware
/// carries no RSB channel to the PMIC, so the request always fails.
pub fn set_cpu_voltage(_millivolts: i32) -> i32 {
    -1
}
