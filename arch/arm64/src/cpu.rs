// =============================================================================
// APRK SFW - EL3 CPU Control
// =============================================================================
// ARM64 system-register access, barriers and low-power primitives used by
// the power-state handlers. Everything here acts on the calling core only.
// =============================================================================

use bitflags::bitflags;

bitflags! {
    /// SCR_EL3 (Secure Configuration Register) bits.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Scr: u64 {
        /// Exception levels below EL3 run non-secure.
        const NS = 1 << 0;
        /// Route physical IRQs to EL3.
        const IRQ = 1 << 1;
        /// Route physical FIQs to EL3.
        const FIQ = 1 << 2;
        /// Route external aborts and SErrors to EL3.
        const EA = 1 << 3;
        /// Disable the SMC instruction below EL3.
        const SMD = 1 << 7;
        /// Enable the HVC instruction.
        const HCE = 1 << 8;
        /// Secure-world instruction fetch from non-secure memory faults.
        const SIF = 1 << 9;
        /// The next lower exception level is AArch64.
        const RW = 1 << 10;
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use super::Scr;

    /// Read SCR_EL3.
    #[inline(always)]
    pub fn read_scr() -> Scr {
        let raw: u64;
        unsafe {
            core::arch::asm!("mrs {}, scr_el3", out(reg) raw);
        }
        Scr::from_bits_retain(raw)
    }

    /// Write SCR_EL3. The new routing takes effect after an `isb`.
    #[inline(always)]
    pub fn write_scr(scr: Scr) {
        unsafe {
            core::arch::asm!("msr scr_el3, {}", in(reg) scr.bits());
        }
    }

    /// Instruction synchronization barrier.
    #[inline(always)]
    pub fn isb() {
        unsafe {
            core::arch::asm!("isb");
        }
    }

    /// Full-system data synchronization barrier.
    #[inline(always)]
    pub fn dsb() {
        unsafe {
            core::arch::asm!("dsb sy");
        }
    }

    /// Full-system data memory barrier.
    #[inline(always)]
    pub fn dmb() {
        unsafe {
            core::arch::asm!("dmb sy");
        }
    }

    /// Wait for an interrupt. The core sleeps until a wakeup event fires.
    #[inline(always)]
    pub fn wfi() {
        unsafe {
            core::arch::asm!("wfi");
        }
    }

    /// Read MPIDR_EL1, the topology address of the calling core.
    #[inline(always)]
    pub fn mpidr() -> u64 {
        let mpidr: u64;
        unsafe {
            core::arch::asm!("mrs {}, mpidr_el1", out(reg) mpidr);
        }
        mpidr
    }

    /// Get the current exception level (0-3).
    #[inline(always)]
    pub fn current_el() -> u8 {
        let el: u64;
        unsafe {
            core::arch::asm!("mrs {}, CurrentEL", out(reg) el);
        }
        ((el >> 2) & 0x3) as u8
    }

    /// Set CPUECTLR_EL1.SMPEN, marking this core as present in the
    /// coherency domain.
    ///
    /// Must run on a freshly powered core before its caches are enabled.
    #[inline(always)]
    pub fn enable_smp() {
        unsafe {
            core::arch::asm!(
                "mrs {tmp}, s3_1_c15_c2_1",
                "orr {tmp}, {tmp}, #0x40",
                "msr s3_1_c15_c2_1, {tmp}",
                "isb",
                tmp = out(reg) _,
            );
        }
    }

    /// Park the core in a low-power state. Never returns.
    #[inline(always)]
    pub fn halt() -> ! {
        loop {
            unsafe {
                core::arch::asm!("wfe");
            }
        }
    }
}

// Hosted builds (unit tests) compile against these stand-ins; nothing in
// this module runs off target.
#[cfg(not(target_arch = "aarch64"))]
mod imp {
    use super::Scr;

    pub fn read_scr() -> Scr {
        Scr::empty()
    }

    pub fn write_scr(_scr: Scr) {}

    pub fn isb() {}

    pub fn dsb() {}

    pub fn dmb() {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    pub fn wfi() {}

    pub fn mpidr() -> u64 {
        0
    }

    pub fn current_el() -> u8 {
        0
    }

    pub fn enable_smp() {}

    pub fn halt() -> ! {
        loop {
            core::hint::spin_loop();
        }
    }
}

pub use imp::*;
