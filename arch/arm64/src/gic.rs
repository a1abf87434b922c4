// =============================================================================
// APRK SFW - ARM Generic Interrupt Controller (GICv2)
// =============================================================================
// Driver for the GICv2 interrupt controller, split the way the power
// transitions need it:
// - Distributor: global SPI routing, rebuilt after a deep suspend.
// - CPU Interface: armed on power-up, disarmed before a rail drops.
//
// All shared peripheral interrupts route to the non-secure group on this
// platform; the secure world keeps only the FIQ path for itself.
// =============================================================================

use core::ptr;

// Distributor register offsets
mod gicd {
    pub const CTLR: usize = 0x000;
    pub const TYPER: usize = 0x004;
    pub const IGROUPR: usize = 0x080;
    pub const IPRIORITYR: usize = 0x400;
}

// CPU interface register offsets
mod gicc {
    pub const CTLR: usize = 0x0000;
    pub const PMR: usize = 0x0004;
}

// Control-register bits, shared layout between the secure views of
// GICD_CTLR (enables only) and GICC_CTLR.
mod ctlr {
    pub const ENABLE_GRP0: u32 = 1 << 0;
    pub const ENABLE_GRP1: u32 = 1 << 1;
    pub const FIQ_EN: u32 = 1 << 3;
    pub const FIQ_BYP_DIS_GRP0: u32 = 1 << 5;
    pub const IRQ_BYP_DIS_GRP0: u32 = 1 << 6;
    pub const FIQ_BYP_DIS_GRP1: u32 = 1 << 7;
    pub const IRQ_BYP_DIS_GRP1: u32 = 1 << 8;
}

/// First shared peripheral interrupt ID; everything below is banked per core.
const MIN_SPI_ID: u32 = 32;

/// Priority mask that lets every priority through.
const GIC_PRI_MASK: u32 = 0xff;

/// Default priority for four interrupts at a time.
const PRI_DEFAULT_QUAD: u32 = 0xa0a0_a0a0;

const TYPER_IT_LINES_MASK: u32 = 0x1f;

/// One interrupt ID past the last SPI the distributor implements.
fn spi_limit(typer: u32) -> u32 {
    ((typer & TYPER_IT_LINES_MASK) + 1) << 5
}

/// GICv2 driver instance over one distributor/CPU-interface pair.
pub struct Gic {
    gicd: usize,
    gicc: usize,
}

impl Gic {
    /// Create a new GIC driver instance.
    ///
    /// # Safety
    /// The caller must ensure both base addresses point to the GICv2
    /// register banks of this SoC.
    pub const fn new(gicd: usize, gicc: usize) -> Self {
        Self { gicd, gicc }
    }

    fn read_gicd(&self, offset: usize) -> u32 {
        // SAFETY: We trust that self.gicd points to the distributor bank
        unsafe { ptr::read_volatile((self.gicd + offset) as *const u32) }
    }

    fn write_gicd(&self, offset: usize, value: u32) {
        // SAFETY: We trust that self.gicd points to the distributor bank
        unsafe { ptr::write_volatile((self.gicd + offset) as *mut u32, value) }
    }

    fn read_gicc(&self, offset: usize) -> u32 {
        // SAFETY: We trust that self.gicc points to the CPU interface bank
        unsafe { ptr::read_volatile((self.gicc + offset) as *const u32) }
    }

    fn write_gicc(&self, offset: usize, value: u32) {
        // SAFETY: We trust that self.gicc points to the CPU interface bank
        unsafe { ptr::write_volatile((self.gicc + offset) as *mut u32, value) }
    }

    /// Arm the calling core's CPU interface.
    ///
    /// Opens the priority mask and enables secure-group forwarding with
    /// FIQs routed to the secure world and the bypass paths closed. The
    /// non-secure world enables its own group once it runs.
    pub fn cpuif_setup(&self) {
        self.write_gicc(gicc::PMR, GIC_PRI_MASK);

        let val = ctlr::ENABLE_GRP0
            | ctlr::FIQ_EN
            | ctlr::FIQ_BYP_DIS_GRP0
            | ctlr::IRQ_BYP_DIS_GRP0
            | ctlr::FIQ_BYP_DIS_GRP1
            | ctlr::IRQ_BYP_DIS_GRP1;
        self.write_gicc(gicc::CTLR, val);
    }

    /// Disarm the calling core's CPU interface.
    ///
    /// Runs right before the core's rail drops so that a pending interrupt
    /// cannot spuriously wake it.
    pub fn cpuif_deactivate(&self) {
        let mut val = self.read_gicc(gicc::CTLR);
        val &= !(ctlr::ENABLE_GRP0 | ctlr::ENABLE_GRP1);
        val |= ctlr::FIQ_BYP_DIS_GRP0
            | ctlr::IRQ_BYP_DIS_GRP0
            | ctlr::FIQ_BYP_DIS_GRP1
            | ctlr::IRQ_BYP_DIS_GRP1;
        self.write_gicc(gicc::CTLR, val);
    }

    /// Configure the banked per-core distributor state.
    ///
    /// SGIs and PPIs all belong to the non-secure group on this SoC and
    /// start at the default priority.
    pub fn pcpu_distif_setup(&self) {
        self.write_gicd(gicd::IGROUPR, !0);

        for irq in (0..MIN_SPI_ID).step_by(4) {
            self.write_gicd(gicd::IPRIORITYR + irq as usize, PRI_DEFAULT_QUAD);
        }
    }

    /// Rebuild the global distributor state from scratch.
    ///
    /// Used after a deep suspend may have powered the distributor down:
    /// quiesce it, hand every SPI to the non-secure group at the default
    /// priority, redo the banked setup, then re-enable secure forwarding.
    pub fn distif_setup(&self) {
        let enables = self.read_gicd(gicd::CTLR) & !(ctlr::ENABLE_GRP0 | ctlr::ENABLE_GRP1);
        self.write_gicd(gicd::CTLR, enables);

        let limit = spi_limit(self.read_gicd(gicd::TYPER));
        for irq in (MIN_SPI_ID..limit).step_by(32) {
            self.write_gicd(gicd::IGROUPR + (irq as usize / 32) * 4, !0);
        }
        for irq in (MIN_SPI_ID..limit).step_by(4) {
            self.write_gicd(gicd::IPRIORITYR + irq as usize, PRI_DEFAULT_QUAD);
        }

        self.pcpu_distif_setup();

        self.write_gicd(gicd::CTLR, enables | ctlr::ENABLE_GRP0);
    }
}
