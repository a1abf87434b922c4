// =============================================================================
// APRK SFW - sun50i Platform Configuration
// =============================================================================
// Fixed properties of the SoC: topology limits, peripheral addresses and the
// register values terminal handlers write. Everything here is compile-time.
// =============================================================================

// Topology: one cluster of four Cortex-A53 cores.
pub const PLATFORM_CLUSTER_COUNT: usize = 1;
pub const PLATFORM_MAX_CPUS_PER_CLUSTER: usize = 4;
pub const PLATFORM_CORE_COUNT: usize = PLATFORM_CLUSTER_COUNT * PLATFORM_MAX_CPUS_PER_CLUSTER;

/// Deepest affinity level a transition may name.
pub const MAX_AFFLVL: u32 = 2;

// GICv2 register banks
pub const GICD_BASE: usize = 0x01c8_1000;
pub const GICC_BASE: usize = 0x01c8_2000;

// Console UART
pub const UART0_BASE: usize = 0x01c2_8000;
pub const UART0_CLK_IN_HZ: u32 = 24_000_000;
pub const UART0_BAUDRATE: u32 = 115_200;

// CPU configuration and power-management blocks
pub const CPUCFG_BASE: usize = 0x0170_0000;
pub const R_PRCM_BASE: usize = 0x01f0_1400;
pub const R_CPUCFG_BASE: usize = 0x01f0_1c00;

/// Supply request that shuts the CPU rail down entirely.
pub const VOLTAGE_SHUTDOWN: i32 = -1;

/// Watchdog writes forcing a whole-SoC reset, in issue order:
/// configure a full-system reset, enable the dog, then restart it with the
/// key in the upper bits.
pub const WDOG_RESET_SEQUENCE: [(usize, u32); 3] = [
    (0x01c2_0cb4, 0x1),
    (0x01c2_0cb8, 0x1),
    (0x01c2_0cb0, (0xa57 << 1) | 0x1),
];
