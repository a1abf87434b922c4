// =============================================================================
// APRK SFW - Secure Console
// =============================================================================
// Polled UART0 console shared by all cores. Serialization uses the bakery
// lock rather than a spinlock because cores reach this code with their data
// caches off during power transitions; the lock's backing store therefore
// lives in the coherent memory window.
// =============================================================================

use core::fmt::{self, Write};

use aprk_arch_arm64::cpu;
use aprk_arch_arm64::uart::Uart;

use crate::config;
use crate::lock::BakeryLock;
use crate::topology;

static UART: Uart = Uart::new(config::UART0_BASE);

#[cfg_attr(target_arch = "aarch64", link_section = "tzfw_coherent_mem")]
static CONSOLE_LOCK: BakeryLock = BakeryLock::new();

/// Reset the console lock slots.
///
/// Runs once at platform setup, before secondaries exist.
pub fn init_lock() {
    CONSOLE_LOCK.init();
}

/// Bring the UART (back) up at the platform baud rate.
///
/// Also called on the resume path after a deep suspend cut power to the
/// UART block.
pub fn init() {
    UART.init(config::UART0_CLK_IN_HZ, config::UART0_BAUDRATE);
}

/// Drain pending output and quiesce the UART ahead of a power-down.
pub fn exit() {
    UART.disable();
}

/// Writer that holds the console lock for the duration of one format call.
struct LockedWriter;

impl Write for LockedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        UART.puts(s);
        Ok(())
    }
}

/// Print a formatted string to the console.
pub fn _print(args: fmt::Arguments) {
    let slot = topology::linear_index(cpu::mpidr());
    CONSOLE_LOCK.lock(slot);
    LockedWriter.write_fmt(args).unwrap();
    CONSOLE_LOCK.unlock(slot);
}

// =============================================================================
// Print Macros
// =============================================================================

/// Print to the secure console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!($($arg)*))
    };
}

/// Print to the secure console with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}
