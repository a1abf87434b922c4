// =============================================================================
// APRK SFW - 16550 UART Driver
// =============================================================================
// Driver for the Designware 16550-compatible UART found on the sun50i SoC.
// Output is polled; the secure world never takes UART interrupts.
//
// Registers sit on a 32-bit APB bus, so every offset is word-aligned even
// though the classic 16550 map is byte-oriented.
// =============================================================================

use core::ptr;

// =============================================================================
// 16550 Register Definitions
// =============================================================================

/// UART Register Offsets from base address
mod regs {
    /// Transmit Holding Register (write)
    pub const THR: usize = 0x00;

    /// Divisor Latch Low byte (when LCR.DLAB is set)
    pub const DLL: usize = 0x00;

    /// Interrupt Enable Register
    pub const IER: usize = 0x04;

    /// Divisor Latch High byte (when LCR.DLAB is set)
    pub const DLH: usize = 0x04;

    /// FIFO Control Register
    pub const FCR: usize = 0x08;

    /// Line Control Register
    pub const LCR: usize = 0x0c;

    /// Modem Control Register
    pub const MCR: usize = 0x10;

    /// Line Status Register
    pub const LSR: usize = 0x14;
}

/// Line Control Register bits
mod lcr {
    /// Divisor latch access
    pub const DLAB: u32 = 1 << 7;

    /// Word length: 8 bits, no parity, one stop bit
    pub const WLEN_8: u32 = 0b11;
}

/// FIFO Control Register bits
mod fcr {
    /// Enable FIFOs
    pub const FIFO_EN: u32 = 1 << 0;

    /// Reset the receive FIFO
    pub const RX_RESET: u32 = 1 << 1;

    /// Reset the transmit FIFO
    pub const TX_RESET: u32 = 1 << 2;
}

/// Modem Control Register bits
mod mcr {
    /// Data terminal ready
    pub const DTR: u32 = 1 << 0;

    /// Request to send
    pub const RTS: u32 = 1 << 1;
}

/// Line Status Register bits
mod lsr {
    /// Transmit holding register empty
    pub const THRE: u32 = 1 << 5;

    /// Transmitter empty, including the shift register
    pub const TEMT: u32 = 1 << 6;
}

/// Baud divisor for a 16x oversampling 16550.
pub const fn divisor(clock_hz: u32, baudrate: u32) -> u32 {
    clock_hz / (16 * baudrate)
}

// =============================================================================
// UART Driver Implementation
// =============================================================================

/// 16550 UART driver
pub struct Uart {
    base: usize,
}

impl Uart {
    /// Create a new UART driver instance.
    ///
    /// # Arguments
    /// * `base` - Base address of the UART registers
    ///
    /// # Safety
    /// The caller must ensure the base address points to valid UART hardware.
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    /// Read a register at the given offset
    fn read_reg(&self, offset: usize) -> u32 {
        let addr = (self.base + offset) as *const u32;
        // SAFETY: We trust that self.base points to valid UART registers
        unsafe { ptr::read_volatile(addr) }
    }

    /// Write a value to a register at the given offset
    fn write_reg(&self, offset: usize, value: u32) {
        let addr = (self.base + offset) as *mut u32;
        // SAFETY: We trust that self.base points to valid UART registers
        unsafe { ptr::write_volatile(addr, value) }
    }

    /// Initialize the UART for polled 8-N-1 operation.
    ///
    /// Programs the divisor latch from the input clock and requested baud
    /// rate, so this must run again whenever the UART block lost power.
    pub fn init(&self, clock_hz: u32, baudrate: u32) {
        let div = divisor(clock_hz, baudrate);

        // No interrupts; the transmit path below polls LSR.
        self.write_reg(regs::IER, 0);

        self.write_reg(regs::FCR, fcr::FIFO_EN | fcr::RX_RESET | fcr::TX_RESET);

        self.write_reg(regs::LCR, lcr::DLAB);
        self.write_reg(regs::DLL, div & 0xff);
        self.write_reg(regs::DLH, (div >> 8) & 0xff);
        self.write_reg(regs::LCR, lcr::WLEN_8);

        self.write_reg(regs::MCR, mcr::DTR | mcr::RTS);
    }

    /// Transmit a single byte.
    ///
    /// Blocks until the transmit holding register has space.
    pub fn putc(&self, c: u8) {
        while self.read_reg(regs::LSR) & lsr::THRE == 0 {
            core::hint::spin_loop();
        }

        self.write_reg(regs::THR, c as u32);
    }

    /// Transmit a string.
    pub fn puts(&self, s: &str) {
        for byte in s.bytes() {
            // Convert newlines to CRLF for proper terminal output
            if byte == b'\n' {
                self.putc(b'\r');
            }
            self.putc(byte);
        }
    }

    /// Wait until every queued byte has left the shift register.
    pub fn flush(&self) {
        while self.read_reg(regs::LSR) & lsr::TEMT == 0 {
            core::hint::spin_loop();
        }
    }

    /// Drain the transmitter and quiesce the device.
    ///
    /// Called ahead of power transitions that may drop the UART rail.
    pub fn disable(&self) {
        self.flush();
        self.write_reg(regs::IER, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::divisor;

    #[test]
    fn divisor_for_the_platform_console() {
        // 24 MHz input clock at 115200 baud.
        assert_eq!(divisor(24_000_000, 115_200), 13);
    }

    #[test]
    fn divisor_truncates_toward_zero() {
        assert_eq!(divisor(1_843_200, 9_600), 12);
        assert_eq!(divisor(24_000_000, 9_600), 156);
    }
}
