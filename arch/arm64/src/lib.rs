// =============================================================================
// APRK SFW - ARM64 Architecture Module
// =============================================================================
// This module contains all ARM64-specific code:
// - EL3 CPU control (SCR_EL3, barriers, low-power waits)
// - GICv2 interrupt controller driver
// - 16550 UART driver for console output
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod cpu;
pub mod gic;
pub mod uart;
