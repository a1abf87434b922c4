// =============================================================================
// APRK SFW - Bakery Lock
// =============================================================================
// Lamport bakery mutual exclusion over per-core slots. Built entirely from
// volatile loads and stores plus data barriers, so it stays correct while
// cache coherency between cores is not yet (or no longer) guaranteed, which
// is exactly the window the power transitions run in.
// =============================================================================

use core::cell::UnsafeCell;
use core::ptr;

use aprk_arch_arm64::cpu;

use crate::config::PLATFORM_CORE_COUNT;

const NO_OWNER: i32 = -1;

/// Ticket paired with its slot; lower slot wins a ticket tie.
const fn full_ticket(ticket: u32, slot: usize) -> u64 {
    ((ticket as u64) << 8) | slot as u64
}

/// One lock, one slot per core.
///
/// Callers identify themselves by slot index (the flat core index); the lock
/// never reads MPIDR itself so it can be exercised anywhere.
pub struct BakeryLock {
    owner: UnsafeCell<i32>,
    entering: UnsafeCell<[bool; PLATFORM_CORE_COUNT]>,
    number: UnsafeCell<[u32; PLATFORM_CORE_COUNT]>,
}

// SAFETY: all field access goes through volatile reads/writes and the bakery
// ordering protocol below.
unsafe impl Sync for BakeryLock {}

impl BakeryLock {
    pub const fn new() -> Self {
        Self {
            owner: UnsafeCell::new(NO_OWNER),
            entering: UnsafeCell::new([false; PLATFORM_CORE_COUNT]),
            number: UnsafeCell::new([0; PLATFORM_CORE_COUNT]),
        }
    }

    fn read_owner(&self) -> i32 {
        // SAFETY: in-bounds volatile read of a static cell
        unsafe { ptr::read_volatile(self.owner.get()) }
    }

    fn write_owner(&self, owner: i32) {
        // SAFETY: in-bounds volatile write of a static cell
        unsafe { ptr::write_volatile(self.owner.get(), owner) }
    }

    fn read_entering(&self, slot: usize) -> bool {
        // SAFETY: slot is checked against PLATFORM_CORE_COUNT by callers
        unsafe { ptr::read_volatile((self.entering.get() as *const bool).add(slot)) }
    }

    fn write_entering(&self, slot: usize, value: bool) {
        // SAFETY: slot is checked against PLATFORM_CORE_COUNT by callers
        unsafe { ptr::write_volatile((self.entering.get() as *mut bool).add(slot), value) }
    }

    fn read_number(&self, slot: usize) -> u32 {
        // SAFETY: slot is checked against PLATFORM_CORE_COUNT by callers
        unsafe { ptr::read_volatile((self.number.get() as *const u32).add(slot)) }
    }

    fn write_number(&self, slot: usize, value: u32) {
        // SAFETY: slot is checked against PLATFORM_CORE_COUNT by callers
        unsafe { ptr::write_volatile((self.number.get() as *mut u32).add(slot), value) }
    }

    /// Reset every slot.
    ///
    /// Runs once at platform setup, before any core can contend. Uses the
    /// same volatile stores as the lock itself so the zeroing lands in the
    /// backing memory and not in a cache line.
    pub fn init(&self) {
        self.write_owner(NO_OWNER);
        for slot in 0..PLATFORM_CORE_COUNT {
            self.write_entering(slot, false);
            self.write_number(slot, 0);
        }
        cpu::dmb();
    }

    /// Acquire the lock for the core occupying `slot`.
    ///
    /// Spins until every core that drew an earlier ticket has released.
    /// Must not be called again by a slot that already holds the lock.
    pub fn lock(&self, slot: usize) {
        assert!(slot < PLATFORM_CORE_COUNT, "bakery slot {slot} out of range");
        assert!(
            self.read_owner() != slot as i32,
            "bakery lock already held by slot {slot}"
        );

        // Draw a ticket one above every ticket currently visible.
        self.write_entering(slot, true);
        cpu::dmb();
        let mut ticket = 0;
        for other in 0..PLATFORM_CORE_COUNT {
            let theirs = self.read_number(other);
            if theirs > ticket {
                ticket = theirs;
            }
        }
        ticket += 1;
        self.write_number(slot, ticket);
        cpu::dmb();
        self.write_entering(slot, false);
        cpu::dmb();

        // Wait until no core with an earlier (ticket, slot) pair remains.
        let mine = full_ticket(ticket, slot);
        for other in 0..PLATFORM_CORE_COUNT {
            while self.read_entering(other) {
                core::hint::spin_loop();
            }
            loop {
                let theirs = self.read_number(other);
                if theirs == 0 || full_ticket(theirs, other) >= mine {
                    break;
                }
                core::hint::spin_loop();
            }
        }
        cpu::dmb();
        self.write_owner(slot as i32);
    }

    /// Release the lock held by `slot`.
    pub fn unlock(&self, slot: usize) {
        assert!(
            self.read_owner() == slot as i32,
            "bakery lock not held by slot {slot}"
        );

        // Stores made inside the critical section drain before the ticket
        // returns to the pool.
        cpu::dmb();
        self.write_owner(NO_OWNER);
        self.write_number(slot, 0);
    }
}
