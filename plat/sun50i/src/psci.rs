// =============================================================================
// APRK SFW - PSCI Platform Boundary
// =============================================================================
// Vocabulary shared with the generic power-state coordination runtime:
// result codes, per-level target states, the power_state field decode, the
// queries this platform makes of the runtime, and the handler table it
// exports back.
// =============================================================================

/// PSCI return codes, as they appear in the SMC result register.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum PsciError {
    NotSupported = -1,
    InvalidParams = -2,
    Denied = -3,
    AlreadyOn = -4,
    OnPending = -5,
    InternalFailure = -6,
    NotPresent = -7,
    Disabled = -8,
}

impl PsciError {
    /// The raw code handed back to the non-secure caller.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Target state of one affinity instance for one transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TargetState {
    /// The instance keeps running.
    Run,
    /// The instance idles with all state retained.
    Standby,
    /// The instance is physically powered off.
    Off,
}

const PSTATE_AFF_LVL_SHIFT: u32 = 24;
const PSTATE_AFF_LVL_MASK: u32 = 0x3;

/// Affinity level encoded in a raw PSCI power_state request value.
pub fn pstate_afflvl(power_state: u32) -> u32 {
    (power_state >> PSTATE_AFF_LVL_SHIFT) & PSTATE_AFF_LVL_MASK
}

/// Per-transition queries answered by the coordination runtime.
///
/// Both values are fixed by the runtime's bubbling pass before the first
/// per-level handler call of a transition and stay constant until its last.
pub trait PsciRuntime {
    /// Deepest affinity level that will physically power off in the current
    /// transition, or `None` when the runtime has not resolved one.
    fn max_phys_off_afflvl(&self) -> Option<u32>;

    /// Deepest affinity level any core is requesting to suspend in the
    /// current transition.
    fn suspend_afflvl(&self) -> u32;
}

/// The fixed transition-handler table this platform exports.
///
/// The runtime invokes one method per affected affinity level per
/// transition; levels that are not due report success without side effects.
pub trait PowerOps {
    /// Core-granular idle with all state retained.
    fn standby(&self, power_state: u32) -> Result<(), PsciError>;

    /// An affinity instance is about to power up from fully off.
    fn on(
        &self,
        mpidr: u64,
        sec_entrypoint: u64,
        afflvl: u32,
        state: TargetState,
    ) -> Result<(), PsciError>;

    /// An instance finished powering up and is running again.
    fn on_finish(&self, mpidr: u64, afflvl: u32, state: TargetState) -> Result<(), PsciError>;

    /// An instance is about to be turned off.
    fn off(&self, mpidr: u64, afflvl: u32, state: TargetState) -> Result<(), PsciError>;

    /// An instance is about to suspend; `sec_entrypoint` is where the
    /// secure world resumes when it wakes.
    fn suspend(
        &self,
        mpidr: u64,
        sec_entrypoint: u64,
        afflvl: u32,
        state: TargetState,
    ) -> Result<(), PsciError>;

    /// An instance finished resuming from suspend.
    fn suspend_finish(&self, mpidr: u64, afflvl: u32, state: TargetState)
        -> Result<(), PsciError>;

    /// Shut the whole system down. Never returns.
    fn system_off(&self) -> !;

    /// Hard-reset the whole system. Never returns.
    fn system_reset(&self) -> !;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pstate_decode_reads_bits_25_to_24() {
        assert_eq!(pstate_afflvl(0x0000_0000), 0);
        assert_eq!(pstate_afflvl(0x0100_0000), 1);
        assert_eq!(pstate_afflvl(0x0200_0000), 2);
    }

    #[test]
    fn pstate_decode_ignores_state_id_and_type() {
        assert_eq!(pstate_afflvl(0x0101_ffff), 1);
        assert_eq!(pstate_afflvl(0x0001_0001), 0);
    }

    #[test]
    fn error_codes_match_the_wire_values() {
        assert_eq!(PsciError::NotSupported.code(), -1);
        assert_eq!(PsciError::InvalidParams.code(), -2);
        assert_eq!(PsciError::Denied.code(), -3);
    }
}
