// =============================================================================
// APRK SFW - Power Transition Handlers
// =============================================================================
// Implements the per-affinity-level transition handlers the PSCI runtime
// drives. The runtime walks every affected level on each transition; these
// handlers defer all platform work until the walk reaches the deepest level
// that actually changes power state, then act once.
//
// CAUTION: on the down paths the caller has already disabled the data cache,
// and on the up paths it is still off. Nothing here may rely on coherent
// shared memory outside the console lock's coherent window.
// =============================================================================

use core::fmt;

use aprk_arch_arm64::cpu::Scr;

use crate::config;
use crate::hal::{ConsoleOps, CoreCtl, GicOps, SocOps};
use crate::psci::{pstate_afflvl, PowerOps, PsciError, PsciRuntime, TargetState};
use crate::topology;

// =============================================================================
// Contract Violations
// =============================================================================

/// A precondition the PSCI runtime must uphold did not hold.
///
/// Every variant is a firmware bug on one side of the handler boundary, so
/// the handlers treat them as fatal rather than returning an error the
/// normal world could retry.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContractViolation {
    /// The walk visited an affinity level the topology does not have.
    AfflvlOutOfRange(u32),

    /// A level reached the off state but no deepest-off level is recorded.
    NoOffLevel,

    /// The recorded suspend level sits below the level powering off.
    SuspendBelowOff { suspend: u32, off: u32 },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AfflvlOutOfRange(afflvl) => {
                write!(f, "affinity level {afflvl} above maximum {}", config::MAX_AFFLVL)
            }
            Self::NoOffLevel => write!(f, "no affinity level is powering off"),
            Self::SuspendBelowOff { suspend, off } => {
                write!(f, "suspend level {suspend} below off level {off}")
            }
        }
    }
}

// =============================================================================
// Power Controller
// =============================================================================

/// The platform's transition handlers, generic over the devices they drive.
///
/// The type parameters carry the runtime's bookkeeping and the CPU, GIC,
/// console and SoC power blocks; production wires in the real devices and
/// the tests substitute recorders.
pub struct PowerController<R, C, G, N, S> {
    runtime: R,
    cpu: C,
    gic: G,
    console: N,
    soc: S,
}

impl<R, C, G, N, S> PowerController<R, C, G, N, S>
where
    R: PsciRuntime,
    C: CoreCtl,
    G: GicOps,
    N: ConsoleOps,
    S: SocOps,
{
    pub const fn new(runtime: R, cpu: C, gic: G, console: N, soc: S) -> Self {
        Self { runtime, cpu, gic, console, soc }
    }

    /// Decide whether this visit of the transition walk does platform work.
    ///
    /// Work belongs to exactly one visit: the one at the deepest affinity
    /// level going off. Every other visit reports not due. Levels that stay
    /// on are never due regardless of depth.
    fn actions_required(&self, afflvl: u32, state: TargetState) -> Result<bool, ContractViolation> {
        if afflvl > config::MAX_AFFLVL {
            return Err(ContractViolation::AfflvlOutOfRange(afflvl));
        }
        if state != TargetState::Off {
            return Ok(false);
        }

        let off = self
            .runtime
            .max_phys_off_afflvl()
            .ok_or(ContractViolation::NoOffLevel)?;
        let suspend = self.runtime.suspend_afflvl();
        if suspend < off {
            return Err(ContractViolation::SuspendBelowOff { suspend, off });
        }

        Ok(afflvl == off)
    }

    fn gate(&self, afflvl: u32, state: TargetState) -> bool {
        match self.actions_required(afflvl, state) {
            Ok(due) => due,
            Err(violation) => {
                log::error!("power contract violated: {violation}");
                panic!("power contract violated: {violation}")
            }
        }
    }

    /// Shared tail of the off and suspend paths.
    ///
    /// A pending interrupt must not wake the core after the rail drops, so
    /// the CPU interface detaches before the power sequencing starts. A
    /// nonzero `sec_entrypoint` is latched as the core's reset vector for
    /// the eventual wakeup.
    fn power_down_common(&self, mpidr: u64, sec_entrypoint: u64) {
        self.gic.cpuif_deactivate();

        let (cluster, core) = topology::split(mpidr);
        if sec_entrypoint != 0 {
            self.soc.set_secondary_entry(sec_entrypoint, core);
        }
        self.soc.cpu_power_down(cluster, core);
    }

    /// Shared tail of the on-finish and suspend-finish paths.
    ///
    /// The SMP bit must be set before the caller re-enables the caches, so
    /// it comes first. Then the core rejoins the interrupt fabric.
    fn finish_core_bringup(&self) {
        self.cpu.enable_smp();
        self.gic.cpuif_setup();
        self.gic.pcpu_distif_setup();
    }
}

impl<R, C, G, N, S> PowerOps for PowerController<R, C, G, N, S>
where
    R: PsciRuntime,
    C: CoreCtl,
    G: GicOps,
    N: ConsoleOps,
    S: SocOps,
{
    /// Idle the calling core until an interrupt, retaining all state.
    ///
    /// Interrupts route to EL3 for the duration so an IRQ terminates the
    /// wait even while the normal world has them masked at lower levels.
    fn standby(&self, power_state: u32) -> Result<(), PsciError> {
        if pstate_afflvl(power_state) != topology::AFFLVL_CORE {
            return Err(PsciError::InvalidParams);
        }

        let scr = self.cpu.read_scr();
        self.cpu.write_scr(scr | Scr::IRQ);
        self.cpu.isb();

        // The wakeup source must be latched before the wait starts.
        self.cpu.dsb();
        self.cpu.wfi();

        self.cpu.write_scr(scr);
        Ok(())
    }

    /// Power a core on.
    ///
    /// Only the core level carries an action on this SoC; cluster and
    /// system visits succeed without touching hardware. The entry point is
    /// latched before the rail rises so the core never fetches a stale
    /// vector.
    fn on(
        &self,
        mpidr: u64,
        sec_entrypoint: u64,
        afflvl: u32,
        _state: TargetState,
    ) -> Result<(), PsciError> {
        if afflvl != topology::AFFLVL_CORE {
            return Ok(());
        }

        let (cluster, core) = topology::split(mpidr);
        self.soc.set_secondary_entry(sec_entrypoint, core);
        self.soc.cpu_power_up(cluster, core);
        Ok(())
    }

    /// A freshly powered-on core runs this before entering the runtime.
    fn on_finish(&self, _mpidr: u64, afflvl: u32, state: TargetState) -> Result<(), PsciError> {
        if !self.gate(afflvl, state) {
            return Ok(());
        }

        self.finish_core_bringup();
        Ok(())
    }

    /// Turn an affinity instance off with no wakeup entry recorded.
    fn off(&self, mpidr: u64, afflvl: u32, state: TargetState) -> Result<(), PsciError> {
        if !self.gate(afflvl, state) {
            return Ok(());
        }

        self.power_down_common(mpidr, 0);
        Ok(())
    }

    /// Suspend an affinity instance, recording where it resumes.
    ///
    /// The console quiesces only on the visit at the suspend level itself;
    /// shallower due levels leave it running for the levels above.
    fn suspend(
        &self,
        mpidr: u64,
        sec_entrypoint: u64,
        afflvl: u32,
        state: TargetState,
    ) -> Result<(), PsciError> {
        if !self.gate(afflvl, state) {
            return Ok(());
        }

        if afflvl == self.runtime.suspend_afflvl() {
            self.console.exit();
        }

        self.power_down_common(mpidr, sec_entrypoint);
        Ok(())
    }

    /// A core resuming from suspend runs this before entering the runtime.
    ///
    /// If the whole platform slept, shared state went down with it: the
    /// primary core restores the GIC distributor and the console before the
    /// usual per-core bring-up. Secondaries only do the per-core part.
    fn suspend_finish(
        &self,
        mpidr: u64,
        afflvl: u32,
        state: TargetState,
    ) -> Result<(), PsciError> {
        if afflvl == self.runtime.suspend_afflvl() && topology::is_primary(mpidr) {
            self.gic.distif_setup();
            self.console.init();
        }

        self.on_finish(mpidr, afflvl, state)
    }

    /// Cut power to the whole system.
    ///
    /// This SoC cannot reach its PMIC, so the request is expected to fail;
    /// the core then parks in WFI as the closest available approximation.
    fn system_off(&self) -> ! {
        let code = self.soc.set_cpu_voltage(config::VOLTAGE_SHUTDOWN);
        log::error!("system shutdown returned {code}: still alive");

        self.cpu.wfi();
        panic!("system shutdown had no effect")
    }

    /// Reset the whole system through the watchdog.
    fn system_reset(&self) -> ! {
        for (addr, value) in config::WDOG_RESET_SEQUENCE {
            self.soc.mmio_write32(addr, value);
        }
        self.cpu.wfi();

        // The watchdog should have bitten during the WFI above.
        log::error!("watchdog reset not taken");
        panic!("system reset had no effect")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::{Cell, RefCell};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<String>>>;

    struct FakeRuntime {
        off: Option<u32>,
        suspend: u32,
    }

    impl PsciRuntime for FakeRuntime {
        fn max_phys_off_afflvl(&self) -> Option<u32> {
            self.off
        }

        fn suspend_afflvl(&self) -> u32 {
            self.suspend
        }
    }

    struct FakeCpu {
        trace: Trace,
        scr: Cell<Scr>,
    }

    impl CoreCtl for FakeCpu {
        fn read_scr(&self) -> Scr {
            self.scr.get()
        }

        fn write_scr(&self, scr: Scr) {
            self.trace
                .borrow_mut()
                .push(format!("cpu.write_scr({:#x})", scr.bits()));
            self.scr.set(scr);
        }

        fn isb(&self) {
            self.trace.borrow_mut().push("cpu.isb".into());
        }

        fn dsb(&self) {
            self.trace.borrow_mut().push("cpu.dsb".into());
        }

        fn wfi(&self) {
            self.trace.borrow_mut().push("cpu.wfi".into());
        }

        fn enable_smp(&self) {
            self.trace.borrow_mut().push("cpu.enable_smp".into());
        }
    }

    struct FakeGic {
        trace: Trace,
    }

    impl GicOps for FakeGic {
        fn cpuif_setup(&self) {
            self.trace.borrow_mut().push("gic.cpuif_setup".into());
        }

        fn cpuif_deactivate(&self) {
            self.trace.borrow_mut().push("gic.cpuif_deactivate".into());
        }

        fn pcpu_distif_setup(&self) {
            self.trace.borrow_mut().push("gic.pcpu_distif_setup".into());
        }

        fn distif_setup(&self) {
            self.trace.borrow_mut().push("gic.distif_setup".into());
        }
    }

    struct FakeConsole {
        trace: Trace,
    }

    impl ConsoleOps for FakeConsole {
        fn init(&self) {
            self.trace.borrow_mut().push("console.init".into());
        }

        fn exit(&self) {
            self.trace.borrow_mut().push("console.exit".into());
        }
    }

    struct FakeSoc {
        trace: Trace,
    }

    impl SocOps for FakeSoc {
        fn set_secondary_entry(&self, entry: u64, core: u32) {
            self.trace
                .borrow_mut()
                .push(format!("soc.set_secondary_entry({entry:#x}, core {core})"));
        }

        fn cpu_power_up(&self, cluster: u32, core: u32) {
            self.trace
                .borrow_mut()
                .push(format!("soc.cpu_power_up({cluster}, {core})"));
        }

        fn cpu_power_down(&self, cluster: u32, core: u32) {
            self.trace
                .borrow_mut()
                .push(format!("soc.cpu_power_down({cluster}, {core})"));
        }

        fn set_cpu_voltage(&self, millivolts: i32) -> i32 {
            self.trace
                .borrow_mut()
                .push(format!("soc.set_cpu_voltage({millivolts})"));
            -1
        }

        fn mmio_write32(&self, addr: usize, value: u32) {
            self.trace
                .borrow_mut()
                .push(format!("mmio[{addr:#x}] <- {value:#x}"));
        }
    }

    type TestController = PowerController<FakeRuntime, FakeCpu, FakeGic, FakeConsole, FakeSoc>;

    const INITIAL_SCR: Scr = Scr::NS.union(Scr::RW);

    fn controller(off: Option<u32>, suspend: u32) -> (TestController, Trace) {
        let trace = Trace::default();
        let ctl = PowerController::new(
            FakeRuntime { off, suspend },
            FakeCpu {
                trace: trace.clone(),
                scr: Cell::new(INITIAL_SCR),
            },
            FakeGic { trace: trace.clone() },
            FakeConsole { trace: trace.clone() },
            FakeSoc { trace: trace.clone() },
        );
        (ctl, trace)
    }

    fn trace_lines(trace: &Trace) -> Vec<String> {
        trace.borrow().clone()
    }

    #[test]
    fn no_actions_for_states_that_stay_on() {
        let (ctl, _) = controller(Some(1), 2);
        assert_eq!(ctl.actions_required(0, TargetState::Run), Ok(false));
        assert_eq!(ctl.actions_required(0, TargetState::Standby), Ok(false));
        assert_eq!(ctl.actions_required(1, TargetState::Run), Ok(false));
    }

    #[test]
    fn actions_due_only_at_the_deepest_off_level() {
        let (ctl, _) = controller(Some(1), 2);
        assert_eq!(ctl.actions_required(0, TargetState::Off), Ok(false));
        assert_eq!(ctl.actions_required(1, TargetState::Off), Ok(true));
        assert_eq!(ctl.actions_required(2, TargetState::Off), Ok(false));
    }

    #[test]
    fn gate_rejects_levels_beyond_the_topology() {
        let (ctl, _) = controller(Some(0), 2);
        assert_eq!(
            ctl.actions_required(3, TargetState::Off),
            Err(ContractViolation::AfflvlOutOfRange(3))
        );
    }

    #[test]
    fn gate_requires_a_resolved_off_level() {
        let (ctl, _) = controller(None, 2);
        assert_eq!(
            ctl.actions_required(0, TargetState::Off),
            Err(ContractViolation::NoOffLevel)
        );
    }

    #[test]
    fn gate_rejects_a_suspend_level_below_the_off_level() {
        let (ctl, _) = controller(Some(1), 0);
        assert_eq!(
            ctl.actions_required(1, TargetState::Off),
            Err(ContractViolation::SuspendBelowOff { suspend: 0, off: 1 })
        );
    }

    #[test]
    #[should_panic(expected = "suspend level 0 below off level 1")]
    fn an_inconsistent_suspend_level_is_fatal_in_handlers() {
        let (ctl, _) = controller(Some(1), 0);
        let _ = ctl.off(0x0, 1, TargetState::Off);
    }

    #[test]
    fn not_due_on_finish_is_a_repeatable_no_op() {
        let (ctl, trace) = controller(Some(0), 2);
        for _ in 0..3 {
            ctl.on_finish(0x1, 1, TargetState::Run).unwrap();
        }
        assert!(trace_lines(&trace).is_empty());
    }

    #[test]
    fn due_on_finish_brings_the_core_up_in_order() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.on_finish(0x1, 0, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            ["cpu.enable_smp", "gic.cpuif_setup", "gic.pcpu_distif_setup"]
        );
    }

    #[test]
    fn standby_rejects_cluster_level_requests() {
        let (ctl, trace) = controller(Some(0), 2);
        assert_eq!(ctl.standby(1 << 24), Err(PsciError::InvalidParams));
        assert!(trace_lines(&trace).is_empty());
    }

    #[test]
    fn standby_arms_the_irq_wakeup_then_restores() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.standby(0).unwrap();
        assert_eq!(
            trace_lines(&trace),
            [
                "cpu.write_scr(0x403)",
                "cpu.isb",
                "cpu.dsb",
                "cpu.wfi",
                "cpu.write_scr(0x401)",
            ]
        );
    }

    #[test]
    fn single_core_off_touches_only_the_due_level() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.off(0x1, 0, TargetState::Off).unwrap();
        ctl.off(0x1, 1, TargetState::Run).unwrap();
        assert_eq!(
            trace_lines(&trace),
            ["gic.cpuif_deactivate", "soc.cpu_power_down(0, 1)"]
        );
    }

    #[test]
    fn cluster_off_acts_once_at_the_cluster_level() {
        let (ctl, trace) = controller(Some(1), 2);
        ctl.off(0x3, 0, TargetState::Off).unwrap();
        ctl.off(0x3, 1, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            ["gic.cpuif_deactivate", "soc.cpu_power_down(0, 3)"]
        );
    }

    #[test]
    fn plain_off_leaves_no_resume_vector() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.off(0x2, 0, TargetState::Off).unwrap();
        assert!(trace_lines(&trace)
            .iter()
            .all(|line| !line.starts_with("soc.set_secondary_entry")));
    }

    #[test]
    fn on_records_the_entry_point_before_raising_the_rail() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.on(0x102, 0x4a00_0000, 0, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            [
                "soc.set_secondary_entry(0x4a000000, core 2)",
                "soc.cpu_power_up(1, 2)",
            ]
        );
    }

    #[test]
    fn on_is_a_no_op_above_core_level() {
        let (ctl, trace) = controller(Some(0), 2);
        ctl.on(0x102, 0x4a00_0000, 1, TargetState::Off).unwrap();
        ctl.on(0x102, 0x4a00_0000, 2, TargetState::Off).unwrap();
        assert!(trace_lines(&trace).is_empty());
    }

    #[test]
    fn primary_suspend_quiesces_the_console_before_powering_down() {
        let (ctl, trace) = controller(Some(1), 1);
        ctl.suspend(0x0, 0x4a00_0000, 0, TargetState::Off).unwrap();
        assert!(trace_lines(&trace).is_empty());

        ctl.suspend(0x0, 0x4a00_0000, 1, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            [
                "console.exit",
                "gic.cpuif_deactivate",
                "soc.set_secondary_entry(0x4a000000, core 0)",
                "soc.cpu_power_down(0, 0)",
            ]
        );
    }

    #[test]
    fn shallow_suspend_keeps_the_console_alive() {
        let (ctl, trace) = controller(Some(0), 1);
        ctl.suspend(0x1, 0x4a00_0000, 0, TargetState::Off).unwrap();
        assert!(trace_lines(&trace)
            .iter()
            .all(|line| line != "console.exit"));
    }

    #[test]
    fn primary_suspend_finish_restores_shared_state_first() {
        let (ctl, trace) = controller(Some(1), 1);
        ctl.suspend_finish(0x0, 1, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            [
                "gic.distif_setup",
                "console.init",
                "cpu.enable_smp",
                "gic.cpuif_setup",
                "gic.pcpu_distif_setup",
            ]
        );
    }

    #[test]
    fn secondary_suspend_finish_skips_the_shared_prologue() {
        let (ctl, trace) = controller(Some(1), 1);
        ctl.suspend_finish(0x1, 1, TargetState::Off).unwrap();
        assert_eq!(
            trace_lines(&trace),
            ["cpu.enable_smp", "gic.cpuif_setup", "gic.pcpu_distif_setup"]
        );
    }

    #[test]
    fn system_off_requests_shutdown_then_halts() {
        let (ctl, trace) = controller(Some(0), 2);
        let result = catch_unwind(AssertUnwindSafe(|| ctl.system_off()));
        assert!(result.is_err());
        assert_eq!(trace_lines(&trace), ["soc.set_cpu_voltage(-1)", "cpu.wfi"]);
    }

    #[test]
    fn system_reset_writes_the_watchdog_sequence_in_order() {
        let (ctl, trace) = controller(Some(0), 2);
        let result = catch_unwind(AssertUnwindSafe(|| ctl.system_reset()));
        assert!(result.is_err());
        assert_eq!(
            trace_lines(&trace),
            [
                "mmio[0x1c20cb4] <- 0x1",
                "mmio[0x1c20cb8] <- 0x1",
                "mmio[0x1c20cb0] <- 0x14af",
                "cpu.wfi",
            ]
        );
    }
}
