//! Collaborators the time subsystem calls out to
//!
//! The arch layer implements [`Platform`] for the running kernel; tests
//! provide fakes.

use shared::RegisterState;

/// Services owned by other kernel subsystems
pub trait Platform: Send + Sync {
    /// Number of the CPU executing the caller; the boot CPU is 0
    fn current_cpu(&self) -> u32;

    /// Interrupt nesting depth on the current CPU
    fn irq_depth(&self) -> u32;

    /// Expire due entries in the software timer queue
    fn fire_timer_queue(&self);

    /// Scheduler tick accounting for the interrupted context
    fn scheduler_tick(&self, regs: &RegisterState);

    /// Run `f` with local interrupts masked
    fn without_interrupts(&self, f: &mut dyn FnMut());
}

/// Bare-metal platform for a single-CPU kernel without a scheduler
///
/// Ticks are accepted but go nowhere.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct UniprocessorPlatform;

#[cfg(target_arch = "x86_64")]
impl Platform for UniprocessorPlatform {
    fn current_cpu(&self) -> u32 {
        0
    }

    fn irq_depth(&self) -> u32 {
        0
    }

    fn fire_timer_queue(&self) {}

    fn scheduler_tick(&self, _regs: &RegisterState) {}

    fn without_interrupts(&self, f: &mut dyn FnMut()) {
        x86_64::instructions::interrupts::without_interrupts(f)
    }
}
