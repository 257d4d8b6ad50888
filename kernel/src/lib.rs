#![cfg_attr(not(test), no_std)]

//! moteOS Kernel - time management subsystem
//!
//! Monotonic and wall-clock time for the kernel, driven by whichever hardware
//! timers boot probing found (HPET, local APIC timer, PIT, RTC).

pub mod error;
pub mod init;
pub mod logger;
pub mod platform;
pub mod serial;
pub mod time;

pub use error::TimeError;
pub use init::TimeSubsystem;
pub use platform::Platform;
pub use time::hardware_timer::{HardwareTimer, HardwareTimerType, TickHandler, TimerCapabilities, TimerId};
pub use time::selection::{AcpiInfo, TimerInventory};
pub use time::{TimeManagement, OPTIMAL_TICKS_PER_SECOND_RATE};

/// Panic handler
///
/// Logs the panic and halts the CPU.
#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("KERNEL PANIC: {}", info);
    loop {
        #[cfg(target_arch = "x86_64")]
        x86_64::instructions::hlt();
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe");
        }
    }
}
