// Interrupted register state handed to timer tick callbacks

/// Snapshot of the CPU state at the point a timer interrupt fired
///
/// Tick callbacks only forward this to the scheduler, which uses it for
/// user/kernel time accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterState {
    pub instruction_pointer: u64,
    pub stack_pointer: u64,
    pub code_segment: u64,
    pub cpu_flags: u64,
}

impl RegisterState {
    /// Whether the interrupt arrived while running ring 3 code
    pub const fn is_user_mode(&self) -> bool {
        self.code_segment & 0b11 == 0b11
    }
}

#[cfg(target_arch = "x86_64")]
impl From<&x86_64::structures::idt::InterruptStackFrame> for RegisterState {
    fn from(frame: &x86_64::structures::idt::InterruptStackFrame) -> Self {
        Self {
            instruction_pointer: frame.instruction_pointer.as_u64(),
            stack_pointer: frame.stack_pointer.as_u64(),
            code_segment: frame.code_segment,
            cpu_flags: frame.cpu_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_level() {
        let kernel = RegisterState {
            code_segment: 0x08,
            ..Default::default()
        };
        let user = RegisterState {
            code_segment: 0x1b,
            ..Default::default()
        };
        assert!(!kernel.is_user_mode());
        assert!(user.is_user_mode());
    }
}
