//! `log` backend writing to the serial console

use core::fmt::{self, Write};

use log::{Log, Metadata, Record};

/// Format one record as `[LEVEL] target: message`
pub fn write_record<W: Write>(out: &mut W, record: &Record<'_>) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
pub use self::serial_logger::SerialLogger;

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
mod serial_logger {
    use core::sync::atomic::{AtomicBool, Ordering};

    use spin::Mutex;

    use super::*;
    use crate::serial::{SerialPort, DEFAULT_BASE};

    pub struct SerialLogger {
        port: Mutex<SerialPort>,
        port_ready: AtomicBool,
    }

    impl SerialLogger {
        pub const fn new() -> Self {
            Self {
                port: Mutex::new(SerialPort::new(DEFAULT_BASE)),
                port_ready: AtomicBool::new(false),
            }
        }
    }

    impl Default for SerialLogger {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Log for SerialLogger {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record<'_>) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let mut port = self.port.lock();
            if !self.port_ready.swap(true, Ordering::AcqRel) {
                port.init();
            }
            let _ = write_record(&mut *port, record);
        }

        fn flush(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_record_format() {
        let mut out = heapless::String::<64>::new();
        write_record(
            &mut out,
            &Record::builder()
                .level(Level::Warn)
                .target("kernel::time")
                .args(format_args!("Time: No APIC timer"))
                .build(),
        )
        .unwrap();
        assert_eq!(out.as_str(), "[WARN] kernel::time: Time: No APIC timer\n");
    }
}
