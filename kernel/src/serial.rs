//! Serial console used as the log sink (COM1 on x86_64, PL011 on aarch64)

use core::fmt::{self, Write};

#[cfg(target_arch = "x86_64")]
use x86_64::instructions::port::Port;

/// COM1 I/O base
#[cfg(target_arch = "x86_64")]
pub const DEFAULT_BASE: u16 = 0x3F8;

/// QEMU virt PL011 base address
#[cfg(target_arch = "aarch64")]
pub const DEFAULT_BASE: usize = 0x0900_0000;

#[cfg(target_arch = "x86_64")]
pub struct SerialPort {
    base: u16,
}

#[cfg(target_arch = "x86_64")]
impl SerialPort {
    pub const fn new(base: u16) -> Self {
        Self { base }
    }

    fn register(&self, offset: u16) -> Port<u8> {
        Port::new(self.base + offset)
    }

    pub fn init(&self) {
        // SAFETY: the 16550 register block lives at `base`
        unsafe {
            self.register(1).write(0x00); // Disable interrupts
            self.register(3).write(0x80); // Enable DLAB
            self.register(0).write(0x03); // Divisor low (38400 baud)
            self.register(1).write(0x00); // Divisor high
            self.register(3).write(0x03); // 8 bits, no parity, one stop bit
            self.register(2).write(0xC7); // Enable FIFO
            self.register(4).write(0x0B); // IRQs enabled, RTS/DSR set
        }
    }

    fn transmit_empty(&self) -> bool {
        unsafe { self.register(5).read() & 0x20 != 0 }
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.transmit_empty() {
            core::hint::spin_loop();
        }
        unsafe {
            self.register(0).write(byte);
        }
    }
}

#[cfg(target_arch = "aarch64")]
pub struct SerialPort {
    base: usize,
}

#[cfg(target_arch = "aarch64")]
impl SerialPort {
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    pub fn init(&self) {
        // UEFI/QEMU usually initializes PL011; nothing required for basic TX.
    }

    fn tx_ready(&self) -> bool {
        // UARTFR register at offset 0x18, TXFF bit 5
        unsafe {
            let fr = core::ptr::read_volatile((self.base + 0x18) as *const u32);
            (fr & (1 << 5)) == 0
        }
    }

    pub fn write_byte(&self, byte: u8) {
        while !self.tx_ready() {
            core::hint::spin_loop();
        }
        unsafe {
            core::ptr::write_volatile(self.base as *mut u32, byte as u32);
        }
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
impl Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}
