// Shared fakes for the kernel integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use kernel::time::apic::ApicTimer;
use kernel::time::hpet::{Hpet, HpetDevice, MainCounter};
use kernel::{AcpiInfo, Platform, TimeManagement, TimerInventory};
use config::TimeConfig;
use shared::RegisterState;

pub const HPET_FREQUENCY: u64 = 10_000_000;
pub const BOOT_EPOCH: i64 = 1_700_000_000;

/// Platform that records every collaborator call
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub cpu: AtomicU32,
    pub irq_depth: AtomicU32,
    pub timer_queue_fires: AtomicU32,
    pub scheduler_ticks: AtomicU32,
    pub interrupt_sections: AtomicU32,
}

impl FakePlatform {
    pub fn on_cpu(&self, cpu: u32) {
        self.cpu.store(cpu, Ordering::SeqCst);
    }

    pub fn set_irq_depth(&self, depth: u32) {
        self.irq_depth.store(depth, Ordering::SeqCst);
    }

    pub fn timer_queue_fires(&self) -> u32 {
        self.timer_queue_fires.load(Ordering::SeqCst)
    }

    pub fn scheduler_ticks(&self) -> u32 {
        self.scheduler_ticks.load(Ordering::SeqCst)
    }
}

impl Platform for FakePlatform {
    fn current_cpu(&self) -> u32 {
        self.cpu.load(Ordering::SeqCst)
    }

    fn irq_depth(&self) -> u32 {
        self.irq_depth.load(Ordering::SeqCst)
    }

    fn fire_timer_queue(&self) {
        self.timer_queue_fires.fetch_add(1, Ordering::SeqCst);
    }

    fn scheduler_tick(&self, _regs: &RegisterState) {
        self.scheduler_ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn without_interrupts(&self, f: &mut dyn FnMut()) {
        self.interrupt_sections.fetch_add(1, Ordering::SeqCst);
        f()
    }
}

/// HPET main counter the test advances by hand
#[derive(Debug, Default)]
pub struct FakeCounter(AtomicU64);

impl FakeCounter {
    pub fn leaked(start: u64) -> &'static FakeCounter {
        Box::leak(Box::new(FakeCounter(AtomicU64::new(start))))
    }

    pub fn advance(&self, ticks: u64) {
        self.0.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn read_value(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl MainCounter for FakeCounter {
    fn read(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn hpet_device(counter: &'static FakeCounter, periodic: &[bool]) -> HpetDevice {
    periodic.iter().fold(
        HpetDevice::new(Hpet::with_frequency(counter, HPET_FREQUENCY, true)),
        |device, &capable| device.with_comparator(capable),
    )
}

/// ACPI machine with a CMOS RTC and no HPET: the PIT + RTC path
pub fn legacy_inventory() -> TimerInventory {
    TimerInventory {
        acpi: Some(AcpiInfo {
            cmos_rtc_present: true,
        }),
        rtc_boot_time: BOOT_EPOCH,
        ..Default::default()
    }
}

pub fn hpet_inventory(counter: &'static FakeCounter) -> TimerInventory {
    TimerInventory {
        hpet: Some(hpet_device(counter, &[true, false])),
        ..legacy_inventory()
    }
}

pub fn with_apic(inventory: TimerInventory) -> TimerInventory {
    TimerInventory {
        apic_timer: Some(ApicTimer::new(200_000_000)),
        ..inventory
    }
}

pub fn legacy_time() -> TimeManagement<FakePlatform> {
    TimeManagement::new(&TimeConfig::default(), legacy_inventory(), FakePlatform::default())
}

pub fn hpet_time(counter: &'static FakeCounter) -> TimeManagement<FakePlatform> {
    TimeManagement::new(&TimeConfig::default(), hpet_inventory(counter), FakePlatform::default())
}

pub fn regs() -> RegisterState {
    RegisterState::default()
}
