use crate::LockSet;

/// Outcome of one hardware check. Recomputed on every probe, never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HardwareStatus {
    pub sensor: bool,
    pub display: bool,
    pub storage: bool,
}

impl HardwareStatus {
    pub const ALL_OK: Self = Self {
        sensor: true,
        display: true,
        storage: true,
    };

    pub fn all_ok(&self) -> bool {
        self.sensor && self.display && self.storage
    }
}

pub trait HardwareProbe {
    fn probe(&mut self) -> HardwareStatus;
}

/// Probes the real buses, each under its own lock.
///
/// The two-wire bus is reset only while the bus lock is held, so no task can be
/// in the middle of a transaction when it happens. A lock that cannot be taken
/// within its wait counts as a failed check for that bus.
#[derive(Clone)]
pub struct BusProbe {
    locks: LockSet,
}

impl BusProbe {
    pub fn new(locks: LockSet) -> Self {
        Self { locks }
    }

    fn probe_two_wire(&self) -> (bool, bool) {
        let Some(mut bus) = self.locks.bus.acquire() else {
            log::error!("System Monitor: two-wire bus busy, sensor and display unverified.");
            return (false, false);
        };

        bus.controller.reset();

        let sensor_address = bus.sensor.address();
        let sensor = if !bus.controller.is_present(sensor_address) {
            log::error!("System Monitor: sensor not found at {sensor_address:#04x}.");
            false
        } else if !bus.sensor.begin() {
            log::error!("System Monitor: sensor at {sensor_address:#04x} failed to initialize.");
            false
        } else {
            true
        };

        let display_address = bus.display.address();
        let display = if !bus.controller.is_present(display_address) {
            log::error!("System Monitor: display not found at {display_address:#04x}.");
            false
        } else if !bus.display.begin() {
            log::error!("System Monitor: display at {display_address:#04x} failed to initialize.");
            false
        } else {
            true
        };

        (sensor, display)
    }

    fn probe_storage(&self) -> bool {
        let Some(mut storage) = self.locks.storage.acquire() else {
            log::error!("System Monitor: storage bus busy, card unverified.");
            return false;
        };

        if storage.begin() {
            true
        } else {
            log::error!("System Monitor: storage card not mounted.");
            false
        }
    }
}

impl HardwareProbe for BusProbe {
    fn probe(&mut self) -> HardwareStatus {
        let (sensor, display) = self.probe_two_wire();
        let storage = self.probe_storage();

        HardwareStatus {
            sensor,
            display,
            storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHardware;

    #[test]
    fn test_all_present() {
        let hardware = SimulatedHardware::new();
        let mut probe = BusProbe::new(hardware.lock_set(&Default::default()));

        assert_eq!(probe.probe(), HardwareStatus::ALL_OK);
        assert_eq!(hardware.presence().bus_resets(), 1);
    }

    #[test]
    fn test_each_failure_is_reported_separately() {
        let hardware = SimulatedHardware::new();
        let mut probe = BusProbe::new(hardware.lock_set(&Default::default()));

        hardware.presence().set_display(false);
        let status = probe.probe();
        assert!(status.sensor && !status.display && status.storage);
        assert!(!status.all_ok());

        hardware.presence().set_display(true);
        hardware.presence().set_sensor(false);
        hardware.presence().set_storage(false);
        let status = probe.probe();
        assert_eq!(
            status,
            HardwareStatus {
                sensor: false,
                display: true,
                storage: false
            }
        );
    }

    #[test]
    fn test_absent_device_is_never_initialized() {
        let hardware = SimulatedHardware::new();
        let mut probe = BusProbe::new(hardware.lock_set(&Default::default()));

        hardware.presence().set_sensor(false);
        probe.probe();
        assert_eq!(hardware.presence().sensor_inits(), 0);
        assert_eq!(hardware.presence().display_inits(), 1);
    }

    #[test]
    fn test_busy_bus_fails_the_two_wire_check() {
        let hardware = SimulatedHardware::new();
        let locks = hardware.lock_set(&Default::default());
        let mut probe = BusProbe::new(locks.clone());

        let _held = locks.bus.acquire().unwrap();
        let status = probe.probe();
        assert!(!status.sensor && !status.display && status.storage);
        assert_eq!(hardware.presence().bus_resets(), 0);
    }
}
