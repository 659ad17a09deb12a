//! # Clock Synchronization Module
//!
//! Field units boot without network time. At startup the host clock is set from a
//! battery-backed DS1307 RTC, or to a fixed fallback when the RTC cannot be read,
//! so that record timestamps and daily file names stay monotonic across reboots.
//!
//! ## DS1307 registers
//!
//! Registers 0x00-0x06 hold seconds, minutes, hours, weekday, date, month and
//! year in BCD. Bit 7 of seconds is the clock-halt flag and bits 6-7 of hours
//! select 12/24 h mode; both are masked off. The year is an offset from 2000.

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use tracing::{error, info};

use crate::error::{HubError, Result};

/// ioctl request selecting the target address on an i2c-dev bus
const I2C_SLAVE: u64 = 0x0703;

/// Number of time registers read from the DS1307
pub const DS1307_REGISTER_COUNT: usize = 7;

/// Source of the current date and time
pub trait ClockSource {
    fn read_datetime(&mut self) -> Result<NaiveDateTime>;
}

/// Setter for the host's wall clock
pub trait HostClock {
    fn set(&self, datetime: NaiveDateTime) -> Result<()>;
}

/// Which time the host clock was set to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSyncOutcome {
    /// Host clock set from the RTC
    Synced(NaiveDateTime),
    /// RTC unreadable; host clock set to the fallback
    Fallback(NaiveDateTime),
}

/// DS1307 real-time clock on a Linux i2c-dev bus
#[derive(Debug, Clone)]
pub struct Ds1307 {
    bus: u8,
    address: u16,
}

impl Ds1307 {
    pub fn new(bus: u8, address: u16) -> Self {
        Self { bus, address }
    }

    fn device_path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }

    fn read_registers(&self) -> Result<[u8; DS1307_REGISTER_COUNT]> {
        let path = self.device_path();
        let mut bus: File = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| HubError::Clock(format!("Failed to open {}: {}", path, e)))?;

        // SAFETY: the fd is owned by `bus` and stays open for the call.
        let rc = unsafe {
            libc::ioctl(
                bus.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(self.address),
            )
        };
        if rc < 0 {
            return Err(HubError::Clock(format!(
                "Failed to select RTC 0x{:02x} on {}: {}",
                self.address,
                path,
                std::io::Error::last_os_error()
            )));
        }

        // Point at register 0, then read the time block
        bus.write_all(&[0x00])?;
        let mut registers = [0u8; DS1307_REGISTER_COUNT];
        bus.read_exact(&mut registers)?;
        Ok(registers)
    }
}

impl ClockSource for Ds1307 {
    fn read_datetime(&mut self) -> Result<NaiveDateTime> {
        let registers = self.read_registers()?;
        decode_ds1307(&registers)
    }
}

/// Sets CLOCK_REALTIME, interpreting the value as local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostClock;

impl HostClock for SystemHostClock {
    fn set(&self, datetime: NaiveDateTime) -> Result<()> {
        let local = Local
            .from_local_datetime(&datetime)
            .earliest()
            .ok_or_else(|| HubError::Clock(format!("{} does not exist in local time", datetime)))?;

        let ts = libc::timespec {
            tv_sec: local.timestamp() as libc::time_t,
            tv_nsec: 0,
        };

        // SAFETY: `ts` is a valid timespec for the duration of the call.
        let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) };
        if rc != 0 {
            return Err(HubError::Clock(format!(
                "Failed to set system clock: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

/// Convert one packed BCD byte to its decimal value
pub fn bcd_to_decimal(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

/// Decode the DS1307 time registers
pub fn decode_ds1307(registers: &[u8; DS1307_REGISTER_COUNT]) -> Result<NaiveDateTime> {
    let second = bcd_to_decimal(registers[0] & 0x7F);
    let minute = bcd_to_decimal(registers[1]);
    let hour = bcd_to_decimal(registers[2] & 0x3F);
    // registers[3] is the weekday, implied by the date
    let day = bcd_to_decimal(registers[4]);
    let month = bcd_to_decimal(registers[5]);
    let year = 2000 + i32::from(bcd_to_decimal(registers[6]));

    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .ok_or_else(|| HubError::Clock(format!("RTC holds an invalid time: {:02x?}", registers)))
}

/// Set the host clock from `source`, or to `fallback` when the source fails
///
/// # Errors
///
/// Returns error only if the host clock itself cannot be set.
pub fn sync_host_clock<S: ClockSource, H: HostClock>(
    source: &mut S,
    host: &H,
    fallback: NaiveDateTime,
) -> Result<ClockSyncOutcome> {
    match source.read_datetime() {
        Ok(datetime) => {
            host.set(datetime)?;
            info!("Time Sync successfully ({}).", datetime);
            Ok(ClockSyncOutcome::Synced(datetime))
        }
        Err(e) => {
            error!("Time Sync Failed: {}", e);
            host.set(fallback)?;
            Ok(ClockSyncOutcome::Fallback(fallback))
        }
    }
}
