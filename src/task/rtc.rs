//! # Real time clock
//! The RP2040 RTC is the wall clock. The network task sets it, the control task reads it. Both only
//! hold the lock for a single register access, so the control loop never waits on the network.
use crate::task::resources::RtcResources;
use core::cell::RefCell;
use defmt::{Debug2Format, info, warn};
use embassy_rp::peripherals::RTC;
use embassy_rp::rtc::{DateTime, DayOfWeek, Rtc};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use smart_snooze_alarmclock::clock::{CivilTime, ClockError, Timestamp, WallClock};

/// Type alias for the RTC mutex.
type RtcType = Mutex<CriticalSectionRawMutex, RefCell<Option<Rtc<'static, RTC>>>>;

/// The RTC, shared between the control and network tasks
static RTC_MUTEX: RtcType = Mutex::new(RefCell::new(None));

/// The clock starts out at 2000-01-01T00:00:00Z, well below the synced threshold
const POWER_ON_DEFAULT: Timestamp = Timestamp::from_unix(946_684_800);

/// Start the RTC at the power-on default and make it available to the tasks
pub fn init(r: RtcResources) {
    let mut rtc = Rtc::new(r.rtc_inst);
    if !rtc.is_running() {
        match to_datetime(POWER_ON_DEFAULT) {
            Ok(dt) => {
                if let Err(e) = rtc.set_datetime(dt) {
                    warn!("Failed to start RTC: {:?}", Debug2Format(&e));
                }
            }
            Err(e) => warn!("Bad power-on default: {:?}", e),
        }
    }
    RTC_MUTEX.lock(|cell| *cell.borrow_mut() = Some(rtc));
    info!("RTC initialized");
}

/// Set the wall clock, after a successful network time sync
pub fn set_time(now: Timestamp) -> Result<(), ClockError> {
    let dt = to_datetime(now)?;
    RTC_MUTEX.lock(|cell| {
        let mut rtc = cell.borrow_mut();
        let rtc = rtc.as_mut().ok_or(ClockError::Unavailable)?;
        rtc.set_datetime(dt).map_err(|e| {
            warn!("Failed to set RTC: {:?}", Debug2Format(&e));
            ClockError::InvalidDateTime
        })
    })
}

/// The wall clock as seen by the control task
pub struct RtcClock;

impl WallClock for RtcClock {
    fn now(&mut self) -> Result<Timestamp, ClockError> {
        let dt = RTC_MUTEX.lock(|cell| {
            let rtc = cell.borrow();
            let rtc = rtc.as_ref().ok_or(ClockError::Unavailable)?;
            rtc.now().map_err(|_| ClockError::NotRunning)
        })?;
        Timestamp::from_civil(&CivilTime {
            year: dt.year,
            month: dt.month,
            day: dt.day,
            weekday: dt.day_of_week as u8,
            hour: dt.hour,
            minute: dt.minute,
            second: dt.second,
        })
    }
}

/// Convert a timestamp into the RTC's representation
fn to_datetime(ts: Timestamp) -> Result<DateTime, ClockError> {
    let civil = ts.to_civil()?;
    let day_of_week = match civil.weekday {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        _ => DayOfWeek::Saturday,
    };
    Ok(DateTime {
        year: civil.year,
        month: civil.month,
        day: civil.day,
        day_of_week,
        hour: civil.hour,
        minute: civil.minute,
        second: civil.second,
    })
}
