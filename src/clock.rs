//! # Wall clock and readiness gate
//! Timestamps are seconds since the unix epoch, UTC. The device's real time clock starts out at a
//! power-on default and only becomes trustworthy once network time sync has set it, so nothing
//! schedules off the clock before [`is_time_valid`] says so.
use core::future::Future;
use core::ops::Add;
use embassy_time::Duration;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Unix time for 2010-01-01T00:00:00Z. Anything at or below it is a power-on default, not a synced
/// clock.
pub const VALID_TIME_THRESHOLD: i64 = 1_262_304_000;

/// How many times the startup phase samples the clock before giving up on sync
pub const SYNC_ATTEMPTS: u32 = 10;

/// Pause between two samples of the startup phase
pub const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// An absolute point in time, seconds since the unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from unix seconds
    pub const fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Unix seconds of this timestamp
    pub const fn unix(self) -> i64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, negative if `earlier` is in the future
    pub const fn secs_since(self, earlier: Self) -> i64 {
        self.0 - earlier.0
    }
}

impl Add<i64> for Timestamp {
    type Output = Self;

    fn add(self, secs: i64) -> Self {
        Self(self.0 + secs)
    }
}

/// Calendar fields of a UTC instant, the way a real time clock peripheral holds them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct CivilTime {
    /// Full year, e.g. 2024
    pub year: u16,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    /// Days since Sunday, 0..=6
    pub weekday: u8,
    /// 0..=23
    pub hour: u8,
    /// 0..=59
    pub minute: u8,
    /// 0..=59
    pub second: u8,
}

impl Timestamp {
    /// Convert calendar fields to a timestamp. The weekday is not checked.
    pub fn from_civil(civil: &CivilTime) -> Result<Self, ClockError> {
        let month = Month::try_from(civil.month).map_err(|_| ClockError::InvalidDateTime)?;
        let date = Date::from_calendar_date(i32::from(civil.year), month, civil.day)
            .map_err(|_| ClockError::InvalidDateTime)?;
        let time = Time::from_hms(civil.hour, civil.minute, civil.second)
            .map_err(|_| ClockError::InvalidDateTime)?;
        Ok(Self(PrimitiveDateTime::new(date, time).assume_utc().unix_timestamp()))
    }

    /// Split this timestamp into UTC calendar fields
    pub fn to_civil(self) -> Result<CivilTime, ClockError> {
        let utc =
            OffsetDateTime::from_unix_timestamp(self.0).map_err(|_| ClockError::InvalidDateTime)?;
        Ok(CivilTime {
            year: u16::try_from(utc.year()).map_err(|_| ClockError::InvalidDateTime)?,
            month: u8::from(utc.month()),
            day: utc.day(),
            weekday: utc.weekday().number_days_from_sunday(),
            hour: utc.hour(),
            minute: utc.minute(),
            second: utc.second(),
        })
    }
}

/// Errors reading the wall clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ClockError {
    /// The clock peripheral has not been set up
    Unavailable,
    /// The clock is not running
    NotRunning,
    /// The clock holds a date that cannot be represented
    InvalidDateTime,
}

/// Something that can tell the current wall clock time
pub trait WallClock {
    /// Read the current time
    fn now(&mut self) -> Result<Timestamp, ClockError>;
}

/// Errors of the startup sync wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SyncError {
    /// The clock never became valid within the attempt budget. Soft failure, startup goes on.
    TimedOut,
    /// Reading the clock failed. Fatal.
    Clock(ClockError),
}

impl From<ClockError> for SyncError {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

/// True once `now` is past the power-on default range of the clock
pub const fn is_time_valid(now: Timestamp) -> bool {
    now.unix() > VALID_TIME_THRESHOLD
}

/// Result of polling the readiness gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Readiness {
    /// The clock still holds an unsynced value
    NotReady,
    /// The clock was observed valid for the first time on this poll
    BecameReady,
    /// The clock has been valid before
    Ready,
}

/// Holds back scheduling until the wall clock has been synced.
///
/// Sync can complete long after the bounded startup wait gave up, so the control loop keeps polling
/// the gate every tick. The first valid observation is reported once as [`Readiness::BecameReady`]
/// and latched from then on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClockReadinessGate {
    /// Whether a valid time has been observed
    ready: bool,
}

impl ClockReadinessGate {
    /// Create a gate that has not seen a valid time yet
    pub const fn new() -> Self {
        Self { ready: false }
    }

    /// Whether a valid time has been observed
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Non-blocking readiness check, meant to be called once per tick
    pub fn poll(&mut self, now: Timestamp) -> Readiness {
        if self.ready {
            return Readiness::Ready;
        }
        if is_time_valid(now) {
            info!("Wall clock synced at {}", now.unix());
            self.ready = true;
            Readiness::BecameReady
        } else {
            Readiness::NotReady
        }
    }

    /// Startup only: sample the clock up to `max_attempts` times, sleeping `poll_interval` in
    /// between, until it is valid.
    ///
    /// Running out of attempts is a soft failure, the caller carries on and the display keeps
    /// showing that the clock is syncing. Failing to read the clock at all is fatal.
    pub async fn await_sync<C, S, F>(
        &mut self,
        clock: &mut C,
        mut sleep: S,
        max_attempts: u32,
        poll_interval: Duration,
    ) -> Result<(), SyncError>
    where
        C: WallClock,
        S: FnMut(Duration) -> F,
        F: Future<Output = ()>,
    {
        for attempt in 1..=max_attempts {
            let now = clock.now()?;
            if self.poll(now) != Readiness::NotReady {
                return Ok(());
            }
            let tries_left = max_attempts - attempt;
            info!("Not yet synced with time server, {} tries left", tries_left);
            if tries_left > 0 {
                sleep(poll_interval).await;
            }
        }
        warn!("Gave up waiting for time sync after {} attempts", max_attempts);
        Err(SyncError::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::ready;
    use embassy_futures::block_on;

    /// Replays a fixed sequence of readings, repeating the last one
    struct ScriptedClock {
        readings: Vec<Result<Timestamp, ClockError>>,
        reads: usize,
    }

    impl ScriptedClock {
        fn new(readings: Vec<Result<Timestamp, ClockError>>) -> Self {
            Self { readings, reads: 0 }
        }
    }

    impl WallClock for ScriptedClock {
        fn now(&mut self) -> Result<Timestamp, ClockError> {
            let i = self.reads.min(self.readings.len() - 1);
            self.reads += 1;
            self.readings[i]
        }
    }

    const BOOT: Timestamp = Timestamp::from_unix(946_684_800); // 2000-01-01
    const SYNCED: Timestamp = Timestamp::from_unix(1_700_000_000);

    #[test]
    fn civil_time_matches_unix_time() {
        let civil = SYNCED.to_civil().unwrap();
        // 2023-11-14T22:13:20Z, a Tuesday
        assert_eq!(
            civil,
            CivilTime {
                year: 2023,
                month: 11,
                day: 14,
                weekday: 2,
                hour: 22,
                minute: 13,
                second: 20,
            }
        );
        assert_eq!(Timestamp::from_civil(&civil), Ok(SYNCED));
        assert_eq!(BOOT.to_civil().map(|c| (c.year, c.weekday)), Ok((2000, 6)));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let mut civil = BOOT.to_civil().unwrap();
        civil.month = 2;
        civil.day = 30;
        assert_eq!(Timestamp::from_civil(&civil), Err(ClockError::InvalidDateTime));
        civil.month = 0;
        assert_eq!(Timestamp::from_civil(&civil), Err(ClockError::InvalidDateTime));
    }

    #[test]
    fn threshold_is_exclusive() {
        assert!(!is_time_valid(Timestamp::from_unix(VALID_TIME_THRESHOLD)));
        assert!(is_time_valid(Timestamp::from_unix(VALID_TIME_THRESHOLD + 1)));
        assert!(!is_time_valid(BOOT));
    }

    #[test]
    fn poll_reports_the_transition_once() {
        let mut gate = ClockReadinessGate::new();
        assert_eq!(gate.poll(BOOT), Readiness::NotReady);
        assert_eq!(gate.poll(SYNCED), Readiness::BecameReady);
        assert_eq!(gate.poll(SYNCED + 1), Readiness::Ready);
        // latched even if the clock were to jump back
        assert_eq!(gate.poll(BOOT), Readiness::Ready);
        assert!(gate.is_ready());
    }

    #[test]
    fn await_sync_returns_once_clock_is_valid() {
        let mut clock = ScriptedClock::new(vec![Ok(BOOT), Ok(BOOT), Ok(SYNCED)]);
        let mut gate = ClockReadinessGate::new();
        let mut sleeps = 0;
        let result = block_on(gate.await_sync(
            &mut clock,
            |_| {
                sleeps += 1;
                ready(())
            },
            SYNC_ATTEMPTS,
            SYNC_POLL_INTERVAL,
        ));
        assert_eq!(result, Ok(()));
        assert_eq!(clock.reads, 3);
        assert_eq!(sleeps, 2);
        assert!(gate.is_ready());
    }

    #[test]
    fn await_sync_times_out_softly() {
        let mut clock = ScriptedClock::new(vec![Ok(BOOT)]);
        let mut gate = ClockReadinessGate::new();
        let mut slept = Duration::from_secs(0);
        let result = block_on(gate.await_sync(
            &mut clock,
            |d| {
                slept += d;
                ready(())
            },
            3,
            Duration::from_secs(2),
        ));
        assert_eq!(result, Err(SyncError::TimedOut));
        assert_eq!(clock.reads, 3);
        assert_eq!(slept, Duration::from_secs(4));
        assert!(!gate.is_ready());

        // a later sync is still picked up by polling
        assert_eq!(gate.poll(SYNCED), Readiness::BecameReady);
    }

    #[test]
    fn await_sync_fails_hard_on_clock_errors() {
        let mut clock = ScriptedClock::new(vec![Ok(BOOT), Err(ClockError::NotRunning)]);
        let mut gate = ClockReadinessGate::new();
        let result = block_on(gate.await_sync(
            &mut clock,
            |_| ready(()),
            SYNC_ATTEMPTS,
            SYNC_POLL_INTERVAL,
        ));
        assert_eq!(result, Err(SyncError::Clock(ClockError::NotRunning)));
        assert_eq!(clock.reads, 2);
    }
}
