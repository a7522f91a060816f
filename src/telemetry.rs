//! # Telemetry messages
//! Small JSON messages for the cloud channel. Sending is best effort and never blocks the control
//! loop.
use serde::Serialize;

/// Upper bound on the size of an encoded message
pub const MAX_MESSAGE_LEN: usize = 64;

/// Something worth reporting to the cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Telemetry {
    /// The settings were saved with this alarm time
    AlarmTimeSet {
        /// Alarm hour
        hour: u8,
        /// Alarm minute
        minute: u8,
    },
    /// A ringing alarm was acknowledged after this many seconds
    SnoozeTime {
        /// Seconds between the alarm starting to ring and the acknowledgment
        elapsed_secs: i64,
    },
}

/// `{"alarmTimeSet":"HH:MM"}`
#[derive(Serialize)]
struct AlarmTimeSetMessage<'a> {
    /// Alarm time as `HH:MM`
    #[serde(rename = "alarmTimeSet")]
    alarm_time_set: &'a str,
}

/// `{"snoozeTime":<minutes>}`
#[derive(Serialize)]
struct SnoozeTimeMessage {
    /// Ringing duration in minutes
    #[serde(rename = "snoozeTime")]
    snooze_time: f32,
}

impl Telemetry {
    /// Encode the message as JSON into `buf`, returning the number of bytes written
    pub fn write_json(&self, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        match *self {
            Self::AlarmTimeSet { hour, minute } => {
                let time = crate::alarm::AlarmConfig {
                    hour,
                    minute,
                    ..Default::default()
                }
                .time_label();
                serde_json_core::to_slice(
                    &AlarmTimeSetMessage {
                        alarm_time_set: time.as_str(),
                    },
                    buf,
                )
            }
            Self::SnoozeTime { elapsed_secs } => {
                #[allow(clippy::cast_precision_loss)]
                let minutes = elapsed_secs as f32 / 60.0;
                serde_json_core::to_slice(&SnoozeTimeMessage { snooze_time: minutes }, buf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(message: Telemetry) -> String {
        let mut buf = [0; MAX_MESSAGE_LEN];
        let len = message.write_json(&mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn alarm_time_set_is_zero_padded() {
        assert_eq!(
            json(Telemetry::AlarmTimeSet { hour: 6, minute: 5 }),
            r#"{"alarmTimeSet":"06:05"}"#
        );
    }

    #[test]
    fn snooze_time_is_in_minutes() {
        assert_eq!(
            json(Telemetry::SnoozeTime { elapsed_secs: 90 }),
            r#"{"snoozeTime":1.5}"#
        );
    }

    #[test]
    fn too_small_buffer_is_an_error() {
        let mut buf = [0; 8];
        assert!(Telemetry::AlarmTimeSet { hour: 6, minute: 5 }
            .write_json(&mut buf)
            .is_err());
    }
}
