//! # Smart snooze alarm clock firmware
//! Raspberry Pi Pico W with four buttons, a piezo buzzer and an SSD1306 OLED. The alarm logic lives
//! in the library; this binary wires it to the hardware and spawns the tasks.
//!
//! Built for any other target (the host, for `cargo test`) the binary is empty.
// we are in an environment with constrained resources, so we do not use the standard library and we
// define a different entry point.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
#[macro_use]
mod task;

#[cfg(target_os = "none")]
use {defmt_rtt as _, panic_probe as _}; // global logger and panic handler

// Entry point
#[cfg(target_os = "none")]
#[embassy_executor::main]
async fn main(spawner: embassy_executor::Spawner) {
    use crate::task::resources::{
        AssignedResources, ButtonResources, BuzzerResources, DisplayResources, FlashResources,
        RtcResources, WifiResources,
    };
    use crate::task::{
        control::control, display::display, network::network, rtc, settings_store::settings_store,
    };
    use defmt::{info, unwrap};

    info!("Program start");
    let p = embassy_rp::init(embassy_rp::config::Config::default());
    let r = split_resources!(p);

    rtc::init(r.rtc);

    unwrap!(spawner.spawn(display(r.display)));
    unwrap!(spawner.spawn(settings_store(r.flash)));
    unwrap!(spawner.spawn(network(spawner, r.wifi)));
    unwrap!(spawner.spawn(control(r.buttons, r.buzzer)));
}

#[cfg(not(target_os = "none"))]
fn main() {}
