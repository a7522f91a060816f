//! # Display task
//! Draws the screens the control task sends on the SSD1306 OLED. Only the latest screen matters, so
//! the task waits on a signal and redraws the whole buffer each time.
use crate::task::resources::{DisplayResources, Irqs};
use crate::task::task_messages::{SHUTDOWN, wait_for_display};
use defmt::{Debug2Format, error, info, warn};
use embassy_rp::i2c::{Config, I2c};
use embedded_graphics::{
    mono_font::{
        MonoFont, MonoTextStyleBuilder,
        ascii::{FONT_9X15, FONT_9X18_BOLD, FONT_10X20},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use smart_snooze_alarmclock::render::TextSize;
use ssd1306_async::{I2CDisplayInterface, Ssd1306, prelude::*};

/// Font for a text size
const fn font(size: TextSize) -> &'static MonoFont<'static> {
    match size {
        TextSize::Normal => &FONT_9X15,
        TextSize::Big => &FONT_9X18_BOLD,
        TextSize::Huge => &FONT_10X20,
    }
}

#[embassy_executor::task]
pub async fn display(r: DisplayResources) {
    info!("Display task started");

    let mut config = Config::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(r.i2c0, r.scl, r.sda, Irqs, config);

    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if let Err(e) = display.init().await {
        // without a display the clock is useless
        error!("Failed to initialize display: {}", Debug2Format(&e));
        SHUTDOWN.cancel();
        return;
    }
    if let Err(e) = display.set_brightness(Brightness::DIM).await {
        warn!("Failed to dim display: {}", Debug2Format(&e));
    }

    loop {
        let screen = wait_for_display().await;

        // prepare the display, note that nothing is sent to the display before flush()
        display.clear();
        for line in &screen.lines {
            let style = MonoTextStyleBuilder::new()
                .font(font(line.size))
                .text_color(BinaryColor::On)
                .build();
            let position = Point::new(0, i32::from(line.y));
            if let Err(e) =
                Text::with_baseline(&line.text, position, style, Baseline::Top).draw(&mut display)
            {
                warn!("Failed to draw {}: {}", line.text.as_str(), Debug2Format(&e));
            }
        }

        if let Err(e) = display.flush().await {
            warn!("Failed to flush display: {}", Debug2Format(&e));
        }
    }
}
