use assign_resources::assign_resources;
use embassy_rp::i2c::InterruptHandler as I2cInterruptHandler;
use embassy_rp::peripherals::{I2C0, PIO0};
use embassy_rp::pio::InterruptHandler;
use embassy_rp::{Peri, bind_interrupts, peripherals};

// group the peripherals into resources, to be used in the tasks
// the resources are assigned to the tasks in main.rs
assign_resources! {
    buttons: ButtonResources {
        a_pin: PIN_20,
        b_pin: PIN_21,
        c_pin: PIN_22,
        set_pin: PIN_19,
    },
    buzzer: BuzzerResources {
        buzzer_pin: PIN_15,
    },
    wifi: WifiResources {
        pwr_pin: PIN_23,
        cs_pin: PIN_25,
        pio_sm: PIO0,
        dio_pin: PIN_24,
        clk_pin: PIN_29,
        dma_ch: DMA_CH0,
    },
    rtc: RtcResources {
        rtc_inst: RTC,
    },
    display: DisplayResources {
        scl: PIN_13,
        sda: PIN_12,
        i2c0: I2C0,
    },
    flash: FlashResources {
        flash: FLASH,
        dma_ch: DMA_CH1,
    },
}

// bind the interrupts, on a global scope
bind_interrupts!(pub struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
    I2C0_IRQ => I2cInterruptHandler<I2C0>;
});
