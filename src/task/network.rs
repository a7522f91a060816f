//! # Network task
//! Joins the WiFi network to set the RTC from a time API and to post telemetry. The radio is only
//! associated while there is something to do: a time sync every few hours, or telemetry the control
//! task queued.
//!
//! # populate constants SSID and PASSWORD
//! make sure to have a `wifi_config.json` file in the config folder formatted as follows:
//!```json
//!  {
//!     "ssid": "some_ssid_here",
//!     "password": "some_password_here"
//! }
//! ```
//!
//! # populate constant `TIME_SERVER_URL`
//! make sure to have a `time_api.json` file in the config folder formatted as follows:
//! ```json
//! {
//!     "time api by zone": {
//!         "baseurl": "http://worldtimeapi.org/api",
//!         "timezone": "/timezone/Etc/UTC"
//!     }
//! }
//! ```
//!
//! # populate constants `TELEMETRY_URL` and `DEVICE_ID`
//! make sure to have a `telemetry.json` file in the config folder formatted as follows:
//! ```json
//! {
//!     "url": "https://example.com/telemetry",
//!     "device_id": "alarmclock-1"
//! }
//! ```
//! build.rs creates any of these with dummy values if they are missing.

include!(concat!(env!("OUT_DIR"), "/wifi_secrets.rs"));
include!(concat!(env!("OUT_DIR"), "/time_api_config.rs"));
include!(concat!(env!("OUT_DIR"), "/telemetry_config.rs"));

use crate::task::resources::{Irqs, WifiResources};
use crate::task::rtc;
use crate::task::task_messages::{try_take_telemetry, wait_for_telemetry};
use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use defmt::{Debug2Format, Format, error, info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::dns::DnsSocket;
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::{Config, DhcpConfig, Stack, StackResources};
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use embassy_time::{Duration, Instant, Timer, with_timeout};
use rand::RngCore;
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::headers::ContentType;
use reqwless::request::{Method, RequestBuilder};
use serde::Deserialize;
use smart_snooze_alarmclock::clock::Timestamp;
use smart_snooze_alarmclock::telemetry::{MAX_MESSAGE_LEN, Telemetry};
use static_cell::StaticCell;

/// Time between two successful time syncs
const REFRESH_AFTER: Duration = Duration::from_secs(21_600);

/// Time before retrying a failed time sync
const RETRY_AFTER: Duration = Duration::from_secs(30);

/// Timeout for joining the network
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls of the DHCP and link state before giving up
const STACK_POLLS: u32 = 100;

/// Ways a network session can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
enum NetError {
    /// The access point refused us
    Join,
    /// Joining took too long
    JoinTimeout,
    /// No address from DHCP
    Dhcp,
    /// The link never came up
    Link,
    /// The HTTP request failed
    Http,
    /// The server answered with an error status
    Status,
    /// The time API answer could not be parsed
    Parse,
    /// The RTC refused the new time
    Rtc,
    /// The telemetry message did not fit the buffer
    Encode,
}

/// The part of the time API answer we use
#[derive(Deserialize)]
struct TimeApiResponse {
    /// Seconds since the unix epoch
    unixtime: i64,
}

/// Everything a session needs to make requests
struct Net {
    /// WiFi chip control
    control: cyw43::Control<'static>,
    /// IP stack
    stack: Stack<'static>,
    /// Seed for TLS
    seed: u64,
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
pub async fn network(spawner: Spawner, r: WifiResources) {
    info!("Network task started");

    let pwr = Output::new(r.pwr_pin, Level::Low);
    let cs = Output::new(r.cs_pin, Level::High);
    let mut pio = Pio::new(r.pio_sm, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio_pin,
        r.clk_pin,
        r.dma_ch,
    );

    // SAFETY: the cyw43 firmware and CLM blobs are flashed to these fixed addresses alongside the
    // application
    let fw = unsafe { core::slice::from_raw_parts(0x1010_0000 as *const u8, 230_321) };
    let clm = unsafe { core::slice::from_raw_parts(0x1014_0000 as *const u8, 4752) };

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    unwrap!(spawner.spawn(cyw43_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    let mut dhcp_config = DhcpConfig::default();
    dhcp_config.hostname = "alarmclck".try_into().ok();
    let config = Config::dhcpv4(dhcp_config);

    let seed = RoscRng.next_u64();

    static RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();
    let (stack, runner) =
        embassy_net::new(net_device, config, RESOURCES.init(StackResources::new()), seed);
    unwrap!(spawner.spawn(net_task(runner)));

    let mut net = Net { control, stack, seed };
    let mut next_sync = Instant::now();
    loop {
        match select(Timer::at(next_sync), wait_for_telemetry()).await {
            Either::First(()) => {
                let result = match net.connect().await {
                    Ok(()) => net.sync_time().await,
                    Err(e) => Err(e),
                };
                net.disconnect().await;
                next_sync = Instant::now()
                    + match result {
                        Ok(()) => REFRESH_AFTER,
                        Err(e) => {
                            warn!(
                                "Time sync failed: {}, retrying in {} s",
                                e,
                                RETRY_AFTER.as_secs()
                            );
                            RETRY_AFTER
                        }
                    };
            }
            Either::Second(message) => {
                let result = match net.connect().await {
                    Ok(()) => net.send_all_telemetry(message).await,
                    Err(e) => Err(e),
                };
                net.disconnect().await;
                if let Err(e) = result {
                    // fire and forget
                    warn!("Telemetry dropped: {}", e);
                }
            }
        }
    }
}

impl Net {
    /// Leave the network until there is something to do again
    async fn disconnect(&mut self) {
        self.control.leave().await;
        self.control.gpio_set(0, false).await; // Turn off the onboard LED
        info!("Disconnected from wifi");
    }

    /// Join the network and wait for an address
    async fn connect(&mut self) -> Result<(), NetError> {
        info!("Joining WPA2 network with SSID: {:?}", SSID);
        let join = self.control.join(SSID, JoinOptions::new(PASSWORD.as_bytes()));
        match with_timeout(JOIN_TIMEOUT, join).await {
            Ok(Ok(())) => {
                self.control.gpio_set(0, true).await; // Turn on the onboard LED
                info!("Connected to wifi");
            }
            Ok(Err(e)) => {
                error!("Error connecting to wifi: {}", Debug2Format(&e));
                return Err(NetError::Join);
            }
            Err(_) => return Err(NetError::JoinTimeout),
        }

        let mut polls = 0;
        while !self.stack.is_config_up() {
            if polls > STACK_POLLS {
                return Err(NetError::Dhcp);
            }
            polls += 1;
            Timer::after_millis(100).await;
        }
        polls = 0;
        while !self.stack.is_link_up() {
            if polls > STACK_POLLS {
                return Err(NetError::Link);
            }
            polls += 1;
            Timer::after_millis(500).await;
        }
        self.stack.wait_config_up().await;
        Ok(())
    }

    /// Fetch the current time and set the RTC
    async fn sync_time(&mut self) -> Result<(), NetError> {
        let mut rx_buffer = [0; 8192];
        let mut tls_read_buffer = [0; 16640];
        let mut tls_write_buffer = [0; 16640];

        let client_state = TcpClientState::<1, 1024, 1024>::new();
        let tcp_client = TcpClient::new(self.stack, &client_state);
        let dns_client = DnsSocket::new(self.stack);
        let tls_config = TlsConfig::new(
            self.seed,
            &mut tls_read_buffer,
            &mut tls_write_buffer,
            TlsVerify::None,
        );
        let mut http_client = HttpClient::new_with_tls(&tcp_client, &dns_client, tls_config);

        let mut request = http_client
            .request(Method::GET, TIME_SERVER_URL)
            .await
            .map_err(|e| {
                error!("Failed to make HTTP request: {:?}", Debug2Format(&e));
                NetError::Http
            })?;
        let response = request.send(&mut rx_buffer).await.map_err(|e| {
            error!("Failed to send HTTP request: {:?}", Debug2Format(&e));
            NetError::Http
        })?;
        if !response.status.is_successful() {
            return Err(NetError::Status);
        }
        let body = response.body().read_to_end().await.map_err(|e| {
            error!("Failed to read response body: {:?}", Debug2Format(&e));
            NetError::Http
        })?;

        let (answer, _used) = serde_json_core::from_slice::<TimeApiResponse>(body).map_err(|e| {
            error!("Failed to parse response body: {:?}", Debug2Format(&e));
            NetError::Parse
        })?;
        info!("Time server says {}", answer.unixtime);
        rtc::set_time(Timestamp::from_unix(answer.unixtime)).map_err(|_| NetError::Rtc)
    }

    /// Post `first` and whatever else was queued meanwhile
    async fn send_all_telemetry(&mut self, first: Telemetry) -> Result<(), NetError> {
        self.post_telemetry(&first).await?;
        while let Some(message) = try_take_telemetry() {
            self.post_telemetry(&message).await?;
        }
        Ok(())
    }

    /// Post one telemetry message, tagged with the device id
    async fn post_telemetry(&mut self, message: &Telemetry) -> Result<(), NetError> {
        let mut json = [0; MAX_MESSAGE_LEN];
        let len = message.write_json(&mut json).map_err(|_| NetError::Encode)?;

        let mut rx_buffer = [0; 1024];
        let mut tls_read_buffer = [0; 16640];
        let mut tls_write_buffer = [0; 16640];

        let client_state = TcpClientState::<1, 1024, 1024>::new();
        let tcp_client = TcpClient::new(self.stack, &client_state);
        let dns_client = DnsSocket::new(self.stack);
        let tls_config = TlsConfig::new(
            self.seed,
            &mut tls_read_buffer,
            &mut tls_write_buffer,
            TlsVerify::None,
        );
        let mut http_client = HttpClient::new_with_tls(&tcp_client, &dns_client, tls_config);

        let headers = [("DeviceId", DEVICE_ID)];
        let mut request = http_client
            .request(Method::POST, TELEMETRY_URL)
            .await
            .map_err(|e| {
                error!("Failed to make HTTP request: {:?}", Debug2Format(&e));
                NetError::Http
            })?
            .headers(&headers)
            .content_type(ContentType::ApplicationJson)
            .body(&json[..len]);
        let response = request.send(&mut rx_buffer).await.map_err(|e| {
            error!("Failed to post telemetry: {:?}", Debug2Format(&e));
            NetError::Http
        })?;
        if response.status.is_successful() {
            info!("Telemetry sent");
            Ok(())
        } else {
            Err(NetError::Status)
        }
    }
}
