//! Board bring-up and the single-threaded firmware loop.
//!
//! Every pass is non-blocking: the network stack is pumped, the control core
//! is advanced once, and the pass ends with a short delay. There are no
//! tasks, interrupts drive nothing visible here.

use core::ops::Add;
use core::time::Duration;

use blocking_network_stack::Stack;
use door_core::button::PressEvent;
use door_core::control::{ControlLoop, NetworkServices, PassReport};
use door_core::doors::{DoorCommand, DoorSequencer};
use door_core::wifi::LinkEvent;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Pull};
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::rng::Rng;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_println::println;
use esp_wifi::wifi::WifiDevice;
use smoltcp::iface::{SocketSet, SocketStorage};
use smoltcp::socket::udp::PacketMetadata;
use smoltcp::wire::DhcpOption;

use crate::config;
use crate::hw::{FlashButton, ServoDoors, SERVO_HZ};
use crate::net::discovery::Discovery;
use crate::net::http::HttpServer;
use crate::net::ota::UpdateListener;
use crate::net::update::DiscardSink;
use crate::net::wifi::WifiLink;

esp_bootloader_esp_idf::esp_app_desc!();

/// Milliseconds since boot, wrapped to satisfy the control core's instant
/// bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct McuInstant(u64);

impl McuInstant {
    fn now() -> Self {
        Self(
            esp_hal::time::Instant::now()
                .duration_since_epoch()
                .as_millis(),
        )
    }
}

impl Add<Duration> for McuInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(
            self.0
                .saturating_add(u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX)),
        )
    }
}

/// The network surface polled by the control loop while the link is up.
struct Services<'s, 'n> {
    stack: &'s Stack<'n, WifiDevice<'n>>,
    discovery: Discovery<'s, 'n>,
    updates: UpdateListener<'s, 'n, DiscardSink>,
    http: HttpServer<'s, 'n>,
}

impl NetworkServices for Services<'_, '_> {
    fn activate(&mut self) {
        // Listeners bind lazily on their first poll; this is the one-time
        // announcement that the surface is now being serviced.
        println!(
            "services: http on port {}, updates on port {}, discovery as {}.local",
            config::HTTP_PORT,
            config::OTA_PORT,
            config::DEVICE_NAME
        );
    }

    fn handle(&mut self) -> Option<DoorCommand> {
        let ip = if self.stack.is_iface_up() {
            self.stack.get_ip_info().ok().map(|info| info.ip.octets())
        } else {
            None
        };
        self.discovery.poll(ip, McuInstant::now().0);
        self.updates.poll();
        self.http.poll()
    }
}

fn narrate(report: PassReport) {
    match report.link_event {
        Some(LinkEvent::Connected) => println!("wifi: connected"),
        Some(LinkEvent::ConnectTimedOut) => {
            println!("wifi: connection attempt timed out, retrying in 30 s");
        }
        Some(LinkEvent::ConnectionLost) => println!("wifi: connection lost, reconnecting"),
        None => {}
    }
    if report.press_event == Some(PressEvent::Pressed) {
        println!("button: press committed, opening both doors");
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    println!("gandalf: door controller starting");

    // Servo outputs on the LEDC low-speed channels.
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let mut servo_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    servo_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty12Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_hz(SERVO_HZ),
        })
        .expect("servo timer configuration");

    let mut first_servo = ledc.channel(channel::Number::Channel0, peripherals.GPIO13);
    first_servo
        .configure(channel::config::Config {
            timer: &servo_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("first servo channel configuration");
    let mut second_servo = ledc.channel(channel::Number::Channel1, peripherals.GPIO14);
    second_servo
        .configure(channel::config::Config {
            timer: &servo_timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .expect("second servo channel configuration");

    let button = FlashButton::new(Input::new(
        peripherals.GPIO0,
        InputConfig::default().with_pull(Pull::Up),
    ));

    // Wireless interface and the polled network stack.
    let mut rng = Rng::new(peripherals.RNG);
    let stack_seed = rng.random();
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let wifi_init = esp_wifi::init(timg0.timer0, rng, peripherals.RADIO_CLK)
        .expect("wifi driver initialization");
    let (mut controller, interfaces) =
        esp_wifi::wifi::new(&wifi_init, peripherals.WIFI).expect("wifi interface creation");
    let mut device = interfaces.sta;
    let iface = create_interface(&mut device);

    if let Err(err) = controller.set_power_saving(esp_wifi::config::PowerSaveMode::None) {
        println!("wifi: disabling power save failed: {err:?}");
    }

    let mut socket_set_entries: [SocketStorage; 4] = Default::default();
    let mut socket_set = SocketSet::new(&mut socket_set_entries[..]);
    let mut dhcp_socket = smoltcp::socket::dhcpv4::Socket::new();
    dhcp_socket.set_outgoing_options(&[DhcpOption {
        kind: 12,
        data: config::DEVICE_NAME.as_bytes(),
    }]);
    socket_set.add(dhcp_socket);

    let now_ms = || {
        esp_hal::time::Instant::now()
            .duration_since_epoch()
            .as_millis()
    };
    let stack = Stack::new(iface, device, socket_set, now_ms, stack_seed);

    let mut link = WifiLink::new(controller, config::WIFI_SSID, config::WIFI_PASSWORD);

    let mut http_rx = [0u8; 1536];
    let mut http_tx = [0u8; 1536];
    let mut ota_rx = [0u8; 1536];
    let mut ota_tx = [0u8; 512];
    let mut mdns_rx_meta = [PacketMetadata::EMPTY; 4];
    let mut mdns_rx = [0u8; 512];
    let mut mdns_tx_meta = [PacketMetadata::EMPTY; 4];
    let mut mdns_tx = [0u8; 512];

    let mut services = Services {
        stack: &stack,
        discovery: Discovery::new(
            stack.get_udp_socket(&mut mdns_rx_meta, &mut mdns_rx, &mut mdns_tx_meta, &mut mdns_tx),
            config::DEVICE_NAME,
            config::HTTP_PORT,
        ),
        updates: UpdateListener::new(
            stack.get_socket(&mut ota_rx, &mut ota_tx),
            config::OTA_PORT,
            config::OTA_PASSWORD,
            DiscardSink::new(),
        ),
        http: HttpServer::new(
            stack.get_socket(&mut http_rx, &mut http_tx),
            config::HTTP_PORT,
            config::API_KEY,
        ),
    };

    let doors = DoorSequencer::new(ServoDoors::new(first_servo, second_servo));
    let mut control = ControlLoop::new(doors);
    control.begin(&mut link, McuInstant::now());

    println!("gandalf: ready (button active even without wifi)");

    let delay = Delay::new();
    loop {
        stack.work();
        let report = control.poll(&mut link, &mut services, button.level(), McuInstant::now());
        narrate(report);
        delay.delay_millis(5);
    }
}

fn timestamp() -> smoltcp::time::Instant {
    let micros = esp_hal::time::Instant::now()
        .duration_since_epoch()
        .as_micros();
    smoltcp::time::Instant::from_micros(i64::try_from(micros).unwrap_or(i64::MAX))
}

fn create_interface(device: &mut WifiDevice) -> smoltcp::iface::Interface {
    smoltcp::iface::Interface::new(
        smoltcp::iface::Config::new(smoltcp::wire::HardwareAddress::Ethernet(
            smoltcp::wire::EthernetAddress::from_bytes(&device.mac_address()),
        )),
        device,
        timestamp(),
    )
}
