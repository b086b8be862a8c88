//! Service advertisement over a polled multicast UDP socket.
//!
//! Announces once the interface has an address, re-announces periodically,
//! and answers incoming queries with the same frame.

use blocking_network_stack::UdpSocket;
use esp_println::println;
use esp_wifi::wifi::WifiDevice;
use smoltcp::wire::{IpAddress, Ipv4Address};

use super::mdns::{self, Announcement};

const REANNOUNCE_INTERVAL_MS: u64 = 30_000;

pub struct Discovery<'s, 'n> {
    socket: UdpSocket<'s, 'n, WifiDevice<'n>>,
    name: &'static str,
    http_port: u16,
    announcement: Option<Announcement>,
    last_announced_ms: u64,
}

impl<'s, 'n> Discovery<'s, 'n> {
    pub fn new(socket: UdpSocket<'s, 'n, WifiDevice<'n>>, name: &'static str, http_port: u16) -> Self {
        Self {
            socket,
            name,
            http_port,
            announcement: None,
            last_announced_ms: 0,
        }
    }

    pub fn poll(&mut self, ip: Option<[u8; 4]>, now_ms: u64) {
        self.socket.work();

        let Some(frame) = self.announcement else {
            let Some(ip) = ip else { return };
            self.bring_up(ip, now_ms);
            return;
        };

        if now_ms.saturating_sub(self.last_announced_ms) >= REANNOUNCE_INTERVAL_MS {
            self.send(frame.as_bytes());
            self.last_announced_ms = now_ms;
        }

        let mut buffer = [0u8; 512];
        if let Ok((len, _source, _port)) = self.socket.receive(&mut buffer)
            && mdns::is_query(&buffer[..len])
        {
            let reply = frame.reply_to(&buffer[..len]);
            self.send(reply.as_bytes());
        }
    }

    fn bring_up(&mut self, ip: [u8; 4], now_ms: u64) {
        if let Err(err) = self.socket.bind(mdns::PORT) {
            println!("mdns: bind failed: {err:?}");
            return;
        }
        let group = IpAddress::Ipv4(Ipv4Address::new(
            mdns::GROUP[0],
            mdns::GROUP[1],
            mdns::GROUP[2],
            mdns::GROUP[3],
        ));
        if let Err(err) = self.socket.join_multicast_group(group) {
            // Queries will be missed; periodic announcements still go out.
            println!("mdns: joining the multicast group failed: {err:?}");
        }

        let frame = mdns::http_announcement(self.name, ip, self.http_port);
        self.send(frame.as_bytes());
        println!(
            "mdns: announcing {}.local at {}.{}.{}.{}",
            self.name, ip[0], ip[1], ip[2], ip[3]
        );
        self.announcement = Some(frame);
        self.last_announced_ms = now_ms;
    }

    fn send(&mut self, payload: &[u8]) {
        let group = IpAddress::Ipv4(Ipv4Address::new(
            mdns::GROUP[0],
            mdns::GROUP[1],
            mdns::GROUP[2],
            mdns::GROUP[3],
        ));
        if let Err(err) = self.socket.send(group, mdns::PORT, payload) {
            println!("mdns: send failed: {err:?}");
        }
    }
}
