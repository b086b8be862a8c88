//! Polled update-transfer listener.
//!
//! Accepts a push session on the update port, checks the announcement line
//! against the OTA password, and streams the image into the configured
//! [`FirmwareSink`](super::update::FirmwareSink). Every failure mode is
//! logged and drops the session; the running firmware is never affected by
//! a failed push.

use blocking_network_stack::Socket;
use embedded_io::{Read, Write};
use esp_println::println;
use esp_wifi::wifi::WifiDevice;

use super::update::{FirmwareSink, parse_announcement};

const CHUNK_LEN: usize = 1024;

pub struct UpdateListener<'s, 'n, S> {
    socket: Socket<'s, 'n, WifiDevice<'n>>,
    port: u16,
    password: &'static str,
    sink: S,
    listening: bool,
}

impl<'s, 'n, S: FirmwareSink> UpdateListener<'s, 'n, S> {
    pub fn new(
        socket: Socket<'s, 'n, WifiDevice<'n>>,
        port: u16,
        password: &'static str,
        sink: S,
    ) -> Self {
        Self {
            socket,
            port,
            password,
            sink,
            listening: false,
        }
    }

    /// Services at most one push session.
    pub fn poll(&mut self) {
        self.socket.work();

        if !self.listening {
            match self.socket.listen(self.port) {
                Ok(()) => self.listening = true,
                Err(err) => {
                    println!("ota: listen on port {} failed: {err:?}", self.port);
                }
            }
            return;
        }

        if !self.socket.is_connected() {
            return;
        }

        self.serve();
        self.socket.close();
        self.listening = false;
    }

    fn serve(&mut self) {
        let mut buffer = [0u8; CHUNK_LEN];
        let mut filled = 0;

        // Announcement line first.
        let line_end = loop {
            if filled == buffer.len() {
                println!("ota: announcement line too long, refusing");
                return;
            }
            match self.socket.read(&mut buffer[filled..]) {
                Ok(0) => return,
                Ok(len) => {
                    filled += len;
                    if let Some(end) = buffer[..filled].iter().position(|byte| *byte == b'\n') {
                        break end;
                    }
                }
                Err(err) => {
                    println!("ota: read failed before announcement: {err:?}");
                    return;
                }
            }
        };

        let Some((password, image_len)) = core::str::from_utf8(&buffer[..line_end])
            .ok()
            .and_then(parse_announcement)
        else {
            println!("ota: malformed announcement, refusing");
            return;
        };
        if password != self.password {
            println!("ota: authentication failed, refusing update");
            let _ = self.socket.write_all(b"ERR auth\n");
            return;
        }

        if let Err(err) = self.sink.begin(image_len) {
            println!("ota: begin failed: {err:?}");
            return;
        }
        if self.socket.write_all(b"OK\n").is_err() {
            println!("ota: handshake write failed, aborting");
            return;
        }
        println!("ota: receiving update image ({image_len} bytes)");

        // Bytes that arrived with the announcement belong to the image.
        let mut received = filled - (line_end + 1);
        if received > 0
            && let Err(err) = self.sink.write(&buffer[line_end + 1..filled])
        {
            println!("ota: receive failed: {err:?}");
            return;
        }

        while received < image_len {
            match self.socket.read(&mut buffer) {
                Ok(0) => break,
                Ok(len) => {
                    received += len;
                    if let Err(err) = self.sink.write(&buffer[..len]) {
                        println!("ota: receive failed: {err:?}");
                        return;
                    }
                }
                Err(err) => {
                    println!("ota: receive failed: {err:?}");
                    return;
                }
            }
        }

        match self.sink.end() {
            Ok(()) => {
                println!("ota: update received; staging sink accepted {received} bytes");
                let _ = self.socket.write_all(b"DONE\n");
                let _ = self.socket.flush();
            }
            Err(err) => println!("ota: end failed: {err:?}"),
        }
    }
}
