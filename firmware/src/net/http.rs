//! Polled HTTP endpoint for the door routes.
//!
//! One TCP socket, one request per loop pass: accept, read the head, decide
//! through `door_core::auth`, respond, close. A handled request surfaces at
//! most one door command for the control loop to apply.

use core::fmt::Write as _;

use blocking_network_stack::Socket;
use door_core::auth::{self, RequestDecision};
use door_core::doors::DoorCommand;
use embedded_io::{Read, Write};
use esp_println::println;
use esp_wifi::wifi::WifiDevice;

const HEAD_BUFFER_LEN: usize = 1024;

pub struct HttpServer<'s, 'n> {
    socket: Socket<'s, 'n, WifiDevice<'n>>,
    port: u16,
    api_key: &'static str,
    listening: bool,
}

impl<'s, 'n> HttpServer<'s, 'n> {
    pub fn new(socket: Socket<'s, 'n, WifiDevice<'n>>, port: u16, api_key: &'static str) -> Self {
        Self {
            socket,
            port,
            api_key,
            listening: false,
        }
    }

    /// Services at most one request. Never spins: without a connected client
    /// this is a listen check and nothing more.
    pub fn poll(&mut self) -> Option<DoorCommand> {
        self.socket.work();

        if !self.listening {
            match self.socket.listen(self.port) {
                Ok(()) => self.listening = true,
                Err(err) => {
                    println!("http: listen on port {} failed: {err:?}", self.port);
                }
            }
            return None;
        }

        if !self.socket.is_connected() {
            return None;
        }

        let command = self.serve();
        self.socket.close();
        self.listening = false;
        command
    }

    /// Reads one request head and answers it.
    fn serve(&mut self) -> Option<DoorCommand> {
        let mut buffer = [0u8; HEAD_BUFFER_LEN];
        let mut filled = 0;

        let head_len = loop {
            if filled == buffer.len() {
                println!("http: request head too large, dropping connection");
                return None;
            }
            match self.socket.read(&mut buffer[filled..]) {
                Ok(0) => return None,
                Ok(len) => {
                    filled += len;
                    if let Some(end) = super::request::head_complete(&buffer[..filled]) {
                        break end;
                    }
                }
                Err(err) => {
                    println!("http: read failed: {err:?}");
                    return None;
                }
            }
        };

        let Ok(head) = core::str::from_utf8(&buffer[..head_len]) else {
            self.respond(400, "Bad Request", "");
            return None;
        };
        let Some(request) = super::request::parse(head) else {
            self.respond(400, "Bad Request", "");
            return None;
        };

        // Preflight gets the CORS set and nothing else.
        if request.method == "OPTIONS" {
            self.respond(200, "OK", "");
            return None;
        }

        match auth::decide(
            request.path,
            request.query,
            request.authorization,
            self.api_key,
        ) {
            RequestDecision::Accepted { body, command } => {
                self.respond(200, "OK", body);
                command
            }
            RequestDecision::Unauthorized => {
                self.respond(401, "Unauthorized", auth::UNAUTHORIZED_BODY);
                None
            }
            RequestDecision::NotFound => {
                self.respond(404, "Not Found", "Not Found");
                None
            }
        }
    }

    fn respond(&mut self, status: u16, reason: &str, body: &str) {
        let mut head: heapless::String<512> = heapless::String::new();
        let mut build = || -> core::fmt::Result {
            write!(head, "HTTP/1.0 {status} {reason}\r\n")?;
            for (name, value) in auth::CORS_HEADERS {
                write!(head, "{name}: {value}\r\n")?;
            }
            write!(
                head,
                "Content-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
        };
        if build().is_err() {
            println!("http: response head overflow");
            return;
        }

        let written = self
            .socket
            .write_all(head.as_bytes())
            .and_then(|()| self.socket.write_all(body.as_bytes()))
            .and_then(|()| self.socket.flush());
        if let Err(err) = written {
            println!("http: write failed: {err:?}");
        }
    }
}
