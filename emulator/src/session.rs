use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use door_core::auth::{self, RequestDecision};
use door_core::button::{DEBOUNCE_WINDOW, Level, PressEvent};
use door_core::control::{ControlLoop, NetworkServices, PassReport};
use door_core::doors::{DoorCommand, DoorDriver, DoorId, DoorSequencer};
use door_core::wifi::{Association, LinkEvent, LinkState};

/// One emulated pass of the firmware main loop, in milliseconds.
const TICK_MS: u64 = 10;

const DEFAULT_PRESS_HOLD_MS: u64 = 200;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "press",
        "press [<hold-ms>]          - hold the flash button, then release it",
    ),
    (
        "bounce",
        "bounce <ms>                - chatter the button line without settling",
    ),
    (
        "request",
        "request <path>[?query] [bearer <key>|auth <value>] - deliver an HTTP request",
    ),
    (
        "wifi",
        "wifi <up|down>             - make the access point reachable or not",
    ),
    (
        "tick",
        "tick <ms>                  - advance the clock with the button idle",
    ),
    (
        "status",
        "status                     - display link, door, and service state",
    ),
    (
        "help",
        "help [topic]               - show help for a command",
    ),
];

/// Milliseconds since session start, standing in for the firmware's
/// monotonic clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(
            self.0
                .saturating_add(u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX)),
        )
    }
}

/// Shared append-only sink for narration produced mid-pass by the door
/// driver and the request handler.
#[derive(Clone, Default)]
struct Narrator {
    now_ms: Rc<Cell<u64>>,
    lines: Rc<RefCell<Vec<String>>>,
}

impl Narrator {
    fn set_now(&self, ms: u64) {
        self.now_ms.set(ms);
    }

    fn say(&self, message: &str) {
        self.lines
            .borrow_mut()
            .push(format!("[+{:>6} ms] {message}", self.now_ms.get()));
    }

    fn drain(&self) -> Vec<String> {
        self.lines.borrow_mut().drain(..).collect()
    }
}

/// Wi-Fi link stub: associated exactly while the access point is reachable.
#[derive(Debug, Default)]
struct SimLink {
    reachable: bool,
}

impl Association for SimLink {
    fn begin(&mut self) {}

    fn is_associated(&self) -> bool {
        self.reachable
    }
}

/// Door driver that narrates motions instead of driving PWM.
struct NarratingDriver {
    narrator: Narrator,
}

impl DoorDriver for NarratingDriver {
    fn begin(&mut self) {
        self.narrator.say("doors: both actuators at rest");
    }

    fn hold_open(&mut self, door: DoorId) {
        self.narrator
            .say(&format!("{}: motion started, holding open", door_label(door)));
    }

    fn release(&mut self, door: DoorId) {
        self.narrator
            .say(&format!("{}: released, motion complete", door_label(door)));
    }
}

struct PendingRequest {
    path: String,
    query: Option<String>,
    authorization: Option<String>,
}

/// Network services stub: a queue of scripted HTTP requests, dispatched
/// one per pass through the same decision path the firmware uses.
struct SimServices {
    narrator: Narrator,
    pending: VecDeque<PendingRequest>,
    api_key: String,
    activated: bool,
}

impl NetworkServices for SimServices {
    fn activate(&mut self) {
        self.activated = true;
        self.narrator
            .say("services: http listener, update listener, and discovery up");
    }

    fn handle(&mut self) -> Option<DoorCommand> {
        let request = self.pending.pop_front()?;
        let decision = auth::decide(
            &request.path,
            request.query.as_deref(),
            request.authorization.as_deref(),
            &self.api_key,
        );
        match decision {
            RequestDecision::Accepted { body, command } => {
                self.narrator
                    .say(&format!("http 200 {}: {body}", request.path));
                command
            }
            RequestDecision::Unauthorized => {
                self.narrator.say(&format!(
                    "http 401 {}: {}",
                    request.path,
                    auth::UNAUTHORIZED_BODY
                ));
                None
            }
            RequestDecision::NotFound => {
                self.narrator.say(&format!("http 404 {}", request.path));
                None
            }
        }
    }
}

pub struct Session {
    clock_ms: u64,
    control: ControlLoop<SimInstant, NarratingDriver>,
    link: SimLink,
    services: SimServices,
    /// Button levels scheduled for upcoming passes; idle when empty.
    button_plan: VecDeque<Level>,
    narrator: Narrator,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(api_key: String, transcript_path: Option<&str>) -> io::Result<Self> {
        let transcript = transcript_path.map(TranscriptLogger::new).transpose()?;
        let narrator = Narrator::default();
        let driver = NarratingDriver {
            narrator: narrator.clone(),
        };
        let services = SimServices {
            narrator: narrator.clone(),
            pending: VecDeque::new(),
            api_key,
            activated: false,
        };
        let mut link = SimLink::default();
        let mut control = ControlLoop::new(DoorSequencer::new(driver));
        control.begin(&mut link, SimInstant(0));

        Ok(Self {
            clock_ms: 0,
            control,
            link,
            services,
            button_plan: VecDeque::new(),
            narrator,
            transcript,
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.log(TranscriptRole::Host, trimmed)?;

        let mut parts = trimmed.split_whitespace();
        let lines = match parts.next() {
            Some("help") => help_lines(parts.next()),
            Some("status") => self.handle_status(),
            Some("wifi") => self.handle_wifi(parts.next()),
            Some("press") => self.handle_press(parts.next()),
            Some("bounce") => self.handle_bounce(parts.next()),
            Some("request") => self.handle_request(trimmed),
            Some("tick") => self.handle_tick(parts.next()),
            Some(other) => vec![format!("ERR unknown command `{other}` (try `help`)")],
            None => Vec::new(),
        };

        for output in &lines {
            self.log(TranscriptRole::Emulator, output)?;
        }
        Ok(lines)
    }

    fn handle_status(&mut self) -> Vec<String> {
        let mut lines = vec![
            format!("clock: +{} ms", self.clock_ms),
            format!(
                "wifi: {} (attempts={}, ap {})",
                link_state_label(self.control.connectivity().state()),
                self.control.connectivity().attempts(),
                if self.link.reachable {
                    "reachable"
                } else {
                    "unreachable"
                }
            ),
            format!(
                "services: {}",
                if self.services.activated {
                    "activated"
                } else {
                    "not yet activated"
                }
            ),
        ];
        for door in DoorId::ALL {
            lines.push(format!(
                "{}: {}",
                door_label(door),
                if self.control.doors().is_moving(door) {
                    "moving"
                } else {
                    "at rest"
                }
            ));
        }
        lines
    }

    fn handle_wifi(&mut self, arg: Option<&str>) -> Vec<String> {
        match arg {
            Some("up") => {
                self.link.reachable = true;
                self.advance(TICK_MS)
            }
            Some("down") => {
                self.link.reachable = false;
                self.advance(TICK_MS)
            }
            _ => vec!["ERR syntax: wifi <up|down>".to_string()],
        }
    }

    fn handle_press(&mut self, arg: Option<&str>) -> Vec<String> {
        let hold_ms = match arg {
            None => DEFAULT_PRESS_HOLD_MS,
            Some(value) => match value.parse::<u64>() {
                Ok(ms) => ms,
                Err(_) => return vec!["ERR syntax: press [<hold-ms>]".to_string()],
            },
        };

        let held_passes = hold_ms.div_ceil(TICK_MS);
        for _ in 0..held_passes {
            self.button_plan.push_back(Level::Low);
        }
        // Run the held passes plus the release settling time.
        self.advance(held_passes * TICK_MS + debounce_window_ms() + TICK_MS)
    }

    fn handle_bounce(&mut self, arg: Option<&str>) -> Vec<String> {
        let Some(ms) = arg.and_then(|value| value.parse::<u64>().ok()) else {
            return vec!["ERR syntax: bounce <ms>".to_string()];
        };

        let edges = ms.div_ceil(TICK_MS);
        for pass in 0..edges {
            // Alternate every pass so no level is ever stable for the window.
            self.button_plan.push_back(if pass % 2 == 0 {
                Level::Low
            } else {
                Level::High
            });
        }
        let mut lines = self.advance(edges * TICK_MS + debounce_window_ms());
        lines.push(format!("bounce: {ms} ms of chatter delivered"));
        lines
    }

    fn handle_request(&mut self, line: &str) -> Vec<String> {
        let rest = line.strip_prefix("request").unwrap_or("").trim_start();
        if rest.is_empty() {
            return vec![
                "ERR syntax: request <path>[?query] [bearer <key>|auth <value>]".to_string(),
            ];
        }

        let mut parts = rest.split_whitespace();
        let target = parts.next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };

        let authorization = match parts.next() {
            None => None,
            Some("bearer") => match parts.next() {
                Some(key) => Some(format!("Bearer {key}")),
                None => return vec!["ERR syntax: request ... bearer <key>".to_string()],
            },
            Some("auth") => match parts.next() {
                Some(value) => Some(value.to_string()),
                None => return vec!["ERR syntax: request ... auth <value>".to_string()],
            },
            Some(other) => {
                return vec![format!("ERR unknown request option `{other}`")];
            }
        };

        self.services.pending.push_back(PendingRequest {
            path,
            query,
            authorization,
        });
        self.advance(TICK_MS)
    }

    fn handle_tick(&mut self, arg: Option<&str>) -> Vec<String> {
        match arg.and_then(|value| value.parse::<u64>().ok()) {
            Some(ms) => self.advance(ms),
            None => vec!["ERR syntax: tick <ms>".to_string()],
        }
    }

    /// Advances the simulated clock in fixed passes, collecting every line
    /// the pass narration produced.
    fn advance(&mut self, ms: u64) -> Vec<String> {
        let passes = ms.div_ceil(TICK_MS);
        for _ in 0..passes {
            self.clock_ms += TICK_MS;
            self.narrator.set_now(self.clock_ms);
            let level = self.button_plan.pop_front().unwrap_or(Level::High);
            let now = SimInstant(self.clock_ms);
            let report = self
                .control
                .poll(&mut self.link, &mut self.services, level, now);
            self.narrate_report(report);
        }

        self.narrator.drain()
    }

    fn narrate_report(&self, report: PassReport) {
        if let Some(event) = report.link_event {
            self.narrator.say(match event {
                LinkEvent::Connected => "wifi: connected",
                LinkEvent::ConnectTimedOut => "wifi: connect attempt timed out",
                LinkEvent::ConnectionLost => "wifi: connection lost, reconnecting",
            });
        }
        if let Some(event) = report.press_event {
            self.narrator.say(match event {
                PressEvent::Pressed => "button: press committed",
                PressEvent::Released => "button: released",
            });
        }
    }

    fn log(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        if let Some(transcript) = &mut self.transcript {
            transcript.append_line(self.clock_ms, role, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) if !target.is_empty() => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        _ => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn debounce_window_ms() -> u64 {
    u64::try_from(DEBOUNCE_WINDOW.as_millis()).unwrap_or(u64::MAX)
}

fn door_label(door: DoorId) -> &'static str {
    match door {
        DoorId::First => "door1",
        DoorId::Second => "door2",
    }
}

fn link_state_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Disconnected => "disconnected",
        LinkState::Connecting => "connecting",
        LinkState::Connected => "connected",
        LinkState::Failed => "failed",
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(name);
    }
    buffer
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &str) -> io::Result<Self> {
        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Gandalf door controller emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, clock_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{clock_ms:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("speak-friend".to_string(), None).expect("session")
    }

    #[test]
    fn press_opens_both_doors_without_network() {
        let mut session = session();
        let lines = session.handle_command("press").expect("press");
        assert!(lines.iter().any(|line| line.contains("press committed")));
        assert!(
            lines
                .iter()
                .any(|line| line.contains("door1: motion started"))
        );
        assert!(
            lines
                .iter()
                .any(|line| line.contains("door2: motion started"))
        );
    }

    #[test]
    fn bounce_never_commits_a_press() {
        let mut session = session();
        let lines = session.handle_command("bounce 500").expect("bounce");
        assert!(!lines.iter().any(|line| line.contains("press committed")));
        assert!(!lines.iter().any(|line| line.contains("motion started")));
    }

    #[test]
    fn queued_request_is_held_until_the_link_is_up() {
        let mut session = session();
        let lines = session
            .handle_command("request /openFirstDoor?key=speak-friend")
            .expect("request");
        assert!(!lines.iter().any(|line| line.contains("http 200")));

        // First connected pass activates services and drains the queue.
        let lines = session.handle_command("wifi up").expect("wifi up");
        assert!(lines.iter().any(|line| line.contains("wifi: connected")));
        assert!(lines.iter().any(|line| line.contains("http 200")));
        assert!(
            lines
                .iter()
                .any(|line| line.contains("door1: motion started"))
        );
    }

    #[test]
    fn bearer_header_is_accepted() {
        let mut session = session();
        session.handle_command("wifi up").expect("wifi up");
        let lines = session
            .handle_command("request /openSecondDoor bearer speak-friend")
            .expect("request");
        assert!(lines.iter().any(|line| line.contains("http 200")));
        assert!(
            lines
                .iter()
                .any(|line| line.contains("door2: motion started"))
        );
    }

    #[test]
    fn wrong_key_yields_401_and_no_motion() {
        let mut session = session();
        session.handle_command("wifi up").expect("wifi up");
        let lines = session
            .handle_command("request /openBothDoors?key=wrong")
            .expect("request");
        assert!(lines.iter().any(|line| line.contains("http 401")));
        assert!(!lines.iter().any(|line| line.contains("motion started")));
    }

    #[test]
    fn services_activate_once_on_first_connect() {
        let mut session = session();
        let lines = session.handle_command("wifi up").expect("wifi up");
        assert!(lines.iter().any(|line| line.contains("wifi: connected")));
        assert!(lines.iter().any(|line| line.contains("services:")));

        session.handle_command("wifi down").expect("wifi down");
        let lines = session.handle_command("wifi up").expect("wifi up");
        assert!(lines.iter().any(|line| line.contains("wifi: connected")));
        assert!(!lines.iter().any(|line| line.contains("services:")));
    }
}
