//! mDNS announcement packet layout for the HTTP service.
//!
//! One response frame carrying PTR, SRV, and A records for
//! `<name>._http._tcp.local`, reused for the startup announcement, the
//! periodic re-announcement, and query replies (with the transaction id
//! swapped in).

pub const PORT: u16 = 5353;
pub const GROUP: [u8; 4] = [224, 0, 0, 251];

const TTL_SECONDS: u32 = 120;
const FLAGS_AUTHORITATIVE_RESPONSE: u16 = 0x8400;
const CLASS_IN_CACHE_FLUSH: u16 = 0x8001;
const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_SRV: u16 = 33;

const SERVICE_LABELS: [&str; 3] = ["_http", "_tcp", "local"];

/// A ready-to-send response frame.
#[derive(Copy, Clone, Debug)]
pub struct Announcement {
    buffer: [u8; 256],
    len: usize,
}

impl Announcement {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Copy of this frame carrying the query's transaction id, for direct
    /// replies.
    #[must_use]
    pub fn reply_to(&self, query: &[u8]) -> Self {
        let mut reply = *self;
        if let Some(id) = query.get(..2) {
            reply.buffer[..2].copy_from_slice(id);
        }
        reply
    }
}

/// Whether a received frame is an mDNS query we should answer.
pub fn is_query(packet: &[u8]) -> bool {
    packet.len() > 12 && packet[2] & 0x80 == 0
}

/// Builds the announcement for `<name>.local` serving HTTP on `port`.
pub fn http_announcement(name: &str, ip: [u8; 4], port: u16) -> Announcement {
    let mut writer = Writer::new();

    // Header: response + authoritative, three answer records.
    writer.push_u16(0); // transaction id
    writer.push_u16(FLAGS_AUTHORITATIVE_RESPONSE);
    writer.push_u16(0); // questions
    writer.push_u16(3); // answers
    writer.push_u16(0); // authority
    writer.push_u16(0); // additional

    // PTR: _http._tcp.local -> <name>._http._tcp.local
    for label in SERVICE_LABELS {
        writer.push_label(label);
    }
    writer.push(&[0]);
    writer.push_u16(TYPE_PTR);
    writer.push_u16(CLASS_IN_CACHE_FLUSH);
    writer.push_u32(TTL_SECONDS);
    writer.push_u16(encoded_len(name) + encoded_names_len(&SERVICE_LABELS));
    let instance_offset = writer.position();
    writer.push_label(name);
    for label in SERVICE_LABELS {
        writer.push_label(label);
    }
    writer.push(&[0]);

    // SRV: <name>._http._tcp.local -> <name>.local:port
    writer.push_pointer(instance_offset);
    writer.push_u16(TYPE_SRV);
    writer.push_u16(CLASS_IN_CACHE_FLUSH);
    writer.push_u32(TTL_SECONDS);
    writer.push_u16(6 + encoded_len(name) + encoded_names_len(&["local"]));
    writer.push_u16(0); // priority
    writer.push_u16(0); // weight
    writer.push_u16(port);
    let hostname_offset = writer.position();
    writer.push_label(name);
    writer.push_label("local");
    writer.push(&[0]);

    // A: <name>.local -> ip
    writer.push_pointer(hostname_offset);
    writer.push_u16(TYPE_A);
    writer.push_u16(CLASS_IN_CACHE_FLUSH);
    writer.push_u32(TTL_SECONDS);
    writer.push_u16(4);
    writer.push(&ip);

    writer.finish()
}

/// Length of one encoded label (length byte + bytes).
fn encoded_len(label: &str) -> u16 {
    u16::try_from(1 + label.len()).unwrap_or(0)
}

/// Length of a label run plus the root terminator.
fn encoded_names_len(labels: &[&str]) -> u16 {
    labels
        .iter()
        .fold(1, |total, label| total + encoded_len(label))
}

struct Writer {
    buffer: [u8; 256],
    position: usize,
}

impl Writer {
    fn new() -> Self {
        Self {
            buffer: [0; 256],
            position: 0,
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn push(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if let Some(slot) = self.buffer.get_mut(self.position..end) {
            slot.copy_from_slice(bytes);
            self.position = end;
        }
    }

    fn push_u16(&mut self, value: u16) {
        self.push(&value.to_be_bytes());
    }

    fn push_u32(&mut self, value: u32) {
        self.push(&value.to_be_bytes());
    }

    fn push_label(&mut self, label: &str) {
        // DNS labels cap at 63 bytes; longer names are dropped rather than
        // truncated into a different name.
        if let Ok(len) = u8::try_from(label.len())
            && len <= 63
        {
            self.push(&[len]);
            self.push(label.as_bytes());
        }
    }

    fn push_pointer(&mut self, offset: usize) {
        let offset = u16::try_from(offset).unwrap_or(0);
        self.push_u16(0xC000 | offset);
    }

    fn finish(self) -> Announcement {
        Announcement {
            buffer: self.buffer,
            len: self.position,
        }
    }
}
