//! Update-transfer framing and the firmware staging seam.
//!
//! A push session opens with one announcement line, `<password> <image-len>`,
//! followed by the raw image bytes. The received stream flows through
//! [`FirmwareSink`]; partition writing plugs in behind that seam without
//! touching the transfer logic.

/// Staging target for a pushed firmware image. `begin`, `write`, and `end`
/// mirror the transfer lifecycle; an error from any of them aborts the
/// session and leaves the running firmware unchanged.
pub trait FirmwareSink {
    type Error: core::fmt::Debug;

    fn begin(&mut self, image_len: usize) -> Result<(), Self::Error>;
    fn write(&mut self, chunk: &[u8]) -> Result<(), Self::Error>;
    fn end(&mut self) -> Result<(), Self::Error>;
}

/// Parses the announcement line. `None` for anything malformed.
pub fn parse_announcement(line: &str) -> Option<(&str, usize)> {
    let mut parts = line.trim_end().split(' ');
    let password = parts.next().filter(|password| !password.is_empty())?;
    let image_len = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((password, image_len))
}

#[derive(Debug, Eq, PartialEq)]
pub enum StreamError {
    /// More bytes arrived than the announcement declared.
    Overrun { declared: usize },
    /// The stream ended short of the declared length.
    Truncated { declared: usize, received: usize },
}

/// Sink that validates the stream against the declared length and discards
/// the bytes. Stands in where no flash staging backend is wired.
#[derive(Debug, Default)]
pub struct DiscardSink {
    declared: usize,
    received: usize,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FirmwareSink for DiscardSink {
    type Error = StreamError;

    fn begin(&mut self, image_len: usize) -> Result<(), Self::Error> {
        self.declared = image_len;
        self.received = 0;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), Self::Error> {
        self.received += chunk.len();
        if self.received > self.declared {
            return Err(StreamError::Overrun {
                declared: self.declared,
            });
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), Self::Error> {
        if self.received < self.declared {
            return Err(StreamError::Truncated {
                declared: self.declared,
                received: self.received,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_line_parses_password_and_length() {
        assert_eq!(parse_announcement("mellon 1024\n"), Some(("mellon", 1024)));
        assert_eq!(parse_announcement("mellon 1024"), Some(("mellon", 1024)));
    }

    #[test]
    fn malformed_announcements_are_rejected() {
        assert_eq!(parse_announcement(""), None);
        assert_eq!(parse_announcement("mellon"), None);
        assert_eq!(parse_announcement("mellon abc"), None);
        assert_eq!(parse_announcement("mellon 10 extra"), None);
        assert_eq!(parse_announcement(" 10"), None);
    }

    #[test]
    fn sink_rejects_short_and_long_streams() {
        let mut sink = DiscardSink::new();
        sink.begin(8).expect("begin");
        sink.write(&[0; 4]).expect("first half");
        assert_eq!(
            sink.end(),
            Err(StreamError::Truncated {
                declared: 8,
                received: 4
            })
        );

        sink.begin(8).expect("begin");
        sink.write(&[0; 8]).expect("image");
        assert_eq!(sink.write(&[0]), Err(StreamError::Overrun { declared: 8 }));
    }

    #[test]
    fn exact_length_stream_completes() {
        let mut sink = DiscardSink::new();
        sink.begin(8).expect("begin");
        sink.write(&[0; 8]).expect("image");
        sink.end().expect("end");
    }
}
