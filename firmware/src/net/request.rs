//! Minimal HTTP/1.x request-head parsing for the polled endpoint.
//!
//! Only what the door routes need: the request line and the Authorization
//! header. Bodies are never read; every route responds from the head alone.

/// Parsed view into a request head buffer.
#[derive(Debug, Eq, PartialEq)]
pub struct RequestHead<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub authorization: Option<&'a str>,
}

/// Returns the head length (through the blank line) once it has fully
/// arrived, `None` while more bytes are needed.
pub fn head_complete(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
}

/// Parses a complete request head. `None` for anything that is not a
/// plausible HTTP/1.x request.
pub fn parse(head: &str) -> Option<RequestHead<'_>> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;

    let mut parts = request_line.split(' ');
    let method = parts.next().filter(|method| !method.is_empty())?;
    let target = parts.next()?;
    parts.next()?; // HTTP version token

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let mut authorization = None;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("authorization")
        {
            authorization = Some(value.trim());
        }
    }

    Some(RequestHead {
        method,
        path,
        query,
        authorization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_complete_waits_for_the_blank_line() {
        assert_eq!(head_complete(b"GET / HTTP/1.1\r\nHost: g"), None);
        assert_eq!(head_complete(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        // Trailing body bytes do not change the head length.
        assert_eq!(head_complete(b"GET / HTTP/1.1\r\n\r\nbody"), Some(18));
    }

    #[test]
    fn parses_path_query_and_authorization() {
        let head = parse(
            "GET /openFirstDoor?key=abc HTTP/1.1\r\nHost: gandalf.local\r\nAuthorization: Bearer abc\r\n\r\n",
        )
        .expect("request head");
        assert_eq!(head.method, "GET");
        assert_eq!(head.path, "/openFirstDoor");
        assert_eq!(head.query, Some("key=abc"));
        assert_eq!(head.authorization, Some("Bearer abc"));
    }

    #[test]
    fn header_name_match_is_case_insensitive() {
        let head = parse("GET / HTTP/1.1\r\nauthorization: secret\r\n\r\n").expect("request head");
        assert_eq!(head.authorization, Some("secret"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse("\r\n\r\n"), None);
        assert_eq!(parse("GET\r\n\r\n"), None);
        assert_eq!(parse("GET /\r\n\r\n"), None);
    }
}
