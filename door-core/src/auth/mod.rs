//! Request authorization and route dispatch for the HTTP surface.
//!
//! The transport itself lives in the platform layer; this module holds the
//! pure decision logic so the credential and routing rules can be tested on
//! the host. Every response, authorized or not, carries the fixed CORS
//! header set.

use crate::doors::DoorCommand;

/// CORS headers attached to every HTTP response.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
    ("Access-Control-Max-Age", "86400"),
];

/// Body returned alongside a 401 response.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized: Invalid or missing API key";

/// Body returned by the root route.
pub const GREETING_BODY: &str = "Hi! This is Gandalf Door Controller.";

/// Validates the shared secret supplied with a request.
///
/// Accepted forms: a `key` query parameter, an `Authorization` header of the
/// form `Bearer <key>`, or the raw key as the header value.
#[must_use]
pub fn credential_is_valid(
    query_key: Option<&str>,
    authorization: Option<&str>,
    expected: &str,
) -> bool {
    if query_key == Some(expected) {
        return true;
    }

    match authorization {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(bearer) => bearer == expected,
            None => header == expected,
        },
        None => false,
    }
}

/// Extracts a parameter value from a raw query string such as `a=1&b=2`.
#[must_use]
pub fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Paths served by the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Route {
    Greeting,
    OpenFirstDoor,
    OpenSecondDoor,
    OpenBothDoors,
}

impl Route {
    /// Resolves a request path to a route.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Route::Greeting),
            "/openFirstDoor" => Some(Route::OpenFirstDoor),
            "/openSecondDoor" => Some(Route::OpenSecondDoor),
            "/openBothDoors" => Some(Route::OpenBothDoors),
            _ => None,
        }
    }

    /// Door motion triggered by this route, if any.
    #[must_use]
    pub const fn command(self) -> Option<DoorCommand> {
        match self {
            Route::Greeting => None,
            Route::OpenFirstDoor => Some(DoorCommand::OpenFirst),
            Route::OpenSecondDoor => Some(DoorCommand::OpenSecond),
            Route::OpenBothDoors => Some(DoorCommand::OpenBoth),
        }
    }

    /// Body returned on a successful request.
    #[must_use]
    pub const fn success_body(self) -> &'static str {
        match self {
            Route::Greeting => GREETING_BODY,
            Route::OpenFirstDoor => "Wait ~10 seconds for the first door to open",
            Route::OpenSecondDoor => "Wait ~10 seconds for the second door to open",
            Route::OpenBothDoors => "Wait ~20 seconds for both doors to open",
        }
    }

    /// Whether the route requires the shared secret.
    #[must_use]
    pub const fn requires_key(self) -> bool {
        !matches!(self, Route::Greeting)
    }
}

/// Decision for an incoming request, made before any door motion happens.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestDecision {
    /// Respond 200 with `body`; apply `command` to the sequencer, if any.
    Accepted {
        body: &'static str,
        command: Option<DoorCommand>,
    },
    /// Respond 401 with [`UNAUTHORIZED_BODY`]; no state change.
    Unauthorized,
    /// Respond 404; unknown path.
    NotFound,
}

/// Applies routing and the authorization policy to a parsed request.
#[must_use]
pub fn decide(
    path: &str,
    query: Option<&str>,
    authorization: Option<&str>,
    expected_key: &str,
) -> RequestDecision {
    let Some(route) = Route::from_path(path) else {
        return RequestDecision::NotFound;
    };

    if route.requires_key() {
        let query_key = query.and_then(|query| query_param(query, "key"));
        if !credential_is_valid(query_key, authorization, expected_key) {
            return RequestDecision::Unauthorized;
        }
    }

    RequestDecision::Accepted {
        body: route.success_body(),
        command: route.command(),
    }
}
