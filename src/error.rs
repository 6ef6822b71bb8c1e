//! Error types for the Beeper CLI.
//!
//! Every failure surfaced by the transport or the configuration resolver is an [`Error`]: a
//! record carrying a human-readable message, exactly one [`ErrorCategory`], and an optional
//! actionable hint.  Errors are classified once, where they are detected, and are never
//! re-classified downstream; renderers and the exit-code mapping only read the category.

use std::error;
use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;

/// Exit code for user and application errors.
pub const EXIT_USER_ERROR: i32 = 1;

/// Exit code for system, network and server errors.
pub const EXIT_SYSTEM_ERROR: i32 = 2;

const HINT_AUTH: &str = "Set BEEPER_TOKEN environment variable with a valid API token. Generate one in Beeper Desktop settings.";
const HINT_PERMISSION: &str = "Your token may lack the required scope. Check token permissions in Beeper Desktop settings.";
const HINT_CHAT_NOT_FOUND: &str =
    "Verify the chat ID is correct. Use 'beeper chats list' to see available chats.";
const HINT_NOT_FOUND: &str = "The requested resource was not found. Verify the ID is correct.";
const HINT_NETWORK: &str = "Check that Beeper Desktop is running and the API is enabled. Try 'beeper discover' to find the API.";
const HINT_CONNECTION_REFUSED: &str =
    "Beeper Desktop may not be running. Start Beeper Desktop and ensure the API is enabled.";
const HINT_HOST_UNRESOLVED: &str =
    "Could not resolve the API host. Check your network connection and API URL configuration.";
const HINT_TIMEOUT: &str =
    "The request timed out. Check if Beeper Desktop is responding and your network is stable.";
const HINT_CONFIG: &str = "Check your configuration with 'beeper config show'. Reset with 'beeper config set-url http://localhost:39867'.";
const HINT_VALIDATION: &str = "Check the command arguments. Use --help for usage information.";
const HINT_SERVER: &str =
    "The Beeper Desktop API returned a server error. Try restarting Beeper Desktop.";

/// Message fragments that mark an error as a system failure regardless of its category.
const SYSTEM_FAILURE_MARKERS: &[&str] = &["connection refused", "no such host", "timeout"];

/// The closed set of error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or rejected credentials.
    Auth,
    /// Invalid or unreadable configuration.
    Config,
    /// Credentials lack the required scope.
    Permission,
    /// The requested resource does not exist.
    NotFound,
    /// The API could not be reached.
    Network,
    /// The request was rejected as malformed.
    Validation,
    /// The API failed or produced unusable output.
    Server,
    /// Anything else.
    Unknown,
}

impl ErrorCategory {
    /// Every category, in declaration order.
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Auth,
        ErrorCategory::Config,
        ErrorCategory::Permission,
        ErrorCategory::NotFound,
        ErrorCategory::Network,
        ErrorCategory::Validation,
        ErrorCategory::Server,
        ErrorCategory::Unknown,
    ];

    /// The stable tag used in machine-readable output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Auth => "auth",
            ErrorCategory::Config => "config",
            ErrorCategory::Permission => "permission",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Maps an HTTP status code onto a category.
    ///
    /// The first matching rule wins: 401, 403, 404, 400, then any 5xx.
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            401 => ErrorCategory::Auth,
            403 => ErrorCategory::Permission,
            404 => ErrorCategory::NotFound,
            400 => ErrorCategory::Validation,
            s if s >= 500 => ErrorCategory::Server,
            _ => ErrorCategory::Unknown,
        }
    }

    /// The process exit code for errors of this category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Network | ErrorCategory::Server => EXIT_SYSTEM_ERROR,
            ErrorCategory::Auth
            | ErrorCategory::Config
            | ErrorCategory::Permission
            | ErrorCategory::NotFound
            | ErrorCategory::Validation
            | ErrorCategory::Unknown => EXIT_USER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the remediation hint for a category.
///
/// `not_found` is refined by the failing operation: chat lookups point at `beeper chats list`.
pub fn hint_for(category: ErrorCategory, operation: Option<&str>) -> Option<&'static str> {
    match category {
        ErrorCategory::Auth => Some(HINT_AUTH),
        ErrorCategory::Permission => Some(HINT_PERMISSION),
        ErrorCategory::NotFound => match operation {
            Some("get_chat") | Some("list_messages") => Some(HINT_CHAT_NOT_FOUND),
            _ => Some(HINT_NOT_FOUND),
        },
        ErrorCategory::Network => Some(HINT_NETWORK),
        ErrorCategory::Config => Some(HINT_CONFIG),
        ErrorCategory::Validation => Some(HINT_VALIDATION),
        ErrorCategory::Server => Some(HINT_SERVER),
        ErrorCategory::Unknown => None,
    }
}

/// A categorized, hinted error record.
#[derive(Clone, Debug)]
pub struct Error {
    message: String,
    code: Option<String>,
    category: ErrorCategory,
    status_code: Option<u16>,
    operation: Option<String>,
    hint: Option<String>,
    desktop_version: Option<String>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
}

impl Error {
    /// Creates an error of the given category carrying that category's default hint.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            category,
            status_code: None,
            operation: None,
            hint: hint_for(category, None).map(String::from),
            desktop_version: None,
            source: None,
        }
    }

    /// Creates a new authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, message)
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, message)
    }

    /// Creates a new permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Permission, message)
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, message)
    }

    /// Creates a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    /// Creates a new server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Server, message)
    }

    /// Creates a new unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    /// Classifies a non-2xx HTTP response.
    ///
    /// The body is parsed as JSON with optional `error`, `message` and `code` fields.  The
    /// message prefers `error`, then `message`, then the raw body, then the canonical status
    /// text.  The result is a pure function of its inputs.
    pub fn from_status(status_code: u16, body: &str, operation: Option<&str>) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: Option<String>,
            message: Option<String>,
            code: Option<String>,
        }

        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let non_empty = |s: &Option<String>| s.as_ref().filter(|s| !s.is_empty()).cloned();
        let code = parsed.as_ref().and_then(|p| non_empty(&p.code));
        let message = parsed
            .as_ref()
            .and_then(|p| non_empty(&p.error).or_else(|| non_empty(&p.message)))
            .or_else(|| Some(body.to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| {
                StatusCode::from_u16(status_code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown Status")
                    .to_string()
            });

        let category = ErrorCategory::from_status(status_code);
        Self {
            message,
            code,
            category,
            status_code: Some(status_code),
            operation: operation.map(String::from),
            hint: hint_for(category, operation).map(String::from),
            desktop_version: None,
            source: None,
        }
    }

    /// Classifies a failed connection attempt (refused, unresolvable host, timeout).
    ///
    /// The hint is refined by inspecting the cause chain.
    pub fn from_network_failure<E>(cause: E, operation: Option<&str>) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = error_chain(&cause);
        let lowered = detail.to_lowercase();
        let hint = if lowered.contains("connection refused") {
            HINT_CONNECTION_REFUSED
        } else if lowered.contains("no such host")
            || lowered.contains("dns error")
            || lowered.contains("failed to lookup address")
            || lowered.contains("name or service not known")
        {
            HINT_HOST_UNRESOLVED
        } else if lowered.contains("timed out") || lowered.contains("timeout") {
            HINT_TIMEOUT
        } else {
            HINT_NETWORK
        };
        Self {
            message: format!("failed to connect to API: {detail}"),
            code: None,
            category: ErrorCategory::Network,
            status_code: None,
            operation: operation.map(String::from),
            hint: Some(hint.to_string()),
            desktop_version: None,
            source: Some(Arc::new(cause)),
        }
    }

    /// Sets the operation that failed.
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Replaces the hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Records the desktop version advertised on the failed response.
    pub fn with_desktop_version(mut self, version: impl Into<String>) -> Self {
        self.desktop_version = Some(version.into());
        self
    }

    /// Drops the hint, as quiet mode requires.
    pub fn without_hint(mut self) -> Self {
        self.hint = None;
        self
    }

    /// The human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The machine-readable code reported by the API, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The category; always set.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The HTTP status code, when the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// The operation that failed, e.g. `list_chats`.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// The actionable hint, if any.
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// The `X-Beeper-Desktop-Version` of the failed response, if it carried one.
    pub fn desktop_version(&self) -> Option<&str> {
        self.desktop_version.as_deref()
    }

    /// Returns true if this error is related to authentication.
    pub fn is_auth(&self) -> bool {
        self.category == ErrorCategory::Auth
    }

    /// Returns true if the credentials lack the required scope.
    pub fn is_permission(&self) -> bool {
        self.category == ErrorCategory::Permission
    }

    /// Returns true if this error is a network error.
    pub fn is_network(&self) -> bool {
        self.category == ErrorCategory::Network
    }

    /// Returns true if this error is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        self.category == ErrorCategory::NotFound
    }

    /// The process exit code: 2 for system failures, 1 for everything else.
    ///
    /// Only the category decides, except for `unknown` errors that did not come from an HTTP
    /// response; those fall back to scanning the message for connection failures.
    pub fn exit_code(&self) -> i32 {
        if self.category != ErrorCategory::Unknown || self.status_code.is_some() {
            return self.category.exit_code();
        }
        let lowered = self.message.to_lowercase();
        if SYSTEM_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
            EXIT_SYSTEM_ERROR
        } else {
            self.category.exit_code()
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Joins an error and its sources into one line.
fn error_chain(err: &(dyn error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        next = cause.source();
    }
    out
}

/// A specialized Result type for Beeper CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn status_table_first_match_wins() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Permission);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(400), ErrorCategory::Validation);
        assert_eq!(ErrorCategory::from_status(500), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(409), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::from_status(429), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::from_status(302), ErrorCategory::Unknown);
    }

    #[test]
    fn every_category_has_a_tag_and_exit_code() {
        let mut tags: Vec<_> = ErrorCategory::ALL.iter().map(|c| c.as_str()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), ErrorCategory::ALL.len());
        for category in ErrorCategory::ALL {
            let code = category.exit_code();
            assert!(code == EXIT_USER_ERROR || code == EXIT_SYSTEM_ERROR);
            if category != ErrorCategory::Unknown {
                assert!(hint_for(category, None).is_some(), "{category} has no hint");
            }
        }
        assert!(hint_for(ErrorCategory::Unknown, None).is_none());
    }

    #[test]
    fn message_prefers_error_then_message_then_body() {
        let err = Error::from_status(400, r#"{"error":"bad","message":"worse","code":"x"}"#, None);
        assert_eq!(err.message(), "bad");
        assert_eq!(err.code(), Some("x"));

        let err = Error::from_status(400, r#"{"message":"worse"}"#, None);
        assert_eq!(err.message(), "worse");
        assert_eq!(err.code(), None);

        let err = Error::from_status(502, "upstream exploded", None);
        assert_eq!(err.message(), "upstream exploded");

        let err = Error::from_status(404, "", None);
        assert_eq!(err.message(), "Not Found");
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn classification_is_pure() {
        let body = r#"{"error":"token expired","code":"auth_required"}"#;
        let a = Error::from_status(401, body, Some("list_chats"));
        let b = Error::from_status(401, body, Some("list_chats"));
        assert_eq!(a.category(), b.category());
        assert_eq!(a.message(), b.message());
        assert_eq!(a.hint(), b.hint());
        assert_eq!(a.to_string(), "auth_required: token expired");
    }

    #[test]
    fn not_found_hint_depends_on_operation() {
        for op in ["get_chat", "list_messages"] {
            let err = Error::from_status(404, "", Some(op));
            assert!(err.hint().unwrap_or_default().contains("beeper chats list"));
        }
        let err = Error::from_status(404, "", Some("search_messages"));
        assert_eq!(err.hint(), Some(HINT_NOT_FOUND));
    }

    #[test]
    fn network_failure_hint_is_refined_by_cause() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = Error::from_network_failure(refused, Some("ping"));
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.hint(), Some(HINT_CONNECTION_REFUSED));
        assert_eq!(err.exit_code(), EXIT_SYSTEM_ERROR);
        assert!(error::Error::source(&err).is_some());

        let dns = io::Error::other("dns error: failed to lookup address information");
        let err = Error::from_network_failure(dns, None);
        assert_eq!(err.hint(), Some(HINT_HOST_UNRESOLVED));

        let slow = io::Error::new(io::ErrorKind::TimedOut, "operation timed out");
        let err = Error::from_network_failure(slow, None);
        assert_eq!(err.hint(), Some(HINT_TIMEOUT));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Error::not_found("gone").exit_code(), EXIT_USER_ERROR);
        assert_eq!(Error::server("boom").exit_code(), EXIT_SYSTEM_ERROR);
        assert_eq!(Error::validation("missing").exit_code(), EXIT_USER_ERROR);
        assert_eq!(
            Error::unknown("request timeout after 30s").exit_code(),
            EXIT_SYSTEM_ERROR
        );
    }

    #[test]
    fn classified_errors_exit_by_category_alone() {
        let err = Error::from_status(404, r#"{"error":"no such host profile"}"#, Some("get_chat"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.exit_code(), EXIT_USER_ERROR);

        let err = Error::from_status(400, r#"{"error":"timeout must be a positive integer"}"#, None);
        assert_eq!(err.exit_code(), EXIT_USER_ERROR);

        let err = Error::from_status(418, "connection refused by teapot", None);
        assert_eq!(err.category(), ErrorCategory::Unknown);
        assert_eq!(err.exit_code(), EXIT_USER_ERROR);

        assert_eq!(Error::auth("connection refused").exit_code(), EXIT_USER_ERROR);
    }

    #[test]
    fn quiet_mode_drops_hint() {
        let err = Error::auth("no token").without_hint();
        assert!(err.hint().is_none());
        assert_eq!(err.category(), ErrorCategory::Auth);
    }
}
