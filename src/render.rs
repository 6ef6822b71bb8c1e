//! Output rendering for chats, messages, send results and errors.
//!
//! Every renderer returns the complete text to print.  Empty listings never render as an empty
//! string: JSON gets `[]` and the human formats get a sentence.

use std::fmt::Write;

use serde::Serialize;
use time::UtcOffset;

use crate::config::OutputFormat;
use crate::error::{Error, Result};
use crate::types::{Chat, Message, SendResult};
use crate::utils::time::{format_epoch_seconds, format_rfc3339, local_offset};

const NO_CHATS: &str = "No chats found.\n";
const NO_MESSAGES: &str = "No messages found.\n";

///////////////////////////////////////////// Chats ////////////////////////////////////////////

/// Renders a chat listing.  Unsupported formats fall back to JSON.
pub fn render_chats(chats: &[Chat], format: &OutputFormat) -> String {
    if chats.is_empty() {
        return match format {
            OutputFormat::Text | OutputFormat::Markdown => NO_CHATS.to_string(),
            OutputFormat::Json | OutputFormat::Unsupported(_) => "[]\n".to_string(),
        };
    }
    match format {
        OutputFormat::Text => chats.iter().map(chat_text).collect::<Vec<_>>().join("\n"),
        OutputFormat::Markdown => {
            let mut out = String::from("# Chats\n\n");
            for chat in chats {
                out.push_str(&chat_markdown(chat));
            }
            out
        }
        OutputFormat::Json | OutputFormat::Unsupported(_) => to_json_pretty(&chats),
    }
}

/// Renders a single chat.  Unsupported formats fall back to JSON.
pub fn render_chat(chat: &Chat, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Text => chat_text(chat),
        OutputFormat::Markdown => chat_markdown(chat),
        OutputFormat::Json | OutputFormat::Unsupported(_) => to_json_pretty(chat),
    }
}

fn chat_text(chat: &Chat) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID: {}", chat.id);
    let _ = writeln!(out, "Name: {}", chat.name);
    let _ = writeln!(out, "Participants: {}", chat.participants.join(", "));
    let _ = writeln!(out, "Unread: {}", chat.unread_count);
    let _ = writeln!(out, "Last Message: {}", chat.last_message);
    let _ = writeln!(out, "Updated: {}", format_rfc3339(&chat.updated_at));
    out
}

fn chat_markdown(chat: &Chat) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## {}\n", chat.name);
    let _ = writeln!(out, "- **ID**: {}", chat.id);
    let _ = writeln!(out, "- **Participants**: {}", chat.participants.join(", "));
    let _ = writeln!(out, "- **Unread**: {}", chat.unread_count);
    let _ = writeln!(out, "- **Last Message**: {}", chat.last_message);
    let _ = writeln!(out, "- **Updated**: {}\n", format_rfc3339(&chat.updated_at));
    out
}

/////////////////////////////////////////// Messages ///////////////////////////////////////////

/// Renders a message listing with local timestamps.  Unsupported formats fall back to JSON.
pub fn render_messages(messages: &[Message], format: &OutputFormat) -> String {
    render_messages_at(messages, format, local_offset())
}

fn render_messages_at(messages: &[Message], format: &OutputFormat, offset: UtcOffset) -> String {
    if messages.is_empty() {
        return match format {
            OutputFormat::Text | OutputFormat::Markdown => NO_MESSAGES.to_string(),
            OutputFormat::Json | OutputFormat::Unsupported(_) => "[]\n".to_string(),
        };
    }
    let mut out = String::new();
    match format {
        OutputFormat::Text => {
            for msg in messages {
                let when = format_epoch_seconds(msg.timestamp, offset);
                let _ = writeln!(out, "[{when}] {}: {}", msg.sender, msg.text);
            }
        }
        OutputFormat::Markdown => {
            out.push_str("# Messages\n\n");
            for msg in messages {
                let when = format_epoch_seconds(msg.timestamp, offset);
                let _ = writeln!(out, "**{}** - {when}\n", msg.sender);
                let _ = writeln!(out, "> {}\n", msg.text);
                out.push_str("---\n\n");
            }
        }
        OutputFormat::Json | OutputFormat::Unsupported(_) => out = to_json_pretty(&messages),
    }
    out
}

///////////////////////////////////////////// Send /////////////////////////////////////////////

/// Renders the result of sending a message.
///
/// Unlike the listing renderers this rejects unsupported formats instead of falling back.
pub fn render_send_result(result: &SendResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)
            .map(|json| json + "\n")
            .map_err(|e| Error::unknown(format!("failed to marshal JSON: {e}")).with_source(e)),
        OutputFormat::Text if result.success => Ok(format!(
            "Message sent successfully. ID: {}\n",
            result.message_id
        )),
        OutputFormat::Text => Ok("Failed to send message\n".to_string()),
        OutputFormat::Markdown if result.success => Ok(format!(
            "**Message sent successfully**\n\nID: `{}`\n",
            result.message_id
        )),
        OutputFormat::Markdown => Ok("**Failed to send message**\n".to_string()),
        OutputFormat::Unsupported(name) => Err(Error::validation(format!(
            "unsupported format: {name}"
        ))),
    }
}

//////////////////////////////////////////// Errors ////////////////////////////////////////////

#[derive(Serialize)]
struct JsonError<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    category: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

/// Renders an error for stderr.
///
/// JSON mode yields one line holding a single object; otherwise an `Error:` line followed,
/// unless `quiet`, by a blank line and a `Hint:` line.  `quiet` suppresses the hint in both.
pub fn render_error(err: &Error, as_json: bool, quiet: bool) -> String {
    let hint = if quiet { None } else { err.hint() };
    if as_json {
        let record = JsonError {
            error: err.message(),
            code: err.code(),
            category: err.category().as_str(),
            operation: err.operation(),
            hint,
        };
        return match serde_json::to_string(&record) {
            Ok(json) => json + "\n",
            Err(_) => format!(
                "{{\"error\":{:?},\"category\":\"unknown\"}}\n",
                err.message()
            ),
        };
    }
    let mut out = format!("Error: {}\n", err.message());
    if let Some(hint) = hint {
        let _ = write!(out, "\nHint: {hint}\n");
    }
    out
}

fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => json + "\n",
        Err(e) => format!("Error formatting JSON: {e}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use time::macros::datetime;

    fn chat() -> Chat {
        Chat {
            id: "c1".to_string(),
            name: "Family".to_string(),
            participants: vec!["Ann".to_string(), "Bo".to_string()],
            unread_count: 2,
            last_message: "see you".to_string(),
            updated_at: datetime!(2024-05-01 12:00:00 UTC),
        }
    }

    fn message(id: &str, text: &str) -> Message {
        Message {
            id: id.to_string(),
            text: text.to_string(),
            sender: "Ann".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn empty_listings() {
        assert_eq!(render_chats(&[], &OutputFormat::Json), "[]\n");
        assert_eq!(render_messages(&[], &OutputFormat::Json), "[]\n");
        for format in [OutputFormat::Text, OutputFormat::Markdown] {
            assert_eq!(render_chats(&[], &format), "No chats found.\n");
            assert_eq!(render_messages(&[], &format), "No messages found.\n");
        }
    }

    #[test]
    fn chats_json_is_pretty_with_stable_fields() {
        let out = render_chats(&[chat()], &OutputFormat::Json);
        assert!(out.starts_with("[\n  {\n    \"id\": \"c1\""));
        assert!(out.contains("\"unreadCount\": 2"));
        assert!(out.contains("\"updatedAt\": \"2024-05-01T12:00:00Z\""));
        assert!(out.ends_with("]\n"));
    }

    #[test]
    fn chats_text_blocks() {
        let mut second = chat();
        second.id = "c2".to_string();
        let out = render_chats(&[chat(), second], &OutputFormat::Text);
        assert_eq!(
            out,
            "ID: c1\nName: Family\nParticipants: Ann, Bo\nUnread: 2\nLast Message: see you\n\
             Updated: 2024-05-01T12:00:00Z\n\n\
             ID: c2\nName: Family\nParticipants: Ann, Bo\nUnread: 2\nLast Message: see you\n\
             Updated: 2024-05-01T12:00:00Z\n"
        );
    }

    #[test]
    fn chats_markdown() {
        let out = render_chats(&[chat()], &OutputFormat::Markdown);
        assert!(out.starts_with("# Chats\n\n## Family\n\n- **ID**: c1\n"));
        assert!(out.contains("- **Participants**: Ann, Bo\n"));
    }

    #[test]
    fn messages_text_and_markdown() {
        let msgs = [message("m1", "hi"), message("m2", "bye")];
        let out = render_messages_at(&msgs, &OutputFormat::Text, UtcOffset::UTC);
        assert_eq!(
            out,
            "[2023-11-14 22:13:20] Ann: hi\n[2023-11-14 22:13:20] Ann: bye\n"
        );

        let out = render_messages_at(&msgs, &OutputFormat::Markdown, UtcOffset::UTC);
        assert!(out.starts_with("# Messages\n\n**Ann** - 2023-11-14 22:13:20\n\n> hi\n\n---\n\n"));
        assert_eq!(out.matches("---").count(), 2);
    }

    #[test]
    fn unsupported_format_falls_back_for_listings_only() {
        let other = OutputFormat::Unsupported("yaml".to_string());
        assert_eq!(
            render_chats(&[chat()], &other),
            render_chats(&[chat()], &OutputFormat::Json)
        );
        assert_eq!(render_messages(&[], &other), "[]\n");

        let result = SendResult {
            message_id: "m1".to_string(),
            success: true,
        };
        let err = render_send_result(&result, &other).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn send_result_formats() {
        let ok = SendResult {
            message_id: "m1".to_string(),
            success: true,
        };
        assert_eq!(
            render_send_result(&ok, &OutputFormat::Text).unwrap(),
            "Message sent successfully. ID: m1\n"
        );
        assert_eq!(
            render_send_result(&ok, &OutputFormat::Markdown).unwrap(),
            "**Message sent successfully**\n\nID: `m1`\n"
        );
        assert_eq!(
            render_send_result(&ok, &OutputFormat::Json).unwrap(),
            "{\n  \"messageID\": \"m1\",\n  \"success\": true\n}\n"
        );
        let failed = SendResult {
            message_id: String::new(),
            success: false,
        };
        assert_eq!(
            render_send_result(&failed, &OutputFormat::Text).unwrap(),
            "Failed to send message\n"
        );
    }

    #[test]
    fn error_text_with_and_without_hint() {
        let err = Error::from_status(404, "", Some("get_chat"));
        let out = render_error(&err, false, false);
        assert!(out.starts_with("Error: Not Found\n\nHint: Verify the chat ID"));
        assert_eq!(render_error(&err, false, true), "Error: Not Found\n");
    }

    #[test]
    fn error_json_single_line() {
        let err = Error::from_status(401, r#"{"error":"nope","code":"auth_required"}"#, Some("list_chats"));
        let out = render_error(&err, true, false);
        assert_eq!(out.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["error"], "nope");
        assert_eq!(value["code"], "auth_required");
        assert_eq!(value["category"], "auth");
        assert_eq!(value["operation"], "list_chats");
        assert!(value["hint"].as_str().unwrap().contains("BEEPER_TOKEN"));

        let quiet: serde_json::Value =
            serde_json::from_str(&render_error(&err, true, true)).unwrap();
        assert!(quiet.get("hint").is_none());
        assert_eq!(quiet["category"], "auth");
    }
}
