use serde::Serialize;

/// Summary of one stored message, as listed for a mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxMessage {
    /// Spool file name
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

impl InboxMessage {
    /// Summarise a stored body by scanning its header block.
    ///
    /// Leading blank lines are skipped. Folded headers and MIME parts are not
    /// interpreted: the body is everything after the first empty line.
    pub fn parse(id: impl Into<String>, raw: &[u8]) -> Self {
        let start = raw
            .iter()
            .position(|b| *b != b'\r' && *b != b'\n')
            .unwrap_or(raw.len());
        let text = String::from_utf8_lossy(&raw[start..]);
        let (headers, body) = split_headers_body(&text);

        Self {
            id: id.into(),
            from: get_header(headers, "from").unwrap_or_else(|| "Unknown Sender".to_string()),
            subject: get_header(headers, "subject").unwrap_or_else(|| "No Subject".to_string()),
            date: get_header(headers, "date").unwrap_or_else(|| "Unknown Date".to_string()),
            body: body.trim().to_string(),
        }
    }
}

/// Split at the first empty line. Without one, the whole text is headers if
/// it opens with a header line and body otherwise.
fn split_headers_body(data: &str) -> (&str, &str) {
    if let Some(pos) = data.find("\r\n\r\n") {
        return (&data[..pos], &data[pos + 4..]);
    }
    if let Some(pos) = data.find("\n\n") {
        return (&data[..pos], &data[pos + 2..]);
    }

    match data.lines().next() {
        Some(line) if is_header_line(line) => (data, ""),
        _ => ("", data),
    }
}

fn is_header_line(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(name, _)| !name.is_empty() && !name.contains(char::is_whitespace))
}

/// Value of the first header called `name` (case-insensitive)
fn get_header(headers: &str, name: &str) -> Option<String> {
    headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
}
