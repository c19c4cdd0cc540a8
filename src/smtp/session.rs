use super::reply::Reply;

/// Position of a session in the command sequence.
///
/// Variants are declared in protocol order; sequencing checks compare with
/// `>=`, so the declaration order is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SmtpState {
    Init,
    HeloReceived,
    MailFromReceived,
    RcptToReceived,
    DataMode,
}

/// One parsed command line: an upper-cased verb and the untouched remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub verb: String,
    pub args: &'a str,
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_start();
        let (verb, args) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim_start()),
            None => (line, ""),
        };

        Self {
            verb: verb.to_ascii_uppercase(),
            args,
        }
    }

    /// First whitespace-delimited token of the remainder
    pub fn first_arg(&self) -> Option<&'a str> {
        self.args.split_whitespace().next()
    }
}

/// What the connection should do after a command has been handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send the reply and read the next command
    Reply(Reply),
    /// Send the reply and switch to body collection
    StartData(Reply),
    /// Send the reply and close the connection
    Quit(Reply),
}

impl Action {
    #[cfg(test)]
    pub fn reply(&self) -> &Reply {
        match self {
            Action::Reply(reply) | Action::StartData(reply) | Action::Quit(reply) => reply,
        }
    }
}

/// A completed mail transaction, ready to hand to the spool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: String,
    pub to: Vec<String>,
    pub body: Vec<u8>,
}

/// Per-connection transaction state
#[derive(Debug)]
pub struct SmtpSession {
    state: SmtpState,
    from: String,
    to: Vec<String>,
    body: Vec<u8>,
}

impl SmtpSession {
    pub fn new() -> Self {
        Self {
            state: SmtpState::Init,
            from: String::new(),
            to: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn recipients(&self) -> &[String] {
        &self.to
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    fn reset(&mut self) {
        self.from.clear();
        self.to.clear();
        self.body.clear();
        self.state = SmtpState::HeloReceived;
    }

    pub fn handle_command(&mut self, line: &str) -> Action {
        let command = Command::parse(line);

        match command.verb.as_str() {
            "EHLO" | "HELO" => match command.first_arg() {
                Some(domain) => {
                    self.state = SmtpState::HeloReceived;
                    self.from.clear();
                    self.to.clear();
                    Action::Reply(Reply::hello(domain))
                }
                None => Action::Reply(Reply::syntax(None)),
            },
            "MAIL" => {
                if self.state < SmtpState::HeloReceived {
                    return Action::Reply(Reply::bad_sequence("EHLO/HELO first"));
                }
                match command.first_arg().and_then(|arg| strip_path_prefix(arg, "FROM:")) {
                    Some(from) => {
                        self.from = from.to_string();
                        self.to.clear();
                        self.state = SmtpState::MailFromReceived;
                        Action::Reply(Reply::sender_ok())
                    }
                    None => Action::Reply(Reply::syntax(Some("MAIL FROM: expected"))),
                }
            }
            "RCPT" => {
                if self.state < SmtpState::MailFromReceived {
                    return Action::Reply(Reply::bad_sequence("MAIL FROM first"));
                }
                match command.first_arg().and_then(|arg| strip_path_prefix(arg, "TO:")) {
                    Some(to) => {
                        self.to.push(to.to_string());
                        self.state = SmtpState::RcptToReceived;
                        Action::Reply(Reply::recipient_ok())
                    }
                    None => Action::Reply(Reply::syntax(Some("RCPT TO: expected"))),
                }
            }
            "DATA" => {
                if self.state < SmtpState::RcptToReceived {
                    return Action::Reply(Reply::bad_sequence("Need MAIL FROM and RCPT TO"));
                }
                self.state = SmtpState::DataMode;
                self.body.clear();
                Action::StartData(Reply::start_data())
            }
            "RSET" => {
                self.reset();
                Action::Reply(Reply::ok())
            }
            "NOOP" => Action::Reply(Reply::ok()),
            "QUIT" => Action::Quit(Reply::closing()),
            _ => Action::Reply(Reply::unrecognized()),
        }
    }

    /// Append one unstuffed body line, restoring its CRLF
    pub(super) fn append_body_line(&mut self, line: &[u8]) {
        self.body.extend_from_slice(line);
        self.body.extend_from_slice(b"\r\n");
    }

    /// Close the DATA phase and hand back what was collected.
    ///
    /// The sender is kept, but the session drops back to `HeloReceived`, so
    /// a new `MAIL` is required before the next transaction.
    pub(super) fn finish_data(&mut self) -> Transaction {
        self.state = SmtpState::HeloReceived;
        Transaction {
            from: self.from.clone(),
            to: std::mem::take(&mut self.to),
            body: std::mem::take(&mut self.body),
        }
    }
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// `FROM:<a@b>` -> `<a@b>`. The prefix is matched literally and the address
/// must not be empty.
fn strip_path_prefix<'a>(arg: &'a str, prefix: &str) -> Option<&'a str> {
    arg.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}
