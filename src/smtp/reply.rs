use std::fmt;

/// A single-line server response, `<code> <text>\r\n` on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    pub fn greeting(banner: &str) -> Self {
        Self::new(220, banner)
    }

    pub fn hello(domain: &str) -> Self {
        Self::new(250, format!("Hello {}, pleased to meet you", domain))
    }

    pub fn ok() -> Self {
        Self::new(250, "OK")
    }

    pub fn sender_ok() -> Self {
        Self::new(250, "Sender OK")
    }

    pub fn recipient_ok() -> Self {
        Self::new(250, "Recipient OK")
    }

    pub fn accepted() -> Self {
        Self::new(250, "OK: message accepted for delivery")
    }

    pub fn start_data() -> Self {
        Self::new(354, "Start mail input; end with <CRLF>.<CRLF>")
    }

    pub fn closing() -> Self {
        Self::new(221, "Service closing transmission channel")
    }

    pub fn unrecognized() -> Self {
        Self::new(500, "Syntax error, command unrecognized")
    }

    pub fn syntax(hint: Option<&str>) -> Self {
        match hint {
            Some(hint) => Self::new(
                501,
                format!("Syntax error in parameters or arguments ({})", hint),
            ),
            None => Self::new(501, "Syntax error in parameters or arguments"),
        }
    }

    pub fn bad_sequence(hint: &str) -> Self {
        Self::new(503, format!("Bad sequence of commands ({})", hint))
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}\r\n", self.code, self.text)
    }
}
