use std::path::Path;
use std::sync::Arc;

use smtp_spool::{serve, submit, Config, MailSpool, SubmitClient};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

async fn start_test_server(spool_dir: &Path) -> (String, Arc<MailSpool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let spool = Arc::new(MailSpool::new(spool_dir));
    let config = Arc::new(Config {
        spool_dir: spool_dir.to_path_buf(),
        banner: "test.local ready".to_string(),
        ..Config::default()
    });

    tokio::spawn(serve(listener, Arc::clone(&spool), config));

    (addr, spool)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: &str) -> (Self, String) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };
        let greeting = client.read_reply().await;
        (client, greeting)
    }

    async fn read_reply(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    async fn send_raw(&mut self, data: &str) {
        self.writer.write_all(data.as_bytes()).await.unwrap();
    }

    async fn command(&mut self, line: &str) -> String {
        self.send_raw(&format!("{line}\r\n")).await;
        self.read_reply().await
    }
}

#[tokio::test]
async fn test_greeting_and_quit() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, _spool) = start_test_server(temp_dir.path()).await;

    let (mut client, greeting) = Client::connect(&addr).await;
    assert_eq!(greeting, "220 test.local ready");

    let response = client.command("QUIT").await;
    assert_eq!(response, "221 Service closing transmission channel");

    // server closes its side after QUIT
    let mut rest = Vec::new();
    client.reader.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_complete_transaction_is_spooled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    let (mut client, _) = Client::connect(&addr).await;
    assert!(client.command("HELO client.local").await.starts_with("250"));
    assert!(client.command("MAIL FROM:<alice@example.com>").await.starts_with("250"));
    assert!(client.command("RCPT TO:<bob@example.com>").await.starts_with("250"));
    assert!(client.command("DATA").await.starts_with("354"));

    client
        .send_raw("Subject: Test\r\n\r\nHello\r\n..leading dot test\r\n")
        .await;
    assert!(client.command(".").await.starts_with("250"));
    assert!(client.command("QUIT").await.starts_with("221"));

    let inbox = spool.inbox("bob@example.com").await.unwrap();
    assert_eq!(inbox.len(), 1);

    let name = inbox[0].file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("_bob_example.com__"));
    assert!(name.ends_with(".eml"));

    let stored = tokio::fs::read(&inbox[0]).await.unwrap();
    assert_eq!(stored, b"Subject: Test\r\n\r\nHello\r\n.leading dot test\r\n");
}

#[tokio::test]
async fn test_multiple_recipients_get_one_file_each() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    let (mut client, _) = Client::connect(&addr).await;
    client.command("EHLO client.local").await;
    client.command("MAIL FROM:<alice@example.com>").await;
    client.command("RCPT TO:<bob@example.com>").await;
    client.command("RCPT TO:<carol@example.com>").await;
    client.command("DATA").await;
    client.send_raw("shared body\r\n").await;
    assert!(client.command(".").await.starts_with("250"));
    client.command("QUIT").await;

    for address in ["bob@example.com", "carol@example.com"] {
        let inbox = spool.inbox(address).await.unwrap();
        assert_eq!(inbox.len(), 1, "{address}");
        assert_eq!(tokio::fs::read(&inbox[0]).await.unwrap(), b"shared body\r\n");
    }
}

#[tokio::test]
async fn test_protocol_errors() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, _spool) = start_test_server(temp_dir.path()).await;

    let (mut client, _) = Client::connect(&addr).await;
    assert!(client.command("INVALID").await.starts_with("500"));
    assert!(client.command("MAIL FROM:<a@x>").await.starts_with("503"));
    assert!(client.command("HELO").await.starts_with("501"));
    assert!(client.command("helo client.local").await.starts_with("250"));
    assert!(client.command("DATA").await.starts_with("503"));
    assert!(client.command("MAIL <a@x>").await.starts_with("501"));
    assert!(client.command("noop").await.starts_with("250"));
    assert!(client.command("QUIT").await.starts_with("221"));
}

#[tokio::test]
async fn test_rset_discards_transaction() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    let (mut client, _) = Client::connect(&addr).await;
    client.command("HELO client.local").await;
    client.command("MAIL FROM:<alice@example.com>").await;
    client.command("RCPT TO:<bob@example.com>").await;
    assert_eq!(client.command("RSET").await, "250 OK");

    // recipients are gone, so DATA needs a fresh envelope
    assert!(client.command("DATA").await.starts_with("503"));

    client.command("MAIL FROM:<alice@example.com>").await;
    client.command("RCPT TO:<dave@example.com>").await;
    client.command("DATA").await;
    client.send_raw("after reset\r\n").await;
    assert!(client.command(".").await.starts_with("250"));
    client.command("QUIT").await;

    assert!(spool.inbox("bob@example.com").await.unwrap().is_empty());
    assert_eq!(spool.inbox("dave@example.com").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    let (mut first, _) = Client::connect(&addr).await;
    let (mut second, _) = Client::connect(&addr).await;

    assert!(first.command("HELO first.local").await.starts_with("250"));
    assert!(first.command("MAIL FROM:<a@x>").await.starts_with("250"));

    // the second connection has not greeted, whatever the first did
    assert!(second.command("MAIL FROM:<b@x>").await.starts_with("503"));
    assert!(second.command("HELO second.local").await.starts_with("250"));

    assert!(first.command("RCPT TO:<one@y>").await.starts_with("250"));
    assert!(second.command("RCPT TO:<two@y>").await.starts_with("503"));

    assert!(first.command("DATA").await.starts_with("354"));
    // while the first is in DATA, the second still speaks commands
    assert!(second.command("NOOP").await.starts_with("250"));
    first.send_raw("from first\r\n").await;
    assert!(first.command(".").await.starts_with("250"));

    assert!(second.command("RSET").await.starts_with("250"));
    assert!(first.command("QUIT").await.starts_with("221"));
    assert!(second.command("QUIT").await.starts_with("221"));

    assert_eq!(spool.inbox("one@y").await.unwrap().len(), 1);
    assert!(spool.inbox("two@y").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_abrupt_disconnect_does_not_affect_server() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    {
        let (mut client, _) = Client::connect(&addr).await;
        client.command("HELO client.local").await;
        client.command("MAIL FROM:<a@x>").await;
        client.command("RCPT TO:<gone@y>").await;
        client.command("DATA").await;
        client.send_raw("half a message\r\n").await;
    }

    let (mut client, greeting) = Client::connect(&addr).await;
    assert!(greeting.starts_with("220"));
    assert!(client.command("NOOP").await.starts_with("250"));
    client.command("QUIT").await;

    assert!(spool.inbox("gone@y").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submitted_message_round_trips() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, spool) = start_test_server(temp_dir.path()).await;

    let message = "From: alice@example.com\n\
                   Subject: Dots\n\
                   \n\
                   .hidden\n\
                   ..two\n\
                   .\n\
                   end";

    submit(
        addr.as_str(),
        "mydomain.com",
        "alice@example.com",
        &["bob@example.com"],
        message,
    )
    .await
    .unwrap();

    let inbox = spool.inbox("bob@example.com").await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(
        tokio::fs::read(&inbox[0]).await.unwrap(),
        b"From: alice@example.com\r\nSubject: Dots\r\n\r\n.hidden\r\n..two\r\n.\r\nend\r\n"
    );

    let messages = spool.messages("bob@example.com").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].from, "alice@example.com");
    assert_eq!(messages[0].subject, "Dots");
    assert_eq!(messages[0].date, "Unknown Date");
    assert_eq!(messages[0].body, ".hidden\r\n..two\r\n.\r\nend");
}

#[tokio::test]
async fn test_client_reports_unexpected_reply() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (addr, _spool) = start_test_server(temp_dir.path()).await;

    let mut client = SubmitClient::connect(addr.as_str()).await.unwrap();
    let err = client.command("DATA", 354).await.unwrap_err();
    assert!(err.to_string().contains("503"));

    client.quit().await.unwrap();
}
