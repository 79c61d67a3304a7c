//! Asynchronous TCP forwarding of records to Logstash.
//!
//! Records are serialized as newline-delimited JSON and queued on a
//! `tracing-appender` non-blocking writer. The caller never blocks: when the
//! queue is full the record is dropped. The worker writes through a
//! [`LogstashWriter`], which reconnects with exponential backoff and retries
//! the pending line.

use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use crate::format::json_object;
use crate::{Config, Error, Hook, Record, Result};

/// Records buffered before new ones are dropped.
pub const BUFFER_SIZE: usize = 8192;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff applied when the connection to Logstash is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay after each failed attempt.
    pub delay_multiplier: u32,
    /// Attempts before the pending record is given up.
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            delay_multiplier: 2,
            max_retries: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.delay_multiplier.saturating_pow(attempt))
    }
}

/// Install a Logstash hook for `config`, or `None` when no server is
/// configured or the server cannot be reached.
pub fn install_hook(config: &Config) -> Option<LogstashHook> {
    if !config.has_logstash() {
        return None;
    }

    let address = format!("{}:{}", config.logstash_server.trim(), config.port());
    match LogstashHook::connect(&address, &config.service_name, ReconnectPolicy::default()) {
        Ok(hook) => Some(hook),
        Err(e) => {
            tracing::debug!(address = %address, error = %e, "logstash hook disabled");
            None
        }
    }
}

/// Hook forwarding every record to a Logstash TCP input.
///
/// Queued lines are flushed when the hook is dropped.
pub struct LogstashHook {
    address: String,
    app_name: String,
    policy: ReconnectPolicy,
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl LogstashHook {
    /// Resolve `address`, open the first connection and start the worker.
    ///
    /// Fails if the address does not resolve or the initial connection
    /// cannot be made.
    pub fn connect(address: &str, app_name: &str, policy: ReconnectPolicy) -> Result<Self> {
        let stream = LogstashWriter::connect(address, policy)?;
        let (writer, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(BUFFER_SIZE)
            .lossy(true)
            .thread_name("svclog-logstash")
            .finish(stream);

        Ok(Self {
            address: address.to_string(),
            app_name: app_name.to_string(),
            policy,
            writer,
            _guard: guard,
        })
    }

    /// The `host:port` this hook ships to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Backoff used by the worker.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// One newline-terminated JSON line for `record`.
    pub fn encode(&self, record: &Record) -> Vec<u8> {
        let obj = json_object(
            &record.fields,
            [
                ("@timestamp", Value::String(record.timestamp())),
                ("@version", Value::String("1".to_string())),
                ("type", Value::String(self.app_name.clone())),
                ("level", Value::String(record.level.to_string())),
                ("message", Value::String(record.message.to_string())),
            ],
        );

        let mut line = serde_json::to_vec(&Value::Object(obj)).unwrap_or_default();
        line.push(b'\n');
        line
    }
}

impl Hook for LogstashHook {
    fn name(&self) -> &str {
        "logstash"
    }

    fn fire(&self, record: &Record) -> Result<()> {
        // Lossy: a full queue drops the line instead of failing.
        self.writer.clone().write_all(&self.encode(record))?;
        Ok(())
    }
}

impl fmt::Debug for LogstashHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogstashHook")
            .field("address", &self.address)
            .field("app_name", &self.app_name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Blocking TCP writer that reconnects per a [`ReconnectPolicy`].
///
/// Each `write` sends the whole buffer or fails once every reconnect attempt
/// has been spent; the line is then lost.
#[derive(Debug)]
pub struct LogstashWriter {
    addrs: Vec<SocketAddr>,
    stream: Option<TcpStream>,
    policy: ReconnectPolicy,
}

impl LogstashWriter {
    /// Resolve `address` and open the first connection.
    pub fn connect(address: &str, policy: ReconnectPolicy) -> Result<Self> {
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|e| Error::Hook(format!("cannot resolve {}: {}", address, e)))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::Hook(format!("no addresses for {}", address)));
        }

        let stream = open(&addrs)?;
        Ok(Self {
            addrs,
            stream: Some(stream),
            policy,
        })
    }

    fn write_stream(&mut self, buf: &[u8]) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let result = stream.write_all(buf).and_then(|_| stream.flush());
        if result.is_err() {
            self.stream = None;
        }
        result
    }
}

impl Write for LogstashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A write into a socket the server already closed succeeds locally
        // and is lost, so drop such a connection first.
        if self.stream.as_ref().is_some_and(peer_closed) {
            tracing::debug!("logstash closed the connection");
            self.stream = None;
        }
        if self.stream.is_some() && self.write_stream(buf).is_ok() {
            return Ok(buf.len());
        }

        for attempt in 0..self.policy.max_retries {
            thread::sleep(self.policy.delay(attempt));
            match open(&self.addrs) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    if self.write_stream(buf).is_ok() {
                        return Ok(buf.len());
                    }
                }
                Err(e) => {
                    tracing::debug!(attempt = attempt + 1, error = %e, "logstash reconnect failed");
                }
            }
        }

        tracing::warn!(
            retries = self.policy.max_retries,
            "logstash unreachable, record dropped"
        );
        Err(io::Error::new(
            io::ErrorKind::NotConnected,
            "logstash unreachable",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

/// Logstash never writes back, so a readable EOF means the peer is gone.
fn peer_closed(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return true;
    }
    let mut peeked = [0u8; 1];
    let closed = match stream.peek(&mut peeked) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => e.kind() != io::ErrorKind::WouldBlock,
    };
    closed || stream.set_nonblocking(false).is_err()
}

fn open(addrs: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fields, Level, Message};
    use serde_json::json;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.delay_multiplier, 2);
        assert_eq!(policy.max_retries, 10);
    }

    #[test]
    fn test_policy_delay_is_exponential() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(9), Duration::from_secs(512));
    }

    #[test]
    fn test_install_hook_blank_server() {
        assert!(install_hook(&Config::new("svc")).is_none());
        assert!(install_hook(&Config::new("svc").with_logstash("   ", "5000")).is_none());
    }

    #[test]
    fn test_install_hook_unreachable() {
        let port = unused_port();
        let config = Config::new("svc").with_logstash("127.0.0.1", port.to_string());
        assert!(install_hook(&config).is_none());
    }

    #[test]
    fn test_install_hook_invalid_address() {
        let config = Config::new("svc").with_logstash("127.0.0.1", "not-a-port");
        assert!(install_hook(&config).is_none());
    }

    #[test]
    fn test_hook_forwards_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = Config::new("svc").with_logstash("127.0.0.1", port.to_string());

        let hook = install_hook(&config).expect("hook installed");
        assert_eq!(hook.address(), format!("127.0.0.1:{}", port));
        assert_eq!(hook.policy(), ReconnectPolicy::default());

        let mut fields = Fields::new();
        fields.insert("service_name".to_string(), json!("svc"));
        fields.insert("req_id".to_string(), json!("123"));
        hook.fire(&Record::new(Level::Warn, Message::from("hi"), fields))
            .unwrap();

        let (conn, _) = listener.accept().unwrap();
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut line = String::new();
        BufReader::new(conn).read_line(&mut line).unwrap();

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], json!("svc"));
        assert_eq!(value["@version"], json!("1"));
        assert_eq!(value["level"], json!("warning"));
        assert_eq!(value["message"], json!("[hi]"));
        assert_eq!(value["service_name"], json!("svc"));
        assert_eq!(value["req_id"], json!("123"));
        assert!(value["@timestamp"].is_string());
    }

    #[test]
    fn test_encode_renames_clashing_fields() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let hook = LogstashHook::connect(&address, "svc", ReconnectPolicy::default()).unwrap();

        let mut fields = Fields::new();
        fields.insert("type".to_string(), json!("custom"));
        fields.insert("message".to_string(), json!("inner"));
        let line = hook.encode(&Record::new(Level::Info, Message::from("outer"), fields));

        let value: Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["type"], json!("svc"));
        assert_eq!(value["fields.type"], json!("custom"));
        assert_eq!(value["message"], json!("[outer]"));
        assert_eq!(value["fields.message"], json!("inner"));
    }

    fn fast_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(10),
            delay_multiplier: 2,
            max_retries,
        }
    }

    fn read_messages(conn: TcpStream, count: usize) -> Vec<Value> {
        conn.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut reader = BufReader::new(conn);
        (0..count)
            .map(|_| {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let value: Value = serde_json::from_str(line.trim_end()).unwrap();
                value["message"].clone()
            })
            .collect()
    }

    #[test]
    fn test_hook_reconnects_after_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let hook = LogstashHook::connect(&address, "svc", fast_policy(5)).unwrap();

        let (first, _) = listener.accept().unwrap();
        drop(first);
        // let the FIN reach our side before anything is written
        thread::sleep(Duration::from_millis(50));

        for i in 0..3 {
            let message = Message::new([json!("rec"), json!(i)]);
            hook.fire(&Record::new(Level::Info, message, Fields::new()))
                .unwrap();
        }

        let (second, _) = listener.accept().unwrap();
        assert_eq!(
            read_messages(second, 3),
            vec![json!("[rec 0]"), json!("[rec 1]"), json!("[rec 2]")]
        );
    }

    #[test]
    fn test_writer_replaces_closed_connection_before_writing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let mut writer = LogstashWriter::connect(&address, fast_policy(3)).unwrap();

        let (first, _) = listener.accept().unwrap();
        drop(first);
        thread::sleep(Duration::from_millis(50));

        writer.write_all(b"{\"message\":\"after close\"}\n").unwrap();
        let (second, _) = listener.accept().unwrap();
        assert_eq!(read_messages(second, 1), vec![json!("after close")]);
    }

    #[test]
    fn test_writer_gives_up_after_max_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let mut writer = LogstashWriter::connect(&address, fast_policy(2)).unwrap();

        let (conn, _) = listener.accept().unwrap();
        drop(conn);
        drop(listener);
        thread::sleep(Duration::from_millis(50));

        let err = writer.write(b"lost\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_writer_connect_fails_without_server() {
        let address = format!("127.0.0.1:{}", unused_port());
        let result = LogstashWriter::connect(&address, fast_policy(1));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
