//! I/O handle contract and the handles the standard library hands to
//! scripts (sockets, child processes, in-memory buffers).

use drowse_core::EngineError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Child, ChildStdin, ChildStdout};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoFault {
    #[error("handle is closed")]
    Closed,
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
    #[error("port {0} already has a listener")]
    PortInUse(u16),
    #[error("no listener on port {0}")]
    NotListening(u16),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<IoFault> for EngineError {
    fn from(fault: IoFault) -> Self {
        match fault {
            IoFault::Timeout(ms) => EngineError::Timeout(ms),
            other => EngineError::Runtime(other.to_string()),
        }
    }
}

pub trait IoHandle: Send + Sync {
    /// Next line without its terminator, `None` at end of stream.
    fn read_line(&self) -> Result<Option<String>, IoFault>;

    fn read_all(&self) -> Result<String, IoFault>;

    fn write(&self, text: &str) -> Result<(), IoFault>;

    fn close(&self) -> Result<(), IoFault>;

    fn is_closed(&self) -> bool;

    /// Wait for the process behind the handle, if there is one, and return
    /// its exit code.
    fn wait(&self) -> Result<Option<i32>, IoFault> {
        Ok(None)
    }
}

fn strip_newline(mut line: String) -> String {
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    line
}

// ---------------------------------------------------------------------------
// Stream handle
// ---------------------------------------------------------------------------

struct StreamState {
    reader: Option<Box<dyn BufRead + Send>>,
    writer: Option<Box<dyn Write + Send>>,
}

/// A handle over any reader/writer pair.
pub struct StreamHandle {
    state: Mutex<StreamState>,
    child: Mutex<Option<Child>>,
}

impl StreamHandle {
    pub fn new(reader: Option<Box<dyn BufRead + Send>>, writer: Option<Box<dyn Write + Send>>) -> Self {
        StreamHandle {
            state: Mutex::new(StreamState { reader, writer }),
            child: Mutex::new(None),
        }
    }

    pub fn tcp(stream: TcpStream) -> Result<Self, IoFault> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(StreamHandle::new(Some(Box::new(reader)), Some(Box::new(stream))))
    }

    /// Wrap a spawned child; its stdout is read, its stdin written.
    pub fn process(mut child: Child) -> Self {
        let stdout: Option<ChildStdout> = child.stdout.take();
        let stdin: Option<ChildStdin> = child.stdin.take();
        let handle = StreamHandle::new(
            stdout.map(|s| Box::new(BufReader::new(s)) as Box<dyn BufRead + Send>),
            stdin.map(|s| Box::new(s) as Box<dyn Write + Send>),
        );
        *handle.child.lock() = Some(child);
        handle
    }
}

impl IoHandle for StreamHandle {
    fn read_line(&self) -> Result<Option<String>, IoFault> {
        let mut state = self.state.lock();
        let reader = state.reader.as_mut().ok_or(IoFault::Closed)?;
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_newline(line)))
    }

    fn read_all(&self) -> Result<String, IoFault> {
        let mut state = self.state.lock();
        let reader = state.reader.as_mut().ok_or(IoFault::Closed)?;
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(text)
    }

    fn write(&self, text: &str) -> Result<(), IoFault> {
        let mut state = self.state.lock();
        let writer = state.writer.as_mut().ok_or(IoFault::Closed)?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), IoFault> {
        let mut state = self.state.lock();
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        state.reader = None;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.reader.is_none() && state.writer.is_none()
    }

    fn wait(&self) -> Result<Option<i32>, IoFault> {
        // Closing stdin lets children that read to end of input finish.
        self.state.lock().writer = None;
        let mut child = self.child.lock();
        match child.as_mut() {
            Some(child) => Ok(child.wait()?.code()),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Buffer handle
// ---------------------------------------------------------------------------

/// In-memory handle: reads come from queued lines, writes are captured.
#[derive(Debug, Default)]
pub struct BufferHandle {
    input: Mutex<VecDeque<String>>,
    written: Mutex<String>,
    closed: Mutex<bool>,
}

impl BufferHandle {
    pub fn new(text: &str) -> Self {
        BufferHandle {
            input: Mutex::new(text.lines().map(str::to_string).collect()),
            ..Default::default()
        }
    }

    pub fn written(&self) -> String {
        self.written.lock().clone()
    }
}

impl IoHandle for BufferHandle {
    fn read_line(&self) -> Result<Option<String>, IoFault> {
        if self.is_closed() {
            return Err(IoFault::Closed);
        }
        Ok(self.input.lock().pop_front())
    }

    fn read_all(&self) -> Result<String, IoFault> {
        if self.is_closed() {
            return Err(IoFault::Closed);
        }
        let lines: Vec<String> = self.input.lock().drain(..).collect();
        Ok(lines.join("\n"))
    }

    fn write(&self, text: &str) -> Result<(), IoFault> {
        if self.is_closed() {
            return Err(IoFault::Closed);
        }
        self.written.lock().push_str(text);
        Ok(())
    }

    fn close(&self) -> Result<(), IoFault> {
        *self.closed.lock() = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn buffer_handle_reads_lines_then_closes() {
        let handle = BufferHandle::new("a\nb\nc");
        assert_eq!(handle.read_line().unwrap().as_deref(), Some("a"));
        assert_eq!(handle.read_all().unwrap(), "b\nc");
        handle.write("out").unwrap();
        handle.close().unwrap();
        assert!(matches!(handle.write("x"), Err(IoFault::Closed)));
        assert_eq!(handle.written(), "out");
    }

    #[test]
    fn stream_handle_strips_line_endings() {
        let reader = Cursor::new(b"first\r\nsecond\n".to_vec());
        let handle = StreamHandle::new(Some(Box::new(reader)), None);
        assert_eq!(handle.read_line().unwrap().as_deref(), Some("first"));
        assert_eq!(handle.read_line().unwrap().as_deref(), Some("second"));
        assert_eq!(handle.read_line().unwrap(), None);
        assert!(matches!(handle.write("x"), Err(IoFault::Closed)));
        handle.close().unwrap();
        assert!(handle.is_closed());
    }

    #[test]
    fn timeout_maps_to_engine_timeout() {
        let err: EngineError = IoFault::Timeout(50).into();
        assert!(matches!(err, EngineError::Timeout(50)));
    }
}
