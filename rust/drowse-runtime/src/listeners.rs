//! Registry of listening sockets keyed by port.
//!
//! At most one listener owns a port. Accepts run on a background worker so
//! a caller can bound how long it blocks; the accept itself keeps going
//! after a timeout and a later connection is simply dropped with the worker.

use crate::io::{IoFault, StreamHandle};
use crate::worker::{BackgroundTask, WorkerError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<u16, Arc<TcpListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a listener on `port` (0 picks a free port). Returns the bound port.
    pub fn listen(&self, port: u16) -> Result<u16, IoFault> {
        let mut listeners = self.listeners.lock();
        if port != 0 && listeners.contains_key(&port) {
            return Err(IoFault::PortInUse(port));
        }
        let listener = TcpListener::bind(("127.0.0.1", port))?;
        let bound = listener.local_addr()?.port();
        listeners.insert(bound, Arc::new(listener));
        tracing::debug!(port = bound, "listener registered");
        Ok(bound)
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.listeners.lock().contains_key(&port)
    }

    /// Wait for one connection on `port`.
    pub fn accept(&self, port: u16, timeout: Option<Duration>) -> Result<StreamHandle, IoFault> {
        let listener = self
            .listeners
            .lock()
            .get(&port)
            .cloned()
            .ok_or(IoFault::NotListening(port))?;
        let task = BackgroundTask::spawn(format!("accept-{}", port), move || listener.accept());
        match task.wait(timeout) {
            Ok(Ok((stream, peer))) => {
                tracing::debug!(port, %peer, "accepted connection");
                StreamHandle::tcp(stream)
            }
            Ok(Err(err)) => Err(IoFault::Io(err)),
            Err(WorkerError::Timeout(ms)) => Err(IoFault::Timeout(ms)),
            Err(other) => Err(IoFault::Io(std::io::Error::other(other.to_string()))),
        }
    }

    /// Free the port for reuse. Returns whether a listener was registered.
    pub fn release(&self, port: u16) -> bool {
        let removed = self.listeners.lock().remove(&port).is_some();
        if removed {
            tracing::debug!(port, "listener released");
        }
        removed
    }

    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.listeners.lock().keys().copied().collect();
        ports.sort_unstable();
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoHandle;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpStream;

    #[test]
    fn one_listener_per_port() {
        let registry = ListenerRegistry::new();
        let port = registry.listen(0).unwrap();
        assert!(registry.is_listening(port));
        assert!(matches!(registry.listen(port), Err(IoFault::PortInUse(p)) if p == port));
        assert!(registry.release(port));
        assert!(!registry.is_listening(port));
        assert!(!registry.release(port));
    }

    #[test]
    fn accept_times_out_without_client() {
        let registry = ListenerRegistry::new();
        let port = registry.listen(0).unwrap();
        let result = registry.accept(port, Some(Duration::from_millis(30)));
        assert!(matches!(result, Err(IoFault::Timeout(30))));
    }

    #[test]
    fn accept_unknown_port() {
        let registry = ListenerRegistry::new();
        assert!(matches!(
            registry.accept(1, Some(Duration::from_millis(1))),
            Err(IoFault::NotListening(1))
        ));
    }

    #[test]
    fn accepted_stream_talks_to_client() {
        let registry = ListenerRegistry::new();
        let port = registry.listen(0).unwrap();
        let client = std::thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream.write_all(b"ping\n").unwrap();
            let mut reply = String::new();
            BufReader::new(stream).read_line(&mut reply).unwrap();
            reply
        });
        let handle = registry.accept(port, Some(Duration::from_secs(5))).unwrap();
        assert_eq!(handle.read_line().unwrap().as_deref(), Some("ping"));
        handle.write("pong\n").unwrap();
        handle.close().unwrap();
        assert_eq!(client.join().unwrap(), "pong\n");
    }
}
