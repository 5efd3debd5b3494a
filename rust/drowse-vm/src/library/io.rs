//! Processes, sockets and background tasks.

use super::{arg, Library};
use crate::context::Context;
use crate::taint::TaintPolicy;
use drowse_core::value::HostObject;
use drowse_core::{ClosureRef, EngineError, Scalar, ScalarValue};
use drowse_runtime::{BackgroundTask, IoHandle, StreamHandle};
use std::any::Any;
use std::net::TcpStream;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

/// An I/O handle held by a script.
#[derive(Clone)]
pub struct HandleObject {
    io: Arc<dyn IoHandle>,
    label: String,
}

impl HandleObject {
    pub fn new(io: Arc<dyn IoHandle>, label: impl Into<String>) -> Self {
        HandleObject {
            io,
            label: label.into(),
        }
    }

    pub fn from_scalar(value: &Scalar) -> Option<HandleObject> {
        value
            .as_object()
            .and_then(|o| o.as_any().downcast_ref::<HandleObject>().cloned())
    }

    pub fn io(&self) -> &Arc<dyn IoHandle> {
        &self.io
    }

    pub fn to_scalar(self) -> Scalar {
        Scalar::object(Arc::new(self))
    }
}

impl HostObject for HandleObject {
    fn type_name(&self) -> &str {
        "Handle"
    }

    fn describe(&self) -> String {
        let state = if self.io.is_closed() { "closed" } else { "open" };
        format!("handle[{}, {}]", self.label, state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

type Connection = Result<HandleObject, String>;

/// A connect or accept still running in the background.
pub struct TaskObject {
    task: BackgroundTask<Connection>,
}

impl TaskObject {
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Scalar, EngineError> {
        match self.task.wait(timeout)? {
            Ok(handle) => Ok(handle.to_scalar()),
            Err(message) => Err(EngineError::runtime(message)),
        }
    }
}

impl HostObject for TaskObject {
    fn type_name(&self) -> &str {
        "Task"
    }

    fn describe(&self) -> String {
        let state = if self.task.is_finished() { "finished" } else { "running" };
        format!("task[{}, {}]", self.task.name(), state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn timeout_arg(args: &[Scalar], i: usize) -> Option<Duration> {
    match arg(args, i).as_int() {
        ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
        _ => None,
    }
}

fn callback_arg(args: &[Scalar], i: usize) -> Option<ClosureRef> {
    args.get(i).and_then(Scalar::as_closure)
}

/// Run `work` now, or in the background with the handle delivered to
/// `callback` when one is given.
fn settle<F>(name: String, work: F, timeout: Option<Duration>, callback: Option<ClosureRef>) -> Result<Scalar, EngineError>
where
    F: FnOnce() -> Connection + Send + 'static,
{
    match callback {
        Some(callback) => {
            let task = BackgroundTask::spawn_with_callback(name, work, move |outcome: Connection| {
                let arg = match outcome {
                    Ok(handle) => handle.to_scalar(),
                    Err(_) => Scalar::null(),
                };
                if let Err(err) = callback.call(None, vec![arg]) {
                    tracing::warn!(error = %err, "connection callback failed");
                }
            });
            Ok(Scalar::object(Arc::new(TaskObject { task })))
        }
        None => TaskObject {
            task: BackgroundTask::spawn(name, work),
        }
        .wait(timeout),
    }
}

fn exec(args: &[Scalar]) -> Result<Scalar, EngineError> {
    let command = arg(args, 0).as_string();
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| EngineError::runtime("&exec: empty command"))?;
    let child = Command::new(program)
        .args(words)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| EngineError::runtime(format!("&exec: {}: {}", command, err)))?;
    tracing::debug!(%command, pid = child.id(), "spawned process");
    Ok(HandleObject::new(Arc::new(StreamHandle::process(child)), command).to_scalar())
}

// &listen(port, timeout, &callback)
fn listen(ctx: &mut Context, args: &[Scalar]) -> Result<Scalar, EngineError> {
    let port = u16::try_from(arg(args, 0).as_int())
        .map_err(|_| EngineError::runtime(format!("&listen: invalid port {}", arg(args, 0).as_int())))?;
    let listeners = ctx.listeners().clone();
    let port = if listeners.is_listening(port) {
        port
    } else {
        listeners.listen(port)?
    };
    let timeout = timeout_arg(args, 1);
    settle(
        format!("listen-{}", port),
        move || {
            listeners
                .accept(port, timeout)
                .map(|stream| HandleObject::new(Arc::new(stream), format!("listen:{}", port)))
                .map_err(|e| e.to_string())
        },
        None,
        callback_arg(args, 2),
    )
}

// &connect(host, port, timeout, &callback)
fn connect(args: &[Scalar]) -> Result<Scalar, EngineError> {
    let host = arg(args, 0).as_string();
    let port = u16::try_from(arg(args, 1).as_int())
        .map_err(|_| EngineError::runtime(format!("&connect: invalid port {}", arg(args, 1).as_int())))?;
    let label = format!("{}:{}", host, port);
    let target = label.clone();
    settle(
        format!("connect-{}", label),
        move || {
            TcpStream::connect(target.as_str())
                .map_err(|e| e.to_string())
                .and_then(|stream| StreamHandle::tcp(stream).map_err(|e| e.to_string()))
                .map(|stream| HandleObject::new(Arc::new(stream), target))
        },
        timeout_arg(args, 2),
        callback_arg(args, 3),
    )
}

fn wait(args: &[Scalar]) -> Result<Scalar, EngineError> {
    let target = arg(args, 0);
    let timeout = timeout_arg(args, 1);
    if let Some(handle) = HandleObject::from_scalar(&target) {
        let io = handle.io().clone();
        let task = BackgroundTask::spawn(format!("wait-{}", handle.label), move || io.wait());
        return Ok(match task.wait(timeout)?? {
            Some(code) => Scalar::int(code as i64),
            None => Scalar::null(),
        });
    }
    let value = target.get();
    match value.inner() {
        ScalarValue::Object(object) => match object.as_any().downcast_ref::<TaskObject>() {
            Some(task) => task.wait(timeout),
            None => Err(EngineError::bad_cast(format!("&wait: cannot wait on {}", object.type_name()))),
        },
        other => Err(EngineError::bad_cast(format!(
            "&wait: cannot wait on a value of type {}",
            other.type_name()
        ))),
    }
}

pub(super) fn install(lib: &mut Library<'_>) {
    lib.classified("&exec", TaintPolicy::Sensitive, |_, args| exec(&args));
    lib.define("&listen", |ctx, args| listen(ctx, &args));
    lib.define("&connect", |_, args| connect(&args));
    lib.define("&wait", |_, args| wait(&args));

    // A handle is closed; a port number releases its listener.
    lib.define("&closef", |ctx, args| {
        let target = arg(&args, 0);
        if let Some(handle) = HandleObject::from_scalar(&target) {
            handle.io().close()?;
            return Ok(Scalar::null());
        }
        if target.is_number() {
            let port = u16::try_from(target.as_int()).unwrap_or_default();
            return Ok(Scalar::int(ctx.listeners().release(port) as i64));
        }
        Err(EngineError::bad_cast(format!(
            "&closef: cannot close a value of type {}",
            target.type_name()
        )))
    });
}
