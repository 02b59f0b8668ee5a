use std::fmt::{Display, Formatter};

/// Default capacity of the inbound body channel.
pub const DEFAULT_CAPACITY: usize = 8;

/// Default backpressure boundary of a framed writer.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 8 * 1024;

/// How a transport schedules the I/O of its connections.
///
/// The exchange does not depend on it; it is carried for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// one event loop services many connections
    #[default]
    EventLoop,
    /// connections are serviced by a shared pool of threads
    ThreadPool,
    /// every connection has its own thread
    ThreadPerConnection,
}

impl Display for Dispatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dispatch::EventLoop => "event-loop",
            Dispatch::ThreadPool => "thread-pool",
            Dispatch::ThreadPerConnection => "thread-per-connection",
        };
        f.write_str(name)
    }
}

/// Settings a transport exposes to the exchanges running on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    capacity: usize,
    write_buffer_size: usize,
    dispatch: Dispatch,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY, write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE, dispatch: Dispatch::default() }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inbound channel capacity; zero is raised to one.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_write_buffer_size(mut self, write_buffer_size: usize) -> Self {
        self.write_buffer_size = write_buffer_size;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }
}
