//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that the real hidapi-backed
//! headset and the mock headset used in tests share the same interface.

use crate::error::Result;
use crate::hidpp::{Frame, READ_WINDOW_LEN};
use tracing::{trace, warn};

/// Abstraction over an open HID session.
///
/// Dropping the session closes the underlying handle.
pub trait HidTransport: Send {
    /// Write a raw HID report, returning the number of bytes accepted.
    fn write_report(&mut self, data: &[u8]) -> Result<usize>;

    /// Read one report, waiting at most `timeout_ms`.
    ///
    /// Returns `Ok(0)` on timeout; errors are reserved for transport failures.
    fn read_report(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// Finds the headset and opens a fresh session to it.
pub trait HidConnector: Send {
    /// Enumerate, then open. Fails with `DeviceNotFound` when enumeration
    /// comes up empty and `Hid` when the open itself fails.
    fn open(&mut self) -> Result<Box<dyn HidTransport>>;
}

/// Write a full command frame.
pub fn send_frame(transport: &mut dyn HidTransport, frame: &Frame) -> Result<()> {
    trace!(report_hex = format_args!("{:02X?}", frame), "HID TX");
    let written = transport.write_report(frame)?;
    if written < frame.len() {
        warn!(written, expected = frame.len(), "Short HID write");
    }
    Ok(())
}

/// Read one inbound window. An empty vector means the read timed out.
pub fn read_window(transport: &mut dyn HidTransport, timeout_ms: i32) -> Result<Vec<u8>> {
    let mut buf = [0u8; READ_WINDOW_LEN];
    let n = transport.read_report(&mut buf, timeout_ms)?;
    let n = n.min(buf.len());
    if n > 0 {
        trace!(report_hex = format_args!("{:02X?}", &buf[..n]), "HID RX");
    }
    Ok(buf[..n].to_vec())
}

/// A scripted headset for testing.
///
/// Reads are served from a queue (an empty queue times out) and every
/// write is recorded.
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// One scripted read outcome.
    #[derive(Debug, Clone)]
    pub enum MockRead {
        Data(Vec<u8>),
        Timeout,
        Fail,
    }

    #[derive(Debug)]
    struct Inner {
        present: bool,
        fail_open: bool,
        fail_next_write: bool,
        opens: usize,
        reads_attempted: usize,
        writes: Vec<Vec<u8>>,
        reads: VecDeque<MockRead>,
    }

    /// Shared handle to the scripted device.
    #[derive(Debug, Clone)]
    pub struct MockHeadset {
        inner: Arc<Mutex<Inner>>,
    }

    impl MockHeadset {
        /// A plugged-in headset with nothing to say.
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(Inner {
                    present: true,
                    fail_open: false,
                    fail_next_write: false,
                    opens: 0,
                    reads_attempted: 0,
                    writes: Vec::new(),
                    reads: VecDeque::new(),
                })),
            }
        }

        pub fn connector(&self) -> MockConnector {
            MockConnector {
                headset: self.clone(),
            }
        }

        pub fn set_present(&self, present: bool) {
            self.inner.lock().unwrap().present = present;
        }

        pub fn set_fail_open(&self, fail: bool) {
            self.inner.lock().unwrap().fail_open = fail;
        }

        pub fn fail_next_write(&self) {
            self.inner.lock().unwrap().fail_next_write = true;
        }

        /// Queue a report for a later read.
        pub fn queue_report(&self, data: &[u8]) {
            self.queue(MockRead::Data(data.to_vec()));
        }

        pub fn queue_timeouts(&self, count: usize) {
            for _ in 0..count {
                self.queue(MockRead::Timeout);
            }
        }

        pub fn queue(&self, read: MockRead) {
            self.inner.lock().unwrap().reads.push_back(read);
        }

        /// All frames written so far.
        pub fn writes(&self) -> Vec<Vec<u8>> {
            self.inner.lock().unwrap().writes.clone()
        }

        pub fn clear_writes(&self) {
            self.inner.lock().unwrap().writes.clear();
        }

        pub fn opens(&self) -> usize {
            self.inner.lock().unwrap().opens
        }

        pub fn reads_attempted(&self) -> usize {
            self.inner.lock().unwrap().reads_attempted
        }
    }

    /// Connector handing out sessions to a [`MockHeadset`].
    pub struct MockConnector {
        headset: MockHeadset,
    }

    impl HidConnector for MockConnector {
        fn open(&mut self) -> Result<Box<dyn HidTransport>> {
            let mut inner = self.headset.inner.lock().unwrap();
            if !inner.present {
                return Err(Error::DeviceNotFound("mock: headset unplugged".into()));
            }
            if inner.fail_open {
                return Err(Error::Hid("mock: open failed".into()));
            }
            inner.opens += 1;
            Ok(Box::new(MockSession {
                headset: self.headset.clone(),
            }))
        }
    }

    struct MockSession {
        headset: MockHeadset,
    }

    impl HidTransport for MockSession {
        fn write_report(&mut self, data: &[u8]) -> Result<usize> {
            let mut inner = self.headset.inner.lock().unwrap();
            if std::mem::take(&mut inner.fail_next_write) {
                return Err(Error::Hid("mock: write failed".into()));
            }
            inner.writes.push(data.to_vec());
            Ok(data.len())
        }

        fn read_report(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
            let mut inner = self.headset.inner.lock().unwrap();
            inner.reads_attempted += 1;
            match inner.reads.pop_front().unwrap_or(MockRead::Timeout) {
                MockRead::Timeout => Ok(0),
                MockRead::Fail => Err(Error::Hid("mock: read failed".into())),
                MockRead::Data(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
            }
        }
    }
}
