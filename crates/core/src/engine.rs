//! The request engine: owns the headset session, the request queue and the
//! derived state, and advances them one tick at a time.
//!
//! Two periodic triggers drive it from outside:
//! - [`HeadsetEngine::poll_voltage`] on the slow period queues a battery read;
//! - [`HeadsetEngine::step`] on the fast period writes at most one queued
//!   request and then performs exactly one bounded read.
//!
//! Nothing here is shared between threads. The caller must not run two
//! steps at once, which a single timer loop guarantees.

use crate::config::EngineConfig;
use crate::curve::Curves;
use crate::hidpp::{command_frame, RequestTag};
use crate::report::Report;
use crate::scheduler::RequestQueue;
use crate::state::{DeviceState, HeadsetStatus, StateEvent};
use crate::transport::{read_window, send_frame, HidConnector, HidTransport};
use tracing::{debug, error, info, trace, warn};

/// Drives one headset.
pub struct HeadsetEngine<C: HidConnector> {
    connector: C,
    session: Option<Box<dyn HidTransport>>,
    state: DeviceState,
    queue: RequestQueue,
    curves: Curves,
    read_timeout_ms: i32,
    offline_after: u32,
    timeouts: u32,
    lighting_retry_limit: u32,
    lighting_retries: u32,
}

impl<C: HidConnector> HeadsetEngine<C> {
    pub fn new(connector: C, curves: Curves, config: &EngineConfig) -> Self {
        Self {
            connector,
            session: None,
            state: DeviceState::new(),
            queue: RequestQueue::new(),
            curves,
            read_timeout_ms: config.read_timeout(),
            offline_after: config.offline_after_timeouts,
            timeouts: 0,
            lighting_retry_limit: config.lighting_retry_limit,
            lighting_retries: 0,
        }
    }

    pub fn status(&self) -> HeadsetStatus {
        self.state.status()
    }

    /// Whether a HID session is currently open.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    /// Open the headset now instead of waiting for the first request.
    pub fn connect(&mut self) -> Vec<StateEvent> {
        self.ensure_session();
        self.state.drain_events()
    }

    /// Close the session and mark the headset offline.
    pub fn disconnect(&mut self) -> Vec<StateEvent> {
        self.close_session();
        self.state.drain_events()
    }

    /// Slow trigger: queue a battery voltage read.
    pub fn poll_voltage(&mut self) {
        self.queue.push(RequestTag::Voltage);
    }

    /// Request a lighting state for both zones.
    ///
    /// The new state becomes the desired one immediately; the commands go out
    /// over the next ten ticks.
    pub fn set_lighting(&mut self, on: bool) -> Vec<StateEvent> {
        self.state.set_lighting(on);
        self.lighting_retries = 0;
        self.queue.push_lighting(on);
        self.state.drain_events()
    }

    /// Fast trigger: send the next queued request, if any, then read once.
    pub fn step(&mut self) -> Vec<StateEvent> {
        if let Some(tag) = self.queue.pop() {
            self.execute(tag);
        }
        self.poll_read();
        self.state.drain_events()
    }

    /// Open a session if there is none. On success the headset is marked
    /// online and a version handshake is queued.
    fn ensure_session(&mut self) -> bool {
        if self.session.is_some() {
            return true;
        }
        match self.connector.open() {
            Ok(session) => {
                self.session = Some(session);
                self.timeouts = 0;
                self.state.set_online(true);
                self.queue.push(RequestTag::Version);
                info!("Headset session opened");
                true
            }
            Err(e) => {
                warn!(error = %e, "Headset unavailable");
                self.state.set_online(false);
                false
            }
        }
    }

    fn close_session(&mut self) {
        if self.session.take().is_some() {
            debug!("Headset session closed");
        }
        self.timeouts = 0;
        if self.state.set_online(false) {
            info!("Headset offline");
        }
    }

    fn execute(&mut self, tag: RequestTag) {
        let frame = match command_frame(tag) {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "Dropping request");
                return;
            }
        };
        if !self.ensure_session() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match send_frame(session.as_mut(), &frame) {
            Ok(()) => debug!(?tag, "Request sent"),
            Err(e) => {
                warn!(?tag, error = %e, "Write to headset failed");
                self.close_session();
            }
        }
    }

    fn poll_read(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match read_window(session.as_mut(), self.read_timeout_ms) {
            Ok(data) if data.is_empty() => self.on_timeout(),
            Ok(data) => self.handle_report(&data),
            Err(e) => {
                warn!(error = %e, "Read from headset failed");
                self.close_session();
            }
        }
    }

    fn on_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
        if self.state.online() && self.timeouts >= self.offline_after {
            info!(timeouts = self.timeouts, "Headset silent, marking offline");
            self.state.set_online(false);
        }
    }

    fn handle_report(&mut self, data: &[u8]) {
        let report = Report::decode(data);
        if report == Report::Echo {
            // Receiver reply for a headset it cannot reach.
            trace!("Receiver echo");
            return;
        }
        self.timeouts = 0;
        match report {
            Report::Unhandled => {
                debug!(report_hex = format_args!("{:02X?}", data), "Unhandled packet");
                return;
            }
            Report::Sleep => {
                if self.state.set_online(false) {
                    info!("Headset going to sleep");
                }
                return;
            }
            Report::Wake => {
                if self.state.set_online(true) {
                    info!(lighting = self.state.lighting(), "Headset woke up, restoring lighting");
                    // Lighting is not kept across sleep.
                    self.queue.push_lighting(self.state.lighting());
                }
                return;
            }
            _ => {
                if self.state.set_online(true) {
                    info!("Headset responding again");
                }
            }
        }

        match report {
            Report::Buttons(mask) => self.state.update_buttons(mask),
            Report::Battery { voltage, charging } => {
                let soc = self.curves.soc(i32::from(voltage), charging) as i32;
                debug!(voltage, charging, soc, "Battery report");
                self.state.update_battery(voltage, charging, soc);
            }
            Report::Lighting { zone, effect } => {
                debug!(?zone, effect, "Lighting confirmed");
                self.reconcile_lighting(report.lights_on());
            }
            _ => {}
        }
    }

    /// The desired lighting state wins over what the headset confirms; a
    /// mismatch re-sends the full program, at most `lighting_retry_limit`
    /// times in a row.
    fn reconcile_lighting(&mut self, lit: bool) {
        let desired = self.state.lighting();
        if lit == desired {
            self.lighting_retries = 0;
            return;
        }
        if self.lighting_retries >= self.lighting_retry_limit {
            warn!(
                desired,
                retries = self.lighting_retries,
                "Headset keeps reporting other lighting, giving up"
            );
            return;
        }
        self.lighting_retries += 1;
        info!(desired, attempt = self.lighting_retries, "Restoring lighting state");
        self.queue.push_lighting(desired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveTable;
    use crate::transport::mock::{MockConnector, MockHeadset, MockRead};

    const BATTERY_3900: [u8; 7] = [0x11, 0xFF, 0x08, 0x0A, 0x0F, 0x3C, 0x01];

    fn curves() -> Curves {
        Curves {
            charging: CurveTable::from_pairs(&[(4100, 90.0), (3800, 40.0), (0, 0.0)]),
            discharging: CurveTable::from_pairs(&[(4000, 80.0), (3800, 50.0), (0, 0.0)]),
        }
    }

    fn engine(headset: &MockHeadset) -> HeadsetEngine<MockConnector> {
        HeadsetEngine::new(headset.connector(), curves(), &EngineConfig::default())
    }

    /// Connected engine with the version handshake already consumed.
    fn online_engine(headset: &MockHeadset) -> HeadsetEngine<MockConnector> {
        let mut e = engine(headset);
        e.connect();
        e.step();
        headset.clear_writes();
        e
    }

    #[test]
    fn connect_marks_online_and_queues_version() {
        let headset = MockHeadset::new();
        let mut e = engine(&headset);
        assert_eq!(
            e.connect(),
            vec![StateEvent::OnlineChanged { online: true }]
        );
        assert_eq!(e.pending_requests(), 1);
        e.step();
        assert_eq!(headset.writes(), vec![crate::hidpp::READ_VERSION.to_vec()]);
    }

    #[test]
    fn connect_failure_stays_offline() {
        let headset = MockHeadset::new();
        headset.set_present(false);
        let mut e = engine(&headset);
        assert!(e.connect().is_empty());
        assert!(!e.status().online);
        assert!(!e.is_connected());
    }

    #[test]
    fn empty_queue_only_reads() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        let before = headset.reads_attempted();
        e.step();
        assert!(headset.writes().is_empty());
        assert_eq!(headset.reads_attempted(), before + 1);
    }

    #[test]
    fn no_passive_read_without_session() {
        let headset = MockHeadset::new();
        let mut e = engine(&headset);
        e.step();
        assert_eq!(headset.opens(), 0);
        assert_eq!(headset.reads_attempted(), 0);
    }

    #[test]
    fn voltage_request_opens_lazily() {
        let headset = MockHeadset::new();
        let mut e = engine(&headset);
        e.poll_voltage();
        let events = e.step();
        assert_eq!(events, vec![StateEvent::OnlineChanged { online: true }]);
        assert_eq!(headset.opens(), 1);
        assert_eq!(headset.writes(), vec![crate::hidpp::READ_VOLTAGE.to_vec()]);
        // Handshake queued behind the voltage read.
        assert_eq!(e.pending_requests(), 1);
    }

    #[test]
    fn battery_report_updates_state() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue_report(&BATTERY_3900);
        let events = e.step();
        assert_eq!(
            events,
            vec![
                StateEvent::VoltageChanged { voltage: 3900 },
                StateEvent::SocChanged { soc: 50 },
            ]
        );
        assert_eq!(e.status().soc, Some(50));
    }

    #[test]
    fn charging_switch_without_voltage_change() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue_report(&BATTERY_3900);
        e.step();

        headset.queue_report(&[0x11, 0xFF, 0x08, 0x0A, 0x0F, 0x3C, 0x03]);
        let events = e.step();
        assert_eq!(
            events,
            vec![
                StateEvent::ChargingChanged { charging: true },
                StateEvent::SocChanged { soc: 40 },
            ]
        );
    }

    #[test]
    fn write_failure_closes_session() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        e.poll_voltage();
        headset.fail_next_write();
        let reads = headset.reads_attempted();
        let events = e.step();
        assert_eq!(events, vec![StateEvent::OnlineChanged { online: false }]);
        assert!(!e.is_connected());
        assert_eq!(headset.reads_attempted(), reads);
    }

    #[test]
    fn read_failure_closes_session_and_reopens_lazily() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue(MockRead::Fail);
        assert_eq!(
            e.step(),
            vec![StateEvent::OnlineChanged { online: false }]
        );

        e.poll_voltage();
        assert_eq!(
            e.step(),
            vec![StateEvent::OnlineChanged { online: true }]
        );
        assert_eq!(headset.opens(), 2);
    }

    #[test]
    fn reserved_request_is_dropped() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        e.queue.push(RequestTag::DeviceName);
        e.queue.push(RequestTag::Features);
        e.step();
        e.step();
        assert!(headset.writes().is_empty());
        assert!(e.status().online);
    }

    #[test]
    fn unhandled_packet_changes_nothing() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue_report(&[0x20, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert!(e.step().is_empty());
        assert_eq!(e.status().voltage, 0);
    }

    #[test]
    fn echo_is_ignored() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue_report(&[0x11, 0xFF, 0xFF, 0x08, 0x0A, 0x05, 0x00]);
        assert!(e.step().is_empty());
        assert_eq!(e.pending_requests(), 0);
    }

    #[test]
    fn echo_after_sleep_stays_offline() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        headset.queue_report(&[0x11, 0xFF, 0x08, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(
            e.step(),
            vec![StateEvent::OnlineChanged { online: false }]
        );

        e.poll_voltage();
        headset.queue_report(&[0x11, 0xFF, 0xFF, 0x08, 0x0A, 0x05, 0x00]);
        assert!(e.step().is_empty());
        assert!(!e.status().online);
        assert_eq!(headset.writes(), vec![crate::hidpp::READ_VOLTAGE.to_vec()]);
    }

    #[test]
    fn open_failure_is_retried_lazily() {
        let headset = MockHeadset::new();
        headset.set_fail_open(true);
        let mut e = engine(&headset);
        e.poll_voltage();
        assert!(e.step().is_empty());
        assert!(headset.writes().is_empty());
        assert!(!e.is_connected());
        assert!(!e.status().online);

        headset.set_fail_open(false);
        e.poll_voltage();
        assert_eq!(
            e.step(),
            vec![StateEvent::OnlineChanged { online: true }]
        );
        assert!(e.is_connected());
        assert_eq!(headset.opens(), 1);
    }

    #[test]
    fn sleep_marks_offline_once() {
        let headset = MockHeadset::new();
        let mut e = online_engine(&headset);
        let sleep = [0x11, 0xFF, 0x08, 0x00, 0x00, 0x00, 0x00];
        headset.queue_report(&sleep);
        headset.queue_report(&sleep);
        assert_eq!(
            e.step(),
            vec![StateEvent::OnlineChanged { online: false }]
        );
        assert!(e.step().is_empty());
        assert!(e.is_connected());
    }
}
