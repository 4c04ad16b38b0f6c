//! Derived headset state and change notifications.
//!
//! Every setter compares against the stored value and queues a
//! [`StateEvent`] only when something actually changed. The engine drains
//! the queue after each operation and hands the batch to its caller.

use serde::Serialize;

/// A change in the observable headset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEvent {
    OnlineChanged { online: bool },
    ChargingChanged { charging: bool },
    VoltageChanged { voltage: u16 },
    SocChanged { soc: i32 },
    LightingChanged { lighting: bool },
    /// A button changed state. `index` is the bit position in the mask.
    Button { index: u8, pressed: bool },
}

/// Read-only snapshot of the headset state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeadsetStatus {
    pub online: bool,
    pub charging: bool,
    /// Raw battery voltage, 0 until the first battery report.
    pub voltage: u16,
    /// State of charge in percent, `None` until the first battery report.
    pub soc: Option<i32>,
    /// Last requested lighting state.
    pub lighting: bool,
}

/// Mutable headset state owned by the engine.
#[derive(Debug, Default)]
pub struct DeviceState {
    online: bool,
    charging: bool,
    lighting: bool,
    voltage: u16,
    soc: Option<i32>,
    buttons: u8,
    pending: Vec<StateEvent>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn charging(&self) -> bool {
        self.charging
    }

    pub fn lighting(&self) -> bool {
        self.lighting
    }

    pub fn voltage(&self) -> u16 {
        self.voltage
    }

    pub fn soc(&self) -> Option<i32> {
        self.soc
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn status(&self) -> HeadsetStatus {
        HeadsetStatus {
            online: self.online,
            charging: self.charging,
            voltage: self.voltage,
            soc: self.soc,
            lighting: self.lighting,
        }
    }

    /// Returns true if the value changed.
    pub fn set_online(&mut self, online: bool) -> bool {
        if self.online == online {
            return false;
        }
        self.online = online;
        self.pending.push(StateEvent::OnlineChanged { online });
        true
    }

    pub fn set_lighting(&mut self, lighting: bool) -> bool {
        if self.lighting == lighting {
            return false;
        }
        self.lighting = lighting;
        self.pending.push(StateEvent::LightingChanged { lighting });
        true
    }

    /// Store a battery reading. Voltage, charging and state of charge each
    /// notify independently; all three are stored unconditionally.
    pub fn update_battery(&mut self, voltage: u16, charging: bool, soc: i32) {
        if self.voltage != voltage {
            self.pending.push(StateEvent::VoltageChanged { voltage });
        }
        if self.charging != charging {
            self.pending.push(StateEvent::ChargingChanged { charging });
        }
        if self.soc != Some(soc) {
            self.pending.push(StateEvent::SocChanged { soc });
        }
        self.voltage = voltage;
        self.charging = charging;
        self.soc = Some(soc);
    }

    /// Replace the button mask, queueing one event per changed bit.
    pub fn update_buttons(&mut self, mask: u8) {
        for (index, pressed) in crate::report::button_edges(self.buttons, mask) {
            self.pending.push(StateEvent::Button { index, pressed });
        }
        self.buttons = mask;
    }

    /// Take all queued events in emission order.
    pub fn drain_events(&mut self) -> Vec<StateEvent> {
        std::mem::take(&mut self.pending)
    }
}
