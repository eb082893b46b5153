//! Connection state machine

use session_events::ConnectionState;
use tracing::{debug, warn};

/// Lifecycle callbacks, invoked after the state has been updated
pub trait StateListener {
    fn on_connect(&mut self);
    fn on_need_synchronization(&mut self);
    fn on_calculate_delay(&mut self);
    fn on_save_delay(&mut self);
    fn on_consume_video(&mut self);
    fn on_disconnect(&mut self);
}

/// State machine events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Connect,
    NeedSynchronization,
    CalculateDelay,
    SaveDelay,
    ConsumeVideo,
    Disconnect,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::Connect,
        Transition::NeedSynchronization,
        Transition::CalculateDelay,
        Transition::SaveDelay,
        Transition::ConsumeVideo,
        Transition::Disconnect,
    ];

    /// State reached when firing this event from `from`, `None` if illegal
    pub fn target(self, from: ConnectionState) -> Option<ConnectionState> {
        use ConnectionState::*;

        match (self, from) {
            (Transition::Connect, Disconnected) => Some(Connected),
            (Transition::NeedSynchronization, Connected) => Some(WaitingForStartMarker),
            (Transition::CalculateDelay, WaitingForStartMarker) => Some(WaitingForDelayMarker),
            (Transition::SaveDelay, WaitingForDelayMarker) => Some(Synchronized),
            // Reconnection with a previously calibrated delay
            (Transition::SaveDelay, Connected) => Some(Synchronized),
            (Transition::ConsumeVideo, Synchronized) => Some(Consuming),
            (Transition::Disconnect, Disconnected) => None,
            (Transition::Disconnect, _) => Some(Disconnected),
            _ => None,
        }
    }
}

/// Holds the single authoritative state of one remote video client.
///
/// Transition methods only dispatch: the state is written first, then
/// exactly one listener callback runs. Illegal events are logged and ignored.
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether `transition` is legal in the current state
    pub fn can_apply(&self, transition: Transition) -> bool {
        transition.target(self.state).is_some()
    }

    /// Fire `transition`. Returns false (and calls nothing) when illegal.
    pub fn apply<L: StateListener + ?Sized>(&mut self, transition: Transition, listener: &mut L) -> bool {
        let Some(next) = transition.target(self.state) else {
            warn!("Ignoring {:?} in state {:?}", transition, self.state);
            return false;
        };

        debug!("{:?}: {:?} -> {:?}", transition, self.state, next);
        self.state = next;

        match transition {
            Transition::Connect => listener.on_connect(),
            Transition::NeedSynchronization => listener.on_need_synchronization(),
            Transition::CalculateDelay => listener.on_calculate_delay(),
            Transition::SaveDelay => listener.on_save_delay(),
            Transition::ConsumeVideo => listener.on_consume_video(),
            Transition::Disconnect => listener.on_disconnect(),
        }
        true
    }

    pub fn connect<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::Connect, listener)
    }

    pub fn need_synchronization<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::NeedSynchronization, listener)
    }

    pub fn calculate_delay<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::CalculateDelay, listener)
    }

    pub fn save_delay<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::SaveDelay, listener)
    }

    pub fn consume_video<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::ConsumeVideo, listener)
    }

    pub fn disconnect<L: StateListener + ?Sized>(&mut self, listener: &mut L) -> bool {
        self.apply(Transition::Disconnect, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ConnectionState::*;

    const STATES: [ConnectionState; 6] = [
        Disconnected,
        Connected,
        WaitingForStartMarker,
        WaitingForDelayMarker,
        Synchronized,
        Consuming,
    ];

    const LEGAL: [(ConnectionState, Transition, ConnectionState); 11] = [
        (Disconnected, Transition::Connect, Connected),
        (Connected, Transition::NeedSynchronization, WaitingForStartMarker),
        (WaitingForStartMarker, Transition::CalculateDelay, WaitingForDelayMarker),
        (WaitingForDelayMarker, Transition::SaveDelay, Synchronized),
        (Connected, Transition::SaveDelay, Synchronized),
        (Synchronized, Transition::ConsumeVideo, Consuming),
        (Connected, Transition::Disconnect, Disconnected),
        (Consuming, Transition::Disconnect, Disconnected),
        (WaitingForStartMarker, Transition::Disconnect, Disconnected),
        (WaitingForDelayMarker, Transition::Disconnect, Disconnected),
        (Synchronized, Transition::Disconnect, Disconnected),
    ];

    /// Records callback names in call order
    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl StateListener for Recorder {
        fn on_connect(&mut self) {
            self.calls.push("connect");
        }
        fn on_need_synchronization(&mut self) {
            self.calls.push("need_synchronization");
        }
        fn on_calculate_delay(&mut self) {
            self.calls.push("calculate_delay");
        }
        fn on_save_delay(&mut self) {
            self.calls.push("save_delay");
        }
        fn on_consume_video(&mut self) {
            self.calls.push("consume_video");
        }
        fn on_disconnect(&mut self) {
            self.calls.push("disconnect");
        }
    }

    fn machine_in(state: ConnectionState) -> ConnectionStateMachine {
        ConnectionStateMachine { state }
    }

    #[test]
    fn test_full_calibration_path() {
        let mut machine = ConnectionStateMachine::new();
        let mut listener = Recorder::default();

        assert!(machine.connect(&mut listener));
        assert!(machine.need_synchronization(&mut listener));
        assert!(machine.calculate_delay(&mut listener));
        assert!(machine.save_delay(&mut listener));
        assert!(machine.consume_video(&mut listener));
        assert_eq!(machine.state(), Consuming);
        assert!(machine.disconnect(&mut listener));
        assert_eq!(machine.state(), Disconnected);

        assert_eq!(
            listener.calls,
            vec![
                "connect",
                "need_synchronization",
                "calculate_delay",
                "save_delay",
                "consume_video",
                "disconnect"
            ]
        );
    }

    #[test]
    fn test_stored_delay_skips_calibration() {
        let mut machine = machine_in(Connected);
        let mut listener = Recorder::default();

        assert!(machine.save_delay(&mut listener));
        assert_eq!(machine.state(), Synchronized);
        assert_eq!(listener.calls, vec!["save_delay"]);
    }

    #[test]
    fn test_repeated_events_are_harmless() {
        let mut machine = machine_in(WaitingForStartMarker);
        let mut listener = Recorder::default();

        for _ in 0..100 {
            machine.need_synchronization(&mut listener);
        }
        assert_eq!(machine.state(), WaitingForStartMarker);
        assert!(listener.calls.is_empty());
    }

    proptest! {
        #[test]
        fn prop_only_listed_transitions_fire(state_idx in 0usize..6, event_idx in 0usize..6) {
            let from = STATES[state_idx];
            let event = Transition::ALL[event_idx];
            let mut machine = machine_in(from);
            let mut listener = Recorder::default();

            let fired = machine.apply(event, &mut listener);
            let expected = LEGAL.iter().find(|(s, e, _)| *s == from && *e == event);

            match expected {
                Some((_, _, to)) => {
                    prop_assert!(fired);
                    prop_assert_eq!(machine.state(), *to);
                    prop_assert_eq!(listener.calls.len(), 1);
                }
                None => {
                    prop_assert!(!fired);
                    prop_assert_eq!(machine.state(), from);
                    prop_assert!(listener.calls.is_empty());
                }
            }
        }
    }
}
