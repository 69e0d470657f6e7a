//! Aggregate trait for event-sourced domain models.

use crate::message::Event;
use crate::name::AggregateType;

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates must not perform IO or side effects. Versioning lives in the
/// event stream, not in the aggregate: the stream version is the sequence
/// number of the last applied record.
pub trait Aggregate {
    type Command: core::fmt::Debug;
    type Event: Event;
    type Error: core::fmt::Debug;

    /// Stream namespace for every instance of this aggregate.
    fn aggregate_type() -> AggregateType;

    /// Evolve in-memory state from a single event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    ///
    /// This must not mutate state. State evolution is done through `apply`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}

/// Decide and evolve in one step, without persistence.
pub fn execute<A: Aggregate>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error> {
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::message::Payload;
    use crate::name::PayloadType;

    #[derive(Debug, Clone, PartialEq)]
    enum CounterEvent {
        Incremented(u32),
    }

    impl Payload for CounterEvent {
        fn payload_type(&self) -> PayloadType {
            PayloadType::from_static("counter.incremented")
        }
    }

    impl Event for CounterEvent {}

    #[derive(Debug, Default)]
    struct Counter {
        value: u32,
    }

    impl Aggregate for Counter {
        type Command = u32;
        type Event = CounterEvent;
        type Error = DomainError;

        fn aggregate_type() -> AggregateType {
            AggregateType::from_static("counter")
        }

        fn apply(&mut self, event: &CounterEvent) {
            let CounterEvent::Incremented(by) = event;
            self.value += by;
        }

        fn handle(&self, by: &u32) -> Result<Vec<CounterEvent>, DomainError> {
            if *by == 0 {
                return Err(DomainError::rejected("increment must be positive"));
            }
            Ok(vec![CounterEvent::Incremented(*by)])
        }
    }

    #[test]
    fn execute_applies_decided_events() {
        let mut counter = Counter::default();
        let events = execute(&mut counter, &3).unwrap();
        assert_eq!(events, vec![CounterEvent::Incremented(3)]);
        assert_eq!(counter.value, 3);
    }

    #[test]
    fn rejected_command_leaves_state_untouched() {
        let mut counter = Counter::default();
        assert!(execute(&mut counter, &0).is_err());
        assert_eq!(counter.value, 0);
    }
}
