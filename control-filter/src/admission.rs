use crate::message::ControlState;

/// Outcome of the admission filter. Every rejecting predicate has its own
/// variant so the poll loop can log exactly which rule dropped the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    /// Event state disagrees with the freshly fetched workspace state; the
    /// event was superseded while it sat on the queue.
    StaleEvent,
    /// Event and old state are equal, so nothing actually transitioned.
    NoTransition,
    /// Only alarm and ok are reportable states.
    NotReportable,
    /// An ok is only newsworthy as the resolution of a prior alarm.
    NotAResolution,
}

// Ordered, short-circuiting, all predicates exclusionary. The first match
// wins; a record only proceeds to translation if none of them fire.
pub fn evaluate(
    event_state: &ControlState,
    current_state: &ControlState,
    old_state: &ControlState,
) -> Verdict {
    if event_state != current_state {
        return Verdict::StaleEvent;
    }

    if event_state == old_state {
        return Verdict::NoTransition;
    }

    if !matches!(event_state, ControlState::Alarm | ControlState::Ok) {
        return Verdict::NotReportable;
    }

    if *event_state == ControlState::Ok && *old_state != ControlState::Alarm {
        return Verdict::NotAResolution;
    }

    Verdict::Admit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(s: &str) -> ControlState {
        ControlState::from(s.to_string())
    }

    #[test]
    fn stale_event_is_rejected_first() {
        assert_eq!(
            evaluate(&state("alarm"), &state("ok"), &state("ok")),
            Verdict::StaleEvent
        );
    }

    #[test]
    fn unchanged_state_is_not_a_transition() {
        assert_eq!(
            evaluate(&state("alarm"), &state("alarm"), &state("alarm")),
            Verdict::NoTransition
        );
    }

    #[test]
    fn states_other_than_alarm_or_ok_are_not_reportable() {
        assert_eq!(
            evaluate(&state("unknown"), &state("unknown"), &state("ok")),
            Verdict::NotReportable
        );
        assert_eq!(
            evaluate(&state("skipped"), &state("skipped"), &state("alarm")),
            Verdict::NotReportable
        );
    }

    #[test]
    fn ok_without_a_prior_alarm_is_not_a_resolution() {
        assert_eq!(
            evaluate(&state("ok"), &state("ok"), &state("TBD")),
            Verdict::NotAResolution
        );
        assert_eq!(
            evaluate(&state("ok"), &state("ok"), &state("skipped")),
            Verdict::NotAResolution
        );
    }

    #[test]
    fn a_genuine_alarm_is_admitted() {
        assert_eq!(
            evaluate(&state("alarm"), &state("alarm"), &state("ok")),
            Verdict::Admit
        );
        assert_eq!(
            evaluate(&state("alarm"), &state("alarm"), &state("TBD")),
            Verdict::Admit
        );
    }

    #[test]
    fn an_ok_resolving_a_prior_alarm_is_admitted() {
        assert_eq!(
            evaluate(&state("ok"), &state("ok"), &state("alarm")),
            Verdict::Admit
        );
    }

    #[test]
    fn two_distinct_unknown_states_still_read_as_stale() {
        // "error" vs "skipped" disagree before reportability is considered
        assert_eq!(
            evaluate(&state("error"), &state("skipped"), &state("ok")),
            Verdict::StaleEvent
        );
    }

    #[test]
    fn the_decision_is_a_pure_function_of_its_inputs() {
        let first = evaluate(&state("alarm"), &state("alarm"), &state("ok"));
        let second = evaluate(&state("alarm"), &state("alarm"), &state("ok"));
        assert_eq!(first, second);
    }
}
