use super::errors::{GuardError, GuardResult};
use super::states::StopStatus;
use crate::models::{Confirmation, OperatorId, Route, Stop};

/// Trait for implementing state transition guards.
///
/// Guards are pure checks over in-memory entities; the authoritative copy is
/// fetched before the guard runs so a stale local view never passes a guard on
/// its own.
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard ensuring a stop has not reached a terminal state yet
pub struct StopIsPendingGuard;

impl StateGuard<Stop> for StopIsPendingGuard {
    fn check(&self, stop: &Stop) -> GuardResult<()> {
        if stop.status != StopStatus::Pending {
            return Err(GuardError::StopNotPending {
                stop_id: stop.id.clone(),
                status: stop.status,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Stop must be pending"
    }
}

/// Guard ensuring a confirmation payload was built for the stop's type
pub struct ConfirmationMatchesStopGuard<'a> {
    confirmation: &'a Confirmation,
}

impl<'a> ConfirmationMatchesStopGuard<'a> {
    pub fn new(confirmation: &'a Confirmation) -> Self {
        Self { confirmation }
    }
}

impl StateGuard<Stop> for ConfirmationMatchesStopGuard<'_> {
    fn check(&self, stop: &Stop) -> GuardResult<()> {
        let payload_type = self.confirmation.stop_type();
        if payload_type != stop.stop_type {
            return Err(GuardError::ConfirmationMismatch {
                stop_id: stop.id.clone(),
                stop_type: stop.stop_type,
                payload_type,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Confirmation variant must match the stop type"
    }
}

/// Guard to check if all stops are terminal before finishing a route
pub struct AllStopsTerminalGuard;

impl StateGuard<Route> for AllStopsTerminalGuard {
    fn check(&self, route: &Route) -> GuardResult<()> {
        let pending = route.stops.iter().filter(|stop| !stop.is_terminal()).count();
        if pending > 0 {
            return Err(GuardError::StopsRemaining {
                route_id: route.id.clone(),
                pending,
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "All stops must be completed or skipped"
    }
}

/// Guard ensuring the acting operator is the one assigned to the route
pub struct AssignedOperatorGuard<'a> {
    operator_id: &'a OperatorId,
}

impl<'a> AssignedOperatorGuard<'a> {
    pub fn new(operator_id: &'a OperatorId) -> Self {
        Self { operator_id }
    }
}

impl StateGuard<Route> for AssignedOperatorGuard<'_> {
    fn check(&self, route: &Route) -> GuardResult<()> {
        if !route.is_assigned_to(self.operator_id) {
            return Err(GuardError::NotAssignedOperator {
                route_id: route.id.clone(),
                operator_id: self.operator_id.clone(),
            });
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Caller must be the assigned operator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Address, OriginConfirmation, ConfirmationAnswer, StopType};

    fn origin() -> Stop {
        Stop::origin("o", Address::new("Depot"))
    }

    #[test]
    fn test_pending_guard() {
        let mut stop = origin();
        assert!(StopIsPendingGuard.check(&stop).is_ok());

        stop.status = StopStatus::Skipped;
        assert_eq!(
            StopIsPendingGuard.check(&stop),
            Err(GuardError::StopNotPending {
                stop_id: stop.id.clone(),
                status: StopStatus::Skipped,
            })
        );
    }

    #[test]
    fn test_confirmation_variant_must_match() {
        let confirmation = Confirmation::Origin(OriginConfirmation {
            loading_confirmed: ConfirmationAnswer::Yes,
            loading_photos: vec![],
        });
        let guard = ConfirmationMatchesStopGuard::new(&confirmation);
        assert!(guard.check(&origin()).is_ok());

        let destination = Stop::destination("d", Address::new("Warehouse"));
        assert!(matches!(
            guard.check(&destination),
            Err(GuardError::ConfirmationMismatch {
                stop_type: StopType::Destination,
                payload_type: StopType::Origin,
                ..
            })
        ));
    }
}
