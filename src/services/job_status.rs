//! Job-order status rules.
//!
//! Transitions are checked against an explicit table. Entering QI is further
//! guarded by the work-content check, and part availability drives the
//! automatic WP/FP moves.

use crate::entities::job_order::{JobPart, JobTask, PartAvailability, TaskStatus};
use crate::entities::JobOrderStatus::{self, *};
use crate::errors::ServiceError;

const HOLDS: [JobOrderStatus; 4] = [HoldCustomer, HoldWarranty, HoldInsurance, HoldFord];

/// Statuses reachable from `from` through an ordinary status change.
pub fn allowed_targets(from: JobOrderStatus) -> &'static [JobOrderStatus] {
    match from {
        OnGoing => &[
            WaitingParts,
            QualityInspection,
            HoldCustomer,
            HoldWarranty,
            HoldInsurance,
            HoldFord,
            Sublet,
            ForPlotting,
            Unassigned,
        ],
        WaitingParts => &[
            ForPlotting,
            OnGoing,
            HoldCustomer,
            HoldWarranty,
            HoldInsurance,
            HoldFord,
        ],
        ForPlotting => &[
            OnGoing,
            WaitingParts,
            HoldCustomer,
            HoldWarranty,
            HoldInsurance,
            HoldFord,
        ],
        QualityInspection => &[ForRelease, OnGoing],
        HoldCustomer | HoldWarranty | HoldInsurance | HoldFord => {
            &[OnGoing, ForPlotting, WaitingParts]
        }
        Sublet => &[OnGoing, QualityInspection, ForPlotting],
        ForRelease => &[Complete, FinishedUnclaimed, OnGoing],
        FinishedUnclaimed => &[Complete, OnGoing],
        Complete => &[],
        Unassigned => &[OnGoing, ForPlotting, WaitingParts],
    }
}

pub fn can_transition(from: JobOrderStatus, to: JobOrderStatus) -> bool {
    from == to || allowed_targets(from).contains(&to)
}

pub fn check_transition(from: JobOrderStatus, to: JobOrderStatus) -> Result<(), ServiceError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "{} cannot move to {}",
            from, to
        )))
    }
}

/// Reassignment puts a job back on the board as OG. Everything that is not
/// closed can be reassigned.
pub fn check_reassignable(from: JobOrderStatus) -> Result<(), ServiceError> {
    if from.is_terminal() {
        return Err(ServiceError::InvalidTransition(format!(
            "{} job cannot be reassigned; use redo first",
            from
        )));
    }
    Ok(())
}

/// QI entry guard: all labour finished and every part on hand.
pub fn qi_readiness(tasks: &[JobTask], parts: &[JobPart]) -> Result<(), ServiceError> {
    let unfinished = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Finished)
        .count();
    let missing = parts
        .iter()
        .filter(|p| p.availability != PartAvailability::Available)
        .count();

    if unfinished == 0 && missing == 0 {
        return Ok(());
    }
    Err(ServiceError::PreconditionNotMet(format!(
        "{} task(s) unfinished, {} part(s) unavailable",
        unfinished, missing
    )))
}

/// Status a job should move to after its parts list changed, if any.
///
/// An unavailable part pulls an active job into WP; once nothing is missing
/// a WP job waits in FP for a controller to replot it.
pub fn status_after_parts_change(
    current: JobOrderStatus,
    parts: &[JobPart],
) -> Option<JobOrderStatus> {
    let any_missing = parts
        .iter()
        .any(|p| p.availability == PartAvailability::Unavailable);

    match current {
        WaitingParts if !any_missing => Some(ForPlotting),
        OnGoing | ForPlotting | Unassigned | Sublet if any_missing => Some(WaitingParts),
        s if HOLDS.contains(&s) && any_missing => Some(WaitingParts),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn task(status: TaskStatus) -> JobTask {
        JobTask {
            description: "Brake pads".into(),
            status,
        }
    }

    fn part(availability: PartAvailability) -> JobPart {
        JobPart {
            name: "Pad set".into(),
            availability,
        }
    }

    #[rstest]
    #[case(OnGoing, QualityInspection, true)]
    #[case(QualityInspection, ForRelease, true)]
    #[case(ForRelease, Complete, true)]
    #[case(WaitingParts, ForPlotting, true)]
    #[case(HoldWarranty, OnGoing, true)]
    #[case(Complete, OnGoing, false)]
    #[case(OnGoing, Complete, false)]
    #[case(ForPlotting, QualityInspection, false)]
    #[case(QualityInspection, Complete, false)]
    fn transition_table(
        #[case] from: JobOrderStatus,
        #[case] to: JobOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(can_transition(from, to), allowed);
        assert_eq!(check_transition(from, to).is_ok(), allowed);
    }

    #[test]
    fn every_open_status_can_return_to_og() {
        for status in [
            WaitingParts,
            ForPlotting,
            QualityInspection,
            HoldCustomer,
            HoldFord,
            Sublet,
            ForRelease,
            FinishedUnclaimed,
            Unassigned,
        ] {
            assert!(can_transition(status, OnGoing), "{} -> OG", status);
        }
        assert!(allowed_targets(Complete).is_empty());
    }

    #[test]
    fn qi_needs_finished_tasks_and_available_parts() {
        assert!(qi_readiness(&[task(TaskStatus::Finished)], &[]).is_ok());

        let err = qi_readiness(
            &[task(TaskStatus::Finished), task(TaskStatus::Unfinished)],
            &[part(PartAvailability::Unavailable)],
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::PreconditionNotMet(ref m) if m.contains("1 task(s)")));
    }

    #[test]
    fn parts_drive_wp_and_fp() {
        let missing = [part(PartAvailability::Unavailable)];
        let ready = [part(PartAvailability::Available)];

        assert_eq!(status_after_parts_change(OnGoing, &missing), Some(WaitingParts));
        assert_eq!(status_after_parts_change(HoldCustomer, &missing), Some(WaitingParts));
        assert_eq!(status_after_parts_change(WaitingParts, &ready), Some(ForPlotting));
        assert_eq!(status_after_parts_change(WaitingParts, &missing), None);
        assert_eq!(status_after_parts_change(QualityInspection, &missing), None);
        assert_eq!(status_after_parts_change(OnGoing, &ready), None);
    }
}
