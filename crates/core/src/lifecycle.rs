//! Status transitions of a tracked study.
//!
//! Legal transitions:
//! - `Pendiente -> Completado` sets the completion date
//! - `Pendiente -> Leído` changes the status only
//! - `Pendiente -> Cancelado` sets the completion date and requires a reason
//! - `Completado | Leído | Cancelado -> Pendiente` reopens the study, clearing the completion
//!   date and the reason
//!
//! Everything else is rejected.

use crate::study::{CancellationReason, StudyStatus, TrackedStudy};
use crate::{StudyError, StudyResult};
use chrono::{DateTime, Utc};

/// Whether `from -> to` is one of the enumerated transitions.
pub fn is_legal(from: StudyStatus, to: StudyStatus) -> bool {
    use StudyStatus::*;
    matches!(
        (from, to),
        (Pendiente, Completado | Leido | Cancelado) | (Completado | Leido | Cancelado, Pendiente)
    )
}

/// Applies a transition to `study` in place.
///
/// # Errors
///
/// - [`StudyError::IllegalTransition`] for transitions not listed above
/// - [`StudyError::MissingCancellationReason`] when cancelling without a reason
/// - [`StudyError::InvalidInput`] when a reason is supplied for any target other than
///   `Cancelado`
///
/// On error `study` is left unchanged.
pub fn apply_transition(
    study: &mut TrackedStudy,
    target: StudyStatus,
    reason: Option<CancellationReason>,
    now: DateTime<Utc>,
) -> StudyResult<()> {
    if !is_legal(study.status, target) {
        return Err(StudyError::IllegalTransition {
            from: study.status,
            to: target,
        });
    }
    if reason.is_some() && target != StudyStatus::Cancelado {
        return Err(StudyError::InvalidInput(format!(
            "a cancellation reason only applies to Cancelado, not {target}"
        )));
    }

    match target {
        StudyStatus::Completado => {
            study.completion_date = Some(now);
            study.cancellation_reason = None;
        }
        StudyStatus::Leido => {
            study.cancellation_reason = None;
        }
        StudyStatus::Cancelado => {
            let reason = reason.ok_or(StudyError::MissingCancellationReason)?;
            study.completion_date = Some(now);
            study.cancellation_reason = Some(reason);
        }
        StudyStatus::Pendiente => {
            study.completion_date = None;
            study.cancellation_reason = None;
        }
    }
    study.status = target;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::tests::{at, study};
    use StudyStatus::*;

    #[test]
    fn only_enumerated_transitions_are_legal() {
        let legal = [
            (Pendiente, Completado),
            (Pendiente, Leido),
            (Pendiente, Cancelado),
            (Completado, Pendiente),
            (Leido, Pendiente),
            (Cancelado, Pendiente),
        ];
        for from in StudyStatus::ALL {
            for to in StudyStatus::ALL {
                assert_eq!(
                    is_legal(from, to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn completing_sets_completion_date() {
        let mut s = study(Pendiente, "URG", "RX DE TORAX");
        apply_transition(&mut s, Completado, None, at(3, 9)).unwrap();
        assert_eq!(s.status, Completado);
        assert_eq!(s.completion_date, Some(at(3, 9)));
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn reading_changes_status_only() {
        let mut s = study(Pendiente, "URG", "RX DE TORAX");
        apply_transition(&mut s, Leido, None, at(3, 9)).unwrap();
        assert_eq!(s.status, Leido);
        assert!(s.completion_date.is_none());
    }

    #[test]
    fn cancelling_requires_reason() {
        let mut s = study(Pendiente, "URG", "RX DE TORAX");
        let before = s.clone();
        assert!(matches!(
            apply_transition(&mut s, Cancelado, None, at(3, 9)),
            Err(StudyError::MissingCancellationReason)
        ));
        assert_eq!(s, before);

        apply_transition(
            &mut s,
            Cancelado,
            Some(CancellationReason::CreatininaElevada),
            at(3, 9),
        )
        .unwrap();
        assert_eq!(s.completion_date, Some(at(3, 9)));
        assert_eq!(
            s.cancellation_reason,
            Some(CancellationReason::CreatininaElevada)
        );
    }

    #[test]
    fn reopening_clears_completion_and_reason() {
        for from in [Completado, Leido, Cancelado] {
            let mut s = study(from, "URG", "RX DE TORAX");
            apply_transition(&mut s, Pendiente, None, at(4, 9)).unwrap();
            assert_eq!(s.status, Pendiente);
            assert!(s.completion_date.is_none());
            assert!(s.cancellation_reason.is_none());
            assert!(s.check_invariants().is_ok());
        }
    }

    #[test]
    fn terminal_states_do_not_move_sideways() {
        let mut s = study(Completado, "URG", "RX DE TORAX");
        assert!(matches!(
            apply_transition(&mut s, Cancelado, Some(CancellationReason::SinAyuno), at(4, 9)),
            Err(StudyError::IllegalTransition {
                from: Completado,
                to: Cancelado
            })
        ));
        let mut s = study(Pendiente, "URG", "RX DE TORAX");
        assert!(matches!(
            apply_transition(&mut s, Pendiente, None, at(4, 9)),
            Err(StudyError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn reason_on_other_targets_is_rejected() {
        let mut s = study(Pendiente, "URG", "RX DE TORAX");
        assert!(matches!(
            apply_transition(&mut s, Completado, Some(CancellationReason::SinAyuno), at(4, 9)),
            Err(StudyError::InvalidInput(_))
        ));
        assert_eq!(s.status, Pendiente);
    }
}
