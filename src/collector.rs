use nalgebra::{RealField, Scalar};
use num_traits::Float;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{Label, LabeledPoint2, LabeledPoint3};

/// Why a pick was dropped without touching the collected points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IgnoredPick {
    #[error("a 3D pick is still pending")]
    AwaitingThirdDimension,
    #[error("no 2D pick is waiting for its 3D counterpart")]
    NoPendingLabel,
    #[error("all point labels are used")]
    LabelsExhausted,
    #[error("coordinate is not finite")]
    NonFiniteCoordinate,
    #[error("session is closed")]
    SessionClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    Accepted(Label),
    Ignored(IgnoredPick),
}

impl PickOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PickOutcome::Accepted(_))
    }
}

/// Pairs 2D floor-plan picks with 3D scan picks, one label at a time.
///
/// Picks strictly alternate: a 2D pick opens the active label, the next 3D
/// pick closes it and advances to the following letter. Out-of-order picks
/// are ignored, so `points_3d.len() <= points_2d.len() <= points_3d.len() + 1`
/// holds after every call.
#[derive(Debug, Clone)]
pub struct CorrespondenceCollector<T: Scalar> {
    points_2d: Vec<LabeledPoint2<T>>,
    points_3d: Vec<LabeledPoint3<T>>,
    active_label: Option<Label>,
    awaiting_3d: bool,
}

impl<T: Scalar> Default for CorrespondenceCollector<T> {
    fn default() -> Self {
        Self {
            points_2d: Vec::new(),
            points_3d: Vec::new(),
            active_label: Some(Label::FIRST),
            awaiting_3d: false,
        }
    }
}

impl<T: RealField + Float> CorrespondenceCollector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_2d_pick(&mut self, x: T, y: T) -> PickOutcome {
        if self.awaiting_3d {
            return self.ignore(IgnoredPick::AwaitingThirdDimension);
        }
        let Some(label) = self.active_label else {
            return self.ignore(IgnoredPick::LabelsExhausted);
        };
        if !(Float::is_finite(x) && Float::is_finite(y)) {
            return self.ignore(IgnoredPick::NonFiniteCoordinate);
        }
        self.points_2d.push(LabeledPoint2::new(label, x, y));
        self.awaiting_3d = true;
        debug!("2D pick {label} at ({x}, {y})");
        PickOutcome::Accepted(label)
    }

    pub fn submit_3d_pick(&mut self, x: T, y: T, z: T) -> PickOutcome {
        if !self.awaiting_3d {
            return self.ignore(IgnoredPick::NoPendingLabel);
        }
        let Some(label) = self.active_label else {
            return self.ignore(IgnoredPick::NoPendingLabel);
        };
        if !(Float::is_finite(x) && Float::is_finite(y) && Float::is_finite(z)) {
            return self.ignore(IgnoredPick::NonFiniteCoordinate);
        }
        self.points_3d.push(LabeledPoint3::new(label, x, y, z));
        self.awaiting_3d = false;
        self.active_label = label.next();
        debug!("3D pick {label} at ({x}, {y}, {z})");
        PickOutcome::Accepted(label)
    }

    fn ignore(&self, reason: IgnoredPick) -> PickOutcome {
        warn!(
            "ignoring pick for label {:?}: {reason}",
            self.active_label.map(|label| label.as_char())
        );
        PickOutcome::Ignored(reason)
    }
}

impl<T: Scalar> CorrespondenceCollector<T> {
    pub fn reset(&mut self) {
        self.points_2d.clear();
        self.points_3d.clear();
        self.active_label = Some(Label::FIRST);
        self.awaiting_3d = false;
    }

    /// Number of fully committed pairs.
    pub fn paired_count(&self) -> usize {
        self.points_2d.len().min(self.points_3d.len())
    }

    pub fn points_2d(&self) -> &[LabeledPoint2<T>] {
        &self.points_2d
    }

    pub fn points_3d(&self) -> &[LabeledPoint3<T>] {
        &self.points_3d
    }

    pub fn active_label(&self) -> Option<Label> {
        self.active_label
    }

    pub fn is_awaiting_3d(&self) -> bool {
        self.awaiting_3d
    }

    /// Label whose 3D pick is outstanding.
    pub fn pending_label(&self) -> Option<Label> {
        self.active_label.filter(|_| self.awaiting_3d)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&LabeledPoint2<T>, &LabeledPoint3<T>)> {
        self.points_2d.iter().zip(self.points_3d.iter())
    }
}
