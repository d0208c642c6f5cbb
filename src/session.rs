use nalgebra::{RealField, Scalar};
use num_traits::Float;
use tracing::{debug, info, warn};

use crate::{
    AlignmentTransform, Label, PickEvent, RecordId,
    collector::{CorrespondenceCollector, IgnoredPick, PickOutcome},
    error::AlignmentError,
    notify::{Notifier, ScaleNotification},
    solver,
    store::{AlignmentRecord, RecordStore},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState<T> {
    Collecting,
    Computed(AlignmentTransform<T>),
    Finalized(AlignmentTransform<T>),
}

/// One user's alignment of a scan against the floor plan of a single record.
///
/// `Collecting -> Computed -> Finalized`. Any accepted pick or a reset while
/// `Computed` drops the stale transform and goes back to `Collecting`.
/// `Finalized` is terminal and keeps the transform that was written.
#[derive(Debug, Clone)]
pub struct AlignmentSession<T: Scalar> {
    collector: CorrespondenceCollector<T>,
    record: Option<RecordId>,
    state: SessionState<T>,
}

impl<T: Scalar> Default for AlignmentSession<T> {
    fn default() -> Self {
        Self {
            collector: CorrespondenceCollector::default(),
            record: None,
            state: SessionState::Collecting,
        }
    }
}

impl<T: RealField + Float> AlignmentSession<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_record(record: RecordId) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }

    pub fn set_record(&mut self, record: RecordId) {
        self.record = Some(record);
    }

    pub fn record(&self) -> Option<&RecordId> {
        self.record.as_ref()
    }

    pub fn collector(&self) -> &CorrespondenceCollector<T> {
        &self.collector
    }

    pub fn state(&self) -> &SessionState<T> {
        &self.state
    }

    pub fn transform(&self) -> Option<&AlignmentTransform<T>> {
        match &self.state {
            SessionState::Computed(transform) | SessionState::Finalized(transform) => {
                Some(transform)
            }
            SessionState::Collecting => None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, SessionState::Finalized(_))
    }

    pub fn submit_2d_pick(&mut self, x: T, y: T) -> PickOutcome {
        if self.is_finalized() {
            return PickOutcome::Ignored(IgnoredPick::SessionClosed);
        }
        let outcome = self.collector.submit_2d_pick(x, y);
        self.discard_transform_on(outcome);
        outcome
    }

    pub fn submit_3d_pick(&mut self, x: T, y: T, z: T) -> PickOutcome {
        if self.is_finalized() {
            return PickOutcome::Ignored(IgnoredPick::SessionClosed);
        }
        let outcome = self.collector.submit_3d_pick(x, y, z);
        self.discard_transform_on(outcome);
        outcome
    }

    fn discard_transform_on(&mut self, outcome: PickOutcome) {
        if outcome.is_accepted() && matches!(self.state, SessionState::Computed(_)) {
            debug!("new pick, discarding stale transform");
            self.state = SessionState::Collecting;
        }
    }

    pub fn reset(&mut self) {
        if self.is_finalized() {
            warn!("reset ignored: session is finalized");
            return;
        }
        self.collector.reset();
        self.state = SessionState::Collecting;
        debug!("session reset");
    }

    /// Fits the similarity transform and moves to `Computed`. On error the
    /// state is left as it was.
    pub fn compute_similarity(&mut self) -> Result<AlignmentTransform<T>, AlignmentError> {
        if self.is_finalized() {
            return Err(AlignmentError::AlreadyFinalized);
        }
        let transform =
            solver::compute_similarity(self.collector.points_2d(), self.collector.points_3d())?;
        info!(
            "computed alignment from {} pairs: scale {}, rotation {}, translation ({}, {})",
            self.collector.paired_count(),
            transform.scale,
            transform.rotation,
            transform.translate_x,
            transform.translate_y
        );
        self.state = SessionState::Computed(transform);
        Ok(transform)
    }

    pub fn compute_scale_factor(&self, real_distance: T) -> Result<T, AlignmentError> {
        solver::compute_scale_factor(self.collector.points_3d(), real_distance)
    }

    /// Distance between each 2D pick and its transformed 3D partner, if a
    /// transform is current.
    pub fn residuals(&self) -> Option<Vec<(Label, T)>> {
        self.transform().map(|transform| {
            solver::residuals(
                self.collector.points_2d(),
                self.collector.points_3d(),
                transform,
            )
        })
    }
}

impl<T: RealField + Float + Into<f64>> AlignmentSession<T> {
    /// Computes the metric scale, stores it on the owning record and tells
    /// the notifier.
    pub async fn calibrate<S: RecordStore, N: Notifier>(
        &self,
        real_distance: T,
        unit: &str,
        store: &S,
        notifier: &N,
    ) -> Result<T, AlignmentError> {
        if self.is_finalized() {
            return Err(AlignmentError::AlreadyFinalized);
        }
        let scale_factor = self.compute_scale_factor(real_distance)?;
        let record_id = self
            .record
            .clone()
            .ok_or(AlignmentError::MissingTargetRecord)?;
        let scale: f64 = scale_factor.into();

        store.save_scale(&record_id, scale).await?;
        info!("scale {scale} per model unit ({unit}) stored for {record_id}");
        notifier
            .notify_scale(&ScaleNotification {
                record_id,
                scale,
                unit: unit.to_string(),
            })
            .await?;
        Ok(scale_factor)
    }

    /// Writes the computed transform to the owning record and closes the
    /// session. A failed write leaves the session `Computed` so the same
    /// call can be retried.
    pub async fn finalize<S: RecordStore>(
        &mut self,
        store: &S,
    ) -> Result<AlignmentRecord, AlignmentError> {
        let transform = match self.state {
            SessionState::Finalized(_) => return Err(AlignmentError::AlreadyFinalized),
            SessionState::Collecting => return Err(AlignmentError::MissingTransform),
            SessionState::Computed(transform) => transform,
        };
        let record_id = self
            .record
            .clone()
            .ok_or(AlignmentError::MissingTargetRecord)?;
        if !transform.is_finite() {
            return Err(AlignmentError::NonFinite);
        }
        let record = AlignmentRecord {
            record_id,
            scale: transform.scale.into(),
            rotation: transform.rotation.into(),
            translate_x: transform.translate_x.into(),
            translate_y: transform.translate_y.into(),
            scan_completed: true,
        };
        store.save_alignment(&record).await?;
        self.state = SessionState::Finalized(transform);
        info!("alignment for {} finalized", record.record_id);
        Ok(record)
    }
}

/// Result of replaying one [`PickEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Pick(PickOutcome),
    Reset,
    Computed(AlignmentTransform<f64>),
    Finalized(AlignmentRecord),
    Calibrated(f64),
}

impl AlignmentSession<f64> {
    /// Drives the session with one scripted event, the way a UI callback would.
    pub async fn apply<S: RecordStore, N: Notifier>(
        &mut self,
        event: &PickEvent,
        unit: &str,
        store: &S,
        notifier: &N,
    ) -> Result<EventOutcome, AlignmentError> {
        Ok(match *event {
            PickEvent::Pick2d { x, y } => EventOutcome::Pick(self.submit_2d_pick(x, y)),
            PickEvent::Pick3d { x, y, z } => EventOutcome::Pick(self.submit_3d_pick(x, y, z)),
            PickEvent::Reset => {
                self.reset();
                EventOutcome::Reset
            }
            PickEvent::Compute => EventOutcome::Computed(self.compute_similarity()?),
            PickEvent::Finalize => EventOutcome::Finalized(self.finalize(store).await?),
            PickEvent::Calibrate { distance } => {
                EventOutcome::Calibrated(self.calibrate(distance, unit, store, notifier).await?)
            }
        })
    }

    /// Replays a whole script. Recoverable errors are logged and the next
    /// event runs; a store or notification failure stops the replay and is
    /// returned.
    pub async fn replay<S: RecordStore, N: Notifier>(
        &mut self,
        events: &[PickEvent],
        unit: &str,
        store: &S,
        notifier: &N,
    ) -> Result<Vec<EventOutcome>, AlignmentError> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            match self.apply(event, unit, store, notifier).await {
                Ok(outcome) => {
                    debug!("{event:?}: {outcome:?}");
                    outcomes.push(outcome);
                }
                Err(error) if error.is_recoverable() => warn!("{event:?} failed: {error}"),
                Err(error) => return Err(error),
            }
        }
        Ok(outcomes)
    }
}
