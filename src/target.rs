use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::accumulator::PointAccumulator;
use crate::error::Error;
use crate::queue::TemporalIdQueue;
use crate::readiness::{MapValidity, ReadinessGate};
use crate::stats::TargetStats;
use crate::temporal::Temporal;
use crate::vars::{Contribution, VarsBlock};

/// What the post-interpolation callback wants done with the temporal id it
/// was just handed. `CleanUp` is the production path: retire the id and
/// advance. `Retain` freezes the target instance with the accumulated state
/// intact, for diagnostic drivers that want to inspect it afterward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    CleanUp,
    Retain,
}

/// Computes the coordinates of the target points for a temporal id. The
/// coordinates themselves are opaque to the protocol; they are forwarded to
/// the interpolator through the [`PointSink`].
pub trait PointsProvider<T> {
    /// A sequential provider admits one temporal id in flight at a time:
    /// points for the next id are not requested until the current id's
    /// cleanup has finished. A non-sequential provider lets every ready
    /// pending id start immediately.
    fn is_sequential(&self) -> bool {
        true
    }

    fn compute_points(&mut self, temporal_id: &T) -> Vec<[f64; 3]>;
}

/// Receives the dense interpolated buffer once a temporal id is complete.
pub trait PostInterpolationCallback<T> {
    fn apply(&mut self, vars: &VarsBlock, temporal_id: &T) -> Disposition;
}

/// Tells the interpolator that every target interested in a temporal id has
/// consumed its volume data.
pub trait CleanupNotifier<T> {
    fn notify_cleanup(&mut self, temporal_id: &T);
}

/// Delivers computed target points to the interpolator.
pub trait PointSink<T> {
    fn send_points(&mut self, temporal_id: &T, points: &[[f64; 3]]);
}

/// Subscription interface for map-validity events, keyed by map name. A
/// target subscribes when a point request is deferred on stale coverage and
/// unsubscribes once nothing is waiting.
pub trait MapUpdateNotifier {
    fn subscribe(&mut self, map: &str);
    fn unsubscribe(&mut self, map: &str);
}

/// Fixed per-target configuration, constructed once and handed to the state
/// machine. Polymorphism over different physics targets lives in the
/// collaborator traits, not here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub num_points: usize,
    pub num_fields: usize,
    /// Names of the time-dependent maps point computation needs. Empty for
    /// targets in static frames.
    pub required_maps: Vec<String>,
    /// Value written densely at offsets marked invalid, so the callback
    /// sees a fully populated buffer.
    pub invalid_fill: f64,
}

/// Snapshot of a target's completion bookkeeping, the one piece of state
/// the protocol persists across runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionLog<T> {
    pub target: String,
    pub completed: Vec<T>,
    pub stats: TargetStats,
}

/// The per-target state machine. Accepts scheduling, contribution, and
/// map-update messages in delivery order; decides when a temporal id is
/// complete; invokes the post-interpolation callback; retires the id and
/// advances to the next pending one, gated on map readiness.
///
/// One instance processes one message to completion at a time. Anything
/// asynchronous about the protocol lives in the producers and the message
/// layer, never inside this struct.
pub struct InterpolationTarget<T: Temporal> {
    config: TargetConfig,
    queue: TemporalIdQueue<T>,
    acc: PointAccumulator<T>,
    gate: ReadinessGate<T>,
    provider: Box<dyn PointsProvider<T> + Send>,
    callback: Box<dyn PostInterpolationCallback<T> + Send>,
    sink: Box<dyn PointSink<T> + Send>,
    cleanup: Box<dyn CleanupNotifier<T> + Send>,
    maps: Box<dyn MapUpdateNotifier + Send>,
    stats: TargetStats,
    frozen: bool,
}

impl<T: Temporal> InterpolationTarget<T> {
    pub fn new(
        config: TargetConfig,
        initial_validity: MapValidity,
        provider: Box<dyn PointsProvider<T> + Send>,
        callback: Box<dyn PostInterpolationCallback<T> + Send>,
        sink: Box<dyn PointSink<T> + Send>,
        cleanup: Box<dyn CleanupNotifier<T> + Send>,
        maps: Box<dyn MapUpdateNotifier + Send>,
    ) -> Self {
        let acc = PointAccumulator::new(config.num_points, config.num_fields);
        let gate = ReadinessGate::new(config.required_maps.clone(), initial_validity);
        Self {
            config,
            queue: TemporalIdQueue::new(),
            acc,
            gate,
            provider,
            callback,
            sink,
            cleanup,
            maps,
            stats: TargetStats::default(),
            frozen: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn stats(&self) -> &TargetStats {
        &self.stats
    }

    pub fn queue(&self) -> &TemporalIdQueue<T> {
        &self.queue
    }

    pub fn accumulator(&self) -> &PointAccumulator<T> {
        &self.acc
    }

    /// A frozen instance has had its callback decline cleanup. It keeps its
    /// accumulated state and ignores every further message.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn completion_log(&self) -> CompletionLog<T> {
        CompletionLog {
            target: self.config.name.clone(),
            completed: self.queue.completed().iter().copied().collect(),
            stats: self.stats.clone(),
        }
    }

    /// Schedule interpolation at the given temporal ids. Ids already known
    /// are dropped. Newly pending ids start immediately when the map gate
    /// allows, subject to the provider's sequential constraint.
    pub fn add_temporal_ids(&mut self, ids: Vec<T>) {
        if self.frozen {
            warn!("{}: frozen, dropping temporal ids", self.config.name);
            return;
        }
        for id in ids {
            if self.queue.push_pending(id) {
                debug!("{}: scheduled {:?}", self.config.name, id);
            } else {
                debug!("{}: duplicate temporal id {:?}", self.config.name, id);
            }
        }
        self.verify_and_send();
    }

    /// Pre-mark unfillable offsets for an in-flight temporal id. Counts
    /// toward completion; the configured fill value becomes visible to the
    /// callback at those offsets.
    pub fn mark_invalid(&mut self, id: &T, offsets: &[usize]) -> Result<(), Error> {
        if self.frozen {
            warn!("{}: frozen, dropping invalid marks", self.config.name);
            return Ok(());
        }
        if !self.queue.is_in_progress(id) {
            return Err(Error::UnknownTemporalId(format!("{:?}", id)));
        }
        let fill = self.config.invalid_fill;
        self.acc.mark_invalid(id, offsets, fill)?;
        self.maybe_complete(id)
    }

    /// Accept a batch of producer contributions for an in-flight temporal
    /// id. Receiving for an id this target was never asked about is a
    /// protocol desynchronization and fatal; duplicate offsets inside an
    /// in-flight id are absorbed silently.
    pub fn receive_vars(&mut self, id: &T, contributions: &[Contribution]) -> Result<(), Error> {
        if self.frozen {
            warn!("{}: frozen, dropping contributions", self.config.name);
            return Ok(());
        }
        if !self.queue.is_in_progress(id) {
            return Err(Error::UnknownTemporalId(format!("{:?}", id)));
        }
        for contribution in contributions {
            let before = self.acc.filled_count(id);
            self.acc.receive(id, contribution)?;
            let gained = self.acc.filled_count(id) - before;
            self.stats.points_filled += gained;
            self.stats.offsets_skipped += contribution.len() - gained;
        }
        self.maybe_complete(id)
    }

    /// Feed a map-validity extension through the gate. If a deferred id
    /// became ready this wakes the verify-and-send path; otherwise the
    /// target stays suspended until the next update.
    pub fn map_updated(&mut self, name: &str, valid_until: f64) {
        if self.frozen {
            return;
        }
        let ready = self.gate.update(name, valid_until);
        if ready.is_empty() {
            return;
        }
        debug!(
            "{}: map {} now covers {} deferred id(s)",
            self.config.name,
            name,
            ready.len()
        );
        if !self.gate.has_deferred() {
            let maps: Vec<String> = self.gate.required_maps().to_vec();
            for map in &maps {
                self.maps.unsubscribe(map);
            }
        }
        self.verify_and_send();
    }

    fn maybe_complete(&mut self, id: &T) -> Result<(), Error> {
        if !self.acc.is_complete(id) {
            return Ok(());
        }
        info!(
            "{}: interpolation complete for {:?} ({})",
            self.config.name, id, self.stats
        );
        self.stats.completions += 1;
        let disposition = {
            let vars = self.acc.buffer(id).expect("complete id has a buffer");
            self.callback.apply(vars, id)
        };
        match disposition {
            Disposition::Retain => {
                info!(
                    "{}: callback retained {:?}; instance is now frozen",
                    self.config.name, id
                );
                self.frozen = true;
                Ok(())
            }
            Disposition::CleanUp => {
                self.acc.purge(id);
                self.queue.complete(id)?;
                self.cleanup.notify_cleanup(id);
                self.verify_and_send();
                Ok(())
            }
        }
    }

    /// Walk the pending sequence and start every id the gate and the
    /// provider's sequential constraint allow. Ids blocked on stale maps
    /// are deferred with a subscription; that is the normal suspended
    /// state, not an error.
    fn verify_and_send(&mut self) {
        let sequential = self.provider.is_sequential();
        let mut index = 0;
        while index < self.queue.pending().len() {
            if sequential && !self.queue.in_progress().is_empty() {
                break;
            }
            let id = self.queue.pending()[index];
            if self.gate.is_ready(id.time()) {
                let id = self.queue.begin(&id).expect("id taken from the pending queue");
                self.begin(id);
            } else {
                let stale = self.gate.stale_maps(id.time());
                debug!(
                    "{}: deferring {:?} on stale map(s) {:?}",
                    self.config.name, id, stale
                );
                self.gate.defer(id);
                for map in &stale {
                    self.maps.subscribe(map);
                }
                self.stats.deferrals += 1;
                if sequential {
                    break;
                }
                index += 1;
            }
        }
    }

    fn begin(&mut self, id: T) {
        debug!("{}: requesting points for {:?}", self.config.name, id);
        self.acc.begin(id);
        let points = self.provider.compute_points(&id);
        self.sink.send_points(&id, &points);
        self.stats.point_requests += 1;
    }
}
