use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::interpolator::{ElementId, Interpolator};
use crate::pool::WorkerPool;
use crate::readiness::MapValidity;
use crate::target::{
    CleanupNotifier, InterpolationTarget, MapUpdateNotifier, PointSink, PointsProvider,
    PostInterpolationCallback, TargetConfig,
};
use crate::temporal::Temporal;
use crate::vars::Contribution;

/// Destination of a protocol message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Target(String),
    Interpolator,
    Exchange,
}

/// The messages the protocol instances exchange. Producers and the
/// surrounding simulation feed the first group to targets and the second to
/// the interpolator; the third group is control traffic handled by the
/// exchange itself (map subscriptions and validity extensions).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Message<T> {
    AddTemporalIds(Vec<T>),
    ReceiveVars {
        temporal_id: T,
        contributions: Vec<Contribution>,
    },
    MarkInvalid {
        temporal_id: T,
        offsets: Vec<usize>,
    },
    MapUpdated {
        name: String,
        valid_until: f64,
    },
    RegisterElement(ElementId),
    VolumeData {
        element: ElementId,
        temporal_id: T,
        data: Contribution,
    },
    RequestPoints {
        target: String,
        temporal_id: T,
        points: Vec<[f64; 3]>,
    },
    Cleanup {
        target: String,
        temporal_id: T,
    },
    Subscribe {
        map: String,
        target: String,
    },
    Unsubscribe {
        map: String,
        target: String,
    },
    ExtendMap {
        name: String,
        valid_until: f64,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub to: Address,
    pub msg: Message<T>,
}

/// Where an instance's outgoing messages go: looped back into the local
/// exchange's own inbox, or routed across the shard workers of a parallel
/// exchange.
#[derive(Clone)]
pub enum Outbound<T> {
    Local(Sender<Envelope<T>>),
    Routed(Router<T>),
}

impl<T: Temporal> Outbound<T> {
    pub fn post(&self, envelope: Envelope<T>) {
        match self {
            Outbound::Local(sender) => sender.send(envelope).unwrap(),
            Outbound::Routed(router) => router.post(envelope),
        }
    }
}

struct ChannelSink<T> {
    target: String,
    outbound: Outbound<T>,
}

impl<T: Temporal> PointSink<T> for ChannelSink<T> {
    fn send_points(&mut self, temporal_id: &T, points: &[[f64; 3]]) {
        self.outbound.post(Envelope {
            to: Address::Interpolator,
            msg: Message::RequestPoints {
                target: self.target.clone(),
                temporal_id: *temporal_id,
                points: points.to_vec(),
            },
        })
    }
}

struct ChannelCleanup<T> {
    target: String,
    outbound: Outbound<T>,
}

impl<T: Temporal> CleanupNotifier<T> for ChannelCleanup<T> {
    fn notify_cleanup(&mut self, temporal_id: &T) {
        self.outbound.post(Envelope {
            to: Address::Interpolator,
            msg: Message::Cleanup {
                target: self.target.clone(),
                temporal_id: *temporal_id,
            },
        })
    }
}

struct ChannelMaps<T> {
    target: String,
    outbound: Outbound<T>,
}

impl<T: Temporal> MapUpdateNotifier for ChannelMaps<T> {
    fn subscribe(&mut self, map: &str) {
        self.outbound.post(Envelope {
            to: Address::Exchange,
            msg: Message::Subscribe {
                map: map.to_string(),
                target: self.target.clone(),
            },
        })
    }

    fn unsubscribe(&mut self, map: &str) {
        self.outbound.post(Envelope {
            to: Address::Exchange,
            msg: Message::Unsubscribe {
                map: map.to_string(),
                target: self.target.clone(),
            },
        })
    }
}

/// The cooperative message pump. Owns the protocol instances, delivers one
/// message at a time to each, and carries the map-subscription table and
/// the master map-validity view. Messages addressed to a target that has
/// not been added yet are held back and delivered when it appears, the way
/// an in-flight message for an unseen peer is boxed rather than dropped.
pub struct Exchange<T: Temporal> {
    outbound: Outbound<T>,
    inbox: Option<Receiver<Envelope<T>>>,
    targets: HashMap<String, InterpolationTarget<T>>,
    interpolator: Option<Interpolator<T>>,
    listeners: HashMap<String, HashSet<String>>,
    validity: MapValidity,
    undelivered: Vec<Envelope<T>>,
}

impl<T: Temporal + Send + 'static> Exchange<T> {
    /// A self-contained exchange: messages posted by instances loop back
    /// into its own inbox, drained by `pump`.
    pub fn new(interpolator: Interpolator<T>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            outbound: Outbound::Local(tx),
            inbox: Some(rx),
            targets: HashMap::new(),
            interpolator: Some(interpolator),
            listeners: HashMap::new(),
            validity: MapValidity::new(),
            undelivered: Vec::new(),
        }
    }

    /// One shard of a parallel exchange: outgoing messages go through the
    /// router, and only shard zero carries the interpolator.
    fn shard(interpolator: Option<Interpolator<T>>, router: Router<T>) -> Self {
        Self {
            outbound: Outbound::Routed(router),
            inbox: None,
            targets: HashMap::new(),
            interpolator,
            listeners: HashMap::new(),
            validity: MapValidity::new(),
            undelivered: Vec::new(),
        }
    }

    /// A sender feeding this exchange's inbox, for producers, the relay,
    /// and the driving simulation loop.
    pub fn sender(&self) -> Sender<Envelope<T>> {
        match &self.outbound {
            Outbound::Local(sender) => sender.clone(),
            Outbound::Routed(_) => panic!("a routed shard has no local inbox"),
        }
    }

    pub fn post(&self, to: Address, msg: Message<T>) {
        self.outbound.post(Envelope { to, msg })
    }

    pub fn target(&self, name: &str) -> Option<&InterpolationTarget<T>> {
        self.targets.get(name)
    }

    pub fn interpolator(&self) -> Option<&Interpolator<T>> {
        self.interpolator.as_ref()
    }

    /// Bring a target instance online, wiring its collaborators to this
    /// exchange, and deliver any messages that arrived for it early. The
    /// target's initial map-validity view is a snapshot of the master
    /// table; later extensions reach it through its subscriptions.
    pub fn add_target(
        &mut self,
        config: TargetConfig,
        provider: Box<dyn PointsProvider<T> + Send>,
        callback: Box<dyn PostInterpolationCallback<T> + Send>,
    ) -> Result<(), Error> {
        let name = config.name.clone();
        let target = InterpolationTarget::new(
            config,
            self.validity.clone(),
            provider,
            callback,
            Box::new(ChannelSink {
                target: name.clone(),
                outbound: self.outbound.clone(),
            }),
            Box::new(ChannelCleanup {
                target: name.clone(),
                outbound: self.outbound.clone(),
            }),
            Box::new(ChannelMaps {
                target: name.clone(),
                outbound: self.outbound.clone(),
            }),
        );
        info!("exchange: target {} online", name);
        self.targets.insert(name.clone(), target);

        let held: Vec<Envelope<T>> = self.undelivered.drain(..).collect();
        let (backlog, rest): (Vec<_>, Vec<_>) = held
            .into_iter()
            .partition(|envelope| envelope.to == Address::Target(name.clone()));
        self.undelivered = rest;
        for envelope in backlog {
            self.handle(envelope)?;
        }
        Ok(())
    }

    /// Process messages in delivery order until the inbox is empty. A
    /// fatal protocol error propagates and the exchange must not be pumped
    /// again after one.
    pub fn pump(&mut self) -> Result<(), Error> {
        let inbox = match &self.inbox {
            Some(inbox) => inbox.clone(),
            None => return Ok(()),
        };
        while let Ok(envelope) = inbox.try_recv() {
            self.handle(envelope)?;
        }
        Ok(())
    }

    /// Deliver one envelope to its instance.
    pub fn handle(&mut self, envelope: Envelope<T>) -> Result<(), Error> {
        match &envelope.to {
            Address::Target(name) => {
                if self.targets.contains_key(name) {
                    let name = name.clone();
                    self.deliver_target(&name, envelope.msg)
                } else {
                    debug!("exchange: holding message for unknown target {}", name);
                    self.undelivered.push(envelope);
                    Ok(())
                }
            }
            Address::Interpolator => self.deliver_interpolator(envelope.msg),
            Address::Exchange => self.deliver_control(envelope.msg),
        }
    }

    fn deliver_target(&mut self, name: &str, msg: Message<T>) -> Result<(), Error> {
        let target = self.targets.get_mut(name).unwrap();
        match msg {
            Message::AddTemporalIds(ids) => {
                target.add_temporal_ids(ids);
                Ok(())
            }
            Message::ReceiveVars {
                temporal_id,
                contributions,
            } => target.receive_vars(&temporal_id, &contributions),
            Message::MarkInvalid {
                temporal_id,
                offsets,
            } => target.mark_invalid(&temporal_id, &offsets),
            Message::MapUpdated { name, valid_until } => {
                target.map_updated(&name, valid_until);
                Ok(())
            }
            other => {
                warn!("exchange: message misrouted to target {}: {:?}", name, other);
                Ok(())
            }
        }
    }

    fn deliver_interpolator(&mut self, msg: Message<T>) -> Result<(), Error> {
        let interpolator = match self.interpolator.as_mut() {
            Some(interpolator) => interpolator,
            None => {
                warn!("exchange: interpolator message on a shard without one");
                return Ok(());
            }
        };
        match msg {
            Message::RegisterElement(element) => interpolator.register_element(element),
            Message::VolumeData {
                element,
                temporal_id,
                data,
            } => {
                for (target, id, contribution) in interpolator.store(element, temporal_id, data) {
                    self.outbound.post(Envelope {
                        to: Address::Target(target),
                        msg: Message::ReceiveVars {
                            temporal_id: id,
                            contributions: vec![contribution],
                        },
                    });
                }
            }
            Message::RequestPoints {
                target,
                temporal_id,
                points,
            } => {
                if let Some(contribution) =
                    interpolator.request_points(&target, temporal_id, &points)
                {
                    self.outbound.post(Envelope {
                        to: Address::Target(target),
                        msg: Message::ReceiveVars {
                            temporal_id,
                            contributions: vec![contribution],
                        },
                    });
                }
            }
            Message::Cleanup {
                target,
                temporal_id,
            } => {
                interpolator.cleanup(&target, &temporal_id);
            }
            other => warn!("exchange: message misrouted to interpolator: {:?}", other),
        }
        Ok(())
    }

    fn deliver_control(&mut self, msg: Message<T>) -> Result<(), Error> {
        match msg {
            Message::Subscribe { map, target } => {
                self.listeners
                    .entry(map.clone())
                    .or_insert_with(HashSet::new)
                    .insert(target.clone());
                // A subscriber may have missed earlier extensions; catch it
                // up with the expiration currently on record.
                if let Some(valid_until) = self.validity.expiration(&map) {
                    self.outbound.post(Envelope {
                        to: Address::Target(target),
                        msg: Message::MapUpdated {
                            name: map,
                            valid_until,
                        },
                    });
                }
            }
            Message::Unsubscribe { map, target } => {
                if let Some(set) = self.listeners.get_mut(&map) {
                    set.remove(&target);
                }
            }
            Message::ExtendMap { name, valid_until } => {
                self.validity.extend(&name, valid_until);
                if let Some(set) = self.listeners.get(&name) {
                    for target in set {
                        self.outbound.post(Envelope {
                            to: Address::Target(target.clone()),
                            msg: Message::MapUpdated {
                                name: name.clone(),
                                valid_until,
                            },
                        });
                    }
                }
            }
            other => warn!("exchange: unexpected control message: {:?}", other),
        }
        Ok(())
    }
}

/// Routes envelopes to the shard worker owning the destination instance.
/// Targets hash to a shard; the interpolator and the control state live on
/// shard zero.
#[derive(Clone)]
pub struct Router<T> {
    senders: Vec<Sender<Directive<T>>>,
}

impl<T: Temporal> Router<T> {
    fn shard_of(&self, to: &Address) -> usize {
        match to {
            Address::Interpolator | Address::Exchange => 0,
            Address::Target(name) => {
                let mut hasher = DefaultHasher::new();
                name.hash(&mut hasher);
                (hasher.finish() as usize) % self.senders.len()
            }
        }
    }

    pub fn post(&self, envelope: Envelope<T>) {
        let shard = self.shard_of(&envelope.to);
        self.senders[shard]
            .send(Directive::Deliver(envelope))
            .unwrap()
    }
}

enum Directive<T> {
    Deliver(Envelope<T>),
    AddTarget {
        config: TargetConfig,
        provider: Box<dyn PointsProvider<T> + Send>,
        callback: Box<dyn PostInterpolationCallback<T> + Send>,
    },
    Stop,
}

/// Runs the exchange across core-pinned shard workers, one inbox per
/// worker and every instance owned by exactly one shard. Instance handlers
/// stay single-threaded — per-instance serialization is structural, not
/// locked — while distinct instances execute concurrently. Quiesce the
/// protocol before calling `stop`; directives still queued when workers
/// stop are dropped.
pub struct ParallelExchange<T: Temporal + Send + 'static> {
    router: Router<T>,
    pool: Option<WorkerPool>,
    faults: Receiver<Error>,
}

impl<T: Temporal + Send + 'static> ParallelExchange<T> {
    pub fn new(interpolator: Interpolator<T>, num_shards: usize) -> Self {
        let pool = WorkerPool::new(num_shards);
        let num_shards = pool.num_threads();

        let mut senders = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..num_shards {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(rx);
        }
        let router = Router { senders };
        let (fault_tx, faults) = unbounded();
        let mut interpolator = Some(interpolator);

        for (index, inbox) in receivers.into_iter().enumerate() {
            let router = router.clone();
            let fault_tx = fault_tx.clone();
            let interp = if index == 0 { interpolator.take() } else { None };
            pool.spawn_on(index, move || {
                let mut shard = Exchange::shard(interp, router);
                for directive in inbox {
                    let outcome = match directive {
                        Directive::Deliver(envelope) => shard.handle(envelope),
                        Directive::AddTarget {
                            config,
                            provider,
                            callback,
                        } => shard.add_target(config, provider, callback),
                        Directive::Stop => break,
                    };
                    if let Err(fault) = outcome {
                        error!("shard {}: fatal protocol error: {}", index, fault);
                        let _ = fault_tx.send(fault);
                        break;
                    }
                }
            });
        }

        Self {
            router,
            pool: Some(pool),
            faults,
        }
    }

    /// Bring a target online on the shard that owns its name.
    pub fn add_target(
        &self,
        config: TargetConfig,
        provider: Box<dyn PointsProvider<T> + Send>,
        callback: Box<dyn PostInterpolationCallback<T> + Send>,
    ) {
        let shard = self.router.shard_of(&Address::Target(config.name.clone()));
        self.router.senders[shard]
            .send(Directive::AddTarget {
                config,
                provider,
                callback,
            })
            .unwrap()
    }

    pub fn post(&self, to: Address, msg: Message<T>) {
        self.router.post(Envelope { to, msg })
    }

    /// A router handle for producers on other threads.
    pub fn router(&self) -> Router<T> {
        self.router.clone()
    }

    /// Stop the shard workers, wait for them to drain, and surface the
    /// first fatal protocol error if one occurred.
    pub fn stop(mut self) -> Result<(), Error> {
        for sender in &self.router.senders {
            let _ = sender.send(Directive::Stop);
        }
        drop(self.pool.take());
        match self.faults.try_recv() {
            Ok(fault) => Err(fault),
            Err(_) => Ok(()),
        }
    }
}

// ============================================================================
#[cfg(test)]
mod test {

    use crossbeam_channel::{unbounded, Sender};
    use std::time::Duration;

    use super::{Address, Exchange, Message, ParallelExchange};
    use crate::interpolator::{ElementId, Interpolator};
    use crate::target::{Disposition, PointsProvider, PostInterpolationCallback, TargetConfig};
    use crate::temporal::Time;
    use crate::vars::{Contribution, VarsBlock};

    const FIRST: Time = Time(13.0 / 16.0);
    const SECOND: Time = Time(14.0 / 16.0);

    struct FixedPoints {
        num_points: usize,
    }

    impl PointsProvider<Time> for FixedPoints {
        fn compute_points(&mut self, _: &Time) -> Vec<[f64; 3]> {
            vec![[0.0; 3]; self.num_points]
        }
    }

    struct RecordingCallback {
        calls: Sender<(Time, Vec<f64>)>,
    }

    impl PostInterpolationCallback<Time> for RecordingCallback {
        fn apply(&mut self, vars: &VarsBlock, temporal_id: &Time) -> Disposition {
            self.calls.send((*temporal_id, vars.field(0))).unwrap();
            Disposition::CleanUp
        }
    }

    fn contribution(offsets: &[usize]) -> Contribution {
        let mut vars = VarsBlock::empty(1);
        for &offset in offsets {
            vars.push_point(&[offset as f64]);
        }
        Contribution::new(offsets.to_vec(), vars)
    }

    fn config(name: &str, num_points: usize, required_maps: Vec<String>) -> TargetConfig {
        TargetConfig {
            name: name.to_string(),
            num_points,
            num_fields: 1,
            required_maps,
            invalid_fill: 0.0,
        }
    }

    #[test]
    fn volume_data_flows_through_to_the_callback_and_cleanup() {
        let (calls_tx, calls) = unbounded();
        let mut exchange = Exchange::new(Interpolator::new(1, 1));
        exchange
            .add_target(
                config("TargetA", 10, Vec::new()),
                Box::new(FixedPoints { num_points: 10 }),
                Box::new(RecordingCallback { calls: calls_tx }),
            )
            .unwrap();

        let expected: Vec<f64> = (0..10).map(|i| i as f64).collect();

        exchange.post(Address::Interpolator, Message::RegisterElement(ElementId(0)));
        exchange.post(Address::Interpolator, Message::RegisterElement(ElementId(1)));
        exchange.post(
            Address::Target("TargetA".to_string()),
            Message::AddTemporalIds(vec![FIRST, SECOND]),
        );
        // One element reports for the first id before the other.
        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(0),
                temporal_id: FIRST,
                data: contribution(&[0, 1, 2, 3, 4]),
            },
        );
        exchange.pump().unwrap();
        assert!(calls.try_recv().is_err());

        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(1),
                temporal_id: FIRST,
                data: contribution(&[5, 6, 7, 8, 9]),
            },
        );
        exchange.pump().unwrap();

        let (id, values) = calls.try_recv().unwrap();
        assert_eq!(id, FIRST);
        assert_eq!(values, expected);

        // The first id retired its volume data, and the second id's point
        // request is already outstanding.
        let target = exchange.target("TargetA").unwrap();
        assert_eq!(target.queue().completed().front(), Some(&FIRST));
        assert!(target.queue().is_in_progress(&SECOND));
        assert!(exchange.interpolator().unwrap().cache().is_empty());

        for element in 0..2usize {
            let base = element * 5;
            exchange.post(
                Address::Interpolator,
                Message::VolumeData {
                    element: ElementId(element),
                    temporal_id: SECOND,
                    data: contribution(&[base, base + 1, base + 2, base + 3, base + 4]),
                },
            );
        }
        exchange.pump().unwrap();
        let (id, values) = calls.try_recv().unwrap();
        assert_eq!(id, SECOND);
        assert_eq!(values, expected);

        let log = exchange.target("TargetA").unwrap().completion_log();
        assert_eq!(log.completed, vec![FIRST, SECOND]);
    }

    #[test]
    fn messages_for_a_late_target_are_held_and_delivered() {
        let (calls_tx, calls) = unbounded();
        let mut exchange = Exchange::new(Interpolator::new(1, 1));

        exchange.post(
            Address::Target("TargetA".to_string()),
            Message::AddTemporalIds(vec![FIRST]),
        );
        exchange.pump().unwrap();

        exchange
            .add_target(
                config("TargetA", 2, Vec::new()),
                Box::new(FixedPoints { num_points: 2 }),
                Box::new(RecordingCallback { calls: calls_tx }),
            )
            .unwrap();
        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(0),
                temporal_id: FIRST,
                data: contribution(&[0, 1]),
            },
        );
        exchange.pump().unwrap();
        assert_eq!(calls.try_recv().unwrap().0, FIRST);
    }

    #[test]
    fn subscription_catch_up_covers_extensions_seen_before_the_deferral() {
        let (calls_tx, calls) = unbounded();
        let mut exchange = Exchange::new(Interpolator::new(1, 1));
        exchange
            .add_target(
                config("TargetA", 2, vec!["Translation".to_string()]),
                Box::new(FixedPoints { num_points: 2 }),
                Box::new(RecordingCallback { calls: calls_tx }),
            )
            .unwrap();

        // The master table learns of the map before the target ever defers;
        // the target's snapshot predates it, so its first verify defers and
        // the subscription catch-up supplies the expiration.
        exchange.post(
            Address::Exchange,
            Message::ExtendMap {
                name: "Translation".to_string(),
                valid_until: 13.5 / 16.0,
            },
        );
        exchange.post(
            Address::Target("TargetA".to_string()),
            Message::AddTemporalIds(vec![FIRST, SECOND]),
        );
        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(0),
                temporal_id: FIRST,
                data: contribution(&[0, 1]),
            },
        );
        exchange.pump().unwrap();
        assert_eq!(calls.try_recv().unwrap().0, FIRST);

        // The second id is past the known expiration: deferred until the
        // next extension arrives.
        assert!(!exchange.target("TargetA").unwrap().queue().is_in_progress(&SECOND));
        exchange.post(
            Address::Exchange,
            Message::ExtendMap {
                name: "Translation".to_string(),
                valid_until: 14.5 / 16.0,
            },
        );
        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(0),
                temporal_id: SECOND,
                data: contribution(&[0, 1]),
            },
        );
        exchange.pump().unwrap();
        assert_eq!(calls.try_recv().unwrap().0, SECOND);
    }

    #[test]
    fn unknown_temporal_id_faults_the_pump() {
        let (calls_tx, _calls) = unbounded();
        let mut exchange = Exchange::new(Interpolator::new(1, 1));
        exchange
            .add_target(
                config("TargetA", 2, Vec::new()),
                Box::new(FixedPoints { num_points: 2 }),
                Box::new(RecordingCallback { calls: calls_tx }),
            )
            .unwrap();
        exchange.post(
            Address::Target("TargetA".to_string()),
            Message::ReceiveVars {
                temporal_id: FIRST,
                contributions: vec![contribution(&[0])],
            },
        );
        assert!(exchange.pump().is_err());
    }

    #[test]
    fn parallel_exchange_completes_targets_on_separate_shards() {
        let (calls_tx, calls) = unbounded();
        let exchange = ParallelExchange::new(Interpolator::new(1, 2), 2);
        for name in &["TargetA", "TargetB"] {
            exchange.add_target(
                config(name, 4, Vec::new()),
                Box::new(FixedPoints { num_points: 4 }),
                Box::new(RecordingCallback {
                    calls: calls_tx.clone(),
                }),
            );
        }
        for name in &["TargetA", "TargetB"] {
            exchange.post(
                Address::Target(name.to_string()),
                Message::AddTemporalIds(vec![FIRST]),
            );
        }
        exchange.post(
            Address::Interpolator,
            Message::VolumeData {
                element: ElementId(0),
                temporal_id: FIRST,
                data: contribution(&[0, 1, 2, 3]),
            },
        );

        let mut completed = Vec::new();
        for _ in 0..2 {
            let (id, values) = calls.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(id, FIRST);
            assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
            completed.push(id);
        }
        // Let the trailing cleanup traffic drain before stopping.
        std::thread::sleep(Duration::from_millis(50));
        exchange.stop().unwrap();
        assert_eq!(completed.len(), 2);
    }
}
