use core::cmp::Ordering;
use core::fmt::Debug;
use core::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};




/**
 * An opaque, totally ordered identifier for the simulation instant at which
 * interpolated observables are requested. Equality and ordering must match
 * the identifier's own semantics: a floating-point time, or an integer step
 * plus substep. The `time` method exposes the physical time, which the
 * validity of time-dependent coordinate maps is checked against.
 */
pub trait Temporal: Copy + Eq + Ord + Hash + Debug {

    fn time(&self) -> f64;
}




#[derive(Copy, Clone, Debug, Serialize, Deserialize)]


/**
 * A simulation time usable as a hash map key. Equality and hashing go
 * through the bit pattern and ordering through `f64::total_cmp`, so values
 * behave as ordinary times as long as the producer does not mix `0.0` with
 * `-0.0` or manufacture NaNs.
 */
pub struct Time(pub f64);




// ============================================================================
impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Time {}

impl Hash for Time {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Temporal for Time {
    fn time(&self) -> f64 {
        self.0
    }
}




#[derive(Copy, Clone, Debug, Serialize, Deserialize)]


/**
 * An integer time-step identifier: the slab step, the substep within the
 * slab, and the substep's physical time. Identity and ordering go by
 * `(step, substep)` alone; the time rides along for map-validity checks and
 * must be consistent with that order.
 */
pub struct StepId {
    pub step: u64,
    pub substep: u32,
    pub time: Time,
}




// ============================================================================
impl StepId {

    pub fn new(step: u64, substep: u32, time: f64) -> Self {
        Self {
            step,
            substep,
            time: Time(time),
        }
    }
}

impl PartialEq for StepId {
    fn eq(&self, other: &Self) -> bool {
        (self.step, self.substep) == (other.step, other.substep)
    }
}

impl Eq for StepId {}

impl Hash for StepId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.step, self.substep).hash(state)
    }
}

impl PartialOrd for StepId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.step, self.substep).cmp(&(other.step, other.substep))
    }
}

impl Temporal for StepId {
    fn time(&self) -> f64 {
        self.time.0
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{StepId, Temporal, Time};

    #[test]
    fn times_order_like_their_values() {
        assert!(Time(13.0 / 16.0) < Time(14.0 / 16.0));
        assert_eq!(Time(13.0 / 16.0), Time(13.0 / 16.0));
        assert_eq!(Time(0.5).time(), 0.5);
    }

    #[test]
    fn times_key_hash_maps() {
        let mut map = std::collections::HashMap::new();
        map.insert(Time(13.0 / 16.0), "first");
        map.insert(Time(14.0 / 16.0), "second");
        assert_eq!(map[&Time(13.0 / 16.0)], "first");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn step_ids_order_by_step_then_substep() {
        assert!(StepId::new(3, 0, 0.3) < StepId::new(3, 1, 0.35));
        assert!(StepId::new(3, 1, 0.35) < StepId::new(4, 0, 0.4));
        assert_eq!(StepId::new(2, 1, 0.25), StepId::new(2, 1, 0.25));
        assert_eq!(StepId::new(2, 1, 0.25).time(), 0.25);
    }
}
