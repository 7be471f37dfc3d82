use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::temporal::Temporal;
use crate::vars::{Contribution, VarsBlock};

/// Returned by [`PointAccumulator::receive`] to indicate whether a temporal
/// id has now received values (or invalid markings) for every one of its
/// target points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Complete,
    Incomplete,
}

impl Fill {
    pub fn complete_if(condition: bool) -> Self {
        if condition {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

/// Per-temporal-id record of which global point offsets have been filled,
/// which are permanently unfillable, and the dense buffer the values land
/// in. Producers deliver with at-least-once semantics in arbitrary order,
/// so inserts are idempotent: an offset seen twice is skipped without
/// error, and the first write wins. Completion is reached exactly when the
/// filled and invalid sets together cover every target point.
pub struct PointAccumulator<T> {
    num_points: usize,
    num_fields: usize,
    filled: HashMap<T, HashSet<usize>>,
    invalid: HashMap<T, HashSet<usize>>,
    buffers: HashMap<T, VarsBlock>,
}

impl<T: Temporal> PointAccumulator<T> {
    pub fn new(num_points: usize, num_fields: usize) -> Self {
        Self {
            num_points,
            num_fields,
            filled: HashMap::new(),
            invalid: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Start tracking a temporal id: allocate its dense buffer and empty
    /// index sets. Invoked when the target's points are requested. Calling
    /// this twice for the same id is harmless.
    pub fn begin(&mut self, id: T) {
        let (num_fields, num_points) = (self.num_fields, self.num_points);
        self.buffers
            .entry(id)
            .or_insert_with(|| VarsBlock::zeros(num_fields, num_points));
        self.filled.entry(id).or_insert_with(HashSet::new);
        self.invalid.entry(id).or_insert_with(HashSet::new);
    }

    /// Copy a contribution's values into the dense buffer at their global
    /// offsets, recording each newly filled offset. Offsets already filled
    /// or marked invalid are skipped silently. An offset at or beyond the
    /// configured point count would push the filled-plus-invalid census
    /// past the target size, which is a collaborator bug, not a condition
    /// to absorb.
    pub fn receive(&mut self, id: &T, contribution: &Contribution) -> Result<Fill, Error> {
        if contribution.vars.num_fields() != self.num_fields {
            return Err(Error::WrongFieldCount {
                expected: self.num_fields,
                got: contribution.vars.num_fields(),
            });
        }
        let buffer = self
            .buffers
            .get_mut(id)
            .ok_or_else(|| Error::UnknownTemporalId(format!("{:?}", id)))?;
        let filled = self.filled.entry(*id).or_insert_with(HashSet::new);
        let invalid = self.invalid.entry(*id).or_insert_with(HashSet::new);

        for (k, &offset) in contribution.offsets.iter().enumerate() {
            if offset >= self.num_points {
                return Err(Error::InvalidPointOverflow {
                    num_points: self.num_points,
                    offset,
                });
            }
            if filled.contains(&offset) || invalid.contains(&offset) {
                continue;
            }
            buffer
                .point_mut(offset)
                .copy_from_slice(contribution.vars.point(k));
            filled.insert(offset);
        }
        Ok(Fill::complete_if(
            filled.len() + invalid.len() == self.num_points,
        ))
    }

    /// Pre-mark offsets whose interpolation failed locally (points outside
    /// the computational domain). They are excluded from filling but still
    /// count toward completion, and the fill value is written densely so
    /// the callback sees a fully populated buffer. Idempotent on duplicate
    /// invalid offsets; marking an offset that already holds a filled value
    /// would double-count it, which is the same overflow bug as delivering
    /// too many points.
    pub fn mark_invalid(&mut self, id: &T, offsets: &[usize], fill: f64) -> Result<(), Error> {
        self.begin(*id);
        let buffer = self.buffers.get_mut(id).unwrap();
        let filled = self.filled.get(id).unwrap();
        let invalid = self.invalid.get_mut(id).unwrap();

        for &offset in offsets {
            if offset >= self.num_points || filled.contains(&offset) {
                return Err(Error::InvalidPointOverflow {
                    num_points: self.num_points,
                    offset,
                });
            }
            if invalid.insert(offset) {
                for value in buffer.point_mut(offset) {
                    *value = fill;
                }
            }
        }
        Ok(())
    }

    pub fn is_complete(&self, id: &T) -> bool {
        let filled = self.filled.get(id).map_or(0, |s| s.len());
        let invalid = self.invalid.get(id).map_or(0, |s| s.len());
        filled + invalid == self.num_points
    }

    pub fn filled_count(&self, id: &T) -> usize {
        self.filled.get(id).map_or(0, |s| s.len())
    }

    pub fn invalid_count(&self, id: &T) -> usize {
        self.invalid.get(id).map_or(0, |s| s.len())
    }

    /// The dense buffer for an id, if the id is being tracked.
    pub fn buffer(&self, id: &T) -> Option<&VarsBlock> {
        self.buffers.get(id)
    }

    pub fn is_tracking(&self, id: &T) -> bool {
        self.buffers.contains_key(id)
    }

    /// Drop all per-id state. Invoked on the cleanup path once the callback
    /// has consumed the buffer.
    pub fn purge(&mut self, id: &T) {
        self.buffers.remove(id);
        self.filled.remove(id);
        self.invalid.remove(id);
    }
}

// ============================================================================
#[cfg(test)]
mod test {

    use super::{Fill, PointAccumulator};
    use crate::error::Error;
    use crate::temporal::Time;
    use crate::vars::{Contribution, VarsBlock};

    fn contribution(values: &[f64], offsets: &[usize]) -> Contribution {
        let mut vars = VarsBlock::empty(1);
        for &v in values {
            vars.push_point(&[v]);
        }
        Contribution::new(offsets.to_vec(), vars)
    }

    #[test]
    fn duplicate_offsets_are_skipped_and_first_write_wins() {
        let mut acc = PointAccumulator::new(10, 1);
        let id = Time(13.0 / 16.0);
        acc.begin(id);

        acc.receive(&id, &contribution(&[3.0, 6.0], &[3, 6])).unwrap();
        assert_eq!(acc.filled_count(&id), 2);

        // Redelivery of offset 6 with a contradictory value must neither
        // double count nor overwrite.
        acc.receive(&id, &contribution(&[888888.0], &[6])).unwrap();
        assert_eq!(acc.filled_count(&id), 2);
        assert_eq!(acc.buffer(&id).unwrap().point(6), &[6.0]);
    }

    #[test]
    fn completion_triggers_exactly_when_all_offsets_are_covered() {
        let mut acc = PointAccumulator::new(10, 1);
        let id = Time(13.0 / 16.0);
        acc.begin(id);

        let batches: Vec<(Vec<f64>, Vec<usize>)> = vec![
            (vec![3.0, 6.0], vec![3, 6]),
            (vec![2.0, 7.0], vec![2, 7]),
            (vec![1.0, 888888.0, 8.0, 0.0, 4.0], vec![1, 6, 8, 0, 4]),
            (vec![9.0, 5.0], vec![9, 5]),
        ];
        let mut fills = Vec::new();
        for (values, offsets) in &batches {
            fills.push(acc.receive(&id, &contribution(values, offsets)).unwrap());
        }
        assert_eq!(
            fills,
            vec![Fill::Incomplete, Fill::Incomplete, Fill::Incomplete, Fill::Complete]
        );
        assert_eq!(acc.filled_count(&id), 10);
        assert_eq!(
            acc.buffer(&id).unwrap().field(0),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
        );
    }

    #[test]
    fn invalid_offsets_count_toward_completion_and_carry_the_fill_value() {
        let mut acc = PointAccumulator::new(13, 1);
        let id = Time(13.0 / 16.0);
        acc.mark_invalid(&id, &[10, 11, 12], 15.0).unwrap();
        acc.mark_invalid(&id, &[10, 11, 12], 15.0).unwrap();
        assert_eq!(acc.invalid_count(&id), 3);

        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let offsets: Vec<usize> = (0..10).collect();
        let fill = acc.receive(&id, &contribution(&values, &offsets)).unwrap();
        assert_eq!(fill, Fill::Complete);
        assert_eq!(
            acc.buffer(&id).unwrap().field(0),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 15.0, 15.0, 15.0]
        );
    }

    #[test]
    fn out_of_range_offsets_overflow_loudly() {
        let mut acc = PointAccumulator::new(4, 1);
        let id = Time(0.5);
        acc.begin(id);
        assert!(matches!(
            acc.receive(&id, &contribution(&[1.0], &[4])),
            Err(Error::InvalidPointOverflow { num_points: 4, offset: 4 })
        ));
        assert!(matches!(
            acc.mark_invalid(&id, &[9], 0.0),
            Err(Error::InvalidPointOverflow { .. })
        ));
    }

    #[test]
    fn invalidating_a_filled_offset_overflows_loudly() {
        let mut acc = PointAccumulator::new(4, 1);
        let id = Time(0.5);
        acc.begin(id);
        acc.receive(&id, &contribution(&[2.0], &[2])).unwrap();
        assert!(matches!(
            acc.mark_invalid(&id, &[2], 0.0),
            Err(Error::InvalidPointOverflow { .. })
        ));
    }

    #[test]
    fn receiving_for_an_untracked_id_is_a_contract_violation() {
        let mut acc: PointAccumulator<Time> = PointAccumulator::new(4, 1);
        assert!(matches!(
            acc.receive(&Time(0.5), &contribution(&[0.0], &[0])),
            Err(Error::UnknownTemporalId(_))
        ));
    }

    #[test]
    fn purge_forgets_everything_about_an_id() {
        let mut acc = PointAccumulator::new(2, 1);
        let id = Time(0.5);
        acc.begin(id);
        acc.receive(&id, &contribution(&[0.0, 1.0], &[0, 1])).unwrap();
        assert!(acc.is_complete(&id));
        acc.purge(&id);
        assert!(!acc.is_tracking(&id));
        assert_eq!(acc.filled_count(&id), 0);
        assert!(!acc.is_complete(&id));
    }
}
