use std::collections::VecDeque;

use crate::error::Error;
use crate::temporal::Temporal;




#[derive(Clone, Debug)]


/**
 * Ordered bookkeeping of the temporal ids one interpolation target is
 * responsible for. An id is pending until its points have been requested,
 * in progress while contributions accumulate, and completed once the
 * post-interpolation callback has run and cleanup has fired. All three
 * sequences preserve arrival order. The in-progress sequence structurally
 * admits several simultaneous ids; whether more than one is actually in
 * flight is the state machine's decision, not this container's.
 */
pub struct TemporalIdQueue<T> {
    pending: VecDeque<T>,
    in_progress: VecDeque<T>,
    completed: VecDeque<T>,
}




// ============================================================================
impl<T: Temporal> TemporalIdQueue<T> {


    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            in_progress: VecDeque::new(),
            completed: VecDeque::new(),
        }
    }


    /**
     * Append an id to the pending sequence. Ids already known to any of the
     * three sequences are dropped and `false` is returned: scheduling
     * messages arrive with at-least-once semantics, and a duplicate must
     * not be tracked twice.
     */
    pub fn push_pending(&mut self, id: T) -> bool {
        if self.is_known(&id) {
            return false;
        }
        self.pending.push_back(id);
        true
    }


    /**
     * Pop the front pending id and move it to the in-progress sequence.
     */
    pub fn begin_next(&mut self) -> Result<T, Error> {
        let id = self.pending.pop_front().ok_or(Error::EmptyQueue)?;
        self.in_progress.push_back(id);
        Ok(id)
    }


    /**
     * Move a specific pending id to the in-progress sequence, wherever it
     * sits in the pending order. Non-sequential targets use this to start
     * a ready id behind a deferred one.
     */
    pub fn begin(&mut self, id: &T) -> Result<T, Error> {
        match self.pending.iter().position(|p| p == id) {
            Some(index) => {
                let id = self.pending.remove(index).unwrap();
                self.in_progress.push_back(id);
                Ok(id)
            }
            None => Err(Error::UnknownTemporalId(format!("{:?}", id))),
        }
    }


    /**
     * Remove an id from the in-progress sequence and append it to the
     * completed sequence.
     */
    pub fn complete(&mut self, id: &T) -> Result<(), Error> {
        match self.in_progress.iter().position(|p| p == id) {
            Some(index) => {
                let id = self.in_progress.remove(index).unwrap();
                self.completed.push_back(id);
                Ok(())
            }
            None => Err(Error::UnknownTemporalId(format!("{:?}", id))),
        }
    }


    pub fn pending(&self) -> &VecDeque<T> {
        &self.pending
    }


    pub fn in_progress(&self) -> &VecDeque<T> {
        &self.in_progress
    }


    pub fn completed(&self) -> &VecDeque<T> {
        &self.completed
    }


    pub fn is_in_progress(&self, id: &T) -> bool {
        self.in_progress.contains(id)
    }


    pub fn is_known(&self, id: &T) -> bool {
        self.pending.contains(id) || self.in_progress.contains(id) || self.completed.contains(id)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::TemporalIdQueue;
    use crate::error::Error;
    use crate::temporal::Time;

    #[test]
    fn ids_advance_through_the_three_sequences_in_order() {
        let mut queue = TemporalIdQueue::new();
        assert!(queue.push_pending(Time(0.1)));
        assert!(queue.push_pending(Time(0.2)));

        let id = queue.begin_next().unwrap();
        assert_eq!(id, Time(0.1));
        assert_eq!(queue.pending().len(), 1);
        assert!(queue.is_in_progress(&Time(0.1)));

        queue.complete(&Time(0.1)).unwrap();
        assert!(!queue.is_in_progress(&Time(0.1)));
        assert_eq!(queue.completed().front(), Some(&Time(0.1)));
        assert_eq!(queue.begin_next().unwrap(), Time(0.2));
    }

    #[test]
    fn begin_next_on_an_empty_queue_is_quiescence_not_failure() {
        let mut queue: TemporalIdQueue<Time> = TemporalIdQueue::new();
        assert_eq!(queue.begin_next(), Err(Error::EmptyQueue));
    }

    #[test]
    fn duplicate_scheduling_is_dropped() {
        let mut queue = TemporalIdQueue::new();
        assert!(queue.push_pending(Time(0.1)));
        assert!(!queue.push_pending(Time(0.1)));
        queue.begin_next().unwrap();
        assert!(!queue.push_pending(Time(0.1)));
        queue.complete(&Time(0.1)).unwrap();
        assert!(!queue.push_pending(Time(0.1)));
        assert_eq!(queue.pending().len(), 0);
    }

    #[test]
    fn completing_an_untracked_id_is_a_contract_violation() {
        let mut queue: TemporalIdQueue<Time> = TemporalIdQueue::new();
        assert!(matches!(
            queue.complete(&Time(0.7)),
            Err(Error::UnknownTemporalId(_))
        ));
    }

    #[test]
    fn mid_queue_begin_preserves_remaining_order() {
        let mut queue = TemporalIdQueue::new();
        queue.push_pending(Time(0.1));
        queue.push_pending(Time(0.2));
        queue.push_pending(Time(0.3));
        assert_eq!(queue.begin(&Time(0.2)).unwrap(), Time(0.2));
        assert_eq!(queue.pending().iter().copied().collect::<Vec<_>>(), vec![
            Time(0.1),
            Time(0.3)
        ]);
    }
}
