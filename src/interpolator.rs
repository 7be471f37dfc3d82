use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::temporal::Temporal;
use crate::vars::{Contribution, VarsBlock};

/// Identifier of a producer mesh element within the distributed domain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub usize);

struct TimeEntry {
    by_element: HashMap<ElementId, Contribution>,
    interest: usize,
}

/// Volume field data buffered per producer element and temporal id, owned
/// here until every interested target has consumed it. Entries carry a
/// reference count initialized to the number of interested targets; each
/// cleanup notification decrements it, and the entry is purged when it
/// reaches zero.
pub struct VolumeDataCache<T> {
    num_fields: usize,
    num_interested: usize,
    entries: HashMap<T, TimeEntry>,
}

impl<T: Temporal> VolumeDataCache<T> {
    pub fn new(num_fields: usize, num_interested_targets: usize) -> Self {
        Self {
            num_fields,
            num_interested: num_interested_targets,
            entries: HashMap::new(),
        }
    }

    /// Buffer an element's contribution for a temporal id. A repeated
    /// report from the same element overwrites its previous one.
    pub fn store(&mut self, element: ElementId, id: T, data: Contribution) {
        let num_interested = self.num_interested;
        let entry = self.entries.entry(id).or_insert_with(|| TimeEntry {
            by_element: HashMap::new(),
            interest: num_interested,
        });
        entry.by_element.insert(element, data);
    }

    /// Gather the values stored for exactly the requested offsets. Offsets
    /// no element has reported yet are simply absent from the result; a
    /// partial extraction is valid, and the consumer waits for a later
    /// round. Each offset appears at most once even if two elements claim
    /// it.
    pub fn extract(&self, id: &T, offsets: &[usize]) -> Contribution {
        let mut out = Contribution::new(Vec::new(), VarsBlock::empty(self.num_fields));
        let entry = match self.entries.get(id) {
            Some(entry) => entry,
            None => return out,
        };
        let requested: HashSet<usize> = offsets.iter().copied().collect();
        let mut seen = HashSet::new();
        for data in entry.by_element.values() {
            for (k, &offset) in data.offsets.iter().enumerate() {
                if requested.contains(&offset) && seen.insert(offset) {
                    out.offsets.push(offset);
                    out.vars.push_point(data.vars.point(k));
                }
            }
        }
        out
    }

    /// Drop one target's interest in a temporal id. Returns true when the
    /// last interest is gone and the stored data has been purged.
    pub fn cleanup(&mut self, id: &T) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.interest -= 1;
                if entry.interest == 0 {
                    self.entries.remove(id);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// The number of temporal ids currently buffered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct PointRequest {
    num_points: usize,
    sent: HashSet<usize>,
}

/// The producer-side service: buffers volume data from mesh elements and
/// serves each target's point request as matching values arrive, in either
/// order. Locating target coordinates inside elements and the actual
/// interpolation are the surrounding code's concern; elements deliver
/// ready contributions keyed by global offset.
pub struct Interpolator<T: Temporal> {
    cache: VolumeDataCache<T>,
    elements: HashSet<ElementId>,
    requests: HashMap<(String, T), PointRequest>,
}

impl<T: Temporal> Interpolator<T> {
    pub fn new(num_fields: usize, num_interested_targets: usize) -> Self {
        Self {
            cache: VolumeDataCache::new(num_fields, num_interested_targets),
            elements: HashSet::new(),
            requests: HashMap::new(),
        }
    }

    pub fn register_element(&mut self, element: ElementId) {
        if self.elements.insert(element) {
            debug!("interpolator: element {:?} registered", element);
        }
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn cache(&self) -> &VolumeDataCache<T> {
        &self.cache
    }

    /// Record a target's point request and return whatever portion of it
    /// the buffered volume data can already serve.
    pub fn request_points(
        &mut self,
        target: &str,
        id: T,
        points: &[[f64; 3]],
    ) -> Option<Contribution> {
        debug!(
            "interpolator: {} requests {} points at {:?}",
            target,
            points.len(),
            id
        );
        self.requests.insert(
            (target.to_string(), id),
            PointRequest {
                num_points: points.len(),
                sent: HashSet::new(),
            },
        );
        self.serve(&(target.to_string(), id))
    }

    /// Buffer an element's contribution, then serve every outstanding
    /// request for that temporal id with the newly available offsets.
    /// Returns the deliveries to route back to targets.
    pub fn store(
        &mut self,
        element: ElementId,
        id: T,
        data: Contribution,
    ) -> Vec<(String, T, Contribution)> {
        self.cache.store(element, id, data);
        let keys: Vec<(String, T)> = self
            .requests
            .keys()
            .filter(|(_, req_id)| req_id == &id)
            .cloned()
            .collect();
        let mut deliveries = Vec::new();
        for key in keys {
            if let Some(contribution) = self.serve(&key) {
                deliveries.push((key.0.clone(), key.1, contribution));
            }
        }
        deliveries
    }

    /// Retire a target's request for a temporal id and drop its interest
    /// in the cached volume data. Returns true when the data was purged.
    pub fn cleanup(&mut self, target: &str, id: &T) -> bool {
        self.requests.remove(&(target.to_string(), *id));
        let purged = self.cache.cleanup(id);
        if purged {
            info!("interpolator: volume data for {:?} purged", id);
        }
        purged
    }

    fn serve(&mut self, key: &(String, T)) -> Option<Contribution> {
        let request = self.requests.get_mut(key)?;
        let missing: Vec<usize> = (0..request.num_points)
            .filter(|offset| !request.sent.contains(offset))
            .collect();
        let contribution = self.cache.extract(&key.1, &missing);
        if contribution.is_empty() {
            return None;
        }
        request.sent.extend(contribution.offsets.iter().copied());
        Some(contribution)
    }
}
