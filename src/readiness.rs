use std::collections::HashMap;

use crate::temporal::Temporal;




#[derive(Clone, Debug)]


/**
 * Validity table for time-dependent coordinate maps: map name to the
 * expiration time of the currently known validity interval. A map covers a
 * time as long as the time does not exceed its expiration. Expirations only
 * ever move forward.
 */
pub struct MapValidity {
    expirations: HashMap<String, f64>,
}




// ============================================================================
impl MapValidity {


    pub fn new() -> Self {
        Self {
            expirations: HashMap::new(),
        }
    }


    /**
     * Extend a map's validity interval. An update that would shrink the
     * interval is ignored.
     */
    pub fn extend(&mut self, name: &str, valid_until: f64) {
        let entry = self
            .expirations
            .entry(name.to_string())
            .or_insert(valid_until);
        if valid_until > *entry {
            *entry = valid_until;
        }
    }


    pub fn covers(&self, name: &str, time: f64) -> bool {
        match self.expirations.get(name) {
            Some(&expiration) => time <= expiration,
            None => false,
        }
    }


    /**
     * The currently known expiration for a map, if any update for it has
     * been seen.
     */
    pub fn expiration(&self, name: &str) -> Option<f64> {
        self.expirations.get(name).copied()
    }
}




/**
 * Decides whether the time-dependent maps needed to locate a target's
 * points are valid yet at a given time, and keeps the set of temporal ids
 * whose point requests are deferred until a map update extends coverage.
 * Deferral is listener-style: nothing polls. `update` feeds one map event
 * through and reports which deferred ids just became ready, however many
 * rounds of not-ready-yet that takes. A gate with no required maps is
 * always ready.
 */
pub struct ReadinessGate<T> {
    required: Vec<String>,
    validity: MapValidity,
    deferred: Vec<T>,
}




// ============================================================================
impl<T: Temporal> ReadinessGate<T> {


    pub fn new(required: Vec<String>, initial: MapValidity) -> Self {
        Self {
            required,
            validity: initial,
            deferred: Vec::new(),
        }
    }


    pub fn required_maps(&self) -> &[String] {
        &self.required
    }


    pub fn is_ready(&self, time: f64) -> bool {
        self.required.iter().all(|map| self.validity.covers(map, time))
    }


    /**
     * The required maps whose validity does not yet cover the given time.
     */
    pub fn stale_maps(&self, time: f64) -> Vec<String> {
        self.required
            .iter()
            .filter(|map| !self.validity.covers(map, time))
            .cloned()
            .collect()
    }


    /**
     * Register a temporal id to be re-checked when map coverage extends.
     */
    pub fn defer(&mut self, id: T) {
        if !self.deferred.contains(&id) {
            self.deferred.push(id);
        }
    }


    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }


    /**
     * Feed one map-update event through the gate: extend the local view of
     * that map's validity, then drain and return the deferred ids that are
     * now ready, preserving their deferral order.
     */
    pub fn update(&mut self, name: &str, valid_until: f64) -> Vec<T> {
        self.validity.extend(name, valid_until);

        let required = &self.required;
        let validity = &self.validity;
        let mut ready = Vec::new();
        self.deferred.retain(|id| {
            if required.iter().all(|map| validity.covers(map, id.time())) {
                ready.push(*id);
                false
            } else {
                true
            }
        });
        ready
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{MapValidity, ReadinessGate};
    use crate::temporal::Time;

    fn translation_gate(valid_until: f64) -> ReadinessGate<Time> {
        let mut validity = MapValidity::new();
        validity.extend("Translation", valid_until);
        ReadinessGate::new(vec!["Translation".to_string()], validity)
    }

    #[test]
    fn a_gate_with_no_required_maps_is_always_ready() {
        let gate: ReadinessGate<Time> = ReadinessGate::new(Vec::new(), MapValidity::new());
        assert!(gate.is_ready(1.0e10));
    }

    #[test]
    fn coverage_is_checked_against_every_required_map() {
        let mut validity = MapValidity::new();
        validity.extend("Translation", 0.9);
        validity.extend("Rotation", 0.4);
        let gate: ReadinessGate<Time> = ReadinessGate::new(
            vec!["Translation".to_string(), "Rotation".to_string()],
            validity,
        );
        assert!(gate.is_ready(0.3));
        assert!(!gate.is_ready(0.5));
        assert_eq!(gate.stale_maps(0.5), vec!["Rotation".to_string()]);
    }

    #[test]
    fn deferred_ids_come_back_once_coverage_extends() {
        let mut gate = translation_gate(13.5 / 16.0);
        assert!(gate.is_ready(13.0 / 16.0));
        assert!(!gate.is_ready(14.0 / 16.0));

        gate.defer(Time(14.0 / 16.0));
        gate.defer(Time(14.0 / 16.0));

        // An update that still falls short keeps the id deferred.
        assert!(gate.update("Translation", 13.8 / 16.0).is_empty());
        assert!(gate.has_deferred());

        let ready = gate.update("Translation", 14.5 / 16.0);
        assert_eq!(ready, vec![Time(14.0 / 16.0)]);
        assert!(!gate.has_deferred());
    }

    #[test]
    fn validity_never_regresses() {
        let mut validity = MapValidity::new();
        validity.extend("Translation", 0.9);
        validity.extend("Translation", 0.4);
        assert!(validity.covers("Translation", 0.8));
    }
}
