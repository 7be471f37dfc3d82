use serde::{Deserialize, Serialize};




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]


/**
 * A flat, point-major buffer of field values: `num_fields` contiguous
 * values per point. This is both the payload of a producer contribution and
 * the dense buffer handed to the post-interpolation callback once a target
 * is complete.
 */
pub struct VarsBlock {
    num_fields: usize,
    data: Vec<f64>,
}




// ============================================================================
impl VarsBlock {


    /**
     * A buffer of zeros for the given number of points.
     */
    pub fn zeros(num_fields: usize, num_points: usize) -> Self {
        Self::filled(num_fields, num_points, 0.0)
    }


    /**
     * A buffer with every value set to the given fill.
     */
    pub fn filled(num_fields: usize, num_points: usize, value: f64) -> Self {
        Self {
            num_fields,
            data: vec![value; num_fields * num_points],
        }
    }


    /**
     * An empty buffer to be grown point-by-point with `push_point`.
     */
    pub fn empty(num_fields: usize) -> Self {
        Self {
            num_fields,
            data: Vec::new(),
        }
    }


    /**
     * Generate a buffer with values defined from a closure, which is given
     * the point index and the mutable field slice for that point.
     */
    pub fn from_function<F>(num_fields: usize, num_points: usize, f: F) -> Self
    where
        F: Fn(usize, &mut [f64]),
    {
        let mut block = Self::zeros(num_fields, num_points);
        for index in 0..num_points {
            f(index, block.point_mut(index));
        }
        block
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn num_points(&self) -> usize {
        self.data.len() / self.num_fields
    }


    /**
     * The field slice for one point.
     */
    pub fn point(&self, index: usize) -> &[f64] {
        &self.data[index * self.num_fields..(index + 1) * self.num_fields]
    }


    pub fn point_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.data[index * self.num_fields..(index + 1) * self.num_fields]
    }


    /**
     * Append one point's field values.
     */
    pub fn push_point(&mut self, values: &[f64]) {
        assert!(
            values.len() == self.num_fields,
            "pushed point has {} fields, buffer expects {}",
            values.len(),
            self.num_fields
        );
        self.data.extend_from_slice(values)
    }


    /**
     * Traverse the points in order, yielding each point's field slice.
     */
    pub fn iter_points(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.num_fields)
    }


    /**
     * The values of a single field across all points.
     */
    pub fn field(&self, field: usize) -> Vec<f64> {
        self.iter_points().map(|p| p[field]).collect()
    }
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]


/**
 * A sparse producer contribution: field values for a subset of the global
 * target points, keyed by their global offsets. The block holds exactly one
 * point per offset, in the same order.
 */
pub struct Contribution {
    pub offsets: Vec<usize>,
    pub vars: VarsBlock,
}




// ============================================================================
impl Contribution {

    pub fn new(offsets: Vec<usize>, vars: VarsBlock) -> Self {
        assert!(
            offsets.len() == vars.num_points(),
            "contribution has {} offsets but {} points",
            offsets.len(),
            vars.num_points()
        );
        Self { offsets, vars }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Contribution, VarsBlock};

    #[test]
    fn block_layout_is_point_major() {
        let block = VarsBlock::from_function(2, 3, |i, p| {
            p[0] = i as f64;
            p[1] = 10.0 * i as f64;
        });
        assert_eq!(block.num_points(), 3);
        assert_eq!(block.point(1), &[1.0, 10.0]);
        assert_eq!(block.field(1), vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn pushed_points_round_trip() {
        let mut block = VarsBlock::empty(2);
        block.push_point(&[1.0, 2.0]);
        block.push_point(&[3.0, 4.0]);
        assert_eq!(block.num_points(), 2);
        assert_eq!(block.point(1), &[3.0, 4.0]);
    }

    #[test]
    #[should_panic]
    fn contribution_requires_matching_lengths() {
        Contribution::new(vec![0, 1, 2], VarsBlock::zeros(1, 2));
    }
}
