use std::error;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]

/**
 * Error to represent violations of the interpolation-target protocol.
 *
 * `UnknownTemporalId` and `InvalidPointOverflow` are contract violations: a
 * message was routed to a temporal id the target was never asked about, or
 * a producer delivered more distinct point indices than the target is
 * configured to hold. Both indicate a desynchronized collaborator, so they
 * are fatal to the affected instance; retrying cannot fix them.
 *
 * `EmptyQueue` is a normal quiescent condition, not a failure: it is
 * returned when the next temporal id is requested and none is pending.
 */
pub enum Error {
    UnknownTemporalId(String),
    EmptyQueue,
    InvalidPointOverflow { num_points: usize, offset: usize },
    WrongFieldCount { expected: usize, got: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            UnknownTemporalId(id) => {
                writeln!(fmt, "contribution routed to untracked temporal id: {}", id)
            }
            EmptyQueue => writeln!(fmt, "no pending temporal id"),
            InvalidPointOverflow { num_points, offset } => writeln!(
                fmt,
                "point index {} overflows a target sized for {} points",
                offset, num_points
            ),
            WrongFieldCount { expected, got } => writeln!(
                fmt,
                "contribution carries {} fields per point where {} were configured",
                got, expected
            ),
        }
    }
}

impl error::Error for Error {}
