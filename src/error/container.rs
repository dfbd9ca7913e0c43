use std::fmt::Formatter;

use thiserror::Error;

use crate::data::byte_group::StepIndex;

/// An error that is localised to a particular step of the trace being
/// replayed.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E>
where
    E: Clone,
{
    /// The index of the trace step where the error occurred.
    pub location: StepIndex,

    /// The error data
    pub payload: E,
}

/// Displays the error associated with the step index in the trace where the
/// error occurred.
impl<E> std::fmt::Display for Located<E>
where
    E: std::fmt::Display + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[step {}]: {}", self.location, self.payload)
    }
}

/// A trait for types that can have a step location attached to them.
pub trait Locatable
where
    Self: Sized,
{
    /// The return type with the attached step location.
    type Located;

    /// Attach the location described by `step_index` (the index of the trace
    /// step being replayed) to the error.
    fn locate(self, step_index: StepIndex) -> Self::Located;
}

/// A blanket implementation that allows for attaching a location to any result.
impl<T, E> Locatable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Located = Result<T, Located<E>>;

    fn locate(self, step_index: StepIndex) -> Self::Located {
        self.map_err(|e| Located {
            location: step_index,
            payload:  e,
        })
    }
}
