use tracing::{debug, warn};

use crate::domain::{EventData, EventType};
use crate::emitter::{Emitter, EmitterError};

/// One attachment against an (emitter, source) pair
pub type Step<E, T> = Box<dyn FnOnce(&Emitter<E, T>, &E) -> Result<(), EmitterError>>;

/// Ordered list of steps applied to one source type
pub struct Topology<E: EventType, T> {
    emitter: Emitter<E, T>,
    source: E,
    steps: Vec<Step<E, T>>,
}

impl<E: EventType, T: EventData> Topology<E, T> {
    /// Start a topology rooted at `source` on `emitter`
    ///
    /// The emitter handle is cloned; registrations land in the caller's emitter.
    pub fn new(emitter: &Emitter<E, T>, source: E) -> Self {
        Self {
            emitter: emitter.clone(),
            source,
            steps: Vec::new(),
        }
    }

    /// Append a step
    ///
    /// # Example
    /// ```rust,ignore
    /// Topology::new(&emitter, "raw")
    ///     .with(builders::transformer("celsius", |f: f64| (f - 32.0) / 1.8))
    ///     .with(|emitter, source| {
    ///         debug!(?source, "wired");
    ///         Ok(())
    ///     })
    /// ```
    pub fn with<S>(mut self, step: S) -> Self
    where
        S: FnOnce(&Emitter<E, T>, &E) -> Result<(), EmitterError> + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order, stopping at the first error
    pub fn build(self) -> Result<Emitter<E, T>, EmitterError> {
        let Topology {
            emitter,
            source,
            steps,
        } = self;

        let total = steps.len();
        for (index, step) in steps.into_iter().enumerate() {
            if let Err(e) = step(&emitter, &source) {
                warn!(source = ?source, step = index, error = %e, "Topology step failed");
                return Err(e);
            }
        }

        debug!(source = ?source, steps = total, "Topology built");
        Ok(emitter)
    }
}

/// Apply boxed `steps` to `source` in order
pub fn topology<E: EventType, T: EventData>(
    emitter: &Emitter<E, T>,
    source: E,
    steps: Vec<Step<E, T>>,
) -> Result<Emitter<E, T>, EmitterError> {
    Topology {
        emitter: emitter.clone(),
        source,
        steps,
    }
    .build()
}
