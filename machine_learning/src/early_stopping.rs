//! Patience-based early stopping on a monitored loss.

/// What the training loop should do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Stop,
}

/// Stops training when the monitored value has not improved for `patience` observations.
///
/// Lower is better. The first observation always sets the best value, and an observation
/// matching the best value within `min_delta` still counts as an improvement.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    best: Option<f64>,
    counter: usize,
    improved: bool,
    stopped: bool,
}

impl EarlyStopping {
    /// Creates a new `EarlyStopping` policy.
    ///
    /// # Arguments
    /// * `patience` - How many observations without improvement are tolerated.
    /// * `min_delta` - How much lower than the best an observation has to be to improve on it.
    ///
    /// # Returns
    /// A new `EarlyStopping` instance.
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            best: None,
            counter: 0,
            improved: false,
            stopped: false,
        }
    }

    /// Records a new value of the monitored metric.
    ///
    /// # Arguments
    /// * `metric` - The latest value, lower is better.
    ///
    /// # Returns
    /// `Signal::Stop` once patience has run out, `Signal::Continue` otherwise.
    pub fn observe(&mut self, metric: f64) -> Signal {
        if self.stopped {
            self.improved = false;
            return Signal::Stop;
        }

        self.improved = match self.best {
            None => true,
            Some(best) => metric <= best - self.min_delta,
        };

        if self.improved {
            self.best = Some(metric);
            self.counter = 0;
            return Signal::Continue;
        }

        self.counter += 1;
        log::debug!("early stopping counter: {} out of {}", self.counter, self.patience);

        if self.counter >= self.patience {
            self.stopped = true;
            return Signal::Stop;
        }

        Signal::Continue
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    /// Whether the last observation improved on the best value.
    pub fn improved(&self) -> bool {
        self.improved
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}
