use ndarray::{ArrayView2, Axis};

/// Computes and stores the running average and the current value of a scalar metric.
#[derive(Debug, Clone)]
pub struct AverageMeter {
    name: &'static str,
    val: f64,
    sum: f64,
    count: usize,
    avg: f64,
}

impl AverageMeter {
    /// Creates a new, reset, `AverageMeter`.
    ///
    /// # Arguments
    /// * `name` - What is being measured, used when reporting.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            val: 0.,
            sum: 0.,
            count: 0,
            avg: 0.,
        }
    }

    pub fn reset(&mut self) {
        self.val = 0.;
        self.sum = 0.;
        self.count = 0;
        self.avg = 0.;
    }

    /// Records `val`, observed `n` times.
    ///
    /// # Arguments
    /// * `val` - The latest value of the metric.
    /// * `n` - The weight of the value, usually the amount of samples it was computed over.
    pub fn update(&mut self, val: f64, n: usize) {
        self.val = val;
        self.sum += val * n as f64;
        self.count += n;
        self.avg = self.sum / self.count as f64;
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn val(&self) -> f64 {
        self.val
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn avg(&self) -> f64 {
        self.avg
    }
}

/// Returns the index of the largest logit of every row, the first one on ties.
pub fn argmax(logits: ArrayView2<f32>) -> Vec<usize> {
    logits
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &z)| {
                    if z > best { (i, z) } else { (best_i, best) }
                })
                .0
        })
        .collect()
}

/// Returns the fraction of rows whose largest logit matches the label.
pub fn accuracy(logits: ArrayView2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.;
    }

    let hits = argmax(logits)
        .into_iter()
        .zip(labels)
        .filter(|(pred, label)| pred == *label)
        .count();

    hits as f64 / labels.len() as f64
}
