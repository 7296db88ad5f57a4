//! Synthetic clustered data and shuffled mini-batching.

use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

/// Points scattered uniformly around a handful of random centres.
#[derive(Debug, Clone)]
pub struct ClusteredDataset {
    /// Shape: [N][P]
    pub data: Array2<f32>,
    /// Centre index each row was drawn around.
    pub labels: Vec<usize>,
    /// Shape: [C][P]
    pub centers: Array2<f32>,
}

impl ClusteredDataset {
    /// Centres are drawn from `U(lo, hi)` per feature, points from
    /// `centre + U(-spread, spread)`.
    pub fn generate(
        samples: usize,
        features: usize,
        clusters: usize,
        range: (f32, f32),
        spread: f32,
        rng: &mut impl Rng,
    ) -> Self {
        let clusters = clusters.max(1);
        let (lo, hi) = range;
        let centers = Array2::from_shape_fn((clusters, features), |_| rng.gen_range(lo..hi));
        let labels: Vec<usize> = (0..samples).map(|_| rng.gen_range(0..clusters)).collect();
        let mut data = Array2::<f32>::zeros((samples, features));
        for (mut row, &c) in data.rows_mut().into_iter().zip(labels.iter()) {
            for (v, &center) in row.iter_mut().zip(centers.row(c).iter()) {
                let noise = if spread > 0.0 { rng.gen_range(-spread..spread) } else { 0.0 };
                *v = center + noise;
            }
        }
        Self { data, labels, centers }
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn features(&self) -> usize {
        self.data.ncols()
    }

    /// One epoch of shuffled batches. The last batch may be short.
    pub fn batches(&self, batch_size: usize, rng: &mut impl Rng) -> Vec<Array2<f32>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        order
            .chunks(batch_size.max(1))
            .map(|idx| self.data.select(Axis(0), idx))
            .collect()
    }
}
