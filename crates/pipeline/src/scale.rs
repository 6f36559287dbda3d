//! User Scale Model.
//!
//! Learns how one user's ratings relate to the three public ratings of the
//! movies they watched, so a candidate's public ratings can be turned into
//! the score this user would probably give it.
//!
//! ## Model
//! `score = w · [imdb, douban, trakt] + b`, fitted by least squares over the
//! user's history. A user without usable history gets the untrained model,
//! which predicts the plain mean of the public ratings.

use anyhow::{anyhow, bail, Context, Result};
use data_loader::{RatingStore, UserHistoryRecord};
use nalgebra::{DMatrix, DVector, SVD};
use tracing::{debug, warn};

/// A fitted linear mapping from a public rating vector to a user score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub weights: [f64; 3],
    pub bias: f64,
}

impl LinearModel {
    pub fn predict(&self, inputs: &[f64; 3]) -> f64 {
        self.weights
            .iter()
            .zip(inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }
}

/// Fits a linear model over (vector, scalar) pairs.
///
/// Any numerical backend can sit behind this; the scale model only needs a
/// weight vector and an intercept back.
pub trait LinearFit: Send + Sync {
    fn fit(&self, inputs: &[[f64; 3]], targets: &[f64]) -> Result<LinearModel>;
}

/// Ordinary least squares with an intercept.
///
/// Inputs and targets are centred, the centred system is solved with an SVD
/// (minimum-norm solution, so collinear or too few examples still fit) and
/// the intercept is recovered from the means.
#[derive(Debug, Clone, Copy)]
pub struct LeastSquares {
    eps: f64,
    max_iterations: usize,
}

impl LeastSquares {
    pub fn new() -> Self {
        Self {
            eps: 1e-10,
            max_iterations: 1000,
        }
    }

    /// Singular values at or below `eps` are treated as zero
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Cap on SVD iterations before the fit is abandoned (default: 1000)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }
}

impl Default for LeastSquares {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearFit for LeastSquares {
    fn fit(&self, inputs: &[[f64; 3]], targets: &[f64]) -> Result<LinearModel> {
        let n = inputs.len();
        if n == 0 {
            bail!("cannot fit a linear model without examples");
        }
        if n != targets.len() {
            bail!("{} inputs but {} targets", n, targets.len());
        }
        let finite = inputs.iter().flatten().chain(targets).all(|v| v.is_finite());
        if !finite {
            bail!("cannot fit a linear model on non-finite values");
        }

        let mut x_mean = [0.0; 3];
        for row in inputs {
            for (mean, value) in x_mean.iter_mut().zip(row) {
                *mean += value / n as f64;
            }
        }
        let y_mean = targets.iter().sum::<f64>() / n as f64;

        let x = DMatrix::from_fn(n, 3, |i, j| inputs[i][j] - x_mean[j]);
        let y = DVector::from_iterator(n, targets.iter().map(|t| t - y_mean));

        let weights = if x.amax() <= self.eps {
            // Every example has the same inputs: only the intercept is learnable
            [0.0; 3]
        } else {
            let svd = SVD::try_new(x, true, true, self.eps, self.max_iterations).ok_or_else(|| {
                anyhow!("SVD did not converge in {} iterations", self.max_iterations)
            })?;
            let solution = svd
                .solve(&y, self.eps)
                .map_err(|e| anyhow!("least squares solve failed: {}", e))?;
            [solution[0], solution[1], solution[2]]
        };

        let bias = y_mean
            - weights
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(LinearModel { weights, bias })
    }
}

/// One usable history record: the movie's public ratings and the user's own
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingExample {
    pub public_ratings: [f32; 3],
    pub user_rating: f32,
}

/// Per-user scoring model, decided once when it is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleModel {
    Trained(LinearModel),
    Untrained,
}

impl ScaleModel {
    /// Train on a user's history.
    ///
    /// Records whose movie lacks a complete public rating vector are skipped.
    /// Store failures are returned; a failed fit falls back to `Untrained`.
    pub fn train(
        store: &dyn RatingStore,
        history: &[UserHistoryRecord],
        fitter: &dyn LinearFit,
    ) -> Result<Self> {
        let mut examples = Vec::with_capacity(history.len());
        for record in history {
            let movie_id = record.movie_id;
            let vector = store
                .get_public_rating(movie_id)
                .with_context(|| format!("Failed to fetch public ratings of movie {}", movie_id))?;

            match vector.complete_values() {
                Some(public_ratings) => examples.push(TrainingExample {
                    public_ratings,
                    user_rating: record.rating,
                }),
                None => debug!("Skipping movie {} for training: incomplete ratings", movie_id),
            }
        }

        debug!(
            "Assembled {} training examples from {} history records",
            examples.len(),
            history.len()
        );
        Ok(Self::from_examples(&examples, fitter))
    }

    pub fn from_examples(examples: &[TrainingExample], fitter: &dyn LinearFit) -> Self {
        if examples.is_empty() {
            return ScaleModel::Untrained;
        }

        let inputs: Vec<[f64; 3]> = examples
            .iter()
            .map(|e| e.public_ratings.map(f64::from))
            .collect();
        let targets: Vec<f64> = examples.iter().map(|e| f64::from(e.user_rating)).collect();

        match fitter.fit(&inputs, &targets) {
            Ok(model) => ScaleModel::Trained(model),
            Err(e) => {
                warn!("Falling back to mean scoring: {:#}", e);
                ScaleModel::Untrained
            }
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, ScaleModel::Trained(_))
    }

    /// Expected user score for a movie with these public ratings
    pub fn predict(&self, public_ratings: &[f32; 3]) -> f32 {
        match self {
            ScaleModel::Trained(model) => model.predict(&public_ratings.map(f64::from)) as f32,
            ScaleModel::Untrained => {
                public_ratings.iter().sum::<f32>() / public_ratings.len() as f32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{DataIndex, Movie, PublicRating, RatingSource, SharedStore};

    fn example(public_ratings: [f32; 3], user_rating: f32) -> TrainingExample {
        TrainingExample {
            public_ratings,
            user_rating,
        }
    }

    #[test]
    fn test_untrained_predicts_mean() {
        let model = ScaleModel::from_examples(&[], &LeastSquares::new());

        assert!(!model.is_trained());
        assert_eq!(model.predict(&[6.0, 7.0, 8.0]), 7.0);
    }

    #[test]
    fn test_recovers_exact_linear_relation() {
        // user = 0.5 * imdb + 0.25 * douban + 0.0 * trakt + 1.0
        let examples: Vec<TrainingExample> = [
            [8.0, 6.0, 1.0],
            [6.0, 9.0, 4.0],
            [7.0, 7.0, 9.0],
            [5.0, 8.0, 2.0],
            [9.0, 5.0, 6.0],
        ]
        .into_iter()
        .map(|x| example(x, 0.5 * x[0] + 0.25 * x[1] + 1.0))
        .collect();

        let model = ScaleModel::from_examples(&examples, &LeastSquares::new());
        let ScaleModel::Trained(fit) = model else {
            panic!("expected a trained model");
        };

        assert!((fit.weights[0] - 0.5).abs() < 1e-4);
        assert!((fit.weights[1] - 0.25).abs() < 1e-4);
        assert!(fit.weights[2].abs() < 1e-4);
        assert!((fit.bias - 1.0).abs() < 1e-3);
        assert!((model.predict(&[6.0, 8.0, 3.0]) - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_trained_differs_from_mean() {
        // A harsh critic: always two points below the public mean
        let examples = vec![
            example([8.0, 8.0, 8.0], 6.0),
            example([6.0, 6.0, 6.0], 4.0),
            example([9.0, 9.0, 9.0], 7.0),
        ];
        let model = ScaleModel::from_examples(&examples, &LeastSquares::new());

        assert!(model.is_trained());
        let predicted = model.predict(&[7.0, 7.0, 7.0]);
        assert!((predicted - 5.0).abs() < 1e-3);
        assert_ne!(predicted, 7.0);
    }

    #[test]
    fn test_single_example_learns_intercept_only() {
        let examples = [example([7.0, 8.0, 6.0], 9.0)];
        let model = ScaleModel::from_examples(&examples, &LeastSquares::new());

        assert_eq!(model.predict(&[1.0, 2.0, 3.0]), 9.0);
    }

    #[test]
    fn test_non_finite_example_falls_back_to_mean() {
        let examples = vec![
            example([f32::NAN, 7.0, 8.0], 8.0),
            example([6.0, 6.5, 7.0], 6.0),
            example([8.0, 8.5, 9.0], 9.0),
        ];

        let model = ScaleModel::from_examples(&examples, &LeastSquares::new());
        assert_eq!(model, ScaleModel::Untrained);
    }

    #[test]
    fn test_least_squares_rejects_non_finite_inputs() {
        let inputs = [[f64::INFINITY, 7.0, 8.0], [6.0, 6.5, 7.0]];
        assert!(LeastSquares::new().fit(&inputs, &[8.0, 6.0]).is_err());
        assert!(LeastSquares::new().fit(&[[6.0, 6.5, 7.0]], &[f64::NAN]).is_err());
    }

    #[test]
    fn test_iteration_cap_still_fits_well_conditioned_data() {
        let inputs = [[8.0, 6.0, 1.0], [6.0, 9.0, 4.0], [7.0, 7.0, 9.0], [5.0, 8.0, 2.0]];
        let targets: Vec<f64> = inputs.iter().map(|x| x[0] + 1.0).collect();

        let model = LeastSquares::new()
            .with_max_iterations(100)
            .fit(&inputs, &targets)
            .unwrap();
        assert!((model.predict(&[4.0, 0.0, 0.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_failure_falls_back_to_mean() {
        struct BrokenFit;
        impl LinearFit for BrokenFit {
            fn fit(&self, _inputs: &[[f64; 3]], _targets: &[f64]) -> Result<LinearModel> {
                bail!("solver unavailable")
            }
        }

        let model = ScaleModel::from_examples(&[example([7.0, 8.0, 6.0], 9.0)], &BrokenFit);
        assert_eq!(model, ScaleModel::Untrained);
    }

    #[test]
    fn test_train_skips_incomplete_vectors() {
        let mut index = DataIndex::new();
        for id in 1..=2 {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {} (2001)", id),
                year: Some(2001),
                genres: vec![],
            });
        }
        // Movie 1 is complete, movie 2 lacks a Douban value
        for (source, value) in [
            (RatingSource::Imdb, Some(8.0)),
            (RatingSource::Douban, Some(7.0)),
            (RatingSource::Trakt, Some(6.0)),
        ] {
            index.insert_public_rating(1, PublicRating::new(source, value));
        }
        index.insert_public_rating(2, PublicRating::new(RatingSource::Imdb, Some(5.0)));
        index.insert_public_rating(2, PublicRating::new(RatingSource::Douban, None));
        index.insert_public_rating(2, PublicRating::new(RatingSource::Trakt, Some(5.0)));
        let store = SharedStore::new(index);

        let history = [UserHistoryRecord::new(1, 9.5), UserHistoryRecord::new(2, 1.0)];
        let model = ScaleModel::train(&store, &history, &LeastSquares::new()).unwrap();

        // Only movie 1 was used, so the model is its intercept
        assert!(model.is_trained());
        assert_eq!(model.predict(&[5.0, 5.0, 5.0]), 9.5);
    }

    #[test]
    fn test_train_without_usable_history() {
        let store = SharedStore::new(DataIndex::new());
        let history = [UserHistoryRecord::new(1, 9.5)];

        let model = ScaleModel::train(&store, &history, &LeastSquares::new()).unwrap();
        assert_eq!(model, ScaleModel::Untrained);
    }
}
