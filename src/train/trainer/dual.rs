use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::super::space::TrainingSpace;
use super::{DualCoordinateDescent, Trainer, TrainingAlgorithm};
use crate::error::{Error, Result};
use crate::model::{LinearModel, Solver};
use crate::sparse::SparseVector;

const MAX_ITER: usize = 1000;
const MAX_ITER_NEWTON: usize = 100;

/// Loss functions of the dual coordinate descent trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualLoss {
    /// L2-regularized L1-loss (hinge) SVM
    L1Hinge,
    /// L2-regularized L2-loss (squared hinge) SVM
    L2Hinge,
    /// L2-regularized logistic regression
    Logistic,
}

impl DualLoss {
    /// The solver id models trained with this loss are saved with
    pub fn solver(self) -> Solver {
        match self {
            DualLoss::L1Hinge => Solver::L1Svm,
            DualLoss::L2Hinge => Solver::L2Svm,
            DualLoss::Logistic => Solver::DualLogistic,
        }
    }

    pub fn from_solver(solver: Solver) -> Option<Self> {
        match solver {
            Solver::L1Svm => Some(DualLoss::L1Hinge),
            Solver::L2Svm => Some(DualLoss::L2Hinge),
            Solver::DualLogistic => Some(DualLoss::Logistic),
            _ => None,
        }
    }

    fn default_seed(self) -> u64 {
        match self {
            DualLoss::Logistic => 1,
            _ => 5,
        }
    }
}

/// Dual coordinate descent training parameters.
#[derive(Debug, Clone)]
pub struct DualParams {
    loss: DualLoss,
    cost: f64,
    eps: f64,
    bias: f64,
    negative_cost_ratio: f64,
    shuffle_seed: Option<u64>,
}

impl Default for DualParams {
    fn default() -> Self {
        Self {
            loss: DualLoss::L1Hinge,
            cost: 0.1,
            eps: 0.1,
            bias: 0.0,
            negative_cost_ratio: 1.0,
            shuffle_seed: None,
        }
    }
}

impl DualParams {
    pub fn loss(&self) -> DualLoss {
        self.loss
    }

    pub fn set_loss(&mut self, loss: DualLoss) {
        self.loss = loss;
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn set_cost(&mut self, cost: f64) -> Result<()> {
        if cost <= 0.0 {
            return Err(Error::parameter("cost must be positive"));
        }
        self.cost = cost;
        Ok(())
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn set_eps(&mut self, eps: f64) -> Result<()> {
        if eps <= 0.0 {
            return Err(Error::parameter("eps must be positive"));
        }
        self.eps = eps;
        Ok(())
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Value of the implicit bias feature; `0` disables the intercept
    pub fn set_bias(&mut self, bias: f64) -> Result<()> {
        if bias < 0.0 {
            return Err(Error::parameter("bias must be non-negative"));
        }
        self.bias = bias;
        Ok(())
    }

    pub fn negative_cost_ratio(&self) -> f64 {
        self.negative_cost_ratio
    }

    /// Scale the cost of negative instances in the SVM losses
    ///
    /// Values below one favor precision of the positive label.
    pub fn set_negative_cost_ratio(&mut self, ratio: f64) -> Result<()> {
        if ratio <= 0.0 {
            return Err(Error::parameter("negative_cost_ratio must be positive"));
        }
        self.negative_cost_ratio = ratio;
        Ok(())
    }

    /// Seed of the instance shuffles; `None` uses a fixed per-loss seed
    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

/// Result of one binary sub-problem
#[derive(Debug, Clone)]
pub struct DualSolution {
    /// Primal weights, one per feature; the bias weight is stored in row 0
    /// already multiplied by the bias value
    pub weights: Vec<f64>,
    /// Dual variable of each instance
    pub alphas: Vec<f64>,
    /// Box upper bound of each instance's dual variable
    pub upper_bounds: Vec<f64>,
    /// Number of passes over the instances
    pub iterations: usize,
    /// Final stopping statistic: the projected gradient spread for the SVM
    /// losses, the largest sub-problem gradient for logistic regression
    pub gap: f64,
    /// Whether the tolerance was reached before the pass limit
    pub converged: bool,
    /// Number of times the shrunk active set was restored to all instances
    pub resets: usize,
}

impl TrainingAlgorithm for DualCoordinateDescent {
    type Params = DualParams;

    fn solver(params: &Self::Params) -> Solver {
        params.loss.solver()
    }

    fn fit<M: LinearModel + ?Sized>(
        trainer: &Trainer<Self>,
        space: &TrainingSpace,
        model: &M,
    ) -> Result<Vec<f64>> {
        let num_features = model.num_features();
        let num_labels = model.num_labels();

        if num_labels == 2 {
            return Ok(trainer.solve_label(space, 0, num_features).weights);
        }

        let mut values = vec![0.0; num_features * num_labels];
        for label in 0..num_labels {
            let solution = trainer.solve_label(space, label as u32, num_features);
            for (feature, w) in solution.weights.into_iter().enumerate() {
                values[feature * num_labels + label] = w;
            }
        }
        Ok(values)
    }
}

impl Trainer<DualCoordinateDescent> {
    /// Solve the one-vs-rest sub-problem of `label` over `num_features` rows
    ///
    /// Instances of `label` are positive, all others negative. Returns
    /// [`Error::InvalidInput`] when a feature id of `space` lies outside
    /// `1..num_features`.
    pub fn solve(
        &self,
        space: &TrainingSpace,
        label: u32,
        num_features: usize,
    ) -> Result<DualSolution> {
        space.check_features(num_features)?;
        Ok(self.solve_label(space, label, num_features))
    }

    fn solve_label(&self, space: &TrainingSpace, label: u32, num_features: usize) -> DualSolution {
        let ys: Vec<f64> = space
            .labels()
            .iter()
            .map(|&y| if y == label { 1.0 } else { -1.0 })
            .collect();
        let solution = match self.params.loss {
            DualLoss::Logistic => self.solve_logistic(space, &ys, num_features),
            _ => self.solve_svm(space, &ys, num_features),
        };
        if !solution.converged {
            warn!(
                label,
                iterations = solution.iterations,
                gap = solution.gap,
                "dual coordinate descent reached the iteration limit"
            );
        }
        solution
    }

    fn rng(&self) -> StdRng {
        let seed = self
            .params
            .shuffle_seed
            .unwrap_or_else(|| self.params.loss.default_seed());
        StdRng::seed_from_u64(seed)
    }

    fn solve_svm(&self, space: &TrainingSpace, ys: &[f64], num_features: usize) -> DualSolution {
        let params = &self.params;
        let bias = params.bias;
        let n = space.len();
        let mut rng = self.rng();

        let (diag, upper) = match params.loss {
            DualLoss::L1Hinge => (0.0, params.cost),
            _ => (0.5 / params.cost, f64::INFINITY),
        };
        let upper_bounds: Vec<f64> = ys
            .iter()
            .map(|&y| {
                if y < 0.0 {
                    upper * params.negative_cost_ratio
                } else {
                    upper
                }
            })
            .collect();
        let qd: Vec<f64> = (0..n)
            .map(|i| diag + bias * bias + space.vector(i).squared_norm())
            .collect();

        let mut alpha = vec![0.0; n];
        let mut weight = vec![0.0; num_features];
        // instances without any feature cannot move the weights
        let mut index: Vec<usize> = (0..n).filter(|&i| qd[i] > 0.0).collect();
        let total = index.len();
        let mut active = total;

        let mut pg_max_old = f64::INFINITY;
        let mut pg_min_old = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut gap = f64::INFINITY;
        let mut converged = false;
        let mut resets = 0;

        while iterations < MAX_ITER {
            let mut pg_max_new = f64::NEG_INFINITY;
            let mut pg_min_new = f64::INFINITY;
            index[..active].shuffle(&mut rng);

            let mut s = 0;
            while s < active {
                let i = index[s];
                let yi = ys[i];
                let x = space.vector(i);
                let u = upper_bounds[i];
                let g = yi * (dot(&weight, x) + weight[0] * bias) - 1.0 + alpha[i] * diag;

                let pg = if alpha[i] == 0.0 {
                    if g > pg_max_old {
                        active -= 1;
                        index.swap(s, active);
                        continue;
                    }
                    g.min(0.0)
                } else if alpha[i] == u {
                    if g < pg_min_old {
                        active -= 1;
                        index.swap(s, active);
                        continue;
                    }
                    g.max(0.0)
                } else {
                    g
                };

                pg_max_new = pg_max_new.max(pg);
                pg_min_new = pg_min_new.min(pg);

                if pg.abs() > 1.0e-12 {
                    let alpha_old = alpha[i];
                    alpha[i] = (alpha[i] - g / qd[i]).max(0.0).min(u);
                    let delta = (alpha[i] - alpha_old) * yi;
                    weight[0] += delta * bias;
                    axpy(&mut weight, delta, x);
                }
                s += 1;
            }

            iterations += 1;
            gap = pg_max_new - pg_min_new;
            if gap <= params.eps {
                if active == total {
                    converged = true;
                    break;
                }
                debug!(iterations, active, "resetting shrunk active set");
                resets += 1;
                active = total;
                pg_max_old = f64::INFINITY;
                pg_min_old = f64::NEG_INFINITY;
                continue;
            }

            pg_max_old = if pg_max_new <= 0.0 {
                f64::INFINITY
            } else {
                pg_max_new
            };
            pg_min_old = if pg_min_new >= 0.0 {
                f64::NEG_INFINITY
            } else {
                pg_min_new
            };
        }

        let support_vectors = alpha.iter().filter(|&&a| a > 0.0).count();
        info!(
            loss = ?params.loss,
            iterations,
            resets,
            support_vectors,
            "dual coordinate descent finished"
        );

        weight[0] *= bias;
        DualSolution {
            weights: weight,
            alphas: alpha,
            upper_bounds,
            iterations,
            gap,
            converged,
            resets,
        }
    }

    fn solve_logistic(
        &self,
        space: &TrainingSpace,
        ys: &[f64],
        num_features: usize,
    ) -> DualSolution {
        const ETA: f64 = 0.1;

        let params = &self.params;
        let bias = params.bias;
        let c = params.cost;
        let n = space.len();
        let mut rng = self.rng();

        let inner_eps_min = params.eps.min(1e-8);
        let mut inner_eps = 1e-2;

        let mut xtx = vec![0.0; n];
        let mut alpha = vec![0.0; 2 * n];
        let mut weight = vec![0.0; num_features];

        // each instance carries a pair of duals summing to C
        for i in 0..n {
            let x = space.vector(i);
            alpha[2 * i] = (0.001 * c).min(1e-8);
            alpha[2 * i + 1] = c - alpha[2 * i];
            xtx[i] = bias * bias + x.squared_norm();

            let d = ys[i] * alpha[2 * i];
            weight[0] += d * bias;
            axpy(&mut weight, d, x);
        }

        let mut index: Vec<usize> = (0..n).collect();
        let mut iterations = 0;
        let mut gmax = f64::INFINITY;
        let mut converged = false;

        while iterations < MAX_ITER {
            index.shuffle(&mut rng);
            let mut newton_iters = 0;
            gmax = 0.0;

            for &i in &index {
                let yi = ys[i];
                let x = space.vector(i);
                let a = xtx[i];
                let b = yi * (dot(&weight, x) + weight[0] * bias);

                // minimize g1(z) or g2(z), whichever keeps z away from C
                let upper_side = 0.5 * a * (alpha[2 * i + 1] - alpha[2 * i]) + b < 0.0;
                let (ind1, ind2, sign) = if upper_side {
                    (2 * i + 1, 2 * i, -1.0)
                } else {
                    (2 * i, 2 * i + 1, 1.0)
                };

                let alpha_old = alpha[ind1];
                let mut z = alpha_old;
                if c - z < 0.5 * c {
                    z *= 0.1;
                }
                let mut gp = a * (z - alpha_old) + sign * b + (z / (c - z)).ln();
                gmax = gmax.max(gp.abs());

                let mut inner = 0;
                while inner < MAX_ITER_NEWTON && gp.abs() >= inner_eps {
                    let gpp = a + c / (c - z) / z;
                    let tmpz = z - gp / gpp;
                    z = if tmpz <= 0.0 { z * ETA } else { tmpz };
                    gp = a * (z - alpha_old) + sign * b + (z / (c - z)).ln();
                    inner += 1;
                }
                newton_iters += inner;

                if inner > 0 {
                    alpha[ind1] = z;
                    alpha[ind2] = c - z;
                    let delta = sign * (z - alpha_old) * yi;
                    weight[0] += delta * bias;
                    axpy(&mut weight, delta, x);
                }
            }

            iterations += 1;
            if gmax < params.eps {
                converged = true;
                break;
            }
            if newton_iters <= n / 10 {
                inner_eps = inner_eps_min.max(0.1 * inner_eps);
            }
        }

        let mut objective = 0.5 * weight.iter().map(|w| w * w).sum::<f64>();
        for i in 0..n {
            let (a1, a2) = (alpha[2 * i], alpha[2 * i + 1]);
            objective += a1 * a1.ln() + a2 * a2.ln() - c * c.ln();
        }
        info!(iterations, objective, "dual logistic regression finished");

        weight[0] *= bias;
        DualSolution {
            weights: weight,
            alphas: (0..n).map(|i| alpha[2 * i]).collect(),
            upper_bounds: vec![c; n],
            iterations,
            gap: gmax,
            converged,
            resets: 0,
        }
    }
}

#[inline]
fn dot(weight: &[f64], x: &SparseVector) -> f64 {
    x.iter().map(|(id, v)| weight[id as usize] * v).sum()
}

#[inline]
fn axpy(weight: &mut [f64], a: f64, x: &SparseVector) {
    for (id, v) in x.iter() {
        weight[id as usize] += a * v;
    }
}
