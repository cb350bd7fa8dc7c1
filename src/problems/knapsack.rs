//! Knapsack benchmark instances and their random generators.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::SolverError;
use crate::domain::instance::Instance;
use crate::domain::model::{Constraint, Domain, LinExpr, Model, Sense};

/// One-dimensional 0-1 knapsack: maximize `sum(prices[i] * x[i])`
/// subject to `sum(weights[i] * x[i]) <= capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnapsackInstance {
    pub weights: Vec<f64>,
    pub prices: Vec<f64>,
    pub capacity: f64,
}

impl KnapsackInstance {
    pub fn new(weights: Vec<f64>, prices: Vec<f64>, capacity: f64) -> Self {
        KnapsackInstance {
            weights,
            prices,
            capacity,
        }
    }
}

impl Instance for KnapsackInstance {
    fn to_model(&self) -> Result<Model, SolverError> {
        if self.weights.len() != self.prices.len() {
            return Err(SolverError::model(
                "knapsack",
                format!(
                    "{} weights but {} prices",
                    self.weights.len(),
                    self.prices.len()
                ),
            ));
        }
        let mut model = Model::new();
        let x = model.add_var_group("x", 0..self.weights.len(), Domain::Binary, 0.0, 1.0)?;
        model.set_objective(
            Sense::Max,
            x.iter().zip(&self.prices).map(|(&v, &p)| (v, p)).collect(),
        )?;
        model.add_constraint(Constraint::le(
            "eq_capacity",
            x.iter().zip(&self.weights).map(|(&v, &w)| (v, w)).collect(),
            self.capacity,
        ))?;
        Ok(model)
    }

    fn name(&self) -> &str {
        "knapsack"
    }
}

/// Multidimensional 0-1 knapsack with `m` knapsacks and `n` items.
/// `weights[i][j]` is the space item `j` takes in knapsack `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiKnapsackInstance {
    pub prices: Vec<f64>,
    pub capacities: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
}

impl MultiKnapsackInstance {
    pub fn new(
        prices: Vec<f64>,
        capacities: Vec<f64>,
        weights: Vec<Vec<f64>>,
    ) -> Result<Self, SolverError> {
        let instance = MultiKnapsackInstance {
            prices,
            capacities,
            weights,
        };
        instance.check_shape()?;
        Ok(instance)
    }

    pub fn num_items(&self) -> usize {
        self.prices.len()
    }

    pub fn num_knapsacks(&self) -> usize {
        self.capacities.len()
    }

    fn check_shape(&self) -> Result<(), SolverError> {
        if self.weights.len() != self.capacities.len() {
            return Err(SolverError::model(
                "multi_knapsack",
                format!(
                    "{} weight rows but {} capacities",
                    self.weights.len(),
                    self.capacities.len()
                ),
            ));
        }
        if let Some((i, row)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.prices.len())
        {
            return Err(SolverError::model(
                "multi_knapsack",
                format!(
                    "weight row {} has {} entries but there are {} items",
                    i,
                    row.len(),
                    self.prices.len()
                ),
            ));
        }
        Ok(())
    }
}

impl Instance for MultiKnapsackInstance {
    fn to_model(&self) -> Result<Model, SolverError> {
        self.check_shape()?;
        let mut model = Model::new();
        let x = model.add_var_group("x", 0..self.num_items(), Domain::Binary, 0.0, 1.0)?;
        model.set_objective(
            Sense::Max,
            x.iter().zip(&self.prices).map(|(&v, &p)| (v, p)).collect(),
        )?;
        for (i, (row, &capacity)) in self.weights.iter().zip(&self.capacities).enumerate() {
            let expr: LinExpr = x.iter().zip(row).map(|(&v, &w)| (v, w)).collect();
            model.add_constraint(Constraint::le(format!("eq_capacity[{}]", i), expr, capacity))?;
        }
        Ok(model)
    }

    fn name(&self) -> &str {
        "multi_knapsack"
    }
}

/// Uniform distribution on `[loc, loc + scale)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousUniform {
    pub loc: f64,
    pub scale: f64,
}

impl ContinuousUniform {
    pub fn new(loc: f64, scale: f64) -> Self {
        ContinuousUniform { loc, scale }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        self.loc + self.scale * rng.gen::<f64>()
    }

    pub fn sample_n<R: Rng>(&self, rng: &mut R, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Uniform distribution on the integers `low..high`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteUniform {
    pub low: usize,
    pub high: usize,
}

impl DiscreteUniform {
    pub fn new(low: usize, high: usize) -> Self {
        DiscreteUniform { low, high }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        if self.high <= self.low + 1 {
            self.low
        } else {
            rng.gen_range(self.low..self.high)
        }
    }
}

/// Random multidimensional knapsack instances.
///
/// Prices are correlated with the average item weight:
/// `p[j] = sum(w[i][j] for i) / m + K * u[j]`, and capacities are a
/// fraction of the total weight: `b[i] = alpha[i] * sum(w[i][j] for j)`.
/// After [`fix_weights`](Self::fix_weights) the sizes, weights, `u` and `K`
/// stay fixed and only the jitter and `alpha` vary per instance.
#[derive(Debug, Clone)]
pub struct MultiKnapsackGenerator {
    pub n: DiscreteUniform,
    pub m: DiscreteUniform,
    pub w: ContinuousUniform,
    pub k: ContinuousUniform,
    pub u: ContinuousUniform,
    pub alpha: ContinuousUniform,
    pub w_jitter: ContinuousUniform,
    pub round: bool,
    fixed: Option<FixedDraw>,
}

#[derive(Debug, Clone)]
struct FixedDraw {
    n: usize,
    m: usize,
    w: Vec<Vec<f64>>,
    u: Vec<f64>,
    k: f64,
}

impl Default for MultiKnapsackGenerator {
    fn default() -> Self {
        MultiKnapsackGenerator {
            n: DiscreteUniform::new(100, 101),
            m: DiscreteUniform::new(30, 31),
            w: ContinuousUniform::new(0.0, 1000.0),
            k: ContinuousUniform::constant(500.0),
            u: ContinuousUniform::new(0.0, 1.0),
            alpha: ContinuousUniform::constant(0.25),
            w_jitter: ContinuousUniform::constant(1.0),
            round: true,
            fixed: None,
        }
    }
}

impl MultiKnapsackGenerator {
    /// Draw the weights once from `rng` and reuse them for every instance.
    pub fn fix_weights<R: Rng>(mut self, rng: &mut R) -> Self {
        let n = self.n.sample(rng);
        let m = self.m.sample(rng);
        let w = (0..m).map(|_| self.w.sample_n(rng, n)).collect();
        let u = self.u.sample_n(rng, n);
        let k = self.k.sample(rng);
        self.fixed = Some(FixedDraw { n, m, w, u, k });
        self
    }

    pub fn has_fixed_weights(&self) -> bool {
        self.fixed.is_some()
    }

    pub fn generate<R: Rng>(&self, rng: &mut R, n_samples: usize) -> Vec<MultiKnapsackInstance> {
        (0..n_samples).map(|_| self.sample(rng)).collect()
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> MultiKnapsackInstance {
        let (n, m, w, u, k) = match &self.fixed {
            Some(draw) => (draw.n, draw.m, draw.w.clone(), draw.u.clone(), draw.k),
            None => {
                let n = self.n.sample(rng);
                let m = self.m.sample(rng);
                let w: Vec<Vec<f64>> = (0..m).map(|_| self.w.sample_n(rng, n)).collect();
                let u = self.u.sample_n(rng, n);
                let k = self.k.sample(rng);
                (n, m, w, u, k)
            }
        };

        let mut weights: Vec<Vec<f64>> = w
            .into_iter()
            .map(|row| {
                let jitter = self.w_jitter.sample_n(rng, n);
                row.iter().zip(jitter).map(|(w, g)| w * g).collect()
            })
            .collect();
        let alpha = self.alpha.sample_n(rng, m);

        let mut prices: Vec<f64> = (0..n)
            .map(|j| weights.iter().map(|row| row[j]).sum::<f64>() / m as f64 + k * u[j])
            .collect();
        let mut capacities: Vec<f64> = weights
            .iter()
            .zip(&alpha)
            .map(|(row, a)| row.iter().sum::<f64>() * a)
            .collect();

        if self.round {
            prices.iter_mut().for_each(|v| *v = v.round_ties_even());
            capacities.iter_mut().for_each(|v| *v = v.round_ties_even());
            weights
                .iter_mut()
                .flatten()
                .for_each(|v| *v = v.round_ties_even());
        }

        MultiKnapsackInstance {
            prices,
            capacities,
            weights,
        }
    }
}

/// Benchmark set of 250 items and 10 knapsacks with fixed, jittered
/// weights. Each phase draws from its own seeded stream: the generator
/// from `seed`, the training set from `seed + 1` and the test set from
/// `seed + 2`.
pub struct ChallengeA {
    pub generator: MultiKnapsackGenerator,
    pub training_instances: Vec<MultiKnapsackInstance>,
    pub test_instances: Vec<MultiKnapsackInstance>,
}

impl Default for ChallengeA {
    fn default() -> Self {
        Self::new(42, 500, 50)
    }
}

impl ChallengeA {
    pub fn new(seed: u64, n_training_instances: usize, n_test_instances: usize) -> Self {
        let generator = MultiKnapsackGenerator {
            n: DiscreteUniform::new(250, 251),
            m: DiscreteUniform::new(10, 11),
            w: ContinuousUniform::new(0.0, 1000.0),
            k: ContinuousUniform::constant(500.0),
            u: ContinuousUniform::new(0.0, 1.0),
            alpha: ContinuousUniform::constant(0.25),
            w_jitter: ContinuousUniform::new(0.95, 0.1),
            round: true,
            fixed: None,
        }
        .fix_weights(&mut ChaCha8Rng::seed_from_u64(seed));

        let training_instances = generator.generate(
            &mut ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
            n_training_instances,
        );
        let test_instances = generator.generate(
            &mut ChaCha8Rng::seed_from_u64(seed.wrapping_add(2)),
            n_test_instances,
        );

        ChallengeA {
            generator,
            training_instances,
            test_instances,
        }
    }
}
