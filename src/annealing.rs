use crate::constraint_set::ConstraintSet;
use crate::error::Error;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use std::time::{Duration, Instant};

/// Schedule parameters of the simulated annealing search.
///
/// All values must be positive and `cooling_factor` must lie in `(0, 1)`.
#[derive(Debug, Clone, Copy)]
pub struct AnnealingConfig {
    pub temperature: f64,
    pub scaling_factor: f64,
    pub cooling_factor: f64,
    pub min_temperature: f64,
    /// Compute the per-constraint swap deltas on the rayon pool. Must not
    /// change results; both paths produce bit-identical run counts.
    pub parallel: bool,
    pub seed: Option<u64>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            temperature: 1e6,
            scaling_factor: 1.0,
            cooling_factor: 0.99999,
            min_temperature: 1e-6,
            parallel: false,
            seed: None,
        }
    }
}

/// Simulated-annealing search for a vertex permutation minimizing the total
/// number of runs of consecutive ones in the constraint bit-matrix.
///
/// The matrix is stored row-per-permutation-position so that swapping two
/// positions swaps two row vectors instead of rewriting cells. Per-column run
/// counts are cached; a trial swap touches at most four cells per column.
pub struct Annealing {
    no_vertices: usize,
    no_constraints: usize,
    // bin_matrix[position][constraint]
    bin_matrix: Vec<Vec<u8>>,
    permutation: Vec<usize>,
    best_permutation: Vec<usize>,
    block_counts: Vec<i64>,
    next_block_counts: Vec<i64>,
    cur_cost: i64,
    next_cost: i64,
    best_cost: i64,
    temperature: f64,
    scaling_factor: f64,
    cooling_factor: f64,
    min_temperature: f64,
    cur_iter: u64,
    parallel: bool,
    rng: SmallRng,
}

impl Annealing {
    pub fn new(
        no_vertices: usize,
        constraint_sets: &[ConstraintSet],
        config: AnnealingConfig,
    ) -> Result<Self, Error> {
        Self::with_initial_permutation(
            (0..no_vertices).collect(),
            constraint_sets,
            config,
        )
    }

    /// Starts the search from a previously computed permutation instead of
    /// the identity.
    pub fn with_initial_permutation(
        permutation: Vec<usize>,
        constraint_sets: &[ConstraintSet],
        config: AnnealingConfig,
    ) -> Result<Self, Error> {
        if config.temperature <= 0.0
            || config.scaling_factor <= 0.0
            || config.min_temperature <= 0.0
            || !(0.0..1.0).contains(&config.cooling_factor)
            || config.cooling_factor <= 0.0
        {
            return Err(Error::Unsupported(
                "annealing schedule parameters must be positive with cooling in (0, 1)".into(),
            ));
        }

        let no_vertices = permutation.len();
        let no_constraints = constraint_sets.len();
        if no_vertices < 2 {
            return Err(Error::Unsupported(
                "annealing needs at least two vertices to swap".into(),
            ));
        }

        let mut position_of = vec![usize::MAX; no_vertices];
        for (position, &vid) in permutation.iter().enumerate() {
            if vid >= no_vertices || position_of[vid] != usize::MAX {
                return Err(Error::Mismatch("initial permutation is not a bijection".into()));
            }
            position_of[vid] = position;
        }

        let mut bin_matrix = vec![vec![0u8; no_constraints]; no_vertices];
        for (i, constraint) in constraint_sets.iter().enumerate() {
            for &vid in &constraint.vertices {
                bin_matrix[position_of[vid]][i] = 1;
            }
        }

        let block_counts: Vec<i64> = (0..no_constraints)
            .map(|i| column_run_count(&bin_matrix, i))
            .collect();
        let cur_cost = block_counts.iter().sum();

        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Ok(Self {
            no_vertices,
            no_constraints,
            bin_matrix,
            best_permutation: permutation.clone(),
            permutation,
            next_block_counts: vec![0; no_constraints],
            block_counts,
            cur_cost,
            next_cost: cur_cost,
            best_cost: cur_cost,
            temperature: config.temperature,
            scaling_factor: config.scaling_factor,
            cooling_factor: config.cooling_factor,
            min_temperature: config.min_temperature,
            cur_iter: 0,
            parallel: config.parallel,
            rng,
        })
    }

    /// Applies the swap of positions `v1` and `v2` and computes the trial
    /// cost by recounting every column from scratch.
    fn step_naive(&mut self, v1: usize, v2: usize) {
        self.bin_matrix.swap(v1, v2);
        self.permutation.swap(v1, v2);

        for i in 0..self.no_constraints {
            self.next_block_counts[i] = column_run_count(&self.bin_matrix, i);
        }
        self.next_cost = self.next_block_counts.iter().sum();
    }

    /// Like [`step`](Self::step), with the boundary cases spelled out.
    #[allow(dead_code)]
    fn step_unrolled(&mut self, v1: usize, v2: usize) {
        let last = self.no_vertices - 1;

        for i in 0..self.no_constraints {
            let m = &self.bin_matrix;
            if m[v1][i] == m[v2][i] {
                self.next_block_counts[i] = self.block_counts[i];
                continue;
            }

            let s = v1.min(v2);
            let b = v1.max(v2);

            let delta = if b == s + 1 {
                // adjacent swap: only the outer neighbors matter
                let above = if s > 0 { m[s - 1][i] } else { 0 };
                let below = if b < last { m[b + 1][i] } else { 0 };
                match (m[s][i], above, below) {
                    (0, _, _) if above == below => 0,
                    (0, 1, 0) => -1,
                    (0, 0, 1) => 1,
                    (1, _, _) if above == below => 0,
                    (1, 1, 0) => 1,
                    (1, 0, 1) => -1,
                    _ => unreachable!(),
                }
            } else {
                let mut delta = 0;
                // the cell at s flips to the value of b and vice versa
                for (row, other) in [(s, b), (b, s)] {
                    let above = if row > 0 { m[row - 1][i] } else { 0 };
                    let below = if row < last { m[row + 1][i] } else { 0 };
                    if m[other][i] == 1 {
                        // a one appears at `row`
                        delta += match (above, below) {
                            (0, 0) => 1,
                            (1, 1) => -1,
                            _ => 0,
                        };
                    } else {
                        // a one disappears from `row`
                        delta += match (above, below) {
                            (0, 0) => -1,
                            (1, 1) => 1,
                            _ => 0,
                        };
                    }
                }
                delta
            };

            self.next_block_counts[i] = self.block_counts[i] + delta;
        }

        self.next_cost = self.next_block_counts.iter().sum();
        self.bin_matrix.swap(v1, v2);
        self.permutation.swap(v1, v2);
    }

    /// The compact arithmetic form of the trial swap, `O(no_constraints)`.
    fn step(&mut self, v1: usize, v2: usize) {
        let s = v1.min(v2);
        let b = v1.max(v2);
        let non_adjacent = b != s + 1;
        let last = self.no_vertices - 1;

        let matrix = &self.bin_matrix;
        let block_counts = &self.block_counts;

        let delta_for_column = |i: usize| -> i64 {
            if matrix[v1][i] == matrix[v2][i] {
                return 0;
            }
            let vs = matrix[s][i];
            let a0 = if s > 0 { matrix[s - 1][i] as i64 } else { 0 };
            let a1 = if non_adjacent { matrix[s + 1][i] as i64 } else { 0 };
            let a2 = if non_adjacent { matrix[b - 1][i] as i64 } else { 0 };
            let a3 = if b < last { matrix[b + 1][i] as i64 } else { 0 };
            let sign = if vs == 1 { -1 } else { 1 };
            sign * ((a3 + a2) - (a1 + a0))
        };

        if self.parallel {
            self.next_block_counts
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, next)| *next = block_counts[i] + delta_for_column(i));
            self.next_cost = self.next_block_counts.iter().sum();
        } else {
            let mut next_cost = self.cur_cost;
            for i in 0..self.no_constraints {
                let delta = delta_for_column(i);
                self.next_block_counts[i] = block_counts[i] + delta;
                next_cost += delta;
            }
            self.next_cost = next_cost;
        }

        self.bin_matrix.swap(v1, v2);
        self.permutation.swap(v1, v2);
    }

    fn accept(&mut self) {
        self.cur_cost = self.next_cost;
        std::mem::swap(&mut self.block_counts, &mut self.next_block_counts);
    }

    fn reject(&mut self, v1: usize, v2: usize) {
        self.bin_matrix.swap(v1, v2);
        self.permutation.swap(v1, v2);
    }

    /// One annealing iteration: sample a swap, accept with the Metropolis
    /// rule, track the best permutation, cool down.
    pub fn iterate(&mut self) {
        let v1 = self.rng.random_range(0..self.no_vertices);
        let mut v2 = self.rng.random_range(0..self.no_vertices);
        while v1 == v2 {
            v2 = self.rng.random_range(0..self.no_vertices);
        }

        self.step(v1, v2);

        let acceptance_prob = if self.next_cost < self.cur_cost {
            1.0
        } else {
            ((self.cur_cost - self.next_cost) as f64 / (self.temperature * self.scaling_factor))
                .exp()
        };

        if acceptance_prob < self.rng.random::<f64>() {
            self.reject(v1, v2);
        } else {
            self.accept();
        }

        if self.cur_cost < self.best_cost {
            self.best_cost = self.cur_cost;
            self.best_permutation.copy_from_slice(&self.permutation);
        }

        self.temperature *= self.cooling_factor;
        self.cur_iter += 1;
    }

    pub fn has_more(&self) -> bool {
        self.temperature >= self.min_temperature
    }

    /// Runs until the temperature drops below the minimum.
    pub fn run_until_cooled(&mut self) {
        while self.has_more() {
            self.iterate();
        }
    }

    /// Runs until the temperature floor or the deadline, whichever comes
    /// first. The clock is sampled once per iteration; there is no forced
    /// interruption. Progress is logged every `update_interval`.
    pub fn run_for(&mut self, deadline: Duration, update_interval: Option<Duration>) {
        let start = Instant::now();
        let mut last_update = start;

        while self.has_more() && start.elapsed() < deadline {
            self.iterate();

            if let Some(interval) = update_interval {
                if last_update.elapsed() >= interval {
                    log::info!(
                        "iteration {}: best cost {}, current cost {}, temperature {:.6}",
                        self.cur_iter,
                        self.best_cost,
                        self.cur_cost,
                        self.temperature
                    );
                    last_update = Instant::now();
                }
            }
        }
    }

    pub fn current_cost(&self) -> i64 {
        self.cur_cost
    }

    pub fn best_cost(&self) -> i64 {
        self.best_cost
    }

    pub fn best_permutation(&self) -> &[usize] {
        &self.best_permutation
    }

    pub fn iterations(&self) -> u64 {
        self.cur_iter
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    #[cfg(test)]
    fn state_fingerprint(&self) -> (i64, Vec<i64>, Vec<usize>) {
        (self.cur_cost, self.block_counts.clone(), self.permutation.clone())
    }
}

fn column_run_count(bin_matrix: &[Vec<u8>], column: usize) -> i64 {
    let mut runs = 0;
    let mut in_run = false;
    for row in bin_matrix {
        if row[column] == 1 {
            if !in_run {
                runs += 1;
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config_with_seed(seed: u64) -> AnnealingConfig {
        AnnealingConfig {
            seed: Some(seed),
            ..AnnealingConfig::default()
        }
    }

    fn random_instance(
        rng: &mut ChaCha8Rng,
        no_vertices: usize,
        no_constraints: usize,
    ) -> Vec<ConstraintSet> {
        (0..no_constraints)
            .map(|i| {
                let vertices = (0..no_vertices)
                    .filter(|_| rng.random::<f64>() < 0.4)
                    .collect();
                ConstraintSet {
                    prefix: vec![b'A' + (i % 4) as u8],
                    vertices,
                }
            })
            .collect()
    }

    #[test]
    fn initial_cost_counts_runs() {
        let constraints = vec![
            ConstraintSet {
                prefix: b"A".to_vec(),
                vertices: vec![0, 1, 3],
            },
            ConstraintSet {
                prefix: b"C".to_vec(),
                vertices: vec![2],
            },
        ];

        let annealing = Annealing::new(4, &constraints, config_with_seed(0)).unwrap();
        // column A: rows 1101 -> 2 runs, column C: rows 0010 -> 1 run
        assert_eq!(annealing.current_cost(), 3);
    }

    proptest! {
        #[test]
        fn swap_delta_forms_agree(seed in any::<u64>(), no_vertices in 2usize..12, no_constraints in 1usize..10) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let constraints = random_instance(&mut rng, no_vertices, no_constraints);

            for v1 in 0..no_vertices {
                for v2 in 0..no_vertices {
                    if v1 == v2 {
                        continue;
                    }

                    let mut compact =
                        Annealing::new(no_vertices, &constraints, config_with_seed(seed)).unwrap();
                    let mut naive =
                        Annealing::new(no_vertices, &constraints, config_with_seed(seed)).unwrap();
                    let mut unrolled =
                        Annealing::new(no_vertices, &constraints, config_with_seed(seed)).unwrap();

                    compact.step(v1, v2);
                    naive.step_naive(v1, v2);
                    unrolled.step_unrolled(v1, v2);

                    prop_assert_eq!(compact.next_cost, naive.next_cost);
                    prop_assert_eq!(&compact.next_block_counts, &naive.next_block_counts);
                    prop_assert_eq!(unrolled.next_cost, naive.next_cost);
                    prop_assert_eq!(&unrolled.next_block_counts, &naive.next_block_counts);
                }
            }
        }
    }

    #[test]
    fn best_cost_is_monotonically_non_increasing() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let constraints = random_instance(&mut rng, 20, 12);
        let mut annealing = Annealing::new(20, &constraints, config_with_seed(7)).unwrap();

        let mut previous_best = annealing.best_cost();
        for _ in 0..2000 {
            annealing.iterate();
            assert!(annealing.best_cost() <= previous_best);
            assert!(annealing.best_cost() <= annealing.current_cost());
            previous_best = annealing.best_cost();
        }
    }

    #[test]
    fn parallel_and_sequential_paths_are_bit_identical() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let constraints = random_instance(&mut rng, 16, 10);

        let mut sequential = Annealing::new(16, &constraints, config_with_seed(42)).unwrap();
        let mut parallel = Annealing::new(
            16,
            &constraints,
            AnnealingConfig {
                parallel: true,
                ..config_with_seed(42)
            },
        )
        .unwrap();

        for _ in 0..500 {
            sequential.iterate();
            parallel.iterate();
        }

        assert_eq!(sequential.state_fingerprint(), parallel.state_fingerprint());
        assert_eq!(sequential.best_cost(), parallel.best_cost());
        assert_eq!(sequential.best_permutation(), parallel.best_permutation());
    }

    #[test]
    fn deadline_variant_stops_and_keeps_best() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let constraints = random_instance(&mut rng, 12, 8);
        let mut annealing = Annealing::new(12, &constraints, config_with_seed(1)).unwrap();
        let initial_cost = annealing.current_cost();

        annealing.run_for(Duration::from_millis(50), None);

        assert!(annealing.iterations() > 0);
        assert!(annealing.best_cost() <= initial_cost);
        assert_eq!(annealing.best_permutation().len(), 12);
    }

    #[test]
    fn rejects_bad_schedule_and_bad_permutation() {
        let constraints = vec![ConstraintSet {
            prefix: b"A".to_vec(),
            vertices: vec![0],
        }];

        let bad_config = AnnealingConfig {
            cooling_factor: 1.5,
            ..AnnealingConfig::default()
        };
        assert!(Annealing::new(2, &constraints, bad_config).is_err());

        let result =
            Annealing::with_initial_permutation(vec![0, 0], &constraints, AnnealingConfig::default());
        assert!(result.is_err());
    }
}
