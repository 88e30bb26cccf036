//! Actions and action generators
//!
//! An action is one local mutation of a snapshot. Generators propose a
//! single action from the current snapshot and a random source; the
//! optimizer mixes them by configured weight.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use regionbalancer_core::{BalancerError, Result};

use crate::cluster::ClusterSnapshot;
use crate::config::BalancerConfig;

/// A reversible mutation of a cluster snapshot
///
/// Regions and servers are snapshot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No legal mutation was found
    Null,
    /// Move `region` from `from` to `to`
    Move {
        region: usize,
        from: usize,
        to: usize,
    },
    /// Exchange `region_a` on `server_a` with `region_b` on `server_b`
    Swap {
        region_a: usize,
        server_a: usize,
        region_b: usize,
        server_b: usize,
    },
}

impl Action {
    /// The two servers whose contents change
    pub fn servers(&self) -> Option<[usize; 2]> {
        match *self {
            Action::Null => None,
            Action::Move { from, to, .. } => Some([from, to]),
            Action::Swap {
                server_a, server_b, ..
            } => Some([server_a, server_b]),
        }
    }

    /// The regions that change server
    pub fn regions(&self) -> [Option<usize>; 2] {
        match *self {
            Action::Null => [None, None],
            Action::Move { region, .. } => [Some(region), None],
            Action::Swap {
                region_a, region_b, ..
            } => [Some(region_a), Some(region_b)],
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Action::Null)
    }
}

/// Proposes one action per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionGenerator {
    /// Random region from a random above-average server to a random other server
    RandomMove,
    /// Random regions exchanged between two random servers
    RandomSwap,
    /// Random region from the most loaded server to the least loaded one
    LoadMove,
}

impl ActionGenerator {
    pub fn name(&self) -> &'static str {
        match self {
            ActionGenerator::RandomMove => "random_move",
            ActionGenerator::RandomSwap => "random_swap",
            ActionGenerator::LoadMove => "load_move",
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, snapshot: &ClusterSnapshot, rng: &mut R) -> Action {
        if snapshot.server_count() < 2 {
            return Action::Null;
        }
        match self {
            ActionGenerator::RandomMove => random_move(snapshot, rng),
            ActionGenerator::RandomSwap => random_swap(snapshot, rng),
            ActionGenerator::LoadMove => load_move(snapshot, rng),
        }
    }
}

fn random_move<R: Rng + ?Sized>(snapshot: &ClusterSnapshot, rng: &mut R) -> Action {
    let n = snapshot.server_count();
    let average = snapshot.average();
    let above = (0..n)
        .filter(|&s| snapshot.region_count(s) as f64 > average)
        .count();

    let from = if above == 0 {
        rng.gen_range(0..n)
    } else {
        let pick = rng.gen_range(0..above);
        match (0..n)
            .filter(|&s| snapshot.region_count(s) as f64 > average)
            .nth(pick)
        {
            Some(s) => s,
            None => return Action::Null,
        }
    };

    let Some(region) = random_region(snapshot, from, rng) else {
        return Action::Null;
    };
    let to = other_server(n, from, rng);

    Action::Move { region, from, to }
}

fn random_swap<R: Rng + ?Sized>(snapshot: &ClusterSnapshot, rng: &mut R) -> Action {
    let n = snapshot.server_count();
    let server_a = rng.gen_range(0..n);
    let server_b = other_server(n, server_a, rng);

    match (
        random_region(snapshot, server_a, rng),
        random_region(snapshot, server_b, rng),
    ) {
        (Some(region_a), Some(region_b)) => Action::Swap {
            region_a,
            server_a,
            region_b,
            server_b,
        },
        _ => Action::Null,
    }
}

fn load_move<R: Rng + ?Sized>(snapshot: &ClusterSnapshot, rng: &mut R) -> Action {
    let n = snapshot.server_count();
    let (mut most, mut least) = (0, 0);
    let (mut most_ties, mut least_ties) = (0u32, 0u32);

    // Reservoir sampling breaks ties uniformly
    for s in 0..n {
        let count = snapshot.region_count(s);
        match count.cmp(&snapshot.region_count(most)) {
            std::cmp::Ordering::Greater => {
                most = s;
                most_ties = 1;
            }
            std::cmp::Ordering::Equal => {
                most_ties += 1;
                if rng.gen_range(0..most_ties) == 0 {
                    most = s;
                }
            }
            std::cmp::Ordering::Less => {}
        }
        match count.cmp(&snapshot.region_count(least)) {
            std::cmp::Ordering::Less => {
                least = s;
                least_ties = 1;
            }
            std::cmp::Ordering::Equal => {
                least_ties += 1;
                if rng.gen_range(0..least_ties) == 0 {
                    least = s;
                }
            }
            std::cmp::Ordering::Greater => {}
        }
    }

    if snapshot.region_count(most) <= snapshot.region_count(least) + 1 {
        return Action::Null;
    }

    match random_region(snapshot, most, rng) {
        Some(region) => Action::Move {
            region,
            from: most,
            to: least,
        },
        None => Action::Null,
    }
}

fn random_region<R: Rng + ?Sized>(
    snapshot: &ClusterSnapshot,
    server: usize,
    rng: &mut R,
) -> Option<usize> {
    let regions = snapshot.regions_on(server);
    if regions.is_empty() {
        None
    } else {
        Some(regions[rng.gen_range(0..regions.len())])
    }
}

/// Uniform server index in `0..n` other than `exclude` (requires `n >= 2`)
fn other_server<R: Rng + ?Sized>(n: usize, exclude: usize, rng: &mut R) -> usize {
    let pick = rng.gen_range(0..n - 1);
    if pick >= exclude {
        pick + 1
    } else {
        pick
    }
}

/// Weighted choice among the enabled generators
#[derive(Debug, Clone)]
pub struct GeneratorMix {
    generators: Vec<ActionGenerator>,
    weights: WeightedIndex<u32>,
}

impl GeneratorMix {
    pub fn from_config(config: &BalancerConfig) -> Result<Self> {
        let candidates = [
            (ActionGenerator::RandomMove, config.random_move_weight),
            (ActionGenerator::RandomSwap, config.random_swap_weight),
            (ActionGenerator::LoadMove, config.load_move_weight),
        ];
        let (generators, weights): (Vec<_>, Vec<_>) =
            candidates.into_iter().filter(|(_, w)| *w > 0).unzip();

        let weights = WeightedIndex::new(weights).map_err(|e| {
            BalancerError::InvalidConfig(format!("action generator weights: {}", e))
        })?;

        Ok(Self {
            generators,
            weights,
        })
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionGenerator {
        self.generators[self.weights.sample(rng)]
    }

    pub fn generators(&self) -> &[ActionGenerator] {
        &self.generators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regionbalancer_core::{ClusterState, RegionInfo, ServerName};

    fn cluster(counts: &[usize]) -> ClusterSnapshot {
        let mut state = ClusterState::new();
        let mut id = 0u64;
        for (i, &count) in counts.iter().enumerate() {
            let regions = (0..count)
                .map(|_| {
                    id += 1;
                    RegionInfo::new("t", id.to_be_bytes().to_vec(), Vec::<u8>::new(), id)
                })
                .collect();
            state = state.with_server(ServerName::new(format!("rs{:02}", i), 16020, 1), regions);
        }
        ClusterSnapshot::new(&state).unwrap()
    }

    #[test]
    fn test_single_server_yields_null() {
        let snapshot = cluster(&[10]);
        let mut rng = StdRng::seed_from_u64(1);
        for generator in [
            ActionGenerator::RandomMove,
            ActionGenerator::RandomSwap,
            ActionGenerator::LoadMove,
        ] {
            assert_eq!(generator.generate(&snapshot, &mut rng), Action::Null);
        }
    }

    #[test]
    fn test_random_move_prefers_above_average() {
        let snapshot = cluster(&[1, 1, 8, 1]);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            match ActionGenerator::RandomMove.generate(&snapshot, &mut rng) {
                Action::Move { region, from, to } => {
                    assert_eq!(from, 2);
                    assert_ne!(to, 2);
                    assert_eq!(snapshot.server_of(region), 2);
                }
                other => panic!("unexpected action {:?}", other),
            }
        }
    }

    #[test]
    fn test_random_swap_is_legal() {
        let snapshot = cluster(&[3, 0, 4, 2]);
        let mut rng = StdRng::seed_from_u64(7);

        let mut swaps = 0;
        for _ in 0..200 {
            let action = ActionGenerator::RandomSwap.generate(&snapshot, &mut rng);
            assert!(snapshot.is_legal(&action));
            if let Action::Swap {
                server_a, server_b, ..
            } = action
            {
                assert_ne!(server_a, server_b);
                swaps += 1;
            }
        }
        assert!(swaps > 0);
    }

    #[test]
    fn test_load_move_targets_extremes() {
        let snapshot = cluster(&[2, 9, 0, 4]);
        let mut rng = StdRng::seed_from_u64(3);

        let action = ActionGenerator::LoadMove.generate(&snapshot, &mut rng);
        match action {
            Action::Move { from, to, .. } => {
                assert_eq!(from, 1);
                assert_eq!(to, 2);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_load_move_on_balanced_cluster() {
        let snapshot = cluster(&[3, 4, 3, 4]);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            ActionGenerator::LoadMove.generate(&snapshot, &mut rng),
            Action::Null
        );
    }

    #[test]
    fn test_generator_mix_skips_zero_weights() {
        let config = BalancerConfig {
            random_move_weight: 0,
            random_swap_weight: 0,
            load_move_weight: 3,
            ..Default::default()
        };
        let mix = GeneratorMix::from_config(&config).unwrap();
        assert_eq!(mix.generators(), &[ActionGenerator::LoadMove]);

        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(mix.pick(&mut rng), ActionGenerator::LoadMove);
    }
}
