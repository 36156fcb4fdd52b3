//! # Random Knapsack Streams
//!
//! Seeded generation of Pisinger style knapsack instances, e.g., as fixtures
//! for stream conversion.

use std::ops::RangeInclusive;

use ilpconv::instances::fio::pisinger::{Item, Knapsack};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// How to determine the knapsack capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// A fixed knapsack capacity
    Fixed(i64),
    /// Calculate the capacity as the total weight divided by the given value
    FractionTotalWeight(i64),
}

/// Parameters of the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    /// The number of items per instance
    pub n_items: usize,
    /// Range of the item profits
    pub profit_range: RangeInclusive<i64>,
    /// Range of the item weights
    pub weight_range: RangeInclusive<i64>,
    /// The capacity rule
    pub capacity: Capacity,
    /// Prefix of the instance names
    pub prefix: String,
}

impl Default for Generator {
    fn default() -> Self {
        Generator {
            n_items: 20,
            profit_range: 1..=40,
            weight_range: 1..=40,
            capacity: Capacity::FractionTotalWeight(2),
            prefix: String::from("knap"),
        }
    }
}

impl Generator {
    /// Generates `n_instances` knapsacks named `<prefix><i>`. The same seed
    /// always yields the same instances.
    #[must_use]
    pub fn generate(&self, n_instances: usize, seed: u64) -> Vec<Knapsack> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (1..=n_instances)
            .map(|idx| {
                let items: Vec<_> = (0..self.n_items)
                    .map(|_| Item {
                        profit: rng.random_range(self.profit_range.clone()),
                        weight: rng.random_range(self.weight_range.clone()),
                    })
                    .collect();
                let capacity = match self.capacity {
                    Capacity::Fixed(cap) => cap,
                    Capacity::FractionTotalWeight(div) => {
                        items.iter().map(|item| item.weight).sum::<i64>() / div
                    }
                };
                Knapsack {
                    name: format!("{}{idx}", self.prefix),
                    capacity,
                    items,
                }
            })
            .collect()
    }
}
