use crate::{
    Error,
    Result,
};
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeEntry {
    pub value: u64,
    pub label: String,
    pub weight: u32,
}

impl PrizeEntry {
    pub fn new(value: u64, label: impl Into<String>, weight: u32) -> Self {
        Self {
            value,
            label: label.into(),
            weight,
        }
    }
}

/// Produces the uniform random value a draw resolves against.
pub trait RollSource {
    /// Return a value in `1..=total_weight`.
    fn roll(&self, total_weight: u64) -> u64;
}

impl<F> RollSource for F
where
    F: Fn(u64) -> u64,
{
    fn roll(&self, total_weight: u64) -> u64 {
        self(total_weight)
    }
}

/// Rolls from the thread-local generator, so concurrent draws share no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngRolls;

impl RollSource for ThreadRngRolls {
    fn roll(&self, total_weight: u64) -> u64 {
        rand::rng().random_range(1..=total_weight)
    }
}

/// Immutable weighted prize list. Entries are evaluated in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrizeTable {
    entries: Vec<PrizeEntry>,
    cumulative: Vec<u64>,
}

impl PrizeTable {
    pub fn new(entries: Vec<PrizeEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::InvalidConfig(
                "prize table must contain at least one entry".to_string(),
            ));
        }
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut running = 0u64;
        for entry in &entries {
            if entry.weight == 0 {
                return Err(Error::InvalidConfig(format!(
                    "prize {:?} has a zero weight",
                    entry.label
                )));
            }
            if i64::try_from(entry.value).is_err() {
                return Err(Error::InvalidConfig(format!(
                    "prize {:?} value {} exceeds the transaction range",
                    entry.label, entry.value
                )));
            }
            running = running
                .checked_add(u64::from(entry.weight))
                .ok_or_else(|| Error::InvalidConfig("total prize weight overflows".to_string()))?;
            cumulative.push(running);
        }
        Ok(Self {
            entries,
            cumulative,
        })
    }

    pub fn entries(&self) -> &[PrizeEntry] {
        &self.entries
    }

    pub fn total_weight(&self) -> u64 {
        // non-empty by construction
        self.cumulative.last().copied().unwrap_or_default()
    }

    /// Map a roll in `1..=total_weight` to the first entry whose cumulative
    /// weight reaches it.
    pub fn resolve(&self, roll: u64) -> Option<&PrizeEntry> {
        if roll == 0 || roll > self.total_weight() {
            return None;
        }
        let index = self.cumulative.partition_point(|&sum| sum < roll);
        self.entries.get(index)
    }

    pub fn draw<R: RollSource + ?Sized>(&self, rolls: &R) -> Result<&PrizeEntry> {
        let total = self.total_weight();
        let roll = rolls.roll(total);
        self.resolve(roll).ok_or_else(|| {
            Error::InvalidConfig(format!("roll {roll} is outside 1..={total}"))
        })
    }

    pub fn probability(&self, index: usize) -> Option<f64> {
        let entry = self.entries.get(index)?;
        Some(f64::from(entry.weight) / self.total_weight() as f64)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn wheel() -> PrizeTable {
        PrizeTable::new(vec![
            PrizeEntry::new(10, "10", 40),
            PrizeEntry::new(20, "20", 30),
            PrizeEntry::new(50, "50", 15),
            PrizeEntry::new(100, "100", 10),
            PrizeEntry::new(200, "200", 4),
            PrizeEntry::new(500, "500", 1),
        ])
        .unwrap()
    }

    #[test]
    fn resolve__picks_first_entry_whose_cumulative_weight_reaches_roll() {
        // given
        let table = wheel();

        // then
        assert_eq!(table.total_weight(), 100);
        assert_eq!(table.resolve(41).unwrap().value, 20);
        assert_eq!(table.resolve(100).unwrap().value, 500);
        assert_eq!(table.resolve(1).unwrap().value, 10);
        assert_eq!(table.resolve(40).unwrap().value, 10);
        assert_eq!(table.resolve(70).unwrap().value, 20);
        assert_eq!(table.resolve(71).unwrap().value, 50);
    }

    #[test]
    fn resolve__out_of_range_rolls_resolve_to_nothing() {
        let table = wheel();
        assert!(table.resolve(0).is_none());
        assert!(table.resolve(101).is_none());
    }

    #[test]
    fn new__empty_table_fails_fast() {
        assert!(matches!(
            PrizeTable::new(Vec::new()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn new__zero_weight_fails_fast() {
        // given
        let entries = vec![PrizeEntry::new(10, "10", 5), PrizeEntry::new(0, "lost", 0)];

        // then
        assert!(matches!(
            PrizeTable::new(entries),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn draw__uses_the_roll_source_value() {
        // given
        let table = wheel();

        // when
        let prize = table.draw(&|_total: u64| 85).unwrap();

        // then
        assert_eq!(prize.value, 50);
    }

    #[test]
    fn draw__misbehaving_roll_source_is_reported() {
        let table = wheel();
        let result = table.draw(&|total: u64| total + 1);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn probability__is_weight_over_total() {
        let table = wheel();
        assert_eq!(table.probability(0), Some(0.4));
        assert_eq!(table.probability(5), Some(0.01));
        assert_eq!(table.probability(6), None);
    }

    proptest! {
        #[test]
        fn resolve__every_roll_lands_inside_its_entry_window(
            weights in proptest::collection::vec(1u32..=50, 1..12),
            roll_seed in any::<u64>(),
        ) {
            let entries = weights
                .iter()
                .enumerate()
                .map(|(i, w)| PrizeEntry::new(i as u64, i.to_string(), *w))
                .collect::<Vec<_>>();
            let table = PrizeTable::new(entries).unwrap();
            let roll = roll_seed % table.total_weight() + 1;

            let prize = table.resolve(roll).unwrap();
            let index = prize.value as usize;
            let upper: u64 = weights[..=index].iter().map(|w| u64::from(*w)).sum();
            let lower = upper - u64::from(weights[index]);
            prop_assert!(lower < roll && roll <= upper);
        }

        #[test]
        fn draw__thread_rng_always_resolves(
            weights in proptest::collection::vec(1u32..=1000, 1..8),
        ) {
            let entries = weights
                .iter()
                .map(|w| PrizeEntry::new(u64::from(*w), "p", *w))
                .collect::<Vec<_>>();
            let table = PrizeTable::new(entries).unwrap();
            prop_assert!(table.draw(&ThreadRngRolls).is_ok());
        }
    }
}
