use crate::{
    Error,
    Result,
    prize_table::{
        PrizeEntry,
        PrizeTable,
    },
};
use anyhow::Context;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashSet,
    fs,
    path::Path,
};

const MIN_REFERRAL_CODE_LEN: usize = 4;
// hex-encoded SHA-256
const MAX_REFERRAL_CODE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinPackage {
    pub id: String,
    pub spins: u32,
    pub price: u64,
}

/// Payout addresses are a fixed prefix followed by a fixed number of hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressFormat {
    pub prefix: String,
    pub hex_len: usize,
}

impl Default for AddressFormat {
    fn default() -> Self {
        Self {
            prefix: "0x".to_string(),
            hex_len: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRules {
    pub name_max_len: usize,
    pub contact_min_len: usize,
    pub contact_max_len: usize,
    pub address: AddressFormat,
}

impl Default for ProfileRules {
    fn default() -> Self {
        Self {
            name_max_len: 64,
            contact_min_len: 5,
            contact_max_len: 15,
            address: AddressFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub prizes: Vec<PrizeEntry>,
    pub packages: Vec<SpinPackage>,
    /// Spins granted to an account registered without a referral code.
    pub base_spins: u32,
    /// Spins granted to an account registered through a referral code.
    pub referred_signup_spins: u32,
    /// Spins credited to the referrer for each referee.
    pub referral_bonus_spins: u32,
    pub referral_code_len: usize,
    pub profile: ProfileRules,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            prizes: vec![
                PrizeEntry::new(10, "10 points", 40),
                PrizeEntry::new(20, "20 points", 30),
                PrizeEntry::new(50, "50 points", 15),
                PrizeEntry::new(100, "100 points", 10),
                PrizeEntry::new(200, "200 points", 4),
                PrizeEntry::new(500, "500 points", 1),
            ],
            packages: vec![
                SpinPackage {
                    id: "single".to_string(),
                    spins: 1,
                    price: 25,
                },
                SpinPackage {
                    id: "handful".to_string(),
                    spins: 5,
                    price: 100,
                },
                SpinPackage {
                    id: "bucket".to_string(),
                    spins: 15,
                    price: 250,
                },
            ],
            base_spins: 3,
            referred_signup_spins: 5,
            referral_bonus_spins: 2,
            referral_code_len: 8,
            profile: ProfileRules::default(),
        }
    }
}

impl LedgerConfig {
    /// Read a JSON config file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .with_context(|| format!("Failed to read ledger config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse ledger config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid ledger config {}", path.display()))?;
        Ok(config)
    }

    /// Check every constraint and build the prize table.
    pub fn validate(&self) -> Result<PrizeTable> {
        let table = PrizeTable::new(self.prizes.clone())?;

        let mut seen = HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate spin package {:?}",
                    package.id
                )));
            }
            if package.spins == 0 {
                return Err(Error::InvalidConfig(format!(
                    "spin package {:?} grants no spins",
                    package.id
                )));
            }
            if package.price == 0 {
                return Err(Error::InvalidConfig(format!(
                    "spin package {:?} must have a non-zero price",
                    package.id
                )));
            }
            if i64::try_from(package.price).is_err() {
                return Err(Error::InvalidConfig(format!(
                    "spin package {:?} price exceeds the transaction range",
                    package.id
                )));
            }
        }
        if self.referred_signup_spins < self.base_spins {
            return Err(Error::InvalidConfig(format!(
                "referred signup spins ({}) must not be below base spins ({})",
                self.referred_signup_spins, self.base_spins
            )));
        }
        if !(MIN_REFERRAL_CODE_LEN..=MAX_REFERRAL_CODE_LEN).contains(&self.referral_code_len) {
            return Err(Error::InvalidConfig(format!(
                "referral code length {} outside {MIN_REFERRAL_CODE_LEN}..={MAX_REFERRAL_CODE_LEN}",
                self.referral_code_len
            )));
        }
        let rules = &self.profile;
        if rules.address.prefix.is_empty() || rules.address.hex_len == 0 {
            return Err(Error::InvalidConfig(
                "payout address format needs a prefix and a length".to_string(),
            ));
        }
        if rules.name_max_len == 0 || rules.contact_min_len > rules.contact_max_len {
            return Err(Error::InvalidConfig(
                "profile length limits are inconsistent".to_string(),
            ));
        }
        Ok(table)
    }

    pub fn package(&self, id: &str) -> Option<&SpinPackage> {
        self.packages.iter().find(|package| package.id == id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use std::io::Write;
    use tempdir::TempDir;

    #[test]
    fn validate__default_config_is_valid() {
        let table = LedgerConfig::default().validate().unwrap();
        assert_eq!(table.total_weight(), 100);
    }

    #[test]
    fn validate__rejects_duplicate_packages() {
        // given
        let mut config = LedgerConfig::default();
        config.packages.push(config.packages[0].clone());

        // then
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate__rejects_free_package() {
        // given
        let mut config = LedgerConfig::default();
        config.packages.push(SpinPackage {
            id: "giveaway".to_string(),
            spins: 1_000,
            price: 0,
        });

        // when
        let result = config.validate();

        // then
        assert!(matches!(
            result,
            Err(Error::InvalidConfig(reason)) if reason.contains("giveaway")
        ));
    }

    #[test]
    fn validate__rejects_referred_bonus_below_base() {
        // given
        let config = LedgerConfig {
            base_spins: 5,
            referred_signup_spins: 3,
            ..LedgerConfig::default()
        };

        // then
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn load__partial_file_falls_back_to_defaults() {
        // given
        let temp_dir = TempDir::new("ledger_config").unwrap();
        let path = temp_dir.path().join("ledger.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(
            br#"{
                "referral_bonus_spins": 5,
                "prizes": [
                    { "value": 0, "label": "You Lost", "weight": 10 },
                    { "value": 10, "label": "10", "weight": 40 }
                ]
            }"#,
        )
        .unwrap();

        // when
        let config = LedgerConfig::load(&path).unwrap();

        // then
        assert_eq!(config.referral_bonus_spins, 5);
        assert_eq!(config.prizes.len(), 2);
        assert_eq!(config.base_spins, LedgerConfig::default().base_spins);
        assert_eq!(config.profile, ProfileRules::default());
    }

    #[test]
    fn load__invalid_table_is_reported_with_path() {
        // given
        let temp_dir = TempDir::new("ledger_config_invalid").unwrap();
        let path = temp_dir.path().join("ledger.json");
        fs::write(&path, br#"{ "prizes": [] }"#).unwrap();

        // when
        let error = LedgerConfig::load(&path).unwrap_err();

        // then
        assert!(format!("{error:#}").contains("prize table must contain"));
    }
}
