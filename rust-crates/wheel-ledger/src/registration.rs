use crate::{
    Error,
    Result,
    account::{
        Account,
        AccountId,
        Profile,
    },
    config::{
        AddressFormat,
        ProfileRules,
    },
};

/// Where an in-flight registration currently is. Each variant carries the
/// fields collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    CollectName,
    CollectContact { name: String },
    CollectAddress { name: String, contact: String },
    Done { profile: Profile },
}

/// Per-user registration state. Owned by the caller and handed back on every
/// submission; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSession {
    identity: AccountId,
    referrer_code: Option<String>,
    step: RegistrationStep,
}

impl RegistrationSession {
    pub fn start(identity: AccountId, referrer_code: Option<String>) -> Self {
        Self {
            identity,
            referrer_code,
            step: RegistrationStep::CollectName,
        }
    }

    pub fn identity(&self) -> AccountId {
        self.identity
    }

    pub fn referrer_code(&self) -> Option<&str> {
        self.referrer_code.as_deref()
    }

    /// Replace the referral code, e.g. after it was rejected as unknown.
    pub fn set_referrer_code(&mut self, referrer_code: Option<String>) {
        self.referrer_code = referrer_code;
    }

    pub fn step(&self) -> &RegistrationStep {
        &self.step
    }

    pub fn is_done(&self) -> bool {
        matches!(self.step, RegistrationStep::Done { .. })
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.step {
            RegistrationStep::Done { profile } => Some(profile),
            _ => None,
        }
    }

    /// Validate `input` for the current step and advance. On error the session
    /// is left untouched so the caller can prompt again.
    pub fn submit(&mut self, input: &str, rules: &ProfileRules) -> Result<&RegistrationStep> {
        let next = match &self.step {
            RegistrationStep::CollectName => RegistrationStep::CollectContact {
                name: validate_name(input, rules)?,
            },
            RegistrationStep::CollectContact { name } => RegistrationStep::CollectAddress {
                name: name.clone(),
                contact: validate_contact(input, rules)?,
            },
            RegistrationStep::CollectAddress { name, contact } => RegistrationStep::Done {
                profile: Profile {
                    name: name.clone(),
                    contact: contact.clone(),
                    payout_address: validate_address(input, &rules.address)?,
                },
            },
            RegistrationStep::Done { .. } => {
                return Err(Error::invalid_field(
                    "registration",
                    "all profile fields were already collected",
                ));
            }
        };
        self.step = next;
        Ok(&self.step)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub account: Account,
    /// The referrer after its bonus was applied.
    pub referrer: Option<Account>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationProgress {
    Next(RegistrationStep),
    Registered(Registration),
}

pub fn validate_name(input: &str, rules: &ProfileRules) -> Result<String> {
    let name = input.trim();
    if name.is_empty() {
        return Err(Error::invalid_field("name", "must not be empty"));
    }
    if name.chars().count() > rules.name_max_len {
        return Err(Error::invalid_field(
            "name",
            format!("must be at most {} characters", rules.name_max_len),
        ));
    }
    Ok(name.to_string())
}

pub fn validate_contact(input: &str, rules: &ProfileRules) -> Result<String> {
    let contact = input.trim();
    if contact.is_empty() || !contact.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::invalid_field("contact", "must contain digits only"));
    }
    if !(rules.contact_min_len..=rules.contact_max_len).contains(&contact.len()) {
        return Err(Error::invalid_field(
            "contact",
            format!(
                "must be {} to {} digits long",
                rules.contact_min_len, rules.contact_max_len
            ),
        ));
    }
    Ok(contact.to_string())
}

pub fn validate_address(input: &str, format: &AddressFormat) -> Result<String> {
    let address = input.trim();
    let Some(body) = address.strip_prefix(format.prefix.as_str()) else {
        return Err(Error::invalid_field(
            "payout address",
            format!("must start with {:?}", format.prefix),
        ));
    };
    if body.len() != format.hex_len || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::invalid_field(
            "payout address",
            format!("must be followed by exactly {} hex digits", format.hex_len),
        ));
    }
    Ok(address.to_string())
}

/// Re-check a profile assembled outside a session.
pub fn validate_profile(profile: &Profile, rules: &ProfileRules) -> Result<Profile> {
    Ok(Profile {
        name: validate_name(&profile.name, rules)?,
        contact: validate_contact(&profile.contact, rules)?,
        payout_address: validate_address(&profile.payout_address, &rules.address)?,
    })
}
