use crate::account::AccountId;
use anyhow::anyhow;
use sha2::{
    Digest,
    Sha256,
};
use tokio::sync::mpsc::{
    self,
    error::TrySendError,
};

/// Derive a referral code from a one-way hash of the account identity and
/// payout address. A non-zero `nonce` salts the hash after a collision.
pub fn referral_code(
    id: AccountId,
    payout_address: &str,
    nonce: u32,
    len: usize,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.to_be_bytes());
    hasher.update(b":");
    hasher.update(payout_address.as_bytes());
    if nonce > 0 {
        hasher.update(b":");
        hasher.update(nonce.to_be_bytes());
    }
    let mut code = hex::encode_upper(hasher.finalize());
    code.truncate(len);
    code
}

/// Codes are typed by humans; compare them trimmed and upper-cased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralNotice {
    pub referrer: AccountId,
    pub referee: AccountId,
    pub bonus_spins: u32,
    pub spins_remaining: u32,
    pub total_referrals: u32,
}

/// Tells a referrer they were credited. Invoked only after the credit has been
/// committed; failures are logged and otherwise ignored.
pub trait ReferralNotifier {
    fn referral_credited(&self, notice: &ReferralNotice) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ReferralNotifier for NoopNotifier {
    fn referral_credited(&self, _notice: &ReferralNotice) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hands notices to the transport layer over a bounded channel without blocking.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<ReferralNotice>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReferralNotice>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl ReferralNotifier for ChannelNotifier {
    fn referral_credited(&self, notice: &ReferralNotice) -> anyhow::Result<()> {
        self.sender
            .try_send(notice.clone())
            .map_err(|err| match err {
                TrySendError::Full(_) => anyhow!("referral notice queue is full"),
                TrySendError::Closed(_) => anyhow!("referral notice queue is closed"),
            })
    }
}
