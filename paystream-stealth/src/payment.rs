//! Stealth payment creation (payer side).

use rand::rngs::OsRng;
use rand::CryptoRng;
use rand::RngCore;
use tracing::debug;

use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{
    Amount, Announcement, AnnouncementBuilder, Asset, EphemeralKeyPair, EthAddress, KeyPair,
    MetaAddress, PaymentMetadata, SecretScalar, StealthAddress,
};
use paystream_crypto::derive::{derive_eth_address, derive_stealth_public_key};
use paystream_crypto::{hash_shared_secret, shared_secret};

/// A freshly generated stealth payment.
///
/// Holds the ephemeral private key for the duration of the payment flow only.
/// Not serializable; `Debug` redacts the ephemeral key.
#[derive(Debug)]
pub struct StealthPayment {
    /// Where to send funds, plus the data to announce
    pub stealth_address: StealthAddress,
    /// Announcement metadata (`view_tag || [payment hint]`)
    pub metadata: Vec<u8>,
    ephemeral: EphemeralKeyPair,
}

impl StealthPayment {
    /// The one-time account address to pay.
    pub fn address(&self) -> EthAddress {
        self.stealth_address.address
    }

    /// The view tag carried in the metadata.
    pub fn view_tag(&self) -> u8 {
        self.stealth_address.view_tag
    }

    /// The ephemeral private key `r`.
    ///
    /// # Security
    /// Reusing `r` for a second payment links the two payments. Drop the
    /// payment once the announcement is published.
    pub fn ephemeral_private_key(&self) -> &SecretScalar {
        &self.ephemeral.secret
    }

    /// Builds the announcement the payer publishes alongside the transfer.
    pub fn to_announcement(&self, caller: EthAddress) -> Result<Announcement> {
        AnnouncementBuilder::new()
            .stealth_address(self.stealth_address.address)
            .caller(caller)
            .ephemeral_pub_key(self.stealth_address.ephemeral_public_key_bytes())
            .metadata(self.metadata.clone())
            .build()
    }
}

/// Generates a stealth payment to `meta` using the OS RNG.
pub fn generate(meta: &MetaAddress) -> Result<StealthPayment> {
    generate_with_rng(meta, &mut OsRng)
}

/// Generates a stealth payment with a caller-supplied CSPRNG.
///
/// # Algorithm
///
/// 1. `r` random, `R = r·G`
/// 2. `S = r·V`
/// 3. `h = Keccak256(compressed(S))`, `view_tag = h[0]`
/// 4. `P = K + h·G`
/// 5. `address = Keccak256(P.x || P.y)[12..]`
pub fn generate_with_rng<R: RngCore + CryptoRng>(
    meta: &MetaAddress,
    rng: &mut R,
) -> Result<StealthPayment> {
    let ephemeral = KeyPair::from_secret(SecretScalar::random(rng));

    let s = shared_secret(&ephemeral.secret, &meta.viewing_pk)?;
    let hashed = hash_shared_secret(&s);
    let view_tag = hashed[0];

    let stealth_public_key = derive_stealth_public_key(&meta.spending_pk, &hashed)?;
    let address = derive_eth_address(&stealth_public_key);

    debug!(%address, view_tag, "generated stealth address");

    Ok(StealthPayment {
        stealth_address: StealthAddress {
            address,
            ephemeral_public_key: ephemeral.public,
            view_tag,
            stealth_public_key,
        },
        metadata: vec![view_tag],
        ephemeral,
    })
}

/// Builder for stealth payments that carry a payment hint in the metadata.
#[derive(Default)]
pub struct StealthPaymentBuilder {
    meta_address: Option<MetaAddress>,
    asset: Option<Asset>,
    amount: Option<Amount>,
}

impl StealthPaymentBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recipient meta-address (required).
    pub fn recipient(mut self, meta_address: MetaAddress) -> Self {
        self.meta_address = Some(meta_address);
        self
    }

    /// Sets the paid asset for the metadata hint.
    pub fn asset(mut self, asset: Asset) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Sets the paid amount for the metadata hint.
    pub fn amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Generates the payment.
    pub fn build(self) -> Result<StealthPayment> {
        self.build_with_rng(&mut OsRng)
    }

    /// Generates the payment with a caller-supplied CSPRNG.
    pub fn build_with_rng<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<StealthPayment> {
        let meta_address = self.meta_address.ok_or_else(|| {
            PaystreamError::ValidationError("recipient meta-address is required".into())
        })?;

        let mut payment = generate_with_rng(&meta_address, rng)?;

        match (self.asset, self.amount) {
            (Some(asset), Some(amount)) => {
                payment.metadata = PaymentMetadata::new(payment.view_tag(), asset, amount).encode();
            }
            (None, None) => {}
            _ => {
                return Err(PaystreamError::ValidationError(
                    "asset and amount must be set together".into(),
                ))
            }
        }

        Ok(payment)
    }
}

/// Recomputes the stealth address from the payment's own ephemeral key.
pub fn verify_payment(payment: &StealthPayment, meta: &MetaAddress) -> Result<bool> {
    let s = shared_secret(payment.ephemeral_private_key(), &meta.viewing_pk)?;
    let hashed = hash_shared_secret(&s);
    let stealth_pk = derive_stealth_public_key(&meta.spending_pk, &hashed)?;

    Ok(hashed[0] == payment.view_tag()
        && stealth_pk == payment.stealth_address.stealth_public_key
        && paystream_crypto::addresses_match(&derive_eth_address(&stealth_pk), &payment.address()))
}
