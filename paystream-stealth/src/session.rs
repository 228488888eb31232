//! Per-session key derivation from the user's wallet.
//!
//! Unlocking asks the wallet for exactly one signature. The derived keys stay
//! in process memory until [`KeySession::lock`] or drop. A declined request is
//! remembered: later `unlock` calls return `SigningDeclined` without prompting
//! again, until the user explicitly asks to [`retry`](KeySession::retry).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use zeroize::Zeroizing;

use paystream_core::constants::DOMAIN_STEALTH_KEYS;
use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::WalletSigner;
use paystream_core::types::{DerivedKeys, EthAddress};
use paystream_crypto::{derive_keys, key_derivation_message};

enum SessionState {
    Locked,
    Declined,
    Unlocked(DerivedKeys),
}

/// A recipient's key session.
pub struct KeySession {
    signer: Arc<dyn WalletSigner>,
    domain: String,
    state: Mutex<SessionState>,
}

impl KeySession {
    /// Creates a locked session using the default `"stealth-keys"` domain.
    pub fn new(signer: Arc<dyn WalletSigner>) -> Self {
        Self::with_domain(signer, DOMAIN_STEALTH_KEYS)
    }

    /// Creates a locked session for a custom derivation domain.
    pub fn with_domain(signer: Arc<dyn WalletSigner>, domain: impl Into<String>) -> Self {
        Self {
            signer,
            domain: domain.into(),
            state: Mutex::new(SessionState::Locked),
        }
    }

    /// The wallet account this session derives keys for.
    pub fn account(&self) -> EthAddress {
        self.signer.address()
    }

    /// The derivation domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the session keys, requesting the one signature if needed.
    ///
    /// Concurrent callers wait for the same request instead of prompting twice.
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub async fn unlock(&self) -> Result<DerivedKeys> {
        let mut state = self.state.lock().await;
        if let SessionState::Unlocked(keys) = &*state {
            return Ok(keys.clone());
        }
        if matches!(*state, SessionState::Declined) {
            return Err(PaystreamError::SigningDeclined);
        }
        self.request(&mut state).await
    }

    /// Prompts again after a decline. Has no effect on an unlocked session.
    #[instrument(skip(self), fields(domain = %self.domain))]
    pub async fn retry(&self) -> Result<DerivedKeys> {
        let mut state = self.state.lock().await;
        if let SessionState::Unlocked(keys) = &*state {
            return Ok(keys.clone());
        }
        self.request(&mut state).await
    }

    /// Drops the derived keys. The next `unlock` prompts again.
    pub async fn lock(&self) {
        *self.state.lock().await = SessionState::Locked;
        info!("key session locked");
    }

    /// Returns true if keys are held.
    pub async fn is_unlocked(&self) -> bool {
        matches!(&*self.state.lock().await, SessionState::Unlocked(_))
    }

    /// Returns the keys without prompting.
    pub async fn keys(&self) -> Option<DerivedKeys> {
        match &*self.state.lock().await {
            SessionState::Unlocked(keys) => Some(keys.clone()),
            _ => None,
        }
    }

    async fn request(&self, state: &mut SessionState) -> Result<DerivedKeys> {
        let message = key_derivation_message(&self.domain, &self.signer.address());
        info!(account = %self.signer.address(), "requesting key-derivation signature");

        let signature = match self.signer.sign_message(&message).await {
            Ok(signature) => Zeroizing::new(signature),
            Err(PaystreamError::SigningDeclined) => {
                warn!("user declined key-derivation signature");
                *state = SessionState::Declined;
                return Err(PaystreamError::SigningDeclined);
            }
            Err(e) => return Err(e),
        };

        let keys = derive_keys(&signature, &self.domain)?;
        *state = SessionState::Unlocked(keys.clone());
        info!("key session unlocked");
        Ok(keys)
    }
}
