//! Purchase catalog and price resolution.
//!
//! The catalog enumerates everything the product sells: moments at
//! three tiers, media packs, and the Plus subscription. Incoming
//! purchase requests are normalized into a [`PurchaseIntent`] at the
//! HTTP boundary; everything downstream works with the typed intent
//! and never inspects raw request fields again.

use crate::domain::entitlement::unlock::{MomentLevel, UnlockKey};
use crate::domain::foundation::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Checkout mode required by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// A sellable catalog entry.
///
/// Exactly five exist. Each maps to one configured provider price and
/// one checkout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogEntry {
    MomentPrivate,
    MomentIntimate,
    MomentExclusive,
    Media,
    Plus,
}

impl CatalogEntry {
    pub const ALL: [CatalogEntry; 5] = [
        CatalogEntry::MomentPrivate,
        CatalogEntry::MomentIntimate,
        CatalogEntry::MomentExclusive,
        CatalogEntry::Media,
        CatalogEntry::Plus,
    ];

    pub fn for_moment(level: MomentLevel) -> Self {
        match level {
            MomentLevel::Private => CatalogEntry::MomentPrivate,
            MomentLevel::Intimate => CatalogEntry::MomentIntimate,
            MomentLevel::Exclusive => CatalogEntry::MomentExclusive,
        }
    }

    pub fn mode(&self) -> CheckoutMode {
        match self {
            CatalogEntry::Plus => CheckoutMode::Subscription,
            _ => CheckoutMode::Payment,
        }
    }

    /// Stable name used in logs and configuration errors.
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEntry::MomentPrivate => "moment_private",
            CatalogEntry::MomentIntimate => "moment_intimate",
            CatalogEntry::MomentExclusive => "moment_exclusive",
            CatalogEntry::Media => "media",
            CatalogEntry::Plus => "plus",
        }
    }
}

/// What the user is trying to buy, with the content discriminators
/// needed to grant the right thing when payment completes.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseIntent {
    Moment {
        character_id: String,
        situation_id: String,
        level: MomentLevel,
    },
    Media {
        character_id: String,
        media_id: String,
    },
    Plus,
}

impl PurchaseIntent {
    pub fn catalog_entry(&self) -> CatalogEntry {
        match self {
            PurchaseIntent::Moment { level, .. } => CatalogEntry::for_moment(*level),
            PurchaseIntent::Media { .. } => CatalogEntry::Media,
            PurchaseIntent::Plus => CatalogEntry::Plus,
        }
    }

    /// The unlock this purchase grants, if it is a one-time purchase.
    pub fn unlock_key(&self) -> Result<Option<UnlockKey>, ValidationError> {
        match self {
            PurchaseIntent::Moment {
                character_id,
                situation_id,
                level,
            } => Ok(Some(UnlockKey::moment(
                character_id.clone(),
                situation_id.clone(),
                *level,
            )?)),
            PurchaseIntent::Media {
                character_id,
                media_id,
            } => Ok(Some(UnlockKey::media(
                character_id.clone(),
                media_id.clone(),
            )?)),
            PurchaseIntent::Plus => Ok(None),
        }
    }

    /// Metadata attached to the checkout session so the webhook side
    /// can reconstruct the purchase without a side channel.
    pub fn to_metadata(&self) -> Vec<(&'static str, String)> {
        match self {
            PurchaseIntent::Moment {
                character_id,
                situation_id,
                level,
            } => vec![
                ("purchase_type", "moment".to_string()),
                ("character_id", character_id.clone()),
                ("situation_id", situation_id.clone()),
                ("moment_level", level.as_str().to_string()),
            ],
            PurchaseIntent::Media {
                character_id,
                media_id,
            } => vec![
                ("purchase_type", "media".to_string()),
                ("character_id", character_id.clone()),
                ("media_id", media_id.clone()),
            ],
            PurchaseIntent::Plus => vec![("purchase_type", "plus".to_string())],
        }
    }
}

/// Raw checkout request body as received over HTTP.
///
/// Two shapes are accepted: the current `price_ref` form and the
/// legacy form that spells out the discriminators. Normalization into
/// a [`PurchaseIntent`] happens here and nowhere else.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub price_ref: Option<String>,
    #[serde(default)]
    pub purchase_type: Option<String>,
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub situation_id: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub moment_level: Option<String>,
}

impl CheckoutRequest {
    /// Normalizes either request shape into a typed intent.
    ///
    /// When `price_ref` is present it wins and the legacy fields only
    /// supply content discriminators. Without it the legacy
    /// `purchase_type` discriminator is required.
    pub fn into_intent(self, prices: &PriceBook) -> Result<PurchaseIntent, ValidationError> {
        if let Some(price_ref) = &self.price_ref {
            let entry = prices.entry_for(price_ref).ok_or_else(|| {
                ValidationError::invalid_format("priceRef", "unrecognized price reference")
            })?;
            return self.intent_for_entry(entry);
        }

        match self.purchase_type.as_deref() {
            Some("moment") => {
                let level = MomentLevel::parse(
                    self.moment_level
                        .as_deref()
                        .ok_or_else(|| ValidationError::empty_field("momentLevel"))?,
                )?;
                self.intent_for_entry(CatalogEntry::for_moment(level))
            }
            Some("media") => self.intent_for_entry(CatalogEntry::Media),
            Some("plus") => Ok(PurchaseIntent::Plus),
            Some(other) => Err(ValidationError::invalid_format(
                "purchaseType",
                format!("unknown purchase type '{other}'"),
            )),
            None => Err(ValidationError::empty_field("priceRef")),
        }
    }

    fn intent_for_entry(self, entry: CatalogEntry) -> Result<PurchaseIntent, ValidationError> {
        match entry {
            CatalogEntry::MomentPrivate
            | CatalogEntry::MomentIntimate
            | CatalogEntry::MomentExclusive => {
                let level = match entry {
                    CatalogEntry::MomentPrivate => MomentLevel::Private,
                    CatalogEntry::MomentIntimate => MomentLevel::Intimate,
                    _ => MomentLevel::Exclusive,
                };
                Ok(PurchaseIntent::Moment {
                    character_id: self
                        .character_id
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| ValidationError::empty_field("characterId"))?,
                    situation_id: self
                        .situation_id
                        .filter(|s| !s.is_empty())
                        .ok_or_else(|| ValidationError::empty_field("situationId"))?,
                    level,
                })
            }
            CatalogEntry::Media => Ok(PurchaseIntent::Media {
                character_id: self
                    .character_id
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ValidationError::empty_field("characterId"))?,
                media_id: self
                    .media_id
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ValidationError::empty_field("mediaId"))?,
            }),
            CatalogEntry::Plus => Ok(PurchaseIntent::Plus),
        }
    }
}

/// Resolved catalog-to-price mapping built from configuration.
///
/// Entries with no configured price are absent. Resolution in either
/// direction is a lookup, so an unconfigured price surfaces as a
/// distinct configuration error rather than a silent fallback.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    forward: HashMap<CatalogEntry, String>,
    reverse: HashMap<String, CatalogEntry>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, entry: CatalogEntry, price_id: impl Into<String>) -> Self {
        let price_id = price_id.into();
        self.reverse.insert(price_id.clone(), entry);
        self.forward.insert(entry, price_id);
        self
    }

    /// Provider price id for a catalog entry, if configured.
    pub fn price_for(&self, entry: CatalogEntry) -> Option<&str> {
        self.forward.get(&entry).map(String::as_str)
    }

    /// Catalog entry for a price reference, if recognized.
    pub fn entry_for(&self, price_ref: &str) -> Option<CatalogEntry> {
        self.reverse.get(price_ref).copied()
    }
}
