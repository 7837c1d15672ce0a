//! Identity service: guest minting, checkout identity resolution and
//! in-place guest promotion.
//!
//! A guest is an ordinary identity row flagged `is_guest`, created with a
//! synthetic email and a throwaway credential. Promotion rewrites the row's
//! mutable fields and clears the flag; because the primary key never
//! changes, every order and cart the guest accumulated stays attached
//! without any re-parenting.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{generate_password, hash_password},
    entities::{cart, identity, Identity},
    errors::ServiceError,
    events::{Event, EventSender},
};

const GUEST_EMAIL_DOMAIN: &str = "guest.invalid";
const GUEST_CREATE_ATTEMPTS: usize = 3;
const PROMOTED_PASSWORD_LEN: usize = 12;

/// Contact details entered on the guest checkout form.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Outcome of checkout identity resolution: who owns the order, whether the
/// calling guest keeps a secondary reference, and whether to promote the
/// caller once the order is safely materialized.
#[derive(Debug, Clone)]
pub struct CheckoutResolution {
    pub owner_id: Uuid,
    pub guest_ref: Option<Uuid>,
    pub promotion: Option<CheckoutContact>,
}

#[derive(Clone)]
pub struct IdentityService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl IdentityService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Mints a guest identity with synthetic credentials, together with its
    /// cart. Retries on the (vanishingly unlikely) synthetic-email
    /// collision.
    #[instrument(skip(self))]
    pub async fn create_guest(&self) -> Result<identity::Model, ServiceError> {
        let mut last_err = None;

        for _ in 0..GUEST_CREATE_ATTEMPTS {
            let email = format!("{}@{}", Uuid::new_v4(), GUEST_EMAIL_DOMAIN);
            let password_hash = hash_password(&Uuid::new_v4().to_string())?;

            let txn = self.db.begin().await?;

            let guest = identity::ActiveModel {
                id: Set(Uuid::new_v4()),
                email: Set(email),
                first_name: Set("guest".to_string()),
                last_name: Set("guest".to_string()),
                password_hash: Set(password_hash),
                is_guest: Set(true),
                is_active: Set(true),
                created_at: Set(Utc::now()),
            };

            match guest.insert(&txn).await {
                Ok(guest) => {
                    let guest_cart = cart::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        identity_id: Set(guest.id),
                        created_at: Set(Utc::now()),
                    };
                    guest_cart.insert(&txn).await?;
                    txn.commit().await?;

                    info!(identity_id = %guest.id, "Guest identity created");
                    return Ok(guest);
                }
                Err(e) => {
                    warn!("Guest identity insert failed, retrying: {}", e);
                    txn.rollback().await?;
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .map(ServiceError::from)
            .unwrap_or_else(|| ServiceError::InternalError("guest creation failed".into())))
    }

    /// Looks up a permanent (non-guest) identity by contact email.
    pub async fn find_permanent_by_email(
        &self,
        email: &str,
    ) -> Result<Option<identity::Model>, ServiceError> {
        Ok(Identity::find()
            .filter(identity::Column::Email.eq(email))
            .filter(identity::Column::IsGuest.eq(false))
            .one(&*self.db)
            .await?)
    }

    /// Decides who a checkout belongs to.
    ///
    /// Permanent callers own their orders outright. A guest caller whose
    /// contact email matches an existing permanent account places the order
    /// into that account's history while keeping a guest reference so the
    /// still-logged-in session can view and pay for it; a guest with a
    /// fresh email owns the order and is promoted after materialization.
    /// Two permanent accounts are never created for one email address.
    #[instrument(skip(self, caller, contact), fields(caller = %caller.id))]
    pub async fn resolve_checkout(
        &self,
        caller: &identity::Model,
        contact: Option<&CheckoutContact>,
    ) -> Result<CheckoutResolution, ServiceError> {
        if !caller.is_guest {
            return Ok(CheckoutResolution {
                owner_id: caller.id,
                guest_ref: None,
                promotion: None,
            });
        }

        let contact = contact.ok_or_else(|| {
            ServiceError::ValidationError("guest checkout requires contact details".into())
        })?;

        match self.find_permanent_by_email(&contact.email).await? {
            Some(existing) => Ok(CheckoutResolution {
                owner_id: existing.id,
                guest_ref: Some(caller.id),
                promotion: None,
            }),
            None => Ok(CheckoutResolution {
                owner_id: caller.id,
                guest_ref: None,
                promotion: Some(contact.clone()),
            }),
        }
    }

    /// Promotes a guest into a permanent account in place: contact details
    /// from the checkout form, a fresh random credential, `is_guest`
    /// cleared. No-op for identities that are already permanent.
    #[instrument(skip(self, contact))]
    pub async fn promote_guest(
        &self,
        identity_id: Uuid,
        contact: &CheckoutContact,
    ) -> Result<identity::Model, ServiceError> {
        let existing = Identity::find_by_id(identity_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Identity {} not found", identity_id)))?;

        if !existing.is_guest {
            return Ok(existing);
        }

        let password_hash = hash_password(&generate_password(PROMOTED_PASSWORD_LEN))?;

        let mut update: identity::ActiveModel = existing.into();
        update.email = Set(contact.email.clone());
        update.first_name = Set(contact.first_name.clone());
        update.last_name = Set(contact.last_name.clone());
        update.password_hash = Set(password_hash);
        update.is_guest = Set(false);
        let promoted = update.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::GuestPromoted {
                identity_id: promoted.id,
                email: promoted.email.clone(),
            })
            .await;

        Ok(promoted)
    }
}
