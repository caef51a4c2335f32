//! Revocation engine.
//!
//! Performs the side effects that end a grant: taking the attribute away
//! from the subject and, for ephemeral grants, deleting the attribute once
//! nobody in the scope holds it. Every path into revocation (timer expiry,
//! external removal, stale detection on load) goes through
//! [`RevocationEngine::revoke`], which serializes on the grant's own lock and
//! checks the terminal flag first. Side effects therefore run at most once
//! per grant no matter how many paths race.
//!
//! ## Outcomes
//!
//! | Situation                      | Outcome             | Terminal |
//! |--------------------------------|---------------------|----------|
//! | Already resolved               | `AlreadyTerminal`   | yes      |
//! | Attribute no longer exists     | `AttributeMissing`  | yes      |
//! | Subject cannot be resolved     | `SubjectUnresolved` | no       |
//! | Attribute removed              | `Revoked`           | yes      |
//! | Directory call failed          | `Err(..)`           | no       |

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use timegrant_core::RevocationReason;
use timegrant_directory::{Directory, DirectoryError};

use crate::error::Result;
use crate::grant::LiveGrant;
use crate::scheduler::ExpirationScheduler;

/// What a revocation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The attribute was taken away. `destroyed` is set when an ephemeral
    /// attribute was deleted as well.
    Revoked { destroyed: bool },
    /// Another path already resolved the grant. Nothing was done.
    AlreadyTerminal,
    /// The attribute is gone; the grant was resolved without side effects.
    AttributeMissing,
    /// The subject could not be resolved. The grant stays live.
    SubjectUnresolved,
}

impl RevokeOutcome {
    /// Whether this call is the one that resolved the grant.
    pub fn resolved(self) -> bool {
        matches!(
            self,
            RevokeOutcome::Revoked { .. } | RevokeOutcome::AttributeMissing
        )
    }
}

/// Drives grant revocation against a directory.
pub struct RevocationEngine<D: Directory> {
    directory: Arc<D>,
    scheduler: ExpirationScheduler,
    unresolved_retry: Option<Duration>,
}

impl<D: Directory + 'static> RevocationEngine<D> {
    pub fn new(
        directory: Arc<D>,
        scheduler: ExpirationScheduler,
        unresolved_retry: Option<Duration>,
    ) -> Self {
        Self {
            directory,
            scheduler,
            unresolved_retry,
        }
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    pub fn scheduler(&self) -> &ExpirationScheduler {
        &self.scheduler
    }

    /// End a grant for `reason`.
    ///
    /// Idempotent: once the grant is terminal, further calls return
    /// [`RevokeOutcome::AlreadyTerminal`] without touching the directory.
    pub async fn revoke(&self, grant: &LiveGrant, reason: RevocationReason) -> Result<RevokeOutcome> {
        let _guard = grant.lock().await;
        if grant.is_terminal() {
            return Ok(RevokeOutcome::AlreadyTerminal);
        }

        let key = grant.key();
        let record = grant.record();

        if !self.directory.attribute_exists(record.attribute).await? {
            error!(
                grant = %grant.id(),
                scope = %key.scope,
                subject = %record.subject,
                attribute = %record.attribute,
                %reason,
                "unable to revoke grant: attribute no longer exists"
            );
            self.resolve(grant, reason);
            return Ok(RevokeOutcome::AttributeMissing);
        }

        if reason == RevocationReason::Cancelled {
            self.scheduler.cancel(grant.id());
        }

        let Some(subject) = self.directory.resolve_subject(record.subject).await? else {
            warn!(
                grant = %grant.id(),
                scope = %key.scope,
                subject = %record.subject,
                attribute = %record.attribute,
                %reason,
                "unable to revoke grant: subject cannot be resolved"
            );
            return Ok(RevokeOutcome::SubjectUnresolved);
        };

        match reason {
            RevocationReason::Expired => info!(
                scope = %key.scope,
                subject = %subject.name,
                attribute = %record.attribute,
                "temporary attribute expired"
            ),
            RevocationReason::Cancelled => info!(
                scope = %key.scope,
                subject = %subject.name,
                attribute = %record.attribute,
                "temporary attribute removed externally"
            ),
            RevocationReason::Stale => info!(
                scope = %key.scope,
                subject = %subject.name,
                attribute = %record.attribute,
                "temporary attribute is outdated"
            ),
        }

        match self
            .directory
            .remove_attribute(key.scope, &subject, record.attribute)
            .await
        {
            Ok(()) => {}
            Err(DirectoryError::AttributeNotFound(_)) => {
                error!(
                    grant = %grant.id(),
                    attribute = %record.attribute,
                    %reason,
                    "attribute disappeared during revocation"
                );
                self.resolve(grant, reason);
                return Ok(RevokeOutcome::AttributeMissing);
            }
            Err(e) => return Err(e.into()),
        }

        let mut destroyed = false;
        if record.ephemeral
            && self
                .directory
                .list_holders(key.scope, record.attribute)
                .await?
                .is_empty()
        {
            match self.directory.destroy_attribute(record.attribute).await {
                Ok(()) => {
                    info!(
                        scope = %key.scope,
                        attribute = %record.attribute,
                        "deleted ephemeral attribute"
                    );
                    destroyed = true;
                }
                Err(DirectoryError::AttributeNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.resolve(grant, reason);
        Ok(RevokeOutcome::Revoked { destroyed })
    }

    /// Start the grant's expiry timer, or revoke right away if it is due.
    pub async fn arm(self: &Arc<Self>, grant: &Arc<LiveGrant>) {
        let now = Utc::now();
        let record = grant.record();
        if record.is_past_due(now) {
            debug!(grant = %grant.id(), expires_at = %record.expires_at, "grant already due");
            Arc::clone(self).expire(Arc::clone(grant)).await;
        } else {
            let delay = record.remaining(now);
            debug!(grant = %grant.id(), expires_at = %record.expires_at, ?delay, "armed expiry timer");
            self.schedule_expiry(grant, delay);
        }
    }

    fn schedule_expiry(self: &Arc<Self>, grant: &Arc<LiveGrant>, delay: Duration) {
        let engine = Arc::clone(self);
        self.scheduler
            .schedule(grant, delay, move |grant| engine.expire(grant));
    }

    async fn expire(self: Arc<Self>, grant: Arc<LiveGrant>) {
        let retry = match self.revoke(&grant, RevocationReason::Expired).await {
            Ok(RevokeOutcome::SubjectUnresolved) => true,
            Ok(_) => false,
            Err(e) => {
                error!(grant = %grant.id(), error = %e, "failed to revoke expired grant");
                true
            }
        };

        if let (true, Some(delay)) = (retry, self.unresolved_retry) {
            debug!(grant = %grant.id(), ?delay, "retrying expiry later");
            self.schedule_expiry(&grant, delay);
        }
    }

    fn resolve(&self, grant: &LiveGrant, reason: RevocationReason) {
        grant.finish(reason);
        self.scheduler.cancel(grant.id());
    }
}

impl<D: Directory> std::fmt::Debug for RevocationEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationEngine")
            .field("scheduler", &self.scheduler)
            .field("unresolved_retry", &self.unresolved_retry)
            .finish()
    }
}
