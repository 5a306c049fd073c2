//! Transactional disconnect of external calendars

use shared::errors::DomainError;
use shared::types::{CalendarId, ProviderKind, UserId};
use std::sync::Arc;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::store::CalendarStore;

pub struct DisconnectService {
    store: Arc<dyn CalendarStore>,
}

impl DisconnectService {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    /// Disconnect every calendar a user has for one provider. Emits
    /// `calendar.disconnected` per calendar and drops the provider's stored
    /// credentials.
    pub async fn disconnect_by_provider(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ServiceResult<u32> {
        let mut calendars = self.store.find_by_user_provider(user_id, provider).await?;
        if calendars.is_empty() {
            return Ok(0);
        }

        for calendar in calendars.iter_mut() {
            calendar.mark_disconnected();
        }
        self.store.delete_with_events(&mut calendars).await?;
        self.store.remove_credentials(user_id, provider).await?;

        info!(
            user_id = %user_id,
            provider = %provider,
            count = calendars.len(),
            "disconnected calendars"
        );
        Ok(calendars.len() as u32)
    }

    /// Disconnect one calendar by id. A calendar belonging to another owner
    /// reports the same generic error as a missing one, so existence never
    /// leaks across owners.
    pub async fn disconnect_by_id(
        &self,
        user_id: UserId,
        calendar_id: CalendarId,
    ) -> ServiceResult<()> {
        let calendar = self.store.find_by_id(calendar_id).await?;
        let mut calendar = match calendar {
            Some(calendar) if calendar.user_id() == user_id => calendar,
            // Cross-owner lookups get the generic denial
            Some(_) => return Err(ServiceError::Domain(DomainError::AccessDenied)),
            None => {
                return Err(ServiceError::Domain(DomainError::CalendarNotFound(
                    calendar_id.to_string(),
                )))
            }
        };

        let provider = calendar.provider();
        calendar.mark_disconnected();
        let mut batch = vec![calendar];
        self.store.delete_with_events(&mut batch).await?;

        // Drop credentials once the last calendar of the provider is gone
        if self
            .store
            .find_by_user_provider(user_id, provider)
            .await?
            .is_empty()
        {
            self.store.remove_credentials(user_id, provider).await?;
        }

        info!(user_id = %user_id, calendar_id = %calendar_id, "disconnected calendar");
        Ok(())
    }
}
