//! Lazy factory lookup for provider adapters.
//!
//! Adapters are created per call, bound to one connected calendar, and
//! discarded afterwards; they hold only an HTTP client and credential
//! handles.

use domain::ConnectedCalendar;
use shared::types::ProviderKind;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::contract::{BidirectionalProvider, CalendarImporter, CalendarSyncer};
use crate::error::{ProviderError, ProviderResult};

type SyncerFactory =
    Arc<dyn Fn(&ConnectedCalendar) -> ProviderResult<Box<dyn CalendarSyncer>> + Send + Sync>;
type ImporterFactory =
    Arc<dyn Fn(&ConnectedCalendar) -> ProviderResult<Box<dyn CalendarImporter>> + Send + Sync>;
type BidirectionalFactory = Arc<
    dyn Fn(&ConnectedCalendar) -> ProviderResult<Box<dyn BidirectionalProvider>> + Send + Sync,
>;

/// Thread-safe mapping from provider kind to adapter factories
#[derive(Default)]
pub struct ProviderRegistry {
    syncers: RwLock<HashMap<ProviderKind, SyncerFactory>>,
    importers: RwLock<HashMap<ProviderKind, ImporterFactory>>,
    bidirectional: RwLock<HashMap<ProviderKind, BidirectionalFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a push-only factory
    pub fn register_syncer<F>(&self, kind: ProviderKind, factory: F)
    where
        F: Fn(&ConnectedCalendar) -> ProviderResult<Box<dyn CalendarSyncer>>
            + Send
            + Sync
            + 'static,
    {
        self.syncers.write().unwrap().insert(kind, Arc::new(factory));
    }

    /// Register a pull-only factory
    pub fn register_importer<F>(&self, kind: ProviderKind, factory: F)
    where
        F: Fn(&ConnectedCalendar) -> ProviderResult<Box<dyn CalendarImporter>>
            + Send
            + Sync
            + 'static,
    {
        self.importers
            .write()
            .unwrap()
            .insert(kind, Arc::new(factory));
    }

    /// Register a bidirectional factory.
    ///
    /// Also derives and stores syncer and importer factories so
    /// `create_syncer`/`create_importer` always find a producer for this
    /// kind.
    pub fn register_bidirectional<F, A>(&self, kind: ProviderKind, factory: F)
    where
        F: Fn(&ConnectedCalendar) -> ProviderResult<A> + Send + Sync + Clone + 'static,
        A: BidirectionalProvider + 'static,
    {
        let as_syncer = factory.clone();
        self.register_syncer(kind, move |calendar| {
            Ok(Box::new(as_syncer(calendar)?) as Box<dyn CalendarSyncer>)
        });

        let as_importer = factory.clone();
        self.register_importer(kind, move |calendar| {
            Ok(Box::new(as_importer(calendar)?) as Box<dyn CalendarImporter>)
        });

        self.bidirectional.write().unwrap().insert(
            kind,
            Arc::new(move |calendar| {
                Ok(Box::new(factory(calendar)?) as Box<dyn BidirectionalProvider>)
            }),
        );
    }

    /// Create a syncer bound to the given calendar
    pub fn create_syncer(
        &self,
        calendar: &ConnectedCalendar,
    ) -> ProviderResult<Box<dyn CalendarSyncer>> {
        let factory = self
            .syncers
            .read()
            .unwrap()
            .get(&calendar.provider())
            .cloned()
            .ok_or(ProviderError::NoSyncer(calendar.provider()))?;
        factory(calendar)
    }

    /// Create an importer bound to the given calendar
    pub fn create_importer(
        &self,
        calendar: &ConnectedCalendar,
    ) -> ProviderResult<Box<dyn CalendarImporter>> {
        let factory = self
            .importers
            .read()
            .unwrap()
            .get(&calendar.provider())
            .cloned()
            .ok_or(ProviderError::NoImporter(calendar.provider()))?;
        factory(calendar)
    }

    /// Create a bidirectional adapter bound to the given calendar
    pub fn create_bidirectional(
        &self,
        calendar: &ConnectedCalendar,
    ) -> ProviderResult<Box<dyn BidirectionalProvider>> {
        let factory = self
            .bidirectional
            .read()
            .unwrap()
            .get(&calendar.provider())
            .cloned()
            .ok_or(ProviderError::NoSyncer(calendar.provider()))?;
        factory(calendar)
    }

    /// Union of kinds with any registered factory
    pub fn supported_providers(&self) -> Vec<ProviderKind> {
        let mut kinds: HashSet<ProviderKind> = HashSet::new();
        kinds.extend(self.syncers.read().unwrap().keys().copied());
        kinds.extend(self.importers.read().unwrap().keys().copied());
        kinds.extend(self.bidirectional.read().unwrap().keys().copied());
        let mut kinds: Vec<ProviderKind> = kinds.into_iter().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::PushOutcome;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use domain::{CalendarSummary, ExternalEvent, TimeBlock};
    use shared::types::UserId;

    struct StubAdapter;

    #[async_trait]
    impl CalendarSyncer for StubAdapter {
        async fn push(
            &self,
            _user_id: UserId,
            _blocks: &[TimeBlock],
            _delete_missing: bool,
        ) -> ProviderResult<PushOutcome> {
            Ok(PushOutcome::default())
        }
    }

    #[async_trait]
    impl CalendarImporter for StubAdapter {
        async fn list_events(
            &self,
            _user_id: UserId,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _only_locally_originated: bool,
        ) -> ProviderResult<Vec<ExternalEvent>> {
            Ok(vec![])
        }

        async fn list_calendars(&self, _user_id: UserId) -> ProviderResult<Vec<CalendarSummary>> {
            Ok(vec![])
        }
    }

    fn calendar(kind: ProviderKind) -> ConnectedCalendar {
        let mut calendar =
            ConnectedCalendar::connect(UserId::new(), kind, "primary", "Work").unwrap();
        calendar.discard_events();
        calendar
    }

    #[test]
    fn test_bidirectional_registration_covers_both_tables() {
        let registry = ProviderRegistry::new();
        registry.register_bidirectional(ProviderKind::Google, |_| Ok(StubAdapter));

        let calendar = calendar(ProviderKind::Google);
        assert!(registry.create_syncer(&calendar).is_ok());
        assert!(registry.create_importer(&calendar).is_ok());
        assert!(registry.create_bidirectional(&calendar).is_ok());
    }

    #[test]
    fn test_missing_kind_errors() {
        let registry = ProviderRegistry::new();
        registry.register_bidirectional(ProviderKind::Google, |_| Ok(StubAdapter));

        let calendar = calendar(ProviderKind::Caldav);
        assert!(matches!(
            registry.create_syncer(&calendar),
            Err(ProviderError::NoSyncer(ProviderKind::Caldav))
        ));
        assert!(matches!(
            registry.create_importer(&calendar),
            Err(ProviderError::NoImporter(ProviderKind::Caldav))
        ));
    }

    #[test]
    fn test_supported_providers_union() {
        let registry = ProviderRegistry::new();
        registry.register_bidirectional(ProviderKind::Google, |_| Ok(StubAdapter));
        registry.register_importer(ProviderKind::Caldav, |_| {
            Ok(Box::new(StubAdapter) as Box<dyn CalendarImporter>)
        });

        let kinds = registry.supported_providers();
        assert_eq!(kinds, vec![ProviderKind::Caldav, ProviderKind::Google]);
    }
}
