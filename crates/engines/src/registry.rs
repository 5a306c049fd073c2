//! Engine registry with lazy loading and lifecycle states

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::manifest::Manifest;
use crate::sdk::{Engine, EngineKind};

pub type EngineFactory = Arc<dyn Fn() -> EngineResult<Arc<dyn Engine>> + Send + Sync>;

/// Lifecycle of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
    Shutdown,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Unloaded => write!(f, "unloaded"),
            EngineStatus::Loading => write!(f, "loading"),
            EngineStatus::Ready => write!(f, "ready"),
            EngineStatus::Failed => write!(f, "failed"),
            EngineStatus::Shutdown => write!(f, "shutdown"),
        }
    }
}

struct EngineEntry {
    kind: EngineKind,
    status: EngineStatus,
    builtin: bool,
    manifest: Option<Manifest>,
    last_error: Option<String>,
    instance: Option<Arc<dyn Engine>>,
    factory: Option<EngineFactory>,
}

/// Summary row for listings
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub id: String,
    pub kind: EngineKind,
    pub status: EngineStatus,
    pub builtin: bool,
}

#[derive(Default)]
pub struct EngineRegistry {
    entries: RwLock<HashMap<String, EngineEntry>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine instance that ships with the runtime. Built-in
    /// engines start ready and cannot be unregistered.
    pub fn register_builtin(&self, engine: Arc<dyn Engine>) -> EngineResult<()> {
        let metadata = engine.metadata();
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&metadata.id) {
            return Err(EngineError::AlreadyRegistered(metadata.id));
        }
        info!(id = %metadata.id, kind = %metadata.kind, "registered built-in engine");
        entries.insert(
            metadata.id.clone(),
            EngineEntry {
                kind: metadata.kind,
                status: EngineStatus::Ready,
                builtin: true,
                manifest: None,
                last_error: None,
                instance: Some(engine),
                factory: None,
            },
        );
        Ok(())
    }

    /// Register a discovered engine by factory; the instance is created on
    /// first access.
    pub fn register_factory(
        &self,
        manifest: Manifest,
        factory: EngineFactory,
    ) -> EngineResult<()> {
        let kind = manifest.engine_kind()?;
        let mut entries = self.entries.write().unwrap();
        if entries.contains_key(&manifest.id) {
            return Err(EngineError::AlreadyRegistered(manifest.id));
        }
        info!(id = %manifest.id, kind = %kind, "registered engine factory");
        entries.insert(
            manifest.id.clone(),
            EngineEntry {
                kind,
                status: EngineStatus::Unloaded,
                builtin: false,
                manifest: Some(manifest),
                last_error: None,
                instance: None,
                factory: Some(factory),
            },
        );
        Ok(())
    }

    /// Get an engine, loading it on first access.
    ///
    /// A failed load is sticky: the stored error is returned on subsequent
    /// calls without re-invoking the factory.
    pub fn get(&self, id: &str) -> EngineResult<Arc<dyn Engine>> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        match entry.status {
            EngineStatus::Ready => entry
                .instance
                .clone()
                .ok_or_else(|| EngineError::LoadFailed {
                    id: id.to_string(),
                    message: "ready entry has no instance".to_string(),
                }),
            EngineStatus::Failed => Err(EngineError::LoadFailed {
                id: id.to_string(),
                message: entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown load failure".to_string()),
            }),
            EngineStatus::Shutdown => Err(EngineError::ShutDown(id.to_string())),
            EngineStatus::Loading => Err(EngineError::LoadFailed {
                id: id.to_string(),
                message: "load already in progress".to_string(),
            }),
            EngineStatus::Unloaded => {
                let Some(factory) = entry.factory.clone() else {
                    entry.status = EngineStatus::Failed;
                    entry.last_error = Some("no factory registered".to_string());
                    return Err(EngineError::LoadFailed {
                        id: id.to_string(),
                        message: "no factory registered".to_string(),
                    });
                };
                entry.status = EngineStatus::Loading;

                match factory() {
                    Ok(instance) => {
                        entry.status = EngineStatus::Ready;
                        entry.instance = Some(instance.clone());
                        info!(id = %id, "engine loaded");
                        Ok(instance)
                    }
                    Err(e) => {
                        let message = e.to_string();
                        entry.status = EngineStatus::Failed;
                        entry.last_error = Some(message.clone());
                        warn!(id = %id, error = %message, "engine failed to load");
                        Err(EngineError::LoadFailed {
                            id: id.to_string(),
                            message,
                        })
                    }
                }
            }
        }
    }

    pub fn status(&self, id: &str) -> Option<EngineStatus> {
        self.entries.read().unwrap().get(id).map(|e| e.status)
    }

    pub fn manifest(&self, id: &str) -> Option<Manifest> {
        self.entries
            .read()
            .unwrap()
            .get(id)
            .and_then(|e| e.manifest.clone())
    }

    pub fn list(&self) -> Vec<EngineInfo> {
        let entries = self.entries.read().unwrap();
        let mut infos: Vec<EngineInfo> = entries
            .iter()
            .map(|(id, entry)| EngineInfo {
                id: id.clone(),
                kind: entry.kind,
                status: entry.status,
                builtin: entry.builtin,
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Engines of one kind that are not failed or shut down
    pub fn available_by_kind(&self, kind: EngineKind) -> Vec<String> {
        let entries = self.entries.read().unwrap();
        let mut ids: Vec<String> = entries
            .iter()
            .filter(|(_, e)| {
                e.kind == kind
                    && matches!(e.status, EngineStatus::Ready | EngineStatus::Unloaded)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Remove an engine registration. Built-in entries are protected.
    pub fn unregister(&self, id: &str) -> EngineResult<()> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        if entry.builtin {
            return Err(EngineError::BuiltinProtected(id.to_string()));
        }
        entries.remove(id);
        Ok(())
    }

    /// Shut down every ready engine, accumulating failures instead of
    /// aborting on the first one.
    pub async fn shutdown_all(&self) -> Vec<String> {
        let ready: Vec<(String, Arc<dyn Engine>)> = {
            let entries = self.entries.read().unwrap();
            entries
                .iter()
                .filter(|(_, e)| e.status == EngineStatus::Ready)
                .filter_map(|(id, e)| e.instance.clone().map(|i| (id.clone(), i)))
                .collect()
        };

        let mut errors = Vec::new();
        for (id, engine) in ready {
            if let Err(e) = engine.shutdown().await {
                warn!(id = %id, error = %e, "engine shutdown failed");
                errors.push(format!("{}: {}", id, e));
            }
            let mut entries = self.entries.write().unwrap();
            if let Some(entry) = entries.get_mut(&id) {
                entry.status = EngineStatus::Shutdown;
                entry.instance = None;
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{EngineMetadata, EngineRequest, EngineResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticEngine {
        id: &'static str,
    }

    #[async_trait]
    impl Engine for StaticEngine {
        fn metadata(&self) -> EngineMetadata {
            EngineMetadata {
                id: self.id.to_string(),
                name: "Static".to_string(),
                version: "1.0.0".to_string(),
                kind: EngineKind::Classifier,
                description: String::new(),
                capabilities: vec![],
                tags: vec![],
            }
        }

        async fn execute(&self, _request: EngineRequest) -> EngineResult<EngineResponse> {
            Ok(EngineResponse {
                payload: serde_json::json!({"ok": true}),
            })
        }
    }

    fn manifest(id: &str) -> Manifest {
        serde_json::from_str(&format!(
            r#"{{"id": "{}", "name": "X", "version": "1.0.0", "kind": "classifier", "min_sdk_version": "1.0.0"}}"#,
            id
        ))
        .unwrap()
    }

    #[test]
    fn test_lazy_load_transitions_to_ready() {
        let registry = EngineRegistry::new();
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        registry
            .register_factory(
                manifest("acme.lazy"),
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(StaticEngine { id: "acme.lazy" }) as Arc<dyn Engine>)
                }),
            )
            .unwrap();

        assert_eq!(registry.status("acme.lazy"), Some(EngineStatus::Unloaded));
        assert!(registry.get("acme.lazy").is_ok());
        assert_eq!(registry.status("acme.lazy"), Some(EngineStatus::Ready));

        // Cached on second access
        assert!(registry.get("acme.lazy").is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_sticky() {
        let registry = EngineRegistry::new();
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        registry
            .register_factory(
                manifest("acme.broken"),
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::Execution("init exploded".to_string()))
                }),
            )
            .unwrap();

        let first = registry.get("acme.broken");
        assert!(matches!(first, Err(EngineError::LoadFailed { .. })));
        assert_eq!(registry.status("acme.broken"), Some(EngineStatus::Failed));

        // The stored error comes back without re-invoking the factory
        let second = registry.get("acme.broken");
        match second {
            Err(EngineError::LoadFailed { message, .. }) => {
                assert!(message.contains("init exploded"));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_engine_not_found() {
        let registry = EngineRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(EngineError::NotFound(_))
        ));
        assert!(registry.status("missing").is_none());
    }

    #[test]
    fn test_builtin_cannot_be_unregistered() {
        let registry = EngineRegistry::new();
        registry
            .register_builtin(Arc::new(StaticEngine { id: "orbita.builtin" }))
            .unwrap();
        assert_eq!(
            registry.status("orbita.builtin"),
            Some(EngineStatus::Ready)
        );
        assert!(matches!(
            registry.unregister("orbita.builtin"),
            Err(EngineError::BuiltinProtected(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = EngineRegistry::new();
        registry
            .register_builtin(Arc::new(StaticEngine { id: "dup" }))
            .unwrap();
        let result = registry.register_factory(
            manifest("dup"),
            Arc::new(|| Ok(Arc::new(StaticEngine { id: "dup" }) as Arc<dyn Engine>)),
        );
        assert!(matches!(result, Err(EngineError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_shutdown_all_moves_ready_to_shutdown() {
        let registry = EngineRegistry::new();
        registry
            .register_builtin(Arc::new(StaticEngine { id: "one" }))
            .unwrap();
        registry
            .register_builtin(Arc::new(StaticEngine { id: "two" }))
            .unwrap();

        let errors = registry.shutdown_all().await;
        assert!(errors.is_empty());
        assert_eq!(registry.status("one"), Some(EngineStatus::Shutdown));
        assert_eq!(registry.status("two"), Some(EngineStatus::Shutdown));
        assert!(matches!(registry.get("one"), Err(EngineError::ShutDown(_))));
    }
}
