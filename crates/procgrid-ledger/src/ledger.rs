//! Process ledger: the caller layer around the resolver.
//!
//! Every save runs the quota chain against the current usage of the
//! process's space and organization, bumps the version when a tracked field
//! changed, and records a usage event when the change is billable.
//!
//! # Locking
//!
//! ```text
//! record mutex (one per process)
//!   └── footprints write lock (held across validate + commit)
//! ```
//!
//! Usage events are appended while the record mutex is held, so the event
//! log follows the order in which writes to one process committed.
//!
//! A save or destroy holds at most one record mutex, always acquired before
//! the footprints lock, so two writers cannot wait on each other. A writer
//! that was queued on the mutex of a record destroyed in the meantime fails
//! with `ProcessNotFound`.

use std::collections::HashMap;
use std::sync::Arc;

use procgrid_model::{
    Application, Droplet, Package, Process, ProcessGuid, QuotaScope, ResolverConfig, ScopeKind,
};
use procgrid_resolver::{
    BuildpackAttribution, ProcessContext, UsageEvent, ValidationInput, VersionPolicy, bump_if_needed,
    usage_event_for_destroy, usage_event_for_update, validate_input,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::tenancy::{Footprint, Organization, Space, scope_usage};

/// Supporting records a process is validated against.
#[derive(Default)]
struct Records {
    organizations: HashMap<String, Organization>,
    spaces: HashMap<String, Space>,
    apps: HashMap<String, Application>,
    packages: HashMap<String, Vec<Package>>,
    droplets: HashMap<String, Vec<Droplet>>,
}

/// Records resolved for one save.
struct Resolved {
    app: Application,
    organization_guid: String,
    organization: QuotaScope,
    space: Option<QuotaScope>,
    package: Option<Package>,
    droplets: Vec<Droplet>,
}

/// In-memory ledger of processes.
pub struct ProcessLedger {
    config: Arc<ResolverConfig>,
    records: Arc<RwLock<Records>>,
    processes: Arc<RwLock<HashMap<ProcessGuid, Arc<Mutex<Process>>>>>,
    footprints: Arc<RwLock<HashMap<ProcessGuid, Footprint>>>,
    events: Arc<Mutex<Vec<UsageEvent>>>,
}

impl ProcessLedger {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config: Arc::new(config),
            records: Arc::new(RwLock::new(Records::default())),
            processes: Arc::new(RwLock::new(HashMap::new())),
            footprints: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    // ── Supporting records ────────────────────────────────────────

    pub async fn put_organization(&self, organization: Organization) {
        let mut records = self.records.write().await;
        records.organizations.insert(organization.guid.clone(), organization);
    }

    pub async fn put_space(&self, space: Space) {
        let mut records = self.records.write().await;
        records.spaces.insert(space.guid.clone(), space);
    }

    pub async fn put_app(&self, app: Application) {
        let mut records = self.records.write().await;
        records.apps.insert(app.guid.clone(), app);
    }

    pub async fn put_package(&self, package: Package) {
        let mut records = self.records.write().await;
        records.packages.entry(package.app_guid.clone()).or_default().push(package);
    }

    pub async fn put_droplet(&self, droplet: Droplet) {
        let mut records = self.records.write().await;
        let droplets = records.droplets.entry(droplet.app_guid.clone()).or_default();
        droplets.retain(|d| d.guid != droplet.guid);
        droplets.push(droplet);
    }

    // ── Processes ─────────────────────────────────────────────────

    /// Insert a new process. Creation is validated but emits no usage event.
    pub async fn create(&self, process: Process) -> LedgerResult<Process> {
        let guid = process.guid.clone();
        let resolved = self.resolve(&process.app_guid).await?;

        let mut processes = self.processes.write().await;
        if processes.contains_key(&guid) {
            return Err(LedgerError::ProcessExists(guid));
        }

        let mut footprints = self.footprints.write().await;
        self.check(&process, &resolved, &footprints)?;
        footprints.insert(guid.clone(), Footprint::of(&process, &resolved.app, &resolved.organization_guid));
        processes.insert(guid.clone(), Arc::new(Mutex::new(process.clone())));

        info!(process = %guid, app = %process.app_guid, process_type = %process.process_type, "process created");
        Ok(process)
    }

    pub async fn get(&self, guid: &str) -> LedgerResult<Process> {
        let entry = self.entry(guid).await?;
        let process = entry.lock().await;
        Ok(process.clone())
    }

    /// All processes of an app, in no particular order.
    pub async fn processes_for_app(&self, app_guid: &str) -> Vec<Process> {
        let entries: Vec<_> = self.processes.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for entry in entries {
            let process = entry.lock().await;
            if process.app_guid == app_guid {
                out.push(process.clone());
            }
        }
        out
    }

    /// Save `update` over the stored record with version tracking on.
    pub async fn save(&self, update: Process) -> LedgerResult<Process> {
        self.save_with(update, VersionPolicy::Track).await
    }

    /// Save `update` over the stored record.
    ///
    /// On rejection the stored record, its footprint, and the event log are
    /// left untouched.
    pub async fn save_with(&self, mut update: Process, policy: VersionPolicy) -> LedgerResult<Process> {
        let mut current = self.lock_record(&update.guid).await?;

        if update.app_guid != current.app_guid {
            return Err(LedgerError::Immutable("app_guid"));
        }
        if update.process_type != current.process_type {
            return Err(LedgerError::Immutable("type"));
        }

        let resolved = self.resolve(&current.app_guid).await?;
        let mut footprints = self.footprints.write().await;
        if let Err(e) = self.check(&update, &resolved, &footprints) {
            warn!(process = %update.guid, error = %e, "save rejected");
            return Err(e);
        }

        update.version = bump_if_needed(&current, &update, policy);
        let attribution = attribution(&update, &resolved);
        let event = usage_event_for_update(&resolved.app, &current, &update, attribution);

        footprints.insert(
            update.guid.clone(),
            Footprint::of(&update, &resolved.app, &resolved.organization_guid),
        );
        drop(footprints);

        if update.version != current.version {
            info!(process = %update.guid, version = %update.version, "process version bumped");
        }
        *current = update.clone();

        if let Some(event) = event {
            debug!(process = %update.guid, state = ?event.state, "usage event recorded");
            self.events.lock().await.push(event);
        }
        drop(current);
        Ok(update)
    }

    /// Remove a process. The record is locked first so in-flight saves of
    /// the same process finish before it disappears; saves still queued on
    /// the record fail afterwards.
    pub async fn destroy(&self, guid: &str) -> LedgerResult<()> {
        let process = self.lock_record(guid).await?;

        let event = match self.resolve(&process.app_guid).await {
            Ok(resolved) => {
                let attribution = attribution(&process, &resolved);
                usage_event_for_destroy(&resolved.app, &process, attribution)
            }
            Err(e) => {
                debug!(process = %guid, error = %e, "destroying process without resolvable app");
                None
            }
        };

        self.processes.write().await.remove(guid);
        self.footprints.write().await.remove(guid);
        if let Some(event) = event {
            self.events.lock().await.push(event);
        }
        drop(process);

        info!(process = %guid, "process destroyed");
        Ok(())
    }

    // ── Usage events ──────────────────────────────────────────────

    pub async fn usage_events(&self) -> Vec<UsageEvent> {
        self.events.lock().await.clone()
    }

    /// Take every recorded event, leaving the log empty.
    pub async fn drain_usage_events(&self) -> Vec<UsageEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }

    // ── Internals ─────────────────────────────────────────────────

    async fn entry(&self, guid: &str) -> LedgerResult<Arc<Mutex<Process>>> {
        self.processes
            .read()
            .await
            .get(guid)
            .cloned()
            .ok_or_else(|| LedgerError::ProcessNotFound(guid.to_string()))
    }

    /// Lock the record of `guid`, failing if it was destroyed (or replaced)
    /// while this caller waited for the mutex.
    async fn lock_record(&self, guid: &str) -> LedgerResult<OwnedMutexGuard<Process>> {
        let entry = self.entry(guid).await?;
        let guard = Arc::clone(&entry).lock_owned().await;

        let live = self
            .processes
            .read()
            .await
            .get(guid)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));
        if !live {
            debug!(process = %guid, "record destroyed while waiting for its lock");
            return Err(LedgerError::ProcessNotFound(guid.to_string()));
        }
        Ok(guard)
    }

    async fn resolve(&self, app_guid: &str) -> LedgerResult<Resolved> {
        let records = self.records.read().await;
        let app = records
            .apps
            .get(app_guid)
            .cloned()
            .ok_or_else(|| LedgerError::AppNotFound(app_guid.to_string()))?;
        let space = records
            .spaces
            .get(&app.space_guid)
            .ok_or_else(|| LedgerError::SpaceNotFound(app.space_guid.clone()))?;
        let organization = records
            .organizations
            .get(&space.organization_guid)
            .ok_or_else(|| LedgerError::OrganizationNotFound(space.organization_guid.clone()))?;

        let package = records
            .packages
            .get(app_guid)
            .and_then(|packages| packages.iter().max_by_key(|p| p.created_at))
            .cloned();

        Ok(Resolved {
            organization_guid: organization.guid.clone(),
            organization: QuotaScope::organization(&organization.name, organization.quota.clone()),
            space: space
                .quota
                .clone()
                .map(|quota| QuotaScope::space(&space.name, quota)),
            package,
            droplets: records.droplets.get(app_guid).cloned().unwrap_or_default(),
            app,
        })
    }

    fn check(
        &self,
        process: &Process,
        resolved: &Resolved,
        footprints: &HashMap<ProcessGuid, Footprint>,
    ) -> LedgerResult<()> {
        let organization = resolved.organization.clone().with_usage(scope_usage(
            footprints,
            ScopeKind::Organization,
            &resolved.organization_guid,
            &process.guid,
        ));
        let space = resolved.space.clone().map(|scope| {
            scope.with_usage(scope_usage(
                footprints,
                ScopeKind::Space,
                &resolved.app.space_guid,
                &process.guid,
            ))
        });

        let input = ValidationInput::new(process, &self.config)
            .with_app(&resolved.app)
            .with_package(resolved.package.as_ref())
            .with_scopes(Some(&organization), space.as_ref());
        validate_input(&input)?;
        Ok(())
    }
}

fn attribution(process: &Process, resolved: &Resolved) -> BuildpackAttribution {
    let ctx = ProcessContext {
        droplets: &resolved.droplets,
        ..ProcessContext::new(process, &resolved.app)
    };
    BuildpackAttribution::from_context(&ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use procgrid_model::{Lifecycle, ProcessState, QuotaDefinition, UNLIMITED};

    fn quota(memory_limit_mb: i64) -> QuotaDefinition {
        QuotaDefinition {
            memory_limit_mb,
            ..QuotaDefinition::unlimited("default")
        }
    }

    async fn ledger(org_memory: i64, space_memory: Option<i64>) -> ProcessLedger {
        let ledger = ProcessLedger::new(ResolverConfig::default());
        ledger
            .put_organization(Organization {
                guid: "org-1".to_string(),
                name: "acme".to_string(),
                quota: quota(org_memory),
            })
            .await;
        ledger
            .put_space(Space {
                guid: "space-1".to_string(),
                name: "hi".to_string(),
                organization_guid: "org-1".to_string(),
                quota: space_memory.map(quota),
            })
            .await;
        ledger
            .put_app(Application {
                guid: "app-1".to_string(),
                name: "app".to_string(),
                space_guid: "space-1".to_string(),
                lifecycle: Lifecycle::Buildpack { buildpacks: Vec::new(), stack: None },
                environment: BTreeMap::new(),
                droplet_guid: None,
                revisions_enabled: true,
                sidecars: Vec::new(),
            })
            .await;
        ledger
    }

    fn process(guid: &str, memory_mb: i64, instances: i32) -> Process {
        let mut p = Process::new(guid, "app-1", "web", &ResolverConfig::default());
        p.memory_mb = memory_mb;
        p.instances = instances;
        p
    }

    #[tokio::test]
    async fn create_then_get() {
        let ledger = ledger(UNLIMITED, None).await;
        ledger.create(process("p1", 64, 1)).await.unwrap();

        let stored = ledger.get("p1").await.unwrap();
        assert_eq!(stored.memory_mb, 64);
        assert!(ledger.usage_events().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let ledger = ledger(UNLIMITED, None).await;
        ledger.create(process("p1", 64, 1)).await.unwrap();
        let err = ledger.create(process("p1", 64, 1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::ProcessExists(_)));
    }

    #[tokio::test]
    async fn create_requires_known_app() {
        let ledger = ledger(UNLIMITED, None).await;
        let mut p = process("p1", 64, 1);
        p.app_guid = "ghost".to_string();
        let err = ledger.create(p).await.unwrap_err();
        assert!(matches!(err, LedgerError::AppNotFound(_)));
    }

    #[tokio::test]
    async fn start_records_event_and_bumps_version() {
        let ledger = ledger(UNLIMITED, None).await;
        let created = ledger.create(process("p1", 64, 1)).await.unwrap();

        let mut update = created.clone();
        update.state = ProcessState::Started;
        let saved = ledger.save(update).await.unwrap();

        assert!(saved.version.generation > created.version.generation);
        let events = ledger.usage_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, ProcessState::Started);
    }

    #[tokio::test]
    async fn rejected_save_leaves_record_untouched() {
        let ledger = ledger(128, None).await;
        let mut p = process("p1", 64, 1);
        p.state = ProcessState::Started;
        let created = ledger.create(p).await.unwrap();

        let mut update = created.clone();
        update.instances = 3;
        let err = ledger.save(update).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        assert_eq!(ledger.get("p1").await.unwrap(), created);
        assert!(ledger.usage_events().await.is_empty());
    }

    #[tokio::test]
    async fn other_processes_count_toward_quota() {
        let ledger = ledger(UNLIMITED, Some(192)).await;
        let mut first = process("p1", 128, 1);
        first.state = ProcessState::Started;
        ledger.create(first).await.unwrap();

        let second = ledger.create(process("p2", 64, 1)).await.unwrap();
        let mut start = second.clone();
        start.state = ProcessState::Started;
        ledger.save(start.clone()).await.unwrap();

        let mut grow = ledger.get("p2").await.unwrap();
        grow.memory_mb = 65;
        let err = ledger.save(grow).await.unwrap_err();
        assert!(err.to_string().contains("quota_exceeded in space"));
    }

    #[tokio::test]
    async fn destroy_started_process_emits_stop() {
        let ledger = ledger(UNLIMITED, None).await;
        let mut p = process("p1", 64, 1);
        p.state = ProcessState::Started;
        ledger.create(p).await.unwrap();

        ledger.destroy("p1").await.unwrap();
        assert!(matches!(ledger.get("p1").await, Err(LedgerError::ProcessNotFound(_))));

        let events = ledger.drain_usage_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, ProcessState::Stopped);
        assert!(ledger.usage_events().await.is_empty());
    }

    #[tokio::test]
    async fn destroy_stopped_process_is_silent() {
        let ledger = ledger(UNLIMITED, None).await;
        ledger.create(process("p1", 64, 1)).await.unwrap();
        ledger.destroy("p1").await.unwrap();
        assert!(ledger.usage_events().await.is_empty());
    }

    #[tokio::test]
    async fn save_queued_behind_destroy_fails() {
        let ledger = Arc::new(ledger(128, None).await);
        let mut p = process("p1", 64, 1);
        p.state = ProcessState::Started;
        ledger.create(p).await.unwrap();

        let entry = ledger.entry("p1").await.unwrap();
        let held = entry.lock().await;

        let destroy = tokio::spawn({
            let ledger = Arc::clone(&ledger);
            async move { ledger.destroy("p1").await }
        });
        tokio::task::yield_now().await;

        let save = tokio::spawn({
            let ledger = Arc::clone(&ledger);
            async move {
                let mut update = process("p1", 100, 1);
                update.state = ProcessState::Started;
                ledger.save(update).await
            }
        });
        tokio::task::yield_now().await;
        drop(held);

        destroy.await.unwrap().unwrap();
        assert!(matches!(save.await.unwrap(), Err(LedgerError::ProcessNotFound(_))));
        assert!(ledger.footprints.read().await.is_empty());

        let states: Vec<_> = ledger.usage_events().await.iter().map(|e| e.state).collect();
        assert_eq!(states, vec![ProcessState::Stopped]);

        let mut fresh = process("p2", 64, 1);
        fresh.state = ProcessState::Started;
        ledger.create(fresh).await.unwrap();
    }

    #[tokio::test]
    async fn second_destroy_fails() {
        let ledger = ledger(UNLIMITED, None).await;
        let mut p = process("p1", 64, 1);
        p.state = ProcessState::Started;
        ledger.create(p).await.unwrap();

        ledger.destroy("p1").await.unwrap();
        assert!(matches!(ledger.destroy("p1").await, Err(LedgerError::ProcessNotFound(_))));
        assert_eq!(ledger.usage_events().await.len(), 1);
    }

    #[tokio::test]
    async fn skip_policy_keeps_version() {
        let ledger = ledger(UNLIMITED, None).await;
        let created = ledger.create(process("p1", 64, 1)).await.unwrap();
        let mut update = created.clone();
        update.memory_mb = 128;
        let saved = ledger.save_with(update, VersionPolicy::Skip).await.unwrap();
        assert_eq!(saved.version, created.version);
    }

    #[tokio::test]
    async fn type_is_immutable() {
        let ledger = ledger(UNLIMITED, None).await;
        let created = ledger.create(process("p1", 64, 1)).await.unwrap();
        let mut update = created;
        update.process_type = "worker".to_string();
        assert!(matches!(ledger.save(update).await, Err(LedgerError::Immutable("type"))));
    }
}
