//! App-usage accounting.
//!
//! Billing consumers want one event per change in what a process costs to
//! run: start, stop, and resizing while running. Creation is free; destroying
//! a running process is reported as a stop.

use procgrid_model::{Application, Process, ProcessState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ProcessContext;

/// Which buildpack a running process was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackAttribution {
    pub buildpack_name: Option<String>,
    pub buildpack_guid: Option<String>,
}

impl BuildpackAttribution {
    /// Custom buildpack URL if the app names one, else the buildpack the
    /// current droplet was detected with.
    pub fn from_context(ctx: &ProcessContext<'_>) -> Self {
        let receipt = ctx.desired_droplet().and_then(|d| d.buildpack_receipt.as_ref());
        let buildpack_name = ctx
            .app
            .custom_buildpack_url()
            .map(str::to_string)
            .or_else(|| receipt.map(|r| r.buildpack.clone()));

        Self {
            buildpack_name,
            buildpack_guid: receipt.and_then(|r| r.buildpack_guid.clone()),
        }
    }
}

/// One billing-relevant transition of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub guid: Uuid,
    pub process_guid: String,
    pub process_type: String,
    pub app_guid: String,
    pub app_name: String,
    pub space_guid: String,
    pub state: ProcessState,
    pub previous_state: Option<ProcessState>,
    pub instance_count: i32,
    pub previous_instance_count: Option<i32>,
    pub memory_in_mb_per_instance: i64,
    pub previous_memory_in_mb_per_instance: Option<i64>,
    #[serde(flatten)]
    pub buildpack: BuildpackAttribution,
}

impl UsageEvent {
    fn new(app: &Application, process: &Process, state: ProcessState, buildpack: BuildpackAttribution) -> Self {
        Self {
            guid: Uuid::new_v4(),
            process_guid: process.guid.clone(),
            process_type: process.process_type.clone(),
            app_guid: app.guid.clone(),
            app_name: app.name.clone(),
            space_guid: app.space_guid.clone(),
            state,
            previous_state: None,
            instance_count: process.instances,
            previous_instance_count: None,
            memory_in_mb_per_instance: process.memory_mb,
            previous_memory_in_mb_per_instance: None,
            buildpack,
        }
    }
}

/// Event for saving `next` over `previous`, if the change is billable.
pub fn usage_event_for_update(
    app: &Application,
    previous: &Process,
    next: &Process,
    buildpack: BuildpackAttribution,
) -> Option<UsageEvent> {
    let state_changed = previous.state != next.state;
    let resized = previous.instances != next.instances || previous.memory_mb != next.memory_mb;

    if !state_changed && !(resized && next.is_started()) {
        return None;
    }

    let mut event = UsageEvent::new(app, next, next.state, buildpack);
    event.previous_state = Some(previous.state);
    event.previous_instance_count = Some(previous.instances);
    event.previous_memory_in_mb_per_instance = Some(previous.memory_mb);
    Some(event)
}

/// Event for destroying `process`; only running processes are billed.
pub fn usage_event_for_destroy(
    app: &Application,
    process: &Process,
    buildpack: BuildpackAttribution,
) -> Option<UsageEvent> {
    if !process.is_started() {
        return None;
    }
    let mut event = UsageEvent::new(app, process, ProcessState::Stopped, buildpack);
    event.previous_state = Some(ProcessState::Started);
    Some(event)
}
