//! The dispatcher — owns every scheduled task, applies the idle gate, and
//! keeps the persistent last-run state current.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use majordomo_core::config::{ScheduledTaskConfig, CRON_CHECK_SECS};

use crate::error::{Result, SchedulerError};
use crate::schedule::{next_cron_after, parse_slot, Slot};
use crate::state::SchedulerState;
use crate::types::{RegisteredTask, SessionGate, TaskStatus};

struct BoundTask {
    task: RegisteredTask,
    slot: Slot,
    /// Advanced only after a run actually executed; a gated skip leaves it
    /// in place so the task retries on the next check.
    next_fire: Mutex<Option<DateTime<Utc>>>,
}

struct Inner {
    gate: Arc<dyn SessionGate>,
    registry: RwLock<HashMap<String, RegisteredTask>>,
    bound: RwLock<Vec<Arc<BoundTask>>>,
    state: Arc<Mutex<SchedulerState>>,
}

/// Single dispatcher owning all scheduled tasks.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(gate: Arc<dyn SessionGate>, state_path: std::path::PathBuf) -> Result<Self> {
        let state = SchedulerState::load(state_path)?;
        Ok(Self {
            inner: Arc::new(Inner {
                gate,
                registry: RwLock::new(HashMap::new()),
                bound: RwLock::new(Vec::new()),
                state: Arc::new(Mutex::new(state)),
            }),
        })
    }

    /// Register a task implementation under its well-known name.
    pub fn register(&self, task: RegisteredTask) {
        let mut registry = self.inner.registry.write().expect("registry poisoned");
        if registry.insert(task.name.clone(), task).is_some() {
            warn!("task re-registered, previous implementation replaced");
        }
    }

    /// Bind registered tasks to the enabled schedule entries from config.
    ///
    /// Mismatches are warnings, not errors: a config entry without an
    /// implementation is skipped; a registered task without a config entry
    /// simply never fires on its own.
    pub fn bind(&self, configs: &[ScheduledTaskConfig]) {
        let registry = self.inner.registry.read().expect("registry poisoned");
        let mut bound = Vec::new();
        let now = Utc::now();

        for cfg in configs {
            if !cfg.enabled {
                info!(task = %cfg.name, "task disabled in config");
                continue;
            }
            let Some(task) = registry.get(&cfg.name) else {
                warn!(task = %cfg.name, "scheduled task has no registered implementation");
                continue;
            };
            let slot = match parse_slot(cfg) {
                Ok(s) => s,
                Err(e) => {
                    warn!(task = %cfg.name, error = %e, "invalid schedule, task not bound");
                    continue;
                }
            };

            let last_run = self
                .inner
                .state
                .lock()
                .expect("state poisoned")
                .record(&cfg.name)
                .last_run();

            let next_fire = match &slot {
                Slot::Interval(d) => {
                    Some(now + chrono::Duration::from_std(*d).unwrap_or_default())
                }
                // With restored state the next fire comes after the recorded
                // run — a fire missed during downtime is caught up once. A
                // missing state file schedules strictly after now, so there
                // are no spurious fires on first start.
                Slot::Cron(s) => next_cron_after(s, last_run.unwrap_or(now)),
            };

            info!(task = %cfg.name, schedule = %slot.describe(), "task bound");
            bound.push(Arc::new(BoundTask {
                task: task.clone(),
                slot,
                next_fire: Mutex::new(next_fire),
            }));
        }

        for name in registry.keys() {
            if !configs.iter().any(|c| c.name == *name && c.enabled) {
                debug!(task = %name, "registered task has no enabled schedule");
            }
        }

        *self.inner.bound.write().expect("bound poisoned") = bound;
    }

    /// Main loop: interval tasks are checked every second, cron tasks every
    /// [`CRON_CHECK_SECS`]. Each due task runs in its own Tokio task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler started");
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_cron_check = Utc::now();

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = Utc::now();
                    let check_cron =
                        (now - last_cron_check).num_seconds() >= CRON_CHECK_SECS as i64;
                    if check_cron {
                        last_cron_check = now;
                    }
                    let _handles = self.tick_once(now, check_cron).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One dispatcher pass. Returns handles of the launched task executions.
    pub async fn tick_once(
        &self,
        now: DateTime<Utc>,
        check_cron: bool,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let bound: Vec<Arc<BoundTask>> = self
            .inner
            .bound
            .read()
            .expect("bound poisoned")
            .clone();
        let mut handles = Vec::new();

        for bt in bound {
            if matches!(&bt.slot, Slot::Cron(_)) && !check_cron {
                continue;
            }

            let due = {
                let next = bt.next_fire.lock().expect("next_fire poisoned");
                matches!(*next, Some(t) if t <= now)
            };
            if !due {
                continue;
            }

            if bt.task.requires_session {
                if !self.inner.gate.is_idle() {
                    debug!(task = %bt.task.name, "skip: agent busy");
                    continue;
                }
                if !self.inner.gate.session_exists().await {
                    debug!(task = %bt.task.name, "skip: session missing");
                    continue;
                }
            }

            // The run executes — only now is the schedule advanced.
            {
                let mut next = bt.next_fire.lock().expect("next_fire poisoned");
                *next = match &bt.slot {
                    Slot::Interval(d) => {
                        Some(now + chrono::Duration::from_std(*d).unwrap_or_default())
                    }
                    Slot::Cron(s) => next_cron_after(s, now),
                };
            }

            handles.push(self.launch(bt.task.clone(), now));
        }

        handles
    }

    /// Execute one task in its own Tokio task; failures are recorded, never
    /// propagated to the dispatcher loop.
    fn launch(&self, task: RegisteredTask, started: DateTime<Utc>) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.inner.state);
        tokio::spawn(async move {
            info!(task = %task.name, "executing scheduled task");
            let outcome = match (task.run)().await {
                Ok(output) => Ok(output),
                Err(e) => {
                    error!(task = %task.name, error = %e, "task failed");
                    Err(e.to_string())
                }
            };
            state
                .lock()
                .expect("state poisoned")
                .record_run(&task.name, started, &outcome);
        })
    }

    /// Manual trigger — bypasses the idle gate and leaves the cron schedule
    /// untouched.
    pub async fn run_now(&self, name: &str) -> Result<String> {
        let task = {
            let registry = self.inner.registry.read().expect("registry poisoned");
            registry
                .get(name)
                .cloned()
                .ok_or_else(|| SchedulerError::TaskNotFound(name.to_string()))?
        };

        info!(task = %name, "manual trigger");
        let started = Utc::now();
        let outcome = match (task.run)().await {
            Ok(output) => Ok(output),
            Err(e) => Err(e.to_string()),
        };
        self.inner
            .state
            .lock()
            .expect("state poisoned")
            .record_run(name, started, &outcome);

        outcome.map_err(|reason| SchedulerError::TaskFailed {
            name: name.to_string(),
            reason,
        })
    }

    /// Status rows for every bound task.
    pub fn list(&self) -> Vec<TaskStatus> {
        let state = self.inner.state.lock().expect("state poisoned");
        self.inner
            .bound
            .read()
            .expect("bound poisoned")
            .iter()
            .map(|bt| {
                let rec = state.record(&bt.task.name);
                TaskStatus {
                    name: bt.task.name.clone(),
                    schedule: bt.slot.describe(),
                    requires_session: bt.task.requires_session,
                    last_run: rec.last_run(),
                    next_fire: *bt.next_fire.lock().expect("next_fire poisoned"),
                    success_count: rec.success_count,
                    failure_count: rec.failure_count,
                    last_error: rec.last_error,
                }
            })
            .collect()
    }

    fn set_next_fire(&self, name: &str, when: Option<DateTime<Utc>>) {
        for bt in self.inner.bound.read().expect("bound poisoned").iter() {
            if bt.task.name == name {
                *bt.next_fire.lock().expect("next_fire poisoned") = when;
            }
        }
    }

    fn next_fire(&self, name: &str) -> Option<DateTime<Utc>> {
        self.inner
            .bound
            .read()
            .expect("bound poisoned")
            .iter()
            .find(|bt| bt.task.name == name)
            .and_then(|bt| *bt.next_fire.lock().expect("next_fire poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskFuture;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeGate {
        idle: AtomicBool,
        exists: AtomicBool,
    }

    impl FakeGate {
        fn new(idle: bool, exists: bool) -> Arc<Self> {
            Arc::new(Self {
                idle: AtomicBool::new(idle),
                exists: AtomicBool::new(exists),
            })
        }
    }

    #[async_trait]
    impl SessionGate for FakeGate {
        fn is_idle(&self) -> bool {
            self.idle.load(Ordering::SeqCst)
        }

        async fn session_exists(&self) -> bool {
            self.exists.load(Ordering::SeqCst)
        }
    }

    fn counting_task(name: &str, counter: Arc<AtomicU32>) -> RegisteredTask {
        RegisteredTask::new(name, move || -> TaskFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("ran".to_string())
            })
        })
    }

    fn cron_cfg(name: &str, expr: &str) -> ScheduledTaskConfig {
        ScheduledTaskConfig {
            name: name.to_string(),
            enabled: true,
            interval: None,
            cron: Some(expr.to_string()),
            config: None,
        }
    }

    async fn drain(handles: Vec<tokio::task::JoinHandle<()>>) {
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn busy_skip_does_not_advance_next_fire() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(false, true);
        let sched = Scheduler::new(gate.clone(), dir.path().join("s.json")).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("email-check", Arc::clone(&runs)));
        sched.bind(&[cron_cfg("email-check", "*/15 * * * *")]);

        let due_at = Utc::now() - chrono::Duration::minutes(1);
        sched.set_next_fire("email-check", Some(due_at));

        // Busy: two checks 30s apart both skip and keep the same nextCronTime.
        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(sched.next_fire("email-check"), Some(due_at));

        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(sched.next_fire("email-check"), Some(due_at));

        // Agent goes idle: the task runs and the schedule advances.
        gate.idle.store(true, Ordering::SeqCst);
        let now = Utc::now();
        drain(sched.tick_once(now, true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(sched.next_fire("email-check").unwrap() > now);

        let status = &sched.list()[0];
        assert_eq!(status.success_count, 1);
        assert!(status.last_run.is_some());
    }

    #[tokio::test]
    async fn missing_session_skips_gated_task() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(true, false);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("reminders", Arc::clone(&runs)));
        sched.bind(&[cron_cfg("reminders", "* * * * *")]);
        sched.set_next_fire("reminders", Some(Utc::now() - chrono::Duration::minutes(1)));

        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ungated_task_runs_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(false, false);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("peer-heartbeat", Arc::clone(&runs)).without_session());
        sched.bind(&[cron_cfg("peer-heartbeat", "* * * * *")]);
        sched.set_next_fire("peer-heartbeat", Some(Utc::now() - chrono::Duration::minutes(1)));

        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn manual_trigger_bypasses_gate_and_keeps_cron_time() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(false, false);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("backup", Arc::clone(&runs)));
        sched.bind(&[cron_cfg("backup", "0 3 * * *")]);

        let before = sched.next_fire("backup");
        let output = sched.run_now("backup").await.unwrap();
        assert_eq!(output, "ran");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(sched.next_fire("backup"), before);
        assert_eq!(sched.list()[0].success_count, 1);
    }

    #[tokio::test]
    async fn failures_are_recorded_and_contained() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(true, true);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        sched.register(RegisteredTask::new("health-check", || -> TaskFuture {
            Box::pin(async { Err(anyhow::anyhow!("probe timed out")) })
        }));
        sched.bind(&[cron_cfg("health-check", "* * * * *")]);
        sched.set_next_fire("health-check", Some(Utc::now() - chrono::Duration::minutes(1)));

        drain(sched.tick_once(Utc::now(), true).await).await;

        let status = &sched.list()[0];
        assert_eq!(status.failure_count, 1);
        assert_eq!(status.last_error.as_deref(), Some("probe timed out"));
    }

    #[tokio::test]
    async fn fresh_state_has_no_spurious_fires() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(true, true);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("morning-briefing", Arc::clone(&runs)));
        sched.bind(&[cron_cfg("morning-briefing", "0 7 * * *")]);

        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(sched.next_fire("morning-briefing").unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn restored_state_catches_up_a_missed_fire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        {
            let mut state = SchedulerState::load(path.clone()).unwrap();
            let old = Utc::now() - chrono::Duration::minutes(40);
            state.record_run("email-check", old, &Ok(String::new()));
        }

        let gate = FakeGate::new(true, true);
        let sched = Scheduler::new(gate, path).unwrap();
        let runs = Arc::new(AtomicU32::new(0));
        sched.register(counting_task("email-check", Arc::clone(&runs)));
        sched.bind(&[cron_cfg("email-check", "*/15 * * * *")]);

        // A */15 fire has passed since the recorded run 40 minutes ago.
        assert!(sched.next_fire("email-check").unwrap() <= Utc::now());
        drain(sched.tick_once(Utc::now(), true).await).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_manual_trigger_errors() {
        let dir = tempfile::tempdir().unwrap();
        let gate = FakeGate::new(true, true);
        let sched = Scheduler::new(gate, dir.path().join("s.json")).unwrap();
        assert!(matches!(
            sched.run_now("nope").await,
            Err(SchedulerError::TaskNotFound(_))
        ));
    }
}
