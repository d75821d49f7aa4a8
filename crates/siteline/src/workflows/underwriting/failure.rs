use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Time source injected into the hub so cooldowns and escalation are
/// deterministically testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    /// Only failures at error severity or above qualify for auto-repair.
    pub const fn auto_repair_eligible(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Open,
    Acknowledged,
    InProgress,
    Resolved,
    AutoRepaired,
}

impl ResolutionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ResolutionStatus::Open => "open",
            ResolutionStatus::Acknowledged => "acknowledged",
            ResolutionStatus::InProgress => "in_progress",
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::AutoRepaired => "auto_repaired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ResolutionStatus::Resolved | ResolutionStatus::AutoRepaired)
    }
}

/// One entry in the per-run failure ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub id: u64,
    pub source_hub: String,
    pub sub_hub: String,
    pub failure_type: String,
    pub severity: Severity,
    pub resolution_status: ResolutionStatus,
    pub auto_repair_triggered: bool,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub reported_at: DateTime<Utc>,
}

/// Bounded retry with exponential backoff for repair handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: std::time::Duration,
    pub multiplier: f64,
    pub max_delay: std::time::Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: std::time::Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay for a 1-based attempt number, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        std::time::Duration::from_secs_f64(delay_secs).min(self.max_delay)
    }
}

/// Time-based severity promotion, checked by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationPolicy {
    pub warning_to_error_after: Duration,
    pub error_to_critical_after: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            warning_to_error_after: Duration::minutes(15),
            error_to_critical_after: Duration::minutes(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("repair attempt failed: {0}")]
    Failed(String),
}

/// Corrective action looked up by failure type.
pub trait RepairHandler: Send + Sync {
    fn repair(&self, event: &FailureEvent) -> Result<(), RepairError>;
}

/// What `attempt_auto_repair` did for an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    Repaired { attempts: u32 },
    Exhausted { attempts: u32 },
    CoolingDown { until: DateTime<Utc> },
    NotEligible,
    NoHandler,
}

#[derive(Debug, thiserror::Error)]
pub enum FailureHubError {
    #[error("no failure event with id {0}")]
    UnknownEvent(u64),
    #[error("cannot move event {id} from {from} to {to}")]
    InvalidTransition {
        id: u64,
        from: &'static str,
        to: &'static str,
    },
}

/// Per-run failure ledger with auto-repair and escalation.
///
/// One hub is created per pipeline run and dropped with it; nothing here is
/// shared across requests.
pub struct FailureHub {
    events: Vec<FailureEvent>,
    next_id: u64,
    handlers: HashMap<String, Arc<dyn RepairHandler>>,
    cooldowns: HashMap<(String, String, String), DateTime<Utc>>,
    cooldown_window: Duration,
    retry: RetryPolicy,
    escalation: EscalationPolicy,
    clock: Arc<dyn Clock>,
}

impl FailureHub {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_policies(
            clock,
            RetryPolicy::default(),
            EscalationPolicy::default(),
            Duration::minutes(5),
        )
    }

    pub fn with_policies(
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        escalation: EscalationPolicy,
        cooldown_window: Duration,
    ) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            handlers: HashMap::new(),
            cooldowns: HashMap::new(),
            cooldown_window,
            retry,
            escalation,
            clock,
        }
    }

    pub fn register_handler(&mut self, failure_type: &str, handler: Arc<dyn RepairHandler>) {
        self.handlers.insert(failure_type.to_string(), handler);
    }

    /// Append a new failure to the ledger and return its id.
    pub fn report(
        &mut self,
        source_hub: &str,
        sub_hub: &str,
        failure_type: &str,
        severity: Severity,
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(FailureEvent {
            id,
            source_hub: source_hub.to_string(),
            sub_hub: sub_hub.to_string(),
            failure_type: failure_type.to_string(),
            severity,
            resolution_status: ResolutionStatus::Open,
            auto_repair_triggered: false,
            message: message.into(),
            context,
            reported_at: self.clock.now(),
        });
        id
    }

    pub fn events(&self) -> &[FailureEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<FailureEvent> {
        self.events
    }

    pub fn event(&self, id: u64) -> Option<&FailureEvent> {
        self.events.iter().find(|event| event.id == id)
    }

    fn event_mut(&mut self, id: u64) -> Result<&mut FailureEvent, FailureHubError> {
        self.events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or(FailureHubError::UnknownEvent(id))
    }

    pub fn has_severity_at_least(&self, severity: Severity) -> bool {
        self.events
            .iter()
            .any(|event| event.severity >= severity && !event.resolution_status.is_terminal())
    }

    pub fn acknowledge(&mut self, id: u64) -> Result<(), FailureHubError> {
        let event = self.event_mut(id)?;
        match event.resolution_status {
            ResolutionStatus::Open => {
                event.resolution_status = ResolutionStatus::Acknowledged;
                Ok(())
            }
            other => Err(FailureHubError::InvalidTransition {
                id,
                from: other.label(),
                to: ResolutionStatus::Acknowledged.label(),
            }),
        }
    }

    pub fn begin(&mut self, id: u64) -> Result<(), FailureHubError> {
        let event = self.event_mut(id)?;
        match event.resolution_status {
            ResolutionStatus::Open | ResolutionStatus::Acknowledged => {
                event.resolution_status = ResolutionStatus::InProgress;
                Ok(())
            }
            other => Err(FailureHubError::InvalidTransition {
                id,
                from: other.label(),
                to: ResolutionStatus::InProgress.label(),
            }),
        }
    }

    pub fn resolve(&mut self, id: u64) -> Result<(), FailureHubError> {
        let event = self.event_mut(id)?;
        if event.resolution_status.is_terminal() {
            return Err(FailureHubError::InvalidTransition {
                id,
                from: event.resolution_status.label(),
                to: ResolutionStatus::Resolved.label(),
            });
        }
        event.resolution_status = ResolutionStatus::Resolved;
        Ok(())
    }

    /// Run the registered handler for an event under the bounded retry
    /// policy. The cooldown window per (hub, sub-hub, failure type) prevents
    /// repeated repair storms for the same fault; attempts run back-to-back
    /// and the schedule the policy would have spaced them on is recorded in
    /// the event context.
    pub fn attempt_auto_repair(&mut self, id: u64) -> Result<RepairOutcome, FailureHubError> {
        let now = self.clock.now();
        let (key, failure_type, severity, terminal) = {
            let event = self.event_mut(id)?;
            (
                (
                    event.source_hub.clone(),
                    event.sub_hub.clone(),
                    event.failure_type.clone(),
                ),
                event.failure_type.clone(),
                event.severity,
                event.resolution_status.is_terminal(),
            )
        };

        if terminal || !severity.auto_repair_eligible() {
            return Ok(RepairOutcome::NotEligible);
        }

        let Some(handler) = self.handlers.get(&failure_type).cloned() else {
            return Ok(RepairOutcome::NoHandler);
        };

        if let Some(last) = self.cooldowns.get(&key) {
            let until = *last + self.cooldown_window;
            if now < until {
                return Ok(RepairOutcome::CoolingDown { until });
            }
        }
        self.cooldowns.insert(key, now);

        let retry = self.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut schedule = Vec::new();
        let mut attempts = 0;
        let mut repaired = false;

        {
            let event = self.event_mut(id)?;
            event.auto_repair_triggered = true;
        }

        for attempt in 1..=max_attempts {
            attempts = attempt;
            schedule.push(retry.delay_for_attempt(attempt).as_millis().to_string());
            let outcome = {
                let event = self.event_mut(id)?;
                handler.repair(event)
            };
            if outcome.is_ok() {
                repaired = true;
                break;
            }
        }

        let event = self.event_mut(id)?;
        event
            .context
            .insert("repair_attempts".to_string(), attempts.to_string());
        event
            .context
            .insert("backoff_schedule_ms".to_string(), schedule.join(","));

        if repaired {
            event.resolution_status = ResolutionStatus::AutoRepaired;
            Ok(RepairOutcome::Repaired { attempts })
        } else {
            Ok(RepairOutcome::Exhausted { attempts })
        }
    }

    /// Promote unresolved events whose age exceeds the escalation intervals:
    /// Warning becomes Error, then Error becomes Critical. Returns the ids
    /// touched. Caller-driven; there is no background timer.
    pub fn escalate_overdue(&mut self) -> Vec<u64> {
        let now = self.clock.now();
        let mut escalated = Vec::new();
        for event in &mut self.events {
            if event.resolution_status.is_terminal() {
                continue;
            }
            let age = now - event.reported_at;
            let promoted = match event.severity {
                Severity::Error if age >= self.escalation.error_to_critical_after => {
                    event.severity = Severity::Critical;
                    true
                }
                Severity::Warning if age >= self.escalation.warning_to_error_after => {
                    event.severity = Severity::Error;
                    true
                }
                _ => false,
            };
            if promoted {
                event
                    .context
                    .insert("escalated_at".to_string(), now.to_rfc3339());
                escalated.push(event.id);
            }
        }
        escalated
    }
}
