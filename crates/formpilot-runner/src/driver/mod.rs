mod status;

pub use status::{Completion, RunPhase, RunReport, RunStatus, StepState};

use std::sync::Arc;
use std::time::Duration;

use formpilot_page::{FieldMapping, FormField, MappingAction};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ai::{FieldMapper, QuestionAnswerer, INSUFFICIENT_DATA};
use crate::bridge::PageClient;
use crate::config::{Config, TimingConfig};
use crate::profile::Profile;
use crate::{Error, Result};

/// Successful advances allowed in one run.
pub const MAX_STEPS: usize = 5;

/// Drives a page through analyze, map, answer, fill and advance until no
/// forward control is left or [`MAX_STEPS`] is reached.
pub struct StepDriver {
    client: PageClient,
    mapper: Arc<dyn FieldMapper>,
    answerer: Arc<dyn QuestionAnswerer>,
    profile: Profile,
    timing: TimingConfig,
    strict_targets: bool,
    state: StepState,
    status: watch::Sender<RunStatus>,
}

impl StepDriver {
    pub fn new(
        client: PageClient,
        mapper: Arc<dyn FieldMapper>,
        answerer: Arc<dyn QuestionAnswerer>,
        profile: Profile,
    ) -> Self {
        let (status, _) = watch::channel(RunStatus::default());
        Self {
            client,
            mapper,
            answerer,
            profile,
            timing: TimingConfig::default(),
            strict_targets: true,
            state: StepState::default(),
            status,
        }
    }

    /// Take timing and target checking from a loaded config.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.timing = config.timing.clone();
        self.strict_targets = config.strict_targets;
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Drop mappings whose target was not in the latest extraction.
    pub fn strict_targets(mut self, strict: bool) -> Self {
        self.strict_targets = strict;
        self
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Run the flow to completion.
    ///
    /// Only a missing credential or a lost page ends the run with an error.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.state = StepState {
            running: true,
            ..StepState::default()
        };

        if !self.mapper.is_configured() {
            let err = Error::Configuration(
                "no AI credential; set FORMPILOT_API_KEY or ANTHROPIC_API_KEY".into(),
            );
            return Err(self.fail(err));
        }

        info!("Starting form run");
        let completion = loop {
            if self.state.step >= MAX_STEPS {
                warn!("Stopped after {} steps (safety limit)", MAX_STEPS);
                break Completion::SafetyLimit;
            }
            match self.cycle().await {
                Ok(Some(completion)) => break completion,
                Ok(None) => continue,
                Err(e) => return Err(self.fail(e)),
            }
        };

        self.state.running = false;
        let message = match completion {
            Completion::Finished => "no forward control left".to_string(),
            Completion::SafetyLimit => format!("stopped at the {}-step limit", MAX_STEPS),
        };
        self.publish(RunPhase::Complete, message);
        info!(
            "Run complete: {} steps, {} fields filled",
            self.state.step, self.state.filled
        );

        Ok(RunReport {
            steps: self.state.step,
            filled: self.state.filled,
            completion,
        })
    }

    /// One analyze..navigate pass. `Some` when the flow has ended.
    async fn cycle(&mut self) -> Result<Option<Completion>> {
        let step = self.state.step + 1;

        self.publish(RunPhase::Analyzing, format!("reading step {}", step));
        let fields = self.client.analyze().await?.fields;
        info!("Step {}: {} fields", step, fields.len());

        if !fields.is_empty() {
            self.publish(RunPhase::Mapping, format!("mapping {} fields", fields.len()));
            let mappings = self.map(&fields).await;

            self.publish(RunPhase::Answering, "answering questions".into());
            let mappings = self.answer(mappings, &fields).await;
            let batch = resolve_values(mappings, &self.profile);

            self.publish(RunPhase::Filling, format!("filling {} fields", batch.len()));
            if batch.is_empty() {
                debug!("Step {}: nothing to fill", step);
            } else {
                let res = self.client.fill(batch).await?;
                debug!("Step {}: filled {}/{}", step, res.filled, res.requested);
                self.state.filled += res.filled;
            }

            self.publish(RunPhase::Settling, String::new());
            pause(self.timing.settle_ms).await;
        }

        self.publish(RunPhase::Navigating, "looking for a next control".into());
        let nav = self.client.advance().await?;
        if !nav.success {
            debug!("Step {}: {}", step, nav.message);
            return Ok(Some(Completion::Finished));
        }

        info!("Step {}: {}", step, nav.message);
        self.state.step += 1;
        pause(self.timing.transition_ms).await;
        Ok(None)
    }

    async fn map(&self, fields: &[FormField]) -> Vec<FieldMapping> {
        let mappings = match self.mapper.map_fields(fields, &self.profile).await {
            Ok(mappings) => mappings,
            Err(e) => {
                warn!("Mapping failed, continuing without mappings: {}", e);
                return Vec::new();
            }
        };
        debug!("Mapper returned {} mappings", mappings.len());

        if self.strict_targets {
            retain_known_targets(mappings, fields)
        } else {
            mappings
        }
    }

    /// Answer custom questions one at a time.
    async fn answer(&self, mut mappings: Vec<FieldMapping>, fields: &[FormField]) -> Vec<FieldMapping> {
        for mapping in mappings.iter_mut().filter(|m| m.is_custom_question()) {
            let question = question_for(mapping, fields);
            let answer = match self.answerer.answer(&question, &self.profile).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("Could not answer \"{}\": {}", question, e);
                    INSUFFICIENT_DATA.to_string()
                }
            };
            mapping.value = Some(answer);
        }
        mappings
    }

    fn publish(&self, phase: RunPhase, message: String) {
        self.status.send_replace(RunStatus {
            phase,
            step: self.state.step,
            filled: self.state.filled,
            message,
        });
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!("Run failed: {}", err);
        self.state.running = false;
        self.publish(RunPhase::Failed, err.to_string());
        err
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Keep mappings that name a field of the latest extraction by id or name.
fn retain_known_targets(mappings: Vec<FieldMapping>, fields: &[FormField]) -> Vec<FieldMapping> {
    mappings
        .into_iter()
        .filter(|m| {
            let known = fields.iter().any(|f| {
                f.id == m.id
                    || m.name
                        .as_deref()
                        .is_some_and(|name| !name.is_empty() && name == f.name)
            });
            if !known {
                warn!("Dropping mapping for unknown field '{}'", m.id);
            }
            known
        })
        .collect()
}

/// The literal question, else the field's label, else its name or id.
fn question_for(mapping: &FieldMapping, fields: &[FormField]) -> String {
    if let Some(question) = mapping.question.as_deref().filter(|q| !q.trim().is_empty()) {
        return question.trim().to_string();
    }
    let field = fields.iter().find(|f| f.id == mapping.id);
    field
        .and_then(|f| f.label.clone().or_else(|| f.aria_label.clone()))
        .or_else(|| field.map(|f| f.name.clone()).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| mapping.id.clone())
}

/// Fill in profile values and drop what cannot be filled.
fn resolve_values(mappings: Vec<FieldMapping>, profile: &Profile) -> Vec<FieldMapping> {
    mappings
        .into_iter()
        .filter_map(|mut m| {
            if m.action == MappingAction::TriggerAdd {
                return Some(m);
            }
            match m.value.as_deref().map(|v| v.trim() == INSUFFICIENT_DATA) {
                Some(true) => {
                    debug!("{}: insufficient data, skipped", m.id);
                    return None;
                }
                Some(false) => return Some(m),
                None => {}
            }
            let slot = m.field_type.as_deref()?;
            match profile.resolve(slot, m.group_type.as_deref(), m.group_index) {
                Some(value) => {
                    m.value = Some(value);
                    Some(m)
                }
                None => {
                    debug!("{}: no profile value for '{}'", m.id, slot);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_page::CUSTOM_QUESTION;

    fn field(id: &str, name: &str, label: Option<&str>) -> FormField {
        FormField {
            id: id.into(),
            name: name.into(),
            kind: "text".into(),
            placeholder: None,
            label: label.map(String::from),
            aria_label: None,
            autocomplete: None,
            required: false,
            context: None,
            section: None,
            options: vec![],
        }
    }

    fn profile() -> Profile {
        Profile::parse(
            r#"
first_name: Jane
email: jane@example.com
experience:
  - title: Engineer
    company: Initech
  - title: Intern
    company: Initrode
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_retain_known_targets() {
        let fields = [field("email", "email", None), field("field_2", "phone_number", None)];
        let mut by_name = FieldMapping::fill("phone", "phone");
        by_name.name = Some("phone_number".into());

        let kept = retain_known_targets(
            vec![
                FieldMapping::fill("email", "email"),
                by_name,
                FieldMapping::fill("invented", "city"),
            ],
            &fields,
        );
        let ids: Vec<_> = kept.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["email", "phone"]);
    }

    #[test]
    fn test_question_for_prefers_literal_question() {
        let fields = [field("why", "motivation", Some("Why do you want this job?"))];
        let mut m = FieldMapping::fill("why", CUSTOM_QUESTION);
        assert_eq!(question_for(&m, &fields), "Why do you want this job?");

        m.question = Some(" Why us? ".into());
        assert_eq!(question_for(&m, &fields), "Why us?");

        let m = FieldMapping::fill("gone", CUSTOM_QUESTION);
        assert_eq!(question_for(&m, &fields), "gone");
    }

    #[test]
    fn test_resolve_values() {
        let batch = resolve_values(
            vec![
                FieldMapping::fill("fn", "first_name"),
                FieldMapping::fill("co", "company").with_group("experience", 1),
                FieldMapping::fill("city", "city"),
                FieldMapping::fill("why", CUSTOM_QUESTION).with_value(INSUFFICIENT_DATA),
                FieldMapping::fill("size", "shirt_size").with_value("M"),
                FieldMapping::trigger_add("add").with_group("experience", 1),
            ],
            &profile(),
        );

        let pairs: Vec<_> = batch
            .iter()
            .map(|m| (m.id.as_str(), m.value.as_deref()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("fn", Some("Jane")),
                ("co", Some("Initrode")),
                ("size", Some("M")),
                ("add", None),
            ]
        );
    }
}
