//! Runtime semantics: enablement, transition selection and the pure
//! firing computation.
use std::fmt::{self, Write as FmtWrite};
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;

use crate::net::ids::{PlaceId, PlaceRef, TransitionId};
use crate::net::structure::{Distribution, Place, Token, Transition};

#[derive(Debug, Error)]
pub enum FireError {
    #[error("transition {0} is not defined in the topology")]
    UnknownTransition(TransitionId),
    #[error("transition {0} is not enabled under the supplied distribution")]
    NotEnabled(TransitionId),
}

/// Sequence numbers of past firings, keyed by transition. Never-fired
/// transitions are treated as sequence 0. Used only for tie-breaking.
pub type FiringHistory = IndexMap<TransitionId, u64>;

/// A token queued for outcome resolution at an action place.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub place: PlaceId,
    pub token: Token,
}

/// The fully computed effect of firing one transition. The caller commits
/// `distribution` as one atomic unit; nothing here has touched shared
/// state yet.
#[derive(Debug, Clone)]
pub struct FirePlan {
    pub fired: TransitionId,
    pub distribution: Distribution,
    /// Merged token id, kept for logging.
    pub token_id: String,
    /// Direct deliveries to non-action places, in output order.
    pub deliveries: Vec<(PlaceId, Token)>,
    /// Deliveries to action places, resolved later in the same step.
    pub pending: Vec<PendingAction>,
    /// Outputs skipped because they name an unknown place.
    pub skipped_outputs: Vec<PlaceId>,
}

/// Topology connectivity report, computed once after loading.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    /// Places with no arc touching them.
    pub isolated_places: Vec<PlaceId>,
    /// Transitions that can never fire (no input references).
    pub never_fireable: Vec<TransitionId>,
    pub warnings: Vec<String>,
    pub total_places: usize,
    pub total_transitions: usize,
}

impl DiagnosticReport {
    pub fn has_issues(&self) -> bool {
        !self.isolated_places.is_empty()
            || !self.never_fireable.is_empty()
            || !self.warnings.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== net connectivity report ===");
        let _ = writeln!(
            out,
            "total: {} places, {} transitions",
            self.total_places, self.total_transitions
        );
        if !self.isolated_places.is_empty() {
            let _ = writeln!(out, "isolated places ({}):", self.isolated_places.len());
            for id in &self.isolated_places {
                let _ = writeln!(out, "  - {id}");
            }
        }
        if !self.never_fireable.is_empty() {
            let _ = writeln!(
                out,
                "transitions without inputs ({}):",
                self.never_fireable.len()
            );
            for id in &self.never_fireable {
                let _ = writeln!(out, "  - {id}");
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "warnings ({}):", self.warnings.len());
            for warning in &self.warnings {
                let _ = writeln!(out, "  - {warning}");
            }
        }
        out
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        fs::write(path, self.render())
    }
}

/// Read-only net topology for the duration of a simulation session.
/// Places and transitions keep their declaration order; that order is the
/// final tie-break when selecting among enabled transitions.
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Net {
    places: IndexMap<PlaceId, Place>,
    transitions: IndexMap<TransitionId, Transition>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places.len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a place. A later place with the same id replaces the
    /// earlier one; config loading rejects duplicates before it gets
    /// here.
    pub fn add_place(&mut self, place: Place) -> PlaceId {
        let id = place.id.clone();
        self.places.insert(id.clone(), place);
        id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let id = transition.id.clone();
        self.transitions.insert(id.clone(), transition);
        id
    }

    pub fn place(&self, id: &PlaceId) -> Option<&Place> {
        self.places.get(id)
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn places_len(&self) -> usize {
        self.places.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    /// Entrypoint-typed places, the injection targets offered to callers.
    pub fn entrypoints(&self) -> impl Iterator<Item = &Place> {
        self.places.values().filter(|p| p.type_name == "entrypoint")
    }

    /// A transition is enabled iff it has at least one input reference
    /// and every input reference currently holds a token. A transition
    /// with an empty input list is never enabled; the vacuous reading
    /// would make it fire on every step forever.
    pub fn is_enabled(&self, transition: &Transition, distribution: &Distribution) -> bool {
        !transition.inputs.is_empty()
            && transition
                .inputs
                .iter()
                .all(|input| !distribution.is_empty_at(input))
    }

    /// Enabled transitions in selection order: priority descending, then
    /// least recently fired, then declaration order. The sort is stable,
    /// so the declaration tie-break needs no extra key.
    pub fn enabled_transitions<'net>(
        &'net self,
        distribution: &Distribution,
        history: &FiringHistory,
    ) -> Vec<&'net Transition> {
        let mut enabled: Vec<&Transition> = self
            .transitions
            .values()
            .filter(|t| self.is_enabled(t, distribution))
            .collect();
        enabled.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| {
                let a_seq = history.get(&a.id).copied().unwrap_or(0);
                let b_seq = history.get(&b.id).copied().unwrap_or(0);
                a_seq.cmp(&b_seq)
            })
        });
        enabled
    }

    /// Compute the full effect of firing `transition`. Pure with respect
    /// to the supplied distribution; the returned plan either gets
    /// committed wholesale or dropped.
    pub fn fire_transition(
        &self,
        distribution: &Distribution,
        transition: &TransitionId,
    ) -> Result<FirePlan, FireError> {
        let transition = self
            .transitions
            .get(transition)
            .ok_or_else(|| FireError::UnknownTransition(transition.clone()))?;
        if !self.is_enabled(transition, distribution) {
            return Err(FireError::NotEnabled(transition.id.clone()));
        }

        let mut next = distribution.clone();

        // One token from the head of every input reference. An input
        // listed twice consumes twice; enablement only guarantees one
        // token per distinct reference, so a failed pop aborts cleanly.
        let mut consumed: Vec<Token> = Vec::with_capacity(transition.inputs.len());
        for input in &transition.inputs {
            match next.pop_front(input) {
                Some(token) => consumed.push(token),
                None => return Err(FireError::NotEnabled(transition.id.clone())),
            }
        }

        let merged = Token {
            id: consumed
                .first()
                .map(|t| t.id.clone())
                .unwrap_or_else(|| "merged".to_owned()),
            actors: consumed.into_iter().flat_map(|t| t.actors).collect(),
        };

        let mut deliveries = Vec::new();
        let mut pending = Vec::new();
        let mut skipped_outputs = Vec::new();

        // No outputs: the merged token is destroyed (sink transition).
        for output in &transition.outputs {
            let token = match &output.token_filter {
                Some(kind) => match merged.narrowed_to(kind) {
                    Some(token) => token,
                    // Nothing matched the filter; this output produces
                    // no token at all.
                    None => continue,
                },
                None => merged.clone(),
            };

            match self.places.get(&output.target) {
                Some(place) if place.kind.is_action() => pending.push(PendingAction {
                    place: output.target.clone(),
                    token,
                }),
                Some(_) => {
                    next.push_back(PlaceRef::Plain(output.target.clone()), token.clone());
                    deliveries.push((output.target.clone(), token));
                }
                None => {
                    log::warn!(
                        "transition {} output names unknown place {}, skipping",
                        transition.id,
                        output.target
                    );
                    skipped_outputs.push(output.target.clone());
                }
            }
        }

        Ok(FirePlan {
            fired: transition.id.clone(),
            distribution: next,
            token_id: merged.id,
            deliveries,
            pending,
            skipped_outputs,
        })
    }

    /// Static connectivity check, run once after the topology is loaded.
    pub fn diagnose(&self) -> DiagnosticReport {
        let mut report = DiagnosticReport {
            total_places: self.places.len(),
            total_transitions: self.transitions.len(),
            ..Default::default()
        };

        for place in self.places.values() {
            let used_as_input = self
                .transitions
                .values()
                .any(|t| t.inputs.iter().any(|input| input.base() == &place.id));
            let used_as_output = self
                .transitions
                .values()
                .any(|t| t.outputs.iter().any(|output| output.target == place.id));
            if !used_as_input && !used_as_output {
                report.isolated_places.push(place.id.clone());
            }
        }

        for transition in self.transitions.values() {
            if transition.inputs.is_empty() {
                report.never_fireable.push(transition.id.clone());
            }
            for input in &transition.inputs {
                match self.places.get(input.base()) {
                    None => report.warnings.push(format!(
                        "transition {} input references unknown place {}",
                        transition.id,
                        input.base()
                    )),
                    Some(place) if input.subplace().is_some() && !place.kind.is_action() => {
                        report.warnings.push(format!(
                            "transition {} reads subplace {} of non-action place {}",
                            transition.id,
                            input,
                            place.id
                        ))
                    }
                    Some(_) => {}
                }
            }
            for output in &transition.outputs {
                if !self.places.contains_key(&output.target) {
                    report.warnings.push(format!(
                        "transition {} output references unknown place {}",
                        transition.id, output.target
                    ));
                }
            }
        }

        report
    }

    pub fn log_diagnostics(&self) {
        let report = self.diagnose();
        if report.has_issues() {
            for line in report.render().lines() {
                log::warn!("{line}");
            }
        } else {
            log::info!(
                "net connectivity ok: {} places, {} transitions",
                report.total_places,
                report.total_transitions
            );
        }
    }
}
