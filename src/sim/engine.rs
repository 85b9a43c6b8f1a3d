//! Step execution: pick one enabled transition, commit its fire plan,
//! then resolve every pending action the firing produced. A step either
//! fully commits or leaves the store untouched.
use itertools::Itertools;
use rand::Rng;
use serde_json::json;

use crate::net::core::{Net, PendingAction};
use crate::net::ids::{PlaceId, PlaceRef, TransitionId};
use crate::sim::outcome::{Outcome, ProbabilityTable};
use crate::sim::store::{LogEntry, LogKind, TokenStore};

/// What one executed step did, for callers that relay firings onward.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub fired: TransitionId,
    /// Id of the merged token the firing produced.
    pub token_id: String,
    /// Base place of the first consumed input; where a destroyed token
    /// was last observed.
    pub consumed_from: PlaceId,
    /// True when the merged token reached no place at all: a sink
    /// transition, or every output filtered or skipped it away.
    pub destroyed: bool,
}

/// Execute one simulation step. With `specific` set, only that
/// transition may fire and it must currently be enabled; otherwise the
/// selection order of [`Net::enabled_transitions`] picks the winner.
/// Returns a report of the firing, or `None` when nothing fired.
pub fn execute_step<R: Rng + ?Sized>(
    net: &Net,
    store: &mut TokenStore,
    probabilities: &ProbabilityTable,
    rng: &mut R,
    specific: Option<&TransitionId>,
) -> Option<StepReport> {
    let enabled = net.enabled_transitions(store.distribution(), store.last_fired());
    if enabled.is_empty() {
        return None;
    }

    let to_fire = match specific {
        Some(id) => match enabled.iter().find(|t| &t.id == id) {
            Some(transition) => *transition,
            // Requested transition exists but is not enabled: no-op.
            None => return None,
        },
        None => enabled[0],
    };
    let inputs = to_fire.inputs.clone();
    let outputs: Vec<PlaceId> = to_fire.outputs.iter().map(|o| o.target.clone()).collect();

    let plan = match net.fire_transition(store.distribution(), &to_fire.id) {
        Ok(plan) => plan,
        Err(err) => {
            // Enablement was checked above; reaching this means the
            // topology changed under us.
            log::warn!("step aborted: {err}");
            return None;
        }
    };
    let report = StepReport {
        fired: plan.fired.clone(),
        token_id: plan.token_id.clone(),
        // Enablement guarantees at least one input.
        consumed_from: inputs[0].base().clone(),
        destroyed: plan.deliveries.is_empty() && plan.pending.is_empty(),
    };

    store.record_fired(&plan.fired);
    store.replace_distribution(plan.distribution);
    store.append_log(LogEntry::with_details(
        LogKind::TransitionFire,
        format!("Transition {} fired", plan.fired),
        json!({
            "transitionId": plan.fired.to_string(),
            "inputPlaces": inputs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "outputPlaces": outputs.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "tokenId": plan.token_id,
        }),
    ));

    for (place, token) in &plan.deliveries {
        store.append_log(LogEntry::with_details(
            LogKind::TokenMove,
            format!("Token {} moved to {place}", token.id),
            json!({ "placeId": place.to_string(), "tokenId": token.id }),
        ));
        warn_if_over_capacity(net, store, place);
    }

    for pending in plan.pending {
        resolve_action(net, store, probabilities, rng, pending);
    }

    Some(report)
}

/// Resolve one pending action execution: draw an outcome, unroll
/// retries, apply failure-as-error promotion and deliver the token into
/// the matching outcome subplace.
fn resolve_action<R: Rng + ?Sized>(
    net: &Net,
    store: &mut TokenStore,
    probabilities: &ProbabilityTable,
    rng: &mut R,
    pending: PendingAction,
) {
    let PendingAction { place, token } = pending;
    let params = net
        .place(&place)
        .and_then(|p| p.kind.action_params())
        .copied()
        .unwrap_or_default();
    let probability = probabilities.get(&place);

    let mut outcome = probability.resolve(rng);
    let mut retries_remaining = params.retries;
    while outcome == Outcome::Failure && retries_remaining > 0 {
        retries_remaining -= 1;
        store.append_log(LogEntry::with_details(
            LogKind::ActionStart,
            format!("Retrying action at {place} ({retries_remaining} retries left)"),
            json!({
                "placeId": place.to_string(),
                "tokenId": token.id,
                "retriesLeft": retries_remaining,
            }),
        ));
        outcome = probability.resolve(rng);
    }

    if outcome == Outcome::Failure && params.failure_as_error {
        outcome = Outcome::Error;
    }

    let token_id = token.id.clone();
    store.inject(PlaceRef::Sub(place.clone(), outcome.subplace()), token);
    warn_if_over_capacity(net, store, &place);
    store.append_log(LogEntry::with_details(
        LogKind::ActionComplete,
        format!("Action at {place} completed: {outcome}"),
        json!({
            "placeId": place.to_string(),
            "tokenId": token_id,
            "outcome": outcome.as_str(),
        }),
    ));
}

/// Capacity is advisory: exceeding it is worth a diagnostic, never a
/// rejection. Subplace tokens count against their base place. Returns
/// whether the place is over its bound.
pub(crate) fn warn_if_over_capacity(net: &Net, store: &TokenStore, place: &PlaceId) -> bool {
    if let Some(capacity) = net.place(place).and_then(|p| p.capacity) {
        let count = store.token_count(place, true) as u64;
        if count > capacity {
            log::warn!("place {place} holds {count} tokens, over advisory capacity {capacity}");
            return true;
        }
    }
    false
}

/// Render a one-line summary of where tokens currently sit, for CLI
/// output and debug logging.
pub fn describe_distribution(store: &TokenStore) -> String {
    let summary = store
        .distribution()
        .iter()
        .filter(|(_, tokens)| !tokens.is_empty())
        .map(|(place, tokens)| format!("{place}:{}", tokens.len()))
        .join(", ");
    if summary.is_empty() {
        "no tokens".to_owned()
    } else {
        summary
    }
}
