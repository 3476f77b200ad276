use crate::state::ScrollStep;
use crate::{Effect, Msg, PaginationState, Phase, Termination};

/// Pure update function: applies a message to the run state and returns the
/// next effect to execute, if any.
///
/// Messages that do not match the current phase are ignored.
pub fn update(mut state: PaginationState, msg: Msg) -> (PaginationState, Option<Effect>) {
    if state.phase().is_terminal() {
        return (state, None);
    }

    let effect = match (state.phase(), msg) {
        (_, Msg::Cancel) => {
            state.set_phase(Phase::Cancelled);
            Some(Effect::Finish(Termination::Cancelled))
        }
        (Phase::Idle, Msg::Start) => {
            state.begin();
            Some(Effect::AdvanceViewport)
        }
        (Phase::Scrolling, Msg::CooledDown) if state.scroll_step() == ScrollStep::CoolingDown => {
            state.set_scroll_step(ScrollStep::Advancing);
            Some(Effect::AdvanceViewport)
        }
        (Phase::Scrolling, Msg::ViewportAdvanced)
            if state.scroll_step() == ScrollStep::Advancing =>
        {
            state.set_scroll_step(ScrollStep::Settling);
            Some(Effect::Settle(state.config().settle_delay))
        }
        (Phase::Scrolling, Msg::Settled) if state.scroll_step() == ScrollStep::Settling => {
            state.set_phase(Phase::Extracting);
            Some(Effect::Extract)
        }
        // Merging is synchronous, so it completes inside this transition.
        (Phase::Extracting, Msg::Extracted(items)) => {
            state.absorb(items);
            state.set_phase(Phase::EvaluatingProgress);
            Some(Effect::MeasureProgress)
        }
        (Phase::EvaluatingProgress, Msg::Measured(height)) => Some(evaluate(&mut state, height)),
        _ => None,
    };

    (state, effect)
}

fn evaluate(state: &mut PaginationState, height: Option<u64>) -> Effect {
    state.record_progress(height);
    let config = *state.config();

    if state.patience() >= config.patience_threshold {
        state.set_phase(Phase::Converged);
        return Effect::Finish(Termination::Converged);
    }
    if state.iteration() >= config.max_iterations {
        state.set_phase(Phase::Exhausted);
        return Effect::Finish(Termination::Exhausted);
    }

    // Cooldown pauses never touch patience accounting. Zero disables them.
    if config.cooldown_every != 0 && state.iteration() % config.cooldown_every == 0 {
        state.enter_scrolling(ScrollStep::CoolingDown);
        Effect::Cooldown(config.cooldown_delay)
    } else {
        state.enter_scrolling(ScrollStep::Advancing);
        Effect::AdvanceViewport
    }
}
