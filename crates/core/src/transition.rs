//! Screen-transition sequencer: drives the UI through a scripted list of
//! (region, click?) steps, each gated on its sprite being visible.

use std::time::Duration;

use crate::automation::Automation;
use crate::error::{AutomationError, Result};
use crate::logger;
use crate::registry::TransitionStep;
use crate::sprite::sprite_name_for_region;
use crate::types::Frame;

/// Run `steps` in order. Each step waits up to `timeout` for its sprite, then
/// clicks the region if asked. The first step whose sprite never appears
/// aborts the script with `TransitionTimeout`; later steps are not attempted.
///
/// Returns the frame in which the last step's sprite was confirmed.
pub fn run_script(ctx: &mut Automation, steps: &[TransitionStep], timeout: Duration) -> Result<Frame> {
    let mut last = None;

    for (i, step) in steps.iter().enumerate() {
        let sprite = sprite_name_for_region(step.region);
        let wait = ctx.wait_for_sprite(&sprite, step.region, timeout)?;
        if !wait.found {
            logger::error_p("transition", &format!("{} not found in {}", sprite, step.region));
            return Err(AutomationError::TransitionTimeout {
                sprite,
                region: step.region.to_string(),
                timeout,
            });
        }

        logger::info_p(
            "transition",
            &format!(
                "step {}/{}: {} at {:?}{}",
                i + 1,
                steps.len(),
                sprite,
                wait.location.unwrap_or_default(),
                if step.click { ", click" } else { "" }
            ),
        );
        if step.click {
            ctx.click_region(step.region)?;
        }
        last = wait.frame;
    }

    match last {
        Some(frame) => Ok(frame),
        None => ctx.next_frame(),
    }
}

/// Look up a script in the registry and run it.
pub fn run_named(ctx: &mut Automation, name: &str, timeout: Duration) -> Result<Frame> {
    let steps = ctx.registry().script(name)?.to_vec();
    logger::info_p("transition", &format!("running {}", name));
    run_script(ctx, &steps, timeout)
}
