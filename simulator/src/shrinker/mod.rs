use std::future::Future;

use crate::plan::Plan;

#[derive(Debug, Clone)]
pub(crate) struct ShrinkReport {
    pub(crate) original_steps: usize,
    pub(crate) shrunk_steps: usize,
    pub(crate) rounds: usize,
    pub(crate) attempts: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ShrinkResult {
    pub(crate) plan: Plan,
    pub(crate) report: ShrinkReport,
}

/// Delta-debug `plan` down to a smaller one that still satisfies `failing`.
///
/// The first `keep` interactions (schema setup) are never removed. Chunks of
/// halving size are dropped first, then single interactions.
pub(crate) async fn shrink_plan<F, Fut>(
    plan: Plan,
    keep: usize,
    max_rounds: usize,
    failing: F,
) -> ShrinkResult
where
    F: Fn(&Plan) -> Fut,
    Fut: Future<Output = bool>,
{
    let original_steps = plan.interactions.len();
    let mut current = plan;
    let mut rounds = 0usize;
    let mut attempts = 0usize;
    let mut n = 2usize;

    while rounds < max_rounds {
        let removable = current.interactions.len().saturating_sub(keep);
        if removable == 0 {
            break;
        }
        let chunk_size = removable.div_ceil(n);
        let mut reduced = false;

        for chunk_index in 0..n {
            let start = keep + chunk_index * chunk_size;
            if start >= current.interactions.len() {
                break;
            }
            let end = (start + chunk_size).min(current.interactions.len());
            let candidate = without_range(&current, start, end);
            attempts += 1;
            if failing(&candidate).await {
                tracing::debug!(start, end, "shrinker dropped interactions");
                current = candidate;
                n = 2;
                reduced = true;
                break;
            }
        }

        rounds += 1;
        if reduced {
            continue;
        }
        if chunk_size == 1 {
            break;
        }
        n = (n * 2).min(removable);
    }

    let shrunk_steps = current.interactions.len();
    ShrinkResult {
        plan: current,
        report: ShrinkReport {
            original_steps,
            shrunk_steps,
            rounds,
            attempts,
        },
    }
}

fn without_range(plan: &Plan, start: usize, end: usize) -> Plan {
    let mut interactions = Vec::with_capacity(plan.interactions.len() - (end - start));
    interactions.extend_from_slice(&plan.interactions[..start]);
    interactions.extend_from_slice(&plan.interactions[end..]);
    Plan { interactions }
}
