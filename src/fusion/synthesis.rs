use crate::registry::AgentRegistry;
use crate::types::fusion::FusionRequest;
use crate::types::AgentId;

fn join_ids(ids: &[AgentId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}

/// Merge the collected responses into one answer.
///
/// One labelled section per contributor in request order, then the list of
/// contributors and of agents that did not respond.
pub fn synthesize(registry: &AgentRegistry, request: &FusionRequest) -> String {
    let contributors = request.contributors();
    let silent: Vec<AgentId> = request
        .agent_ids
        .iter()
        .filter(|id| !request.responses.contains_key(*id))
        .cloned()
        .collect();

    if contributors.is_empty() {
        return format!("Fusion failed: no agent responded ({})", join_ids(&silent));
    }

    let mut out = String::new();
    for id in &contributors {
        let name = registry
            .lookup(id)
            .map(|a| a.display_name.clone())
            .unwrap_or_else(|_| id.to_string());
        out.push_str(&format!("### {} [{}]\n", name, id));
        out.push_str(request.responses[id].trim());
        out.push_str("\n\n");
    }

    out.push_str(&format!("Contributors: {}", join_ids(&contributors)));
    if !silent.is_empty() {
        out.push_str(&format!("\nDid not respond: {}", join_ids(&silent)));
    }
    out
}
