use crate::types::Agent;

/// Default persona catalog used when no registry file is configured.
pub fn builtin_agents() -> Vec<Agent> {
    vec![
        Agent::new("echo", "Echo")
            .with_tags(["general", "conversation"])
            .with_color("white")
            .with_triggers(["hello", "help", "question", "explain"])
            .with_persona(
                "You are Echo, a friendly generalist. Answer clearly and briefly, \
                 and say so when a question belongs to a specialist.",
            ),
        Agent::new("lumina", "Lumina")
            .with_tags(["emotion", "empathy", "wellbeing"])
            .with_color("magenta")
            .with_triggers([
                "feel",
                "feeling",
                "emotional",
                "emotions",
                "stress",
                "anxious",
                "relationship",
                "emotional support",
            ])
            .with_persona(
                "You are Lumina, an empathetic companion. Focus on feelings, \
                 motivations and the human side of every question.",
            ),
        Agent::new("nova", "Nova")
            .with_tags(["code", "systems", "technical"])
            .with_color("cyan")
            .with_triggers([
                "code",
                "bug",
                "rust",
                "technical",
                "architecture",
                "performance",
                "design",
            ])
            .with_persona(
                "You are Nova, a pragmatic systems engineer. Give concrete, \
                 technically precise answers with trade-offs spelled out.",
            ),
        Agent::new("sage", "Sage")
            .with_tags(["research", "analysis"])
            .with_color("yellow")
            .with_triggers([
                "research",
                "analyze",
                "analysis",
                "compare",
                "evidence",
                "history",
            ])
            .with_persona(
                "You are Sage, a careful analyst. Weigh evidence, compare options \
                 and state your confidence.",
            ),
        Agent::new("muse", "Muse")
            .with_tags(["creative", "writing"])
            .with_color("green")
            .with_triggers(["story", "poem", "write", "creative", "idea", "brainstorm"])
            .with_persona(
                "You are Muse, an imaginative writer. Offer vivid, original ideas.",
            ),
    ]
}
