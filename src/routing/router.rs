use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::keywords::{content_tokens, extract_keywords};
use crate::config::RouterConfig;
use crate::error::{ChorusError, Result};
use crate::registry::AgentRegistry;
use crate::types::AgentId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    Agent(AgentId),
    /// Special-purpose handler that is not an agent persona (e.g. `weather`).
    Handler(String),
}

impl RouteTarget {
    pub fn as_agent(&self) -> Option<&AgentId> {
        match self {
            RouteTarget::Agent(id) => Some(id),
            RouteTarget::Handler(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoutingDecision {
    Single { target: RouteTarget },
    Fusion { agent_ids: Vec<AgentId> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredTarget {
    pub target: RouteTarget,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteExplanation {
    pub keywords: Vec<String>,
    /// Highest score first; equal scores keep registration order.
    pub scores: Vec<ScoredTarget>,
    pub decision: RoutingDecision,
}

struct Candidate {
    target: RouteTarget,
    phrases: Vec<Vec<String>>,
}

/// Scores free text against each agent's and handler's trigger phrases.
pub struct IntentRouter {
    candidates: Vec<Candidate>,
    config: RouterConfig,
}

impl IntentRouter {
    pub fn new(registry: Arc<AgentRegistry>, config: RouterConfig) -> Result<Self> {
        if !registry.contains(&config.default_agent) {
            return Err(ChorusError::Config(format!(
                "default agent {} is not registered",
                config.default_agent
            )));
        }
        if !(0.0..=1.0).contains(&config.closeness_threshold) {
            return Err(ChorusError::Config(format!(
                "closeness threshold must be within [0, 1], got {}",
                config.closeness_threshold
            )));
        }

        let mut candidates: Vec<Candidate> = registry
            .all()
            .iter()
            .map(|agent| Candidate {
                target: RouteTarget::Agent(agent.id.clone()),
                phrases: prepare_phrases(&agent.trigger_phrases),
            })
            .collect();

        for handler in &config.handlers {
            candidates.push(Candidate {
                target: RouteTarget::Handler(handler.name.clone()),
                phrases: prepare_phrases(&handler.trigger_phrases),
            });
        }

        Ok(Self { candidates, config })
    }

    pub fn default_agent(&self) -> &AgentId {
        &self.config.default_agent
    }

    pub fn route(&self, text: &str) -> RoutingDecision {
        self.route_explained(text).decision
    }

    pub fn route_explained(&self, text: &str) -> RouteExplanation {
        let tokens = content_tokens(text);
        let keywords = extract_keywords(text);

        let mut scores: Vec<ScoredTarget> = self
            .candidates
            .iter()
            .map(|c| ScoredTarget {
                target: c.target.clone(),
                score: score_phrases(&c.phrases, &tokens, &keywords, self.config.phrase_bonus),
            })
            .collect();
        // Stable sort keeps registration order on ties
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));

        let decision = self.decide(&scores);
        log::debug!("routed {:?} -> {:?}", text, decision);

        let mut keywords: Vec<String> = keywords.into_iter().collect();
        keywords.sort();

        RouteExplanation {
            keywords,
            scores,
            decision,
        }
    }

    fn decide(&self, scores: &[ScoredTarget]) -> RoutingDecision {
        let fallback = RoutingDecision::Single {
            target: RouteTarget::Agent(self.config.default_agent.clone()),
        };

        let Some(first) = scores.first() else {
            return fallback;
        };
        if first.score < self.config.min_score {
            return fallback;
        }

        if let Some(second) = scores.get(1) {
            let close = second.score >= self.config.min_score
                && second.score / first.score >= self.config.closeness_threshold;
            if close {
                if let (Some(a), Some(b)) = (first.target.as_agent(), second.target.as_agent()) {
                    return RoutingDecision::Fusion {
                        agent_ids: vec![a.clone(), b.clone()],
                    };
                }
            }
        }

        RoutingDecision::Single {
            target: first.target.clone(),
        }
    }
}

fn prepare_phrases(phrases: &[String]) -> Vec<Vec<String>> {
    phrases
        .iter()
        .map(|p| content_tokens(p))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Single words score 1.0 each. A multi-word phrase found contiguously scores
/// `words * phrase_bonus`; otherwise each of its words present scores 1.0.
fn score_phrases(
    phrases: &[Vec<String>],
    tokens: &[String],
    keywords: &HashSet<String>,
    phrase_bonus: f32,
) -> f32 {
    phrases
        .iter()
        .map(|phrase| {
            if phrase.len() == 1 {
                return if keywords.contains(&phrase[0]) { 1.0 } else { 0.0 };
            }
            if tokens.windows(phrase.len()).any(|w| w == phrase.as_slice()) {
                phrase.len() as f32 * phrase_bonus
            } else {
                phrase.iter().filter(|w| keywords.contains(*w)).count() as f32
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerConfig;
    use crate::types::Agent;

    fn registry() -> Arc<AgentRegistry> {
        Arc::new(
            AgentRegistry::from_agents(vec![
                Agent::new("general", "General"),
                Agent::new("lumina", "Lumina").with_triggers(["emotional", "tradeoffs", "feel"]),
                Agent::new("nova", "Nova").with_triggers(["technical", "design", "code"]),
                Agent::new("sage", "Sage").with_triggers(["research", "history of science"]),
            ])
            .unwrap(),
        )
    }

    fn config() -> RouterConfig {
        RouterConfig {
            default_agent: AgentId::from("general"),
            handlers: vec![HandlerConfig {
                name: "weather".to_string(),
                trigger_phrases: vec!["weather".to_string(), "forecast".to_string()],
            }],
            ..RouterConfig::default()
        }
    }

    fn router() -> IntentRouter {
        IntentRouter::new(registry(), config()).unwrap()
    }

    #[test]
    fn test_weather_routes_to_handler() {
        let decision = router().route("What's the weather in Tokyo?");
        assert_eq!(
            decision,
            RoutingDecision::Single {
                target: RouteTarget::Handler("weather".to_string())
            }
        );
    }

    #[test]
    fn test_close_scores_trigger_fusion() {
        let decision = router().route("Compare the emotional and technical tradeoffs of this design");
        match decision {
            RoutingDecision::Fusion { agent_ids } => {
                assert_eq!(agent_ids.len(), 2);
                assert!(agent_ids.contains(&AgentId::from("lumina")));
                assert!(agent_ids.contains(&AgentId::from("nova")));
            }
            other => panic!("expected fusion, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_winner_is_single() {
        let decision = router().route("I want to write code with a technical design review");
        assert_eq!(
            decision,
            RoutingDecision::Single {
                target: RouteTarget::Agent(AgentId::from("nova"))
            }
        );
    }

    #[test]
    fn test_no_match_falls_back_to_default() {
        let decision = router().route("zebra banana");
        assert_eq!(
            decision,
            RoutingDecision::Single {
                target: RouteTarget::Agent(AgentId::from("general"))
            }
        );
        assert_eq!(
            router().route(""),
            RoutingDecision::Single {
                target: RouteTarget::Agent(AgentId::from("general"))
            }
        );
    }

    #[test]
    fn test_exact_phrase_outscores_partial_overlap() {
        let explanation = router().route_explained("the history of science");
        let sage = explanation
            .scores
            .iter()
            .find(|s| s.target == RouteTarget::Agent(AgentId::from("sage")))
            .unwrap();
        // "history of science" -> [history, science], contiguous: 2 * 1.5
        assert!((sage.score - 3.0).abs() < 1e-6);

        let partial = router().route_explained("science and its history");
        let sage = partial
            .scores
            .iter()
            .find(|s| s.target == RouteTarget::Agent(AgentId::from("sage")))
            .unwrap();
        assert!((sage.score - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_handler_never_fuses() {
        // weather (handler) and lumina (agent) tie at 1.0
        let decision = router().route("how does the weather make you feel");
        assert!(matches!(decision, RoutingDecision::Single { .. }));
    }

    #[test]
    fn test_unknown_default_agent_rejected() {
        let mut cfg = config();
        cfg.default_agent = AgentId::from("ghost");
        assert!(IntentRouter::new(registry(), cfg).is_err());
    }

    #[test]
    fn test_decisions_always_reference_registered_agents() {
        let registry = registry();
        let router = IntentRouter::new(registry.clone(), config()).unwrap();
        let inputs = [
            "",
            "code",
            "emotional technical",
            "feel the design",
            "weather forecast research",
            "!!!",
            "tradeoffs tradeoffs design code",
        ];
        for input in inputs {
            match router.route(input) {
                RoutingDecision::Single { target: RouteTarget::Agent(id) } => {
                    assert!(registry.contains(&id))
                }
                RoutingDecision::Single { target: RouteTarget::Handler(name) } => {
                    assert_eq!(name, "weather")
                }
                RoutingDecision::Fusion { agent_ids } => {
                    assert!(agent_ids.len() >= 2);
                    assert_ne!(agent_ids[0], agent_ids[1]);
                    assert!(agent_ids.iter().all(|id| registry.contains(id)));
                }
            }
        }
    }
}
