use crate::types::{AgentId, Participant};

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Free text for the router.
    Ask(String),
    /// `@agent: text` bypasses the router.
    Direct { agent_id: AgentId, text: String },
    Agents,
    Emotions,
    /// `/use a,b` pins a fusion set; `/use` alone clears it.
    Use(Vec<AgentId>),
    Reset,
    History {
        a: Participant,
        b: Participant,
        limit: usize,
    },
    Health,
    Quit,
    Empty,
    Invalid(String),
}

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

pub const HELP: &str = "\
@agent: text   ask one agent directly
/agents        list agents
/emotions      show each agent's dominant emotion
/use a,b       pin a fusion set (/use alone clears it)
/reset         reset emotions and the pinned set
/history a b   recent messages between two participants (user, system or an agent id)
/health        show health records
/quit          exit";

pub fn parse_participant(token: &str) -> Participant {
    match token.to_lowercase().as_str() {
        "user" => Participant::User,
        "system" => Participant::System,
        _ => Participant::Agent(AgentId::from(token)),
    }
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    if let Some(rest) = line.strip_prefix('@') {
        let Some((agent, text)) = rest.split_once(':') else {
            return Command::Invalid("expected @agent: text".to_string());
        };
        let agent = agent.trim();
        let text = text.trim();
        if agent.is_empty() || text.is_empty() {
            return Command::Invalid("expected @agent: text".to_string());
        }
        return Command::Direct {
            agent_id: AgentId::from(agent),
            text: text.to_string(),
        };
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args = parts.next().unwrap_or_default().trim();

    match name.as_str() {
        "agents" => Command::Agents,
        "emotions" => Command::Emotions,
        "use" => Command::Use(
            args.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(AgentId::from)
                .collect(),
        ),
        "reset" => Command::Reset,
        "history" => {
            let tokens: Vec<&str> = args.split_whitespace().collect();
            match tokens.as_slice() {
                [a, b] => Command::History {
                    a: parse_participant(a),
                    b: parse_participant(b),
                    limit: DEFAULT_HISTORY_LIMIT,
                },
                [a, b, limit] => match limit.parse() {
                    Ok(limit) => Command::History {
                        a: parse_participant(a),
                        b: parse_participant(b),
                        limit,
                    },
                    Err(_) => Command::Invalid(format!("bad history limit {:?}", limit)),
                },
                _ => Command::Invalid("usage: /history a b [limit]".to_string()),
            }
        }
        "health" => Command::Health,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command /{}", other)),
    }
}
