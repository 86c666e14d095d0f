//! Layered prompt assembly for the chat model.
//!
//! Message order:
//!
//! 1. system: persona + optional section hint + source-mode instruction + brevity rule
//! 2. system: KB excerpts (if any)
//! 3. system: web text (if any)
//! 4. the last `history_limit` dialogue turns
//! 5. user: the current question

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PromptConfig;

/// Where the extra context of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Kb,
    Web,
    Plain,
}

impl SourceMode {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            SourceMode::Kb => "KB",
            SourceMode::Web => "WEB",
            SourceMode::Plain => "PLAIN",
        }
    }

    fn instruction(&self, company: &str) -> String {
        match self {
            SourceMode::Kb => format!(
                "You answer from the internal {} knowledge base. Rely on the provided \
                 excerpts first, then add general explanations only if needed.",
                company
            ),
            SourceMode::Web => format!(
                "You have extra context from public web sources. Use it carefully, \
                 prioritising a solution to the customer's task and the {} style.",
                company
            ),
            SourceMode::Plain => "Answer from the previous dialogue and general knowledge; \
                 the knowledge base had no direct hit."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything needed to build one request.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub prompt: &'a PromptConfig,
    pub mode: SourceMode,
    /// Description of the menu section / flow the user is in, if any.
    pub section_hint: Option<&'a str>,
    pub kb_context: Option<&'a str>,
    pub web_context: Option<&'a str>,
    pub history: &'a [ChatMessage],
    pub history_limit: usize,
    pub user_text: &'a str,
}

const BREVITY_RULE: &str = "Be concise: no more than a few paragraphs. Give the essential \
     answer first, and only then any explanations that are really needed.";

/// The persona prompt with company contacts filled in.
pub fn base_system_prompt(prompt: &PromptConfig) -> String {
    format!(
        "You are the AI assistant of {company}, a Ukrainian precision farming centre.\n\
         \n\
         Language:\n\
         - Reply only in Ukrainian, plainly and without bureaucratic phrasing.\n\
         \n\
         Answer style:\n\
         - Start with a 1-2 sentence conclusion.\n\
         - Then a structured list of 6-12 concrete points: what to check, what to do, \
         which data to clarify, which risks apply.\n\
         - At most two options, with a short note on when to choose which.\n\
         - If details are missing, end with 3-6 precise questions.\n\
         \n\
         Priorities:\n\
         - For autopilots, navigation, RTK, agrochemistry, service and cable harnesses, \
         offer {company} solutions first: TerraNavix, Hexagon, CHCNAV and Ag Leader \
         autopilots, the FarmRTK network, {company} service.\n\
         - Do not survey the market; suggest 1-2 concrete options for the task.\n\
         \n\
         Contacts (only when the customer asks where to turn next):\n\
         - Website: https://{site}\n\
         - Support phone: {phone}\n\
         \n\
         Limits:\n\
         - Do not invent internal company details that are not in the knowledge base \
         or the user's message.\n\
         - Do not name an exact model version; you are an OpenAI language model adapted \
         for {company}.\n\
         \n\
         Manuals:\n\
         - If asked for a manual or PDF, do not refuse. Give the instructions as text: \
         preparation, mounting, first start and calibration, RTK connection, typical errors. \
         Use concrete steps from the knowledge base when available.",
        company = prompt.company,
        site = prompt.site,
        phone = prompt.phone,
    )
}

/// Build the ordered message list for the chat model.
pub fn build_messages(inputs: &PromptInputs<'_>) -> Vec<ChatMessage> {
    let company = &inputs.prompt.company;

    let mut system_parts: Vec<String> = vec![base_system_prompt(inputs.prompt)];
    if let Some(hint) = inputs.section_hint.filter(|h| !h.trim().is_empty()) {
        system_parts.push(format!("Section context:\n{}", hint));
    }
    system_parts.push(inputs.mode.instruction(company));
    system_parts.push(BREVITY_RULE.to_string());

    let mut messages = vec![ChatMessage::system(system_parts.join("\n\n"))];

    if let Some(kb) = inputs.kb_context.filter(|c| !c.is_empty()) {
        messages.push(ChatMessage::system(format!(
            "Below are excerpts from the internal {} knowledge base. \
             Refer to them when answering the user:\n\n{}",
            company, kb
        )));
    }

    if let Some(web) = inputs.web_context.filter(|c| !c.is_empty()) {
        messages.push(ChatMessage::system(format!(
            "Below is text from public web sources that may help with the answer. \
             Use it as background where appropriate:\n\n{}",
            web
        )));
    }

    let skip = inputs.history.len().saturating_sub(inputs.history_limit);
    messages.extend(
        inputs.history[skip..]
            .iter()
            .filter(|turn| !turn.content.is_empty())
            .cloned(),
    );

    messages.push(ChatMessage::user(inputs.user_text));
    messages
}

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{1,3}([^*\n]+)\*{1,3}").unwrap());
static UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{1,3}([^_\n]+)_{1,3}").unwrap());
static BACKTICKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"`{1,3}").unwrap());

/// Strip markdown emphasis and code fences from a model answer.
pub fn clean_plain_text(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let s = BOLD.replace_all(s, "$1");
    let s = UNDERSCORE.replace_all(&s, "$1");
    let s = BACKTICKS.replace_all(&s, "");
    s.replace("\r\n", "\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs<'a>(
        prompt: &'a PromptConfig,
        mode: SourceMode,
        history: &'a [ChatMessage],
    ) -> PromptInputs<'a> {
        PromptInputs {
            prompt,
            mode,
            section_hint: None,
            kb_context: None,
            web_context: None,
            history,
            history_limit: 14,
            user_text: "How do I calibrate the steering motor?",
        }
    }

    #[test]
    fn test_kb_mode_layers() {
        let prompt = PromptConfig::default();
        let mut req = inputs(&prompt, SourceMode::Kb, &[]);
        req.kb_context = Some("[manual.txt • 0]\nCalibrate the steering motor.");
        req.section_hint = Some("The user is in the Autopilot section.");
        let msgs = build_messages(&req);

        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("FRENDT"));
        assert!(msgs[0].content.contains("Autopilot section"));
        assert!(msgs[0].content.contains("internal FRENDT knowledge base"));
        assert!(msgs[1].content.contains("[manual.txt • 0]"));
        assert_eq!(msgs[2], ChatMessage::user("How do I calibrate the steering motor?"));
    }

    #[test]
    fn test_plain_mode_has_no_context_messages() {
        let prompt = PromptConfig::default();
        let msgs = build_messages(&inputs(&prompt, SourceMode::Plain, &[]));
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].content.contains("no direct hit"));
    }

    #[test]
    fn test_web_context_message() {
        let prompt = PromptConfig::default();
        let mut req = inputs(&prompt, SourceMode::Web, &[]);
        req.web_context = Some("[https://a.example/]\nAlpha");
        req.kb_context = Some("");
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 3);
        assert!(msgs[1].content.contains("public web sources"));
    }

    #[test]
    fn test_history_limit_and_empty_turns() {
        let prompt = PromptConfig::default();
        let mut history: Vec<ChatMessage> = (0..20)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        history[19] = ChatMessage::assistant("");
        let mut req = inputs(&prompt, SourceMode::Plain, &history);
        req.history_limit = 3;
        let msgs = build_messages(&req);
        // system + turns 17, 18 (19 is empty) + user
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[1].content, "turn 17");
        assert_eq!(msgs[2].content, "turn 18");
    }

    #[test]
    fn test_clean_plain_text() {
        let raw = "**Step 1**: mount the *antenna*.\r\n__Note__: use `RTK` mode.\r\n";
        assert_eq!(
            clean_plain_text(raw),
            "Step 1: mount the antenna.\nNote: use RTK mode."
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
    }
}
