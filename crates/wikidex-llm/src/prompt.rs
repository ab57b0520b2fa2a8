//! Prompt-family strategy objects (§4.9).
//!
//! Three model families are supported, each wrapping the question and
//! system prompt in the literal token framing its own tokenizer expects.
//! The llama/mistral shapes and the system prompt copy are grounded in
//! `original_source/askwikidata.py`'s `llama_prompt`/`mistral_prompt`/
//! `system_from_context`; the qwen family has no source counterpart and is
//! authored fresh from the standard ChatML convention (§10.5).

use wikidex_config::PromptFamily;

const DEFAULT_SYSTEM: &str = "You are a helpful assistant.";

/// Builds the system prompt instructing the model to answer only from
/// `context`, in the exact register `system_from_context` used.
pub fn system_prompt(context: &str, today: &str) -> String {
    format!(
        "You are answering questions for a given context. \
Answer based on information from the given context only, but do not mention the context in your response. \
If the answer is not in the context say that you do not know the answer. \
Only give the answer, do not provide any further explanations. \
Do not mention the context. \
Dates and timespans will be presented to you in YYYY-MM-DD format. Interpret those. \
For reference, today is the {today}. \
Respond with the most current information unless requested otherwise.\n\
\nCONTEXT:\n{context}"
    )
}

/// Render `query` into the literal prompt text for `family`, using `system`
/// as the system/instruction framing (or [`DEFAULT_SYSTEM`] when absent).
pub fn render(family: PromptFamily, query: &str, system: Option<&str>) -> String {
    let system = system.unwrap_or(DEFAULT_SYSTEM);
    match family {
        PromptFamily::Llama => format!("<s>[INST] <<SYS>>\n{system}\n<</SYS>>\n\n{query} [/INST]"),
        PromptFamily::Mistral => format!("<s>[INST] {system}\n\nQUESTION: {query} [/INST]"),
        PromptFamily::Qwen => format!(
            "<|im_start|>system\n{system}<|im_end|>\n<|im_start|>user\n{query}<|im_end|>\n<|im_start|>assistant\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llama_framing_matches_tokenizer_convention() {
        let prompt = render(PromptFamily::Llama, "who is the mayor?", Some("sys"));
        assert_eq!(prompt, "<s>[INST] <<SYS>>\nsys\n<</SYS>>\n\nwho is the mayor? [/INST]");
    }

    #[test]
    fn mistral_framing_matches_tokenizer_convention() {
        let prompt = render(PromptFamily::Mistral, "who is the mayor?", Some("sys"));
        assert_eq!(prompt, "<s>[INST] sys\n\nQUESTION: who is the mayor? [/INST]");
    }

    #[test]
    fn qwen_framing_uses_chatml_markers() {
        let prompt = render(PromptFamily::Qwen, "who is the mayor?", Some("sys"));
        assert!(prompt.starts_with("<|im_start|>system\nsys<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>user\nwho is the mayor?<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn system_prompt_instructs_context_only_answers() {
        let system = system_prompt("Berlin is a city.", "2026-07-28");
        assert!(system.contains("do not mention the context"));
        assert!(system.contains("2026-07-28"));
        assert!(system.contains("CONTEXT:\nBerlin is a city."));
    }
}
