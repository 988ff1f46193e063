//! Prompt rendering for the judge and the fact extractor.

use backstory_core::types::EvidenceItem;

pub const UNKNOWN_CHARACTER: &str = "Unknown Character";
pub const NO_CAPTION: &str = "No Caption";

/// `[Chunk <id>]: "<text>"` per item, blank-line separated, in the given order.
pub fn format_evidence_block(evidence: &[EvidenceItem]) -> String {
    let mut block = String::new();
    for item in evidence {
        block.push_str(&format!("[Chunk {}]: \"{}\"\n\n", item.chunk_id(), item.text()));
    }
    block
}

pub fn render_judge_prompt(character: &str, caption: &str, claim: &str, evidence_block: &str) -> String {
    let character = or_default(character, UNKNOWN_CHARACTER);
    let caption = or_default(caption, NO_CAPTION);
    format!(
        r#"You are a Narrative Logic Judge.

TASK: Determine if the [BACKSTORY] contradicts the [BOOK EXCERPTS].

[CHARACTER]: {character}
[CAPTION]: {caption}

[BACKSTORY CLAIM]
{claim}

[BOOK EXCERPTS (Timeline Ordered)]
{evidence_block}
[CRITICAL ANALYSIS RULES]
1. CHECK MUTUALLY EXCLUSIVE STATES:
   - Location: if the book places the character in prison and the claim places them in Paris, that is a CONTRADICTION (0).
   - Life/Death: if the book says they died and the claim says they did something later, that is a CONTRADICTION (0).
   - Alliance: if the book says they are a Royalist and the claim says they are a Bonapartist, that is a CONTRADICTION (0).
2. SILENCE IS NOT A CONTRADICTION:
   - If the book merely does not mention the event, return 1.
   - Only return 0 if the book actively establishes a reality where the claim is impossible.
3. TIMELINE LOGIC:
   - Pay attention to the sequence of events implied by the [CAPTION] and text.
4. CHARACTER CHECK:
   - Ignore excerpts about a different character than the one in the claim.

[OUTPUT]
Return a JSON object:
{{
    "prediction": 0 or 1,
    "rationale": "Identify the conflict: [Book State] vs [Claim State]. Quote the text."
}}
"#
    )
}

pub fn render_fact_prompt(character: &str, caption: &str, claim: &str) -> String {
    format!(
        r#"You are a Fact Extractor.
Break the text into a JSON list of atomic facts.

TEXT: "This is about a character named {character}, the caption if present is {caption}, and the backstory is {claim}"

OUTPUT FORMAT:
{{
    "facts": ["Fact 1", "Fact 2"]
}}
"#
    )
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}
