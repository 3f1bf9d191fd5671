//! Persona prompt template
//!
//! The template is scanned once, left to right. Values are copied into the
//! output verbatim, so a question containing `{question}` stays literal.

/// Inputs to one prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptParts<'a> {
    pub personality_prompt: &'a str,
    /// Retrieved `key - value` lines
    pub relative_info: &'a str,
    pub last_three_responses: &'a str,
    pub question: &'a str,
}

pub const PERSONA_TEMPLATE: &str = "\
## Instruction
{personality_prompt}
Here is relative information about you: {relative_info}
NOTE: If any of that information fits the conversation, weave it in naturally \
so the reply feels personal. If nothing fits, stay in the moment and keep the \
conversation flowing without mentioning it.
Keep the response short and to the point.
- Do not add translations
## Last 3 Responses you have given
{last_three_responses}
## User Question
Answer the user question: {question}
";

/// Fill `template` with `parts`. Unknown `{...}` sequences are kept as-is.
pub fn render(template: &str, parts: &PromptParts<'_>) -> String {
    let slots: [(&str, &str); 4] = [
        ("{personality_prompt}", parts.personality_prompt),
        ("{relative_info}", parts.relative_info),
        ("{last_three_responses}", parts.last_three_responses),
        ("{question}", parts.question),
    ];

    let mut out = String::with_capacity(
        template.len() + slots.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match slots.iter().find(|(name, _)| tail.starts_with(name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render the built-in persona template.
pub fn build_prompt(parts: &PromptParts<'_>) -> String {
    render(PERSONA_TEMPLATE, parts)
}
