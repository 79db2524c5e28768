//! Prompt text sent to the model.

use std::fmt::Write as _;

use utgen_core::UnitContext;

/// Role and answer format for every conversation.
pub const SYSTEM_PROMPT: &str = "You are a senior TypeScript engineer who writes thorough, \
deterministic Jest unit tests. Answer with a single fenced code block containing the complete \
test file and nothing else inside the block. Do not use network access, timers or random values \
without mocking them.";

/// First user message of a conversation.
pub fn initial_prompt(context: &UnitContext) -> String {
    let unit = &context.unit;
    let label = context
        .language
        .fence_labels()
        .first()
        .copied()
        .unwrap_or("typescript");
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Write Jest unit tests for the exported unit `{}`.",
        unit.name
    );
    let _ = writeln!(prompt, "\nSource of `{}`:\n```{label}\n{}\n```", unit.name, unit.source_text);

    if !unit.referenced_types.is_empty() {
        let _ = writeln!(prompt, "\nTypes it uses:\n```{label}");
        for ty in &unit.referenced_types {
            let _ = writeln!(prompt, "{}", ty.source_text);
        }
        let _ = writeln!(prompt, "```");
    }

    if !unit.import_context.is_empty() {
        let _ = writeln!(prompt, "\nImports of the source file:\n```{label}");
        for import in &unit.import_context {
            let _ = writeln!(prompt, "{import}");
        }
        let _ = writeln!(prompt, "```");
    }

    let _ = writeln!(
        prompt,
        "\nThe test file is saved next to the source file. Import the unit with `{}`.",
        unit.export.import_statement(&context.import_specifier())
    );
    let local = unit.name.split('.').next().unwrap_or(&unit.name);
    if unit.export.name() != local {
        let _ = writeln!(
            prompt,
            "`{local}` is exported as `{}`; use that name in the tests.",
            unit.export.name()
        );
    }
    let _ = write!(
        prompt,
        "Cover normal behavior, edge cases and error paths. Reply with exactly one \
```{label} code block holding the whole test file."
    );
    prompt
}

/// User message carrying the failing run back to the model.
pub fn feedback_prompt(raw_results: &str) -> String {
    format!(
        "The tests failed. Jest reported:\n```json\n{}\n```\n\
Fix the tests (or their assumptions about the unit) and reply with the complete corrected \
test file in a single code block.",
        raw_results.trim()
    )
}
