//! Cleanup of raw oracle responses.

/// Extract the artifact text from an oracle response.
///
/// Returns the largest fenced code block when the response contains any,
/// otherwise the whole response trimmed. An unterminated fence runs to the end.
pub fn extract_code(response: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in response.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(lines) => blocks.push(lines.join("\n")),
                None => current = Some(Vec::new()),
            }
        } else if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        blocks.push(lines.join("\n"));
    }

    // First block wins ties.
    let mut best: Option<&String> = None;
    for block in &blocks {
        if best.is_none_or(|b| block.trim().len() > b.trim().len()) {
            best = Some(block);
        }
    }
    match best {
        Some(block) if !block.trim().is_empty() => block.trim().to_string(),
        _ => response.trim().to_string(),
    }
}
