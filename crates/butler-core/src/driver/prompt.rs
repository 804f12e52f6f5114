//! System prompts and quick-action messages

/// User message of the "explain" quick action
pub const EXPLAIN_CODE_MESSAGE: &str = "Please explain what this code does, how it works, and highlight any interesting patterns or potential improvements.";

/// User message of the "find bugs" quick action
pub const FIND_BUGS_MESSAGE: &str = "Please review this code for potential bugs, errors, or issues. Look for logic errors, edge cases, performance problems, and security vulnerabilities.";

/// User message of the "optimize" quick action
pub const OPTIMIZE_CODE_MESSAGE: &str = "Please analyze this code for optimization opportunities. Focus on performance improvements, code clarity, maintainability, and best practices.";

/// System prompt for a code-assistant turn.
///
/// `tool_catalog` is the rendered catalog description, or the no-tools
/// notice.
pub fn build_system_prompt(
    language: &str,
    code: &str,
    file_name: Option<&str>,
    tool_catalog: &str,
) -> String {
    let file_info = file_name.map(|f| format!("File: {}", f)).unwrap_or_default();

    format!(
        "You are an expert code assistant specializing in {language} development. \
You provide helpful, accurate, and actionable advice about code.

{file_info}
Current {language} code context:
```{language}
{code}
```

Available tools:
{tool_catalog}

Guidelines:
- Provide clear, concise explanations
- Focus on best practices and code quality
- Suggest specific improvements when relevant
- Use the available tools when they help answer the question
- If the code is empty or minimal, offer to help with starting the implementation
- For debugging requests, provide step-by-step analysis
- For optimization requests, focus on performance and maintainability

Respond in a conversational, helpful tone as if you're pair programming with the user."
    )
}

/// System prompt for code generation
pub fn build_generation_prompt(language: &str, context: Option<&str>) -> String {
    let context = context
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Context: {}", c))
        .unwrap_or_default();

    format!(
        "You are an expert {language} developer. Generate clean, well-commented, production-ready code.

{context}

Guidelines:
- Write clear, readable code with appropriate comments
- Follow {language} best practices and conventions
- Include error handling where appropriate
- Make the code modular and maintainable
- Add type annotations if applicable"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NO_TOOLS_NOTICE;

    #[test]
    fn test_system_prompt_embeds_context() {
        let prompt = build_system_prompt(
            "rust",
            "fn main() {}",
            Some("src/main.rs"),
            "- git_status: [git] Show status",
        );

        assert!(prompt.contains("specializing in rust development"));
        assert!(prompt.contains("File: src/main.rs"));
        assert!(prompt.contains("```rust\nfn main() {}\n```"));
        assert!(prompt.contains("- git_status: [git] Show status"));
    }

    #[test]
    fn test_system_prompt_without_file_or_tools() {
        let prompt = build_system_prompt("python", "", None, NO_TOOLS_NOTICE);
        assert!(!prompt.contains("File:"));
        assert!(prompt.contains(NO_TOOLS_NOTICE));
    }

    #[test]
    fn test_generation_prompt() {
        let prompt = build_generation_prompt("go", Some("HTTP handler"));
        assert!(prompt.contains("expert go developer"));
        assert!(prompt.contains("Context: HTTP handler"));

        let prompt = build_generation_prompt("go", Some("  "));
        assert!(!prompt.contains("Context:"));
    }
}
