//! Prompt assembly for the chat and analyze commands.

use crate::selector::ContextFile;

/// Chat file context is capped independently of the analyze budgets.
pub const MAX_CHAT_FILE_CHARS: usize = 15_000;

/// Rough token estimate: one token per four characters. Good enough for the
/// cost warning; real tokenizers disagree but not by an order of magnitude.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Structured project-analysis prompt over the selected file bundle.
pub fn build_analysis_prompt(focus: &str, files: &[ContextFile]) -> String {
    let mut parts = vec![format!(
        "Act as an experienced software architect reviewing {focus}.\n\
         Based on the content of the following key files from this area, provide a \
         structured analysis in Markdown using these headings:\n\n\
         ## Main Purpose\n(Concise summary in 1-2 sentences.)\n\n\
         ## Key Technologies and Languages\n(List.)\n\n\
         ## Overall Structure\n(Briefly describe organization and architecture, 2-4 sentences.)\n\n\
         ## Starting Points\n(Optional: 1-2 key files or directories for a new developer.)\n\n\
         Be clear, concise, and technical.\n\n\
         --- PROVIDED FILE CONTENTS ---\n"
    )];
    for file in files {
        parts.push(format!(
            "\n--- File: {path} ---\n{content}\n--- End file: {path} ---",
            path = file.path,
            content = file.content
        ));
    }
    parts.concat()
}

/// Wrap a question with a single file's content as context, truncating the
/// file when needed.
pub fn build_file_context_prompt(rel_path: &str, content: &str, message: &str) -> String {
    let mut content = content.to_string();
    if content.chars().count() > MAX_CHAT_FILE_CHARS {
        if let Some((idx, _)) = content.char_indices().nth(MAX_CHAT_FILE_CHARS) {
            content.truncate(idx);
        }
        content.push_str("\n... (file truncated)");
    }
    format!(
        "Content of file '{rel_path}':\n\
         ---------------- FILE CONTENT START ----------------\n\
         {content}\n\
         ---------------- FILE CONTENT END ------------------\n\n\
         Question/instruction: {message}"
    )
}
