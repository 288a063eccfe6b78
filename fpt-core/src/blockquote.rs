// Markdown blockquote helpers
// Prompts are stored with every line prefixed by "> "; responses are stored as-is.

/// Line prefix marking a prompt
pub const QUOTE_PREFIX: &str = "> ";

/// True if every line starts with "> ".
/// An empty section is a single empty line, so it is not quoted.
pub fn is_blockquoted(section: &str) -> bool {
    section.split('\n').all(|line| line.starts_with(QUOTE_PREFIX))
}

/// Prefix every line with "> ", whether or not it is already quoted
pub fn quote_lines(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.split('\n')
        .map(|line| format!("{}{}", QUOTE_PREFIX, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Blockquote a section unless it already is
pub fn blockquote(section: &str) -> String {
    if is_blockquoted(section) {
        section.to_string()
    } else {
        quote_lines(section)
    }
}

/// Remove the "> " prefix from every line of a quoted section.
/// Sections that are not blockquoted come back unchanged.
pub fn deblockquote(section: &str) -> String {
    if !is_blockquoted(section) {
        return section.to_string();
    }
    section
        .split('\n')
        .map(|line| &line[QUOTE_PREFIX.len()..])
        .collect::<Vec<_>>()
        .join("\n")
}
