// Transcript engine
// Classifies, reads, and rewrites the on-disk prompt/response thread format.
//
// A transcript is a sequence of sections separated by DELIMITER, and a
// well-formed file always ends with DELIMITER. Prompts are blockquoted,
// responses are not, and the two strictly alternate starting with a prompt.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use color_eyre::{eyre::Context, Result};
use regex::{NoExpand, Regex};
use tracing::debug;

use crate::blockquote::{blockquote, deblockquote, is_blockquoted, quote_lines};
use crate::types::{Classification, TurnKind};

/// Separator between turns, also required at the end of the file
pub const DELIMITER: &str = "\n\n----\n\n";

/// An operation that assumes a well-formed transcript found something else.
///
/// This is never a normal user-facing condition: `classify` leaves the file in
/// canonical form, so hitting this means a step was skipped or the file was
/// edited underneath us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatViolation {
    operation: &'static str,
    detail: String,
}

impl FormatViolation {
    fn new(operation: &'static str, detail: impl Into<String>) -> Self {
        FormatViolation {
            operation,
            detail: detail.into(),
        }
    }

    /// Name of the operation that detected the violation
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: transcript is not well-formed ({})",
            self.operation, self.detail
        )
    }
}

impl std::error::Error for FormatViolation {}

/// Result of reading a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub classification: Classification,
    /// De-blockquoted turns in order; empty for `InvalidOrdering`
    pub messages: Vec<String>,
    /// Canonical content to write back, when it differs from the input
    pub rewritten: Option<String>,
}

/// One section of the file with its quoting computed once
#[derive(Debug, Clone, Copy)]
struct Section<'a> {
    text: &'a str,
    quoted: bool,
}

impl<'a> Section<'a> {
    fn new(text: &'a str) -> Self {
        Section {
            text,
            quoted: is_blockquoted(text),
        }
    }
}

/// What the classifier expects the next confirmed section to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Prompt,
    Response,
}

fn trailer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\n----\n*$").unwrap())
}

/// Canonicalize the end of the content.
///
/// Blank content becomes empty. Content already ending in the delimiter
/// (with any number of trailing newlines) keeps exactly one. Anything else
/// loses its trailing newlines and gains a delimiter.
pub fn normalize_trailer_content(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }

    let pattern = trailer_pattern();
    if pattern.is_match(content) {
        pattern.replace(content, NoExpand(DELIMITER)).into_owned()
    } else {
        format!("{}{}", content.trim_end_matches('\n'), DELIMITER)
    }
}

/// Walk the sections and decide the file's structural state
fn classify_sections(sections: &[Section<'_>]) -> Classification {
    let Some((last, confirmed)) = sections.split_last() else {
        return Classification::Plain;
    };
    if confirmed.is_empty() {
        return Classification::Plain;
    }

    let mut expect = Expect::Prompt;
    for section in confirmed {
        expect = match (expect, section.quoted) {
            (Expect::Prompt, true) => Expect::Response,
            (Expect::Response, false) => Expect::Prompt,
            _ => return Classification::InvalidOrdering,
        };
    }

    match expect {
        // The last section is an unconfirmed prompt; quoting is applied later
        Expect::Prompt => Classification::ValidEndsWithPrompt,
        Expect::Response if last.quoted => Classification::InvalidOrdering,
        Expect::Response => Classification::ValidEndsWithResponse,
    }
}

/// Classify normalized content and extract its messages.
///
/// Expects content already passed through `normalize_trailer_content`.
pub fn analyze(content: &str) -> Result<Analysis> {
    if !content.contains(DELIMITER) {
        if content.trim().is_empty() {
            return Ok(Analysis {
                classification: Classification::Plain,
                messages: Vec::new(),
                rewritten: None,
            });
        }
        let quoted = blockquote(content);
        let messages = vec![deblockquote(&quoted)];
        return Ok(Analysis {
            classification: Classification::Plain,
            messages,
            rewritten: Some(format!("{}{}", quoted, DELIMITER)),
        });
    }

    let mut parts: Vec<&str> = content.split(DELIMITER).collect();
    if parts.last().is_some_and(|last| last.trim().is_empty()) {
        parts.pop();
    }
    let sections: Vec<Section<'_>> = parts.iter().copied().map(Section::new).collect();

    let classification = classify_sections(&sections);
    if classification == Classification::InvalidOrdering {
        return Ok(Analysis {
            classification,
            messages: Vec::new(),
            rewritten: None,
        });
    }

    let messages = sections.iter().map(|s| deblockquote(s.text)).collect();

    // A trailing prompt is stored blockquoted from now on
    let rewritten = match classification {
        Classification::Plain | Classification::ValidEndsWithPrompt
            if sections.last().is_some_and(|s| !s.quoted) =>
        {
            Some(blockquote_last_turn_content(content)?).filter(|updated| updated != content)
        }
        _ => None,
    };

    Ok(Analysis {
        classification,
        messages,
        rewritten,
    })
}

/// Content with `text` appended as a new turn
pub fn append_turn_content(content: &str, text: &str, kind: TurnKind) -> String {
    let turn = match kind {
        TurnKind::Prompt => quote_lines(text),
        TurnKind::Response => text.to_string(),
    };
    let mut updated = normalize_trailer_content(content);
    updated.push_str(&turn);
    updated.push_str(DELIMITER);
    updated
}

/// Content with the last turn dropped
pub fn remove_last_turn_content(content: &str) -> Result<String> {
    let mut sections: Vec<&str> = content.split(DELIMITER).collect();
    if sections.len() <= 2 {
        return Err(FormatViolation::new(
            "remove_last_turn",
            format!("expected at least 3 sections, found {}", sections.len()),
        )
        .into());
    }
    if sections.last() != Some(&"") {
        return Err(FormatViolation::new(
            "remove_last_turn",
            "content after the final delimiter",
        )
        .into());
    }

    sections.truncate(sections.len() - 2);
    Ok(format!("{}{}", sections.join(DELIMITER), DELIMITER))
}

/// Content with the last turn blockquoted if it was not already
pub fn blockquote_last_turn_content(content: &str) -> Result<String> {
    let mut sections: Vec<String> = content.split(DELIMITER).map(String::from).collect();
    if sections.len() < 2 {
        return Err(FormatViolation::new("blockquote_last_turn", "no delimiter found").into());
    }
    if sections.last().is_some_and(|last| !last.is_empty()) {
        return Err(FormatViolation::new(
            "blockquote_last_turn",
            "content after the final delimiter",
        )
        .into());
    }

    let index = sections.len() - 2;
    sections[index] = blockquote(&sections[index]);
    Ok(sections.join(DELIMITER))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Rewrite only the trailing region of the file into canonical form
pub fn normalize_trailer(path: &Path) -> Result<()> {
    let content = read(path)?;
    let normalized = normalize_trailer_content(&content);
    if normalized != content {
        debug!(path = %path.display(), "normalized transcript trailer");
        write(path, &normalized)?;
    }
    Ok(())
}

/// Normalize the file, then classify it and return its messages.
///
/// A trailing prompt that is not yet blockquoted gets quoted in place.
pub fn classify(path: &Path) -> Result<(Classification, Vec<String>)> {
    normalize_trailer(path)?;
    let content = read(path)?;
    let analysis = analyze(&content)?;

    if let Some(ref rewritten) = analysis.rewritten {
        debug!(path = %path.display(), "blockquoted trailing prompt");
        write(path, rewritten)?;
    }

    debug!(
        path = %path.display(),
        classification = %analysis.classification,
        turns = analysis.messages.len(),
        "classified transcript"
    );
    Ok((analysis.classification, analysis.messages))
}

/// Append a prompt (blockquoted) or a response to the file
pub fn append_turn(path: &Path, text: &str, kind: TurnKind) -> Result<()> {
    let content = read(path)?;
    write(path, &append_turn_content(&content, text, kind))?;
    debug!(path = %path.display(), ?kind, "appended turn");
    Ok(())
}

/// Drop the last turn of a well-formed file
pub fn remove_last_turn(path: &Path) -> Result<()> {
    let content = read(path)?;
    let updated = remove_last_turn_content(&content)
        .with_context(|| format!("Cannot remove the last turn of {}", path.display()))?;
    write(path, &updated)?;
    debug!(path = %path.display(), "removed last turn");
    Ok(())
}

/// Blockquote the last turn of a well-formed file in place
pub fn blockquote_last_turn(path: &Path) -> Result<()> {
    let content = read(path)?;
    let updated = blockquote_last_turn_content(&content)
        .with_context(|| format!("Cannot blockquote the last turn of {}", path.display()))?;
    if updated != content {
        write(path, &updated)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ONE_PROMPT: &str = "> Hello\n\n----\n\n";
    const ONE_EXCHANGE: &str = "> Q1\n\n----\n\nA1\n\n----\n\n";
    const TWO_PROMPTS: &str = "> Q1\n\n----\n\nA1\n\n----\n\n> Q2\n\n----\n\n";

    fn transcript(dir: &TempDir, content: &str) -> Result<std::path::PathBuf> {
        let path = dir.path().join("thread.md");
        fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn test_normalize_blank_content() {
        assert_eq!(normalize_trailer_content(""), "");
        assert_eq!(normalize_trailer_content("  \n\t\n"), "");
    }

    #[test]
    fn test_normalize_collapses_existing_trailer() {
        assert_eq!(normalize_trailer_content("> Q\n\n----"), "> Q\n\n----\n\n");
        assert_eq!(normalize_trailer_content("> Q\n\n----\n"), "> Q\n\n----\n\n");
        assert_eq!(normalize_trailer_content("> Q\n\n----\n\n\n\n\n"), "> Q\n\n----\n\n");
        assert_eq!(normalize_trailer_content(ONE_EXCHANGE), ONE_EXCHANGE);
    }

    #[test]
    fn test_normalize_appends_missing_trailer() {
        assert_eq!(normalize_trailer_content("Hello"), "Hello\n\n----\n\n");
        assert_eq!(normalize_trailer_content("Hello\n\n\n"), "Hello\n\n----\n\n");
        assert_eq!(
            normalize_trailer_content("> Q1\n\n----\n\nA1"),
            ONE_EXCHANGE
        );
        // A rule without the blank line in front is just text
        assert_eq!(normalize_trailer_content("----"), "----\n\n----\n\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            "\n\n",
            "Hello",
            "Hello\n",
            "Hello\n\n----",
            "Hello\n\n----\n\n\n",
            "a\n\n----\n\nb\n\n----\n\nc",
            "a\n\n\n----\n",
            "----\n\n",
            "x\r\n",
        ];
        for input in inputs {
            let once = normalize_trailer_content(input);
            assert_eq!(normalize_trailer_content(&once), once, "input {input:?}");
            assert!(once.is_empty() || once.ends_with(DELIMITER));
        }
    }

    #[test]
    fn test_classify_single_unquoted_prompt() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "Hello\n\n----\n\n")?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::Plain);
        assert_eq!(messages, vec!["Hello"]);
        assert_eq!(fs::read_to_string(&path)?, ONE_PROMPT);
        Ok(())
    }

    #[test]
    fn test_classify_file_without_delimiter() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "What is Rust?\nExplain briefly.\n")?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::Plain);
        assert_eq!(messages, vec!["What is Rust?\nExplain briefly."]);
        assert_eq!(
            fs::read_to_string(&path)?,
            "> What is Rust?\n> Explain briefly.\n\n----\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_classify_blank_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "\n   \n")?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::Plain);
        assert!(messages.is_empty());
        assert_eq!(fs::read_to_string(&path)?, "");
        Ok(())
    }

    #[test]
    fn test_classify_ends_with_response() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, ONE_EXCHANGE)?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::ValidEndsWithResponse);
        assert_eq!(messages, vec!["Q1", "A1"]);
        assert_eq!(fs::read_to_string(&path)?, ONE_EXCHANGE);
        Ok(())
    }

    #[test]
    fn test_classify_ends_with_prompt() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, TWO_PROMPTS)?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::ValidEndsWithPrompt);
        assert_eq!(messages, vec!["Q1", "A1", "Q2"]);
        Ok(())
    }

    #[test]
    fn test_classify_quotes_trailing_prompt_in_place() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "> Q1\n\n----\n\nA1\n\n----\n\nQ2 line one\nline two")?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::ValidEndsWithPrompt);
        assert_eq!(messages, vec!["Q1", "A1", "Q2 line one\nline two"]);
        assert_eq!(
            fs::read_to_string(&path)?,
            "> Q1\n\n----\n\nA1\n\n----\n\n> Q2 line one\n> line two\n\n----\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_classify_unquoted_first_prompt_is_invalid() -> Result<()> {
        let dir = TempDir::new()?;
        let content = "Q1\n\n----\n\nA1\n\n----\n\n";
        let path = transcript(&dir, content)?;

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::InvalidOrdering);
        assert!(messages.is_empty());
        assert_eq!(fs::read_to_string(&path)?, content);
        Ok(())
    }

    #[test]
    fn test_quoted_response_is_invalid() {
        let trailing = analyze("> Q1\n\n----\n\n> A1\n\n----\n\n").unwrap();
        assert_eq!(trailing.classification, Classification::InvalidOrdering);

        let middle = analyze("> Q1\n\n----\n\n> A1\n\n----\n\n> Q2\n\n----\n\n").unwrap();
        assert_eq!(middle.classification, Classification::InvalidOrdering);
    }

    #[test]
    fn test_unquoted_middle_prompt_is_invalid() {
        let analysis =
            analyze("> Q1\n\n----\n\nA1\n\n----\n\nQ2\n\n----\n\nA2\n\n----\n\n").unwrap();
        assert_eq!(analysis.classification, Classification::InvalidOrdering);
        assert_eq!(analysis.rewritten, None);
    }

    #[test]
    fn test_empty_response_keeps_thread_valid() {
        let analysis = analyze("> Q\n\n----\n\n\n\n----\n\n").unwrap();
        assert_eq!(analysis.classification, Classification::ValidEndsWithResponse);
        assert_eq!(analysis.messages, vec!["Q", ""]);
        assert_eq!(analysis.rewritten, None);
    }

    #[test]
    fn test_empty_first_prompt_is_invalid() {
        let analysis = analyze("\n\n----\n\nA\n\n----\n\n").unwrap();
        assert_eq!(analysis.classification, Classification::InvalidOrdering);
        assert!(analysis.messages.is_empty());
    }

    #[test]
    fn test_empty_middle_response_before_prompt() {
        let analysis = analyze("> Q1\n\n----\n\n\n\n----\n\n> Q2\n\n----\n\n").unwrap();
        assert_eq!(analysis.classification, Classification::ValidEndsWithPrompt);
        assert_eq!(analysis.messages, vec!["Q1", "", "Q2"]);
        assert_eq!(analysis.rewritten, None);
    }

    #[test]
    fn test_long_thread_deblockquotes_every_prompt() {
        let content = "> Q1\n> more\n\n----\n\nA1\n\n----\n\n> Q2\n\n----\n\nA2\nwith lines\n\n----\n\n";
        let analysis = analyze(content).unwrap();
        assert_eq!(analysis.classification, Classification::ValidEndsWithResponse);
        assert_eq!(analysis.messages, vec!["Q1\nmore", "A1", "Q2", "A2\nwith lines"]);
        assert_eq!(analysis.rewritten, None);
    }

    #[test]
    fn test_classification_is_deterministic() -> Result<()> {
        let dir = TempDir::new()?;
        let inputs = [
            "Hello",
            "Hello\n\n----\n\n\n",
            ONE_EXCHANGE,
            "> Q1\n\n----\n\nA1\n\n----\n\nQ2",
            "Q1\n\n----\n\nA1\n\n----\n\n",
            "",
        ];
        for input in inputs {
            let path = transcript(&dir, input)?;
            let first = classify(&path)?;
            let after_first = fs::read_to_string(&path)?;
            let second = classify(&path)?;
            assert_eq!(first, second, "input {input:?}");
            assert_eq!(fs::read_to_string(&path)?, after_first, "input {input:?}");
        }
        Ok(())
    }

    #[test]
    fn test_append_response_completes_exchange() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "> Q1\n\n----\n\n")?;

        append_turn(&path, "A1", TurnKind::Response)?;
        assert_eq!(fs::read_to_string(&path)?, ONE_EXCHANGE);
        Ok(())
    }

    #[test]
    fn test_append_prompt_is_blockquoted() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "> Q1\n\n----\n\nA1")?;

        append_turn(&path, "Q2\nsecond line", TurnKind::Prompt)?;
        assert_eq!(
            fs::read_to_string(&path)?,
            "> Q1\n\n----\n\nA1\n\n----\n\n> Q2\n> second line\n\n----\n\n"
        );

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::ValidEndsWithPrompt);
        assert_eq!(messages[2], "Q2\nsecond line");
        Ok(())
    }

    #[test]
    fn test_append_prompt_that_looks_quoted_round_trips() {
        let content = append_turn_content(ONE_EXCHANGE, "> quoting someone", TurnKind::Prompt);
        let analysis = analyze(&content).unwrap();
        assert_eq!(analysis.messages[2], "> quoting someone");
    }

    #[test]
    fn test_append_to_empty_file() {
        assert_eq!(
            append_turn_content("", "Hi", TurnKind::Prompt),
            "> Hi\n\n----\n\n"
        );
    }

    #[test]
    fn test_remove_last_turn() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, ONE_EXCHANGE)?;

        remove_last_turn(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "> Q1\n\n----\n\n");

        let (classification, messages) = classify(&path)?;
        assert_eq!(classification, Classification::Plain);
        assert_eq!(messages, vec!["Q1"]);
        Ok(())
    }

    #[test]
    fn test_remove_last_turn_rejects_single_turn() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, ONE_PROMPT)?;

        let err = remove_last_turn(&path).unwrap_err();
        let violation = err.downcast_ref::<FormatViolation>().unwrap();
        assert_eq!(violation.operation(), "remove_last_turn");
        assert_eq!(fs::read_to_string(&path)?, ONE_PROMPT);
        Ok(())
    }

    #[test]
    fn test_remove_last_turn_rejects_missing_trailer() {
        let err = remove_last_turn_content("> Q1\n\n----\n\nA1\n\n----\n\nstray").unwrap_err();
        assert!(err.downcast_ref::<FormatViolation>().is_some());
    }

    #[test]
    fn test_blockquote_last_turn() -> Result<()> {
        let dir = TempDir::new()?;
        let path = transcript(&dir, "> Q1\n\n----\n\nA1\n\n----\n\nQ2\n\n----\n\n")?;

        blockquote_last_turn(&path)?;
        assert_eq!(fs::read_to_string(&path)?, TWO_PROMPTS);

        // Already quoted: nothing changes
        blockquote_last_turn(&path)?;
        assert_eq!(fs::read_to_string(&path)?, TWO_PROMPTS);
        Ok(())
    }

    #[test]
    fn test_blockquote_last_turn_preconditions() {
        assert!(blockquote_last_turn_content("no delimiter").is_err());
        let err = blockquote_last_turn_content("> Q1\n\n----\n\ntrailing").unwrap_err();
        assert!(err.downcast_ref::<FormatViolation>().is_some());
    }
}
