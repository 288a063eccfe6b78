// Interactive commands
// Single-letter commands, optionally suffixed with 3 (standard) or 4 (advanced)

use fpt_core::ModelTier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Answer the thread as it stands in the file
    Follow(Option<ModelTier>),
    /// Replace the last response
    Regenerate(Option<ModelTier>),
    /// Answer only the last prompt
    LastOnly(Option<ModelTier>),
    DumpToHistory,
    DumpToFile,
    Quit,
    /// Anything else is the next question
    Prompt(String),
    /// Blank input
    Nothing,
}

pub const HELP: &str = "\
f: read next question from file. f3 to force the standard model, f4 to force the advanced model
r: re-generate the last response. r3 to force the standard model, r4 to force the advanced model
o: read the file and respond to the last question only. o3 to force the standard model, o4 to force the advanced model
d: dump-to-history (clear the current file and archive the cleared thread into the history file)
df: dump-to-file (clear the current file and archive the cleared thread into a new file in the archive directory, with a generated file name)
q: quit the program
h: print this help message";

fn tier_suffix(suffix: &str) -> Option<Option<ModelTier>> {
    match suffix {
        "" => Some(None),
        "3" => Some(Some(ModelTier::Standard)),
        "4" => Some(Some(ModelTier::Advanced)),
        _ => None,
    }
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let input = input.trim_end_matches(['\r', '\n']);
        let word = input.trim();

        match word {
            "" => return Command::Nothing,
            "h" => return Command::Help,
            "d" => return Command::DumpToHistory,
            "df" => return Command::DumpToFile,
            "q" => return Command::Quit,
            _ => {}
        }

        let mut chars = word.chars();
        if let (Some(letter), rest) = (chars.next(), chars.as_str()) {
            if let Some(tier) = tier_suffix(rest) {
                match letter {
                    'f' => return Command::Follow(tier),
                    'r' => return Command::Regenerate(tier),
                    'o' => return Command::LastOnly(tier),
                    _ => {}
                }
            }
        }

        Command::Prompt(input.to_string())
    }
}
