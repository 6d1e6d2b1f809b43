// matgrad-data/src/corpus.rs

use crate::error::DataError;
use log::info;
use std::fs;
use std::path::Path;

/// A short built-in list of names, used when no corpus file is given.
pub const SAMPLE_WORDS: &[&str] = &[
    "emma", "olivia", "ava", "isabella", "sophia", "charlotte", "mia", "amelia", "harper",
    "evelyn", "abigail", "emily", "elizabeth", "mila", "ella", "avery", "sofia", "camila",
    "aria", "scarlett", "victoria", "madison", "luna", "grace", "chloe", "penelope", "layla",
    "riley", "zoey", "nora", "lily", "eleanor", "hannah", "lillian", "addison", "aubrey",
    "ellie", "stella", "natalie", "zoe", "leah", "hazel", "violet", "aurora", "savannah",
    "audrey", "brooklyn", "bella", "claire", "skylar", "liam", "noah", "oliver", "elijah",
    "william", "james", "benjamin", "lucas", "henry", "alexander", "mason", "michael",
    "ethan", "daniel", "jacob", "logan", "jackson", "levi", "sebastian", "mateo", "jack",
    "owen", "theodore", "aiden", "samuel", "joseph", "john", "david", "wyatt", "matthew",
    "luke", "asher", "carter", "julian", "grayson", "leo", "jayden", "gabriel", "isaac",
    "lincoln", "anthony", "hudson", "dylan", "ezra", "thomas", "charles", "christopher",
    "jaxon", "maverick", "josiah",
];

/// Splits newline-separated text into trimmed, non-empty, lowercase words.
pub fn parse_words(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Reads a newline-separated corpus file.
///
/// # Errors
/// `Io` if the file cannot be read, `EmptyCorpus` if it holds no word.
pub fn load_words<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DataError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let words = parse_words(&text);
    if words.is_empty() {
        return Err(DataError::EmptyCorpus);
    }
    info!("Loaded {} words from {}", words.len(), path.display());
    Ok(words)
}

/// Loads `path` when given, otherwise returns [`SAMPLE_WORDS`].
pub fn load_corpus(path: Option<&Path>) -> Result<Vec<String>, DataError> {
    match path {
        Some(path) => load_words(path),
        None => Ok(SAMPLE_WORDS.iter().map(|w| w.to_string()).collect()),
    }
}
