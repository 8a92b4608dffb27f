// Nickname profanity filter. The real word list is an external asset; this
// reproduces the source's normalization pipeline (leet-speak folding, then
// symbol/alnum stripping, each pass re-checked against the list) so the
// call site behaves the same shape even with a small embedded word list.

use std::collections::HashSet;

use crate::domain::ports::ProfanityFilter;

const MIN_CHECK_LEN: usize = 3;

fn leet_fold(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            '@' => 'a',
            '$' => 's',
            other => other,
        })
        .collect()
}

fn strip_symbols(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub struct WordListProfanityFilter {
    words: HashSet<String>,
}

impl WordListProfanityFilter {
    pub fn new(words: impl IntoIterator<Item = String>) -> Self {
        WordListProfanityFilter {
            words: words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    fn contains_pass(&self, candidate: &str) -> bool {
        let lower = candidate.to_lowercase();
        self.words.iter().any(|word| lower.contains(word.as_str()))
    }
}

impl Default for WordListProfanityFilter {
    fn default() -> Self {
        WordListProfanityFilter::new(Vec::new())
    }
}

impl ProfanityFilter for WordListProfanityFilter {
    fn contains_banned_word(&self, name: &str) -> bool {
        if name.chars().count() <= MIN_CHECK_LEN {
            return false;
        }
        if self.contains_pass(name) {
            return true;
        }
        let folded = leet_fold(name);
        if self.contains_pass(&folded) {
            return true;
        }
        let stripped = strip_symbols(&folded);
        self.contains_pass(&stripped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catches_leet_substitution() {
        let filter = WordListProfanityFilter::new(["nerd".to_string()]);
        assert!(filter.contains_banned_word("n3rd"));
    }

    #[test]
    fn ignores_short_names() {
        let filter = WordListProfanityFilter::new(["ass".to_string()]);
        assert!(!filter.contains_banned_word("as"));
    }

    #[test]
    fn allows_clean_names() {
        let filter = WordListProfanityFilter::new(["nerd".to_string()]);
        assert!(!filter.contains_banned_word("player"));
    }
}
