// Display-name sanitization applied to `l00`'s `name` field before it is
// stored on a `Player`. The source pipeline round-trips through an emoji
// codec (demojize/emojize); no such crate exists anywhere in the example
// corpus, so this keeps the rest of the pipeline (ASCII-only, trimmed,
// truncated, collapsed, uppercased) and drops the emoji round-trip step.

const MAX_LEN: usize = 20;

pub fn sanitize(raw: &str) -> String {
    let ascii_only: String = raw.chars().filter(|c| c.is_ascii()).collect();
    let trimmed = ascii_only.trim();
    let truncated: String = trimmed.chars().take(MAX_LEN).collect();
    let collapsed = truncated.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_non_ascii_and_uppercases() {
        assert_eq!(sanitize("héllo wörld"), "HLLO WRLD");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(sanitize("a    b"), "A B");
    }

    #[test]
    fn truncates_to_twenty_chars() {
        let long = "a".repeat(40);
        assert_eq!(sanitize(&long).len(), MAX_LEN);
    }
}
