/// Club-form tokens that carry no identity ("FC Barcelona", "Genk KV", "AS Roma").
const CLUB_AFFIXES: [&str; 10] = ["kv", "fc", "sc", "sv", "ac", "as", "bv", "cf", "afc", "ssc"];

/// Canonical comparison key for a team name.
///
/// Lower-cases, collapses whitespace, then repeatedly strips a trailing club affix, a leading
/// club affix and a trailing all-digit token until none applies. Digits inside a name are
/// kept. If nothing would be left, the lower-cased input is returned so that a non-blank name
/// never maps to an empty key.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();

    let mut start = 0;
    let mut end = tokens.len();
    loop {
        if start < end && is_affix(tokens[end - 1]) {
            end -= 1;
        } else if start < end && is_affix(tokens[start]) {
            start += 1;
        } else if start < end && is_numeric(tokens[end - 1]) {
            end -= 1;
        } else {
            break;
        }
    }

    if start == end {
        return tokens.join(" ");
    }
    tokens[start..end].join(" ")
}

fn is_affix(token: &str) -> bool {
    CLUB_AFFIXES.contains(&token)
}

fn is_numeric(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
}
