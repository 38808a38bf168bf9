//! Edit-distance matching for near-miss customer input.

/// Levenshtein distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Every option, closest to `input` first. The sort is stable, so options
/// at equal distance keep their given order.
pub fn rank_by_distance<I, S>(input: &str, options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ranked: Vec<(usize, String)> = options
        .into_iter()
        .map(|option| {
            let option = option.into();
            (levenshtein(input, &option), option)
        })
        .collect();
    ranked.sort_by_key(|(distance, _)| *distance);
    ranked.into_iter().map(|(_, option)| option).collect()
}

/// The option closest to `input`; the first one wins a tie.
pub fn closest<'a, I>(input: &str, options: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    options
        .into_iter()
        .map(|option| (levenshtein(input, option), option))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, option)| option)
}
