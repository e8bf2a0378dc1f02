use std::collections::HashSet;

use crate::{ModelError, Seed};

/// Seeds used when the operator does not supply an override list.
pub const DEFAULT_SEEDS: &[Seed] = &[
    1, 2, 4, 7, 32, 123, 124, 582, 1893, 2989, 3012, 4728, 37827, 981928, 87821, 891823782,
    989182, 89182391, 11, 22, 44, 77, 99, 2020, 3232, 123123, 124124, 582582, 18931893, 29892989,
    30123012, 47284728, 7601778, 8090485, 977367484, 491163361, 424254581, 673398983,
];

/// Parse an operator-supplied comma-separated seed list.
///
/// Entries are trimmed. The whole list is rejected on the first entry that
/// is not an integer, and on a repeated seed, because two tasks with the same
/// seed would write to the same output files.
pub fn parse_seed_list(raw: &str) -> Result<Vec<Seed>, ModelError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ModelError::EmptySeedList);
    }

    let mut seen = HashSet::new();
    let mut seeds = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        let seed: Seed = entry.parse().map_err(|_| ModelError::InvalidSeed {
            value: entry.to_string(),
        })?;
        if !seen.insert(seed) {
            return Err(ModelError::DuplicateSeed(seed));
        }
        seeds.push(seed);
    }
    Ok(seeds)
}

/// Seeds for a run: the override list when one is given, the defaults
/// otherwise. A blank override counts as absent.
pub fn resolve_seeds(override_list: Option<&str>) -> Result<Vec<Seed>, ModelError> {
    match override_list.map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_seed_list(raw),
        _ => Ok(DEFAULT_SEEDS.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_entries() {
        let seeds = parse_seed_list(" 3, 4 ,5").unwrap();
        assert_eq!(seeds, vec![3, 4, 5]);
    }

    #[test]
    fn rejects_non_integer_entry() {
        let err = parse_seed_list("3,x,5").unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidSeed {
                value: "x".to_string()
            }
        );
    }

    #[test]
    fn rejects_empty_entry() {
        assert!(matches!(
            parse_seed_list("1,,2"),
            Err(ModelError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn rejects_blank_list() {
        assert_eq!(parse_seed_list("   "), Err(ModelError::EmptySeedList));
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(parse_seed_list("7,8,7"), Err(ModelError::DuplicateSeed(7)));
    }

    #[test]
    fn override_replaces_defaults() {
        assert_eq!(resolve_seeds(Some("9, 10")).unwrap(), vec![9, 10]);
        assert_eq!(resolve_seeds(Some("  ")).unwrap(), DEFAULT_SEEDS.to_vec());
        assert_eq!(resolve_seeds(None).unwrap(), DEFAULT_SEEDS.to_vec());
        assert!(resolve_seeds(Some("3,x,5")).is_err());
    }

    #[test]
    fn default_seeds_are_unique() {
        let unique: HashSet<_> = DEFAULT_SEEDS.iter().collect();
        assert_eq!(unique.len(), DEFAULT_SEEDS.len());
        assert_eq!(DEFAULT_SEEDS.len(), 38);
    }
}
